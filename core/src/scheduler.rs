//! The scheduler: FCFS queue plus EASY backfill, and the state machine
//! (`Waiting` → `Running` → `Finished`) each job moves through.
//!
//! A job never starts at a future time relative to the scheduling cycle
//! that grants it resources (allocation and start are the same instant).
//! So the scheduler never schedules a `Start` calendar event; it performs
//! the transition directly and hands the caller back the ids of every job
//! that started synchronously during the cycle, in the order they were
//! granted, so the driver can report them immediately after the `Submit`
//! or `End` event that triggered the cycle.
//!
//! The scheduler never touches the calendar or allocator through a stored
//! back-reference; every operation that needs them takes `&mut Allocator`
//! and `&mut Calendar` as explicit arguments, with a single owner (the
//! driver) passing handles down.

use std::collections::VecDeque;

use crate::allocator::{self, Allocator, ResourceId, Trm};
use crate::calendar::{Calendar, EventKind, JobId, Time};
use crate::errors::{SimError, SimResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobState {
    Waiting,
    Running,
    Finished,
}

#[derive(Clone, Debug)]
pub struct Job {
    pub id: JobId,
    pub submit_ts: Time,
    pub req_resources: usize,
    pub walltime: Time,
    pub runtime: Time,

    pub state: JobState,
    pub resource_ids: Vec<ResourceId>,
    pub res_submit_ts: Option<Time>,
    pub res_run_ts: Option<Time>,
    pub res_end_ts: Option<Time>,
}

impl Job {
    pub fn new(id: JobId, submit_ts: Time, req_resources: usize, walltime: Time, runtime: Time) -> Self {
        Self {
            id,
            submit_ts,
            req_resources,
            walltime,
            runtime,
            state: JobState::Waiting,
            resource_ids: Vec::new(),
            res_submit_ts: None,
            res_run_ts: None,
            res_end_ts: None,
        }
    }
}

/// Whether the scheduler should attempt EASY backfill after head-of-line
/// allocation, or run strict FCFS only (used by the FCFS-safety property
/// tests to confirm backfill is never what's preserving submission order).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackfillPolicy {
    Easy,
    Disabled,
}

#[derive(Debug)]
pub struct Scheduler {
    n_resources: usize,
    backfill: BackfillPolicy,
    queue: VecDeque<Job>,
    running: Vec<Job>,
    finished: Vec<Job>,
}

impl Scheduler {
    pub fn new(n_resources: usize, backfill: BackfillPolicy) -> Self {
        Self {
            n_resources,
            backfill,
            queue: VecDeque::new(),
            running: Vec::new(),
            finished: Vec::new(),
        }
    }

    pub fn queue(&self) -> &VecDeque<Job> {
        &self.queue
    }

    pub fn running(&self) -> &[Job] {
        &self.running
    }

    pub fn finished(&self) -> &[Job] {
        &self.finished
    }

    /// `mean(res_run_ts - res_submit_ts)` over every job that has started
    /// (running ∪ finished), or 0 if none have.
    pub fn average_wait_time(&self) -> f64 {
        let started = self.running.iter().chain(self.finished.iter());
        let (total, count) = started.fold((0i64, 0u64), |(sum, n), job| {
            let run_ts = job.res_run_ts.expect("started job always has res_run_ts");
            let submit_ts = job
                .res_submit_ts
                .expect("started job always has res_submit_ts");
            (sum + (run_ts - submit_ts), n + 1)
        });

        if count == 0 {
            0.0
        } else {
            total as f64 / count as f64
        }
    }

    /// Admit a job: stamp its submission time, append it to the FCFS queue,
    /// and run a scheduling cycle. Returns the ids of every job (possibly
    /// including this one) that started synchronously as a result, in the
    /// order they were granted resources.
    pub fn submit(
        &mut self,
        mut job: Job,
        now: Time,
        allocator: &mut Allocator,
        calendar: &mut Calendar,
    ) -> SimResult<Vec<JobId>> {
        if job.req_resources > self.n_resources {
            return Err(SimError::ContractViolation(format!(
                "job {} requested {} resources but only {} exist",
                job.id, job.req_resources, self.n_resources
            )));
        }

        job.res_submit_ts = Some(now);
        self.queue.push_back(job);
        self.run_scheduling_cycle(now, allocator, calendar)
    }

    /// Finish a running job, deallocate its resources, and run a new
    /// scheduling cycle. Returns the finished job plus the ids of every job
    /// that started synchronously as a result of the cycle its end triggers.
    pub fn end(
        &mut self,
        job_id: JobId,
        now: Time,
        allocator: &mut Allocator,
        calendar: &mut Calendar,
    ) -> SimResult<(Job, Vec<JobId>)> {
        let idx = self
            .running
            .iter()
            .position(|j| j.id == job_id)
            .ok_or_else(|| {
                SimError::ContractViolation(format!(
                    "end() called for job {job_id} not in `running`"
                ))
            })?;

        let mut job = self.running.remove(idx);
        job.res_end_ts = Some(now);
        job.state = JobState::Finished;
        allocator.deallocate(job.id);
        self.finished.push(job.clone());

        let started = self.run_scheduling_cycle(now, allocator, calendar)?;
        Ok((job, started))
    }

    /// Move a job from `queue` to `running` at `now`, recording its start
    /// timestamp and scheduling its `End` event.
    fn start_now(&mut self, mut job: Job, now: Time, calendar: &mut Calendar) -> JobId {
        let job_id = job.id;
        job.res_run_ts = Some(now);
        job.state = JobState::Running;
        calendar.schedule(now + job.runtime, EventKind::End, job_id);
        self.running.push(job);
        job_id
    }

    fn run_scheduling_cycle(
        &mut self,
        now: Time,
        allocator: &mut Allocator,
        calendar: &mut Calendar,
    ) -> SimResult<Vec<JobId>> {
        log::debug!("scheduler: entering scheduling cycle at t={now}");

        let mut started = Vec::new();

        // Step 1: head-of-line allocation, strictly FCFS. Stop at the first
        // job that cannot be allocated, so a later, smaller job never jumps
        // the queue here (that's backfill's job, and only conditionally).
        while let Some(job) = self.queue.front() {
            match allocator.allocate(job.id, job.req_resources) {
                Some(resource_ids) => {
                    let mut job = self.queue.pop_front().expect("front() just confirmed Some");
                    job.resource_ids = resource_ids;
                    started.push(self.start_now(job, now, calendar));
                }
                None => break,
            }
        }

        if !self.queue.is_empty() && self.backfill == BackfillPolicy::Easy {
            started.extend(self.backfill_easy(now, allocator, calendar)?);
        }

        log::debug!("scheduler: leaving scheduling cycle at t={now}");
        Ok(started)
    }

    /// Build the time-resource map from currently-available resources plus
    /// the expected end times of every running job.
    fn build_trm(&self, now: Time, allocator: &Allocator) -> Trm {
        let mut running_by_end: Vec<&Job> = self.running.iter().collect();
        running_by_end.sort_by_key(|j| {
            j.res_run_ts.expect("running job has res_run_ts") + j.walltime
        });

        let mut trm = Trm::new();
        let mut cumulative: Vec<ResourceId> = allocator.get_available();
        trm.insert(now, cumulative.clone());

        for job in running_by_end {
            let end_time = job.res_run_ts.expect("running job has res_run_ts") + job.walltime;

            // Overrunning, or its END event is pending for `now` but hasn't
            // been processed yet: we cannot say when it frees its
            // resources, so it is excluded from the map entirely.
            if end_time <= now {
                continue;
            }

            cumulative.extend(job.resource_ids.iter().copied());
            trm.insert(end_time, cumulative.clone());
        }

        trm
    }

    fn backfill_easy(
        &mut self,
        now: Time,
        allocator: &mut Allocator,
        calendar: &mut Calendar,
    ) -> SimResult<Vec<JobId>> {
        log::debug!("scheduler: entering backfill");

        let top_id = self.queue[0].id;
        let top_resources = self.queue[0].req_resources;
        let top_walltime = self.queue[0].walltime;

        let trm = self.build_trm(now, allocator);
        let Some(mut trm) = allocator::reserve_future(&trm, top_id, top_resources, top_walltime)
        else {
            log::debug!("scheduler: backfill skipped, no safe reservation time for top job");
            return Ok(Vec::new());
        };

        let mut backfill_ids: Vec<JobId> = Vec::new();
        for candidate in self.queue.iter().skip(1) {
            let eligible = trm
                .iter()
                .take_while(|(t, _)| **t <= now + candidate.walltime)
                .all(|(_, ids)| ids.len() >= candidate.req_resources);

            if eligible {
                trm = allocator::reserve_now(
                    &trm,
                    candidate.id,
                    candidate.req_resources,
                    candidate.walltime,
                    now,
                );
                backfill_ids.push(candidate.id);
            }
        }

        let mut started = Vec::new();
        for job_id in backfill_ids {
            let idx = self
                .queue
                .iter()
                .position(|j| j.id == job_id)
                .expect("backfill candidate is still in the queue");
            let req = self.queue[idx].req_resources;

            let resource_ids = allocator.allocate(job_id, req).ok_or_else(|| {
                // Eligibility said this should always succeed; if it
                // doesn't, the allocator and the TRM built from its state
                // have drifted apart. That's a bug, not bad input.
                SimError::InvariantViolation(format!(
                    "job {job_id} was judged backfill-eligible but allocate() failed"
                ))
            })?;

            let mut job = self.queue.remove(idx).expect("position() just found it");
            job.resource_ids = resource_ids;
            started.push(self.start_now(job, now, calendar));
        }

        log::debug!("scheduler: leaving backfill");
        Ok(started)
    }
}
