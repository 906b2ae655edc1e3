//! The simulator driver: turns a parsed trace into preloaded SUBMIT events,
//! pops events off the calendar and dispatches them to the scheduler, and
//! answers observation queries. This is the one type in the crate that
//! owns the calendar, the allocator, and the scheduler together; nothing
//! here is a process-wide singleton, and a caller builds one `Simulation`
//! per run.

use std::collections::HashMap;
use std::path::Path;

use crate::allocator::Allocator;
use crate::calendar::{Calendar, Event, EventKind, JobId, Time};
use crate::errors::SimResult;
use crate::scheduler::{BackfillPolicy, Job, Scheduler};
use crate::trace::{self, SystemConfig, TraceJob};

/// A snapshot of simulated state at the current point in stepping.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Observation {
    pub timestamp: Time,
    pub utilization: f64,
    pub avg_wait: f64,
}

/// Owns the calendar, allocator, and scheduler for one simulation run.
#[derive(Debug)]
pub struct Simulation {
    calendar: Calendar,
    allocator: Allocator,
    scheduler: Scheduler,
    trace_jobs: HashMap<JobId, TraceJob>,
}

impl Simulation {
    /// Read a trace and system config from disk without building a
    /// simulation yet. Exposed separately from [`Simulation::new`] so a
    /// caller can validate input before committing to a seed/backfill
    /// policy.
    pub fn read_trace(
        jobs_path: impl AsRef<Path>,
        system_config_path: impl AsRef<Path>,
    ) -> SimResult<(Vec<TraceJob>, SystemConfig)> {
        let jobs = trace::read_trace(jobs_path)?;
        let config = trace::read_system_config(system_config_path)?;
        Ok((jobs, config))
    }

    /// Build a simulation from an already-parsed trace: construct the
    /// allocator and scheduler, prime the calendar with one SUBMIT event
    /// per job, and set `now` to the earliest submit time (or 0 for an
    /// empty trace).
    pub fn initialize(
        jobs: Vec<TraceJob>,
        config: SystemConfig,
        seed: u64,
        backfill: BackfillPolicy,
    ) -> Self {
        let mut calendar = Calendar::new();
        let allocator = Allocator::new(config.nodes, seed);
        let scheduler = Scheduler::new(config.nodes, backfill);

        let start_time = jobs.iter().map(|j| j.submit_ts).min().unwrap_or(0);
        calendar.set_now(start_time);

        let mut trace_jobs = HashMap::with_capacity(jobs.len());
        for job in jobs {
            calendar.schedule(job.submit_ts, EventKind::Submit, job.id);
            trace_jobs.insert(job.id, job);
        }

        Self {
            calendar,
            allocator,
            scheduler,
            trace_jobs,
        }
    }

    /// Pop one event from the calendar and dispatch it. A `Submit` or `End`
    /// can trigger a scheduling cycle that starts one or more jobs in the
    /// same instant (those starts never go back through the calendar, see
    /// [`Calendar::tag_now`]), so they're returned alongside the triggering
    /// event, in the order they were granted. Returns `Ok(None)` once the
    /// calendar is drained; that's a normal empty result, not an error.
    pub fn step(&mut self) -> SimResult<Option<Vec<Event>>> {
        let Some(event) = self.calendar.pop() else {
            return Ok(None);
        };

        let started: Vec<JobId> = match event.kind {
            EventKind::Submit => {
                let trace_job = self
                    .trace_jobs
                    .get(&event.job_id)
                    .expect("every SUBMIT event corresponds to a parsed trace job");
                let job = Job::new(
                    trace_job.id,
                    trace_job.submit_ts,
                    trace_job.req_resources,
                    trace_job.walltime,
                    trace_job.runtime,
                );
                self.scheduler
                    .submit(job, event.time, &mut self.allocator, &mut self.calendar)?
            }
            EventKind::End => {
                let (_finished, started) = self.scheduler.end(
                    event.job_id,
                    event.time,
                    &mut self.allocator,
                    &mut self.calendar,
                )?;
                started
            }
            EventKind::Start => {
                unreachable!("Start events are never scheduled onto the calendar")
            }
        };

        let mut events = Vec::with_capacity(1 + started.len());
        events.push(event);
        for job_id in started {
            events.push(self.calendar.tag_now(EventKind::Start, job_id));
        }

        Ok(Some(events))
    }

    /// Step repeatedly until the calendar is drained, invoking `on_event`
    /// for each dispatched event in dispatch order.
    pub fn run(&mut self, mut on_event: impl FnMut(&Event)) -> SimResult<()> {
        while let Some(events) = self.step()? {
            for event in &events {
                on_event(event);
            }
        }
        Ok(())
    }

    pub fn observe(&self) -> Observation {
        Observation {
            timestamp: self.calendar.now(),
            utilization: self.allocator.utilization(),
            avg_wait: self.scheduler.average_wait_time(),
        }
    }

    pub fn is_drained(&self) -> bool {
        self.calendar.is_empty()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn allocator(&self) -> &Allocator {
        &self.allocator
    }
}

/// Render an event as a CSV line: `<sim_time>,<kind>,<job_id>`.
pub fn format_event(event: &Event) -> String {
    let kind = match event.kind {
        EventKind::Submit => 'Q',
        EventKind::Start => 'R',
        EventKind::End => 'E',
    };
    format!("{},{},{}", event.time, kind, event.job_id)
}
