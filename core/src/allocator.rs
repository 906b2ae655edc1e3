//! The resource allocator and the time-resource map (TRM) backfill
//! primitives that operate on it.
//!
//! The allocator itself only ever tracks "what is busy right now" (it has
//! no notion of a reservation). Reservations live entirely in the TRM, a
//! plain value the scheduler builds, mutates through [`reserve_future`] and
//! [`reserve_now`], and discards at the end of a scheduling cycle. Keeping
//! these as free functions over a plain `Trm` (rather than allocator
//! methods) is what makes backfill testable in isolation from live
//! allocator state.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::calendar::{JobId, Time};

pub type ResourceId = usize;

/// A sorted mapping from timestamp to the resource ids available from that
/// timestamp onward, cumulatively. The scheduler builds one of these from
/// current allocator state plus the expected end times of running jobs.
pub type Trm = BTreeMap<Time, Vec<ResourceId>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceState {
    Available,
    Busy,
    Offline,
}

#[derive(Clone, Debug)]
pub struct Resource {
    pub id: ResourceId,
    pub name: String,
    pub cpus: u32,
    pub state: ResourceState,
    pub owning_job_id: Option<JobId>,
}

/// Owns the fixed pool of `N` resources. Never told about reservations;
/// only ever asked to allocate or deallocate against its current state.
#[derive(Debug)]
pub struct Allocator {
    resources: Vec<Resource>,
    rng: ChaCha8Rng,
}

impl Allocator {
    /// Build a pool of `n` identical, initially-available resources, with
    /// allocation order seeded by `seed` so repeated runs are reproducible.
    pub fn new(n: usize, seed: u64) -> Self {
        let resources = (0..n)
            .map(|id| Resource {
                id,
                name: format!("resource_{id}"),
                cpus: 1,
                state: ResourceState::Available,
                owning_job_id: None,
            })
            .collect();

        Self {
            resources,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn get_available(&self) -> Vec<ResourceId> {
        self.resources
            .iter()
            .filter(|r| r.state == ResourceState::Available)
            .map(|r| r.id)
            .collect()
    }

    pub fn all_busy(&self) -> Vec<ResourceId> {
        self.resources
            .iter()
            .filter(|r| r.state == ResourceState::Busy)
            .map(|r| r.id)
            .collect()
    }

    pub fn busy_of(&self, job_id: JobId) -> Vec<ResourceId> {
        self.resources
            .iter()
            .filter(|r| r.state == ResourceState::Busy && r.owning_job_id == Some(job_id))
            .map(|r| r.id)
            .collect()
    }

    pub fn get_offline(&self) -> Vec<ResourceId> {
        self.resources
            .iter()
            .filter(|r| r.state == ResourceState::Offline)
            .map(|r| r.id)
            .collect()
    }

    /// Select `k` available resources for `job_id`, marking them busy.
    /// Returns `None` without mutating anything if fewer than `k` are
    /// available. Selection among the available pool is PRNG-driven but
    /// reproducible given the allocator's seed, so repeated runs pick the
    /// same resources in the same order.
    pub fn allocate(&mut self, job_id: JobId, k: usize) -> Option<Vec<ResourceId>> {
        let mut available: Vec<ResourceId> = self.get_available();
        if available.len() < k {
            return None;
        }

        available.shuffle(&mut self.rng);
        let chosen: Vec<ResourceId> = available.into_iter().take(k).collect();

        for resource in self.resources.iter_mut() {
            if chosen.contains(&resource.id) {
                resource.state = ResourceState::Busy;
                resource.owning_job_id = Some(job_id);
            }
        }

        log::debug!("allocator: job {job_id} allocated {k} resource(s): {chosen:?}");
        Some(chosen)
    }

    /// Return every resource owned by `job_id` to `Available`.
    pub fn deallocate(&mut self, job_id: JobId) -> usize {
        let mut freed = 0;
        for resource in self.resources.iter_mut() {
            if resource.owning_job_id == Some(job_id) {
                resource.state = ResourceState::Available;
                resource.owning_job_id = None;
                freed += 1;
            }
        }
        log::debug!("allocator: job {job_id} deallocated {freed} resource(s)");
        freed
    }

    pub fn utilization(&self) -> f64 {
        if self.resources.is_empty() {
            return 0.0;
        }
        self.all_busy().len() as f64 / self.resources.len() as f64
    }
}

/// Find the earliest `t*` in `trm` with at least `k` resources available,
/// reserve `k` of them (the last `k` in insertion order, to maximize reuse
/// of long-free resources) across every timestamp in `[t*, t* + walltime]`,
/// and return the updated map. `None` if no such `t*` exists (this happens
/// when a running job is overrunning its walltime and the TRM entry for it
/// was therefore never built; see `Scheduler::build_trm`).
pub fn reserve_future(trm: &Trm, job_id: JobId, k: usize, walltime: Time) -> Option<Trm> {
    let t_star = trm
        .iter()
        .find(|(_, ids)| ids.len() >= k)
        .map(|(t, _)| *t);

    let Some(t_star) = t_star else {
        log::debug!("reserve_future: job {job_id} found no reservation time");
        return None;
    };

    let reserved: Vec<ResourceId> = trm[&t_star][trm[&t_star].len() - k..].to_vec();
    let end_time = t_star + walltime;

    let mut updated = trm.clone();
    for (t, ids) in updated.iter_mut() {
        if *t >= t_star && *t <= end_time {
            ids.retain(|id| !reserved.contains(id));
        }
    }

    log::debug!(
        "reserve_future: job {job_id} reserved {reserved:?} starting at {t_star}, ending at {end_time}"
    );
    Some(updated)
}

/// Tentatively reserve `k` resources for `job_id` at every timestamp up to
/// `now + walltime`, using the same last-`k` deterministic rule as
/// [`reserve_future`]. Used while scanning backfill candidates; the caller
/// discards the result if the candidate turns out ineligible.
pub fn reserve_now(trm: &Trm, job_id: JobId, k: usize, walltime: Time, now: Time) -> Trm {
    let horizon = now + walltime;
    let mut updated = trm.clone();

    for (t, ids) in updated.iter_mut() {
        if *t > horizon {
            break;
        }
        if ids.len() < k {
            continue;
        }
        let take_from = ids.len() - k;
        let reserved: Vec<ResourceId> = ids[take_from..].to_vec();
        ids.retain(|id| !reserved.contains(id));
        log::debug!("reserve_now: job {job_id} reserved {reserved:?} at t={t}");
    }

    updated
}
