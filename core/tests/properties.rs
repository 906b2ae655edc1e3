//! Property-based tests over randomly generated traces, covering the
//! invariants a correct scheduler/allocator pairing must never violate
//! regardless of trace shape.

use proptest::prelude::*;
use schedsim_core::driver::format_event;
use schedsim_core::trace::{SystemConfig, TraceJob};
use schedsim_core::{BackfillPolicy, Simulation};

const MAX_NODES: usize = 8;

fn trace_strategy() -> impl Strategy<Value = (usize, Vec<TraceJob>)> {
    (1..=MAX_NODES).prop_flat_map(|n| {
        prop::collection::vec(
            (1i64..=20, 1usize..=n, 1i64..=20, 0i64..=25),
            1..=8,
        )
        .prop_map(move |specs| {
            let mut jobs: Vec<TraceJob> = specs
                .into_iter()
                .enumerate()
                .map(|(i, (submit_ts, req, walltime, runtime))| TraceJob {
                    id: i as u64 + 1,
                    submit_ts,
                    req_resources: req,
                    walltime,
                    runtime: runtime.min(walltime + 5),
                })
                .collect();
            jobs.sort_by_key(|j| j.submit_ts);
            (n, jobs)
        })
    })
}

proptest! {
    /// P1 + P5: at every point the simulation steps through, the number of
    /// busy resources exactly equals the sum of running jobs' requests, and
    /// never exceeds the cluster size.
    #[test]
    fn p1_p5_capacity_accounting((n, jobs) in trace_strategy()) {
        let mut sim = Simulation::initialize(jobs, SystemConfig { nodes: n }, 11, BackfillPolicy::Easy);

        while sim.step().unwrap().is_some() {
            let busy = sim.allocator().all_busy().len();
            let expected: usize = sim.scheduler().running().iter().map(|j| j.req_resources).sum();
            prop_assert_eq!(busy, expected);
            prop_assert!(busy <= n);
        }
    }

    /// P2: every finished job's timestamps are ordered, and its measured
    /// runtime matches exactly what the trace specified.
    #[test]
    fn p2_timestamps_are_ordered_and_exact((n, jobs) in trace_strategy()) {
        let mut sim = Simulation::initialize(jobs, SystemConfig { nodes: n }, 11, BackfillPolicy::Easy);
        sim.run(|_| {}).unwrap();

        for job in sim.scheduler().finished() {
            let submit_ts = job.res_submit_ts.unwrap();
            let run_ts = job.res_run_ts.unwrap();
            let end_ts = job.res_end_ts.unwrap();
            prop_assert!(submit_ts <= run_ts);
            prop_assert!(run_ts <= end_ts);
            prop_assert_eq!(end_ts - run_ts, job.runtime);
        }
    }

    /// P3: with backfill disabled, jobs start in non-decreasing order of
    /// submission time (nothing ever jumps the FCFS queue).
    #[test]
    fn p3_fcfs_safety_without_backfill((n, jobs) in trace_strategy()) {
        let mut sim = Simulation::initialize(jobs, SystemConfig { nodes: n }, 11, BackfillPolicy::Disabled);
        sim.run(|_| {}).unwrap();

        let mut finished: Vec<_> = sim.scheduler().finished().to_vec();
        finished.sort_by_key(|j| j.submit_ts);

        for pair in finished.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if a.submit_ts < b.submit_ts {
                prop_assert!(a.res_run_ts.unwrap() <= b.res_run_ts.unwrap());
            }
        }
    }

    /// P6: events scheduled for the same simulated instant are dispatched
    /// in the order they were submitted in the trace.
    #[test]
    fn p6_same_time_submits_preserve_trace_order((n, mut jobs) in trace_strategy()) {
        for job in jobs.iter_mut() {
            job.submit_ts = 0;
        }
        let expected_order: Vec<u64> = jobs.iter().map(|j| j.id).collect();

        let mut sim = Simulation::initialize(jobs, SystemConfig { nodes: n }, 11, BackfillPolicy::Easy);
        let mut submit_order = Vec::new();
        sim.run(|event| {
            if matches!(event.kind, schedsim_core::EventKind::Submit) {
                submit_order.push(event.job_id);
            }
        })
        .unwrap();

        prop_assert_eq!(submit_order, expected_order);
    }

    /// P7: re-running the same trace with the same seed produces a
    /// byte-identical event log.
    #[test]
    fn p7_deterministic_given_same_seed((n, jobs) in trace_strategy()) {
        let run_once = |jobs: Vec<TraceJob>| {
            let mut sim = Simulation::initialize(jobs, SystemConfig { nodes: n }, 7, BackfillPolicy::Easy);
            let mut lines = Vec::new();
            sim.run(|event| lines.push(format_event(event))).unwrap();
            lines
        };

        let first = run_once(jobs.clone());
        let second = run_once(jobs);
        prop_assert_eq!(first, second);
    }
}
