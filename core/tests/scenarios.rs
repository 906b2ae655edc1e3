//! End-to-end event-sequence scenarios, run through the public
//! `Simulation` driver exactly as the CLI would.

use schedsim_core::driver::format_event;
use schedsim_core::trace::{SystemConfig, TraceJob};
use schedsim_core::{BackfillPolicy, Simulation};

fn job(id: u64, submit_ts: i64, req: usize, walltime: i64, runtime: i64) -> TraceJob {
    TraceJob {
        id,
        submit_ts,
        req_resources: req,
        walltime,
        runtime,
    }
}

fn run(jobs: Vec<TraceJob>, n: usize, backfill: BackfillPolicy) -> Vec<String> {
    let mut sim = Simulation::initialize(jobs, SystemConfig { nodes: n }, 1, backfill);
    let mut lines = Vec::new();
    sim.run(|event| lines.push(format_event(event))).unwrap();
    lines
}

/// S2: a small, short job submitted while a large job occupies the whole
/// cluster gets backfilled ahead of a second large job already queued,
/// because it fits in the large job's shadow without delaying it.
#[test]
fn s2_small_job_backfills_ahead_of_larger_queued_job() {
    let jobs = vec![
        job(1, 0, 3, 100, 100), // leaves 1 of 4 nodes free for its whole run
        job(2, 1, 4, 50, 40),   // needs all 4, blocks at the head of the queue
        job(3, 2, 1, 5, 5),     // fits in the spare node without delaying job 2
    ];
    let events = run(jobs, 4, BackfillPolicy::Easy);

    // job 3 starts (and finishes) well before job 1 ends at t=100, proving
    // it backfilled instead of waiting behind job 2 in strict FCFS order.
    let job3_start = events.iter().position(|e| e == "2,R,3").unwrap();
    let job1_end = events.iter().position(|e| e == "100,E,1").unwrap();
    assert!(job3_start < job1_end);
    assert!(events.contains(&"7,E,3".to_string()));
}

/// S3: with backfill disabled, the same trace respects strict FCFS; job 3
/// must wait behind job 2 even though it would otherwise fit in the gap.
#[test]
fn s3_disabled_backfill_is_strict_fcfs() {
    let jobs = vec![
        job(1, 0, 3, 100, 100),
        job(2, 1, 4, 50, 40),
        job(3, 2, 1, 5, 5),
    ];
    let events = run(jobs, 4, BackfillPolicy::Disabled);

    let job2_start = events.iter().position(|e| e == "100,R,2").unwrap();
    let job3_start = events.iter().position(|e| e.ends_with(",R,3")).unwrap();
    assert!(job2_start < job3_start);
}

/// S1: pure FCFS, no opportunity for backfill (second job submitted after
/// the first already consumed every resource and there is no gap to fill).
#[test]
fn s1_fcfs_baseline() {
    let jobs = vec![job(1, 0, 4, 100, 50), job(2, 1, 1, 10, 5)];
    let events = run(jobs, 4, BackfillPolicy::Easy);
    assert_eq!(
        events,
        vec!["0,Q,1", "0,R,1", "1,Q,2", "50,E,1", "50,R,2", "55,E,2"]
    );
}
