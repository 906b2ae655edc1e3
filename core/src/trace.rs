//! SWF-style trace and JSON system-config parsing.
//!
//! This lives inside the core crate because the simulator driver owns trace
//! ingestion, but nothing past the driver (scheduler, allocator, calendar)
//! ever sees a raw trace line. Offline trace-preprocessing, validation
//! against historical logs, and plotting are genuinely out of scope and
//! live nowhere in this crate.

use std::path::Path;

use serde::Deserialize;

use crate::calendar::{JobId, Time};
use crate::errors::{SimError, SimResult};

/// The handful of stable, trace-derived attributes a job carries for its
/// whole lifetime. Constructed once per SUBMIT event by the driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TraceJob {
    pub id: JobId,
    pub submit_ts: Time,
    pub req_resources: usize,
    pub walltime: Time,
    pub runtime: Time,
}

const SWF_FIELD_COUNT: usize = 18;

/// Parse a whitespace-separated SWF trace. Lines beginning with `;` are
/// comments; blank lines are skipped. Column indices below are 1-based, per
/// the SWF format: 1=id, 2=submit, 4=runtime, 8=req_proc, 9=req_time.
pub fn read_trace(path: impl AsRef<Path>) -> SimResult<Vec<TraceJob>> {
    let contents = std::fs::read_to_string(path)?;
    let mut jobs = Vec::new();

    for (line_no, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < SWF_FIELD_COUNT {
            return Err(SimError::Trace {
                line: line_no + 1,
                reason: format!(
                    "expected {SWF_FIELD_COUNT} whitespace-separated fields, found {}",
                    fields.len()
                ),
            });
        }

        let field = |idx: usize| -> SimResult<i64> {
            fields[idx - 1].parse::<i64>().map_err(|_| SimError::Trace {
                line: line_no + 1,
                reason: format!("column {idx} (`{}`) is not an integer", fields[idx - 1]),
            })
        };

        let id = field(1)?;
        let submit_ts = field(2)?;
        let runtime = field(4)?;
        let req_resources = field(8)?;
        let walltime = field(9)?;

        if id <= 0 {
            return Err(SimError::Trace {
                line: line_no + 1,
                reason: format!("job id must be positive, got {id}"),
            });
        }
        if runtime < 0 {
            return Err(SimError::Trace {
                line: line_no + 1,
                reason: format!("runtime must be >= 0, got {runtime}"),
            });
        }
        if req_resources <= 0 {
            return Err(SimError::Trace {
                line: line_no + 1,
                reason: format!("req_proc must be positive, got {req_resources}"),
            });
        }
        if walltime <= 0 {
            return Err(SimError::Trace {
                line: line_no + 1,
                reason: format!("req_time (walltime) must be positive, got {walltime}"),
            });
        }

        jobs.push(TraceJob {
            id: id as JobId,
            submit_ts,
            req_resources: req_resources as usize,
            walltime,
            runtime,
        });
    }

    Ok(jobs)
}

#[derive(Debug, Deserialize)]
struct RawSystemConfig {
    nodes: i64,
    #[serde(default)]
    #[allow(dead_code)]
    ppn: Option<u32>,
}

/// The resource inventory: a fixed pool of `nodes` identical resources.
/// `ppn` (processors per node) is accepted for completeness but ignored by
/// the core, which treats every resource as a single interchangeable unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SystemConfig {
    pub nodes: usize,
}

pub fn read_system_config(path: impl AsRef<Path>) -> SimResult<SystemConfig> {
    let contents = std::fs::read_to_string(path).map_err(SimError::ConfigIo)?;
    let raw: RawSystemConfig = serde_json::from_str(&contents)?;

    if raw.nodes <= 0 {
        return Err(SimError::Config(format!(
            "`nodes` must be a positive integer, got {}",
            raw.nodes
        )));
    }

    Ok(SystemConfig {
        nodes: raw.nodes as usize,
    })
}
