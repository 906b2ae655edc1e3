use thiserror::Error;

/// Errors the simulation core can raise. Internal library code always
/// returns one of these; only the CLI wrapper translates them into
/// `anyhow::Error` for final reporting.
#[derive(Error, Debug)]
pub enum SimError {
    /// A trace line was malformed, short a field, or carried a negative
    /// runtime/walltime/resource count.
    #[error("malformed trace at line {line}: {reason}")]
    Trace { line: usize, reason: String },

    #[error("failed to read trace file: {0}")]
    TraceIo(#[from] std::io::Error),

    /// The system config was missing `nodes`, or `nodes` was non-positive.
    #[error("invalid system config: {0}")]
    Config(String),

    #[error("failed to read system config file: {0}")]
    ConfigIo(std::io::Error),

    #[error("failed to parse system config: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// A job or operation violated the scheduler's documented contract:
    /// req_resources > N at submit, start() on a job not in `scheduled`,
    /// end() on a job not in `running`.
    #[error("contract violation: {0}")]
    ContractViolation(String),

    /// The allocator and scheduler disagree about state, or a backfill
    /// candidate was judged eligible but allocation failed anyway. This
    /// always indicates a bug in the core, not bad input.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

pub type SimResult<T> = Result<T, SimError>;
