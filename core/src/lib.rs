#![forbid(unsafe_code)]
#![deny(future_incompatible)]
#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    trivial_casts,
    unused_qualifications
)]

//! Discrete-event simulation core for FCFS batch schedulers with EASY
//! backfill. A [`driver::Simulation`] ties a [`calendar::Calendar`], an
//! [`allocator::Allocator`], and a [`scheduler::Scheduler`] together over a
//! parsed [`trace::TraceJob`] set; `cli` is the only consumer that knows
//! about files, output formatting, or process exit codes.

pub mod allocator;
pub mod calendar;
pub mod driver;
pub mod errors;
pub mod scheduler;
pub mod trace;

pub use calendar::{Calendar, Event, EventKind};
pub use driver::{Observation, Simulation};
pub use errors::{SimError, SimResult};
pub use scheduler::BackfillPolicy;
