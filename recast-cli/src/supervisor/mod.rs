//! Restart-on-crash supervision of the external encoder.
//!
//! This module defines the `StreamEngine` abstraction over the external
//! encode-and-transmit process, the immutable `StreamJob` it runs, and the
//! `Supervisor` control loop that restarts failed attempts after a fixed
//! delay until the operator stops it.

mod engine;
mod job;
mod runner;

pub use engine::{AttemptOutcome, FfmpegEngine, StreamEngine};
pub use job::{EncodeParams, StreamJob};
pub use runner::{DEFAULT_RESTART_DELAY, Supervisor, SupervisorConfig, SupervisorState};
