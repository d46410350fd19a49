//! recast library crate.
//!
//! This module exposes the core functionality for integration testing.

pub mod acquire;
pub mod cli;
pub mod config;
pub mod error;
pub mod supervisor;

pub use error::{Error, Result};
