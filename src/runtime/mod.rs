//! Runtime subsystem: job submission and the shared blocking monitor.

pub(crate) mod monitor;
mod runner;

pub(crate) use monitor::Monitor;
pub use runner::{Job, TaskRunner, ThreadRunner};
