//! Task submission facility used to run population and relay jobs.
//!
//! Jobs are fire-and-forget: the caller never observes a return value, and every
//! submitted job runs at most once. The crate ships [`ThreadRunner`], which gives
//! each job its own named OS thread; any other executor can be plugged in by
//! implementing [`TaskRunner`].
//!
//! # Example
//!
//! ```ignore
//! use jitstream::runtime::{TaskRunner, ThreadRunner};
//!
//! let runner = ThreadRunner::new();
//! runner.submit("greeter", Box::new(|| println!("Running in background")))?;
//! ```

use std::fmt;
use std::io;
use std::sync::Arc;
use std::thread;

/// A unit of work handed to a [`TaskRunner`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Submits jobs for asynchronous, independent execution.
pub trait TaskRunner: Send + Sync {
    /// Schedules `job` to run once, independently of the caller.
    ///
    /// # Arguments
    /// * `name` - Diagnostic name for the job (used as the thread name where applicable)
    /// * `job` - The work to run
    ///
    /// # Errors
    /// Returns the I/O error of the underlying facility if the job could not be scheduled;
    /// in that case the job is dropped without running.
    fn submit(&self, name: &str, job: Job) -> io::Result<()>;
}

impl fmt::Debug for dyn TaskRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TaskRunner")
    }
}

impl<R: TaskRunner + ?Sized> TaskRunner for Arc<R> {
    fn submit(&self, name: &str, job: Job) -> io::Result<()> {
        (**self).submit(name, job)
    }
}

/// Runs every job on a freshly spawned, named thread.
///
/// The thread is detached: nothing joins it, and a panicking job only takes
/// down its own thread.
#[derive(Clone, Debug, Default)]
pub struct ThreadRunner {
    stack_size: Option<usize>,
}

impl ThreadRunner {
    /// Creates a runner using the platform's default stack size.
    pub fn new() -> Self {
        Self { stack_size: None }
    }

    /// Sets the stack size of spawned threads.
    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }
}

impl TaskRunner for ThreadRunner {
    fn submit(&self, name: &str, job: Job) -> io::Result<()> {
        let mut builder = thread::Builder::new().name(name.to_owned());
        if let Some(bytes) = self.stack_size {
            builder = builder.stack_size(bytes);
        }

        let name = name.to_owned();
        builder.spawn(move || {
            tracing::trace!(job = %name, "job starting");
            job();
            tracing::trace!(job = %name, "job exiting");
        })?;

        Ok(())
    }
}
