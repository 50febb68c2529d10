//! Fire-once population task.
//!
//! A [`PopulationTask`] pairs a user routine with the stream it fills and runs the
//! routine on a [`TaskRunner`]. Whatever the routine does, the stream receives
//! exactly one terminal signal afterwards:
//!
//! 1. The routine returns `Ok(())` → [`Sink::complete`]
//! 2. The routine returns `Err(e)` → [`Sink::set_load_error`] with [`LoadCause::Producer`]
//! 3. The routine panics → [`Sink::set_load_error`] with [`LoadCause::Panicked`]
//!
//! Nothing is retried; a failure is final for that stream.
//!
//! # Example
//!
//! ```ignore
//! use jitstream::{Jiterator, task::PopulationTask, runtime::ThreadRunner};
//!
//! let it = Jiterator::new("letters");
//! PopulationTask::new(it.clone(), Box::new(|it: &Jiterator<char>| {
//!     for c in 'a'..='e' {
//!         it.push(c)?;
//!     }
//!     Ok(())
//! }))
//! .submit(&ThreadRunner::new())?;
//! ```

use crate::cursor::Cursor;
use crate::error::{BoxError, JitError, LoadCause};
use crate::jiterator::Jiterator;
use crate::runtime::TaskRunner;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// A user routine populating a stream of type `S`.
pub type Routine<S> = Box<dyn FnOnce(&S) -> Result<(), BoxError> + Send + 'static>;

/// Producer side of a stream, as seen by a population task.
pub trait Sink: Clone + Send + 'static {
    /// Diagnostic name of the stream.
    fn name(&self) -> &str;

    /// Signals successful end of production.
    fn complete(&self);

    /// Signals failed production.
    fn set_load_error(&self, cause: LoadCause);
}

impl<T: Send + 'static> Sink for Jiterator<T> {
    fn name(&self) -> &str {
        Jiterator::name(self)
    }

    fn complete(&self) {
        Jiterator::complete(self)
    }

    fn set_load_error(&self, cause: LoadCause) {
        Jiterator::set_load_error(self, cause)
    }
}

impl<T: Send + 'static> Sink for Cursor<T> {
    fn name(&self) -> &str {
        Cursor::name(self)
    }

    fn complete(&self) {
        Cursor::complete(self)
    }

    fn set_load_error(&self, cause: LoadCause) {
        Cursor::set_load_error(self, cause)
    }
}

/// A routine bound to the stream it populates; runs at most once.
pub struct PopulationTask<S: Sink> {
    sink: S,
    routine: Routine<S>,
}

impl<S: Sink> PopulationTask<S> {
    /// Binds `routine` to `sink`.
    pub fn new(sink: S, routine: Routine<S>) -> Self {
        Self { sink, routine }
    }

    /// Name of the thread or job running the routine.
    pub fn job_name(&self) -> String {
        format!("populate-{}", self.sink.name())
    }

    /// Runs the routine on the calling thread and terminates the sink.
    pub fn run(self) {
        let Self { sink, routine } = self;

        tracing::debug!(stream = %sink.name(), "population started");
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| routine(&sink)));

        match outcome {
            Ok(Ok(())) => {
                tracing::debug!(stream = %sink.name(), "population finished");
                sink.complete();
            }
            Ok(Err(err)) => sink.set_load_error(LoadCause::Producer(err)),
            Err(payload) => sink.set_load_error(LoadCause::Panicked(panic_message(payload))),
        }
    }

    /// Hands the task to `runner`.
    ///
    /// # Errors
    /// [`JitError::Submit`] if the runner refused the job; the sink is failed with
    /// [`LoadCause::Submit`] first, so its consumers do not wait for nothing.
    pub fn submit(self, runner: &dyn TaskRunner) -> Result<(), JitError> {
        let name = self.job_name();
        let sink = self.sink.clone();

        match runner.submit(&name, Box::new(move || self.run())) {
            Ok(()) => Ok(()),
            Err(err) => {
                sink.set_load_error(LoadCause::Submit(err.to_string()));
                Err(JitError::Submit(err))
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
