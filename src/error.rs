//! Error types shared by iterators, cursors and collections.
//!
//! Two channels exist:
//!
//! - [`LoadError`] is the asynchronous one. Whatever ends a population badly
//!   (the routine returned an error, panicked, a filter failed, the producer
//!   went silent for too long) is recorded once as a [`LoadCause`] and replayed
//!   to every consumer read from then on.
//! - [`JitError`] covers the synchronous contract violations reported right at
//!   the call site (pushing into a closed stream, reading past the end, ...),
//!   and wraps [`LoadError`] for calls that can surface both.

use std::error::Error;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Boxed error returned by population routines and item filters.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// What terminated a population.
#[derive(Error, Debug)]
pub enum LoadCause {
    /// The population routine returned an error.
    #[error("producer failed: {0}")]
    Producer(#[source] BoxError),

    /// The item filter returned an error while admitting an item.
    #[error("item filter failed: {0}")]
    Filter(#[source] BoxError),

    /// The population routine panicked.
    #[error("producer panicked: {0}")]
    Panicked(String),

    /// No push, completion or failure happened within the idle timeout.
    #[error("no activity for {idle:?}")]
    IdleTimeout {
        /// Configured idle timeout that elapsed.
        idle: Duration,
    },

    /// The task runner refused to run the population.
    #[error("population task was not submitted: {0}")]
    Submit(String),
}

impl LoadCause {
    /// Returns the innermost error in the cause chain, if the cause wraps one.
    pub fn root_cause(&self) -> Option<&(dyn Error + 'static)> {
        let mut current: &(dyn Error + 'static) = match self {
            LoadCause::Producer(err) | LoadCause::Filter(err) => &**err,
            _ => return None,
        };

        while let Some(next) = current.source() {
            current = next;
        }

        Some(current)
    }

    /// Returns true for a synthesized idle timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, LoadCause::IdleTimeout { .. })
    }
}

/// Uniform failure surfaced to consumers of a stream whose population failed.
///
/// Cloning is cheap; every consumer of the same stream observes the same cause.
#[derive(Clone)]
pub struct LoadError {
    name: Arc<str>,
    cause: Arc<LoadCause>,
}

impl LoadError {
    pub(crate) fn new(name: Arc<str>, cause: LoadCause) -> Self {
        Self {
            name,
            cause: Arc::new(cause),
        }
    }

    /// Rebinds an existing cause to another stream name, sharing the cause.
    pub(crate) fn renamed(&self, name: Arc<str>) -> Self {
        Self {
            name,
            cause: self.cause.clone(),
        }
    }

    /// Name of the stream whose population failed.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The recorded cause.
    pub fn cause(&self) -> &LoadCause {
        &self.cause
    }

    /// Message of the innermost error, falling back to the cause itself.
    pub fn root_message(&self) -> String {
        match self.cause.root_cause() {
            Some(root) => root.to_string(),
            None => self.cause.to_string(),
        }
    }

    /// Returns true when the population was ended by the idle timeout.
    pub fn is_timeout(&self) -> bool {
        self.cause.is_timeout()
    }
}

impl fmt::Debug for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadError")
            .field("name", &self.name)
            .field("cause", &self.cause)
            .finish()
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loading {} failed: {}", self.name, self.cause)
    }
}

impl Error for LoadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.cause.as_ref())
    }
}

/// Errors reported synchronously by iterator, cursor, collection and populator calls.
#[derive(Error, Debug)]
pub enum JitError {
    /// The stream's population failed.
    #[error(transparent)]
    Load(#[from] LoadError),

    /// A push arrived after the stream was completed or failed.
    #[error("{name} is already {state}, push rejected")]
    Closed {
        /// Stream name.
        name: String,
        /// `"complete"` or `"failed"`.
        state: &'static str,
    },

    /// Read past the end of an exhausted stream.
    #[error("no more elements")]
    NoSuchElement,

    /// Mutation not supported by a single-pass stream.
    #[error("{0} is not supported")]
    Unsupported(&'static str),

    /// Positional access outside the materialized items.
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds {
        /// Requested index.
        index: usize,
        /// Length at the time of the call.
        len: usize,
    },

    /// `populate()` was called more than once.
    #[error("population was already submitted")]
    AlreadyPopulated,

    /// The task runner refused the population task.
    #[error("failed to submit population task: {0}")]
    Submit(#[source] io::Error),
}

impl JitError {
    /// Returns the load error if this is one.
    pub fn as_load(&self) -> Option<&LoadError> {
        match self {
            JitError::Load(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("outer")]
    struct Outer(#[source] io::Error);

    #[test]
    fn root_cause_walks_the_source_chain() {
        let inner = io::Error::other("boom");
        let cause = LoadCause::Producer(Box::new(Outer(inner)));
        let err = LoadError::new(Arc::from("names"), cause);

        assert_eq!(err.root_message(), "boom");
        assert!(!err.is_timeout());
    }

    #[test]
    fn timeout_has_no_root_error() {
        let err = LoadError::new(
            Arc::from("names"),
            LoadCause::IdleTimeout {
                idle: Duration::from_millis(5),
            },
        );

        assert!(err.is_timeout());
        assert!(err.root_message().contains("no activity"));
        assert!(err.to_string().starts_with("loading names failed"));
    }
}
