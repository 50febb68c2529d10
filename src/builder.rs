//! Fluent builder for streams and populators.
//!
//! Provides a builder pattern interface for configuring iterators, cursors and the
//! populators that feed them. Every knob has a default, so the shortest form is
//! `PopulatorBuilder::new().build(routine)`.
//!
//! # Example
//! ```ignore
//! use jitstream::{PopulatorBuilder, ItemFilter};
//! use std::time::Duration;
//!
//! let populator = PopulatorBuilder::new()
//!     .name("users")
//!     .idle_timeout(Duration::from_secs(30))
//!     .filter(ItemFilter::infallible(|name: &String| !name.is_empty()))
//!     .build(|it| {
//!         it.push("alice".to_string())?;
//!         Ok(())
//!     });
//! populator.populate()?;
//! ```

use crate::collection::JitCollection;
use crate::cursor::Cursor;
use crate::error::BoxError;
use crate::filter::ItemFilter;
use crate::jiterator::Jiterator;
use crate::populator::{CursorPopulator, Populator};
use crate::runtime::{TaskRunner, ThreadRunner};
use crate::time::{Clock, DEFAULT_IDLE_TIMEOUT, DEFAULT_WAIT_SLICE, MonotonicClock};

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Hands out process-unique stream ids.
pub(crate) fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Settings shared by every stream created from one builder.
#[derive(Clone, Debug)]
pub(crate) struct StreamOptions {
    pub(crate) id: u64,
    pub(crate) name: Arc<str>,
    pub(crate) idle_timeout: Duration,
    pub(crate) wait_slice: Duration,
    pub(crate) clock: Arc<dyn Clock>,
}

impl StreamOptions {
    /// Default settings under the given name, or `jit-<id>` without one.
    pub(crate) fn named(name: Option<&str>) -> Self {
        let id = next_id();
        let name = match name {
            Some(name) => Arc::from(name),
            None => Arc::from(format!("jit-{id}")),
        };

        Self {
            id,
            name,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            wait_slice: DEFAULT_WAIT_SLICE,
            clock: Arc::new(MonotonicClock),
        }
    }

    /// Same timing and clock under a fresh id and the given name.
    pub(crate) fn derive(&self, name: String) -> Self {
        Self {
            id: next_id(),
            name: Arc::from(name),
            idle_timeout: self.idle_timeout,
            wait_slice: self.wait_slice,
            clock: self.clock.clone(),
        }
    }
}

/// Builder for iterators, cursors and populators.
///
/// # Example
/// ```ignore
/// let iterator = PopulatorBuilder::<u32>::new().name("numbers").iterator();
/// ```
pub struct PopulatorBuilder<T> {
    name: Option<String>,
    idle_timeout: Duration,
    wait_slice: Duration,
    filter: Option<ItemFilter<T>>,
    runner: Option<Arc<dyn TaskRunner>>,
    clock: Option<Arc<dyn Clock>>,
}

impl<T> Default for PopulatorBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PopulatorBuilder<T> {
    /// Creates a builder with the default settings.
    ///
    /// Defaults: ten minute idle timeout, one second wait slice, a
    /// [`ThreadRunner`] and the [`MonotonicClock`].
    pub fn new() -> Self {
        Self {
            name: None,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            wait_slice: DEFAULT_WAIT_SLICE,
            filter: None,
            runner: None,
            clock: None,
        }
    }

    /// Sets the diagnostic name used in errors, logs and thread names.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the longest tolerated producer silence before consumers fail.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets how long a blocked consumer sleeps before re-evaluating on its own.
    pub fn wait_slice(mut self, slice: Duration) -> Self {
        self.wait_slice = slice;
        self
    }

    /// Installs an item filter. Only iterators honor it; cursors carry none.
    pub fn filter(mut self, filter: ItemFilter<T>) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Sets the runner that executes population, mirror and relay jobs.
    pub fn runner(mut self, runner: impl TaskRunner + 'static) -> Self {
        self.runner = Some(Arc::new(runner));
        self
    }

    /// Sets the clock used for idle accounting.
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    fn options(&self) -> StreamOptions {
        let mut options = StreamOptions::named(self.name.as_deref());
        options.idle_timeout = self.idle_timeout;
        options.wait_slice = self.wait_slice;
        if let Some(clock) = &self.clock {
            options.clock = clock.clone();
        }
        options
    }

    fn runner_or_default(&self) -> Arc<dyn TaskRunner> {
        match &self.runner {
            Some(runner) => runner.clone(),
            None => Arc::new(ThreadRunner::new()),
        }
    }

    fn cursor_options(&self) -> StreamOptions {
        if self.filter.is_some() {
            tracing::warn!(
                stream = self.name.as_deref().unwrap_or("<unnamed>"),
                "item filter ignored: cursors do not filter"
            );
        }
        self.options()
    }
}

impl<T: Send + 'static> PopulatorBuilder<T> {
    /// Builds a bare iterator for callers that drive production themselves.
    pub fn iterator(self) -> Jiterator<T> {
        Jiterator::with_options(self.options(), self.filter)
    }

    /// Builds a bare cursor for callers that drive production themselves.
    pub fn cursor(self) -> Cursor<T> {
        Cursor::with_options(self.cursor_options())
    }

    /// Builds a populator that runs `routine` against a fresh iterator.
    ///
    /// # Arguments
    /// * `routine` - Pushes items; returning an error fails the iterator
    ///
    /// # Returns
    /// A populator that has not been submitted yet; call [`Populator::populate`]
    pub fn build<F>(self, routine: F) -> Populator<T>
    where
        F: FnOnce(&Jiterator<T>) -> Result<(), BoxError> + Send + 'static,
    {
        let runner = self.runner_or_default();
        let iterator = Jiterator::with_options(self.options(), self.filter);
        Populator::from_parts(iterator, runner, Box::new(routine))
    }

    /// Builds a populator that runs `routine` against a fresh cursor.
    pub fn build_cursor<F>(self, routine: F) -> CursorPopulator<T>
    where
        F: FnOnce(&Cursor<T>) -> Result<(), BoxError> + Send + 'static,
    {
        let runner = self.runner_or_default();
        let cursor = Cursor::with_options(self.cursor_options());
        CursorPopulator::from_parts(cursor, runner, Box::new(routine))
    }
}

impl<T: Clone + Send + 'static> PopulatorBuilder<T> {
    /// Builds a collection over an externally fed iterator.
    ///
    /// The returned iterator is the producer side; the collection mirrors it.
    pub fn collection(self) -> Result<(Jiterator<T>, JitCollection<T>), crate::JitError> {
        let runner = self.runner_or_default();
        let iterator = Jiterator::with_options(self.options(), self.filter);
        let collection = JitCollection::new(iterator.clone(), runner)?;
        Ok((iterator, collection))
    }
}
