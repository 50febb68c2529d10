//! Blocking single-consumer handoff iterator.
//!
//! A [`Jiterator`] is filled by one producer through [`Jiterator::push`] and drained
//! by one consumer through [`Jiterator::has_next`] / [`Jiterator::next_item`] or the
//! [`Iterator`] impl. Reads block until an item is available, the producer calls
//! [`Jiterator::complete`], or the stream fails.
//!
//! # Lifecycle
//!
//! 1. Created empty, usually by a [`Populator`](crate::Populator)
//! 2. Zero or more pushes from a single producer
//! 3. Exactly one terminal signal: [`complete`](Jiterator::complete) or
//!    [`set_load_error`](Jiterator::set_load_error)
//! 4. Drained by its consumer
//!
//! # Failure
//!
//! A failure discards items that were pushed but not yet consumed; from then on
//! every read returns the same [`LoadError`]. A producer silent for longer than
//! the idle timeout fails the stream the same way, so a stalled producer turns
//! into an error instead of a hang.
//!
//! # Example
//!
//! ```ignore
//! use jitstream::Jiterator;
//!
//! let it = Jiterator::new("digits");
//! let producer = it.clone();
//! std::thread::spawn(move || {
//!     for d in 0..10 {
//!         producer.push(d).unwrap();
//!     }
//!     producer.complete();
//! });
//!
//! let digits: Result<Vec<_>, _> = it.collect();
//! assert_eq!(digits.unwrap(), (0..10).collect::<Vec<_>>());
//! ```

use crate::builder::StreamOptions;
use crate::error::{BoxError, JitError, LoadCause, LoadError};
use crate::filter::ItemFilter;
use crate::runtime::Monitor;
use crate::time::IdleDeadline;

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, MutexGuard};
use std::time::Duration;

struct State<T> {
    pending: VecDeque<T>,
    loaded: bool,
    error: Option<LoadError>,
    idle: IdleDeadline,
    // A consumer is between entering and leaving a read.
    busy: bool,
}

struct Shared<T> {
    options: StreamOptions,
    filter: Option<ItemFilter<T>>,
    monitor: Monitor<State<T>>,
}

/// Thread-safe, single-pass, blocking handoff iterator.
///
/// Handles are cheap to clone and all clones share one stream: typically the
/// producer keeps one and the consumer iterates another.
pub struct Jiterator<T> {
    shared: Arc<Shared<T>>,
    // Set once this handle has yielded the load error through `Iterator::next`.
    fused: bool,
}

impl<T> Clone for Jiterator<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            fused: false,
        }
    }
}

impl<T> fmt::Debug for Jiterator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Jiterator")
            .field("id", &self.shared.options.id)
            .field("name", &self.shared.options.name)
            .finish_non_exhaustive()
    }
}

impl<T> Jiterator<T> {
    /// Creates an empty iterator with the default idle timeout and no filter.
    pub fn new(name: &str) -> Self {
        Self::with_options(StreamOptions::named(Some(name)), None)
    }

    pub(crate) fn with_options(options: StreamOptions, filter: Option<ItemFilter<T>>) -> Self {
        let idle = IdleDeadline::new(options.idle_timeout, options.clock.now());

        Self {
            shared: Arc::new(Shared {
                options,
                filter,
                monitor: Monitor::new(State {
                    pending: VecDeque::new(),
                    loaded: false,
                    error: None,
                    idle,
                    busy: false,
                }),
            }),
            fused: false,
        }
    }

    pub(crate) fn options(&self) -> &StreamOptions {
        &self.shared.options
    }

    /// Process-unique id.
    pub fn id(&self) -> u64 {
        self.shared.options.id
    }

    /// Diagnostic name.
    pub fn name(&self) -> &str {
        &self.shared.options.name
    }

    /// Configured idle timeout.
    pub fn idle_timeout(&self) -> Duration {
        self.shared.options.idle_timeout
    }

    /// True once the producer completed successfully.
    pub fn is_loaded(&self) -> bool {
        self.shared.monitor.lock().loaded
    }

    /// True once the stream failed.
    pub fn is_failed(&self) -> bool {
        self.shared.monitor.lock().error.is_some()
    }

    /// The recorded failure, if any.
    pub fn load_error(&self) -> Option<LoadError> {
        self.shared.monitor.lock().error.clone()
    }

    /// Items pushed but not consumed yet.
    pub fn pending_len(&self) -> usize {
        self.shared.monitor.lock().pending.len()
    }

    /// Appends an item for the consumer.
    ///
    /// The filter, if any, runs first: a rejected item is dropped silently, a
    /// filter error fails the stream and is returned.
    ///
    /// # Errors
    /// [`JitError::Closed`] if the stream was already completed or failed,
    /// [`JitError::Load`] if the filter failed.
    pub fn push(&self, item: T) -> Result<(), JitError> {
        self.ensure_open(&self.shared.monitor.lock())?;

        let admitted = match &self.shared.filter {
            Some(filter) => filter.admit(&item),
            None => Ok(true),
        };

        let mut state = self.shared.monitor.lock();
        match admitted {
            Ok(admitted) => {
                self.ensure_open(&state)?;
                if admitted {
                    state.pending.push_back(item);
                }
                let now = self.shared.options.clock.now();
                state.idle.touch(now);
            }
            Err(err) => {
                let error = self.record_failure(&mut state, LoadCause::Filter(err));
                drop(state);
                self.shared.monitor.notify_all();
                return Err(match error {
                    Some(error) => JitError::Load(error),
                    None => self.closed_error(true),
                });
            }
        }

        drop(state);
        self.shared.monitor.notify_all();
        Ok(())
    }

    /// Marks the stream as fully produced. A second call, or a call after a
    /// failure, does nothing.
    pub fn complete(&self) {
        let mut state = self.shared.monitor.lock();
        if state.loaded || state.error.is_some() {
            tracing::debug!(stream = %self.name(), "complete ignored: stream already terminated");
            return;
        }

        state.loaded = true;
        drop(state);

        tracing::debug!(stream = %self.name(), id = self.id(), "stream complete");
        self.shared.monitor.notify_all();
    }

    /// Fails the stream with `cause`, discarding unconsumed items.
    ///
    /// The first failure wins; failures after completion are ignored.
    pub fn set_load_error(&self, cause: LoadCause) {
        let mut state = self.shared.monitor.lock();
        self.record_failure(&mut state, cause);
        drop(state);
        self.shared.monitor.notify_all();
    }

    /// Fails the stream with a producer error.
    pub fn fail(&self, err: impl Into<BoxError>) {
        self.set_load_error(LoadCause::Producer(err.into()));
    }

    /// Fails the stream with a cause already recorded elsewhere.
    pub(crate) fn propagate(&self, error: &LoadError) {
        let mut state = self.shared.monitor.lock();
        if state.loaded || state.error.is_some() {
            return;
        }
        state.pending.clear();
        state.error = Some(error.renamed(self.shared.options.name.clone()));
        drop(state);
        self.shared.monitor.notify_all();
    }

    /// Blocks until an item is available or the stream ended.
    ///
    /// # Returns
    /// `Ok(true)` if [`next_item`](Self::next_item) will return an item, `Ok(false)` once exhausted
    ///
    /// # Errors
    /// The recorded [`LoadError`], on every call after a failure.
    pub fn has_next(&self) -> Result<bool, LoadError> {
        self.consume(|state| !state.pending.is_empty())
    }

    /// Blocks for the next item.
    ///
    /// # Errors
    /// [`JitError::Load`] after a failure, [`JitError::NoSuchElement`] once exhausted.
    pub fn next_item(&self) -> Result<T, JitError> {
        self.consume(|state| state.pending.pop_front())?
            .ok_or(JitError::NoSuchElement)
    }

    /// Removal is not supported on a single-pass stream.
    pub fn remove(&self) -> Result<(), JitError> {
        Err(JitError::Unsupported("remove on a single-pass iterator"))
    }

    // Runs `read` once data is available, holding the consumer slot meanwhile.
    fn consume<R>(&self, read: impl FnOnce(&mut State<T>) -> R) -> Result<R, LoadError> {
        let monitor = &self.shared.monitor;

        let mut state = monitor.lock();
        while state.busy {
            state = monitor.wait(state, self.shared.options.wait_slice);
        }
        state.busy = true;

        let mut state = self.wait_for_push(state);
        state.busy = false;

        let result = match &state.error {
            Some(error) => Err(error.clone()),
            None => Ok(read(&mut *state)),
        };

        drop(state);
        monitor.notify_all();
        result
    }

    fn wait_for_push<'a>(&'a self, mut state: MutexGuard<'a, State<T>>) -> MutexGuard<'a, State<T>> {
        let options = &self.shared.options;

        loop {
            if !state.pending.is_empty() || state.loaded || state.error.is_some() {
                return state;
            }

            let now = options.clock.now();
            match state.idle.next_wait(now, options.wait_slice) {
                Some(wait) => {
                    tracing::trace!(
                        stream = %options.name,
                        idle_for = ?state.idle.idle_for(now),
                        "waiting for push"
                    );
                    state = self.shared.monitor.wait(state, wait);
                }
                None => {
                    let idle = state.idle.timeout();
                    self.record_failure(&mut state, LoadCause::IdleTimeout { idle });
                }
            }
        }
    }

    fn record_failure(&self, state: &mut State<T>, cause: LoadCause) -> Option<LoadError> {
        if let Some(existing) = &state.error {
            tracing::debug!(stream = %self.name(), ignored = %cause, "stream already failed");
            return Some(existing.clone());
        }
        if state.loaded {
            tracing::warn!(stream = %self.name(), ignored = %cause, "failure after completion ignored");
            return None;
        }

        let error = LoadError::new(self.shared.options.name.clone(), cause);
        tracing::warn!(stream = %self.name(), id = self.id(), error = %error, "stream failed");

        state.pending.clear();
        state.error = Some(error.clone());
        Some(error)
    }

    fn ensure_open(&self, state: &State<T>) -> Result<(), JitError> {
        if state.error.is_some() {
            Err(self.closed_error(false))
        } else if state.loaded {
            Err(self.closed_error(true))
        } else {
            Ok(())
        }
    }

    fn closed_error(&self, loaded: bool) -> JitError {
        JitError::Closed {
            name: self.name().to_owned(),
            state: if loaded { "complete" } else { "failed" },
        }
    }
}

impl<T> Iterator for Jiterator<T> {
    type Item = Result<T, LoadError>;

    /// Yields items in push order, then the load error once if the stream failed.
    fn next(&mut self) -> Option<Self::Item> {
        if self.fused {
            return None;
        }

        match self.next_item() {
            Ok(item) => Some(Ok(item)),
            Err(JitError::Load(error)) => {
                self.fused = true;
                Some(Err(error))
            }
            Err(_) => None,
        }
    }
}
