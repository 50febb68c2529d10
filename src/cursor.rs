//! Forward-only, single-use cursor.
//!
//! A [`Cursor`] is the lean sibling of [`Jiterator`](crate::Jiterator) for very large
//! one-shot streams: items live in a singly linked chain, there is no filter, and
//! iterating consumes items for good. Blocking, idle timeout and error replay work
//! as they do for the iterator, with one difference: a failure is queued behind
//! the items already pushed, so the consumer drains those first and then sees the
//! error.
//!
//! [`Cursor::iter`] does not restart anything. Every iterator it returns shares the
//! cursor's head, so a second iteration after exhaustion yields nothing.

use crate::builder::StreamOptions;
use crate::error::{BoxError, JitError, LoadCause, LoadError};
use crate::runtime::Monitor;
use crate::time::IdleDeadline;
use crate::utils::Chain;

use std::fmt;
use std::sync::{Arc, MutexGuard};

enum Link<T> {
    Item(T),
    Failed(LoadError),
}

struct State<T> {
    chain: Chain<Link<T>>,
    loaded: bool,
    error: Option<LoadError>,
    declared_size: Option<usize>,
    pushed: usize,
    idle: IdleDeadline,
    busy: bool,
}

struct Shared<T> {
    options: StreamOptions,
    monitor: Monitor<State<T>>,
}

/// Blocking, forward-only cursor fed by one producer.
pub struct Cursor<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Cursor<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> fmt::Debug for Cursor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("id", &self.shared.options.id)
            .field("name", &self.shared.options.name)
            .finish_non_exhaustive()
    }
}

impl<T> Cursor<T> {
    /// Creates an empty cursor with the default idle timeout.
    pub fn new(name: &str) -> Self {
        Self::with_options(StreamOptions::named(Some(name)))
    }

    pub(crate) fn with_options(options: StreamOptions) -> Self {
        let idle = IdleDeadline::new(options.idle_timeout, options.clock.now());

        Self {
            shared: Arc::new(Shared {
                options,
                monitor: Monitor::new(State {
                    chain: Chain::new(),
                    loaded: false,
                    error: None,
                    declared_size: None,
                    pushed: 0,
                    idle,
                    busy: false,
                }),
            }),
        }
    }

    /// Process-unique id.
    pub fn id(&self) -> u64 {
        self.shared.options.id
    }

    /// Diagnostic name.
    pub fn name(&self) -> &str {
        &self.shared.options.name
    }

    /// True once the producer completed successfully.
    pub fn is_loaded(&self) -> bool {
        self.shared.monitor.lock().loaded
    }

    /// Number of items pushed so far.
    pub fn pushed_count(&self) -> usize {
        self.shared.monitor.lock().pushed
    }

    /// Items pushed but not consumed yet.
    pub fn pending_len(&self) -> usize {
        self.shared.monitor.lock().chain.len()
    }

    /// Declares the expected total. Only the first declaration sticks.
    ///
    /// # Returns
    /// `true` if this call set the size
    pub fn set_size(&self, size: usize) -> bool {
        let mut state = self.shared.monitor.lock();
        if state.declared_size.is_some() {
            return false;
        }
        state.declared_size = Some(size);
        true
    }

    /// The declared size, or the observed count once loading completed.
    pub fn size(&self) -> Option<usize> {
        let state = self.shared.monitor.lock();
        match state.declared_size {
            Some(size) => Some(size),
            None if state.loaded => Some(state.pushed),
            None => None,
        }
    }

    /// Appends an item.
    ///
    /// # Errors
    /// [`JitError::Closed`] once the cursor was completed or failed.
    pub fn push(&self, item: T) -> Result<(), JitError> {
        let mut state = self.shared.monitor.lock();
        if state.error.is_some() || state.loaded {
            return Err(JitError::Closed {
                name: self.name().to_owned(),
                state: if state.loaded { "complete" } else { "failed" },
            });
        }

        state.chain.push_back(Link::Item(item));
        state.pushed += 1;
        let now = self.shared.options.clock.now();
        state.idle.touch(now);

        drop(state);
        self.shared.monitor.notify_all();
        Ok(())
    }

    /// Marks the cursor fully produced. Repeated calls do nothing.
    pub fn complete(&self) {
        let mut state = self.shared.monitor.lock();
        if state.loaded || state.error.is_some() {
            return;
        }
        state.loaded = true;
        drop(state);

        tracing::debug!(stream = %self.name(), id = self.id(), "cursor complete");
        self.shared.monitor.notify_all();
    }

    /// Fails the cursor. The first failure wins; failures after completion are ignored.
    pub fn set_load_error(&self, cause: LoadCause) {
        let mut state = self.shared.monitor.lock();
        self.record_failure(&mut state, cause);
        drop(state);
        self.shared.monitor.notify_all();
    }

    /// Fails the cursor with a producer error.
    pub fn fail(&self, err: impl Into<BoxError>) {
        self.set_load_error(LoadCause::Producer(err.into()));
    }

    /// Blocks until an item is available or the cursor ended.
    ///
    /// # Errors
    /// The recorded [`LoadError`] once every item pushed before the failure was consumed.
    pub fn has_next(&self) -> Result<bool, LoadError> {
        self.consume(|state| match state.chain.front() {
            Some(Link::Item(_)) => Ok(true),
            Some(Link::Failed(error)) => Err(error.clone()),
            None => match &state.error {
                Some(error) => Err(error.clone()),
                None => Ok(false),
            },
        })
    }

    /// Blocks for the next item, consuming it.
    ///
    /// # Errors
    /// [`JitError::Load`] after a failure, [`JitError::NoSuchElement`] once exhausted.
    pub fn next_item(&self) -> Result<T, JitError> {
        let link = self.consume(|state| match state.chain.pop_front() {
            Some(link) => Ok(Some(link)),
            None => match &state.error {
                Some(error) => Err(error.clone()),
                None => Ok(None),
            },
        })?;

        match link {
            Some(Link::Item(item)) => Ok(item),
            Some(Link::Failed(error)) => Err(JitError::Load(error)),
            None => Err(JitError::NoSuchElement),
        }
    }

    /// Returns an iterator over the remaining items.
    ///
    /// Items are consumed from the cursor itself: once one iterator ran to the
    /// end, later iterators yield nothing.
    pub fn iter(&self) -> CursorIter<T> {
        CursorIter {
            cursor: self.clone(),
            fused: false,
        }
    }

    fn consume<R>(
        &self,
        read: impl FnOnce(&mut State<T>) -> Result<R, LoadError>,
    ) -> Result<R, LoadError> {
        let monitor = &self.shared.monitor;

        let mut state = monitor.lock();
        while state.busy {
            state = monitor.wait(state, self.shared.options.wait_slice);
        }
        state.busy = true;

        let mut state = self.wait_for_push(state);
        state.busy = false;
        let result = read(&mut *state);

        drop(state);
        monitor.notify_all();
        result
    }

    fn wait_for_push<'a>(&'a self, mut state: MutexGuard<'a, State<T>>) -> MutexGuard<'a, State<T>> {
        let options = &self.shared.options;

        loop {
            if !state.chain.is_empty() || state.loaded || state.error.is_some() {
                return state;
            }

            let now = options.clock.now();
            match state.idle.next_wait(now, options.wait_slice) {
                Some(wait) => {
                    tracing::trace!(
                        stream = %options.name,
                        idle_for = ?state.idle.idle_for(now),
                        "cursor waiting for push"
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

    fn record_failure(&self, state: &mut State<T>, cause: LoadCause) {
        if state.error.is_some() {
            tracing::debug!(stream = %self.name(), ignored = %cause, "cursor already failed");
            return;
        }
        if state.loaded {
            tracing::warn!(stream = %self.name(), ignored = %cause, "failure after completion ignored");
            return;
        }

        let error = LoadError::new(self.shared.options.name.clone(), cause);
        tracing::warn!(stream = %self.name(), id = self.id(), error = %error, "cursor failed");

        state.chain.push_back(Link::Failed(error.clone()));
        state.error = Some(error);
    }
}

impl<T> IntoIterator for &Cursor<T> {
    type Item = Result<T, LoadError>;
    type IntoIter = CursorIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator sharing a [`Cursor`]'s head.
///
/// Yields items in push order, then the load error once if the cursor failed.
#[derive(Debug)]
pub struct CursorIter<T> {
    cursor: Cursor<T>,
    fused: bool,
}

impl<T> Iterator for CursorIter<T> {
    type Item = Result<T, LoadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.fused {
            return None;
        }

        match self.cursor.next_item() {
            Ok(item) => Some(Ok(item)),
            Err(JitError::Load(error)) => {
                self.fused = true;
                Some(Err(error))
            }
            Err(_) => None,
        }
    }
}
