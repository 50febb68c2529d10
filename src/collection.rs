//! Lazily materializing, multiply iterable collection over a [`Jiterator`].
//!
//! A [`JitCollection`] starts a mirror job that drains its source iterator into a
//! backing `Vec` as items arrive. Reads block only as long as they must: `get(3)`
//! returns as soon as four items were mirrored, `contains` as soon as a match
//! shows up, `size` once loading finished (or a size was declared).
//!
//! # Writes while loading
//!
//! Plain appends ([`add`](JitCollection::add), [`add_all`](JitCollection::add_all))
//! made before the mirror finished are parked and appended after the last mirrored
//! item. Positional writes wait until the list reached the position and then apply
//! directly. Once loading finished the collection behaves like an ordinary list.
//!
//! # Iteration
//!
//! [`iter`](JitCollection::iter) over a finished collection walks a snapshot. While
//! loading, it starts a relay job that re-streams the backing list into a fresh
//! [`Jiterator`], so any number of independent iterations can run concurrently
//! with the mirror.
//!
//! # Failure
//!
//! When the source fails, the collection records the [`LoadError`], stops
//! mirroring and counts as finished; every read from then on returns the error.

use crate::builder::StreamOptions;
use crate::error::{JitError, LoadCause, LoadError};
use crate::jiterator::Jiterator;
use crate::runtime::{Monitor, TaskRunner};

use std::collections::HashMap;
use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, MutexGuard};
use std::time::Duration;

struct State<T> {
    items: Vec<T>,
    // Appends made while the mirror is still running.
    parked: Vec<T>,
    complete: bool,
    error: Option<LoadError>,
    declared_size: Option<usize>,
    // Bumped by every positional change so running scans restart.
    generation: u64,
    // Next index of every live relay, keyed by relay id. A missing entry means
    // the relay's consumer is gone.
    relays: HashMap<u64, usize>,
}

impl<T> State<T> {
    fn insert_at(&mut self, index: usize, item: T) {
        self.items.insert(index, item);
        self.generation += 1;
        for next in self.relays.values_mut() {
            if index < *next {
                *next += 1;
            }
        }
    }

    fn remove_at(&mut self, index: usize) -> T {
        let item = self.items.remove(index);
        self.generation += 1;
        for next in self.relays.values_mut() {
            if index < *next {
                *next -= 1;
            }
        }
        item
    }
}

struct Shared<T> {
    options: StreamOptions,
    runner: Arc<dyn TaskRunner>,
    relay_seq: AtomicUsize,
    monitor: Monitor<State<T>>,
}

/// Multi-pass collection view over a stream that is still being produced.
pub struct JitCollection<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for JitCollection<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> fmt::Debug for JitCollection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.monitor.lock();
        f.debug_struct("JitCollection")
            .field("name", &self.shared.options.name)
            .field("loaded", &state.items.len())
            .field("complete", &state.complete)
            .finish_non_exhaustive()
    }
}

// Outcome of a scan step: keep waiting, or done with a value.
enum Scan<R> {
    Pending,
    Done(R),
}

impl<T: Clone + Send + 'static> JitCollection<T> {
    /// Wraps `source` and starts mirroring it on `runner`.
    ///
    /// The collection becomes the sole consumer of `source`.
    ///
    /// # Errors
    /// [`JitError::Submit`] if the runner refused the mirror job; `source` is failed as well.
    pub fn new(source: Jiterator<T>, runner: Arc<dyn TaskRunner>) -> Result<Self, JitError> {
        let options = source.options().clone();
        let collection = Self {
            shared: Arc::new(Shared {
                options,
                runner,
                relay_seq: AtomicUsize::new(0),
                monitor: Monitor::new(State {
                    items: Vec::new(),
                    parked: Vec::new(),
                    complete: false,
                    error: None,
                    declared_size: None,
                    generation: 0,
                    relays: HashMap::new(),
                }),
            }),
        };

        let job_name = format!("mirror-{}", collection.name());
        let mirror = collection.clone();
        let failing = source.clone();
        let submitted = collection
            .shared
            .runner
            .submit(&job_name, Box::new(move || mirror.mirror(source)));

        if let Err(err) = submitted {
            failing.set_load_error(LoadCause::Submit(err.to_string()));
            return Err(JitError::Submit(err));
        }

        Ok(collection)
    }

    fn mirror(&self, source: Jiterator<T>) {
        let outcome = loop {
            match source.next_item() {
                Ok(item) => {
                    self.shared.monitor.lock().items.push(item);
                    self.shared.monitor.notify_all();
                }
                Err(JitError::NoSuchElement) => break None,
                Err(JitError::Load(error)) => break Some(error),
                Err(other) => {
                    break Some(LoadError::new(
                        self.shared.options.name.clone(),
                        LoadCause::Producer(Box::new(other)),
                    ));
                }
            }
        };

        let mut state = self.shared.monitor.lock();
        match outcome {
            None => {
                let parked = mem::take(&mut state.parked);
                state.items.extend(parked);
                state.declared_size = None;
                tracing::debug!(
                    stream = %self.name(),
                    items = state.items.len(),
                    "collection mirror complete"
                );
            }
            Some(error) => {
                tracing::warn!(stream = %self.name(), error = %error, "collection mirror failed");
                state.error = Some(error);
            }
        }
        state.complete = true;
        drop(state);
        self.shared.monitor.notify_all();
    }

    /// Returns a blocking iterator over the items.
    ///
    /// Over a finished collection this walks a snapshot. While loading, a relay
    /// job streams the backing list into a fresh iterator as it grows. Positional
    /// writes made meanwhile move the relay along with the items, so nothing is
    /// skipped or repeated. Dropping the iterator stops its relay.
    pub fn iter(&self) -> CollectionIter<T> {
        {
            let state = self.shared.monitor.lock();
            if state.complete {
                return CollectionIter::snapshot(state.items.clone(), state.error.clone());
            }
        }

        let n = self.shared.relay_seq.fetch_add(1, Ordering::Relaxed);
        // Only the source enforces the idle timeout; its failure reaches the relay.
        let mut options = self.shared.options.derive(format!("{}-relay-{n}", self.name()));
        options.idle_timeout = Duration::MAX;
        let relay = Jiterator::with_options(options, None);
        self.shared.monitor.lock().relays.insert(relay.id(), 0);

        let job_name = format!("relay-{}", relay.name());
        let collection = self.clone();
        let target = relay.clone();
        tracing::debug!(stream = %self.name(), relay = %relay.name(), "starting relay");

        if let Err(err) = self
            .shared
            .runner
            .submit(&job_name, Box::new(move || collection.relay(target)))
        {
            self.shared.monitor.lock().relays.remove(&relay.id());
            relay.set_load_error(LoadCause::Submit(err.to_string()));
        }

        CollectionIter::live(relay, self.clone())
    }

    fn relay(&self, target: Jiterator<T>) {
        let id = target.id();

        loop {
            let step = {
                let mut state = self.shared.monitor.lock();
                loop {
                    let len = state.items.len();
                    let Some(next) = state.relays.get_mut(&id) else {
                        break Relay::Abandoned;
                    };
                    if *next < len {
                        let index = *next;
                        *next += 1;
                        break Relay::Item(state.items[index].clone());
                    }
                    if let Some(error) = &state.error {
                        break Relay::Failed(error.clone());
                    }
                    if state.complete {
                        break Relay::Done;
                    }
                    state = self.shared.monitor.wait(state, self.shared.options.wait_slice);
                }
            };

            let streaming = match step {
                // A failed push means the relay consumer side already failed.
                Relay::Item(item) => target.push(item).is_ok(),
                Relay::Failed(error) => {
                    target.propagate(&error);
                    false
                }
                Relay::Done => {
                    target.complete();
                    false
                }
                Relay::Abandoned => {
                    tracing::debug!(relay = %target.name(), "relay consumer dropped");
                    false
                }
            };

            if !streaming {
                break;
            }
        }

        self.shared.monitor.lock().relays.remove(&id);
    }
}

enum Relay<T> {
    Item(T),
    Failed(LoadError),
    Done,
    Abandoned,
}

impl<T> JitCollection<T> {
    /// Diagnostic name, shared with the source iterator.
    pub fn name(&self) -> &str {
        &self.shared.options.name
    }

    /// Number of live iterations whose relay is still streaming.
    pub fn active_relays(&self) -> usize {
        self.shared.monitor.lock().relays.len()
    }

    // Detaches a relay whose consumer went away and wakes it so it can exit.
    fn release_relay(&self, id: u64) {
        self.shared.monitor.lock().relays.remove(&id);
        self.shared.monitor.notify_all();
    }

    /// True once the mirror finished, successfully or not.
    pub fn is_complete(&self) -> bool {
        self.shared.monitor.lock().complete
    }

    /// Number of items mirrored so far, without blocking.
    pub fn loaded_len(&self) -> usize {
        self.shared.monitor.lock().items.len()
    }

    /// Blocks until the mirror finished.
    ///
    /// # Errors
    /// The recorded [`LoadError`] if the source failed.
    pub fn wait_complete(&self) -> Result<(), LoadError> {
        self.wait_for(|state| state.complete.then_some(()))
    }

    /// Declares the expected total so [`size`](Self::size) can answer before loading
    /// finished. Later declarations replace earlier ones; the real count wins once
    /// loading completes.
    pub fn set_size(&self, size: usize) {
        let mut state = self.shared.monitor.lock();
        if !state.complete {
            state.declared_size = Some(size);
        }
        drop(state);
        self.shared.monitor.notify_all();
    }

    /// Number of items.
    ///
    /// Blocks until loading finished, unless a positive size was declared.
    pub fn size(&self) -> Result<usize, LoadError> {
        self.wait_for(|state| {
            if state.complete {
                Some(state.items.len())
            } else {
                state.declared_size.filter(|&size| size > 0)
            }
        })
    }

    /// True if the collection holds no items; blocks until the first item or completion.
    pub fn is_empty(&self) -> Result<bool, LoadError> {
        self.wait_for(|state| {
            if !state.items.is_empty() {
                Some(false)
            } else if state.complete {
                Some(true)
            } else {
                None
            }
        })
    }

    /// Appends an item, after the mirrored items if loading is still running.
    pub fn add(&self, item: T) {
        let mut state = self.shared.monitor.lock();
        if state.complete {
            state.items.push(item);
        } else {
            state.parked.push(item);
        }
        drop(state);
        self.shared.monitor.notify_all();
    }

    /// Appends every item of `items`, see [`add`](Self::add).
    pub fn add_all<I: IntoIterator<Item = T>>(&self, items: I) {
        let mut state = self.shared.monitor.lock();
        if state.complete {
            state.items.extend(items);
        } else {
            state.parked.extend(items);
        }
        drop(state);
        self.shared.monitor.notify_all();
    }

    /// Inserts at `index`, shifting later items; waits until the list reached `index`.
    ///
    /// # Errors
    /// [`JitError::IndexOutOfBounds`] if the finished list is shorter than `index`.
    pub fn insert(&self, index: usize, item: T) -> Result<(), JitError> {
        let mut item = Some(item);
        self.wait_for(|state| {
            if index <= state.items.len() {
                if let Some(item) = item.take() {
                    state.insert_at(index, item);
                }
                Some(Ok(()))
            } else if state.complete {
                Some(Err(out_of_bounds(index, state)))
            } else {
                None
            }
        })?
    }

    /// Removes and returns the item at `index`; waits until it was mirrored.
    ///
    /// # Errors
    /// [`JitError::IndexOutOfBounds`] if the finished list is too short.
    pub fn remove_at(&self, index: usize) -> Result<T, JitError> {
        self.wait_for(|state| {
            if index < state.items.len() {
                Some(Ok(state.remove_at(index)))
            } else if state.complete {
                Some(Err(out_of_bounds(index, state)))
            } else {
                None
            }
        })?
    }

    /// Removes every item once loading finished.
    ///
    /// Clearing earlier would race with the mirror, so this waits for completion.
    pub fn clear(&self) -> Result<(), LoadError> {
        self.wait_for(|state| {
            if state.complete {
                state.items.clear();
                state.generation += 1;
                state.relays.values_mut().for_each(|next| *next = 0);
                Some(())
            } else {
                None
            }
        })
    }

    // Blocks until `ready` produces a value or the collection failed.
    fn wait_for<R>(&self, mut ready: impl FnMut(&mut State<T>) -> Option<R>) -> Result<R, LoadError> {
        let mut state = self.shared.monitor.lock();

        let result = loop {
            if let Some(error) = &state.error {
                break Err(error.clone());
            }
            if let Some(value) = ready(&mut *state) {
                break Ok(value);
            }
            state = self.wait(state);
        };

        drop(state);
        self.shared.monitor.notify_all();
        result
    }

    fn wait<'a>(&'a self, state: MutexGuard<'a, State<T>>) -> MutexGuard<'a, State<T>> {
        tracing::trace!(
            stream = %self.shared.options.name,
            loaded = state.items.len(),
            "waiting for mirror"
        );
        self.shared.monitor.wait(state, self.shared.options.wait_slice)
    }

    // Walks items as they arrive until `matches` hits or loading finished.
    fn scan<R>(
        &self,
        mut step: impl FnMut(&mut State<T>, usize) -> Scan<R>,
        exhausted: R,
    ) -> Result<R, LoadError> {
        let mut scanned = 0;
        let mut generation = None;
        let mut exhausted = Some(exhausted);

        self.wait_for(|state| {
            if generation != Some(state.generation) {
                generation = Some(state.generation);
                scanned = 0;
            }

            while scanned < state.items.len() {
                if let Scan::Done(found) = step(state, scanned) {
                    return Some(found);
                }
                scanned += 1;
            }

            if state.complete { exhausted.take() } else { None }
        })
    }
}

impl<T: Clone> JitCollection<T> {
    /// The item at `index`; waits until it was mirrored.
    ///
    /// # Errors
    /// [`JitError::IndexOutOfBounds`] if the finished list is too short.
    pub fn get(&self, index: usize) -> Result<T, JitError> {
        self.wait_for(|state| {
            if index < state.items.len() {
                Some(Ok(state.items[index].clone()))
            } else if state.complete {
                Some(Err(out_of_bounds(index, state)))
            } else {
                None
            }
        })?
    }

    /// Replaces the item at `index`, returning the old one; waits until it was mirrored.
    ///
    /// # Errors
    /// [`JitError::IndexOutOfBounds`] if the finished list is too short.
    pub fn set(&self, index: usize, item: T) -> Result<T, JitError> {
        self.wait_for(|state| {
            if index < state.items.len() {
                Some(Ok(mem::replace(&mut state.items[index], item.clone())))
            } else if state.complete {
                Some(Err(out_of_bounds(index, state)))
            } else {
                None
            }
        })?
    }

    /// Copies every item out once loading finished.
    pub fn to_vec(&self) -> Result<Vec<T>, LoadError> {
        self.wait_for(|state| state.complete.then(|| state.items.clone()))
    }
}

impl<T: PartialEq> JitCollection<T> {
    /// True once an equal item shows up; false if loading finished without one.
    pub fn contains(&self, item: &T) -> Result<bool, LoadError> {
        self.scan(
            |state, i| {
                if state.items[i] == *item {
                    Scan::Done(true)
                } else {
                    Scan::Pending
                }
            },
            false,
        )
    }

    /// True if every item of `items` is (or becomes) present.
    pub fn contains_all(&self, items: &[T]) -> Result<bool, LoadError> {
        for item in items {
            if !self.contains(item)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Position of the first equal item, as soon as it is known.
    pub fn index_of(&self, item: &T) -> Result<Option<usize>, LoadError> {
        self.scan(
            |state, i| {
                if state.items[i] == *item {
                    Scan::Done(Some(i))
                } else {
                    Scan::Pending
                }
            },
            None,
        )
    }

    /// Position of the last equal item; waits for loading to finish.
    pub fn last_index_of(&self, item: &T) -> Result<Option<usize>, LoadError> {
        self.wait_for(|state| {
            state
                .complete
                .then(|| state.items.iter().rposition(|candidate| candidate == item))
        })
    }

    /// Removes the first equal item, as soon as one is mirrored.
    ///
    /// # Returns
    /// `Ok(false)` if loading finished without a match
    pub fn remove_item(&self, item: &T) -> Result<bool, LoadError> {
        self.scan(
            |state, i| {
                if state.items[i] == *item {
                    state.remove_at(i);
                    Scan::Done(true)
                } else {
                    Scan::Pending
                }
            },
            false,
        )
    }
}

fn out_of_bounds<T>(index: usize, state: &State<T>) -> JitError {
    JitError::IndexOutOfBounds {
        index,
        len: state.items.len(),
    }
}

impl<T: Clone + Send + 'static> IntoIterator for &JitCollection<T> {
    type Item = Result<T, LoadError>;
    type IntoIter = CollectionIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator returned by [`JitCollection::iter`].
///
/// Yields items in list order, then the load error once if loading failed.
pub struct CollectionIter<T> {
    source: Source<T>,
}

enum Source<T> {
    Snapshot {
        items: std::vec::IntoIter<T>,
        error: Option<LoadError>,
    },
    Live {
        relay: Jiterator<T>,
        collection: JitCollection<T>,
    },
}

impl<T> CollectionIter<T> {
    fn snapshot(items: Vec<T>, error: Option<LoadError>) -> Self {
        Self {
            source: Source::Snapshot {
                items: items.into_iter(),
                error,
            },
        }
    }

    fn live(relay: Jiterator<T>, collection: JitCollection<T>) -> Self {
        Self {
            source: Source::Live { relay, collection },
        }
    }
}

impl<T> fmt::Debug for CollectionIter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Source::Snapshot { items, .. } => f
                .debug_struct("CollectionIter")
                .field("remaining", &items.len())
                .finish(),
            Source::Live { relay, .. } => f.debug_struct("CollectionIter").field("relay", relay).finish(),
        }
    }
}

impl<T> Iterator for CollectionIter<T> {
    type Item = Result<T, LoadError>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.source {
            // A failed collection reports the error before anything else.
            Source::Snapshot { items, error } => match error.take() {
                Some(error) => {
                    items.by_ref().for_each(drop);
                    Some(Err(error))
                }
                None => items.next().map(Ok),
            },
            Source::Live { relay, .. } => relay.next(),
        }
    }
}

impl<T> Drop for CollectionIter<T> {
    fn drop(&mut self) {
        if let Source::Live { relay, collection } = &self.source {
            collection.release_relay(relay.id());
        }
    }
}
