//! Populators: the entry point tying a routine, a stream and a runner together.
//!
//! A populator is built with a routine, submitted once with `populate()`, and
//! hands out the consumer side immediately, before any item exists:
//!
//! - [`Populator::iterator`] for single-pass reading
//! - [`Populator::result`] for a [`JitCollection`] that can be read many times
//! - [`CursorPopulator::cursor`] for the lean single-use cursor
//!
//! Pick one consumer side per populator: the collection drains the iterator
//! itself, so reading the iterator directly as well would split the items.
//!
//! # Example
//!
//! ```ignore
//! use jitstream::Populator;
//!
//! let populator = Populator::new(|it| {
//!     for i in 0..10 {
//!         it.push(i.to_string())?;
//!     }
//!     Ok(())
//! });
//! populator.populate()?;
//!
//! let names = populator.result()?;
//! assert_eq!(names.size()?, 10);
//! ```

use crate::builder::PopulatorBuilder;
use crate::collection::JitCollection;
use crate::cursor::Cursor;
use crate::error::{BoxError, JitError};
use crate::jiterator::Jiterator;
use crate::runtime::TaskRunner;
use crate::task::{PopulationTask, Routine};

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Populates a [`Jiterator`] in the background.
pub struct Populator<T: Send + 'static> {
    iterator: Jiterator<T>,
    runner: Arc<dyn TaskRunner>,
    task: Mutex<Option<PopulationTask<Jiterator<T>>>>,
    collection: Mutex<Option<JitCollection<T>>>,
}

impl<T: Send + 'static> fmt::Debug for Populator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let submitted = self.task.lock().unwrap_or_else(PoisonError::into_inner).is_none();
        f.debug_struct("Populator")
            .field("iterator", &self.iterator)
            .field("submitted", &submitted)
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> Populator<T> {
    /// Creates a populator with default settings.
    pub fn new<F>(routine: F) -> Self
    where
        F: FnOnce(&Jiterator<T>) -> Result<(), BoxError> + Send + 'static,
    {
        PopulatorBuilder::new().build(routine)
    }

    /// Creates a populator whose consumers fail after `timeout` of producer silence.
    pub fn with_idle_timeout<F>(timeout: Duration, routine: F) -> Self
    where
        F: FnOnce(&Jiterator<T>) -> Result<(), BoxError> + Send + 'static,
    {
        PopulatorBuilder::new().idle_timeout(timeout).build(routine)
    }

    pub(crate) fn from_parts(
        iterator: Jiterator<T>,
        runner: Arc<dyn TaskRunner>,
        routine: Routine<Jiterator<T>>,
    ) -> Self {
        let task = PopulationTask::new(iterator.clone(), routine);

        Self {
            iterator,
            runner,
            task: Mutex::new(Some(task)),
            collection: Mutex::new(None),
        }
    }

    /// Diagnostic name of the populated stream.
    pub fn name(&self) -> &str {
        self.iterator.name()
    }

    /// Submits the routine to the runner.
    ///
    /// # Errors
    /// [`JitError::AlreadyPopulated`] on a second call, [`JitError::Submit`] if the
    /// runner refused the job.
    pub fn populate(&self) -> Result<(), JitError> {
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(JitError::AlreadyPopulated)?;
        task.submit(&*self.runner)
    }

    /// The populated iterator, for single-pass consumption.
    pub fn iterator(&self) -> Jiterator<T> {
        self.iterator.clone()
    }
}

impl<T: Clone + Send + 'static> Populator<T> {
    /// The materializing collection over the populated iterator.
    ///
    /// Created on the first call; later calls return handles to the same collection.
    ///
    /// # Errors
    /// [`JitError::Submit`] if the runner refused the mirror job.
    pub fn result(&self) -> Result<JitCollection<T>, JitError> {
        let mut collection = self.collection.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = collection.as_ref() {
            return Ok(existing.clone());
        }

        let created = JitCollection::new(self.iterator.clone(), self.runner.clone())?;
        *collection = Some(created.clone());
        Ok(created)
    }
}

/// Populates a [`Cursor`] in the background.
pub struct CursorPopulator<T: Send + 'static> {
    cursor: Cursor<T>,
    runner: Arc<dyn TaskRunner>,
    task: Mutex<Option<PopulationTask<Cursor<T>>>>,
}

impl<T: Send + 'static> fmt::Debug for CursorPopulator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let submitted = self.task.lock().unwrap_or_else(PoisonError::into_inner).is_none();
        f.debug_struct("CursorPopulator")
            .field("cursor", &self.cursor)
            .field("submitted", &submitted)
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> CursorPopulator<T> {
    /// Creates a cursor populator with default settings.
    pub fn new<F>(routine: F) -> Self
    where
        F: FnOnce(&Cursor<T>) -> Result<(), BoxError> + Send + 'static,
    {
        PopulatorBuilder::new().build_cursor(routine)
    }

    /// Creates a cursor populator whose consumer fails after `timeout` of producer silence.
    pub fn with_idle_timeout<F>(timeout: Duration, routine: F) -> Self
    where
        F: FnOnce(&Cursor<T>) -> Result<(), BoxError> + Send + 'static,
    {
        PopulatorBuilder::new().idle_timeout(timeout).build_cursor(routine)
    }

    pub(crate) fn from_parts(
        cursor: Cursor<T>,
        runner: Arc<dyn TaskRunner>,
        routine: Routine<Cursor<T>>,
    ) -> Self {
        let task = PopulationTask::new(cursor.clone(), routine);

        Self {
            cursor,
            runner,
            task: Mutex::new(Some(task)),
        }
    }

    /// Diagnostic name of the populated cursor.
    pub fn name(&self) -> &str {
        self.cursor.name()
    }

    /// Submits the routine to the runner.
    ///
    /// # Errors
    /// [`JitError::AlreadyPopulated`] on a second call, [`JitError::Submit`] if the
    /// runner refused the job.
    pub fn populate(&self) -> Result<(), JitError> {
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(JitError::AlreadyPopulated)?;
        task.submit(&*self.runner)
    }

    /// The populated cursor.
    pub fn cursor(&self) -> Cursor<T> {
        self.cursor.clone()
    }
}
