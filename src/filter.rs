//! Item admission predicates evaluated inside the producer's push.

use std::fmt;
use std::sync::Arc;

use crate::error::BoxError;

/// Decides whether a pushed item enters a [`Jiterator`](crate::Jiterator).
///
/// `Ok(false)` silently drops the item; an error fails the whole stream with
/// [`LoadCause::Filter`](crate::LoadCause::Filter).
pub struct ItemFilter<T> {
    predicate: Arc<dyn Fn(&T) -> Result<bool, BoxError> + Send + Sync>,
}

impl<T> ItemFilter<T> {
    /// Wraps a fallible predicate.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&T) -> Result<bool, BoxError> + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
        }
    }

    /// Wraps a predicate that cannot fail.
    pub fn infallible<F>(predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self::new(move |item| Ok(predicate(item)))
    }

    pub(crate) fn admit(&self, item: &T) -> Result<bool, BoxError> {
        (self.predicate)(item)
    }
}

impl<T> Clone for ItemFilter<T> {
    fn clone(&self) -> Self {
        Self {
            predicate: self.predicate.clone(),
        }
    }
}

impl<T> fmt::Debug for ItemFilter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ItemFilter")
    }
}
