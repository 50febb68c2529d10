//! Just-in-time iteration: consume a sequence while another thread still produces it.
//!
//! This crate bridges one producer and its consumers without making the consumer
//! wait for the whole sequence and without making the producer hold it all in
//! memory. A population routine runs in the background and pushes items; the
//! caller gets the consumer side immediately and reads as items arrive.
//!
//! # Architecture
//!
//! - **TaskRunner**: Fire-and-forget job submission; [`runtime::ThreadRunner`] by default
//! - **Jiterator**: Blocking single-consumer handoff iterator with an optional item filter
//! - **PopulationTask**: Runs a routine and terminates its stream exactly once
//! - **JitCollection**: Mirrors a Jiterator into a list for random access and repeated iteration
//! - **Cursor**: Lean forward-only alternative to the Jiterator for large one-shot streams
//! - **PopulatorBuilder**: Fluent configuration of names, idle timeouts, filters and runners
//!
//! # Blocking and failure
//!
//! Reads block until data arrives, the producer completes, or the stream fails.
//! A failure (routine error, panic, filter error, or producer silence beyond the
//! idle timeout) is recorded once as a [`LoadError`] and returned by every read
//! from then on. Nothing is retried.
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
//! for item in populator.iterator() {
//!     println!("{}", item?);
//! }
//! ```

mod builder;
mod collection;
mod cursor;
mod error;
mod filter;
mod jiterator;
mod populator;
pub mod runtime;
pub mod task;
pub mod time;
mod utils;

pub use builder::PopulatorBuilder;
pub use collection::{CollectionIter, JitCollection};
pub use cursor::{Cursor, CursorIter};
pub use error::{BoxError, JitError, LoadCause, LoadError};
pub use filter::ItemFilter;
pub use jiterator::Jiterator;
pub use populator::{CursorPopulator, Populator};
