#![allow(dead_code)]

use jitstream::runtime::{Job, TaskRunner, ThreadRunner};

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

static TRACING: Once = Once::new();

/// Installs a test-friendly subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// `["0", "1", ..., "9"]`.
pub fn digits() -> Vec<String> {
    (0..10).map(|i| i.to_string()).collect()
}

/// Runner that refuses every job.
#[derive(Debug, Default)]
pub struct RefusingRunner;

impl TaskRunner for RefusingRunner {
    fn submit(&self, _name: &str, _job: Job) -> io::Result<()> {
        Err(io::Error::other("runner is shut down"))
    }
}

/// Thread runner that counts submitted and finished jobs.
#[derive(Clone, Debug, Default)]
pub struct CountingRunner {
    pub submitted: Arc<AtomicUsize>,
    pub finished: Arc<AtomicUsize>,
}

impl CountingRunner {
    pub fn count(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

impl TaskRunner for CountingRunner {
    fn submit(&self, name: &str, job: Job) -> io::Result<()> {
        self.submitted.fetch_add(1, Ordering::SeqCst);
        let finished = self.finished.clone();
        ThreadRunner::new().submit(
            name,
            Box::new(move || {
                job();
                finished.fetch_add(1, Ordering::SeqCst);
            }),
        )
    }
}
