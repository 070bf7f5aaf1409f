//! Background worker supervision.
//!
//! Two spawn modes: one-shot workers count toward the shutdown drain
//! barrier; persistent workers loop forever on their own schedule and are
//! abandoned at process exit. Both run under panic containment: a worker
//! failure is logged under the worker's name and never takes down the
//! process or another worker. Workers communicate failure only through
//! logging; nothing consumes a return value.

use futures_util::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tokio::time::Instant;
use tokio_util::task::TaskTracker;
use tracing::Instrument;

#[derive(Clone, Default)]
pub struct Supervisor {
    tracker: TaskTracker,
}

impl Supervisor {
    pub fn new() -> Self {
        Self {
            tracker: TaskTracker::new(),
        }
    }

    /// Spawn a one-shot worker. Tracked by the drain barrier: shutdown
    /// will not complete until it finishes.
    pub fn in_background<F>(&self, name: &'static str, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tracker.spawn(run_worker(name, false, work));
    }

    /// Spawn a persistent worker. Not tracked: it never finishes and is
    /// not waited on at shutdown.
    pub fn start_process<F>(&self, name: &'static str, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(run_worker(name, true, work));
    }

    /// Outstanding one-shot workers.
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Close the drain barrier and block until every outstanding one-shot
    /// worker has completed.
    pub async fn wait(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}

async fn run_worker<F>(name: &'static str, persistent: bool, work: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    let start = Instant::now();

    let span = tracing::info_span!("background_task", name);
    let result = AssertUnwindSafe(work.instrument(span)).catch_unwind().await;

    let elapsed = start.elapsed();
    match result {
        Ok(()) => {
            tracing::info!(name, persistent, ?elapsed, "Ran background task");
        }
        Err(panic) => {
            tracing::error!(
                name,
                persistent,
                ?elapsed,
                panic = %panic_message(&panic),
                "Background task panicked"
            );
        }
    }
}

fn panic_message(panic: &Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
