//! Debounced per-document scheduling.
//!
//! Every document has at most one pending timer. Scheduling again
//! replaces the timer, so a burst of edits inside the quiet period
//! collapses into a single analysis pass. A timer can only be cancelled
//! while it sleeps; once fired, the scheduled future runs to completion
//! and stale results are filtered downstream.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;
use tower_lsp::lsp_types::Url;

struct PendingTimer {
    id: u64,
    cancel: oneshot::Sender<()>,
}

/// Collapses bursts of per-document work into single debounced runs.
pub struct DebounceScheduler {
    delay: Duration,
    timers: Arc<Mutex<HashMap<Url, PendingTimer>>>,
    next_id: AtomicU64,
}

impl DebounceScheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            timers: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Arm (or re-arm) the timer for `uri`; `task` runs after the quiet
    /// period unless another `schedule` or [`cancel`](Self::cancel)
    /// supersedes it first.
    pub fn schedule<F>(&self, uri: Url, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (cancel_tx, mut cancel_rx) = oneshot::channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut timers = self.timers.lock().unwrap();
            if let Some(previous) = timers.insert(
                uri.clone(),
                PendingTimer {
                    id,
                    cancel: cancel_tx,
                },
            ) {
                let _ = previous.cancel.send(());
            }
        }

        let timers = Arc::clone(&self.timers);
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::select! {
                // Resolves on explicit cancel and on sender drop alike.
                _ = &mut cancel_rx => return,
                _ = tokio::time::sleep(delay) => {}
            }
            // Fired: release the map entry before running so a
            // concurrent edit arms a fresh timer. The id guards against
            // removing a newer timer that replaced this one at the last
            // moment.
            {
                let mut timers = timers.lock().unwrap();
                if timers.get(&uri).map(|timer| timer.id) == Some(id) {
                    timers.remove(&uri);
                }
            }
            task.await;
        });
    }

    /// Discard the pending timer for `uri`, if any. Used when the
    /// document closes.
    pub fn cancel(&self, uri: &Url) {
        if let Some(timer) = self.timers.lock().unwrap().remove(uri) {
            let _ = timer.cancel.send(());
        }
    }
}
