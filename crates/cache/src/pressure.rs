//! Memory-pressure subscription
//!
//! Adapter between a host notification channel and the cache's sweep. Each
//! notification carries only a reason tag ("heap-minimize", "low-memory");
//! delivery may be at-most-once or at-least-once and duplicates are safe
//! because sweeps are idempotent. The listener never blocks the source: it
//! drains the channel on its own thread and each sweep is O(records) with
//! no I/O.

use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::cache::DiscardCache;

/// Background subscriber that sweeps the cache on each pressure
/// notification.
///
/// Spawned once at startup against the host's notification channel; the
/// thread exits when the sending side is dropped. Dropping the listener
/// joins the thread, so drop the sender first.
///
/// # Example
///
/// ```no_run
/// use std::sync::{mpsc, Arc};
/// use img_viewer_cache::{CacheConfig, DiscardCache, PressureListener};
/// use img_viewer_decode::RasterDecoder;
///
/// let cache = Arc::new(DiscardCache::new(
///     Arc::new(RasterDecoder::new()),
///     CacheConfig::default(),
/// ));
///
/// let (tx, rx) = mpsc::channel();
/// let listener = PressureListener::spawn(Arc::clone(&cache), rx);
///
/// // Host side, on low memory:
/// tx.send("heap-minimize".to_string()).unwrap();
///
/// drop(tx);
/// drop(listener); // joins the thread
/// ```
pub struct PressureListener {
    handle: Option<JoinHandle<()>>,
}

impl PressureListener {
    /// Subscribe `cache` to the notification channel `notifications`.
    pub fn spawn(cache: Arc<DiscardCache>, notifications: Receiver<String>) -> Self {
        let handle = thread::spawn(move || {
            while let Ok(reason) = notifications.recv() {
                cache.sweep(&reason);
            }
            log::debug!("memory-pressure channel closed; listener exiting");
        });
        Self {
            handle: Some(handle),
        }
    }

    /// Whether the listener thread has exited.
    pub fn is_finished(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| handle.is_finished())
            .unwrap_or(true)
    }
}

impl Drop for PressureListener {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
