//! Visibility tracking: lock tokens that protect records from discard
//!
//! A rendering surface acquires a lock for the period during which an image
//! must stay decoded (attached to a visible document, mid-animation frame)
//! and releases it when done. A locked record is never discarded by a sweep.

use std::sync::Arc;

use crate::cache::DiscardCache;
use crate::error::LockError;
use crate::record::ImageKey;

/// Single-use protection marker for one record.
///
/// Holding a token guarantees the record's buffer survives any number of
/// sweeps. Tokens are not cloneable and releasing one consumes it, so a
/// double release is impossible by construction. Dropping an unreleased
/// token releases the lock as a best effort, so a torn-down surface cannot
/// pin its record forever.
pub struct LockToken {
    key: ImageKey,
    cache: Arc<DiscardCache>,
    released: bool,
}

impl LockToken {
    /// The resource this token protects.
    pub fn key(&self) -> &ImageKey {
        &self.key
    }
}

impl std::fmt::Debug for LockToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockToken")
            .field("key", &self.key)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

impl Drop for LockToken {
    fn drop(&mut self) {
        if !self.released {
            log::debug!("lock token for {} released implicitly on drop", self.key);
            let _ = self.cache.unlock_record(&self.key);
        }
    }
}

/// Hands out and consumes lock tokens against a shared cache.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use img_viewer_cache::{CacheConfig, DiscardCache, ImageKey, VisibilityTracker};
/// use img_viewer_decode::RasterDecoder;
///
/// let cache = Arc::new(DiscardCache::new(
///     Arc::new(RasterDecoder::new()),
///     CacheConfig::default(),
/// ));
/// let tracker = VisibilityTracker::new(Arc::clone(&cache));
///
/// let key = ImageKey::new("https://example.com/big.png");
/// let token = tracker.acquire(&key);
/// // ... the record cannot be discarded while the token is held ...
/// tracker.release(token).unwrap();
/// ```
pub struct VisibilityTracker {
    cache: Arc<DiscardCache>,
}

impl VisibilityTracker {
    /// Create a tracker over the given cache.
    pub fn new(cache: Arc<DiscardCache>) -> Self {
        Self { cache }
    }

    /// Increment the lock count on `key`, creating an `Unloaded` record if
    /// the resource was never seen before. Does not decode.
    pub fn acquire(&self, key: &ImageKey) -> LockToken {
        self.cache.lock_record(key);
        LockToken {
            key: key.clone(),
            cache: Arc::clone(&self.cache),
            released: false,
        }
    }

    /// Release a token, consuming it.
    ///
    /// `Underflow` surfaces only if the record vanished underneath the token
    /// (e.g. the lifecycle owner removed the resource) or its count was
    /// already clamped after an earlier imbalance.
    pub fn release(&self, mut token: LockToken) -> Result<(), LockError> {
        token.released = true;
        self.cache.unlock_record(&token.key)
    }
}
