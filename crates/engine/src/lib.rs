//! Image Engine
//!
//! Public façade over the decode engine and the discard cache. Holds no
//! state of its own beyond the wired components: it validates incoming
//! resource identifiers, forwards to the cache and visibility tracker, and
//! translates internal result types into the boundary's types. All
//! collaborators are constructed and wired here explicitly; nothing reaches
//! into global state to find its dependencies.

use std::sync::mpsc::Receiver;
use std::sync::Arc;

use img_viewer_cache::{
    CacheConfig, CacheError, CacheStats, DecodeStatus, DiscardCache, ImageKey, LockError,
    LockToken, PressureListener, VisibilityTracker,
};
use img_viewer_decode::{DecodeError, ImageDecoder, PixelBuffer, RasterDecoder};

/// Errors surfaced at the engine boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// Decoding the resource's bytes failed
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A cache operation referenced an unknown resource
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Lock bookkeeping error (unbalanced acquire/release)
    #[error(transparent)]
    Lock(#[from] LockError),

    /// The supplied resource identifier is not usable
    #[error("invalid resource identifier: {0:?}")]
    InvalidResource(String),
}

/// The assembled decoded-image cache engine.
///
/// # Example
///
/// ```no_run
/// use img_viewer_cache::CacheConfig;
/// use img_viewer_engine::ImageEngine;
///
/// let engine = ImageEngine::new(CacheConfig::default());
///
/// let encoded: Vec<u8> = std::fs::read("big.png").unwrap();
/// let url = "https://example.com/big.png";
///
/// let buffer = engine.request_decode(url, move || encoded).unwrap();
/// assert!(engine.is_decoded(url));
/// println!("{}x{}", buffer.width, buffer.height);
///
/// engine.notify_memory_pressure("heap-minimize");
/// assert!(!engine.is_decoded(url));
/// ```
pub struct ImageEngine {
    cache: Arc<DiscardCache>,
    tracker: VisibilityTracker,
    listener: Option<PressureListener>,
}

impl ImageEngine {
    /// Build an engine with the built-in raster decoder.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_decoder(Arc::new(RasterDecoder::new()), config)
    }

    /// Build an engine around a caller-supplied decoder.
    pub fn with_decoder(decoder: Arc<dyn ImageDecoder>, config: CacheConfig) -> Self {
        let cache = Arc::new(DiscardCache::new(decoder, config));
        let tracker = VisibilityTracker::new(Arc::clone(&cache));
        Self {
            cache,
            tracker,
            listener: None,
        }
    }

    /// The underlying cache, for embedders that wire collaborators
    /// themselves.
    pub fn cache(&self) -> Arc<DiscardCache> {
        Arc::clone(&self.cache)
    }

    /// Whether `resource_id` currently has a resident decoded buffer.
    ///
    /// Unknown or malformed identifiers are simply not decoded; this never
    /// errors.
    pub fn is_decoded(&self, resource_id: &str) -> bool {
        match validate(resource_id) {
            Ok(key) => self.cache.is_decoded(&key),
            Err(_) => false,
        }
    }

    /// Request a (re-)decode of `resource_id`, returning the pixel buffer.
    ///
    /// `provider` supplies the already-fetched encoded bytes and runs only
    /// when a decode is actually needed. Concurrent requests for the same
    /// resource coalesce onto one decode.
    pub fn request_decode<F>(
        &self,
        resource_id: &str,
        provider: F,
    ) -> Result<Arc<PixelBuffer>, EngineError>
    where
        F: FnOnce() -> Vec<u8>,
    {
        let key = validate(resource_id)?;
        Ok(self.cache.ensure_decoded(&key, provider)?)
    }

    /// Exempt `resource_id` from discard until [`Self::unpin`] is called.
    pub fn pin(&self, resource_id: &str) -> Result<(), EngineError> {
        let key = validate(resource_id)?;
        Ok(self.cache.set_discardable(&key, false)?)
    }

    /// Make `resource_id` eligible for discard again.
    pub fn unpin(&self, resource_id: &str) -> Result<(), EngineError> {
        let key = validate(resource_id)?;
        Ok(self.cache.set_discardable(&key, true)?)
    }

    /// Lock `resource_id` against discard for the lifetime of the returned
    /// token (e.g. while attached to a visible surface). Creates the record
    /// if absent; does not decode.
    pub fn acquire(&self, resource_id: &str) -> Result<LockToken, EngineError> {
        let key = validate(resource_id)?;
        Ok(self.tracker.acquire(&key))
    }

    /// Release a lock token.
    pub fn release(&self, token: LockToken) -> Result<(), EngineError> {
        Ok(self.tracker.release(token)?)
    }

    /// Deliver a memory-pressure notification synchronously.
    ///
    /// The sweep is bounded-fast (O(records), no I/O), so direct delivery
    /// cannot block the notification source. Returns the number of buffers
    /// discarded.
    pub fn notify_memory_pressure(&self, reason: &str) -> usize {
        self.cache.sweep(reason)
    }

    /// Subscribe to a channel-based pressure source.
    ///
    /// At most one subscription per engine; later calls are ignored with a
    /// warning. The listener thread exits when the sender is dropped.
    pub fn attach_pressure_source(&mut self, notifications: Receiver<String>) {
        if self.listener.is_some() {
            log::warn!("memory-pressure source already attached; ignoring");
            return;
        }
        self.listener = Some(PressureListener::spawn(
            Arc::clone(&self.cache),
            notifications,
        ));
    }

    /// The resource is permanently gone (navigated away, evicted from
    /// history); drop its record entirely.
    pub fn resource_gone(&self, resource_id: &str) -> Result<(), EngineError> {
        let key = validate(resource_id)?;
        Ok(self.cache.forget(&key)?)
    }

    /// Snapshot of the record's decode status, `None` for unknown resources.
    pub fn status(&self, resource_id: &str) -> Option<DecodeStatus> {
        let key = validate(resource_id).ok()?;
        self.cache.query_status(&key)
    }

    /// Current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

fn validate(resource_id: &str) -> Result<ImageKey, EngineError> {
    if resource_id.trim().is_empty() {
        return Err(EngineError::InvalidResource(resource_id.to_string()));
    }
    Ok(ImageKey::new(resource_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct OnePixelDecoder;

    impl ImageDecoder for OnePixelDecoder {
        fn decode(&self, encoded: &[u8]) -> Result<PixelBuffer, DecodeError> {
            let fill = encoded.first().copied().unwrap_or(0);
            Ok(PixelBuffer::from_rgba(1, 1, vec![fill; 4]).unwrap())
        }
    }

    fn engine() -> ImageEngine {
        ImageEngine::with_decoder(Arc::new(OnePixelDecoder), CacheConfig::default())
    }

    #[test]
    fn test_invalid_identifier_rejected() {
        let engine = engine();

        assert!(!engine.is_decoded(""));
        assert!(!engine.is_decoded("   "));
        assert_eq!(engine.status(""), None);

        let err = engine.request_decode("", || vec![]).unwrap_err();
        assert!(matches!(err, EngineError::InvalidResource(_)));
        let err = engine.acquire(" ").unwrap_err();
        assert!(matches!(err, EngineError::InvalidResource(_)));
    }

    #[test]
    fn test_unknown_resource_is_not_decoded() {
        let engine = engine();
        assert!(!engine.is_decoded("https://example.com/nonexistent.png"));
        assert_eq!(engine.status("https://example.com/nonexistent.png"), None);
    }

    #[test]
    fn test_acquire_creates_record() {
        let engine = engine();
        let url = "https://example.com/new.png";

        let token = engine.acquire(url).unwrap();
        assert_eq!(engine.status(url), Some(DecodeStatus::Unloaded));
        engine.release(token).unwrap();
    }

    #[test]
    fn test_pin_unknown_resource_errors() {
        let engine = engine();
        let err = engine.pin("https://example.com/unknown.png").unwrap_err();
        assert!(matches!(
            err,
            EngineError::Cache(CacheError::UnknownResource(_))
        ));
    }

    #[test]
    fn test_error_translation() {
        let engine = engine();
        let url = "https://example.com/a.png";

        engine.request_decode(url, || vec![1u8]).unwrap();
        engine.resource_gone(url).unwrap();

        let err = engine.resource_gone(url).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Cache(CacheError::UnknownResource(_))
        ));
    }

    #[test]
    fn test_attach_pressure_source_once() {
        let mut engine = engine();
        let (tx1, rx1) = std::sync::mpsc::channel();
        let (tx2, rx2) = std::sync::mpsc::channel();

        engine.attach_pressure_source(rx1);
        // Second attach is ignored.
        engine.attach_pressure_source(rx2);

        drop(tx1);
        drop(tx2);
    }
}
