//! Decode records: per-image identity, status, and protection state

use std::fmt;
use std::sync::{Arc, Condvar, Mutex};

use img_viewer_decode::{DecodeError, PixelBuffer};

/// Stable identity of an encoded image resource.
///
/// An image is identified by its source URL plus an optional variant key
/// (e.g. a density or crop variant served from the same URL). The cache
/// never holds two records for the same key at once.
///
/// # Example
///
/// ```
/// use img_viewer_cache::ImageKey;
///
/// let plain = ImageKey::new("https://example.com/big.png");
/// let variant = ImageKey::with_variant("https://example.com/big.png", "2x");
/// assert_ne!(plain, variant);
/// assert_eq!(variant.to_string(), "https://example.com/big.png#2x");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageKey {
    url: String,
    variant: Option<String>,
}

impl ImageKey {
    /// Create a key from a source URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            variant: None,
        }
    }

    /// Create a key from a source URL plus a variant tag.
    pub fn with_variant(url: impl Into<String>, variant: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            variant: Some(variant.into()),
        }
    }

    /// The source URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The variant tag, if any.
    pub fn variant(&self) -> Option<&str> {
        self.variant.as_deref()
    }
}

impl fmt::Display for ImageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.variant {
            Some(variant) => write!(f, "{}#{}", self.url, variant),
            None => write!(f, "{}", self.url),
        }
    }
}

/// Decode status of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStatus {
    /// No decode has been attempted (or the last attempt failed)
    Unloaded,
    /// A decode is in flight; concurrent requests coalesce onto it
    Decoding,
    /// A pixel buffer is resident
    Decoded,
    /// The buffer was released by a sweep; identity and metadata survive
    Discarded,
}

/// Mutable state of one decode record.
///
/// All fields live behind a single mutex so that a sweep's check of
/// `lock_count` and its status transition are atomic with respect to
/// concurrent acquire/release and decode commits. Invariant: `buffer` is
/// `Some` iff `status == Decoded`.
pub(crate) struct RecordState {
    pub(crate) status: DecodeStatus,
    pub(crate) buffer: Option<Arc<PixelBuffer>>,
    pub(crate) lock_count: u32,
    pub(crate) discardable: bool,
    /// Bumped whenever a decode attempt completes (success or failure).
    /// Waiters compare generations to tell "the decode I waited on failed"
    /// apart from "no decode has run yet".
    pub(crate) generation: u64,
    /// Error from the most recent failed decode, for coalesced waiters.
    pub(crate) last_error: Option<DecodeError>,
}

pub(crate) struct Record {
    pub(crate) state: Mutex<RecordState>,
    /// Signalled whenever a decode attempt completes.
    pub(crate) decode_done: Condvar,
}

impl Record {
    pub(crate) fn new(discardable: bool) -> Self {
        Self {
            state: Mutex::new(RecordState {
                status: DecodeStatus::Unloaded,
                buffer: None,
                lock_count: 0,
                discardable,
                generation: 0,
                last_error: None,
            }),
            decode_done: Condvar::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_equality_and_hash() {
        use std::collections::HashMap;

        let a = ImageKey::new("https://example.com/a.png");
        let b = ImageKey::new("https://example.com/a.png");
        assert_eq!(a, b);

        let mut map = HashMap::new();
        map.insert(a, 1);
        assert_eq!(map.get(&b), Some(&1));
    }

    #[test]
    fn test_key_variant_distinct() {
        let plain = ImageKey::new("https://example.com/a.png");
        let thumb = ImageKey::with_variant("https://example.com/a.png", "thumb");
        assert_ne!(plain, thumb);
        assert_eq!(thumb.variant(), Some("thumb"));
        assert_eq!(plain.variant(), None);
    }

    #[test]
    fn test_key_display() {
        let plain = ImageKey::new("https://example.com/a.png");
        assert_eq!(plain.to_string(), "https://example.com/a.png");

        let variant = ImageKey::with_variant("https://example.com/a.png", "2x");
        assert_eq!(variant.to_string(), "https://example.com/a.png#2x");
    }

    #[test]
    fn test_new_record_state() {
        let record = Record::new(true);
        let state = record.state.lock().unwrap();
        assert_eq!(state.status, DecodeStatus::Unloaded);
        assert!(state.buffer.is_none());
        assert_eq!(state.lock_count, 0);
        assert!(state.discardable);
        assert_eq!(state.generation, 0);
        assert!(state.last_error.is_none());
    }
}
