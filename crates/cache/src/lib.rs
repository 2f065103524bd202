//! Decoded-Image Discard Cache
//!
//! Registry of decode records with lock-based discard protection. Decoded
//! pixel buffers stay resident while any consumer holds a lock on them and
//! are released in a sweep when the host signals memory pressure. Discard
//! drops only the buffer; the record's identity survives so the image can be
//! re-decoded on the next draw.

pub mod cache;
pub mod config;
pub mod error;
pub mod pressure;
pub mod record;
pub mod visibility;

pub use cache::{CacheStats, DiscardCache};
pub use config::{CacheConfig, ConfigError};
pub use error::{CacheError, LockError};
pub use pressure::PressureListener;
pub use record::{DecodeStatus, ImageKey};
pub use visibility::{LockToken, VisibilityTracker};
