//! Central registry of decode records and the discard policy
//!
//! The registry mutex is held only for lookups and inserts, never across a
//! decode, so decodes for distinct resources proceed in parallel. Each
//! record's own mutex covers status, buffer, and lock count together, which
//! keeps a sweep's eligibility check atomic with respect to concurrent
//! acquire/release.
//!
//! Discard is keyed on lock state, not recency or size: the triggering
//! signal (host memory pressure) is rare and binary, so the policy is
//! simply "release anything nobody currently needs". Locked and pinned
//! records are left untouched; a visible surface never loses its buffer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use img_viewer_decode::{DecodeError, ImageDecoder, PixelBuffer};

use crate::config::CacheConfig;
use crate::error::{CacheError, LockError};
use crate::record::{DecodeStatus, ImageKey, Record};

/// Statistics about cache usage
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Number of live records (any status)
    pub record_count: usize,

    /// Number of records with a resident buffer
    pub decoded_count: usize,

    /// Number of records currently locked by at least one consumer
    pub locked_count: usize,

    /// Total bytes of resident decoded pixel data
    pub memory_used: usize,

    /// Requests answered from a resident buffer
    pub hits: u64,

    /// Requests that had to run (or wait on) a decode
    pub misses: u64,

    /// Decoder invocations
    pub decodes: u64,

    /// Decoder invocations that failed
    pub decode_failures: u64,

    /// Buffers released by sweeps
    pub discards: u64,

    /// Completed sweep passes
    pub sweeps: u64,
}

impl CacheStats {
    /// Calculate the cache hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Registry of decode records with lock-protected discard.
///
/// Owns every record and its buffer. Consumers hold lock tokens (see
/// [`crate::VisibilityTracker`]), never owning references to buffers, and
/// re-query the cache on every draw in case a sweep ran in between.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use img_viewer_cache::{CacheConfig, DiscardCache, ImageKey};
/// use img_viewer_decode::RasterDecoder;
///
/// let cache = DiscardCache::new(Arc::new(RasterDecoder::new()), CacheConfig::default());
/// let key = ImageKey::new("https://example.com/big.png");
///
/// let encoded: Vec<u8> = std::fs::read("big.png").unwrap();
/// let buffer = cache.ensure_decoded(&key, move || encoded).unwrap();
/// assert!(cache.is_decoded(&key));
/// println!("resident: {} bytes", buffer.memory_size());
///
/// // Host signals memory pressure; nobody holds a lock, so the buffer goes.
/// cache.sweep("heap-minimize");
/// assert!(!cache.is_decoded(&key));
/// ```
pub struct DiscardCache {
    config: CacheConfig,
    decoder: Arc<dyn ImageDecoder>,
    records: Mutex<HashMap<ImageKey, Arc<Record>>>,
    /// Serializes sweeps; they mutate shared record state and must never
    /// run concurrently with each other.
    sweep_gate: Mutex<()>,
    hits: AtomicU64,
    misses: AtomicU64,
    decodes: AtomicU64,
    decode_failures: AtomicU64,
    discards: AtomicU64,
    sweeps: AtomicU64,
}

impl DiscardCache {
    /// Create a cache around the given decoder.
    pub fn new(decoder: Arc<dyn ImageDecoder>, config: CacheConfig) -> Self {
        Self {
            config,
            decoder,
            records: Mutex::new(HashMap::new()),
            sweep_gate: Mutex::new(()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            decodes: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            discards: AtomicU64::new(0),
            sweeps: AtomicU64::new(0),
        }
    }

    /// The configuration this cache was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Return the decoded buffer for `key`, decoding if necessary.
    ///
    /// `provider` supplies the already-fetched encoded bytes and is only
    /// called when a decode actually runs. Concurrent calls for the same key
    /// coalesce onto a single decoder invocation: later callers block until
    /// it completes and then observe its result, success or failure. On
    /// failure the record reverts to `Unloaded` (never left half-decoded)
    /// and the error propagates to every coalesced caller. Failures are not
    /// retried automatically.
    pub fn ensure_decoded<F>(
        &self,
        key: &ImageKey,
        provider: F,
    ) -> Result<Arc<PixelBuffer>, DecodeError>
    where
        F: FnOnce() -> Vec<u8>,
    {
        let record = self.record_or_insert(key);
        let mut provider = Some(provider);
        let mut state = record.state.lock().unwrap();
        loop {
            match state.status {
                DecodeStatus::Decoded => {
                    if let Some(buffer) = state.buffer.clone() {
                        self.hits.fetch_add(1, Ordering::Relaxed);
                        return Ok(buffer);
                    }
                    // A Decoded record always carries a buffer; if it ever
                    // does not, recover by treating it as unloaded.
                    state.status = DecodeStatus::Unloaded;
                }
                DecodeStatus::Decoding => {
                    let waited_on = state.generation;
                    state = record.decode_done.wait(state).unwrap();
                    if state.generation != waited_on {
                        if let Some(err) = &state.last_error {
                            // The decode we coalesced onto failed.
                            return Err(err.clone());
                        }
                    }
                }
                DecodeStatus::Unloaded | DecodeStatus::Discarded => {
                    let fetch = match provider.take() {
                        Some(fetch) => fetch,
                        // The provider is consumed only on the branch that
                        // returns below, so a second pass cannot happen.
                        None => return Err(DecodeError::Unsupported),
                    };
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    state.status = DecodeStatus::Decoding;
                    state.last_error = None;
                    drop(state);

                    // Decode without holding any lock so other resources
                    // (and sweeps) proceed freely.
                    let encoded = fetch();
                    let result = self.decoder.decode(&encoded);
                    self.decodes.fetch_add(1, Ordering::Relaxed);

                    let mut done = record.state.lock().unwrap();
                    done.generation = done.generation.wrapping_add(1);
                    let outcome = match result {
                        Ok(buffer) => {
                            let buffer = Arc::new(buffer);
                            done.buffer = Some(Arc::clone(&buffer));
                            done.status = DecodeStatus::Decoded;
                            Ok(buffer)
                        }
                        Err(err) => {
                            self.decode_failures.fetch_add(1, Ordering::Relaxed);
                            done.buffer = None;
                            done.status = DecodeStatus::Unloaded;
                            done.last_error = Some(err.clone());
                            Err(err)
                        }
                    };
                    drop(done);
                    record.decode_done.notify_all();
                    return outcome;
                }
            }
        }
    }

    /// Snapshot of the record's status, `None` for never-created keys.
    ///
    /// State may change concurrently; the result is only guaranteed to have
    /// been true at some instant no earlier than the call.
    pub fn query_status(&self, key: &ImageKey) -> Option<DecodeStatus> {
        let record = self.records.lock().unwrap().get(key).cloned()?;
        let state = record.state.lock().unwrap();
        Some(state.status)
    }

    /// Whether `key` currently has a resident decoded buffer.
    ///
    /// Unknown keys are simply not decoded; this never errors.
    pub fn is_decoded(&self, key: &ImageKey) -> bool {
        matches!(self.query_status(key), Some(DecodeStatus::Decoded))
    }

    /// Release the buffer of every record with no active locks and the
    /// `discardable` flag set. Returns the number of buffers discarded.
    ///
    /// This is intentionally partial eviction: locked or pinned records are
    /// left untouched. Sweeps are idempotent, safe under duplicate pressure
    /// notifications, and never run concurrently with each other; a sweep
    /// arriving while one is in progress coalesces into a no-op. The pass is
    /// O(records) with no I/O and no decode work.
    pub fn sweep(&self, reason: &str) -> usize {
        if !self.config.discarding_enabled {
            log::debug!("memory-pressure sweep ({reason}) skipped: discarding disabled");
            return 0;
        }
        let _gate = match self.sweep_gate.try_lock() {
            Ok(gate) => gate,
            // Another sweep is running; it will release everything eligible.
            Err(_) => return 0,
        };

        let records: Vec<Arc<Record>> = {
            let registry = self.records.lock().unwrap();
            registry.values().cloned().collect()
        };

        let mut discarded = 0usize;
        let mut freed = 0usize;
        for record in records {
            let mut state = record.state.lock().unwrap();
            if state.status == DecodeStatus::Decoded
                && state.lock_count == 0
                && state.discardable
            {
                if let Some(buffer) = state.buffer.take() {
                    freed += buffer.memory_size();
                }
                state.status = DecodeStatus::Discarded;
                discarded += 1;
            }
        }

        self.sweeps.fetch_add(1, Ordering::Relaxed);
        self.discards.fetch_add(discarded as u64, Ordering::Relaxed);
        log::info!(
            "memory-pressure sweep ({reason}): discarded {discarded} buffers, freed {freed} bytes"
        );
        discarded
    }

    /// Pin (`false`) or unpin (`true`) a record outside of lock semantics.
    ///
    /// An animating image, for example, can keep its decode result across
    /// sweeps even while momentarily unlocked between frames.
    pub fn set_discardable(&self, key: &ImageKey, discardable: bool) -> Result<(), CacheError> {
        let record = self.records.lock().unwrap().get(key).cloned();
        match record {
            Some(record) => {
                record.state.lock().unwrap().discardable = discardable;
                Ok(())
            }
            None => Err(CacheError::UnknownResource(key.to_string())),
        }
    }

    /// Remove a record entirely because the resource itself is gone
    /// (navigated away, evicted from history). Distinct from discard, which
    /// only drops the buffer.
    pub fn forget(&self, key: &ImageKey) -> Result<(), CacheError> {
        let removed = self.records.lock().unwrap().remove(key);
        match removed {
            Some(record) => {
                let state = record.state.lock().unwrap();
                if state.lock_count > 0 {
                    log::debug!(
                        "resource {key} removed while still locked ({} holders)",
                        state.lock_count
                    );
                }
                Ok(())
            }
            None => Err(CacheError::UnknownResource(key.to_string())),
        }
    }

    /// Current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let records: Vec<Arc<Record>> = {
            let registry = self.records.lock().unwrap();
            registry.values().cloned().collect()
        };

        let record_count = records.len();
        let mut decoded_count = 0;
        let mut locked_count = 0;
        let mut memory_used = 0;
        for record in &records {
            let state = record.state.lock().unwrap();
            if state.status == DecodeStatus::Decoded {
                decoded_count += 1;
            }
            if state.lock_count > 0 {
                locked_count += 1;
            }
            if let Some(buffer) = &state.buffer {
                memory_used += buffer.memory_size();
            }
        }

        CacheStats {
            record_count,
            decoded_count,
            locked_count,
            memory_used,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            decodes: self.decodes.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            discards: self.discards.load(Ordering::Relaxed),
            sweeps: self.sweeps.load(Ordering::Relaxed),
        }
    }

    /// Increment the lock count on `key`, creating an `Unloaded` record if
    /// absent. Does not decode.
    pub(crate) fn lock_record(&self, key: &ImageKey) {
        let record = self.record_or_insert(key);
        let mut state = record.state.lock().unwrap();
        state.lock_count += 1;
    }

    /// Decrement the lock count on `key`.
    ///
    /// An unbalanced release is a programming error: it is logged, the count
    /// stays clamped at zero so the record cannot stay pinned forever, and
    /// `LockError::Underflow` is returned.
    pub(crate) fn unlock_record(&self, key: &ImageKey) -> Result<(), LockError> {
        let record = self.records.lock().unwrap().get(key).cloned();
        let Some(record) = record else {
            log::warn!("lock released for unknown resource {key}; clamping");
            return Err(LockError::Underflow(key.to_string()));
        };
        let mut state = record.state.lock().unwrap();
        if state.lock_count == 0 {
            log::warn!("lock count underflow for {key}; clamped to zero");
            return Err(LockError::Underflow(key.to_string()));
        }
        state.lock_count -= 1;
        Ok(())
    }

    fn record_or_insert(&self, key: &ImageKey) -> Arc<Record> {
        let mut registry = self.records.lock().unwrap();
        Arc::clone(
            registry
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Record::new(self.config.discardable_by_default))),
        )
    }
}
