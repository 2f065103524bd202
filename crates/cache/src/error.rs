//! Cache and lock error types
//!
//! No error in this subsystem is fatal. Worst case is degraded rendering
//! (the caller falls back to a placeholder) or temporary over-retention of a
//! buffer; never a crash.

/// Errors from cache operations that reference a specific resource.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// The operation referenced a resource id that was never created
    #[error("unknown resource: {0}")]
    UnknownResource(String),
}

/// Errors from lock bookkeeping.
///
/// Underflow indicates an unbalanced acquire/release pairing, which is a
/// programming error on the caller's side. It is always logged, the lock
/// count is clamped to zero so the record cannot stay pinned forever, and
/// the process continues.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LockError {
    /// A release was attempted on a record whose lock count is already zero
    #[error("lock count underflow for resource: {0}")]
    Underflow(String),
}
