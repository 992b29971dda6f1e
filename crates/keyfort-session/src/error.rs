//! Error types for the session layer.

use keyfort_types::SessionHandle;

/// Errors the session table reports to its callers.
///
/// Only anticipated conditions appear here. Invariant breaches (an
/// occupied slot on the free list, a read-write counter underflow, a
/// poisoned lock) are not errors a caller can act on; they halt the
/// process at the point of detection instead of becoming variants.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Every slot in the table is occupied. The limit is fixed when
    /// the table is built; a slot frees up when any session closes.
    #[error("session limit reached ({0} sessions open)")]
    TooManySessions(usize),

    /// No open session exists for the given handle. Covers handles
    /// that were never issued, are out of range, or whose session has
    /// already been closed.
    #[error("no open session for handle {0}")]
    InvalidHandle(SessionHandle),
}
