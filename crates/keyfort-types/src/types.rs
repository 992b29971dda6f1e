//! Core vocabulary for Keyfort's session layer.
//!
//! This module defines the small value types every other layer speaks:
//! session handles, session modes, user roles, and the session-count
//! triple. They carry no behavior beyond queries and formatting; the
//! state machines that act on them live in the session crate.

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for an open session.
///
/// This is a "newtype wrapper" around the session's slot index in the
/// session table. Why wrap a plain `usize`?
///
/// 1. **Type safety**: a `SessionHandle` can't be confused with an
///    ordinary count or index in a function signature.
/// 2. **Readability**: `fn close_session(handle: SessionHandle)` says
///    more than `fn close_session(handle: usize)`.
///
/// Handles are dense small integers because the table allocates them
/// from a fixed-size slot arena. A handle is only meaningful while its
/// session is open; once the session closes, the same handle value may
/// be issued to a later session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle(pub usize);

impl SessionHandle {
    /// The slot index this handle names.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Display lets us use `{}` in format strings and logging.
/// `tracing::info!(%handle, "session opened")` will print "S-3".
impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// SessionMode
// ---------------------------------------------------------------------------

/// Whether a session permits state-modifying operations.
///
/// The mode is fixed when the session is opened and never changes.
/// Read-write sessions are counted separately from read-only ones
/// because the two interact differently with the security officer:
/// the SO may only operate through read-write sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// The session may only read token state.
    ReadOnly,

    /// The session may create, modify, and destroy token state.
    ReadWrite,
}

impl SessionMode {
    /// `true` for [`SessionMode::ReadWrite`].
    pub fn is_read_write(self) -> bool {
        matches!(self, SessionMode::ReadWrite)
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionMode::ReadOnly => write!(f, "read-only"),
            SessionMode::ReadWrite => write!(f, "read-write"),
        }
    }
}

// ---------------------------------------------------------------------------
// UserType
// ---------------------------------------------------------------------------

/// The privilege role a caller may authenticate as.
///
/// At most one role is active token-wide at any moment: a user login
/// and a security-officer login are mutually exclusive, and a second
/// login of either role is rejected until the first ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserType {
    /// The ordinary token user: owns and uses private objects.
    User,

    /// The security officer: administers the token (e.g. initializes
    /// the user's credentials). Operates through read-write sessions
    /// only.
    SecurityOfficer,
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserType::User => write!(f, "user"),
            UserType::SecurityOfficer => write!(f, "security officer"),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionCounts
// ---------------------------------------------------------------------------

/// A consistent snapshot of the session table's counters.
///
/// Always satisfies `all == rw + ro`; the table takes the snapshot
/// under its lock so the three fields never drift apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionCounts {
    /// Total number of open sessions.
    pub all: usize,
    /// Open sessions in read-write mode.
    pub rw: usize,
    /// Open sessions in read-only mode.
    pub ro: usize,
}

impl fmt::Display for SessionCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} open ({} rw, {} ro)", self.all, self.rw, self.ro)
    }
}

// =========================================================================
// Tests
// =========================================================================
