//! Error types for token-level operations.

use keyfort_session::SessionError;
use keyfort_types::UserType;

/// Errors the token reports for session and login operations.
///
/// These cover the compatibility rules between the two login roles and
/// the two session modes, plus everything the session layer can already
/// report (wrapped unchanged).
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// A login is already active. Only one role may be logged in
    /// token-wide at a time, and logging in again as the same role is
    /// equally rejected.
    #[error("the {0} is already logged in")]
    AlreadyLoggedIn(UserType),

    /// A logout was requested while no one is logged in.
    #[error("no one is logged in")]
    NotLoggedIn,

    /// The security officer cannot log in while any read-only session
    /// is open: the SO role has no read-only session state.
    #[error("a read-only session is open, so the security officer cannot log in")]
    ReadOnlySessionExists,

    /// A read-only session cannot be opened while the security officer
    /// is logged in, for the same reason.
    #[error("the security officer is logged in, so read-only sessions cannot be opened")]
    SoSessionExists,

    /// A failure reported by the session table (bad handle, session
    /// limit reached).
    #[error(transparent)]
    Session(#[from] SessionError),
}
