//! The seam between the session table and its owning token.
//!
//! The table does not own the token's login state; it only needs one
//! thing from it: when the last session closes, find out whether a
//! login is active and, if so, take it over so the implicit logout can
//! run. The [`LoginAuthority`] trait is that single question.
//!
//! # Why a trait?
//!
//! The production implementation is the token itself. But the table's
//! trickiest behavior, the logout cascade on last close, deserves tests
//! that don't drag in a whole token: a recording double implements this
//! trait, hands back a scripted login, and counts how often the table
//! asked. Both plug in without the table knowing the difference.

use std::sync::Arc;

use crate::Session;

/// The owner-side contract the session table relies on.
///
/// # Trait bounds
///
/// `Send + Sync` because the table (and therefore its owner) is shared
/// across the threads driving sessions concurrently.
pub trait LoginAuthority: Send + Sync {
    /// Ends the active login, if there is one.
    ///
    /// Returns the session context that performed the login, with the
    /// owner's record already cleared: after this call the owner
    /// reports no one logged in. The table locks the returned context,
    /// applies the logout transition, and releases it.
    ///
    /// Returning the context itself (not its handle) matters: the
    /// login session's slot may have been closed and its handle
    /// reissued while the login stayed active, so only the counted
    /// reference still identifies it unambiguously.
    fn end_login(&self) -> Option<Arc<Session>>;
}
