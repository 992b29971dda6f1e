//! Token-level session ownership for Keyfort.
//!
//! This crate supplies the policy half of the session layer: the
//! [`Token`] owns one session table and decides *when* sessions open
//! and close and *when* logins and logouts happen, enforcing the
//! compatibility rules between the two roles and the two session
//! modes:
//!
//! - at most one login (user *or* security officer) token-wide;
//! - no security-officer login while read-only sessions are open;
//! - no read-only sessions while the security officer is logged in;
//! - closing the last session logs the token out.
//!
//! The mechanism (handle allocation, counters, locking, broadcast)
//! lives below in `keyfort-session`.

mod error;
mod token;

pub use error::TokenError;
pub use token::{SessionInfo, Token, TokenConfig};
