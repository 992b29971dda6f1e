//! Session management for Keyfort.
//!
//! This crate is the heart of the token's session layer:
//!
//! 1. **Session contexts** ([`Session`]): one caller's connection to
//!    the token. A handle, an access mode, and the login state machine
//!    behind the session's own lock.
//! 2. **The session table** ([`SessionTable`]): the fixed-capacity
//!    registry that issues handles, keeps the live/read-write counters,
//!    broadcasts logins and logouts into every open session, and logs
//!    the token out when the last session closes.
//! 3. **The owner seam** ([`LoginAuthority`]): the one question the
//!    table asks whoever owns it, namely "is someone logged in, and
//!    through which session?"
//!
//! # How it fits in the stack
//!
//! ```text
//! Token layer (above)  ← decides when logins, logouts, and closes happen
//!     ↕
//! Session layer (this crate)  ← enforces counts, locking, and broadcast
//!     ↕
//! Types layer (below)  ← handles, modes, and roles
//! ```

mod authority;
mod error;
mod session;
mod table;

pub use authority::LoginAuthority;
pub use error::SessionError;
pub use session::{Session, SessionState};
pub use table::{SessionTable, TableConfig, TableState};
