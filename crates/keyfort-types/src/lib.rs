//! Shared vocabulary for Keyfort.
//!
//! This crate defines the value types the session and token layers
//! exchange:
//!
//! - **Identity** ([`SessionHandle`]): which open session is meant.
//! - **Mode** ([`SessionMode`]): read-only vs read-write access.
//! - **Role** ([`UserType`]): user vs security officer.
//! - **Accounting** ([`SessionCounts`]): the `(all, rw, ro)` triple
//!   the login-compatibility rules are decided on.
//!
//! It sits below everything else and depends on nothing:
//!
//! ```text
//! Token layer (above)    ← decides when logins and closes happen
//!     ↕
//! Session layer          ← state machines and the session table
//!     ↕
//! Types (this crate)     ← the words both layers speak
//! ```

mod types;

pub use types::{SessionCounts, SessionHandle, SessionMode, UserType};
