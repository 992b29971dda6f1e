//! Session contexts: the per-session login state machine.
//!
//! A session context is the token's record of one open connection. It
//! pairs an immutable identity (handle and mode, fixed at open time)
//! with the one piece of mutable state a session carries: where it sits
//! in the login state machine. That state lives behind the session's
//! own lock, the inner tier of the two-tier locking scheme.

use std::sync::{Mutex, MutexGuard};

use keyfort_types::{SessionHandle, SessionMode, UserType};

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// The login state of one session.
///
/// Five states: each mode has a public (not logged in) and a user
/// variant, and read-write sessions additionally have a security
/// officer variant. There is deliberately no read-only SO state: the
/// security officer only ever operates through read-write sessions, and
/// the token layer refuses the combinations that would require one.
///
/// ```text
///   RoPublic ──(user login)──→ RoUser
///       ↑                         │
///       └────────(logout)─────────┘
///
///   RwPublic ──(user login)──→ RwUser
///       │ ↑                       │
///       │ └────────(logout)───────┘
///       └──(SO login)──→ RwSecurityOfficer ──(logout)──→ RwPublic
/// ```
///
/// A login or logout anywhere on the token moves *every* open session
/// through this machine at once; the session table's broadcast is what
/// delivers the transition to each context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Read-only session, no one logged in.
    RoPublic,
    /// Read-only session while the user is logged in.
    RoUser,
    /// Read-write session, no one logged in.
    RwPublic,
    /// Read-write session while the user is logged in.
    RwUser,
    /// Read-write session while the security officer is logged in.
    RwSecurityOfficer,
}

impl SessionState {
    /// `true` for the read-write variants. The table's rw counter is
    /// kept in terms of this predicate.
    pub fn is_read_write(self) -> bool {
        matches!(
            self,
            SessionState::RwPublic
                | SessionState::RwUser
                | SessionState::RwSecurityOfficer
        )
    }

    /// `true` once a login has been observed and not yet revoked.
    pub fn is_logged_in(self) -> bool {
        matches!(
            self,
            SessionState::RoUser
                | SessionState::RwUser
                | SessionState::RwSecurityOfficer
        )
    }

    /// Applies a login for `user`, keeping the session's mode.
    ///
    /// A read-only session can never observe a security officer login:
    /// the token refuses the SO login while read-only sessions exist
    /// and refuses read-only opens while the SO is active. Reaching
    /// that combination here means the registry is corrupted, so it
    /// halts rather than continuing.
    pub(crate) fn login(&mut self, user: UserType) {
        let rw = self.is_read_write();
        *self = match user {
            UserType::User => {
                if rw {
                    SessionState::RwUser
                } else {
                    SessionState::RoUser
                }
            }
            UserType::SecurityOfficer => {
                assert!(
                    rw,
                    "read-only session observed a security officer login"
                );
                SessionState::RwSecurityOfficer
            }
        };
    }

    /// Applies a logout, returning to the public state of the same mode.
    pub(crate) fn logout(&mut self) {
        *self = if self.is_read_write() {
            SessionState::RwPublic
        } else {
            SessionState::RoPublic
        };
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One open session on the token.
///
/// Contexts are created and destroyed exclusively by the session table;
/// callers receive shared references (`Arc<Session>`) and interact with
/// the login state through [`Session::lock_state`]. The state mutex is
/// the session's own lock tier: the table lock is always taken first
/// when both are needed for the same operation.
#[derive(Debug)]
pub struct Session {
    /// The handle the table issued for this session.
    handle: SessionHandle,

    /// Read-only or read-write, fixed at open time.
    mode: SessionMode,

    /// Where this session sits in the login state machine.
    state: Mutex<SessionState>,
}

impl Session {
    /// Builds a context for a freshly allocated slot.
    ///
    /// `active_login` is the token's login at open time: sessions
    /// opened while someone is logged in start directly in the
    /// corresponding logged-in state rather than the public one.
    pub(crate) fn new(
        handle: SessionHandle,
        mode: SessionMode,
        active_login: Option<UserType>,
    ) -> Self {
        let rw = mode.is_read_write();
        let state = match active_login {
            None => {
                if rw {
                    SessionState::RwPublic
                } else {
                    SessionState::RoPublic
                }
            }
            Some(UserType::User) => {
                if rw {
                    SessionState::RwUser
                } else {
                    SessionState::RoUser
                }
            }
            Some(UserType::SecurityOfficer) => {
                assert!(
                    rw,
                    "read-only session opened while the security officer is logged in"
                );
                SessionState::RwSecurityOfficer
            }
        };

        Self {
            handle,
            mode,
            state: Mutex::new(state),
        }
    }

    /// The handle this session was issued.
    pub fn handle(&self) -> SessionHandle {
        self.handle
    }

    /// The access mode this session was opened with.
    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    /// Takes this session's lock and returns the state guard.
    ///
    /// Callers composing a multi-step operation (such as a login
    /// broadcast initiated from this session) hold the guard across the
    /// whole operation; everyone else uses [`Session::state`]. The
    /// table lock must never be acquired while this guard is held; the
    /// table tier always comes first.
    pub fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        // A poisoned session lock means a thread died mid-transition.
        self.state.lock().expect("session state lock poisoned")
    }

    /// A snapshot of the current login state (locks, copies, releases).
    pub fn state(&self) -> SessionState {
        *self.lock_state()
    }
}

// =========================================================================
// Tests
// =========================================================================
