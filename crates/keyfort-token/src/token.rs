//! The token: owner of the session table and the login state.
//!
//! A token represents one cryptographic device instance. It holds
//! exactly one session table plus the piece of state the table itself
//! must not own: who, if anyone, is logged in, and through which
//! session. Every operation here is the *policy* half of the session
//! layer; the table supplies the mechanism (counters, locking,
//! broadcast, the implicit logout on last close).
//!
//! # Locking
//!
//! The table lock is the outer tier and is taken first by every
//! operation that needs it. The login record has its own small mutex,
//! but it is only ever locked while the table lock is held and is
//! always released before any session's state lock is taken, so the
//! two-tier ordering (table first, then one session at a time) is
//! never violated.

use std::sync::{Arc, Mutex};

use keyfort_session::{
    LoginAuthority, Session, SessionError, SessionState, SessionTable,
    TableConfig,
};
use keyfort_types::{SessionCounts, SessionHandle, SessionMode, UserType};

use crate::TokenError;

// ---------------------------------------------------------------------------
// TokenConfig
// ---------------------------------------------------------------------------

/// Configuration for a token instance.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// Human-readable token label, used in logs.
    pub label: String,

    /// Maximum number of concurrently open sessions.
    pub max_sessions: usize,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            label: "keyfort".into(),
            max_sessions: TableConfig::default().max_sessions,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionInfo
// ---------------------------------------------------------------------------

/// A point-in-time description of one open session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionInfo {
    /// The session's handle.
    pub handle: SessionHandle,
    /// The access mode it was opened with.
    pub mode: SessionMode,
    /// Its login state at the moment of the query.
    pub state: SessionState,
}

// ---------------------------------------------------------------------------
// Token
// ---------------------------------------------------------------------------

/// The active login: which role, and the session that performed it.
///
/// Holding the session context itself (not its handle) keeps the
/// context alive and unambiguous even after its slot is closed and the
/// handle reissued; the implicit logout on last close still reaches the
/// right context.
struct ActiveLogin {
    user: UserType,
    session: Arc<Session>,
}

/// One cryptographic token instance.
pub struct Token {
    label: String,
    sessions: SessionTable,
    login: Mutex<Option<ActiveLogin>>,
}

impl Token {
    /// Builds a token with an empty session table.
    pub fn new(config: TokenConfig) -> Self {
        Self {
            label: config.label,
            sessions: SessionTable::new(TableConfig {
                max_sessions: config.max_sessions,
            }),
            login: Mutex::new(None),
        }
    }

    /// The token's label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The session table, for callers composing their own table-level
    /// operations.
    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    // -- Session lifecycle ------------------------------------------------

    /// Opens a session and returns its handle.
    ///
    /// A read-only session is refused while the security officer is
    /// logged in ([`TokenError::SoSessionExists`]). Sessions opened
    /// while a login is active start in the corresponding logged-in
    /// state.
    pub fn open_session(
        &self,
        mode: SessionMode,
    ) -> Result<SessionHandle, TokenError> {
        let mut table = self.sessions.lock();

        let active = self.active_login_role();
        if mode == SessionMode::ReadOnly
            && active == Some(UserType::SecurityOfficer)
        {
            return Err(TokenError::SoSessionExists);
        }

        let session = table.open(mode, active)?;
        Ok(session.handle())
    }

    /// Closes the session for `handle`.
    ///
    /// If this was the last open session and a login was active, the
    /// token is logged out as part of the close.
    pub fn close_session(
        &self,
        handle: SessionHandle,
    ) -> Result<(), TokenError> {
        self.sessions.close(self, handle)?;
        Ok(())
    }

    /// Closes every open session, logging the token out along the way
    /// if a login was active.
    pub fn close_all_sessions(&self) {
        self.sessions.close_all(self);
    }

    // -- Login / logout ---------------------------------------------------

    /// Logs `user` in through the session identified by `handle` and
    /// broadcasts the transition into every open session.
    ///
    /// Rejected when any login is already active
    /// ([`TokenError::AlreadyLoggedIn`]) and when the security officer
    /// attempts to log in while read-only sessions are open
    /// ([`TokenError::ReadOnlySessionExists`]). Credential checking
    /// belongs to the cryptographic layer above and happens before
    /// this is called.
    pub fn login(
        &self,
        handle: SessionHandle,
        user: UserType,
    ) -> Result<(), TokenError> {
        let table = self.sessions.lock();
        let session = table
            .get(handle)
            .cloned()
            .ok_or(SessionError::InvalidHandle(handle))?;

        let mut login = self.lock_login();
        if let Some(active) = &*login {
            return Err(TokenError::AlreadyLoggedIn(active.user));
        }
        if user == UserType::SecurityOfficer && table.counts().ro > 0 {
            return Err(TokenError::ReadOnlySessionExists);
        }
        *login = Some(ActiveLogin {
            user,
            session: Arc::clone(&session),
        });
        // Released before any session lock is taken below.
        drop(login);

        let mut state = session.lock_state();
        table.login_event(user, &session, &mut state);

        tracing::info!(token = %self.label, %handle, %user, "login");
        Ok(())
    }

    /// Logs the active user out through the session identified by
    /// `handle` and broadcasts the transition into every open session.
    ///
    /// Any open session may issue the logout, not only the one that
    /// logged in.
    pub fn logout(
        &self,
        handle: SessionHandle,
    ) -> Result<(), TokenError> {
        let table = self.sessions.lock();
        let session = table
            .get(handle)
            .cloned()
            .ok_or(SessionError::InvalidHandle(handle))?;

        let mut login = self.lock_login();
        if login.is_none() {
            return Err(TokenError::NotLoggedIn);
        }
        // Dropping the record also releases the cached login context;
        // if its session was closed earlier, this is where it goes away.
        *login = None;
        drop(login);

        let mut state = session.lock_state();
        table.logout_event(&session, &mut state);

        tracing::info!(token = %self.label, %handle, "logout");
        Ok(())
    }

    // -- Queries ----------------------------------------------------------

    /// A consistent `(all, rw, ro)` session-count snapshot.
    pub fn session_counts(&self) -> SessionCounts {
        self.sessions.counts()
    }

    /// The session context for `handle`, if that session is open.
    pub fn session(&self, handle: SessionHandle) -> Option<Arc<Session>> {
        self.sessions.lookup(handle)
    }

    /// Handle, mode, and login state of one open session.
    pub fn session_info(
        &self,
        handle: SessionHandle,
    ) -> Result<SessionInfo, TokenError> {
        let session = self
            .sessions
            .lookup(handle)
            .ok_or(SessionError::InvalidHandle(handle))?;
        Ok(SessionInfo {
            handle,
            mode: session.mode(),
            state: session.state(),
        })
    }

    /// The role currently logged in, if any.
    pub fn active_user(&self) -> Option<UserType> {
        self.lock_login().as_ref().map(|l| l.user)
    }

    /// `true` while any login is active.
    pub fn is_logged_in(&self) -> bool {
        self.active_user().is_some()
    }

    // -- Internals --------------------------------------------------------

    fn lock_login(
        &self,
    ) -> std::sync::MutexGuard<'_, Option<ActiveLogin>> {
        self.login.lock().expect("token login lock poisoned")
    }

    fn active_login_role(&self) -> Option<UserType> {
        self.lock_login().as_ref().map(|l| l.user)
    }
}

/// The owner-side answer to the session table's one question: on last
/// close, hand over (and forget) the active login so the table can run
/// the implicit logout.
impl LoginAuthority for Token {
    fn end_login(&self) -> Option<Arc<Session>> {
        let ended = self.lock_login().take()?;
        tracing::debug!(token = %self.label, user = %ended.user, "login ended");
        Some(ended.session)
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // -- Helpers ----------------------------------------------------------

    fn token(max_sessions: usize) -> Token {
        Token::new(TokenConfig {
            label: "test-token".into(),
            max_sessions,
        })
    }

    fn counts_of(t: &Token) -> (usize, usize, usize) {
        let c = t.session_counts();
        assert_eq!(c.all, c.rw + c.ro, "counter invariant broken");
        (c.all, c.rw, c.ro)
    }

    // =====================================================================
    // open_session()
    // =====================================================================

    #[test]
    fn test_open_session_returns_handles_and_counts() {
        let t = token(4);

        let a = t.open_session(SessionMode::ReadOnly).unwrap();
        let b = t.open_session(SessionMode::ReadWrite).unwrap();

        assert_ne!(a, b);
        assert_eq!(counts_of(&t), (2, 1, 1));
    }

    #[test]
    fn test_open_session_beyond_capacity_fails() {
        let t = token(1);
        t.open_session(SessionMode::ReadOnly).unwrap();

        let result = t.open_session(SessionMode::ReadOnly);

        assert!(matches!(
            result,
            Err(TokenError::Session(SessionError::TooManySessions(1)))
        ));
    }

    #[test]
    fn test_open_session_read_only_during_so_login_is_refused() {
        let t = token(4);
        let rw = t.open_session(SessionMode::ReadWrite).unwrap();
        t.login(rw, UserType::SecurityOfficer).unwrap();

        let result = t.open_session(SessionMode::ReadOnly);

        assert!(matches!(result, Err(TokenError::SoSessionExists)));
        // Read-write sessions are still fine.
        t.open_session(SessionMode::ReadWrite).unwrap();
    }

    #[test]
    fn test_open_session_during_user_login_starts_logged_in() {
        let t = token(4);
        let first = t.open_session(SessionMode::ReadWrite).unwrap();
        t.login(first, UserType::User).unwrap();

        let second = t.open_session(SessionMode::ReadOnly).unwrap();

        let info = t.session_info(second).unwrap();
        assert_eq!(info.state, SessionState::RoUser);
    }

    // =====================================================================
    // login()
    // =====================================================================

    #[test]
    fn test_login_user_transitions_every_open_session() {
        let t = token(4);
        let ro = t.open_session(SessionMode::ReadOnly).unwrap();
        let rw = t.open_session(SessionMode::ReadWrite).unwrap();

        t.login(rw, UserType::User).unwrap();

        assert_eq!(t.active_user(), Some(UserType::User));
        assert_eq!(
            t.session_info(ro).unwrap().state,
            SessionState::RoUser
        );
        assert_eq!(
            t.session_info(rw).unwrap().state,
            SessionState::RwUser
        );
    }

    #[test]
    fn test_login_twice_is_refused_with_active_role() {
        let t = token(4);
        let rw = t.open_session(SessionMode::ReadWrite).unwrap();
        t.login(rw, UserType::User).unwrap();

        let again = t.login(rw, UserType::User);
        assert!(matches!(
            again,
            Err(TokenError::AlreadyLoggedIn(UserType::User))
        ));

        // The other role is refused just the same.
        let so = t.login(rw, UserType::SecurityOfficer);
        assert!(matches!(
            so,
            Err(TokenError::AlreadyLoggedIn(UserType::User))
        ));
    }

    #[test]
    fn test_login_so_with_read_only_session_open_is_refused() {
        let t = token(4);
        t.open_session(SessionMode::ReadOnly).unwrap();
        let rw = t.open_session(SessionMode::ReadWrite).unwrap();

        let result = t.login(rw, UserType::SecurityOfficer);

        assert!(matches!(
            result,
            Err(TokenError::ReadOnlySessionExists)
        ));
        assert!(!t.is_logged_in());
    }

    #[test]
    fn test_login_so_with_only_read_write_sessions_succeeds() {
        let t = token(4);
        let a = t.open_session(SessionMode::ReadWrite).unwrap();
        let b = t.open_session(SessionMode::ReadWrite).unwrap();

        t.login(a, UserType::SecurityOfficer).unwrap();

        assert_eq!(
            t.session_info(b).unwrap().state,
            SessionState::RwSecurityOfficer
        );
    }

    #[test]
    fn test_login_with_invalid_handle_is_refused() {
        let t = token(4);

        let result = t.login(SessionHandle(9), UserType::User);

        assert!(matches!(
            result,
            Err(TokenError::Session(SessionError::InvalidHandle(_)))
        ));
        assert!(!t.is_logged_in());
    }

    // =====================================================================
    // logout()
    // =====================================================================

    #[test]
    fn test_logout_returns_every_session_to_public() {
        let t = token(4);
        let ro = t.open_session(SessionMode::ReadOnly).unwrap();
        let rw = t.open_session(SessionMode::ReadWrite).unwrap();
        t.login(rw, UserType::User).unwrap();

        // Any session may issue the logout, not just the login one.
        t.logout(ro).unwrap();

        assert!(!t.is_logged_in());
        assert_eq!(
            t.session_info(ro).unwrap().state,
            SessionState::RoPublic
        );
        assert_eq!(
            t.session_info(rw).unwrap().state,
            SessionState::RwPublic
        );
    }

    #[test]
    fn test_logout_without_login_is_refused() {
        let t = token(4);
        let s = t.open_session(SessionMode::ReadOnly).unwrap();

        let result = t.logout(s);

        assert!(matches!(result, Err(TokenError::NotLoggedIn)));
    }

    // =====================================================================
    // close_session() and the implicit logout
    // =====================================================================

    #[test]
    fn test_close_last_session_logs_token_out() {
        let t = token(4);
        let a = t.open_session(SessionMode::ReadWrite).unwrap();
        let b = t.open_session(SessionMode::ReadOnly).unwrap();
        t.login(a, UserType::User).unwrap();

        t.close_session(b).unwrap();
        assert!(t.is_logged_in(), "non-last close must not log out");

        t.close_session(a).unwrap();
        assert!(!t.is_logged_in(), "last close must log out");
        assert_eq!(counts_of(&t), (0, 0, 0));
    }

    #[test]
    fn test_close_login_session_keeps_login_until_last_close() {
        let t = token(4);
        let login_session =
            t.open_session(SessionMode::ReadWrite).unwrap();
        let other = t.open_session(SessionMode::ReadOnly).unwrap();
        t.login(login_session, UserType::User).unwrap();

        // Closing the session that logged in does not end the login
        // while other sessions remain open.
        t.close_session(login_session).unwrap();
        assert!(t.is_logged_in());
        assert_eq!(
            t.session_info(other).unwrap().state,
            SessionState::RoUser
        );

        t.close_session(other).unwrap();
        assert!(!t.is_logged_in());
    }

    #[test]
    fn test_close_session_handle_is_reusable_afterwards() {
        let t = token(2);
        let a = t.open_session(SessionMode::ReadOnly).unwrap();
        t.close_session(a).unwrap();

        let b = t.open_session(SessionMode::ReadWrite).unwrap();

        assert_eq!(a, b);
        assert_eq!(
            t.session_info(b).unwrap().mode,
            SessionMode::ReadWrite
        );
    }

    #[test]
    fn test_close_invalid_handle_is_refused() {
        let t = token(2);

        let result = t.close_session(SessionHandle(0));

        assert!(matches!(
            result,
            Err(TokenError::Session(SessionError::InvalidHandle(_)))
        ));
    }

    // =====================================================================
    // close_all_sessions()
    // =====================================================================

    #[test]
    fn test_close_all_sessions_logs_out_and_empties_table() {
        let t = token(4);
        let a = t.open_session(SessionMode::ReadWrite).unwrap();
        t.open_session(SessionMode::ReadOnly).unwrap();
        t.open_session(SessionMode::ReadOnly).unwrap();
        t.login(a, UserType::User).unwrap();

        t.close_all_sessions();

        assert_eq!(counts_of(&t), (0, 0, 0));
        assert!(!t.is_logged_in());
    }

    // =====================================================================
    // Queries
    // =====================================================================

    #[test]
    fn test_session_info_reports_identity_mode_and_state() {
        let t = token(2);
        let h = t.open_session(SessionMode::ReadWrite).unwrap();

        let info = t.session_info(h).unwrap();

        assert_eq!(info.handle, h);
        assert_eq!(info.mode, SessionMode::ReadWrite);
        assert_eq!(info.state, SessionState::RwPublic);
    }

    #[test]
    fn test_session_info_invalid_handle_is_refused() {
        let t = token(2);
        let result = t.session_info(SessionHandle(1));
        assert!(matches!(
            result,
            Err(TokenError::Session(SessionError::InvalidHandle(_)))
        ));
    }

    #[test]
    fn test_label_round_trips_from_config() {
        let t = token(2);
        assert_eq!(t.label(), "test-token");
    }
}
