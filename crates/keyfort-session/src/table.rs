//! The session table: the registry of every open session.
//!
//! This is the central piece of the session layer. It's responsible
//! for:
//! - Allocating handles and owning the session contexts they name
//! - Keeping the live and read-write counters the login rules consult
//! - Looking sessions up by handle
//! - Destroying sessions, including the implicit logout when the last
//!   one closes
//! - Broadcasting a login or logout into every open session
//!
//! # Locking
//!
//! Two lock tiers. The table lock guards slot occupancy, the counters,
//! and the free list; each session context separately guards its own
//! login state. The table lock is always acquired first when an
//! operation needs both, and broadcasts visit one context lock at a
//! time, so no operation ever holds two context locks together.
//!
//! The one wrinkle: a broadcast is initiated *from* a session whose
//! state guard the caller already holds. Re-locking that context would
//! self-deadlock, so the broadcast takes the caller's guard and
//! transitions the initiator through it while locking everyone else
//! normally.
//!
//! Lock acquisition is assumed to succeed barring a thread dying
//! mid-mutation; a poisoned lock halts the process, since a registry
//! whose counters may be torn cannot be safely used or repaired.

use std::sync::{Arc, Mutex, MutexGuard};

use keyfort_types::{SessionCounts, SessionHandle, SessionMode, UserType};

use crate::{LoginAuthority, Session, SessionError, SessionState};

// ---------------------------------------------------------------------------
// TableConfig
// ---------------------------------------------------------------------------

/// Configuration for the session table.
#[derive(Debug, Clone)]
pub struct TableConfig {
    /// Maximum number of concurrently open sessions. Fixed for the
    /// table's lifetime; every issued handle is below this bound.
    ///
    /// Default: 64.
    pub max_sessions: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self { max_sessions: 64 }
    }
}

// ---------------------------------------------------------------------------
// SessionTable
// ---------------------------------------------------------------------------

/// The registry of open sessions, behind a single table-level lock.
///
/// Most callers use the locking convenience methods ([`counts`],
/// [`lookup`], [`close`], [`close_all`]). Callers composing several
/// table operations atomically (the token's login path, for instance)
/// take [`SessionTable::lock`] once and work on the [`TableState`]
/// directly.
///
/// [`counts`]: SessionTable::counts
/// [`lookup`]: SessionTable::lookup
/// [`close`]: SessionTable::close
/// [`close_all`]: SessionTable::close_all
pub struct SessionTable {
    state: Mutex<TableState>,
}

/// Everything the table lock guards.
///
/// Reachable only through [`SessionTable::lock`], so every method on
/// this type runs with the table lock held.
pub struct TableState {
    /// The slot arena. A handle is its slot's index; a slot is
    /// occupied exactly while its handle is valid for lookup.
    slots: Box<[Option<Arc<Session>>]>,

    /// Handles available for allocation. Seeded in reverse so the
    /// lowest handles are issued first; freed handles are pushed back
    /// and reused before untouched ones. Allocation never scans the
    /// arena, and a table that has churned through more sessions than
    /// it has slots keeps working.
    free: Vec<SessionHandle>,

    /// Number of occupied slots.
    live: usize,

    /// Occupied slots whose session state is read-write.
    rw: usize,
}

impl SessionTable {
    /// Builds an empty table with `config.max_sessions` slots.
    pub fn new(config: TableConfig) -> Self {
        let free = (0..config.max_sessions)
            .rev()
            .map(SessionHandle)
            .collect();
        Self {
            state: Mutex::new(TableState {
                slots: vec![None; config.max_sessions].into_boxed_slice(),
                free,
                live: 0,
                rw: 0,
            }),
        }
    }

    /// Takes the table lock.
    ///
    /// A poisoned lock means a thread died while mutating the registry;
    /// the counters can no longer be trusted, so this halts rather than
    /// limping on.
    pub fn lock(&self) -> MutexGuard<'_, TableState> {
        self.state.lock().expect("session table lock poisoned")
    }

    /// Number of slots this table was built with.
    pub fn capacity(&self) -> usize {
        self.lock().slots.len()
    }

    /// A consistent `(all, rw, ro)` snapshot.
    pub fn counts(&self) -> SessionCounts {
        self.lock().counts()
    }

    /// Finds the session for `handle`, if one is open.
    ///
    /// The returned reference keeps the context alive regardless of
    /// what happens to its slot; callers take the session's own state
    /// guard when they need the login state.
    pub fn lookup(&self, handle: SessionHandle) -> Option<Arc<Session>> {
        self.lock().get(handle).cloned()
    }

    /// Closes one session. See [`TableState::close`].
    pub fn close(
        &self,
        authority: &dyn LoginAuthority,
        handle: SessionHandle,
    ) -> Result<(), SessionError> {
        self.lock().close(authority, handle)
    }

    /// Closes every open session under one lock acquisition. See
    /// [`TableState::close_all`].
    pub fn close_all(&self, authority: &dyn LoginAuthority) {
        self.lock().close_all(authority);
    }
}

impl TableState {
    /// Opens a session: allocates a handle, builds the context, and
    /// updates the counters.
    ///
    /// `active_login` seeds the context's initial state so sessions
    /// opened mid-login start logged in. Fails with
    /// [`SessionError::TooManySessions`] once every slot is occupied.
    pub fn open(
        &mut self,
        mode: SessionMode,
        active_login: Option<UserType>,
    ) -> Result<Arc<Session>, SessionError> {
        let handle = self
            .free
            .pop()
            .ok_or(SessionError::TooManySessions(self.live))?;

        let slot = &mut self.slots[handle.index()];
        assert!(slot.is_none(), "free list issued live handle {handle}");

        let session =
            Arc::new(Session::new(handle, mode, active_login));
        *slot = Some(Arc::clone(&session));
        self.live += 1;
        if mode.is_read_write() {
            self.rw += 1;
        }

        tracing::info!(%handle, %mode, "session opened");
        Ok(session)
    }

    /// A consistent `(all, rw, ro)` snapshot.
    pub fn counts(&self) -> SessionCounts {
        // The read-write count can never exceed the total.
        assert!(self.live >= self.rw, "session counters out of sync");
        SessionCounts {
            all: self.live,
            rw: self.rw,
            ro: self.live - self.rw,
        }
    }

    /// Raw slot access for callers already holding the table lock.
    /// Does not touch the session's own lock. Out-of-range and empty
    /// handles both come back as `None`.
    pub fn get(&self, handle: SessionHandle) -> Option<&Arc<Session>> {
        self.slots.get(handle.index())?.as_ref()
    }

    /// Closes the session for `handle`.
    ///
    /// Fails with [`SessionError::InvalidHandle`] if the slot is empty
    /// or out of range, leaving all state untouched.
    pub fn close(
        &mut self,
        authority: &dyn LoginAuthority,
        handle: SessionHandle,
    ) -> Result<(), SessionError> {
        if self.get(handle).is_none() {
            return Err(SessionError::InvalidHandle(handle));
        }
        self.destroy(authority, handle);
        Ok(())
    }

    /// Closes every open session, visiting slots in handle order.
    ///
    /// Used for bulk teardown. Each removal goes through the same
    /// destruction step as a single close, so the implicit logout still
    /// fires when the sweep empties the table.
    pub fn close_all(&mut self, authority: &dyn LoginAuthority) {
        for index in 0..self.slots.len() {
            if self.slots[index].is_some() {
                self.destroy(authority, SessionHandle(index));
            }
        }
    }

    /// The destruction step for one occupied slot. Callers have
    /// already validated `handle`.
    ///
    /// Ordering matters here: the counters drop first, the implicit
    /// logout runs while the slot is still occupied (the cached login
    /// context may be this very session), and only then is the slot
    /// cleared and the handle reclaimed.
    fn destroy(
        &mut self,
        authority: &dyn LoginAuthority,
        handle: SessionHandle,
    ) {
        let state = self.slots[handle.index()]
            .as_ref()
            .expect("destroying an empty slot")
            .state();

        if state.is_read_write() {
            assert!(self.rw > 0, "read-write session count underflow");
            self.rw -= 1;
        }
        self.live -= 1;

        // Closing the last session logs the token out.
        if self.live == 0 {
            self.logout_last(authority);
        }

        self.slots[handle.index()] = None;
        self.free.push(handle);
        tracing::info!(%handle, "session closed");
    }

    /// The implicit logout issued when the last session closes.
    ///
    /// The authority hands over the context that performed the login,
    /// clearing its own record in the same step. That context may be
    /// the session currently being destroyed, or one whose slot was
    /// reclaimed long ago and that only the login kept alive; either
    /// way it is locked, returned to its public state, and released.
    fn logout_last(&self, authority: &dyn LoginAuthority) {
        let Some(login_session) = authority.end_login() else {
            return;
        };
        let handle = login_session.handle();
        login_session.lock_state().logout();
        tracing::info!(%handle, "last session closed, token logged out");
    }

    /// Delivers a login for `user` to every open session, in handle
    /// order.
    ///
    /// Each context is locked for the duration of its own transition,
    /// except the initiating session: the caller already holds its
    /// state guard (taking it again would self-deadlock), so the
    /// initiator is transitioned through `initiator_state` instead.
    pub fn login_event(
        &self,
        user: UserType,
        initiator: &Session,
        initiator_state: &mut SessionState,
    ) {
        for slot in self.slots.iter() {
            let Some(ctx) = slot else { continue };
            if std::ptr::eq(ctx.as_ref(), initiator) {
                initiator_state.login(user);
            } else {
                ctx.lock_state().login(user);
            }
        }
    }

    /// Delivers a logout to every open session, in handle order, with
    /// the same initiator exclusion as [`TableState::login_event`].
    pub fn logout_event(
        &self,
        initiator: &Session,
        initiator_state: &mut SessionState,
    ) {
        for slot in self.slots.iter() {
            let Some(ctx) = slot else { continue };
            if std::ptr::eq(ctx.as_ref(), initiator) {
                initiator_state.logout();
            } else {
                ctx.lock_state().logout();
            }
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
