//! Session store: per-session conversation state with bounded lifetime.
//!
//! The store-wide index is a `std::sync::Mutex<HashMap>` that is only held
//! for map operations, never across an await. Each session's history sits
//! behind its own `tokio::sync::Mutex`, held by a request for the whole
//! turn so turns within one session are serialized. Last activity is kept
//! in an atomic next to the history so the sweep can read it without
//! touching the history lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::types::{Session, Turn};

/// Shared handle to one live session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: Uuid,
    state: Arc<AsyncMutex<Session>>,
    last_activity_ms: Arc<AtomicI64>,
}

impl SessionHandle {
    fn new(session: Session) -> Self {
        let millis = session.last_activity.timestamp_millis();
        Self {
            id: session.id,
            state: Arc::new(AsyncMutex::new(session)),
            last_activity_ms: Arc::new(AtomicI64::new(millis)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        millis_to_datetime(self.last_activity_ms.load(Ordering::Acquire))
    }

    fn touch(&self, now: DateTime<Utc>) {
        self.last_activity_ms
            .fetch_max(now.timestamp_millis(), Ordering::AcqRel);
    }

    fn is_expired(&self, now: DateTime<Utc>, expiry: Duration) -> bool {
        let idle_ms = now.timestamp_millis() - self.last_activity_ms.load(Ordering::Acquire);
        idle_ms > expiry.num_milliseconds()
    }

    fn is_busy(&self) -> bool {
        self.state.try_lock().is_err()
    }

    /// Take exclusive access to the session history for one turn.
    pub async fn lock(&self) -> LockedSession {
        LockedSession {
            guard: self.state.clone().lock_owned().await,
            last_activity_ms: self.last_activity_ms.clone(),
        }
    }
}

/// Exclusive access to a session's history, held for one turn.
#[derive(Debug)]
pub struct LockedSession {
    guard: OwnedMutexGuard<Session>,
    last_activity_ms: Arc<AtomicI64>,
}

impl LockedSession {
    pub fn session(&self) -> &Session {
        &self.guard
    }

    pub fn turns(&self) -> &[Turn] {
        &self.guard.turns
    }

    fn push(&mut self, turn: Turn, now: DateTime<Utc>) {
        self.guard.turns.push(turn);
        self.guard.touch(now);
        self.last_activity_ms
            .fetch_max(now.timestamp_millis(), Ordering::AcqRel);
    }
}

/// Mapping from session id to conversation state. Owns expiry and cleanup.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Return the live session for `session_id`, or create a fresh one with
    /// a new id when the id is absent, unknown, or expired. The flag is
    /// `true` for newly created sessions. Refreshes last activity.
    fn resolve(&self, session_id: Option<Uuid>, now: DateTime<Utc>) -> (SessionHandle, bool);

    /// Append a turn to a locked session and refresh its last activity.
    fn append_turn(&self, session: &mut LockedSession, turn: Turn, now: DateTime<Utc>);

    /// Remove every idle, unlocked session past the expiry window.
    /// Returns how many were removed.
    fn sweep(&self, now: DateTime<Utc>) -> usize;

    /// Create an empty session.
    fn create(&self, now: DateTime<Utc>) -> SessionHandle;

    /// Snapshot of a live session. Waits for any in-flight turn.
    async fn get(&self, session_id: Uuid) -> Option<Session>;

    fn remove(&self, session_id: Uuid) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-lifetime, in-memory session store.
#[derive(Debug)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<Uuid, SessionHandle>>,
    expiry: Duration,
}

impl InMemorySessionStore {
    pub fn new(expiry_minutes: u32) -> Self {
        Self::with_expiry(Duration::minutes(i64::from(expiry_minutes)))
    }

    pub fn with_expiry(expiry: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            expiry,
        }
    }

    pub fn expiry(&self) -> Duration {
        self.expiry
    }

    // A poisoned index only means another thread panicked mid-insert/remove;
    // the map itself is still consistent.
    fn index(&self) -> MutexGuard<'_, HashMap<Uuid, SessionHandle>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn insert_new(
        sessions: &mut HashMap<Uuid, SessionHandle>,
        now: DateTime<Utc>,
    ) -> SessionHandle {
        let handle = SessionHandle::new(Session::new(Uuid::new_v4(), now));
        sessions.insert(handle.id(), handle.clone());
        debug!(session_id = %handle.id(), "Created session");
        handle
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    fn resolve(&self, session_id: Option<Uuid>, now: DateTime<Utc>) -> (SessionHandle, bool) {
        let mut sessions = self.index();

        if let Some(id) = session_id {
            if let Some(handle) = sessions.get(&id) {
                if !handle.is_expired(now, self.expiry) {
                    handle.touch(now);
                    return (handle.clone(), false);
                }
                if !handle.is_busy() {
                    sessions.remove(&id);
                    debug!(session_id = %id, "Dropped expired session on access");
                }
            } else {
                debug!(session_id = %id, "Unknown session id, creating a new session");
            }
        }

        (Self::insert_new(&mut sessions, now), true)
    }

    fn append_turn(&self, session: &mut LockedSession, turn: Turn, now: DateTime<Utc>) {
        session.push(turn, now);
    }

    fn sweep(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.index();
        let before = sessions.len();
        sessions.retain(|_, handle| !handle.is_expired(now, self.expiry) || handle.is_busy());
        let removed = before - sessions.len();
        if removed > 0 {
            info!(removed, remaining = sessions.len(), "Swept expired sessions");
        }
        removed
    }

    fn create(&self, now: DateTime<Utc>) -> SessionHandle {
        Self::insert_new(&mut self.index(), now)
    }

    async fn get(&self, session_id: Uuid) -> Option<Session> {
        let handle = {
            let sessions = self.index();
            sessions.get(&session_id).cloned()
        }?;
        let mut snapshot = handle.state.lock().await.clone();
        snapshot.touch(handle.last_activity());
        Some(snapshot)
    }

    fn remove(&self, session_id: Uuid) -> bool {
        self.index().remove(&session_id).is_some()
    }

    fn len(&self) -> usize {
        self.index().len()
    }
}

/// Run `sweep` on a fixed cadence until the returned task is aborted.
pub fn spawn_sweeper(store: Arc<dyn SessionStore>, interval: StdDuration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = store.sweep(Utc::now());
            debug!(removed, active = store.len(), "Background session sweep");
        }
    })
}

fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    fn store() -> InMemorySessionStore {
        InMemorySessionStore::new(30)
    }

    fn window() -> Duration {
        Duration::minutes(30)
    }

    // ---- resolve ----

    #[test]
    fn test_resolve_without_id_creates() {
        let store = store();
        let (handle, is_new) = store.resolve(None, Utc::now());
        assert!(is_new);
        assert_eq!(handle.id().get_version_num(), 4);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_known_id_returns_same_session() {
        let store = store();
        let now = Utc::now();
        let (first, _) = store.resolve(None, now);
        {
            let mut locked = first.lock().await;
            store.append_turn(&mut locked, Turn::user("hello", now), now);
        }

        let (again, is_new) = store.resolve(Some(first.id()), now + Duration::seconds(1));
        assert!(!is_new);
        assert_eq!(again.id(), first.id());
        let locked = again.lock().await;
        assert_eq!(locked.turns().len(), 1);
        assert_eq!(locked.turns()[0].content, "hello");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_resolve_unknown_id_generates_new_id() {
        let store = store();
        let stale = Uuid::new_v4();
        let (handle, is_new) = store.resolve(Some(stale), Utc::now());
        assert!(is_new);
        assert_ne!(handle.id(), stale);
    }

    #[test]
    fn test_resolve_refreshes_activity() {
        let store = store();
        let t0 = Utc::now();
        let (handle, _) = store.resolve(None, t0);
        let later = t0 + Duration::minutes(10);
        store.resolve(Some(handle.id()), later);
        assert_eq!(handle.last_activity().timestamp_millis(), later.timestamp_millis());

        // Out-of-order clocks never move activity backwards.
        store.resolve(Some(handle.id()), t0);
        assert_eq!(handle.last_activity().timestamp_millis(), later.timestamp_millis());
    }

    #[test]
    fn test_resolve_expired_id_creates_new() {
        let store = store();
        let t0 = Utc::now();
        let (old, _) = store.resolve(None, t0);
        let (fresh, is_new) =
            store.resolve(Some(old.id()), t0 + window() + Duration::seconds(1));
        assert!(is_new);
        assert_ne!(fresh.id(), old.id());
        assert_eq!(store.len(), 1);
    }

    // ---- sweep ----

    #[test]
    fn test_sweep_expiry_boundary() {
        let store = store();
        let t0 = Utc::now();
        let (handle, _) = store.resolve(None, t0);
        let eps = Duration::seconds(1);

        assert_eq!(store.sweep(t0 + window() - eps), 0);
        assert!(!store.resolve(Some(handle.id()), t0 + window() - eps).1);

        let last = t0 + window() - eps;
        assert_eq!(store.sweep(last + window() + eps), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_sweep_is_idempotent() {
        let store = store();
        let t0 = Utc::now();
        store.resolve(None, t0);
        store.resolve(None, t0 + Duration::minutes(20));

        let now = t0 + Duration::minutes(40);
        assert_eq!(store.sweep(now), 1);
        assert_eq!(store.sweep(now), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_sweep_empty_store() {
        assert_eq!(store().sweep(Utc::now()), 0);
    }

    #[tokio::test]
    async fn test_sweep_skips_locked_session() {
        let store = store();
        let t0 = Utc::now();
        let (handle, _) = store.resolve(None, t0);
        let late = t0 + window() + Duration::minutes(1);

        let locked = handle.lock().await;
        assert_eq!(store.sweep(late), 0);
        drop(locked);
        assert_eq!(store.sweep(late), 1);
    }

    // ---- turns and snapshots ----

    #[tokio::test]
    async fn test_append_turn_refreshes_activity() {
        let store = store();
        let t0 = Utc::now();
        let (handle, _) = store.resolve(None, t0);
        let t1 = t0 + Duration::minutes(5);
        {
            let mut locked = handle.lock().await;
            store.append_turn(&mut locked, Turn::user("hi", t1), t1);
            store.append_turn(&mut locked, Turn::assistant("hello", vec![], t1), t1);
        }

        let snapshot = store.get(handle.id()).await.unwrap();
        assert_eq!(snapshot.turns.len(), 2);
        assert_eq!(snapshot.turns[0].role, Role::User);
        assert_eq!(snapshot.turns[1].role, Role::Assistant);
        assert_eq!(snapshot.last_activity.timestamp_millis(), t1.timestamp_millis());
        assert_eq!(snapshot.created_at, t0);
    }

    #[tokio::test]
    async fn test_create_get_remove() {
        let store = store();
        let handle = store.create(Utc::now());
        assert!(store.get(handle.id()).await.unwrap().turns.is_empty());
        assert!(store.remove(handle.id()));
        assert!(!store.remove(handle.id()));
        assert!(store.get(handle.id()).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawn_sweeper_removes_expired() {
        let store = Arc::new(InMemorySessionStore::with_expiry(Duration::zero()));
        store.create(Utc::now() - Duration::seconds(5));

        let task = spawn_sweeper(store.clone(), StdDuration::from_secs(60));
        tokio::time::sleep(StdDuration::from_secs(61)).await;
        tokio::task::yield_now().await;

        assert!(store.is_empty());
        task.abort();
    }
}
