//! Session persistence layer
//!
//! Every access to a user's session goes through a lease. Leases for the
//! same user are handed out one at a time; leases for different users are
//! independent. Currently in-memory only, with idle sessions swept out
//! periodically.

use crate::models::{DialogueState, Session, UserId};
use crate::Result;
use chrono::Utc;
use dashmap::DashMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::info;

/// Exclusive access to one user's session until dropped.
pub struct SessionLease {
    guard: OwnedMutexGuard<Session>,
}

impl SessionLease {
    pub fn new(guard: OwnedMutexGuard<Session>) -> Self {
        Self { guard }
    }

    /// Replace the stored session wholesale.
    pub fn commit(&mut self, session: Session) {
        *self.guard = session;
    }
}

impl Deref for SessionLease {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.guard
    }
}

impl DerefMut for SessionLease {
    fn deref_mut(&mut self) -> &mut Session {
        &mut self.guard
    }
}

/// Trait for session storage
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Lease the user's session, creating it in the initial state if needed.
    async fn acquire(&self, user_id: UserId) -> Result<SessionLease>;

    /// Number of sessions currently tracked.
    async fn len(&self) -> usize;

    async fn get(&self, user_id: UserId) -> Result<Session> {
        let lease = self.acquire(user_id).await?;
        Ok(Session::clone(&lease))
    }

    async fn clear(&self, user_id: UserId) -> Result<()> {
        let mut lease = self.acquire(user_id).await?;
        lease.reset();
        Ok(())
    }
}

impl dyn SessionStore {
    /// Atomic read-modify-write of one session.
    pub async fn update<T, F>(&self, user_id: UserId, mutator: F) -> Result<T>
    where
        F: FnOnce(&mut Session) -> T,
    {
        let mut lease = self.acquire(user_id).await?;
        Ok(mutator(&mut lease))
    }
}

/// In-memory session store, one lock per user
pub struct InMemorySessionStore {
    sessions: Arc<DashMap<UserId, Arc<Mutex<Session>>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
        }
    }

    /// Drop sessions sitting in `Start` that have not changed for
    /// `max_idle`. Returns how many were removed.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let Ok(max_idle) = chrono::Duration::from_std(max_idle) else {
            return 0;
        };
        let cutoff = Utc::now() - max_idle;
        let mut evicted = 0;

        self.sessions.retain(|_, slot| {
            // leases (held or awaited) clone the slot under the shard lock
            // that `retain` holds now
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            let idle = match slot.try_lock() {
                Ok(session) => session.state == DialogueState::Start && session.updated_at < cutoff,
                Err(_) => false,
            };
            if idle {
                evicted += 1;
            }
            !idle
        });

        evicted
    }

    /// Run [`evict_idle`](Self::evict_idle) every `every` until the store
    /// is dropped.
    pub fn spawn_idle_sweeper(self: &Arc<Self>, every: Duration, max_idle: Duration) -> JoinHandle<()> {
        let store = Arc::downgrade(self);
        let period = every.max(Duration::from_secs(1));

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                let evicted = store.evict_idle(max_idle);
                if evicted > 0 {
                    info!(evicted, remaining = store.sessions.len(), "Evicted idle sessions");
                }
            }
        })
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn acquire(&self, user_id: UserId) -> Result<SessionLease> {
        // the map shard lock is released before awaiting the session lock
        let slot = Arc::clone(
            &*self
                .sessions
                .entry(user_id)
                .or_insert_with(|| Arc::new(Mutex::new(Session::new(user_id)))),
        );

        Ok(SessionLease::new(slot.lock_owned().await))
    }

    async fn len(&self) -> usize {
        self.sessions.len()
    }
}
