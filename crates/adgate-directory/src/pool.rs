//! Bounded pool of authenticated directory sessions.
//!
//! At most `capacity` sessions are ever open. Growth is serialized by an async
//! mutex held across the dial and bind. Checked-in sessions wait on a bounded
//! channel and are probed before being handed out again. Freed slots wake
//! every waiter so one of them can grow into it.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, instrument, warn};

use crate::config::DirectoryConfig;
use crate::error::{DirectoryError, DirectoryResult};
use crate::session::{DirectorySession, SessionFactory};

struct IdleSession<S> {
    slot: usize,
    session: S,
}

/// Slot bookkeeping. Slot ids are stable: a replacement reuses the id of the
/// session it replaces, and a vacated id is handed out again before new ones.
#[derive(Debug, Default)]
struct SlotLedger {
    created: usize,
    vacant: Vec<usize>,
}

impl SlotLedger {
    fn claim(&mut self, capacity: usize) -> Option<usize> {
        if let Some(slot) = self.vacant.pop() {
            return Some(slot);
        }
        if self.created < capacity {
            self.created += 1;
            return Some(self.created - 1);
        }
        None
    }

    fn vacate(&mut self, slot: usize) {
        self.vacant.push(slot);
    }

    fn live(&self) -> usize {
        self.created - self.vacant.len()
    }
}

struct PoolInner<F: SessionFactory> {
    factory: F,
    capacity: usize,
    acquire_timeout: Duration,
    idle_tx: mpsc::Sender<IdleSession<F::Session>>,
    idle_rx: Mutex<mpsc::Receiver<IdleSession<F::Session>>>,
    /// Held across the dial of a new session.
    growth: Mutex<()>,
    /// Never held across an await.
    slots: std::sync::Mutex<SlotLedger>,
    vacated: Notify,
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub capacity: usize,
    /// Slots ever instantiated.
    pub created: usize,
    /// Sessions currently open, idle or checked out.
    pub live: usize,
    pub idle: usize,
}

/// Shared handle to the pool. Cloning is cheap.
pub struct ConnectionPool<F: SessionFactory> {
    inner: Arc<PoolInner<F>>,
}

impl<F: SessionFactory> Clone for ConnectionPool<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: SessionFactory> ConnectionPool<F> {
    pub fn new(factory: F, capacity: usize, acquire_timeout: Duration) -> Self {
        let capacity = capacity.max(1);
        let (idle_tx, idle_rx) = mpsc::channel(capacity);
        Self {
            inner: Arc::new(PoolInner {
                factory,
                capacity,
                acquire_timeout,
                idle_tx,
                idle_rx: Mutex::new(idle_rx),
                growth: Mutex::new(()),
                slots: std::sync::Mutex::new(SlotLedger::default()),
                vacated: Notify::new(),
            }),
        }
    }

    pub fn from_config(factory: F, config: &DirectoryConfig) -> Self {
        Self::new(factory, config.pool_size, config.acquire_timeout())
    }

    pub fn factory(&self) -> &F {
        &self.inner.factory
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Check out a session.
    ///
    /// Prefers a queued idle session, then grows the pool while below capacity,
    /// and otherwise waits for a check-in or a freed slot up to the acquire
    /// timeout.
    #[instrument(level = "debug", skip(self))]
    pub async fn acquire(&self) -> DirectoryResult<PooledConnection<F>> {
        let deadline = Instant::now() + self.inner.acquire_timeout;
        loop {
            // A waiter holding the receiver means the queue is empty anyway.
            let queued = match self.inner.idle_rx.try_lock() {
                Ok(mut rx) => rx.try_recv().ok(),
                Err(_) => None,
            };
            if let Some(idle) = queued {
                return self.revive(idle).await;
            }

            // Registered before the ledger check so a slot freed in between
            // still wakes this caller.
            let vacated = self.inner.vacated.notified();
            tokio::pin!(vacated);
            vacated.as_mut().enable();

            if let Some(result) = self.grow().await {
                return result;
            }

            let waited = timeout_at(deadline, async {
                let mut rx = tokio::select! {
                    rx = self.inner.idle_rx.lock() => rx,
                    _ = vacated.as_mut() => return None,
                };
                tokio::select! {
                    idle = rx.recv() => Some(idle),
                    _ = vacated.as_mut() => None,
                }
            })
            .await;

            match waited {
                Ok(Some(Some(idle))) => return self.revive(idle).await,
                Ok(Some(None)) => {
                    return Err(DirectoryError::internal("connection pool channel closed"))
                }
                Ok(None) => debug!("Directory connection slot freed, retrying acquire"),
                Err(_) => {
                    warn!(
                        capacity = self.inner.capacity,
                        timeout_secs = self.inner.acquire_timeout.as_secs(),
                        "Timed out waiting for an idle directory connection"
                    );
                    return Err(DirectoryError::timeout(
                        "acquire directory connection",
                        self.inner.acquire_timeout,
                    ));
                }
            }
        }
    }

    /// Dial into a free slot, if there is one.
    async fn grow(&self) -> Option<DirectoryResult<PooledConnection<F>>> {
        let _growth = self.inner.growth.lock().await;
        let slot = self.inner.ledger().claim(self.inner.capacity)?;
        debug!(slot, "Opening new pooled directory connection");
        Some(match self.inner.factory.open().await {
            Ok(session) => Ok(self.checkout(slot, session)),
            Err(e) => {
                self.inner.vacate(slot);
                Err(e)
            }
        })
    }

    /// Probe an idle session and replace it in the same slot if it is dead.
    async fn revive(
        &self,
        idle: IdleSession<F::Session>,
    ) -> DirectoryResult<PooledConnection<F>> {
        let IdleSession { slot, mut session } = idle;
        if session.is_alive().await {
            return Ok(self.checkout(slot, session));
        }

        warn!(slot, "Pooled directory connection failed liveness probe, reconnecting");
        session.close().await;
        match self.inner.factory.open().await {
            Ok(fresh) => Ok(self.checkout(slot, fresh)),
            Err(e) => {
                self.inner.vacate(slot);
                Err(e)
            }
        }
    }

    fn checkout(&self, slot: usize, session: F::Session) -> PooledConnection<F> {
        PooledConnection {
            session: Some(session),
            slot,
            pool: Arc::clone(&self.inner),
        }
    }

    /// Return a session to the idle queue. Equivalent to dropping it.
    pub fn release(&self, conn: PooledConnection<F>) {
        drop(conn);
    }

    pub async fn status(&self) -> PoolStatus {
        let ledger = self.inner.ledger();
        PoolStatus {
            capacity: self.inner.capacity,
            created: ledger.created,
            live: ledger.live(),
            idle: self.inner.idle_tx.max_capacity() - self.inner.idle_tx.capacity(),
        }
    }

    /// Unbind every idle session. Checked-out sessions are unaffected.
    pub async fn close(&self) {
        let mut rx = self.inner.idle_rx.lock().await;
        while let Ok(IdleSession { slot, mut session }) = rx.try_recv() {
            session.close().await;
            self.inner.vacate(slot);
        }
        debug!(live = self.inner.ledger().live(), "Closed idle directory connections");
    }
}

impl<F: SessionFactory> PoolInner<F> {
    fn ledger(&self) -> std::sync::MutexGuard<'_, SlotLedger> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn vacate(&self, slot: usize) {
        self.ledger().vacate(slot);
        self.vacated.notify_waiters();
    }

    fn put_back(self: &Arc<Self>, slot: usize, session: F::Session) {
        match self.idle_tx.try_send(IdleSession { slot, session }) {
            Ok(()) => debug!(slot, "Directory connection returned to pool"),
            Err(TrySendError::Full(idle)) | Err(TrySendError::Closed(idle)) => {
                warn!(slot, "Idle queue unavailable, closing directory connection");
                self.discard(idle);
            }
        }
    }

    fn discard(self: &Arc<Self>, idle: IdleSession<F::Session>) {
        let IdleSession { slot, mut session } = idle;
        match Handle::try_current() {
            Ok(handle) => {
                let pool = Arc::clone(self);
                handle.spawn(async move {
                    session.close().await;
                    pool.vacate(slot);
                });
            }
            Err(_) => {
                drop(session);
                self.vacate(slot);
            }
        }
    }
}

/// A checked-out session. Returned to the pool when dropped.
pub struct PooledConnection<F: SessionFactory> {
    session: Option<F::Session>,
    slot: usize,
    pool: Arc<PoolInner<F>>,
}

impl<F: SessionFactory> PooledConnection<F> {
    /// Stable identifier of the pool slot this session occupies.
    pub fn slot(&self) -> usize {
        self.slot
    }
}

impl<F: SessionFactory> Deref for PooledConnection<F> {
    type Target = F::Session;

    fn deref(&self) -> &Self::Target {
        self.session
            .as_ref()
            .expect("session is present until the connection is dropped")
    }
}

impl<F: SessionFactory> DerefMut for PooledConnection<F> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session
            .as_mut()
            .expect("session is present until the connection is dropped")
    }
}

impl<F: SessionFactory> Drop for PooledConnection<F> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            self.pool.put_back(self.slot, session);
        }
    }
}
