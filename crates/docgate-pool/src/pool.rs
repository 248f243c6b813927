use std::fmt;
use std::io;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use docgate_protocol::{Command, Reply};
use docgate_store::{Executor, StoreError, StoreResult};
use tokio::sync::{oneshot, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::PoolConfig;
use crate::connection::{Connection, FlushWindow, Pending};
use crate::error::{PoolError, PoolResult};

/// Point-in-time pool counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolStats {
    pub size: usize,
    pub live_connections: usize,
    pub buffer_capacity: usize,
    pub available_permits: usize,
}

/// A fixed set of pipelined backend connections behind one [`Executor`].
///
/// Commands are spread round-robin over live connections. A connection that
/// owes replies and has answered none for `reply_timeout` counts as dead
/// and is replaced on the next health pass. At most
/// [`PoolConfig::buffer_capacity`] commands are outstanding at once; past
/// that, callers wait up to `full_buffer_timeout` and then fail with
/// [`StoreError::PoolExhausted`].
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
    pinger: JoinHandle<()>,
}

struct PoolInner {
    config: PoolConfig,
    slots: Vec<RwLock<Option<Arc<Connection>>>>,
    cursor: AtomicUsize,
    next_id: AtomicU64,
    permits: Semaphore,
}

impl ConnectionPool {
    /// Dial every connection and start the health checker.
    ///
    /// Slots that fail to dial start empty and are retried by the health
    /// checker; the pool only fails if no connection could be opened.
    pub async fn connect(config: PoolConfig) -> PoolResult<Self> {
        config.validate()?;
        let inner = Arc::new(PoolInner {
            slots: (0..config.size).map(|_| RwLock::new(None)).collect(),
            cursor: AtomicUsize::new(0),
            next_id: AtomicU64::new(0),
            permits: Semaphore::new(config.buffer_capacity()),
            config,
        });

        let mut last_error = None;
        for slot in &inner.slots {
            match inner.dial().await {
                Ok(conn) => *slot.write().expect("lock poisoned") = Some(Arc::new(conn)),
                Err(e) => {
                    warn!(addr = %inner.config.addr, error = %e, "backend dial failed");
                    last_error = Some(e);
                }
            }
        }

        if inner.live_connections() == 0 {
            return Err(PoolError::BackendUnavailable {
                addr: inner.config.addr.clone(),
                source: last_error
                    .unwrap_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no connections")),
            });
        }

        info!(
            addr = %inner.config.addr,
            live = inner.live_connections(),
            size = inner.config.size,
            buffer = inner.config.buffer_capacity(),
            "connection pool ready"
        );

        let pinger = tokio::spawn(health_loop(inner.clone()));
        Ok(Self { inner, pinger })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            size: self.inner.config.size,
            live_connections: self.inner.live_connections(),
            buffer_capacity: self.inner.config.buffer_capacity(),
            available_permits: self.inner.permits.available_permits(),
        }
    }

    /// Run one health pass now instead of waiting for the next tick.
    pub async fn check_health(&self) {
        self.inner.check_slots().await;
    }
}

impl Drop for ConnectionPool {
    fn drop(&mut self) {
        self.pinger.abort();
    }
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("addr", &self.inner.config.addr)
            .field("stats", &self.stats())
            .finish()
    }
}

#[async_trait]
impl Executor for ConnectionPool {
    async fn execute(&self, command: Command) -> StoreResult<Reply> {
        let waited = self.inner.config.full_buffer_timeout;
        let _permit = match timeout(waited, self.inner.permits.acquire()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(StoreError::Unavailable),
            Err(_) => {
                warn!(?waited, "command buffer full");
                return Err(StoreError::PoolExhausted { waited });
            }
        };

        let (tx, rx) = oneshot::channel();
        self.inner.dispatch(Pending { command, reply: tx })?;
        rx.await.unwrap_or(Err(StoreError::ConnectionClosed))
    }
}

impl PoolInner {
    async fn dial(&self) -> io::Result<Connection> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let window = FlushWindow {
            interval: self.config.flush_interval,
            size: self.config.flush_size,
        };
        match timeout(self.config.dial_timeout, Connection::open(&self.config.addr, id, window)).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "dial timed out")),
        }
    }

    fn connection(&self, index: usize) -> Option<Arc<Connection>> {
        self.slots[index].read().expect("lock poisoned").clone()
    }

    fn live_connections(&self) -> usize {
        (0..self.slots.len())
            .filter(|&i| self.connection(i).is_some_and(|c| c.is_responsive(self.config.reply_timeout)))
            .count()
    }

    /// Hand `pending` to the next live connection after the cursor.
    fn dispatch(&self, mut pending: Pending) -> StoreResult<()> {
        let n = self.slots.len();
        let start = self.cursor.fetch_add(1, Ordering::Relaxed);
        for offset in 0..n {
            let Some(conn) = self.connection((start + offset) % n) else {
                continue;
            };
            if !conn.is_responsive(self.config.reply_timeout) {
                continue;
            }
            match conn.send(pending) {
                Ok(()) => {
                    conn.touch();
                    return Ok(());
                }
                Err(returned) => pending = returned,
            }
        }
        Err(StoreError::Unavailable)
    }

    /// Ping idle connections and redial the dead or unresponsive ones.
    async fn check_slots(&self) {
        for index in 0..self.slots.len() {
            let healthy = match self.connection(index) {
                Some(conn) if conn.is_responsive(self.config.reply_timeout) => {
                    conn.take_used() || ping(&conn, self.config.reply_timeout).await
                }
                _ => false,
            };
            if !healthy {
                self.redial(index).await;
            }
        }
    }

    async fn redial(&self, index: usize) {
        match self.dial().await {
            Ok(conn) => {
                info!(slot = index, connection = conn.id(), "backend connection replaced");
                // Dropping the old connection fails whatever it still owed.
                let old = self.slots[index].write().expect("lock poisoned").replace(Arc::new(conn));
                drop(old);
            }
            Err(e) => {
                warn!(slot = index, addr = %self.config.addr, error = %e, "backend redial failed");
                self.slots[index].write().expect("lock poisoned").take();
            }
        }
    }
}

async fn ping(conn: &Connection, limit: Duration) -> bool {
    let (tx, rx) = oneshot::channel();
    if conn.send(Pending { command: Command::ping(), reply: tx }).is_err() {
        return false;
    }
    match timeout(limit, rx).await {
        Ok(Ok(Ok(Reply::Simple(_)))) => true,
        other => {
            debug!(connection = conn.id(), ?other, "health ping failed");
            false
        }
    }
}

async fn health_loop(inner: Arc<PoolInner>) {
    let mut ticker = interval(inner.config.ping_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately and the pool was just dialed.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        inner.check_slots().await;
    }
}
