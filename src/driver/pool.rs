//! Bounded connection pool.
//!
//! The pool is a thread-safe reservoir of idle connections. Leasing is
//! non-blocking: an empty idle store synthesizes a fresh connection via
//! the factory instead of waiting, so capacity bounds the idle store and
//! the refill target, not the number of live connections (callers already
//! rate-limit through their retry budget).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};

use super::connection::GremlinConnection;
use super::error::{DriverError, DriverResult};

/// A pooled connection, held behind the [`GremlinConnection`] seam.
pub type PooledConnection = Box<dyn GremlinConnection>;

/// Factory synthesizing one new connection.
pub type ConnectionFactory =
    Arc<dyn Fn() -> BoxFuture<'static, DriverResult<PooledConnection>> + Send + Sync>;

/// Point-in-time pool counters.
#[derive(Debug, Clone, Default)]
pub struct PoolMetrics {
    /// Connections currently idle in the pool.
    pub idle: usize,
    /// Idle capacity.
    pub max_size: usize,
    /// Connections synthesized over the pool's lifetime.
    pub total_created: u64,
    /// Connections closed by the pool.
    pub total_closed: u64,
    /// Leases handed out.
    pub total_leased: u64,
}

/// Bounded, thread-safe reservoir of connections.
///
/// A connection is always in exactly one place: idle in the pool, leased
/// to one caller, or destroyed.
pub struct ConnectionPool {
    idle: Mutex<VecDeque<PooledConnection>>,
    max_size: usize,
    factory: ConnectionFactory,
    open: RwLock<bool>,
    total_created: AtomicU64,
    total_closed: AtomicU64,
    total_leased: AtomicU64,
}

impl ConnectionPool {
    /// Build a pool and eagerly fill it to `max_size`.
    ///
    /// If any synthesis fails, every connection created so far is closed
    /// before the error is returned.
    pub async fn new(max_size: usize, factory: ConnectionFactory) -> DriverResult<Self> {
        if max_size == 0 {
            return Err(DriverError::pool("invalid capacity settings"));
        }
        let pool = Self {
            idle: Mutex::new(VecDeque::with_capacity(max_size)),
            max_size,
            factory,
            open: RwLock::new(true),
            total_created: AtomicU64::new(0),
            total_closed: AtomicU64::new(0),
            total_leased: AtomicU64::new(0),
        };
        for _ in 0..max_size {
            match (pool.factory)().await {
                Ok(conn) => {
                    pool.total_created.fetch_add(1, Ordering::Relaxed);
                    pool.idle.lock().push_back(conn);
                }
                Err(err) => {
                    let _ = pool.close().await;
                    return Err(DriverError::pool(format!(
                        "factory is not able to fill the pool: {err}"
                    )));
                }
            }
        }
        Ok(pool)
    }

    /// Take an idle connection, or synthesize a fresh one when the idle
    /// store is empty. Never blocks on other lease-holders.
    pub async fn lease(&self) -> DriverResult<PooledConnection> {
        if !*self.open.read() {
            return Err(DriverError::PoolClosed);
        }
        if let Some(conn) = self.idle.lock().pop_front() {
            self.total_leased.fetch_add(1, Ordering::Relaxed);
            return Ok(conn);
        }
        let conn = (self.factory)().await?;
        self.total_created.fetch_add(1, Ordering::Relaxed);
        self.total_leased.fetch_add(1, Ordering::Relaxed);
        Ok(conn)
    }

    /// Return a leased connection. A closed pool or a full idle store
    /// closes the connection instead; the pool never blocks here.
    pub async fn put(&self, mut conn: PooledConnection) -> DriverResult<()> {
        if *self.open.read() {
            let mut idle = self.idle.lock();
            if idle.len() < self.max_size {
                idle.push_back(conn);
                return Ok(());
            }
        }
        let _ = conn.close().await;
        self.total_closed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Close the pool: drain the idle store and close every connection.
    /// Idempotent; subsequent [`lease`](Self::lease) calls fail with
    /// [`DriverError::PoolClosed`].
    pub async fn close(&self) -> DriverResult<()> {
        {
            let mut open = self.open.write();
            if !*open {
                return Ok(());
            }
            *open = false;
        }
        let drained: Vec<PooledConnection> = self.idle.lock().drain(..).collect();
        for mut conn in drained {
            let _ = conn.close().await;
            self.total_closed.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Health sweep: probe each currently-idle connection once, discard
    /// the ones that fail, then refill the idle store up to capacity.
    ///
    /// The idle lock is never held across a probe.
    pub async fn maintain(&self, url: &str) -> DriverResult<()> {
        if !*self.open.read() {
            return Err(DriverError::PoolClosed);
        }

        // bound the sweep by the snapshot length so returned connections
        // are not probed twice
        let snapshot = self.idle.lock().len();
        for _ in 0..snapshot {
            let popped = self.idle.lock().pop_front();
            let Some(mut conn) = popped else { break };
            match conn.maintain_connection(url).await {
                Ok(()) => {
                    let _ = self.put(conn).await;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "discarding unhealthy pooled connection");
                    let _ = conn.close().await;
                    self.total_closed.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        loop {
            if !*self.open.read() || self.idle.lock().len() >= self.max_size {
                break;
            }
            let conn = (self.factory)().await.map_err(|err| {
                DriverError::pool(format!("factory is not able to refill the pool: {err}"))
            })?;
            self.total_created.fetch_add(1, Ordering::Relaxed);
            self.idle.lock().push_back(conn);
        }
        Ok(())
    }

    /// Number of idle connections.
    pub fn len(&self) -> usize {
        self.idle.lock().len()
    }

    /// True when the idle store is empty.
    pub fn is_empty(&self) -> bool {
        self.idle.lock().is_empty()
    }

    /// Idle capacity.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Point-in-time counters.
    pub fn metrics(&self) -> PoolMetrics {
        PoolMetrics {
            idle: self.len(),
            max_size: self.max_size,
            total_created: self.total_created.load(Ordering::Relaxed),
            total_closed: self.total_closed.load(Ordering::Relaxed),
            total_leased: self.total_leased.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("idle", &self.len())
            .field("max_size", &self.max_size)
            .field("open", &*self.open.read())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
