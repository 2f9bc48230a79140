//! Request engine: argument handling, locking, retries, pool monitor.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use regex::Regex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use super::config::{DriverConfig, RetryStrategy};
use super::connection::{Connection, ConnectionSettings};
use super::error::{DriverError, DriverResult};
use super::lock::{KeyLock, LockClient};
use super::pool::{ConnectionFactory, ConnectionPool, PooledConnection};
use super::query::{format_query, GremlinQuery, QueryArg, ARG_REGEX};
use super::stack::QueryContext;

/// Handle on the background pool monitor.
struct Monitor {
    quit: CancellationToken,
    done: oneshot::Receiver<()>,
}

/// The request engine.
///
/// Escapes and validates query arguments, serializes requests sharing a
/// lock key, leases connections from the pool and executes with a bounded
/// retry loop. Safe to share across tasks.
pub struct GremlinClient {
    pool: Arc<ConnectionPool>,
    url: String,
    arg_regex: Regex,
    max_retries: u32,
    retry_strategy: RetryStrategy,
    lock_client: Arc<dyn LockClient>,
    monitor: parking_lot::Mutex<Option<Monitor>>,
}

impl GremlinClient {
    /// Dial the server and fill the pool per `config`.
    pub async fn connect(
        config: DriverConfig,
        lock_client: Arc<dyn LockClient>,
    ) -> DriverResult<Self> {
        let settings = ConnectionSettings::from(&config);
        let url = config.url.clone();
        let factory: ConnectionFactory = {
            let url = url.clone();
            Arc::new(
                move || -> BoxFuture<'static, DriverResult<PooledConnection>> {
                    let url = url.clone();
                    let settings = settings.clone();
                    Box::pin(async move {
                        let conn = Connection::connect(&url, settings).await?;
                        Ok(Box::new(conn) as PooledConnection)
                    })
                },
            )
        };
        Self::with_factory(config, lock_client, factory).await
    }

    /// Engine over an explicit connection factory. Lets tests substitute
    /// stub connections.
    pub async fn with_factory(
        config: DriverConfig,
        lock_client: Arc<dyn LockClient>,
        factory: ConnectionFactory,
    ) -> DriverResult<Self> {
        let pool = ConnectionPool::new(config.max_pool_size, factory).await?;
        let arg_regex = Regex::new(ARG_REGEX)
            .map_err(|err| DriverError::configuration(format!("argument regex: {err}")))?;
        Ok(Self {
            pool: Arc::new(pool),
            url: config.url,
            arg_regex,
            max_retries: config.max_retries,
            retry_strategy: config.retry_strategy,
            lock_client,
            monitor: parking_lot::Mutex::new(None),
        })
    }

    /// Escape, validate and substitute the query, then execute it with
    /// retries. Returns the aggregated result bytes.
    pub async fn exec_query_f(
        &self,
        ctx: &QueryContext,
        query: GremlinQuery,
    ) -> DriverResult<Vec<u8>> {
        let formatted = self.prepare(&query)?;
        let lock = match query.lock_key.as_deref() {
            Some(key) if !key.is_empty() => Some(self.lock_client.lock_key(key)?),
            _ => None,
        };
        let outcome = self.exec_with_retry(ctx, &formatted, lock.as_deref()).await;
        if let Some(lock) = &lock {
            if let Err(err) = lock.destroy().await {
                tracing::warn!(error = %err, "lock destroy failed");
            }
        }
        outcome
    }

    /// Render the query template: escape string arguments, check them
    /// against the allowlist, substitute into the template. All failures
    /// here happen before any I/O.
    fn prepare(&self, query: &GremlinQuery) -> DriverResult<String> {
        let mut rendered = Vec::with_capacity(query.args.len());
        for arg in &query.args {
            let text = arg.render();
            if matches!(arg, QueryArg::Str(_))
                && !text.is_empty()
                && !self.arg_regex.is_match(&text)
            {
                return Err(DriverError::invalid_arg(text));
            }
            rendered.push(text);
        }
        format_query(&query.query, &rendered)
    }

    /// The retry loop. Odd attempts lease a fresh connection (the current
    /// one is presumed stale); even attempts re-dial the current one in
    /// place (the pool is presumed exhausted of good connections). The
    /// lock, when present, brackets each attempt.
    async fn exec_with_retry(
        &self,
        ctx: &QueryContext,
        query: &str,
        lock: Option<&dyn KeyLock>,
    ) -> DriverResult<Vec<u8>> {
        let mut client: Option<PooledConnection> = None;
        let mut attempt: u32 = 1;
        let mut last_err: Option<DriverError> = None;

        loop {
            if ctx.is_cancelled() {
                Self::close_client(client.take()).await;
                return Err(DriverError::Cancelled);
            }
            if attempt > self.max_retries {
                Self::close_client(client.take()).await;
                return Err(DriverError::MaxRetries {
                    attempts: attempt - 1,
                    last: last_err
                        .map(|err| err.to_string())
                        .unwrap_or_else(|| "none".to_string()),
                });
            }

            let mut conn = match client.take() {
                Some(mut conn) if self.retry_strategy.reconnect_in_place(attempt) => {
                    if let Err(err) = conn.reconnect(&self.url).await {
                        let _ = conn.close().await;
                        return Err(err);
                    }
                    conn
                }
                previous => {
                    // stale connection from the last attempt is discarded
                    Self::close_client(previous).await;
                    self.pool.lease().await?
                }
            };
            attempt += 1;

            if let Some(lock) = lock {
                if let Err(err) = lock.lock().await {
                    let _ = conn.close().await;
                    return Err(err);
                }
            }
            let outcome = conn.exec_query(query).await;
            if let Some(lock) = lock {
                if let Err(err) = lock.unlock().await {
                    let _ = conn.close().await;
                    return Err(err);
                }
            }

            match outcome {
                Ok(bytes) => {
                    let _ = self.pool.put(conn).await;
                    return Ok(bytes);
                }
                Err(err) if err.is_network_error() => {
                    last_err = Some(err);
                    client = Some(conn);
                }
                Err(err) => {
                    let _ = conn.close().await;
                    return Err(err);
                }
            }
        }
    }

    async fn close_client(client: Option<PooledConnection>) {
        if let Some(mut conn) = client {
            let _ = conn.close().await;
        }
    }

    /// Sweep the pool once: probe idle connections, refill capacity.
    pub async fn ping_database(&self) -> DriverResult<()> {
        self.pool.maintain(&self.url).await
    }

    /// Start the background monitor firing a pool sweep every `interval`.
    /// A second call replaces the previous monitor.
    pub fn start_monitor(&self, interval: Duration) {
        let quit = CancellationToken::new();
        let (done_tx, done_rx) = oneshot::channel();
        let pool = self.pool.clone();
        let url = self.url.clone();
        let token = quit.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await; // first tick fires immediately; skip it
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(err) = pool.maintain(&url).await {
                            tracing::warn!(error = %err, "pool maintenance failed");
                        }
                    }
                }
            }
            let _ = done_tx.send(());
        });
        if let Some(previous) = self
            .monitor
            .lock()
            .replace(Monitor { quit, done: done_rx })
        {
            previous.quit.cancel();
        }
    }

    /// Stop the monitor, await its acknowledgement, then close the pool.
    pub async fn close(&self) -> DriverResult<()> {
        let monitor = self.monitor.lock().take();
        if let Some(monitor) = monitor {
            monitor.quit.cancel();
            let _ = monitor.done.await;
        }
        self.pool.close().await
    }

    /// Pool counters, for diagnostics.
    pub fn pool_metrics(&self) -> super::pool::PoolMetrics {
        self.pool.metrics()
    }
}

impl std::fmt::Debug for GremlinClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GremlinClient")
            .field("url", &self.url)
            .field("max_retries", &self.max_retries)
            .field("retry_strategy", &self.retry_strategy)
            .field("pool", &self.pool)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
