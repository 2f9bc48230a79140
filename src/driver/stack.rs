//! Public facade and middleware stack composition.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::gremlin::auth::Credentials;

use super::client::GremlinClient;
use super::config::{DriverConfig, RetryStrategy};
use super::error::DriverResult;
use super::lock::{LocalLockClient, LockClient};
use super::middleware::{GremlinInstr, GremlinLogger, GremlinTracer, Instrumentation};
use super::query::GremlinQuery;

/// Default operation name when the context carries none.
pub const DEFAULT_OP_NAME: &str = "Gremlin.ExecQueryF";

/// Per-call context: an optional operation name for observability and a
/// cancellation token polled by the retry loop.
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    op_name: Option<String>,
    cancel: CancellationToken,
}

impl QueryContext {
    /// Context with no operation name and a never-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Name the operation for logs, spans and counters.
    pub fn with_op_name(mut self, name: impl Into<String>) -> Self {
        self.op_name = Some(name.into());
        self
    }

    /// Attach a cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Operation name, if one was set.
    pub fn op_name(&self) -> Option<&str> {
        self.op_name.as_deref()
    }

    /// Operation name, falling back to `default`.
    pub fn op_name_or<'a>(&'a self, default: &'a str) -> &'a str {
        match self.op_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => default,
        }
    }

    /// Whether the caller has cancelled this request.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// The facade implemented by the engine and preserved by every middleware
/// wrapper. Wrappers never change the result or error of the inner call.
#[async_trait]
pub trait Gremlin: Send + Sync {
    /// Execute a parameterized query; returns the aggregated result bytes.
    async fn exec_query_f(&self, ctx: &QueryContext, query: GremlinQuery)
        -> DriverResult<Vec<u8>>;
    /// Sweep the pool: probe idle connections and refill capacity.
    async fn ping_database(&self, ctx: &QueryContext) -> DriverResult<()>;
    /// Stop the monitor and close the pool.
    async fn close(&self, ctx: &QueryContext) -> DriverResult<()>;
}

#[async_trait]
impl Gremlin for GremlinClient {
    async fn exec_query_f(
        &self,
        ctx: &QueryContext,
        query: GremlinQuery,
    ) -> DriverResult<Vec<u8>> {
        GremlinClient::exec_query_f(self, ctx, query).await
    }

    async fn ping_database(&self, _ctx: &QueryContext) -> DriverResult<()> {
        GremlinClient::ping_database(self).await
    }

    async fn close(&self, _ctx: &QueryContext) -> DriverResult<()> {
        GremlinClient::close(self).await
    }
}

/// Options for [`GremlinStack::connect`]. Zero values fall back to the
/// crate defaults.
pub struct GremlinStackOptions {
    /// Idle pool capacity.
    pub max_pool_size: usize,
    /// Retry budget per query.
    pub max_retries: u32,
    /// Pool health-sweep interval.
    pub ping_interval: Duration,
    /// Log every frame at debug level.
    pub verbose: bool,
    /// Wrap the engine with the logging middleware.
    pub logging: bool,
    /// Wrap the engine with the tracing middleware.
    pub tracing: bool,
    /// Counter sink; enables the instrumentation middleware.
    pub instrumentation: Option<Arc<dyn Instrumentation>>,
    /// Lock backend; defaults to the process-local client.
    pub lock_client: Option<Arc<dyn LockClient>>,
    /// Credentials; default falls back to `GREMLIN_USER`/`GREMLIN_PASS`.
    pub credentials: Option<Credentials>,
    /// Authentication processor override.
    pub auth_processor: Option<String>,
    /// Connection acquisition strategy of the retry loop.
    pub retry_strategy: RetryStrategy,
}

impl Default for GremlinStackOptions {
    fn default() -> Self {
        Self {
            max_pool_size: super::config::DEFAULT_MAX_POOL_SIZE,
            max_retries: super::config::DEFAULT_MAX_RETRIES,
            ping_interval: super::config::DEFAULT_PING_INTERVAL,
            verbose: false,
            logging: true,
            tracing: true,
            instrumentation: None,
            lock_client: None,
            credentials: None,
            auth_processor: None,
            retry_strategy: RetryStrategy::default(),
        }
    }
}

/// Assembles the engine with its middleware stack, composed
/// instrumentation → tracing → logging → engine.
pub struct GremlinStack;

impl GremlinStack {
    /// Engine plus the middleware selected in `options`, monitor started.
    pub async fn connect(
        url: &str,
        options: GremlinStackOptions,
    ) -> DriverResult<Box<dyn Gremlin>> {
        let mut builder = DriverConfig::builder(url)
            .with_max_pool_size(options.max_pool_size)
            .with_max_retries(options.max_retries)
            .with_ping_interval(options.ping_interval)
            .with_verbose(options.verbose)
            .with_retry_strategy(options.retry_strategy);
        if let Some(credentials) = options.credentials {
            builder = builder.with_credentials(credentials);
        }
        if let Some(processor) = options.auth_processor {
            builder = builder.with_auth_processor(processor);
        }
        let config = builder.build();
        let ping_interval = config.ping_interval;

        let lock_client = options
            .lock_client
            .unwrap_or_else(|| Arc::new(LocalLockClient::new()));
        let client = GremlinClient::connect(config, lock_client).await?;
        client.start_monitor(ping_interval);

        let mut stack: Box<dyn Gremlin> = Box::new(client);
        if options.logging {
            stack = Box::new(GremlinLogger::new(stack));
        }
        if options.tracing {
            stack = Box::new(GremlinTracer::new(stack));
        }
        if let Some(instrumentation) = options.instrumentation {
            stack = Box::new(GremlinInstr::new(stack, instrumentation));
        }
        Ok(stack)
    }

    /// Bare engine with defaults and no middleware.
    pub async fn connect_simple(url: &str) -> DriverResult<Box<dyn Gremlin>> {
        Self::connect(
            url,
            GremlinStackOptions {
                logging: false,
                tracing: false,
                ..GremlinStackOptions::default()
            },
        )
        .await
    }
}
