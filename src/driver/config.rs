//! Driver configuration.

use std::time::Duration;

use crate::gremlin::auth::Credentials;

use super::error::{DriverError, DriverResult};

/// Environment variable holding a comma-separated `ws://host:port` list.
pub const ENV_GREMLIN_SERVERS: &str = "GREMLIN_SERVERS";

/// Default idle pool capacity.
pub const DEFAULT_MAX_POOL_SIZE: usize = 10;
/// Default retry budget per query.
pub const DEFAULT_MAX_RETRIES: u32 = 2;
/// Default pool health-sweep interval.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(5);
/// Default WebSocket handshake timeout.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(3);
/// Default per-write deadline.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);
/// Default read deadline before the first pong arrives.
pub const DEFAULT_READ_DEADLINE: Duration = Duration::from_secs(100);
/// Default pong timeout; pings are emitted at 80% of this.
pub const DEFAULT_PONG_TIMEOUT: Duration = Duration::from_secs(5);
/// Default processor name for the authentication sub-exchange. Servers
/// that expect the legacy misspelling can override it with
/// [`DriverConfigBuilder::with_auth_processor`]`("trasversal")`.
pub const DEFAULT_AUTH_PROCESSOR: &str = "traversal";

/// How the retry loop acquires a connection on each attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryStrategy {
    /// Lease a fresh connection from the pool every attempt.
    AlwaysNew,
    /// Re-dial the current connection in place every attempt.
    AlwaysReconnect,
    /// Odd attempts lease fresh, even attempts re-dial in place. Makes
    /// progress whether the leased connection is stale or the pool itself
    /// is exhausted of good connections.
    #[default]
    Alternating,
}

impl RetryStrategy {
    /// Should `attempt` (1-based) re-dial in place rather than lease?
    pub(crate) fn reconnect_in_place(self, attempt: u32) -> bool {
        match self {
            Self::AlwaysNew => false,
            Self::AlwaysReconnect => true,
            Self::Alternating => attempt % 2 == 0,
        }
    }
}

/// Driver configuration.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Server URL, `ws://host:port/path`.
    pub url: String,
    /// Additional server URLs for multi-server setups.
    pub servers: Vec<String>,
    /// Idle pool capacity.
    pub max_pool_size: usize,
    /// Retry budget per query.
    pub max_retries: u32,
    /// Pool health-sweep interval.
    pub ping_interval: Duration,
    /// Log every frame at debug level.
    pub verbose: bool,
    /// WebSocket handshake timeout.
    pub handshake_timeout: Duration,
    /// Per-write deadline.
    pub write_timeout: Duration,
    /// Read deadline before the first pong arrives.
    pub read_deadline: Duration,
    /// Pong timeout; pings go out at 80% of this.
    pub pong_timeout: Duration,
    /// Processor name used when answering a 407 challenge.
    pub auth_processor: String,
    /// Credentials for the authentication sub-exchange; falls back to
    /// `GREMLIN_USER`/`GREMLIN_PASS` when unset.
    pub credentials: Option<Credentials>,
    /// Connection acquisition strategy of the retry loop.
    pub retry_strategy: RetryStrategy,
}

impl DriverConfig {
    /// Configuration with defaults for `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            servers: Vec::new(),
            max_pool_size: DEFAULT_MAX_POOL_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            ping_interval: DEFAULT_PING_INTERVAL,
            verbose: false,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            read_deadline: DEFAULT_READ_DEADLINE,
            pong_timeout: DEFAULT_PONG_TIMEOUT,
            auth_processor: DEFAULT_AUTH_PROCESSOR.to_string(),
            credentials: None,
            retry_strategy: RetryStrategy::default(),
        }
    }

    /// Start building a configuration.
    pub fn builder(url: impl Into<String>) -> DriverConfigBuilder {
        DriverConfigBuilder {
            config: Self::new(url),
        }
    }
}

/// Builder for [`DriverConfig`].
#[derive(Debug, Clone)]
pub struct DriverConfigBuilder {
    config: DriverConfig,
}

impl DriverConfigBuilder {
    /// Set the idle pool capacity.
    pub fn with_max_pool_size(mut self, size: usize) -> Self {
        self.config.max_pool_size = size;
        self
    }

    /// Set the retry budget.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set the pool health-sweep interval.
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.config.ping_interval = interval;
        self
    }

    /// Enable frame-level debug logging.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.config.verbose = verbose;
        self
    }

    /// Set the WebSocket handshake timeout.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    /// Set the per-write deadline.
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.config.write_timeout = timeout;
        self
    }

    /// Set the initial read deadline.
    pub fn with_read_deadline(mut self, deadline: Duration) -> Self {
        self.config.read_deadline = deadline;
        self
    }

    /// Set the pong timeout.
    pub fn with_pong_timeout(mut self, timeout: Duration) -> Self {
        self.config.pong_timeout = timeout;
        self
    }

    /// Override the authentication processor name.
    pub fn with_auth_processor(mut self, processor: impl Into<String>) -> Self {
        self.config.auth_processor = processor.into();
        self
    }

    /// Set explicit credentials.
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.config.credentials = Some(credentials);
        self
    }

    /// Set additional server URLs.
    pub fn with_servers(mut self, servers: Vec<String>) -> Self {
        self.config.servers = servers;
        self
    }

    /// Set the retry strategy.
    pub fn with_retry_strategy(mut self, strategy: RetryStrategy) -> Self {
        self.config.retry_strategy = strategy;
        self
    }

    /// Finish building.
    pub fn build(self) -> DriverConfig {
        self.config
    }
}

/// Split a comma-separated connection string into server URLs.
pub fn split_servers(conn_string: &str) -> DriverResult<Vec<String>> {
    let servers: Vec<String> = conn_string
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if servers.is_empty() {
        return Err(DriverError::configuration(
            "connection string holds no servers; expected e.g. \
             'ws://server1:8182, ws://server2:8182'",
        ));
    }
    for server in &servers {
        if !server.starts_with("ws://") && !server.starts_with("wss://") {
            return Err(DriverError::configuration(format!(
                "server URL {server} must use the ws:// or wss:// scheme"
            )));
        }
    }
    Ok(servers)
}

/// Server list from the `GREMLIN_SERVERS` environment variable.
pub fn servers_from_env() -> DriverResult<Vec<String>> {
    let conn_string = std::env::var(ENV_GREMLIN_SERVERS).unwrap_or_default();
    if conn_string.trim().is_empty() {
        return Err(DriverError::configuration(
            "no servers set; configure the GREMLIN_SERVERS environment variable",
        ));
    }
    split_servers(&conn_string)
}
