//! Driver core: connection multiplexing, pooling, retries, middleware.
//!
//! The layering, outermost first:
//!
//! - [`stack`] - the [`Gremlin`](stack::Gremlin) facade and stack builder
//! - [`middleware`] - logging / tracing / instrumentation wrappers
//! - [`client`] - the request engine (escaping, locking, retry loop)
//! - [`pool`] - bounded reservoir of connections
//! - [`connection`] - one multiplexed WebSocket
//! - [`lock`] - named mutual exclusion, pluggable backend
//!
//! Most applications only touch the facade:
//!
//! ```rust,no_run
//! use gremlin_driver::{GremlinQuery, GremlinStack, QueryContext};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let gremlin = GremlinStack::connect_simple("ws://localhost:8182/gremlin").await?;
//!
//! let query = GremlinQuery::new("g.V().has('name', '%s')")
//!     .with_args(vec!["Alice".into()]);
//! let bytes = gremlin.exec_query_f(&QueryContext::new(), query).await?;
//! println!("{}", String::from_utf8_lossy(&bytes));
//!
//! gremlin.close(&QueryContext::new()).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod lock;
pub mod middleware;
pub mod pool;
pub mod query;
pub mod stack;

pub use client::GremlinClient;
pub use config::{
    split_servers, servers_from_env, DriverConfig, DriverConfigBuilder, RetryStrategy,
};
pub use connection::{Connection, ConnectionSettings, GremlinConnection};
pub use error::{DriverError, DriverResult};
pub use lock::{KeyLock, LocalLockClient, LockClient};
pub use middleware::{GremlinInstr, GremlinLogger, GremlinTracer, Instrumentation};
pub use pool::{ConnectionFactory, ConnectionPool, PoolMetrics, PooledConnection};
pub use query::{escape_gremlin, GremlinQuery, QueryArg};
pub use stack::{Gremlin, GremlinStack, GremlinStackOptions, QueryContext};
