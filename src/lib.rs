//! # Gremlin Driver
//!
//! An async Rust client for the [Gremlin Server](https://tinkerpop.apache.org/)
//! wire protocol, multiplexing many concurrent graph queries onto a
//! bounded pool of long-lived WebSocket connections.
//!
//! ## Features
//!
//! - **Multiplexed connections** - one WebSocket carries many in-flight
//!   requests; streamed partial results are aggregated per request while
//!   other requests interleave
//! - **Connection pooling** - a bounded reservoir with health sweeps,
//!   reconnection and leak-free hand-off
//! - **Bounded retries** - an alternating new-connection / reconnect
//!   strategy with cancellation support
//! - **Named locking** - per-key mutual exclusion with a pluggable
//!   backend for distributed deployments
//! - **SASL authentication** - answers the server's 407 challenge with
//!   SASL-PLAIN credentials
//!
//! ## Quick Start
//!
//! Add to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! gremlin-driver = "0.1"
//! tokio = { version = "1", features = ["full"] }
//! ```
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use gremlin_driver::{GremlinQuery, GremlinStack, QueryContext};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Engine with pooling, retries and a background health monitor
//!     let gremlin = GremlinStack::connect_simple("ws://localhost:8182/gremlin").await?;
//!
//!     // Arguments are escaped and validated before substitution
//!     let query = GremlinQuery::new("g.V().has('name', '%s').valueMap()")
//!         .with_args(vec!["Alice".into()]);
//!
//!     let bytes = gremlin.exec_query_f(&QueryContext::new(), query).await?;
//!     println!("{}", String::from_utf8_lossy(&bytes));
//!
//!     gremlin.close(&QueryContext::new()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Serialized Queries
//!
//! Queries sharing a lock key never overlap, process-wide by default and
//! fleet-wide with a distributed
//! [`LockClient`](driver::lock::LockClient) backend:
//!
//! ```rust,no_run
//! # use gremlin_driver::{GremlinQuery, QueryContext};
//! # async fn example(gremlin: Box<dyn gremlin_driver::Gremlin>) {
//! let query = GremlinQuery::new("g.V('%s').property('count', %d)")
//!     .with_args(vec!["user-1".into(), 5i64.into()])
//!     .with_lock_key("user-1");
//! let _ = gremlin.exec_query_f(&QueryContext::new(), query).await;
//! # }
//! ```
//!
//! ## Configuration
//!
//! The full option surface lives on
//! [`GremlinStackOptions`](driver::stack::GremlinStackOptions) and
//! [`DriverConfig`](driver::config::DriverConfig):
//!
//! ```rust,no_run
//! use gremlin_driver::{GremlinStack, GremlinStackOptions};
//! use gremlin_driver::gremlin::Credentials;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let gremlin = GremlinStack::connect(
//!     "ws://localhost:8182/gremlin",
//!     GremlinStackOptions {
//!         max_pool_size: 20,
//!         max_retries: 4,
//!         credentials: Some(Credentials::new("app", "secret")),
//!         ..GremlinStackOptions::default()
//!     },
//! )
//! .await?;
//! # Ok(())
//! # }
//! ```
//!
//! Credentials fall back to the `GREMLIN_USER`/`GREMLIN_PASS` environment
//! variables, and `GREMLIN_SERVERS` supplies a comma-separated server
//! list for multi-server setups.
//!
//! ## Error Handling
//!
//! Every operation returns [`DriverResult`]. Transport failures are
//! retried up to the configured budget; server status codes map through a
//! fixed table:
//!
//! ```rust,no_run
//! # use gremlin_driver::{DriverError, GremlinQuery, QueryContext};
//! # async fn example(gremlin: Box<dyn gremlin_driver::Gremlin>) {
//! match gremlin.exec_query_f(&QueryContext::new(), GremlinQuery::new("g.V()")).await {
//!     Ok(bytes) => println!("{} bytes", bytes.len()),
//!     Err(DriverError::Server { code, message }) => eprintln!("{code}: {message}"),
//!     Err(err) => eprintln!("{err}"),
//! }
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`driver`] - connection, pool, engine, locking, middleware
//! - [`gremlin`] - low-level wire protocol

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod driver;
pub mod gremlin;

// Re-exports for convenience
pub use driver::{
    Connection, ConnectionPool, ConnectionSettings, DriverConfig, DriverConfigBuilder,
    DriverError, DriverResult, Gremlin, GremlinClient, GremlinConnection, GremlinQuery,
    GremlinStack, GremlinStackOptions, Instrumentation, KeyLock, LocalLockClient, LockClient,
    PoolMetrics, QueryArg, QueryContext, RetryStrategy,
};

pub use gremlin::{Credentials, GremlinError, Request, Response};
