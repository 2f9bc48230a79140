//! Low-level Gremlin Server wire protocol.
//!
//! This module contains everything that goes over the WebSocket: the
//! request/response message types, the GraphSON v2 frame codec, and the
//! SASL credential material used to answer authentication challenges.
//!
//! Nothing in here knows about pooling or retries; see [`crate::driver`]
//! for the connection-management layer built on top.

pub mod auth;
pub mod codec;
pub mod error;
pub mod message;

pub use auth::Credentials;
pub use codec::{GraphsonCodec, MIME_TYPE};
pub use error::GremlinError;
pub use message::{code, Bindings, Request, RequestArgs, Response, ResponseResult, ResponseStatus};
