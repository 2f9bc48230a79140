//! Gremlin Server protocol messages.
//!
//! Requests travel client → server, responses travel server → client.
//! Both sides of the exchange are correlated solely by the request id.

mod request;
mod response;

pub use request::{Bindings, Request, RequestArgs};
pub use response::{code, error_message, Response, ResponseResult, ResponseStatus};

/// Operation names understood by the server.
pub mod op {
    /// Evaluate a Gremlin script.
    pub const EVAL: &str = "eval";
    /// Answer a SASL authentication challenge.
    pub const AUTHENTICATION: &str = "authentication";
}

/// Script language tag sent with every eval request.
pub const LANGUAGE_GREMLIN_GROOVY: &str = "gremlin-groovy";
