//! Request messages sent to the Gremlin server.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{op, LANGUAGE_GREMLIN_GROOVY};

/// Script bindings passed alongside a query.
pub type Bindings = HashMap<String, serde_json::Value>;

/// A single request to the server.
///
/// The request id is the only correlator between this request and the
/// responses the server streams back for it; it must be unique among the
/// in-flight requests of the connection that carries it.
///
/// ```
/// use gremlin_driver::gremlin::Request;
///
/// let req = Request::eval("g.V().has('name', name)")
///     .with_binding("name", serde_json::json!("Alice"));
/// assert_eq!(req.op, "eval");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireRequest", into = "WireRequest")]
pub struct Request {
    /// UUID v4 in string form.
    pub request_id: String,
    /// Operation, e.g. `eval` or `authentication`.
    pub op: String,
    /// Op processor; empty for plain evaluation.
    pub processor: String,
    /// Operation arguments.
    pub args: RequestArgs,
}

/// Arguments of a [`Request`]. Unset optional fields are omitted from the
/// wire representation entirely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestArgs {
    /// Gremlin script text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gremlin: Option<String>,
    /// Session identifier for sessioned evaluation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    /// Script parameter bindings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bindings: Option<Bindings>,
    /// Script language tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Binding overrides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rebindings: Option<Bindings>,
    /// Base64-encoded SASL token answering an authentication challenge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sasl: Option<String>,
    /// Server-side result batch size.
    #[serde(
        rename = "batchSize",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub batch_size: Option<i64>,
    /// Whether the server manages the transaction around the script.
    #[serde(
        rename = "manageTransaction",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub manage_transaction: Option<bool>,
    /// Traversal source aliases.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aliases: Option<HashMap<String, String>>,
}

impl Request {
    /// Build an `eval` request for a Gremlin script with a fresh request id.
    pub fn eval(query: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            op: op::EVAL.to_string(),
            processor: String::new(),
            args: RequestArgs {
                gremlin: Some(query.into()),
                language: Some(LANGUAGE_GREMLIN_GROOVY.to_string()),
                ..RequestArgs::default()
            },
        }
    }

    /// Build an `authentication` request answering a 407 challenge.
    ///
    /// The challenge request id is reused so the eventual terminal response
    /// flows back to the original in-flight entry.
    pub fn authentication(
        request_id: impl Into<String>,
        processor: impl Into<String>,
        sasl: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            op: op::AUTHENTICATION.to_string(),
            processor: processor.into(),
            args: RequestArgs {
                sasl: Some(sasl.into()),
                ..RequestArgs::default()
            },
        }
    }

    /// Replace the generated request id. Intended for tests and for
    /// callers that need deterministic correlation.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// Attach script bindings.
    pub fn with_bindings(mut self, bindings: Bindings) -> Self {
        self.args.bindings = Some(bindings);
        self
    }

    /// Attach a single binding.
    pub fn with_binding(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.args
            .bindings
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value);
        self
    }

    /// Attach binding overrides.
    pub fn with_rebindings(mut self, rebindings: Bindings) -> Self {
        self.args.rebindings = Some(rebindings);
        self
    }

    /// Attach traversal source aliases.
    pub fn with_aliases(mut self, aliases: HashMap<String, String>) -> Self {
        self.args.aliases = Some(aliases);
        self
    }

    /// Evaluate within a server-side session.
    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.args.session = Some(session.into());
        self
    }

    /// Set the manage-transaction flag.
    pub fn with_manage_transaction(mut self, flag: bool) -> Self {
        self.args.manage_transaction = Some(flag);
        self
    }

    /// Set the server-side batch size.
    pub fn with_batch_size(mut self, size: i64) -> Self {
        self.args.batch_size = Some(size);
        self
    }

    /// Set the op processor.
    pub fn with_processor(mut self, processor: impl Into<String>) -> Self {
        self.processor = processor.into();
        self
    }
}

// ============================================================================
// Wire envelope
// ============================================================================

/// GraphSON v2 typed-value wrapper for the request id.
#[derive(Serialize, Deserialize)]
struct TypedUuid {
    #[serde(rename = "@type")]
    type_tag: String,
    #[serde(rename = "@value")]
    value: String,
}

/// On-wire shape: the request id is wrapped as a `g:UUID` typed value.
#[derive(Serialize, Deserialize)]
struct WireRequest {
    #[serde(rename = "requestId")]
    request_id: TypedUuid,
    op: String,
    processor: String,
    args: RequestArgs,
}

impl From<Request> for WireRequest {
    fn from(req: Request) -> Self {
        Self {
            request_id: TypedUuid {
                type_tag: "g:UUID".to_string(),
                value: req.request_id,
            },
            op: req.op,
            processor: req.processor,
            args: req.args,
        }
    }
}

impl From<WireRequest> for Request {
    fn from(wire: WireRequest) -> Self {
        Self {
            request_id: wire.request_id.value,
            op: wire.op,
            processor: wire.processor,
            args: wire.args,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
