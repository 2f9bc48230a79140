//! Response messages received from the Gremlin server.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// Response status codes.
///
/// 200/204 are terminal, 206 is a non-terminal batch chunk, 407 initiates
/// the authentication sub-exchange, everything else is a terminal error.
pub mod code {
    /// Terminal, with data.
    pub const SUCCESS: u16 = 200;
    /// Terminal, empty result.
    pub const NO_CONTENT: u16 = 204;
    /// Non-terminal chunk of a batched result.
    pub const PARTIAL_CONTENT: u16 = 206;
    /// Credentials rejected.
    pub const UNAUTHORIZED: u16 = 401;
    /// SASL challenge; answer with an `authentication` request.
    pub const AUTHENTICATE: u16 = 407;
    /// Request frame could not be parsed.
    pub const MALFORMED_REQUEST: u16 = 498;
    /// Request arguments were invalid.
    pub const INVALID_REQUEST_ARGUMENTS: u16 = 499;
    /// General server-side failure.
    pub const SERVER_ERROR: u16 = 500;
    /// Script failed to evaluate.
    pub const SCRIPT_EVALUATION_ERROR: u16 = 597;
    /// Server-side timeout.
    pub const SERVER_TIMEOUT: u16 = 598;
    /// Server failed to serialize the result.
    pub const SERVER_SERIALIZATION_ERROR: u16 = 599;
}

/// Map an error status code to its caller-facing message.
///
/// Returns `None` for codes outside the fixed table; those surface as an
/// unknown error.
pub fn error_message(status_code: u16) -> Option<&'static str> {
    match status_code {
        code::UNAUTHORIZED => Some("Unauthorized"),
        code::AUTHENTICATE => Some("Authenticate"),
        code::MALFORMED_REQUEST => Some("Malformed request"),
        code::INVALID_REQUEST_ARGUMENTS => Some("Invalid request arguments"),
        code::SERVER_ERROR => Some("Server error"),
        code::SCRIPT_EVALUATION_ERROR => Some("Script evaluation error"),
        code::SERVER_TIMEOUT => Some("Server timeout"),
        code::SERVER_SERIALIZATION_ERROR => Some("Server serialization error"),
        _ => None,
    }
}

/// A single response frame.
///
/// A request may produce several of these (status 206 chunks followed by a
/// 200), all sharing the originating request id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Correlator back to the originating request.
    #[serde(rename = "requestId")]
    pub request_id: String,
    /// Outcome of this frame.
    pub status: ResponseStatus,
    /// Result payload; absent on some error responses.
    #[serde(default)]
    pub result: ResponseResult,
}

/// Status block of a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseStatus {
    /// Status code, see [`code`].
    pub code: u16,
    /// Human-readable server message.
    #[serde(default)]
    pub message: String,
    /// Server-supplied attributes.
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,
}

/// Result block of a response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseResult {
    /// Raw GraphSON payload, kept verbatim.
    #[serde(default)]
    pub data: Option<Box<RawValue>>,
    /// Result metadata.
    #[serde(default)]
    pub meta: HashMap<String, serde_json::Value>,
}

impl ResponseStatus {
    /// Non-terminal batch chunk?
    pub fn is_partial(&self) -> bool {
        self.code == code::PARTIAL_CONTENT
    }

    /// Does this frame finish the request on this connection?
    pub fn is_terminal(&self) -> bool {
        self.code != code::PARTIAL_CONTENT
    }

    /// SASL challenge?
    pub fn is_authenticate(&self) -> bool {
        self.code == code::AUTHENTICATE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_success_response() {
        let raw = r#"{
            "requestId": "41d2e28a-20a4-4ab0-b379-d810dede3786",
            "status": {"code": 200, "message": "", "attributes": {}},
            "result": {"data": [1, 2, 3], "meta": {}}
        }"#;
        let res: Response = serde_json::from_str(raw).unwrap();
        assert_eq!(res.request_id, "41d2e28a-20a4-4ab0-b379-d810dede3786");
        assert_eq!(res.status.code, 200);
        assert!(res.status.is_terminal());
        assert_eq!(res.result.data.unwrap().get(), "[1, 2, 3]");
    }

    #[test]
    fn test_parse_response_without_result() {
        let raw = r#"{"requestId": "abc", "status": {"code": 500}}"#;
        let res: Response = serde_json::from_str(raw).unwrap();
        assert_eq!(res.status.code, 500);
        assert!(res.result.data.is_none());
    }

    #[test]
    fn test_status_classification() {
        let partial = ResponseStatus {
            code: code::PARTIAL_CONTENT,
            message: String::new(),
            attributes: HashMap::new(),
        };
        assert!(partial.is_partial());
        assert!(!partial.is_terminal());

        let challenge = ResponseStatus {
            code: code::AUTHENTICATE,
            message: String::new(),
            attributes: HashMap::new(),
        };
        assert!(challenge.is_authenticate());
        assert!(challenge.is_terminal());
    }

    #[test]
    fn test_error_message_table() {
        assert_eq!(error_message(code::SERVER_ERROR), Some("Server error"));
        assert_eq!(error_message(code::SERVER_TIMEOUT), Some("Server timeout"));
        assert_eq!(error_message(code::UNAUTHORIZED), Some("Unauthorized"));
        assert_eq!(error_message(code::SUCCESS), None);
        assert_eq!(error_message(418), None);
    }
}
