//! Reply decoding: error extraction, batch unwrapping and status-text sniffing.

use serde_json::Value;

use crate::error::RpcError;
use crate::request::JsonRpcError;

/// Message used when a reply is neither JSON nor a recognised status page.
pub const EXPECTED_JSON: &str = "Client returned invalid format. Expected JSON!";

/// Message used for blank replies.
pub const EMPTY_REPLY: &str = "Empty Reply";

/// A known HTTP status condition found in non-JSON reply text.
struct StatusPattern {
    phrases: &'static [&'static str],
    code: &'static str,
    retryable: bool,
}

// Checked in order; the first hit wins.
const STATUS_PATTERNS: &[StatusPattern] = &[
    StatusPattern { phrases: &["Internal Server Error"], code: "500", retryable: true },
    StatusPattern { phrases: &["Not Implemented"], code: "501", retryable: false },
    StatusPattern { phrases: &["Bad Gateway"], code: "502", retryable: true },
    StatusPattern { phrases: &["Too Many Requests"], code: "429", retryable: true },
    StatusPattern {
        phrases: &["Service Temporarily Unavailable", "Service Unavailable"],
        code: "503",
        retryable: true,
    },
    StatusPattern { phrases: &["Gateway Time-out", "Gateway Timeout"], code: "504", retryable: true },
    StatusPattern { phrases: &["HTTP Version not supported"], code: "505", retryable: false },
    StatusPattern { phrases: &["Variant Also Negotiates"], code: "506", retryable: false },
    StatusPattern { phrases: &["Insufficient Storage"], code: "507", retryable: false },
    StatusPattern { phrases: &["Loop Detected"], code: "508", retryable: false },
    StatusPattern { phrases: &["Bandwidth Limit Exceeded"], code: "509", retryable: false },
    StatusPattern { phrases: &["Not Extended"], code: "510", retryable: false },
    StatusPattern { phrases: &["Network Authentication Required"], code: "511", retryable: false },
];

/// `code` appears in `text` as a standalone number, not inside a longer one.
fn contains_code(text: &str, code: &str) -> bool {
    text.match_indices(code).any(|(at, _)| {
        let before = text[..at].chars().next_back();
        let after = text[at + code.len()..].chars().next();
        !before.is_some_and(|c| c.is_ascii_digit()) && !after.is_some_and(|c| c.is_ascii_digit())
    })
}

/// Map non-JSON reply text to a retryable or fatal error.
pub fn classify_server_text(text: &str) -> RpcError {
    for pattern in STATUS_PATTERNS {
        if pattern.phrases.iter().any(|p| text.contains(p)) || contains_code(text, pattern.code) {
            let label = pattern.phrases[0].to_string();
            return if pattern.retryable {
                RpcError::RetryableServer(label)
            } else {
                RpcError::Protocol(label)
            };
        }
    }
    RpcError::Protocol(EXPECTED_JSON.into())
}

fn error_from(value: &Value) -> RpcError {
    match serde_json::from_value::<JsonRpcError>(value.clone()) {
        Ok(err) => RpcError::Rpc(err),
        Err(_) => RpcError::Rpc(JsonRpcError {
            code: 0,
            message: match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            },
            detail: None,
            data: None,
        }),
    }
}

fn unwrap_element(value: Value) -> Result<Value, RpcError> {
    match value {
        Value::Object(mut obj) => {
            if let Some(err) = obj.get("error") {
                return Err(error_from(err));
            }
            match obj.remove("result") {
                Some(result) => Ok(result),
                None => Ok(Value::Object(obj)),
            }
        }
        other => Ok(other),
    }
}

/// Decode one raw reply.
///
/// Blank text is a retryable condition. A list decodes element-wise, keeps
/// the order, and fails on the first element carrying an error.
pub fn decode_reply(text: &str) -> Result<Value, RpcError> {
    if text.trim().is_empty() {
        return Err(RpcError::RetryableServer(EMPTY_REPLY.into()));
    }
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(_) => return Err(classify_server_text(text)),
    };

    match value {
        Value::Array(items) => items.into_iter().map(unwrap_element).collect::<Result<Vec<_>, _>>().map(Value::Array),
        Value::Number(ref n) if n.is_i64() || n.is_u64() => Err(RpcError::Protocol(EXPECTED_JSON.into())),
        other => unwrap_element(other),
    }
}
