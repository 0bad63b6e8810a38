//! Conversion between conversation types and provider wire formats
//!
//! Each submodule converts messages and tools into one provider's request
//! shape and maps that provider's response back to a [`Response`](crate::types::Response).

pub mod anthropic;
pub mod google;
pub mod openai;

use serde_json::Value;

/// Render a tool result payload as a plain string
///
/// Strings pass through, other values are JSON-encoded, and a null result
/// of a failed invocation carries the error text.
pub(crate) fn tool_result_content(result: &Value, error: Option<&str>) -> String {
    match (result, error) {
        (Value::String(text), _) => text.clone(),
        (Value::Null, Some(error)) => error.to_owned(),
        (Value::Null, None) => String::new(),
        (other, _) => other.to_string(),
    }
}
