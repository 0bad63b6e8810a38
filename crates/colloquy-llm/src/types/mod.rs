//! Provider-agnostic conversation and response types
//!
//! Every wire format converts to and from these.

pub mod message;
pub mod response;
pub mod tool;

pub use message::{Message, Part, Role, ToolCall};
pub use response::{ProviderKind, RawResponse, Response, Usage};
pub use tool::{Tool, schema_for};
