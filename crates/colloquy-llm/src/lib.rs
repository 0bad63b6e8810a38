//! Provider-agnostic conversations with large language models
//!
//! A conversation is a list of [`Message`]s made of typed [`Part`]s. A
//! [`Provider`] converts it to its wire format, sends it, and maps the reply
//! back to a [`Response`], either in one piece with
//! [`Provider::generate`] or incrementally with
//! [`Provider::generate_stream`]. Tools are described through the [`Tool`]
//! trait; running them is left to the caller.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod context;
pub mod convert;
pub mod error;
pub mod protocol;
pub mod provider;
pub mod stream;
pub mod transport;
pub mod types;

pub use context::RequestContext;
pub use error::{ConvertError, LlmError, StreamError, UnsupportedBlock, UnsupportedBlocks};
pub use provider::{AnthropicProvider, GenerationSettings, GoogleProvider, OpenAiProvider, Provider, from_config};
pub use stream::StreamCallback;
pub use transport::{HttpTransport, Transport};
pub use types::{Message, Part, ProviderKind, Response, Role, Tool, Usage, schema_for};
