use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Per-call context for provider requests
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Identifier attached to every log event of the call
    pub request_id: Uuid,
    /// External cancellation signal
    ///
    /// Streaming calls poll it once per SSE line; non-streaming calls race
    /// it against sending the request and reading the body.
    pub cancellation: CancellationToken,
}

impl RequestContext {
    /// Context with a fresh request ID and a token nobody cancels
    pub fn new() -> Self {
        Self::with_cancellation(CancellationToken::new())
    }

    /// Context tied to an existing cancellation token
    pub fn with_cancellation(cancellation: CancellationToken) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            cancellation,
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
