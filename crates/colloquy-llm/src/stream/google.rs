//! Gemini `streamGenerateContent?alt=sse` state machine
//!
//! Every frame is a complete `generateContent` response carrying the next
//! slice of the first candidate. Function calls arrive whole, so every
//! accumulated part is final as soon as its chunk is applied.

use super::sse::SseFrame;
use super::{Flow, Notifier, StreamMachine, parse};
use crate::convert::google::append_parts;
use crate::error::StreamError;
use crate::protocol::google::{GoogleStreamChunk, GoogleStreamSummary};
use crate::types::{Part, ProviderKind, RawResponse, Response};

/// Accumulates Gemini stream chunks into a [`Response`]
#[derive(Debug, Default)]
pub struct GoogleStream {
    summary: Option<GoogleStreamSummary>,
    parts: Vec<Part>,
}

impl GoogleStream {
    /// Empty state, awaiting the first chunk
    pub fn new() -> Self {
        Self::default()
    }

    fn id(&self) -> String {
        self.summary.as_ref().map(|s| s.response_id.clone()).unwrap_or_default()
    }

    /// Fold one chunk into the state; returns whether the caller should hear about it
    fn apply_chunk(&mut self, chunk: GoogleStreamChunk) -> bool {
        let response = chunk.response;
        let summary = self.summary.get_or_insert_with(GoogleStreamSummary::default);

        if summary.response_id.is_empty() {
            summary.response_id = response.response_id.unwrap_or_default();
        }
        if summary.model_version.is_none() {
            summary.model_version = response.model_version;
        }
        if response.usage_metadata.is_some() {
            summary.usage = response.usage_metadata;
        }

        let Some(candidate) = response.candidates.into_iter().next() else {
            return false;
        };

        let finished = candidate.finish_reason.is_some();
        if finished {
            summary.finish_reason = candidate.finish_reason;
        }

        let added = candidate
            .content
            .is_some_and(|content| append_parts(&mut self.parts, &content.parts));

        finished || added
    }
}

impl StreamMachine for GoogleStream {
    fn on_frame(&mut self, frame: &SseFrame, notify: &mut Notifier<'_>) -> Result<Flow, StreamError> {
        let data = frame.data.trim();
        if data.is_empty() {
            return Ok(Flow::Continue);
        }

        let chunk: GoogleStreamChunk = parse("generateContent chunk", data)?;

        if let Some(error) = chunk.error {
            let err = StreamError::Upstream {
                kind: error.status,
                message: error.message,
            };
            notify.error(&err);
            return Err(err);
        }

        if self.apply_chunk(chunk) && notify.is_active() {
            let snapshot = Response::new(self.id(), ProviderKind::Google, self.parts.clone(), None);
            if !notify.snapshot(&snapshot) {
                return Ok(Flow::Stop);
            }
        }

        Ok(Flow::Continue)
    }

    fn finish(self) -> Result<Response, StreamError> {
        let summary = self.summary.ok_or(StreamError::NoMessage)?;

        Ok(Response::new(
            summary.response_id.clone(),
            ProviderKind::Google,
            self.parts,
            Some(RawResponse::GoogleStream(Box::new(summary))),
        ))
    }
}
