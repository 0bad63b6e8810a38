//! Anthropic Messages streaming state machine

use super::sse::SseFrame;
use super::{Flow, Notifier, StreamMachine, parse};
use crate::error::StreamError;
use crate::protocol::anthropic::{
    AnthropicResponse, ContentBlockDeltaEvent, ContentBlockStartEvent, ContentBlockStopEvent, ErrorEvent,
    MessageDeltaEvent, MessageStartEvent,
};
use crate::types::{Part, ProviderKind, RawResponse, Response};

/// Content block currently receiving deltas
///
/// Blocks never interleave, so a single slot holds all in-progress state.
#[derive(Debug, Default)]
enum OpenBlock {
    #[default]
    None,
    Text(String),
    ToolUse {
        id: String,
        name: String,
        input: String,
    },
    /// A block kind whose deltas are not accumulated
    Other(String),
}

/// Accumulates an Anthropic event stream into a [`Response`]
#[derive(Debug, Default)]
pub struct AnthropicStream {
    envelope: Option<AnthropicResponse>,
    parts: Vec<Part>,
    open: OpenBlock,
}

impl AnthropicStream {
    /// Empty state, awaiting `message_start`
    pub fn new() -> Self {
        Self::default()
    }

    fn envelope(&mut self) -> Result<&mut AnthropicResponse, StreamError> {
        self.envelope.as_mut().ok_or(StreamError::NoMessage)
    }

    fn snapshot(&self, open_text: Option<&str>) -> Response {
        let mut parts = self.parts.clone();
        if let Some(text) = open_text.filter(|text| !text.is_empty()) {
            parts.push(Part::text(text));
        }

        let id = self.envelope.as_ref().map(|e| e.id.clone()).unwrap_or_default();
        Response::new(id, ProviderKind::Anthropic, parts, None)
    }

    fn start_block(&mut self, event: ContentBlockStartEvent) {
        let block = event.content_block;

        let open = match block.kind.as_str() {
            "text" => OpenBlock::Text(String::new()),
            "tool_use" => OpenBlock::ToolUse {
                id: block.id.unwrap_or_default(),
                name: block.name.unwrap_or_default(),
                input: String::new(),
            },
            _ => OpenBlock::Other(block.kind),
        };

        let previous = std::mem::replace(&mut self.open, open);
        if !matches!(previous, OpenBlock::None) {
            tracing::warn!(index = event.index, "content block started before the previous one stopped");
        }
    }

    fn apply_delta(&mut self, event: ContentBlockDeltaEvent, notify: &mut Notifier<'_>) -> Flow {
        let delta = event.delta;

        match (delta.kind.as_str(), &mut self.open) {
            ("text_delta", OpenBlock::Text(buffer)) => {
                buffer.push_str(delta.text.as_deref().unwrap_or_default());

                if notify.is_active() {
                    let snapshot = self.snapshot(self.open_text());
                    if !notify.snapshot(&snapshot) {
                        return Flow::Stop;
                    }
                }
            }
            ("input_json_delta", OpenBlock::ToolUse { input, .. }) => {
                input.push_str(delta.partial_json.as_deref().unwrap_or_default());
            }
            ("text_delta" | "input_json_delta", _) => {
                tracing::warn!(index = event.index, delta = %delta.kind, "delta does not match the open block");
            }
            (other, _) => {
                tracing::trace!(index = event.index, delta = other, "ignoring delta");
            }
        }

        Flow::Continue
    }

    fn open_text(&self) -> Option<&str> {
        match &self.open {
            OpenBlock::Text(text) => Some(text),
            OpenBlock::None | OpenBlock::ToolUse { .. } | OpenBlock::Other(_) => None,
        }
    }

    fn stop_block(&mut self) {
        match std::mem::take(&mut self.open) {
            OpenBlock::Text(text) if !text.is_empty() => self.parts.push(Part::text(text)),
            OpenBlock::ToolUse { id, name, input } => {
                // A tool taking no arguments streams no fragments
                let input = if input.is_empty() { "{}".to_owned() } else { input };
                self.parts.push(Part::tool_call(id, name, input));
            }
            OpenBlock::Other(kind) => tracing::debug!(block_type = %kind, "dropping streamed content block"),
            OpenBlock::Text(_) | OpenBlock::None => {}
        }
    }

    fn apply_message_delta(&mut self, event: MessageDeltaEvent) -> Result<(), StreamError> {
        let envelope = self.envelope()?;

        if let Some(reason) = event.delta.stop_reason {
            envelope.stop_reason = Some(reason);
        }
        if let Some(sequence) = event.delta.stop_sequence {
            envelope.stop_sequence = Some(sequence);
        }

        if let Some(usage) = event.usage {
            let target = &mut envelope.usage;
            if let Some(tokens) = usage.input_tokens {
                target.input_tokens = tokens;
            }
            if let Some(tokens) = usage.output_tokens {
                target.output_tokens = tokens;
            }
            if usage.cache_creation_input_tokens.is_some() {
                target.cache_creation_input_tokens = usage.cache_creation_input_tokens;
            }
            if usage.cache_read_input_tokens.is_some() {
                target.cache_read_input_tokens = usage.cache_read_input_tokens;
            }
            if usage.server_tool_use.is_some() {
                target.server_tool_use = usage.server_tool_use;
            }
        }

        Ok(())
    }
}

impl StreamMachine for AnthropicStream {
    fn on_frame(&mut self, frame: &SseFrame, notify: &mut Notifier<'_>) -> Result<Flow, StreamError> {
        let Some(event) = frame.event.as_deref() else {
            tracing::trace!("skipping frame without event type");
            return Ok(Flow::Continue);
        };
        let data = frame.data.as_str();

        match event {
            "message_start" => {
                let start: MessageStartEvent = parse(event, data)?;
                self.envelope = Some(start.message);
            }
            "content_block_start" => {
                self.envelope()?;
                self.start_block(parse(event, data)?);
            }
            "content_block_delta" => {
                self.envelope()?;
                return Ok(self.apply_delta(parse(event, data)?, notify));
            }
            "content_block_stop" => {
                self.envelope()?;
                let _: ContentBlockStopEvent = parse(event, data)?;
                self.stop_block();
            }
            "message_delta" => self.apply_message_delta(parse(event, data)?)?,
            "message_stop" => {
                self.envelope()?;
                if notify.is_active() {
                    // Final notification; the body ends on its own
                    notify.snapshot(&self.snapshot(None));
                }
            }
            "ping" => {}
            "error" => {
                let payload: ErrorEvent = parse(event, data)?;
                let err = StreamError::Upstream {
                    kind: payload.error.error_type,
                    message: payload.error.message,
                };
                notify.error(&err);
                return Err(err);
            }
            other => return Err(StreamError::UnknownEvent(other.to_owned())),
        }

        Ok(Flow::Continue)
    }

    fn finish(self) -> Result<Response, StreamError> {
        let envelope = self.envelope.ok_or(StreamError::NoMessage)?;

        Ok(Response::new(
            envelope.id.clone(),
            ProviderKind::Anthropic,
            self.parts,
            Some(RawResponse::Anthropic(Box::new(envelope))),
        ))
    }
}
