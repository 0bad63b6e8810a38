//! Server-sent event consumption
//!
//! [`drive`] pulls lines off a response body, groups them into frames and
//! hands each frame to a provider-specific [`StreamMachine`]. The machine
//! owns all accumulation state for one call and decides when to notify
//! the caller.

pub mod anthropic;
pub mod google;
pub mod openai;
pub mod sse;

use futures_util::StreamExt;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;

use self::sse::{FrameBuilder, SseFrame};
use crate::error::StreamError;
use crate::transport::ByteStream;
use crate::types::Response;

/// Streaming callback
///
/// Invoked with a snapshot after every text delta, once more with the full
/// response when the provider signals completion, and with the error when
/// the provider reports one in-band. Returning `false` from a snapshot
/// notification stops the stream; the call then returns the parts finalized
/// so far without error.
///
/// Intermediate snapshots carry no raw payload.
pub type StreamCallback<'a> = &'a mut (dyn FnMut(Result<&Response, &StreamError>) -> bool + Send);

/// Whether a machine wants more frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep reading
    Continue,
    /// The callback asked to stop
    Stop,
}

/// Accumulation state for one streamed response
pub trait StreamMachine {
    /// Apply one frame
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is malformed, unexpected, or an
    /// upstream error report.
    fn on_frame(&mut self, frame: &SseFrame, notify: &mut Notifier<'_>) -> Result<Flow, StreamError>;

    /// Build the response from everything finalized so far
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::NoMessage`] if no envelope was ever received.
    fn finish(self) -> Result<Response, StreamError>;
}

/// Optional caller callback
pub struct Notifier<'a> {
    callback: Option<StreamCallback<'a>>,
}

impl<'a> Notifier<'a> {
    /// Wrap the caller's callback, if any
    pub const fn new(callback: Option<StreamCallback<'a>>) -> Self {
        Self { callback }
    }

    /// Whether anyone is listening
    ///
    /// Machines skip building snapshots when this is false.
    pub const fn is_active(&self) -> bool {
        self.callback.is_some()
    }

    /// Send a snapshot; returns whether to keep going
    pub fn snapshot(&mut self, response: &Response) -> bool {
        self.callback.as_deref_mut().is_none_or(|callback| callback(Ok(response)))
    }

    /// Report an in-band error
    pub fn error(&mut self, err: &StreamError) {
        if let Some(callback) = self.callback.as_deref_mut() {
            callback(Err(err));
        }
    }
}

/// Run a state machine over an SSE body until it ends, stops or fails
///
/// Cancellation is checked before every line. The body is dropped on every
/// return path.
///
/// # Errors
///
/// Returns an error if reading fails, the token is cancelled, or the
/// machine rejects a frame or cannot produce a response.
pub async fn drive<M: StreamMachine>(
    body: ByteStream,
    cancellation: &CancellationToken,
    mut machine: M,
    callback: Option<StreamCallback<'_>>,
) -> Result<Response, StreamError> {
    let mut lines = FramedRead::new(StreamReader::new(body), LinesCodec::new());
    let mut frames = FrameBuilder::default();
    let mut notify = Notifier::new(callback);

    loop {
        let line = tokio::select! {
            biased;
            () = cancellation.cancelled() => return Err(StreamError::Cancelled),
            line = lines.next() => line,
        };

        let Some(line) = line else {
            break;
        };

        let line = line.map_err(|e| match e {
            LinesCodecError::Io(e) => StreamError::Read(e),
            e @ LinesCodecError::MaxLineLengthExceeded => StreamError::Read(std::io::Error::other(e)),
        })?;

        let Some(frame) = frames.push(&line) else {
            continue;
        };

        tracing::trace!(event = frame.event.as_deref().unwrap_or(""), bytes = frame.data.len(), "stream frame");

        if machine.on_frame(&frame, &mut notify)? == Flow::Stop {
            tracing::debug!("stream stopped by callback");
            return machine.finish();
        }
    }

    machine.finish()
}

/// Decode a frame payload as the JSON shape its event requires
fn parse<T: serde::de::DeserializeOwned>(event: &str, data: &str) -> Result<T, StreamError> {
    serde_json::from_str(data).map_err(|source| StreamError::MalformedEvent {
        event: event.to_owned(),
        source,
    })
}
