//! HTTP transport seam
//!
//! Providers build a complete [`http::Request`] and hand it to a
//! [`Transport`]. The response body is exposed as a byte stream so the same
//! seam serves both buffered JSON and server-sent events.

use std::io;
use std::pin::Pin;

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};

/// Response body as a stream of chunks
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Sends a fully formed request and returns the status, headers and body
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request
    ///
    /// A non-success status is not an error at this layer.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent or no response head
    /// is received.
    async fn send(&self, request: http::Request<Vec<u8>>) -> anyhow::Result<http::Response<ByteStream>>;
}

/// [`Transport`] backed by a `reqwest` client
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Transport with a default client
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport sharing an existing client and its connection pool
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: http::Request<Vec<u8>>) -> anyhow::Result<http::Response<ByteStream>> {
        let request = reqwest::Request::try_from(request).context("failed to build request")?;
        let url = request.url().clone();

        let response = self
            .client
            .execute(request)
            .await
            .with_context(|| format!("failed to send request to {url}"))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body: ByteStream = Box::pin(response.bytes_stream().map(|chunk| chunk.map_err(io::Error::other)));

        let mut out = http::Response::new(body);
        *out.status_mut() = status;
        *out.headers_mut() = headers;
        Ok(out)
    }
}

/// Read a body to the end
///
/// # Errors
///
/// Returns the first read error of the stream.
pub async fn read_body(mut body: ByteStream) -> io::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    while let Some(chunk) = body.next().await {
        buffer.extend_from_slice(&chunk?);
    }
    Ok(buffer)
}
