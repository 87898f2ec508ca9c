//! HTTP transport abstraction
//!
//! The transfer client never talks to an HTTP library directly. It hands an
//! [`HttpRequest`] to an injected [`HttpTransport`] and gets back an
//! [`HttpResponse`] whose body is a live byte stream. Connection pooling,
//! TLS and retries are the transport's business.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt, stream};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::Result;

/// Streaming body handed to the transport with a request.
pub type RequestStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + Sync + 'static>>;

/// Streaming body produced by the transport with a response.
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + 'static>>;

/// Header list in transport order; a name may repeat.
pub type HeaderList = Vec<(String, String)>;

/// HTTP methods used by the transfer client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Post,
    Delete,
}

impl Method {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request body
#[derive(Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Stream(RequestStream),
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Empty => f.write_str("Empty"),
            RequestBody::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// A request ready to be executed by a transport
#[derive(Debug)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderList,
    pub body: RequestBody,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    /// Set a header, replacing earlier values with the same name
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    pub fn body(mut self, body: RequestStream) -> Self {
        self.body = RequestBody::Stream(body);
        self
    }

    /// First value of a header, compared case-insensitively
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Response returned by a transport
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    /// Canonical reason phrase, e.g. "Not Found"
    pub reason: Option<String>,
    pub headers: HeaderList,
    pub body: ResponseBody,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            reason: None,
            headers: Vec::new(),
            body: ResponseBody::empty(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: ResponseBody) -> Self {
        self.body = body;
        self
    }

    /// Status code followed by the reason phrase, e.g. "404 Not Found"
    pub fn status_line(&self) -> String {
        match &self.reason {
            Some(reason) => format!("{} {}", self.status, reason),
            None => self.status.to_string(),
        }
    }
}

/// Live response body.
///
/// Dropping the body closes it without draining. Prefer
/// [`ResponseBody::drain_and_close`] so the transport can reuse the connection.
pub struct ResponseBody {
    stream: Option<ByteStream>,
}

impl ResponseBody {
    pub fn new(stream: ByteStream) -> Self {
        Self {
            stream: Some(stream),
        }
    }

    pub fn empty() -> Self {
        Self::new(Box::pin(stream::empty::<io::Result<Bytes>>()))
    }

    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self::new(Box::pin(stream::once(async move { Ok::<_, io::Error>(data) })))
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    /// Next chunk of the body; `None` at end of stream or once closed
    pub async fn chunk(&mut self) -> io::Result<Option<Bytes>> {
        match self.stream.as_mut() {
            Some(stream) => stream.next().await.transpose(),
            None => Ok(None),
        }
    }

    /// Read the remaining body into memory
    pub async fn read_to_end(&mut self) -> io::Result<Vec<u8>> {
        let mut data = Vec::new();
        while let Some(chunk) = self.chunk().await? {
            data.extend_from_slice(&chunk);
        }
        Ok(data)
    }

    /// Copy the remaining body into a writer, returning the byte count
    pub async fn copy_to<W>(&mut self, writer: &mut W) -> io::Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut copied = 0u64;
        while let Some(chunk) = self.chunk().await? {
            writer.write_all(&chunk).await?;
            copied += chunk.len() as u64;
        }
        writer.flush().await?;
        Ok(copied)
    }

    /// Read whatever is left and release the stream.
    ///
    /// The stream is released even when draining fails. Draining a closed
    /// body is a no-op.
    pub async fn drain_and_close(&mut self) -> io::Result<u64> {
        let mut drained = 0u64;
        let result = loop {
            match self.chunk().await {
                Ok(Some(chunk)) => drained += chunk.len() as u64,
                Ok(None) => break Ok(drained),
                Err(err) => break Err(err),
            }
        };
        self.close();
        result
    }

    /// Release the stream without draining it
    pub fn close(&mut self) {
        self.stream = None;
    }
}

impl Stream for ResponseBody {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.stream.as_mut() {
            Some(stream) => stream.as_mut().poll_next(cx),
            None => Poll::Ready(None),
        }
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseBody")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Performs HTTP requests for the transfer client.
///
/// Implementations must be safe for concurrent use; one transport is
/// typically shared by many clients.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send the request and return once the response head is available
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}
