//! Response reader
//!
//! Drains a response into memory and always releases its body, whichever
//! way the read ends.

use serde::Serialize;

use crate::error::Result;
use crate::transport::HttpResponse;

/// Fully read response body plus the status it came with
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as UTF-8, replacing invalid sequences
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Read the whole body of `response` and close it.
///
/// Read errors are returned as-is; the body is closed either way.
pub async fn read_all(response: HttpResponse) -> Result<RawResponse> {
    let HttpResponse {
        status, mut body, ..
    } = response;

    let read = body.read_to_end().await;
    body.close();

    let body = read?;
    tracing::trace!(status, bytes = body.len(), "response body read");
    Ok(RawResponse { status, body })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::transport::ResponseBody;
    use bytes::Bytes;
    use futures::stream;
    use std::io;

    #[tokio::test]
    async fn test_read_all() {
        let response = HttpResponse::new(201).with_body(ResponseBody::from_bytes(&b"{\"fid\":\"3,01\"}"[..]));
        let raw = read_all(response).await.unwrap();
        assert_eq!(raw.status, 201);
        assert!(raw.is_success());
        assert_eq!(raw.text(), "{\"fid\":\"3,01\"}");
    }

    #[tokio::test]
    async fn test_read_all_multiple_chunks() {
        let chunks = vec![
            Ok(Bytes::from_static(b"ab")),
            Ok(Bytes::from_static(b"")),
            Ok(Bytes::from_static(b"cd")),
        ];
        let body = ResponseBody::new(Box::pin(stream::iter(chunks)));
        let raw = read_all(HttpResponse::new(500).with_body(body)).await.unwrap();
        assert_eq!(raw.body, b"abcd");
        assert!(!raw.is_success());
    }

    #[tokio::test]
    async fn test_read_error_returned_as_is() {
        let chunks = vec![
            Ok(Bytes::from_static(b"ab")),
            Err(io::Error::new(io::ErrorKind::ConnectionAborted, "aborted")),
        ];
        let body = ResponseBody::new(Box::pin(stream::iter(chunks)));
        let err = read_all(HttpResponse::new(200).with_body(body))
            .await
            .unwrap_err();
        match err {
            Error::Io(e) => assert_eq!(e.kind(), io::ErrorKind::ConnectionAborted),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
