//! Streaming upload tests
//!
//! A recording transport stands in for the HTTP layer: it captures the
//! request head, optionally consumes the streamed body, and answers with a
//! fixed status.

use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use swt_core::{
    Error, HttpRequest, HttpResponse, HttpTransport, Method, RequestBody, ResponseBody, Result,
    TransferClient, TransferConfig,
};
use tokio::io::{AsyncRead, ReadBuf};

#[derive(Debug, Default)]
struct Captured {
    method: Option<Method>,
    url: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    body_error: Option<io::ErrorKind>,
}

/// How the fake server treats the request body
#[derive(Clone, Copy)]
enum BodyMode {
    /// read it to the end, like a real server would
    Consume,
    /// answer without touching it
    Ignore,
}

struct RecordingTransport {
    status: u16,
    mode: BodyMode,
    captured: Arc<Mutex<Captured>>,
}

impl RecordingTransport {
    fn new(status: u16, mode: BodyMode) -> (Arc<Self>, Arc<Mutex<Captured>>) {
        let captured = Arc::new(Mutex::new(Captured::default()));
        let transport = Arc::new(Self {
            status,
            mode,
            captured: Arc::clone(&captured),
        });
        (transport, captured)
    }
}

#[async_trait]
impl HttpTransport for RecordingTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
        } = request;

        let mut data = Vec::new();
        let mut body_error = None;
        if let (BodyMode::Consume, RequestBody::Stream(mut stream)) = (self.mode, body) {
            while let Some(chunk) = stream.next().await {
                match chunk {
                    Ok(chunk) => data.extend_from_slice(&chunk),
                    Err(e) => {
                        body_error = Some(e.kind());
                        break;
                    }
                }
            }
        }

        let mut captured = self.captured.lock().unwrap();
        captured.method = Some(method);
        captured.url = url;
        captured.headers = headers;
        captured.body = data;
        captured.body_error = body_error;

        Ok(HttpResponse::new(self.status)
            .with_body(ResponseBody::from_bytes(&b"{\"size\":1}"[..])))
    }
}

/// Fails its first request while keeping the request body alive, then
/// consumes bodies and answers 201
struct RefusingOnceTransport {
    calls: AtomicUsize,
    held: Mutex<Vec<RequestBody>>,
}

#[async_trait]
impl HttpTransport for RefusingOnceTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            // a body that is neither read nor dropped; only the client can release it
            self.held.lock().unwrap().push(request.body);
            return Err(Error::Network("connection refused".into()));
        }

        let mut size = 0usize;
        if let RequestBody::Stream(mut stream) = request.body {
            while let Some(chunk) = stream.next().await {
                size += chunk?.len();
            }
        }
        Ok(HttpResponse::new(201).with_body(ResponseBody::from_bytes(size.to_string())))
    }
}

/// Reader that yields `good` bytes and then fails
struct FailingReader {
    good: usize,
    sent: usize,
}

impl AsyncRead for FailingReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.sent >= self.good {
            return Poll::Ready(Err(io::Error::other("source disk went away")));
        }
        let n = (self.good - self.sent).min(buf.remaining()).min(1024);
        buf.put_slice(&vec![b'x'; n]);
        self.sent += n;
        Poll::Ready(Ok(()))
    }
}

fn small_pipe_client(transport: Arc<dyn HttpTransport>) -> TransferClient {
    let config = TransferConfig {
        workers: 2,
        pipe_buffer_size: 1024,
    };
    TransferClient::with_config(transport, &config)
}

fn header<'a>(captured: &'a Captured, name: &str) -> Option<&'a str> {
    captured
        .headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Split a single-part multipart body into (part headers, part content)
fn decode_single_part(body: &[u8], content_type: &str) -> (String, Vec<u8>) {
    let boundary = content_type
        .strip_prefix("multipart/form-data; boundary=")
        .expect("multipart content type");
    let opening = format!("--{boundary}\r\n");
    let closing = format!("\r\n--{boundary}--\r\n");

    assert!(body.starts_with(opening.as_bytes()), "missing opening boundary");
    assert!(body.ends_with(closing.as_bytes()), "missing closing boundary");

    let rest = &body[opening.len()..];
    let header_end = rest
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("end of part headers");
    let headers = String::from_utf8(rest[..header_end].to_vec()).unwrap();
    let content = rest[header_end + 4..rest.len() - closing.len()].to_vec();
    (headers, content)
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[tokio::test]
async fn upload_round_trip_sizes() {
    for len in [0usize, 1, 200_000] {
        let (transport, captured) = RecordingTransport::new(201, BodyMode::Consume);
        let client = small_pipe_client(transport);
        let data = pattern(len);

        let raw = client
            .upload(
                "http://volume:8080/3,01637037d6",
                "blob.bin",
                std::io::Cursor::new(data.clone()),
                None,
                &HashMap::new(),
            )
            .await
            .unwrap();
        assert_eq!(raw.status, 201);
        assert_eq!(raw.text(), "{\"size\":1}");

        let captured = captured.lock().unwrap();
        assert_eq!(captured.method, Some(Method::Post));
        assert_eq!(captured.url, "http://volume:8080/3,01637037d6");
        assert!(captured.body_error.is_none());

        let content_type = header(&captured, "Content-Type").unwrap();
        let (part_headers, content) = decode_single_part(&captured.body, content_type);
        assert!(part_headers.contains(
            "Content-Disposition: form-data; name=\"file\"; filename=\"blob.bin\""
        ));
        assert_eq!(content.len(), len);
        assert_eq!(content, data, "payload mismatch for {len} bytes");
        drop(captured);

        client.close().await;
    }
}

#[tokio::test]
async fn upload_sends_metadata_headers_and_content_type() {
    let (transport, captured) = RecordingTransport::new(201, BodyMode::Consume);
    let client = small_pipe_client(transport);
    let metadata = HashMap::from([
        ("Owner".to_string(), "alice".to_string()),
        ("Ttl".to_string(), "3d".to_string()),
    ]);

    client
        .upload(
            "http://volume/1,ab",
            "photo.png",
            &b"\x89PNG"[..],
            None,
            &metadata,
        )
        .await
        .unwrap();

    let captured = captured.lock().unwrap();
    assert_eq!(header(&captured, "Seaweed-Owner"), Some("alice"));
    assert_eq!(header(&captured, "Seaweed-Ttl"), Some("3d"));

    let content_type = header(&captured, "Content-Type").unwrap();
    let (part_headers, content) = decode_single_part(&captured.body, content_type);
    assert!(part_headers.contains("Content-Type: image/png"));
    assert_eq!(content, b"\x89PNG");
    drop(captured);
    client.close().await;
}

#[tokio::test]
async fn upload_explicit_mime_and_sanitized_name() {
    let (transport, captured) = RecordingTransport::new(201, BodyMode::Consume);
    let client = small_pipe_client(transport);

    client
        .upload(
            "http://volume/1,ab",
            "evil\"\r\nX: y.txt",
            &b"abc"[..],
            Some("application/octet-stream"),
            &HashMap::new(),
        )
        .await
        .unwrap();

    let captured = captured.lock().unwrap();
    let content_type = header(&captured, "Content-Type").unwrap();
    let (part_headers, _) = decode_single_part(&captured.body, content_type);
    let lines: Vec<&str> = part_headers.split("\r\n").collect();
    assert_eq!(
        lines,
        vec![
            "Content-Disposition: form-data; name=\"file\"; filename=\"evil\\\"__X: y.txt\"",
            "Content-Type: application/octet-stream",
        ]
    );
    drop(captured);
    client.close().await;
}

#[tokio::test]
async fn upload_source_failure_overrides_success_status() {
    let (transport, captured) = RecordingTransport::new(200, BodyMode::Consume);
    let client = small_pipe_client(transport);

    let err = client
        .upload(
            "http://volume/1,ab",
            "broken.bin",
            FailingReader {
                good: 5000,
                sent: 0,
            },
            None,
            &HashMap::new(),
        )
        .await
        .unwrap_err();

    match &err {
        Error::Io(e) => assert!(e.to_string().contains("source disk went away")),
        other => panic!("unexpected error: {other:?}"),
    }

    // the server side saw an error, never a clean end of a truncated body
    let captured = captured.lock().unwrap();
    assert_eq!(captured.body_error, Some(io::ErrorKind::Other));
    drop(captured);
    client.close().await;
}

#[tokio::test]
async fn upload_abandoned_body_does_not_hang() {
    let (transport, _captured) = RecordingTransport::new(200, BodyMode::Ignore);
    let client = small_pipe_client(transport);

    // far larger than the pipe buffer, so the encoder must block on the pipe
    let data = pattern(1 << 20);
    let result = tokio::time::timeout(
        Duration::from_secs(10),
        client.upload(
            "http://volume/1,ab",
            "big.bin",
            std::io::Cursor::new(data),
            None,
            &HashMap::new(),
        ),
    )
    .await
    .expect("upload hung after the transport abandoned the body");

    let err = result.unwrap_err();
    match err {
        Error::Io(e) => assert_eq!(e.kind(), io::ErrorKind::BrokenPipe),
        other => panic!("unexpected error: {other:?}"),
    }
    client.close().await;
}

#[tokio::test]
async fn upload_transport_error_frees_worker() {
    let transport = Arc::new(RefusingOnceTransport {
        calls: AtomicUsize::new(0),
        held: Mutex::new(Vec::new()),
    });
    let config = TransferConfig {
        workers: 1,
        pipe_buffer_size: 1024,
    };
    let client = TransferClient::with_config(transport.clone(), &config);

    let err = tokio::time::timeout(
        Duration::from_secs(10),
        client.upload(
            "http://volume/1,ab",
            "big.bin",
            std::io::Cursor::new(pattern(1 << 20)),
            None,
            &HashMap::new(),
        ),
    )
    .await
    .expect("failed upload hung")
    .unwrap_err();
    assert!(matches!(err, Error::Network(_)), "unexpected error: {err:?}");

    // the only worker must be free again for the next upload
    let raw = tokio::time::timeout(
        Duration::from_secs(10),
        client.upload(
            "http://volume/1,ab",
            "small.bin",
            std::io::Cursor::new(pattern(100)),
            None,
            &HashMap::new(),
        ),
    )
    .await
    .expect("worker still blocked by the failed upload")
    .unwrap();
    assert_eq!(raw.status, 201);
    assert!(raw.text().parse::<usize>().unwrap() > 100);

    assert_eq!(transport.held.lock().unwrap().len(), 1);
    client.close().await;
}

#[tokio::test]
async fn concurrent_uploads_share_a_small_pool() {
    let (transport, _captured) = RecordingTransport::new(201, BodyMode::Consume);
    let config = TransferConfig {
        workers: 1,
        pipe_buffer_size: 512,
    };
    let client = Arc::new(TransferClient::with_config(transport, &config));

    let mut uploads = Vec::new();
    for i in 0..6 {
        let client = Arc::clone(&client);
        uploads.push(tokio::spawn(async move {
            client
                .upload(
                    "http://volume/1,ab",
                    &format!("f{i}.txt"),
                    std::io::Cursor::new(pattern(10_000)),
                    None,
                    &HashMap::new(),
                )
                .await
                .map(|raw| raw.status)
        }));
    }

    let statuses = tokio::time::timeout(Duration::from_secs(20), async {
        let mut statuses = Vec::new();
        for upload in uploads {
            statuses.push(upload.await.unwrap().unwrap());
        }
        statuses
    })
    .await
    .expect("uploads deadlocked");

    assert!(statuses.iter().all(|s| *s == 201));
    client.close().await;
}
