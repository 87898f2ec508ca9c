//! Transfer client
//!
//! One-shot get/delete/preview/download/upload operations over an injected
//! [`HttpTransport`]. Uploads are streamed: a pool worker encodes the
//! multipart body into a pipe while the request consumes the other end.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncWriteExt};

use crate::config::TransferConfig;
use crate::error::{Error, Result};
use crate::metadata::{self, FileMetadata};
use crate::multipart::{MultipartWriter, resolve_content_type};
use crate::pipe::pipe;
use crate::pool::{Task, WorkerPool};
use crate::response::{RawResponse, read_all};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, Method, ResponseBody};

/// Prefix of the request headers carrying extra upload metadata
pub const METADATA_HEADER_PREFIX: &str = "Seaweed-";

/// Statuses a DELETE treats as success, whatever the body says
const DELETE_OK_STATUSES: [u16; 4] = [200, 202, 204, 404];

/// An open download whose body the caller must consume or drop
#[derive(Debug)]
pub struct Download {
    pub metadata: FileMetadata,
    pub body: ResponseBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Client for one remote endpoint
pub struct TransferClient {
    transport: Arc<dyn HttpTransport>,
    workers: WorkerPool,
    pipe_capacity: usize,
}

impl TransferClient {
    /// Create a client with default sizing. Must be called inside a Tokio runtime.
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self::with_config(transport, &TransferConfig::default())
    }

    /// Create a client sized by `config`. Must be called inside a Tokio runtime.
    pub fn with_config(transport: Arc<dyn HttpTransport>, config: &TransferConfig) -> Self {
        Self {
            transport,
            workers: WorkerPool::new(config.workers),
            pipe_capacity: config.pipe_buffer_size,
        }
    }

    /// Stop the worker pool and wait for in-flight uploads to settle
    pub async fn close(&self) {
        self.workers.shutdown().await;
    }

    /// GET `url` with extra request headers and return the whole body
    pub async fn get(&self, url: &str, headers: &HashMap<String, String>) -> Result<RawResponse> {
        let mut request = HttpRequest::new(Method::Get, url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = self.transport.execute(request).await?;
        read_all(response).await
    }

    /// DELETE `url`, returning the status on success
    pub async fn delete(&self, url: &str) -> Result<u16> {
        let response = self
            .transport
            .execute(HttpRequest::new(Method::Delete, url))
            .await?;
        let raw = read_all(response).await?;

        if DELETE_OK_STATUSES.contains(&raw.status) {
            return Ok(raw.status);
        }

        if let Ok(body) = serde_json::from_slice::<ErrorBody>(&raw.body) {
            return Err(Error::Remote(format!("Delete {url}: {}", body.error)));
        }

        Err(Error::UnexpectedResponse(format!(
            "Delete {url}. Got response but can not parse. Body:{} Code:{}",
            raw.text(),
            raw.status
        )))
    }

    /// HEAD `url` and describe the remote file
    pub async fn preview(&self, url: &str) -> Result<FileMetadata> {
        let mut response = self.open(Method::Head, url, "Preview").await?;
        let metadata = FileMetadata::from_headers(&response.headers);
        release(&mut response.body).await;
        Ok(metadata)
    }

    /// GET `url` and hand the live body to `consumer`, returning the filename.
    ///
    /// The body is drained and closed afterwards whatever the consumer did;
    /// the consumer's error is returned unchanged.
    pub async fn download<F>(&self, url: &str, consumer: F) -> Result<String>
    where
        F: AsyncFnOnce(&mut ResponseBody) -> Result<()>,
    {
        let mut response = self.open(Method::Get, url, "Download").await?;
        let filename = metadata::filename(&response.headers);

        let outcome = consumer(&mut response.body).await;
        release(&mut response.body).await;

        outcome.map(|()| filename)
    }

    /// Like [`TransferClient::download`], also returning size and headers
    pub async fn download_with_metadata<F>(&self, url: &str, consumer: F) -> Result<FileMetadata>
    where
        F: AsyncFnOnce(&mut ResponseBody) -> Result<()>,
    {
        let mut response = self.open(Method::Get, url, "Download").await?;
        let metadata = FileMetadata::from_headers(&response.headers);

        let outcome = consumer(&mut response.body).await;
        release(&mut response.body).await;

        outcome.map(|()| metadata)
    }

    /// GET `url` and return the open body; closing it is up to the caller
    pub async fn download_stream(&self, url: &str) -> Result<Download> {
        let response = self.open(Method::Get, url, "Download").await?;
        Ok(Download {
            metadata: FileMetadata::from_headers(&response.headers),
            body: response.body,
        })
    }

    /// Upload `source` as the `file` part of a multipart/form-data POST.
    ///
    /// The body is produced by a pool worker while the request is in flight,
    /// so memory use does not grow with the file size. An error while
    /// encoding is returned even when the server already answered 2xx.
    pub async fn upload<R>(
        &self,
        url: &str,
        filename: &str,
        mut source: R,
        content_type: Option<&str>,
        extra_metadata: &HashMap<String, String>,
    ) -> Result<RawResponse>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let (writer, reader) = pipe(self.pipe_capacity);
        let closer = reader.closer();
        let mut multipart = MultipartWriter::new(writer);
        let form_content_type = multipart.form_data_content_type();

        let part_name = filename.to_string();
        let part_type = resolve_content_type(filename, content_type);
        let encode = Task::new(async move {
            match multipart
                .write_file_part(&part_name, part_type.as_deref(), &mut source)
                .await
            {
                Ok(copied) => {
                    let mut writer = multipart.finish().await?;
                    writer.shutdown().await?;
                    tracing::debug!(file = %part_name, bytes = copied, "multipart body encoded");
                    Ok(copied)
                }
                Err(err) => {
                    let forwarded = std::io::Error::new(err.kind(), err.to_string());
                    multipart.into_inner().close_with_error(forwarded);
                    Err(Error::Io(err))
                }
            }
        });
        let encoding = self.workers.submit(encode).await;

        let mut request = HttpRequest::new(Method::Post, url)
            .header("Content-Type", form_content_type)
            .body(Box::pin(reader));
        for (key, value) in extra_metadata {
            request = request.header(format!("{METADATA_HEADER_PREFIX}{key}"), value.as_str());
        }

        tracing::debug!(url, file = filename, "upload started");
        let sent = self.transport.execute(request).await;

        // a transport that gave up on the body must not leave the encoder blocked
        closer.close();

        let raw = read_all(sent?).await?;
        encoding.result().await?;
        Ok(raw)
    }

    /// Send a body-less request and insist on 200 OK
    async fn open(&self, method: Method, url: &str, operation: &str) -> Result<HttpResponse> {
        let mut response = self.transport.execute(HttpRequest::new(method, url)).await?;
        if response.status == 200 {
            return Ok(response);
        }

        release(&mut response.body).await;
        let message = format!(
            "{operation} {url} but error. Status:{}",
            response.status_line()
        );
        if response.status == 404 {
            Err(Error::NotFound(message))
        } else {
            Err(Error::Status(message))
        }
    }
}

/// Drain and close a body, logging failures instead of returning them
async fn release(body: &mut ResponseBody) {
    if let Err(e) = body.drain_and_close().await {
        tracing::warn!("failed to drain response body: {e}");
    }
}
