//! reqwest transport implementation
//!
//! Wraps a shared reqwest::Client and implements the HttpTransport trait
//! from swt-core. Request and response bodies are streamed in both directions.

use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::Client;

use swt_core::{
    Error, HttpConfig, HttpRequest, HttpResponse, HttpTransport, Method, RequestBody,
    ResponseBody, Result,
};

/// HTTP transport backed by reqwest
///
/// Cloning is cheap and clones share one connection pool.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a transport from the `[http]` configuration section
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .danger_accept_invalid_certs(config.insecure);

        if let Some(timeout) = config.timeout_ms {
            builder = builder.timeout(Duration::from_millis(timeout));
        }

        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(|| format!("swt/{}", env!("CARGO_PKG_VERSION")));
        builder = builder.user_agent(user_agent);

        let client = builder
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// Wrap an existing client, sharing its connection pool
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Get the underlying reqwest client
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Head => reqwest::Method::HEAD,
        Method::Post => reqwest::Method::POST,
        Method::Delete => reqwest::Method::DELETE,
    }
}

/// Canonical MIME header form: `content-disposition` becomes `Content-Disposition`
pub fn canonical_header_name(name: &str) -> String {
    let mut canonical = String::with_capacity(name.len());
    let mut upper = true;
    for c in name.chars() {
        if upper {
            canonical.push(c.to_ascii_uppercase());
        } else {
            canonical.push(c.to_ascii_lowercase());
        }
        upper = c == '-';
    }
    canonical
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
        } = request;

        let mut builder = self.client.request(to_reqwest_method(method), &url);
        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let RequestBody::Stream(stream) = body {
            builder = builder.body(reqwest::Body::wrap_stream(stream));
        }

        tracing::debug!(%method, url = %url, "sending request");
        let response = builder
            .send()
            .await
            .map_err(|e| Error::Network(format!("{method} {url}: {e}")))?;

        let status = response.status();
        tracing::debug!(%method, url = %url, status = status.as_u16(), "response received");

        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| match value.to_str() {
                Ok(value) => Some((canonical_header_name(name.as_str()), value.to_string())),
                Err(_) => {
                    tracing::debug!(header = %name, "skipping non-text header value");
                    None
                }
            })
            .collect();

        let body = response.bytes_stream().map_err(std::io::Error::other);

        Ok(HttpResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().map(str::to_string),
            headers,
            body: ResponseBody::new(Box::pin(body)),
        })
    }
}
