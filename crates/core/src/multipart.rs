//! multipart/form-data encoder
//!
//! Writes parts straight onto an [`AsyncWrite`], so an upload body can be
//! produced incrementally into a pipe instead of being built in memory.

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

/// Form field name the storage server expects the file under
pub const FILE_FIELD: &str = "file";

/// Streaming multipart/form-data writer
#[derive(Debug)]
pub struct MultipartWriter<W> {
    inner: W,
    boundary: String,
    parts: usize,
}

impl<W> MultipartWriter<W>
where
    W: AsyncWrite + Unpin,
{
    /// Create a writer with a random boundary
    pub fn new(inner: W) -> Self {
        Self::with_boundary(inner, random_boundary())
    }

    /// Create a writer with a caller-chosen boundary
    pub fn with_boundary(inner: W, boundary: impl Into<String>) -> Self {
        Self {
            inner,
            boundary: boundary.into(),
            parts: 0,
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the request's `Content-Type` header
    pub fn form_data_content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Start a new part; its body is whatever is written next
    pub async fn begin_part(&mut self, headers: &[(&str, String)]) -> std::io::Result<()> {
        let mut head = String::new();
        if self.parts > 0 {
            head.push_str("\r\n");
        }
        head.push_str("--");
        head.push_str(&self.boundary);
        head.push_str("\r\n");
        for (name, value) in headers {
            head.push_str(name);
            head.push_str(": ");
            head.push_str(value);
            head.push_str("\r\n");
        }
        head.push_str("\r\n");

        self.inner.write_all(head.as_bytes()).await?;
        self.parts += 1;
        Ok(())
    }

    /// Copy `source` into the current part, returning the number of bytes
    pub async fn copy_part_body<R>(&mut self, source: &mut R) -> std::io::Result<u64>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        tokio::io::copy(source, &mut self.inner).await
    }

    /// Begin a `file` form part and stream `source` into it
    pub async fn write_file_part<R>(
        &mut self,
        filename: &str,
        content_type: Option<&str>,
        source: &mut R,
    ) -> std::io::Result<u64>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut headers = vec![(
            "Content-Disposition",
            format!(
                r#"form-data; name="{FILE_FIELD}"; filename="{}""#,
                sanitize_filename(filename)
            ),
        )];
        if let Some(content_type) = content_type {
            headers.push(("Content-Type", content_type.to_string()));
        }

        self.begin_part(&headers).await?;
        self.copy_part_body(source).await
    }

    /// Write the closing boundary and hand back the underlying writer
    pub async fn finish(mut self) -> std::io::Result<W> {
        let closing = if self.parts > 0 {
            format!("\r\n--{}--\r\n", self.boundary)
        } else {
            format!("--{}--\r\n", self.boundary)
        };
        self.inner.write_all(closing.as_bytes()).await?;
        self.inner.flush().await?;
        Ok(self.inner)
    }

    /// Give up on the body and return the underlying writer as is
    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// 32 hex characters, never present in practice inside part content
pub fn random_boundary() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Make a filename safe to embed in a quoted `Content-Disposition` parameter.
///
/// Control characters (CR and LF included) become `_`; backslashes and double
/// quotes are backslash-escaped.
pub fn sanitize_filename(name: &str) -> String {
    let mut sanitized = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '\\' => sanitized.push_str("\\\\"),
            '"' => sanitized.push_str("\\\""),
            c if c.is_control() => sanitized.push('_'),
            c => sanitized.push(c),
        }
    }
    sanitized
}

/// Explicit type wins, else a guess from the extension, else nothing
pub fn resolve_content_type(filename: &str, explicit: Option<&str>) -> Option<String> {
    if let Some(explicit) = explicit.map(str::trim).filter(|t| !t.is_empty()) {
        return Some(explicit.to_string());
    }

    let extension = std::path::Path::new(filename)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    mime_guess::from_ext(&extension)
        .first()
        .map(|mime| mime.essence_str().to_string())
}
