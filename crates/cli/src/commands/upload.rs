//! upload command - Stream a local file to the server
//!
//! The file is encoded as multipart/form-data while the request is in
//! flight; nothing is buffered beyond the transfer pipe.

use std::collections::HashMap;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};

use clap::Args;
use serde::Serialize;
use swt_core::TransferClient;
use tokio::io::{AsyncRead, ReadBuf};

use super::{parse_url, report};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig, ProgressBar};

/// Upload a local file as multipart/form-data
#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Local file to upload
    pub file: PathBuf,

    /// Destination URL (e.g. http://volume:8080/3,01637037d6)
    pub url: String,

    /// MIME type of the file; guessed from the extension when omitted
    #[arg(long)]
    pub content_type: Option<String>,

    /// Filename to send instead of the local one
    #[arg(long)]
    pub name: Option<String>,

    /// Extra metadata sent as a Seaweed-<key> header, may be repeated
    #[arg(long = "meta", value_name = "KEY=VALUE")]
    pub meta: Vec<String>,
}

#[derive(Debug, Serialize)]
struct UploadOutput {
    status: &'static str,
    file: String,
    url: String,
    size_bytes: u64,
    size_human: String,
    response_status: u16,
    response: serde_json::Value,
}

/// Execute the upload command
pub async fn execute(
    args: UploadArgs,
    client: &TransferClient,
    output_config: OutputConfig,
) -> ExitCode {
    let formatter = Formatter::new(output_config.clone());

    if let Err(e) = parse_url(&args.url) {
        formatter.error(&e.to_string());
        return ExitCode::from(&e);
    }
    let metadata = match parse_metadata(&args.meta) {
        Ok(metadata) => metadata,
        Err(e) => {
            formatter.error(&e);
            return ExitCode::UsageError;
        }
    };
    let filename = match upload_name(&args) {
        Some(name) => name,
        None => {
            formatter.error(&format!(
                "Cannot determine a filename for {}; pass --name",
                args.file.display()
            ));
            return ExitCode::UsageError;
        }
    };

    let file = match tokio::fs::File::open(&args.file).await {
        Ok(file) => file,
        Err(e) => {
            formatter.error(&format!("Failed to open {}: {e}", args.file.display()));
            return if e.kind() == std::io::ErrorKind::NotFound {
                ExitCode::NotFound
            } else {
                ExitCode::GeneralError
            };
        }
    };
    let size = match file.metadata().await {
        Ok(meta) if meta.is_file() => meta.len(),
        Ok(_) => {
            formatter.error(&format!("Not a regular file: {}", args.file.display()));
            return ExitCode::UsageError;
        }
        Err(e) => {
            formatter.error(&format!("Failed to read {}: {e}", args.file.display()));
            return ExitCode::GeneralError;
        }
    };

    let progress = ProgressBar::new(output_config, size);
    let source = ProgressReader {
        inner: file,
        progress: progress.clone(),
    };

    let result = client
        .upload(
            &args.url,
            &filename,
            source,
            args.content_type.as_deref(),
            &metadata,
        )
        .await;
    progress.finish_and_clear();

    let raw = match result {
        Ok(raw) => raw,
        Err(e) => {
            let action = format!("Failed to upload {}", args.file.display());
            return report(&formatter, &action, &e);
        }
    };

    if !raw.is_success() {
        formatter.error(&format!(
            "Upload to {} failed with status {}: {}",
            args.url,
            raw.status,
            raw.text().trim()
        ));
        return if raw.status == 404 {
            ExitCode::NotFound
        } else {
            ExitCode::GeneralError
        };
    }

    let size_human = humansize::format_size(size, humansize::BINARY);
    if formatter.is_json() {
        let response = serde_json::from_slice(&raw.body)
            .unwrap_or_else(|_| serde_json::Value::String(raw.text()));
        formatter.json(&UploadOutput {
            status: "success",
            file: args.file.display().to_string(),
            url: args.url,
            size_bytes: size,
            size_human,
            response_status: raw.status,
            response,
        });
    } else {
        formatter.println(&format!(
            "{} -> {} ({size_human})",
            args.file.display(),
            args.url
        ));
    }
    ExitCode::Success
}

fn upload_name(args: &UploadArgs) -> Option<String> {
    match &args.name {
        Some(name) if !name.trim().is_empty() => Some(name.clone()),
        _ => args
            .file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned()),
    }
}

/// Parse repeated `key=value` arguments
fn parse_metadata(raw: &[String]) -> Result<HashMap<String, String>, String> {
    let mut metadata = HashMap::new();
    for entry in raw {
        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| format!("Invalid metadata '{entry}'. Expected: key=value"))?;
        let key = key.trim();
        if key.is_empty() || !key.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
            return Err(format!(
                "Invalid metadata key '{key}': use letters, digits and '-'"
            ));
        }
        metadata.insert(key.to_string(), value.to_string());
    }
    Ok(metadata)
}

/// Counts bytes into the progress bar as the encoder reads them
struct ProgressReader<R> {
    inner: R,
    progress: ProgressBar,
}

impl<R: AsyncRead + Unpin> AsyncRead for ProgressReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let before = buf.filled().len();
        let poll = Pin::new(&mut self.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = poll {
            self.progress.inc((buf.filled().len() - before) as u64);
        }
        poll
    }
}
