//! download command - Save a remote file to disk
//!
//! The destination defaults to the server-supplied filename, falling back to
//! the last segment of the URL path.

use std::path::{Path, PathBuf};

use clap::Args;
use serde::Serialize;
use swt_core::{Download, TransferClient};
use tokio::io::AsyncWriteExt;

use super::{parse_url, report};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig, ProgressBar};

/// Download a remote file to disk
#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// URL of the file
    pub url: String,

    /// Destination file or directory
    pub dest: Option<PathBuf>,

    /// Overwrite the destination if it exists
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
struct DownloadOutput {
    status: &'static str,
    url: String,
    path: String,
    size_bytes: u64,
    size_human: String,
}

/// Execute the download command
pub async fn execute(
    args: DownloadArgs,
    client: &TransferClient,
    output_config: OutputConfig,
) -> ExitCode {
    let formatter = Formatter::new(output_config.clone());

    let url = match parse_url(&args.url) {
        Ok(url) => url,
        Err(e) => {
            formatter.error(&e.to_string());
            return ExitCode::from(&e);
        }
    };

    let Download { metadata, mut body } = match client.download_stream(&args.url).await {
        Ok(download) => download,
        Err(e) => return report(&formatter, &format!("Failed to download {}", args.url), &e),
    };

    let fallback = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default()
        .to_string();
    let dest = match resolve_destination(args.dest.as_deref(), &metadata.filename, &fallback) {
        Ok(dest) => dest,
        Err(e) => {
            body.close();
            formatter.error(&e);
            return ExitCode::UsageError;
        }
    };

    if dest.exists() && !args.force {
        body.close();
        formatter.error(&format!(
            "Destination exists: {} (use --force to overwrite)",
            dest.display()
        ));
        return ExitCode::UsageError;
    }

    let mut file = match tokio::fs::File::create(&dest).await {
        Ok(file) => file,
        Err(e) => {
            body.close();
            formatter.error(&format!("Failed to create {}: {e}", dest.display()));
            return ExitCode::GeneralError;
        }
    };

    let progress = ProgressBar::new(output_config, metadata.size);
    let mut written = 0u64;
    let copied: std::io::Result<()> = async {
        while let Some(chunk) = body.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            progress.inc(chunk.len() as u64);
        }
        file.flush().await
    }
    .await;
    body.close();

    if let Err(e) = copied {
        progress.finish_and_clear();
        drop(file);
        if let Err(remove) = tokio::fs::remove_file(&dest).await {
            tracing::warn!("Failed to remove partial file {}: {remove}", dest.display());
        }
        formatter.error(&format!("Failed to download {}: {e}", args.url));
        return ExitCode::NetworkError;
    }
    progress.finish_and_clear();

    let size_human = humansize::format_size(written, humansize::BINARY);
    if formatter.is_json() {
        formatter.json(&DownloadOutput {
            status: "success",
            url: args.url,
            path: dest.display().to_string(),
            size_bytes: written,
            size_human,
        });
    } else {
        formatter.println(&format!(
            "{} -> {} ({size_human})",
            args.url,
            dest.display()
        ));
    }
    ExitCode::Success
}

/// Pick the local path for a download
///
/// A directory destination gets the remote name appended. Remote names are
/// reduced to their last path component.
fn resolve_destination(
    dest: Option<&Path>,
    remote_name: &str,
    fallback: &str,
) -> Result<PathBuf, String> {
    let name = [remote_name, fallback]
        .into_iter()
        .filter_map(|candidate| Path::new(candidate).file_name())
        .next()
        .map(PathBuf::from);

    match dest {
        Some(dest) if dest.is_dir() => name
            .map(|name| dest.join(name))
            .ok_or_else(|| "Cannot determine a filename; pass a destination file".to_string()),
        Some(dest) => Ok(dest.to_path_buf()),
        None => name.ok_or_else(|| {
            "Cannot determine a filename; pass a destination file".to_string()
        }),
    }
}
