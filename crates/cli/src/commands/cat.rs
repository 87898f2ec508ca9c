//! cat command - Stream a remote file to stdout
//!
//! The body is copied chunk by chunk, so large files never sit in memory.

use clap::Args;
use swt_core::{ResponseBody, TransferClient};
use tokio::io::AsyncWriteExt;

use super::{parse_url, report};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Stream a remote file to stdout
#[derive(Args, Debug)]
pub struct CatArgs {
    /// URL of the file
    pub url: String,
}

/// Execute the cat command
pub async fn execute(
    args: CatArgs,
    client: &TransferClient,
    output_config: OutputConfig,
) -> ExitCode {
    let formatter = Formatter::new(output_config);

    if let Err(e) = parse_url(&args.url) {
        formatter.error(&e.to_string());
        return ExitCode::from(&e);
    }

    let result = client
        .download(&args.url, async |body: &mut ResponseBody| -> swt_core::Result<()> {
            let mut stdout = tokio::io::stdout();
            body.copy_to(&mut stdout).await?;
            stdout.flush().await?;
            Ok(())
        })
        .await;

    match result {
        Ok(filename) => {
            tracing::debug!(url = %args.url, filename = %filename, "streamed to stdout");
            ExitCode::Success
        }
        Err(e) => report(&formatter, &format!("Failed to read {}", args.url), &e),
    }
}
