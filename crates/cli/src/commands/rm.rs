//! rm command - Delete a remote file
//!
//! A file that is already gone counts as deleted.

use clap::Args;
use serde::Serialize;
use swt_core::TransferClient;

use super::{parse_url, report};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Delete a remote file
#[derive(Args, Debug)]
pub struct RmArgs {
    /// URL of the file to delete
    pub url: String,
}

#[derive(Debug, Serialize)]
struct RmOutput {
    status: &'static str,
    url: String,
    code: u16,
}

/// Execute the rm command
pub async fn execute(
    args: RmArgs,
    client: &TransferClient,
    output_config: OutputConfig,
) -> ExitCode {
    let formatter = Formatter::new(output_config);

    if let Err(e) = parse_url(&args.url) {
        formatter.error(&e.to_string());
        return ExitCode::from(&e);
    }

    match client.delete(&args.url).await {
        Ok(code) => {
            if formatter.is_json() {
                formatter.json(&RmOutput {
                    status: "success",
                    url: args.url,
                    code,
                });
            } else if code == 404 {
                formatter.success(&format!("Already gone: {}", args.url));
            } else {
                formatter.success(&format!("Removed: {}", args.url));
            }
            ExitCode::Success
        }
        Err(e) => report(&formatter, &format!("Failed to remove {}", args.url), &e),
    }
}
