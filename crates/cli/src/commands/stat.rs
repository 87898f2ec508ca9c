//! stat command - Show remote file metadata
//!
//! Issues a HEAD request and reports the filename, size and response headers.

use std::collections::BTreeMap;

use clap::Args;
use comfy_table::{Table, presets};
use serde::Serialize;
use swt_core::{FileMetadata, TransferClient};

use super::{parse_url, report};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Show remote file metadata
#[derive(Args, Debug)]
pub struct StatArgs {
    /// URL of the file
    pub url: String,

    /// Also list every response header
    #[arg(long)]
    pub headers: bool,
}

#[derive(Debug, Serialize)]
struct StatOutput {
    url: String,
    name: String,
    size_bytes: u64,
    size_human: String,
    headers: BTreeMap<String, String>,
}

impl StatOutput {
    fn new(url: String, metadata: FileMetadata) -> Self {
        Self {
            url,
            size_human: humansize::format_size(metadata.size, humansize::BINARY),
            name: metadata.filename,
            size_bytes: metadata.size,
            headers: metadata.headers.into_iter().collect(),
        }
    }
}

/// Execute the stat command
pub async fn execute(
    args: StatArgs,
    client: &TransferClient,
    output_config: OutputConfig,
) -> ExitCode {
    let formatter = Formatter::new(output_config);

    if let Err(e) = parse_url(&args.url) {
        formatter.error(&e.to_string());
        return ExitCode::from(&e);
    }

    let metadata = match client.preview(&args.url).await {
        Ok(metadata) => metadata,
        Err(e) => return report(&formatter, "Failed to stat", &e),
    };
    let output = StatOutput::new(args.url, metadata);

    if formatter.is_json() {
        formatter.json(&output);
        return ExitCode::Success;
    }

    let name = if output.name.is_empty() {
        "-"
    } else {
        output.name.as_str()
    };
    formatter.println(&format!("URL       : {}", output.url));
    formatter.println(&format!("Name      : {name}"));
    formatter.println(&format!(
        "Size      : {} ({} bytes)",
        output.size_human, output.size_bytes
    ));
    if args.headers && !output.headers.is_empty() {
        formatter.println(&header_table(&output.headers, formatter.colors_enabled()).to_string());
    }
    ExitCode::Success
}

fn header_table(headers: &BTreeMap<String, String>, styled: bool) -> Table {
    let mut table = Table::new();
    if styled {
        table.load_preset(presets::UTF8_FULL);
    } else {
        table.load_preset(presets::ASCII_FULL);
    }
    table.set_header(vec!["Header", "Value"]);
    for (name, value) in headers {
        table.add_row(vec![name.as_str(), value.as_str()]);
    }
    table
}
