//! CLI command definitions and execution
//!
//! Every command talks to the storage server through one shared
//! [`TransferClient`], built from the configuration file and closed once the
//! command finishes.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use swt_core::{Config, ConfigManager, Error, TransferClient};
use swt_http::ReqwestTransport;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

mod cat;
mod download;
mod get;
mod rm;
mod stat;
mod upload;

/// swt - streaming web transfer client
///
/// Fetch, inspect, delete and upload files on a SeaweedFS-style HTTP
/// storage server without buffering whole files in memory.
#[derive(Parser, Debug)]
#[command(name = "swt")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format: human-readable or JSON
    #[arg(long, global = true, default_value = "false")]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true, default_value = "false")]
    pub no_color: bool,

    /// Disable progress bar
    #[arg(long, global = true, default_value = "false")]
    pub no_progress: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, default_value = "false")]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true, default_value = "false")]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch a URL and print the response body
    Get(get::GetArgs),

    /// Delete a remote file
    Rm(rm::RmArgs),

    /// Show remote file metadata
    Stat(stat::StatArgs),

    /// Stream a remote file to stdout
    Cat(cat::CatArgs),

    /// Download a remote file to disk
    Download(download::DownloadArgs),

    /// Upload a local file as multipart/form-data
    Upload(upload::UploadArgs),
}

/// Execute the CLI command and return an exit code
pub async fn execute(cli: Cli) -> ExitCode {
    let mut output_config = OutputConfig {
        json: cli.json,
        no_color: cli.no_color,
        no_progress: cli.no_progress,
        quiet: cli.quiet,
    };

    let config = match ConfigManager::new().and_then(|manager| manager.load()) {
        Ok(config) => config,
        Err(e) => {
            Formatter::new(output_config).error(&format!("Failed to load config: {e}"));
            return ExitCode::from(&e);
        }
    };
    apply_defaults(&mut output_config, &config);

    let client = match connect(&config) {
        Ok(client) => client,
        Err(e) => {
            Formatter::new(output_config).error(&format!("Failed to create client: {e}"));
            return ExitCode::from(&e);
        }
    };

    let code = match cli.command {
        Commands::Get(args) => get::execute(args, &client, output_config).await,
        Commands::Rm(args) => rm::execute(args, &client, output_config).await,
        Commands::Stat(args) => stat::execute(args, &client, output_config).await,
        Commands::Cat(args) => cat::execute(args, &client, output_config).await,
        Commands::Download(args) => download::execute(args, &client, output_config).await,
        Commands::Upload(args) => upload::execute(args, &client, output_config).await,
    };

    client.close().await;
    code
}

/// Fold the `[defaults]` config section into the flags given on the command line
fn apply_defaults(output_config: &mut OutputConfig, config: &Config) {
    let defaults = &config.defaults;
    output_config.json |= defaults.output.eq_ignore_ascii_case("json");
    output_config.no_color |= defaults.color.eq_ignore_ascii_case("never");
    output_config.no_progress |= !defaults.progress;
}

fn connect(config: &Config) -> swt_core::Result<TransferClient> {
    let transport = ReqwestTransport::new(&config.http)?;
    Ok(TransferClient::with_config(
        Arc::new(transport),
        &config.transfer,
    ))
}

/// Print `err` under `action` and pick the matching exit code
pub(crate) fn report(formatter: &Formatter, action: &str, err: &Error) -> ExitCode {
    formatter.error(&format!("{action}: {err}"));
    ExitCode::from(err)
}

/// Check that `raw` is an absolute http(s) URL
pub(crate) fn parse_url(raw: &str) -> swt_core::Result<url::Url> {
    let url = url::Url::parse(raw).map_err(|e| Error::InvalidUrl(format!("'{raw}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(Error::InvalidUrl(format!(
            "'{raw}': unsupported scheme '{other}'"
        ))),
    }
}
