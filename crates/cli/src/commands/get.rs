//! get command - Fetch a URL
//!
//! Sends a GET with optional extra headers and prints the body as received.

use std::collections::HashMap;
use std::io::{self, Write};

use clap::Args;
use serde::Serialize;
use swt_core::TransferClient;

use super::{parse_url, report};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Fetch a URL and print the response body
#[derive(Args, Debug)]
pub struct GetArgs {
    /// URL to fetch
    pub url: String,

    /// Extra request header (name:value), may be repeated
    #[arg(short = 'H', long = "header", value_name = "NAME:VALUE")]
    pub headers: Vec<String>,
}

#[derive(Debug, Serialize)]
struct GetOutput {
    url: String,
    status: u16,
    body: String,
}

/// Execute the get command
pub async fn execute(
    args: GetArgs,
    client: &TransferClient,
    output_config: OutputConfig,
) -> ExitCode {
    let formatter = Formatter::new(output_config);

    if let Err(e) = parse_url(&args.url) {
        formatter.error(&e.to_string());
        return ExitCode::from(&e);
    }
    let headers = match parse_headers(&args.headers) {
        Ok(headers) => headers,
        Err(e) => {
            formatter.error(&e);
            return ExitCode::UsageError;
        }
    };

    let raw = match client.get(&args.url, &headers).await {
        Ok(raw) => raw,
        Err(e) => return report(&formatter, &format!("Failed to get {}", args.url), &e),
    };

    if formatter.is_json() {
        formatter.json(&GetOutput {
            url: args.url.clone(),
            status: raw.status,
            body: raw.text(),
        });
    } else if !formatter.is_quiet() {
        // raw bytes, the body may be binary
        if let Err(e) = io::stdout().write_all(&raw.body) {
            formatter.error(&format!("Failed to write to stdout: {e}"));
            return ExitCode::GeneralError;
        }
    }

    match raw.status {
        200..=299 => ExitCode::Success,
        404 => {
            formatter.error(&format!("Not found: {}", args.url));
            ExitCode::NotFound
        }
        status => {
            formatter.error(&format!("GET {} returned status {status}", args.url));
            ExitCode::GeneralError
        }
    }
}

/// Parse repeated `name:value` arguments
fn parse_headers(raw: &[String]) -> Result<HashMap<String, String>, String> {
    let mut headers = HashMap::new();
    for entry in raw {
        let (name, value) = entry
            .split_once(':')
            .ok_or_else(|| format!("Invalid header '{entry}'. Expected: name:value"))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(format!("Invalid header '{entry}': empty name"));
        }
        headers.insert(name.to_string(), value.trim().to_string());
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_headers() {
        let headers = parse_headers(&[
            "Range: bytes=0-9".to_string(),
            "Accept:application/json".to_string(),
        ])
        .unwrap();
        assert_eq!(headers.get("Range").map(String::as_str), Some("bytes=0-9"));
        assert_eq!(
            headers.get("Accept").map(String::as_str),
            Some("application/json")
        );
    }

    #[test]
    fn test_parse_headers_invalid() {
        assert!(parse_headers(&["no-colon".to_string()]).is_err());
        assert!(parse_headers(&[": value".to_string()]).is_err());
    }
}
