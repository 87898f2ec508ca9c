//! Metadata extraction from response headers
//!
//! Filename, size and a flattened header map, derived the way the storage
//! server's clients traditionally do it: the first value of a header wins,
//! and the filename is whatever follows the first `filename=` token.

use std::collections::HashMap;

use serde::Serialize;

pub const CONTENT_DISPOSITION: &str = "Content-Disposition";
pub const CONTENT_LENGTH: &str = "Content-Length";

const FILENAME_TOKEN: &str = "filename=";

/// What a HEAD or GET response says about the remote file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileMetadata {
    /// Empty when the server sent no usable `Content-Disposition`
    pub filename: String,
    /// Zero when `Content-Length` is absent or unparsable
    pub size: u64,
    /// First value of every header, keyed by the name the transport reported
    pub headers: HashMap<String, String>,
}

impl FileMetadata {
    pub fn from_headers(headers: &[(String, String)]) -> Self {
        Self {
            filename: filename(headers),
            size: size(headers),
            headers: flatten(headers),
        }
    }
}

/// First value of `name`, compared case-insensitively
pub fn first_value<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

pub fn filename(headers: &[(String, String)]) -> String {
    first_value(headers, CONTENT_DISPOSITION)
        .map(parse_filename)
        .unwrap_or_default()
}

/// Everything after the first `filename=`, minus one surrounding quote pair
pub fn parse_filename(content_disposition: &str) -> String {
    let Some(index) = content_disposition.find(FILENAME_TOKEN) else {
        return String::new();
    };
    let raw = &content_disposition[index + FILENAME_TOKEN.len()..];
    raw.strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(raw)
        .to_string()
}

pub fn size(headers: &[(String, String)]) -> u64 {
    first_value(headers, CONTENT_LENGTH)
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0)
}

pub fn flatten(headers: &[(String, String)]) -> HashMap<String, String> {
    let mut map = HashMap::with_capacity(headers.len());
    for (name, value) in headers {
        map.entry(name.clone()).or_insert_with(|| value.clone());
    }
    map
}
