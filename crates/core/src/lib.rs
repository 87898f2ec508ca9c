//! swt-core: Core library for the swt streaming transfer client
//!
//! This crate provides the core functionality of swt, including:
//! - The transfer client (get, delete, preview, download, upload)
//! - A bounded worker pool with one-shot task results
//! - An in-memory pipe and a streaming multipart/form-data encoder
//! - Response reading and header metadata extraction
//! - Configuration management
//!
//! This crate does not depend on any HTTP library. Requests go through the
//! [`HttpTransport`] trait, so the client can be tested with fakes.

pub mod client;
pub mod config;
pub mod error;
pub mod metadata;
pub mod multipart;
pub mod pipe;
pub mod pool;
pub mod response;
pub mod transport;

pub use client::{Download, METADATA_HEADER_PREFIX, TransferClient};
pub use config::{Config, ConfigManager, HttpConfig, TransferConfig};
pub use error::{Error, Result};
pub use metadata::FileMetadata;
pub use pool::{Task, TaskHandle, WorkerPool};
pub use response::RawResponse;
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Method, RequestBody, ResponseBody};
