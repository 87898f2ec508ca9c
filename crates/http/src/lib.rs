//! swt-http: reqwest transport for the swt transfer client
//!
//! This crate provides the implementation of the HttpTransport trait
//! using the reqwest crate. It is the only crate that directly
//! depends on an HTTP library.

pub mod transport;

pub use transport::ReqwestTransport;
