//! HTTP transport for the LitAgent backend (`POST /stream_generate`).
mod client;
mod config;

pub use client::HttpTransport;
pub use config::HttpConfig;
