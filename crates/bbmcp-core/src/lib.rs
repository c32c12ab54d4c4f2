//! Core traits, types, and error handling for bbmcp.
//!
//! This crate provides the foundational abstractions shared by the REST
//! client and the MCP server.

pub mod api;
pub mod config;
pub mod error;
pub mod types;

pub use api::BitbucketApi;
pub use config::{Auth, Config, RemoteCredential};
pub use error::{Error, Result};
pub use types::*;
