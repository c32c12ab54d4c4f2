//! Bitbucket Server provider implementation for bbmcp.
//!
//! This crate talks to the Bitbucket Server REST API (1.0) and implements
//! [`bbmcp_core::BitbucketApi`] on top of it.

mod client;
mod types;

pub use client::BitbucketClient;

/// Path prefix of the Bitbucket Server REST API.
pub const API_PREFIX: &str = "/rest/api/1.0";
