//! Clients - HTTP Clients for External APIs
//!
//! This module contains the HTTP client for the upstream photos API.

pub mod photos_client;

// Re-export main types for convenience
pub use photos_client::{
    HttpPhotosClient,
    PhotoSource,
    UpstreamConfig,
    UpstreamError,
};
