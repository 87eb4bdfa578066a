//! proctor-client: Remote assessment API integration.
//!
//! Implements the `AssessmentApi` trait over HTTP and loads the client's
//! own configuration file.

pub mod config;
pub mod error;
pub mod http;
pub mod mock;

pub use config::{load_config, load_config_from, ProctorConfig};
pub use error::ApiError;
pub use http::HttpApi;
