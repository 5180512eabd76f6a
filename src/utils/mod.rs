//! Utility functions for code generation, URL processing, and request handling.
//!
//! - [`code_generator`] - Short code generation and validation
//! - [`url_normalizer`] - Destination URL normalization
//! - [`user_agent`] - Device and OS classification
//! - [`client_info`] - Client metadata extraction from HTTP requests

pub mod client_info;
pub mod code_generator;
pub mod url_normalizer;
pub mod user_agent;
