//! DataApi Core Library
//!
//! This crate provides the transport-independent pieces of the DataApi client:
//! - Client configuration and validation
//! - Gateway actions, request parameters and result shapes
//! - Connection resolution (defaults merged with per-call overrides)
//! - Core error types

pub mod config;
pub mod error;
pub mod models;
pub mod resolver;

// Re-export commonly used types
pub use config::ClientConfig;
pub use error::CoreError;
pub use models::*;
pub use resolver::resolve;
