//! # Paperflow Common Library
//!
//! Shared code for the paperflow tools including:
//! - Error types
//! - TOML configuration loading and three-tier setting resolution
//! - Logging initialisation
//! - Timestamp parsing helpers

pub mod config;
pub mod error;
pub mod logging;
pub mod time;

pub use error::{Error, Result};
