//! Validation for blocksync
//!
//! This module provides common validation functions for:
//! - Filenames found while scanning the base directory
//! - Configuration values (block size, ring, timeouts)

use std::error::Error;
use std::fmt;

pub mod config;
pub mod filename;

pub use config::*;
pub use filename::*;

/// Generic validation error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
	/// Invalid configuration
	ConfigError(String),
	/// Filename that cannot be synced
	FilenameError(String),
}

impl fmt::Display for ValidationError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ValidationError::ConfigError(msg) => write!(f, "Config validation error: {}", msg),
			ValidationError::FilenameError(msg) => write!(f, "Filename validation error: {}", msg),
		}
	}
}

impl Error for ValidationError {}

/// Trait for validatable types
pub trait Validator {
	/// Validate this type
	/// Returns Ok(()) if valid, Err(ValidationError) if invalid
	fn validate(&self) -> Result<(), ValidationError>;
}


// vim: ts=4
