//! Logging prelude module for convenient access to tracing macros.
//!
//! # Usage
//!
//! ```ignore
//! use crate::logging::*;
//!
//! info!("Synced {} files", n);
//! debug!("[upload] sent block {}", hash);
//! ```

pub use tracing::{debug, error, info, warn};

/// Initialize the tracing subscriber with environment filter support.
///
/// `RUST_LOG` wins when set; otherwise `default_level` (from the config or
/// the `-v` flag) applies to every target:
///
/// ```bash
/// RUST_LOG=debug blocksync sync ./dir
/// RUST_LOG=blocksync::sync=debug,blocksync::protocol=trace blocksync meta
/// ```
pub fn init_tracing(default_level: &str) {
	let filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.or_else(|_| tracing_subscriber::EnvFilter::try_new(default_level))
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

	// A second call (e.g. from tests) keeps the first subscriber.
	let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

// vim: ts=4
