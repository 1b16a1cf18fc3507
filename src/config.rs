//! Unified configuration for blocksync
//!
//! The configuration follows a priority chain:
//! 1. Built-in defaults (Config::default())
//! 2. Config file (TOML, or JSON5 for `.json`/`.json5` files)
//! 3. Environment variables (BLOCKSYNC_* prefix)
//! 4. CLI flags (highest priority, applied by the caller)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::chunking::DEFAULT_BLOCK_SIZE;
use crate::error::SyncError;
use crate::ring::DEFAULT_VIRTUAL_NODES;
use crate::validation::{self, ValidationError, Validator};

/// Unified configuration shared by the client and both servers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
	// ========================================================================
	// CLIENT
	// ========================================================================
	/// Directory synchronised by `sync`
	pub base_dir: PathBuf,

	/// Block size in bytes used when chunking files
	pub block_size: usize,

	/// Address of the metadata server
	pub meta_addr: String,

	/// Retries after a version conflict (0 = report and move on)
	pub conflict_retries: u32,

	// ========================================================================
	// SERVERS
	// ========================================================================
	/// Address a server binds to
	pub listen_addr: String,

	/// Block store addresses handed out by the metadata server
	pub block_store_addrs: Vec<String>,

	/// Virtual nodes per block store address on the hash ring
	pub virtual_nodes: usize,

	/// Directory for persistent block storage (in-memory when unset)
	pub data_dir: Option<PathBuf>,

	// ========================================================================
	// NETWORK & LOGGING
	// ========================================================================
	/// Connect and request timeout in seconds
	pub connect_timeout_secs: u64,

	/// Log level (trace, debug, info, warn, error)
	pub log_level: String,
}

impl Default for Config {
	fn default() -> Self {
		Config {
			base_dir: PathBuf::from("."),
			block_size: DEFAULT_BLOCK_SIZE,
			meta_addr: "127.0.0.1:8080".to_string(),
			conflict_retries: 0,
			listen_addr: "127.0.0.1:8080".to_string(),
			block_store_addrs: vec!["127.0.0.1:8081".to_string()],
			virtual_nodes: DEFAULT_VIRTUAL_NODES,
			data_dir: None,
			connect_timeout_secs: 10,
			log_level: "info".to_string(),
		}
	}
}

impl Config {
	/// Load defaults, then the optional config file, then the environment
	pub fn load(path: Option<&Path>) -> Result<Self, SyncError> {
		let mut config = match path {
			Some(path) => Self::from_file(path)?,
			None => Config::default(),
		};
		config.apply_env(|key| std::env::var(key).ok())?;
		Ok(config)
	}

	/// Parse a config file, choosing the format by extension
	pub fn from_file(path: &Path) -> Result<Self, SyncError> {
		let contents = std::fs::read_to_string(path).map_err(|e| SyncError::InvalidConfig {
			message: format!("Cannot read {}: {}", path.display(), e),
		})?;

		let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
		let parsed = match ext {
			"json" | "json5" => json5::from_str(&contents).map_err(|e| e.to_string()),
			_ => toml::from_str(&contents).map_err(|e| e.to_string()),
		};
		parsed.map_err(|message| SyncError::InvalidConfig {
			message: format!("Cannot parse {}: {}", path.display(), message),
		})
	}

	/// Override fields from BLOCKSYNC_* variables provided by `lookup`
	pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), SyncError>
	where
		F: Fn(&str) -> Option<String>,
	{
		if let Some(addr) = lookup("BLOCKSYNC_META_ADDR") {
			self.meta_addr = addr;
		}
		if let Some(size) = lookup("BLOCKSYNC_BLOCK_SIZE") {
			self.block_size = size.parse().map_err(|_| SyncError::InvalidConfig {
				message: format!("BLOCKSYNC_BLOCK_SIZE is not a number: {}", size),
			})?;
		}
		if let Some(addrs) = lookup("BLOCKSYNC_STORE_ADDRS") {
			self.block_store_addrs = addrs
				.split(',')
				.map(str::trim)
				.filter(|s| !s.is_empty())
				.map(String::from)
				.collect();
		}
		if let Some(level) = lookup("BLOCKSYNC_LOG") {
			self.log_level = level;
		}
		Ok(())
	}
}

impl Validator for Config {
	fn validate(&self) -> Result<(), ValidationError> {
		validation::validate_block_size(self.block_size)?;
		validation::validate_virtual_nodes(self.virtual_nodes)?;
		validation::validate_store_addrs(&self.block_store_addrs)?;
		validation::validate_timeout_secs(self.connect_timeout_secs)?;
		validation::validate_retry_count(self.conflict_retries)?;
		Ok(())
	}
}


// vim: ts=4
