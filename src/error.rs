//! Error types for blocksync operations

use std::error::Error;
use std::fmt;
use std::io;

/// Main error type for a sync pass
#[derive(Debug)]
pub enum SyncError {
	/// I/O error on the local directory
	Io(io::Error),

	/// Invalid configuration
	InvalidConfig { message: String },

	/// Chunk error (nested)
	Chunk(ChunkError),

	/// Local index error (nested)
	Index(IndexError),

	/// Metadata or block store error (nested)
	Store(StoreError),
}

impl SyncError {
	/// Whether this error must abort the whole sync pass
	pub fn is_fatal(&self) -> bool {
		match self {
			SyncError::Store(e) => e.is_fatal(),
			_ => true,
		}
	}
}

impl fmt::Display for SyncError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncError::Io(e) => write!(f, "I/O error: {}", e),
			SyncError::InvalidConfig { message } => {
				write!(f, "Invalid configuration: {}", message)
			}
			SyncError::Chunk(e) => write!(f, "Chunk error: {}", e),
			SyncError::Index(e) => write!(f, "Index error: {}", e),
			SyncError::Store(e) => write!(f, "Store error: {}", e),
		}
	}
}

impl Error for SyncError {}

impl From<io::Error> for SyncError {
	fn from(e: io::Error) -> Self {
		SyncError::Io(e)
	}
}

impl From<ChunkError> for SyncError {
	fn from(e: ChunkError) -> Self {
		SyncError::Chunk(e)
	}
}

impl From<IndexError> for SyncError {
	fn from(e: IndexError) -> Self {
		SyncError::Index(e)
	}
}

impl From<StoreError> for SyncError {
	fn from(e: StoreError) -> Self {
		SyncError::Store(e)
	}
}

/// Errors reported by the metadata authority and the block stores
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
	/// Candidate metadata is stale with respect to the authority
	VersionConflict { filename: String, attempted: i64, current: i64 },

	/// Block hash unknown at the routed store
	NotFound { hash: String },

	/// Block data does not hash to the claimed hash
	HashMismatch { expected: String, actual: String },

	/// Network failure talking to a service
	Transport { address: String, message: String },

	/// In-process service has shut down
	Closed,

	/// Bad store configuration (e.g. empty address set)
	Configuration { message: String },

	/// Backend storage failure inside a store
	Storage { message: String },
}

impl StoreError {
	/// Conflicts are isolated per file; everything else aborts the pass.
	pub fn is_fatal(&self) -> bool {
		!matches!(self, StoreError::VersionConflict { .. })
	}

	pub fn transport(address: &str, message: impl fmt::Display) -> Self {
		StoreError::Transport { address: address.to_string(), message: message.to_string() }
	}
}

impl fmt::Display for StoreError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			StoreError::VersionConflict { filename, attempted, current } => write!(
				f,
				"Version conflict on {}: attempted version {}, current remote version {}",
				filename, attempted, current
			),
			StoreError::NotFound { hash } => write!(f, "Block not found: {}", hash),
			StoreError::HashMismatch { expected, actual } => {
				write!(f, "Hash mismatch: expected {}, got {}", expected, actual)
			}
			StoreError::Transport { address, message } => {
				write!(f, "Transport error talking to {}: {}", address, message)
			}
			StoreError::Closed => write!(f, "Service closed"),
			StoreError::Configuration { message } => {
				write!(f, "Configuration error: {}", message)
			}
			StoreError::Storage { message } => write!(f, "Storage error: {}", message),
		}
	}
}

impl Error for StoreError {}

/// Chunking-specific errors
#[derive(Debug)]
pub enum ChunkError {
	/// Failed to read block data
	ReadFailed { source: io::Error },

	/// Block size must be positive
	InvalidBlockSize { size: usize },
}

impl fmt::Display for ChunkError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ChunkError::ReadFailed { source } => write!(f, "Failed to read block: {}", source),
			ChunkError::InvalidBlockSize { size } => {
				write!(f, "Invalid block size {}: must be positive", size)
			}
		}
	}
}

impl Error for ChunkError {}

impl From<io::Error> for ChunkError {
	fn from(e: io::Error) -> Self {
		ChunkError::ReadFailed { source: e }
	}
}

/// Local index persistence errors
#[derive(Debug)]
pub enum IndexError {
	/// Failed to load the index file
	LoadFailed { source: io::Error },

	/// Failed to save the index file
	SaveFailed { source: io::Error },

	/// Index file has a malformed record
	Corrupted { line: usize, message: String },
}

impl fmt::Display for IndexError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			IndexError::LoadFailed { source } => write!(f, "Failed to load index: {}", source),
			IndexError::SaveFailed { source } => write!(f, "Failed to save index: {}", source),
			IndexError::Corrupted { line, message } => {
				write!(f, "Index corrupted at line {}: {}", line, message)
			}
		}
	}
}

impl Error for IndexError {}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_only_conflicts_are_per_file() {
		let conflict = StoreError::VersionConflict { filename: "f".into(), attempted: 2, current: 3 };
		assert!(!conflict.is_fatal());
		assert!(!SyncError::from(conflict).is_fatal());

		assert!(SyncError::from(StoreError::NotFound { hash: "h".into() }).is_fatal());
		assert!(SyncError::from(StoreError::transport("a:1", "refused")).is_fatal());
		assert!(SyncError::from(io::Error::other("disk gone")).is_fatal());
		assert!(SyncError::from(ChunkError::InvalidBlockSize { size: 0 }).is_fatal());
	}
}

// vim: ts=4
