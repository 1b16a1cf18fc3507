//! Metadata authority
//!
//! The authority maps each filename to its latest accepted version and
//! ordered block-hash list. Clients read a full snapshot and propose
//! updates; the arbitration rule in [`state::FileInfoMap::update_file`] is
//! the only place versions change.

pub mod actor;
pub mod state;

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};

use crate::store::StoreResult;
use crate::types::FileMetadata;

pub use self::actor::{MetaStore, MetaStoreHandle};
pub use self::state::FileInfoMap;

/// Operations of the metadata service
#[async_trait]
pub trait MetadataService: Send + Sync {
	/// Point-in-time copy of every file entry
	async fn get_file_info_map(&self) -> StoreResult<BTreeMap<String, FileMetadata>>;

	/// Propose a new state for one file; returns the version now stored
	async fn update_file(&self, candidate: &FileMetadata) -> StoreResult<i64>;

	/// Group block hashes by the block store that owns them
	async fn get_block_store_map(
		&self,
		hashes: &[String],
	) -> StoreResult<BTreeMap<String, BTreeSet<String>>>;

	/// Block store addresses in ring order of configuration
	async fn get_block_store_addrs(&self) -> StoreResult<Vec<String>>;
}

// vim: ts=4
