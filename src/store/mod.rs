//! Content-addressed block storage
//!
//! The sync engine talks to block stores only through [`BlockService`].
//! Concrete stores are the in-memory [`MemoryBlockStore`], the persistent
//! [`RedbBlockStore`], remote stores reached over the network, and the
//! [`ShardedBlockStore`] which routes every hash to one of several stores
//! through the consistent hash ring.

pub mod disk;
pub mod memory;
pub mod sharded;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::chunking::hash_block;
use crate::error::StoreError;
use crate::types::Block;

pub use self::disk::RedbBlockStore;
pub use self::memory::MemoryBlockStore;
pub use self::sharded::ShardedBlockStore;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Operations of one logical block store
#[async_trait]
pub trait BlockService: Send + Sync {
	/// Whether the store holds `hash`
	async fn has_block(&self, hash: &str) -> StoreResult<bool>;

	/// Fetch a block; fails with `StoreError::NotFound` for unknown hashes
	async fn get_block(&self, hash: &str) -> StoreResult<Block>;

	/// Store a block. Storing a hash that is already present succeeds.
	async fn put_block(&self, block: &Block) -> StoreResult<bool>;
}

/// Opens a [`BlockService`] client for a store address
#[async_trait]
pub trait BlockConnector: Send + Sync {
	async fn connect(&self, addr: &str) -> StoreResult<Arc<dyn BlockService>>;
}

/// Connector over stores that already live in this process
#[derive(Clone, Default)]
pub struct LocalConnector {
	stores: BTreeMap<String, Arc<dyn BlockService>>,
}

impl LocalConnector {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_store(mut self, addr: &str, store: Arc<dyn BlockService>) -> Self {
		self.stores.insert(addr.to_string(), store);
		self
	}
}

#[async_trait]
impl BlockConnector for LocalConnector {
	async fn connect(&self, addr: &str) -> StoreResult<Arc<dyn BlockService>> {
		self.stores
			.get(addr)
			.cloned()
			.ok_or_else(|| StoreError::transport(addr, "no such block store"))
	}
}

/// Reject blocks whose data does not hash to their claimed hash
pub(crate) fn verify_block(block: &Block) -> StoreResult<()> {
	let actual = hash_block(&block.data);
	if actual != block.hash {
		return Err(StoreError::HashMismatch { expected: block.hash.clone(), actual });
	}
	Ok(())
}

// vim: ts=4
