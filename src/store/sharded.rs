//! Ring-routed view over several block stores

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

use super::{BlockConnector, BlockService, StoreResult};
use crate::error::StoreError;
use crate::ring::ConsistentHashRing;
use crate::types::Block;

/// One logical block store spread over every address of a ring
///
/// A single-address deployment is the same type with a one-address ring.
pub struct ShardedBlockStore {
	ring: ConsistentHashRing,
	stores: BTreeMap<String, Arc<dyn BlockService>>,
}

impl ShardedBlockStore {
	/// Connect to every address of `ring` through `connector`
	pub async fn connect(
		ring: ConsistentHashRing,
		connector: &dyn BlockConnector,
	) -> StoreResult<Self> {
		let mut stores = BTreeMap::new();
		for addr in ring.addrs() {
			debug!("[sharded_store] connecting to block store {}", addr);
			stores.insert(addr.clone(), connector.connect(addr).await?);
		}
		Ok(ShardedBlockStore { ring, stores })
	}

	/// Store owning `hash`
	pub fn store_for(&self, hash: &str) -> StoreResult<&Arc<dyn BlockService>> {
		let addr = self.ring.route(hash);
		self.store_at(addr)
	}

	/// Store client for a ring address
	pub fn store_at(&self, addr: &str) -> StoreResult<&Arc<dyn BlockService>> {
		self.stores
			.get(addr)
			.ok_or_else(|| StoreError::transport(addr, "address is not part of the ring"))
	}

	/// Group hashes by the store address owning them
	pub fn get_block_store_map<'a, I>(&self, hashes: I) -> BTreeMap<String, BTreeSet<String>>
	where
		I: IntoIterator<Item = &'a String>,
	{
		self.ring.block_store_map(hashes)
	}

	pub fn get_block_store_addrs(&self) -> Vec<String> {
		self.ring.addrs().to_vec()
	}
}

#[async_trait]
impl BlockService for ShardedBlockStore {
	async fn has_block(&self, hash: &str) -> StoreResult<bool> {
		self.store_for(hash)?.has_block(hash).await
	}

	async fn get_block(&self, hash: &str) -> StoreResult<Block> {
		self.store_for(hash)?.get_block(hash).await
	}

	async fn put_block(&self, block: &Block) -> StoreResult<bool> {
		self.store_for(&block.hash)?.put_block(block).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::store::{LocalConnector, MemoryBlockStore};

	async fn sharded(n: usize) -> (ShardedBlockStore, Vec<Arc<MemoryBlockStore>>) {
		let mut connector = LocalConnector::new();
		let mut backends = Vec::new();
		let mut addrs = Vec::new();
		for i in 0..n {
			let addr = format!("store-{}", i);
			let backend = Arc::new(MemoryBlockStore::new());
			connector = connector.with_store(&addr, backend.clone());
			backends.push(backend);
			addrs.push(addr);
		}
		let ring = ConsistentHashRing::new(&addrs, 16).unwrap();
		(ShardedBlockStore::connect(ring, &connector).await.unwrap(), backends)
	}

	#[tokio::test]
	async fn test_blocks_land_on_routed_store() {
		let (store, backends) = sharded(3).await;
		let blocks: Vec<Block> = (0..40u8).map(|i| Block::new(vec![i; 10])).collect();
		for block in &blocks {
			store.put_block(block).await.unwrap();
		}

		let mut total = 0;
		for backend in &backends {
			total += backend.len().await;
		}
		assert_eq!(total, 40);

		for block in &blocks {
			assert_eq!(store.get_block(&block.hash).await.unwrap(), *block);
		}
	}

	#[tokio::test]
	async fn test_single_store_is_degenerate_ring() {
		let (store, backends) = sharded(1).await;
		let block = Block::new(b"x".to_vec());
		store.put_block(&block).await.unwrap();
		assert_eq!(backends[0].len().await, 1);
		assert_eq!(store.get_block_store_addrs(), vec!["store-0".to_string()]);
	}

	#[tokio::test]
	async fn test_connect_fails_for_unknown_address() {
		let ring = ConsistentHashRing::new(&["missing".to_string()], 1).unwrap();
		let result = ShardedBlockStore::connect(ring, &LocalConnector::new()).await;
		assert!(matches!(result, Err(StoreError::Transport { .. })));
	}
}

// vim: ts=4
