//! In-memory block store

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use super::{verify_block, BlockService, StoreResult};
use crate::error::StoreError;
use crate::types::Block;

/// Block store keeping every block in a hash map
#[derive(Default)]
pub struct MemoryBlockStore {
	blocks: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlockStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of distinct blocks held
	pub async fn len(&self) -> usize {
		self.blocks.read().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.blocks.read().await.is_empty()
	}
}

#[async_trait]
impl BlockService for MemoryBlockStore {
	async fn has_block(&self, hash: &str) -> StoreResult<bool> {
		Ok(self.blocks.read().await.contains_key(hash))
	}

	async fn get_block(&self, hash: &str) -> StoreResult<Block> {
		match self.blocks.read().await.get(hash) {
			Some(data) => Ok(Block { hash: hash.to_string(), data: data.clone() }),
			None => Err(StoreError::NotFound { hash: hash.to_string() }),
		}
	}

	async fn put_block(&self, block: &Block) -> StoreResult<bool> {
		verify_block(block)?;
		let mut blocks = self.blocks.write().await;
		if !blocks.contains_key(&block.hash) {
			debug!("[memory_store] stored block {} ({} bytes)", block.hash, block.size());
			blocks.insert(block.hash.clone(), block.data.clone());
		}
		Ok(true)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_put_then_get() {
		let store = MemoryBlockStore::new();
		let block = Block::new(b"hello".to_vec());
		assert!(store.put_block(&block).await.unwrap());
		assert!(store.has_block(&block.hash).await.unwrap());
		assert_eq!(store.get_block(&block.hash).await.unwrap(), block);
	}

	#[tokio::test]
	async fn test_put_is_idempotent() {
		let store = MemoryBlockStore::new();
		let block = Block::new(b"same".to_vec());
		assert!(store.put_block(&block).await.unwrap());
		assert!(store.put_block(&block).await.unwrap());
		assert_eq!(store.len().await, 1);
		assert_eq!(store.get_block(&block.hash).await.unwrap().data, b"same");
	}

	#[tokio::test]
	async fn test_missing_block_not_found() {
		let store = MemoryBlockStore::new();
		assert!(!store.has_block("abc").await.unwrap());
		assert_eq!(
			store.get_block("abc").await.unwrap_err(),
			StoreError::NotFound { hash: "abc".to_string() }
		);
	}

	#[tokio::test]
	async fn test_tampered_block_rejected() {
		let store = MemoryBlockStore::new();
		let mut block = Block::new(b"data".to_vec());
		block.data = b"evil".to_vec();
		assert!(matches!(
			store.put_block(&block).await,
			Err(StoreError::HashMismatch { .. })
		));
		assert!(store.is_empty().await);
	}
}

// vim: ts=4
