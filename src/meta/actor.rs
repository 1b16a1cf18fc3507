//! Metadata store actor
//!
//! A single task owns the [`FileInfoMap`] and processes commands from a
//! tokio::sync::mpsc channel, so every update is applied atomically with
//! respect to every other read and write. Callers hold a cheap, cloneable
//! [`MetaStoreHandle`].

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use super::state::FileInfoMap;
use super::MetadataService;
use crate::error::StoreError;
use crate::ring::ConsistentHashRing;
use crate::store::StoreResult;
use crate::types::FileMetadata;

/// Commands accepted by the metadata actor
#[derive(Debug)]
pub enum MetaCommand {
	/// Snapshot of the whole file map
	GetFileInfoMap { reply: oneshot::Sender<BTreeMap<String, FileMetadata>> },

	/// Version-arbitrated update of one file
	UpdateFile { candidate: FileMetadata, reply: oneshot::Sender<Result<i64, StoreError>> },
}

/// Actor owning the authoritative file map
pub struct MetaStore {
	files: FileInfoMap,
	cmd_rx: mpsc::Receiver<MetaCommand>,
}

impl MetaStore {
	/// Spawn the actor on the current runtime and return its handle
	pub fn spawn(ring: ConsistentHashRing) -> MetaStoreHandle {
		let (cmd_tx, cmd_rx) = mpsc::channel(64);
		let actor = MetaStore { files: FileInfoMap::new(), cmd_rx };
		tokio::spawn(actor.run());
		MetaStoreHandle { cmd_tx, ring: Arc::new(ring) }
	}

	/// Run the command loop until every handle is dropped
	pub async fn run(mut self) {
		while let Some(cmd) = self.cmd_rx.recv().await {
			match cmd {
				MetaCommand::GetFileInfoMap { reply } => {
					let _ = reply.send(self.files.snapshot());
				}
				MetaCommand::UpdateFile { candidate, reply } => {
					let _ = reply.send(self.files.update_file(&candidate));
				}
			}
		}
		info!("[meta] metadata store stopped with {} files", self.files.len());
	}
}

/// Client handle of the metadata actor
#[derive(Clone)]
pub struct MetaStoreHandle {
	cmd_tx: mpsc::Sender<MetaCommand>,
	ring: Arc<ConsistentHashRing>,
}

impl MetaStoreHandle {
	async fn request<T>(
		&self,
		make: impl FnOnce(oneshot::Sender<T>) -> MetaCommand,
	) -> StoreResult<T> {
		let (reply_tx, reply_rx) = oneshot::channel();
		self.cmd_tx.send(make(reply_tx)).await.map_err(|_| StoreError::Closed)?;
		reply_rx.await.map_err(|_| StoreError::Closed)
	}
}

#[async_trait]
impl MetadataService for MetaStoreHandle {
	async fn get_file_info_map(&self) -> StoreResult<BTreeMap<String, FileMetadata>> {
		self.request(|reply| MetaCommand::GetFileInfoMap { reply }).await
	}

	async fn update_file(&self, candidate: &FileMetadata) -> StoreResult<i64> {
		debug!("[meta] update_file {} v{}", candidate.filename, candidate.version);
		let candidate = candidate.clone();
		self.request(|reply| MetaCommand::UpdateFile { candidate, reply }).await?
	}

	async fn get_block_store_map(
		&self,
		hashes: &[String],
	) -> StoreResult<BTreeMap<String, BTreeSet<String>>> {
		Ok(self.ring.block_store_map(hashes))
	}

	async fn get_block_store_addrs(&self) -> StoreResult<Vec<String>> {
		Ok(self.ring.addrs().to_vec())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn handle() -> MetaStoreHandle {
		let ring = ConsistentHashRing::new(&["a:1".to_string(), "b:2".to_string()], 8).unwrap();
		MetaStore::spawn(ring)
	}

	#[tokio::test]
	async fn test_update_and_snapshot() {
		let meta = handle();
		let file = FileMetadata::new("f.txt", 1, vec!["h".to_string()]);
		assert_eq!(meta.update_file(&file).await.unwrap(), 1);
		let map = meta.get_file_info_map().await.unwrap();
		assert_eq!(map["f.txt"].version, 1);
	}

	#[tokio::test]
	async fn test_concurrent_same_version_updates_have_one_winner() {
		let meta = handle();
		meta.update_file(&FileMetadata::new("f", 1, vec!["base".to_string()])).await.unwrap();

		let mut tasks = Vec::new();
		for i in 0..8 {
			let meta = meta.clone();
			tasks.push(tokio::spawn(async move {
				meta.update_file(&FileMetadata::new("f", 2, vec![format!("w{}", i)])).await
			}));
		}

		let mut accepted = Vec::new();
		for task in tasks {
			if let Ok(version) = task.await.unwrap() {
				accepted.push(version);
			}
		}
		// The first writer moves the file to version 2; all later ones are at
		// the same version with a different list.
		assert_eq!(accepted, vec![2]);
		assert_eq!(meta.get_file_info_map().await.unwrap()["f"].version, 2);
	}

	#[tokio::test]
	async fn test_block_store_addrs_pass_through() {
		let meta = handle();
		assert_eq!(
			meta.get_block_store_addrs().await.unwrap(),
			vec!["a:1".to_string(), "b:2".to_string()]
		);
		let hashes = vec!["x".to_string(), "y".to_string()];
		let map = meta.get_block_store_map(&hashes).await.unwrap();
		assert_eq!(map.values().map(BTreeSet::len).sum::<usize>(), 2);
	}
}

// vim: ts=4
