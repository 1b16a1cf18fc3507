//! Per-file upload and download
//!
//! Both directions stream: uploads read and send the file a batch of
//! blocks at a time, downloads append each verified block to the
//! temporary file as it arrives.

use futures::future::try_join_all;
use std::collections::{BTreeSet, HashMap};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use tokio::fs as afs;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info};

use super::blocking_error;
use super::report::{FileOutcome, SyncReport};
use crate::chunking::{hash_block, BlockChunker};
use crate::error::{ChunkError, StoreError, SyncError};
use crate::meta::MetadataService;
use crate::store::{BlockService, ShardedBlockStore, StoreResult};
use crate::types::{Block, FileMetadata};
use crate::validation::temp_filename;

/// Blocks read from disk and sent per round during an upload
const UPLOAD_BATCH: usize = 64;

/// Read up to [`UPLOAD_BATCH`] blocks on the blocking pool
async fn next_batch<R>(chunker: BlockChunker<R>) -> Result<(BlockChunker<R>, Vec<Block>), SyncError>
where
	R: Read + Send + 'static,
{
	let (chunker, batch) = tokio::task::spawn_blocking(move || {
		let mut chunker = chunker;
		let batch: Result<Vec<Block>, ChunkError> = chunker.by_ref().take(UPLOAD_BATCH).collect();
		(chunker, batch)
	})
	.await
	.map_err(blocking_error)?;
	Ok((chunker, batch?))
}

/// Everything a single file transfer needs
pub(crate) struct Transfer<'a> {
	pub base_dir: &'a Path,
	pub block_size: usize,
	pub meta: &'a dyn MetadataService,
	pub blocks: &'a ShardedBlockStore,
}

impl Transfer<'_> {
	fn path_of(&self, filename: &str) -> PathBuf {
		self.base_dir.join(filename)
	}

	/// Bring the local copy to `remote`; `None` when already there
	pub async fn download(
		&self,
		local: &mut FileMetadata,
		remote: &FileMetadata,
		report: &mut SyncReport,
	) -> Result<Option<FileOutcome>, SyncError> {
		if local.content_equal(remote) {
			return Ok(None);
		}
		let path = self.path_of(&remote.filename);

		if remote.is_tombstone() {
			match afs::remove_file(&path).await {
				Ok(()) => info!("Deleted {} (removed remotely at v{})", remote.filename, remote.version),
				Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
				Err(e) => return Err(e.into()),
			}
			*local = remote.clone();
			return Ok(Some(FileOutcome::DeletedLocally { version: remote.version }));
		}

		// Same content under a newer version: adopt the version only.
		let on_disk = afs::metadata(&path).await.map(|m| m.is_file()).unwrap_or(false);
		if !local.is_tombstone() && local.block_hash_list == remote.block_hash_list && on_disk {
			debug!("[download] {} content unchanged, adopting v{}", remote.filename, remote.version);
			*local = remote.clone();
			return Ok(Some(FileOutcome::Downloaded { version: remote.version }));
		}

		let tmp_path = self.path_of(&temp_filename(&remote.filename));
		let written = match self.fetch_into(&tmp_path, remote, report).await {
			Ok(written) => written,
			Err(e) => {
				let _ = afs::remove_file(&tmp_path).await;
				return Err(e);
			}
		};
		afs::rename(&tmp_path, &path).await?;

		info!("Downloaded {} v{} ({} bytes)", remote.filename, remote.version, written);
		*local = remote.clone();
		Ok(Some(FileOutcome::Downloaded { version: remote.version }))
	}

	/// Fetch, verify and append every block of `remote` to `tmp_path`
	///
	/// Returns the number of bytes written.
	async fn fetch_into(
		&self,
		tmp_path: &Path,
		remote: &FileMetadata,
		report: &mut SyncReport,
	) -> Result<u64, SyncError> {
		let mut out = BufWriter::new(afs::File::create(tmp_path).await?);
		let mut written = 0u64;

		if !remote.is_empty_file() {
			let owners = self.owners(&remote.block_hash_list).await?;
			for hash in &remote.block_hash_list {
				let block = match owners.get(hash.as_str()) {
					Some(addr) => self.blocks.store_at(addr)?.get_block(hash).await?,
					None => self.blocks.get_block(hash).await?,
				};
				let actual = hash_block(&block.data);
				if &actual != hash {
					return Err(StoreError::HashMismatch { expected: hash.clone(), actual }.into());
				}
				out.write_all(&block.data).await?;
				written += block.size() as u64;
				report.blocks_downloaded += 1;
				report.bytes_downloaded += block.size() as u64;
			}
		}

		out.flush().await?;
		out.into_inner().sync_all().await?;
		Ok(written)
	}

	/// Owning store of each hash, as placed by the authority's ring
	async fn owners(&self, hashes: &[String]) -> Result<HashMap<String, String>, SyncError> {
		let unique: Vec<String> =
			hashes.iter().cloned().collect::<BTreeSet<_>>().into_iter().collect();
		let groups = self.meta.get_block_store_map(&unique).await?;
		let mut owners = HashMap::new();
		for (addr, hashes) in groups {
			for hash in hashes {
				owners.insert(hash, addr.clone());
			}
		}
		Ok(owners)
	}

	/// Push the local state to the authority; `None` when nothing to do
	///
	/// `remote` is `None` when the authority has never seen the file.
	pub async fn upload(
		&self,
		local: &mut FileMetadata,
		remote: Option<&FileMetadata>,
		report: &mut SyncReport,
	) -> Result<Option<FileOutcome>, SyncError> {
		if let Some(remote) = remote {
			if remote.version != 0 && local.content_equal(remote) {
				return Ok(None);
			}
		}

		if local.is_tombstone() {
			let version = self.meta.update_file(local).await?;
			info!("Uploaded deletion of {} at v{}", local.filename, version);
			local.version = version;
			return Ok(Some(FileOutcome::TombstoneUploaded { version }));
		}

		if !local.is_empty_file() {
			if let Some(reason) = self.send_file_blocks(local, report).await? {
				return Ok(Some(FileOutcome::Skipped { reason: reason.to_string() }));
			}
		}

		let version = self.meta.update_file(local).await?;
		info!("Uploaded {} at v{}", local.filename, version);
		local.version = version;
		Ok(Some(FileOutcome::Uploaded { version }))
	}

	/// Rechunk the file behind `local` and store its blocks
	///
	/// Returns a skip reason when the file vanished or no longer matches
	/// the scanned hash list. Blocks sent before a mismatch is noticed stay
	/// in the stores unreferenced.
	async fn send_file_blocks(
		&self,
		local: &FileMetadata,
		report: &mut SyncReport,
	) -> Result<Option<&'static str>, SyncError> {
		let file = match afs::File::open(self.path_of(&local.filename)).await {
			Ok(file) => file.into_std().await,
			Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Some("file removed during sync")),
			Err(e) => return Err(e.into()),
		};
		let mut chunker = BlockChunker::new(BufReader::new(file), self.block_size)?;
		let mut expected = local.block_hash_list.iter();

		loop {
			let (rest, batch) = next_batch(chunker).await?;
			chunker = rest;
			if batch.is_empty() {
				break;
			}
			for block in &batch {
				if expected.next() != Some(&block.hash) {
					return Ok(Some("file changed during sync"));
				}
			}
			self.put_blocks(&batch, report).await?;
		}

		if expected.next().is_some() {
			return Ok(Some("file changed during sync"));
		}
		Ok(None)
	}

	/// Store every block not yet present, batched per destination store
	async fn put_blocks(&self, blocks: &[Block], report: &mut SyncReport) -> Result<(), SyncError> {
		let by_hash: HashMap<&str, &Block> = blocks.iter().map(|b| (b.hash.as_str(), b)).collect();
		let hashes: Vec<String> = by_hash.keys().map(|h| h.to_string()).collect();
		let groups = self.meta.get_block_store_map(&hashes).await?;

		let batches = groups.iter().map(|(addr, hashes)| {
			let by_hash = &by_hash;
			async move {
				let store = self.blocks.store_at(addr)?;
				let mut sent: Vec<&Block> = Vec::new();
				for hash in hashes {
					let block = match by_hash.get(hash.as_str()) {
						Some(block) => *block,
						None => continue,
					};
					if store.has_block(hash).await? {
						continue;
					}
					store.put_block(block).await?;
					sent.push(block);
				}
				debug!("[upload] sent {} of {} blocks to {}", sent.len(), hashes.len(), addr);
				StoreResult::Ok(sent)
			}
		});

		for sent in try_join_all(batches).await? {
			report.blocks_uploaded += sent.len();
			report.bytes_uploaded += sent.iter().map(|b| b.size() as u64).sum::<u64>();
		}
		Ok(())
	}
}

// vim: ts=4
