//! Client reconciliation pass
//!
//! One pass brings a flat local directory and the metadata authority into
//! agreement:
//!
//! 1. build the hash ring from the authority's block store addresses
//! 2. load the local index
//! 3. fetch one snapshot of the remote file map
//! 4. rescan the directory, bumping versions of new and edited files
//! 5. turn vanished files into tombstones
//! 6. download every remote entry that is not behind the local one
//! 7. upload every local entry that is not behind the remote one
//! 8. persist the local index
//!
//! Downloads are applied before uploads are considered, so a file just
//! pulled from the authority is not pushed straight back. A version
//! conflict only affects its own file; any other store or I/O failure
//! aborts the pass without touching the index file.

pub mod report;
mod transfer;

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs as afs;
use tracing::{debug, error, info, warn};

use crate::chunking;
use crate::config::Config;
use crate::error::{StoreError, SyncError};
use crate::index::{IndexMap, LocalIndex};
use crate::meta::MetadataService;
use crate::ring::ConsistentHashRing;
use crate::store::{BlockConnector, ShardedBlockStore};
use crate::types::{hash_lists_equal, FileMetadata};
use crate::validation::{validate_filename, INDEX_FILENAME};

pub use self::report::{FileOutcome, SyncReport};
use self::transfer::Transfer;

/// Runs sync passes for one base directory
pub struct SyncEngine {
	base_dir: PathBuf,
	block_size: usize,
	virtual_nodes: usize,
	conflict_retries: u32,
	meta: Arc<dyn MetadataService>,
	connector: Arc<dyn BlockConnector>,
}

impl SyncEngine {
	pub fn new(
		config: &Config,
		meta: Arc<dyn MetadataService>,
		connector: Arc<dyn BlockConnector>,
	) -> Self {
		SyncEngine {
			base_dir: config.base_dir.clone(),
			block_size: config.block_size,
			virtual_nodes: config.virtual_nodes,
			conflict_retries: config.conflict_retries,
			meta,
			connector,
		}
	}

	/// Run one complete pass
	pub async fn run(&self) -> Result<SyncReport, SyncError> {
		match self.run_pass().await {
			Ok(report) => Ok(report),
			Err(e) => {
				error!("Sync of {} aborted: {}", self.base_dir.display(), e);
				Err(e)
			}
		}
	}

	async fn run_pass(&self) -> Result<SyncReport, SyncError> {
		let is_dir = afs::metadata(&self.base_dir).await.map(|m| m.is_dir()).unwrap_or(false);
		if !is_dir {
			return Err(SyncError::InvalidConfig {
				message: format!("{} is not a directory", self.base_dir.display()),
			});
		}

		let addrs = self.meta.get_block_store_addrs().await?;
		let ring = ConsistentHashRing::new(&addrs, self.virtual_nodes)?;
		let blocks = ShardedBlockStore::connect(ring, self.connector.as_ref()).await?;
		info!("Syncing {} via {} block store(s)", self.base_dir.display(), addrs.len());

		let index_file = LocalIndex::new(&self.base_dir);
		let local = index_file.load().await?;
		let remote = self.meta.get_file_info_map().await?;
		debug!("[sync] {} local index entries, {} remote entries", local.len(), remote.len());

		let mut report = SyncReport::default();
		let base_dir = self.base_dir.clone();
		let block_size = self.block_size;
		let (mut local, scan) =
			tokio::task::spawn_blocking(move || scan_directory(&base_dir, block_size, local))
				.await
				.map_err(blocking_error)??;
		for (name, reason) in scan.skipped {
			report.record(&name, FileOutcome::Skipped { reason });
		}
		mark_deletions(&mut local, &scan.present);

		let transfer = Transfer {
			base_dir: &self.base_dir,
			block_size: self.block_size,
			meta: self.meta.as_ref(),
			blocks: &blocks,
		};

		for (name, remote_meta) in &remote {
			if let Err(e) = validate_filename(name) {
				warn!("Ignoring remote entry {:?}: {}", name, e);
				report.record(name, FileOutcome::Skipped { reason: e.to_string() });
				continue;
			}
			let entry = local.entry(name.clone()).or_insert_with(FileMetadata::default);
			if remote_meta.version >= entry.version {
				if let Some(outcome) = transfer.download(entry, remote_meta, &mut report).await? {
					report.record(name, outcome);
				}
			}
		}

		let names: Vec<String> = local.keys().cloned().collect();
		for name in names {
			let remote_meta = remote.get(&name);
			let entry = match local.get_mut(&name) {
				Some(entry) => entry,
				None => continue,
			};
			if let Some(r) = remote_meta {
				if entry.version < r.version {
					continue;
				}
			}
			match transfer.upload(entry, remote_meta, &mut report).await {
				Ok(Some(outcome)) => report.record(&name, outcome),
				Ok(None) => {}
				Err(SyncError::Store(StoreError::VersionConflict { attempted, current, .. })) => {
					warn!(
						"Version conflict on {}: local v{}, remote v{}",
						name, attempted, current
					);
					report.record(&name, FileOutcome::Conflict { attempted, current });
					if self.conflict_retries > 0 {
						self.resolve_conflict(&transfer, &name, entry, &mut report).await?;
					}
				}
				Err(e) => return Err(e),
			}
		}

		index_file.save(&local).await?;
		info!(
			"Sync of {} done: {} uploaded, {} downloaded, {} conflicts, {} skipped",
			self.base_dir.display(),
			report.uploaded(),
			report.downloaded(),
			report.conflicts(),
			report.skipped()
		);
		Ok(report)
	}

	/// Refetch the remote entry and retry until it is taken over or resolved
	async fn resolve_conflict(
		&self,
		transfer: &Transfer<'_>,
		name: &str,
		local: &mut FileMetadata,
		report: &mut SyncReport,
	) -> Result<(), SyncError> {
		for attempt in 1..=self.conflict_retries {
			let fresh = self.meta.get_file_info_map().await?;
			let remote = fresh.get(name);
			debug!("[sync] conflict retry {} for {}", attempt, name);

			let result = match remote {
				Some(r) if r.version >= local.version => {
					transfer.download(local, r, report).await
				}
				_ => transfer.upload(local, remote, report).await,
			};
			match result {
				Ok(Some(outcome)) => {
					info!("Conflict on {} resolved: {}", name, outcome);
					report.record(name, outcome);
					return Ok(());
				}
				Ok(None) => return Ok(()),
				Err(e) if !e.is_fatal() => continue,
				Err(e) => return Err(e),
			}
		}
		warn!("Conflict on {} unresolved after {} retries", name, self.conflict_retries);
		Ok(())
	}
}

/// Result of rescanning the base directory
struct Scan {
	/// Valid files present in the directory
	present: BTreeSet<String>,
	/// Rejected names with the reason
	skipped: Vec<(String, String)>,
}

/// Rehash every valid file and fold local edits into the index
///
/// Blocking; the engine runs it on the blocking pool.
fn scan_directory(
	base_dir: &Path,
	block_size: usize,
	mut local: IndexMap,
) -> Result<(IndexMap, Scan), SyncError> {
	let mut scan = Scan { present: BTreeSet::new(), skipped: Vec::new() };

	for entry in std::fs::read_dir(base_dir)? {
		let entry = entry?;
		if !entry.path().is_file() {
			continue;
		}
		let name = match entry.file_name().into_string() {
			Ok(name) => name,
			Err(raw) => {
				warn!("Skipping non UTF-8 filename {:?}", raw);
				continue;
			}
		};
		if name == INDEX_FILENAME {
			continue;
		}
		if let Err(e) = validate_filename(&name) {
			warn!("Skipping {:?}: {}", name, e);
			scan.skipped.push((name, e.to_string()));
			continue;
		}

		let hashes = chunking::file_hash_list(&entry.path(), block_size)?;
		match local.get_mut(&name) {
			None => {
				debug!("[scan] new file {}", name);
				local.insert(name.clone(), FileMetadata::new(&name, 1, hashes));
			}
			Some(known) if !hash_lists_equal(&known.block_hash_list, &hashes) => {
				known.version += 1;
				debug!("[scan] {} changed locally, now v{}", name, known.version);
				known.block_hash_list = hashes;
			}
			Some(_) => {}
		}
		scan.present.insert(name);
	}

	Ok((local, scan))
}

/// A blocking task that panicked or was cancelled
pub(crate) fn blocking_error(e: tokio::task::JoinError) -> SyncError {
	SyncError::Io(io::Error::other(e))
}

/// Tombstone every indexed file that no longer exists locally
fn mark_deletions(local: &mut IndexMap, present: &BTreeSet<String>) {
	for (name, meta) in local.iter_mut() {
		if present.contains(name) || meta.is_tombstone() {
			continue;
		}
		meta.version += 1;
		meta.block_hash_list = crate::types::tombstone_list();
		debug!("[scan] {} deleted locally, tombstone v{}", name, meta.version);
	}
}


// vim: ts=4
