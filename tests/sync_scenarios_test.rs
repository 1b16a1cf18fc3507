use async_trait::async_trait;
use blocksync::store::{BlockService, LocalConnector, StoreResult};
use blocksync::{
	ConsistentHashRing, Config, FileMetadata, FileOutcome, MemoryBlockStore, MetaStore,
	MetaStoreHandle, MetadataService, StoreError, SyncEngine, SyncError, SyncReport,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

const BLOCK_SIZE: usize = 8;

/// Metadata authority plus in-process block stores
struct Cluster {
	meta: Arc<MetaStoreHandle>,
	connector: Arc<LocalConnector>,
	stores: Vec<Arc<MemoryBlockStore>>,
}

impl Cluster {
	fn new(store_count: usize) -> Self {
		let addrs: Vec<String> = (0..store_count).map(|i| format!("mem:{}", i)).collect();
		let ring = ConsistentHashRing::new(&addrs, 16).unwrap();
		let mut connector = LocalConnector::new();
		let mut stores = Vec::new();
		for addr in &addrs {
			let store = Arc::new(MemoryBlockStore::new());
			connector = connector.with_store(addr, store.clone() as Arc<dyn BlockService>);
			stores.push(store);
		}
		Cluster { meta: Arc::new(MetaStore::spawn(ring)), connector: Arc::new(connector), stores }
	}

	fn config(dir: &Path, retries: u32) -> Config {
		Config {
			base_dir: dir.to_path_buf(),
			block_size: BLOCK_SIZE,
			conflict_retries: retries,
			..Config::default()
		}
	}

	async fn sync(&self, dir: &Path) -> SyncReport {
		let engine = SyncEngine::new(&Self::config(dir, 0), self.meta.clone(), self.connector.clone());
		engine.run().await.unwrap()
	}

	async fn remote(&self, name: &str) -> Option<FileMetadata> {
		self.meta.get_file_info_map().await.unwrap().get(name).cloned()
	}

	async fn block_count(&self) -> usize {
		let mut total = 0;
		for store in &self.stores {
			total += store.len().await;
		}
		total
	}
}

fn index_contents(dir: &Path) -> String {
	fs::read_to_string(dir.join("index.db")).unwrap()
}

#[tokio::test]
async fn test_new_file_reaches_other_client() {
	let cluster = Cluster::new(1);
	let a = TempDir::new().unwrap();
	let b = TempDir::new().unwrap();

	fs::write(a.path().join("a.txt"), b"hi").unwrap();
	let report = cluster.sync(a.path()).await;
	assert_eq!(report.outcome("a.txt"), Some(&FileOutcome::Uploaded { version: 1 }));

	let remote = cluster.remote("a.txt").await.unwrap();
	assert_eq!(remote.version, 1);
	assert_eq!(remote.block_hash_list.len(), 1);

	let report = cluster.sync(b.path()).await;
	assert_eq!(report.outcome("a.txt"), Some(&FileOutcome::Downloaded { version: 1 }));
	assert_eq!(fs::read(b.path().join("a.txt")).unwrap(), b"hi");
	assert_eq!(index_contents(b.path()), format!("a.txt,1,{}\n", remote.block_hash_list[0]));
}

#[tokio::test]
async fn test_second_pass_is_a_no_op() {
	let cluster = Cluster::new(2);
	let a = TempDir::new().unwrap();
	fs::write(a.path().join("one.txt"), b"first file contents").unwrap();
	fs::write(a.path().join("two.txt"), b"second").unwrap();

	let first = cluster.sync(a.path()).await;
	assert_eq!(first.uploaded(), 2);
	let blocks = cluster.block_count().await;

	let second = cluster.sync(a.path()).await;
	assert!(second.outcomes.is_empty(), "{:?}", second.outcomes);
	assert_eq!(second.blocks_uploaded, 0);
	assert_eq!(cluster.block_count().await, blocks);
	assert_eq!(cluster.remote("one.txt").await.unwrap().version, 1);
}

#[tokio::test]
async fn test_local_edit_bumps_version() {
	let cluster = Cluster::new(1);
	let a = TempDir::new().unwrap();
	let b = TempDir::new().unwrap();

	fs::write(a.path().join("f.txt"), b"version one").unwrap();
	cluster.sync(a.path()).await;
	cluster.sync(b.path()).await;

	fs::write(a.path().join("f.txt"), b"version two, longer").unwrap();
	let report = cluster.sync(a.path()).await;
	assert_eq!(report.outcome("f.txt"), Some(&FileOutcome::Uploaded { version: 2 }));

	let report = cluster.sync(b.path()).await;
	assert_eq!(report.outcome("f.txt"), Some(&FileOutcome::Downloaded { version: 2 }));
	assert_eq!(fs::read(b.path().join("f.txt")).unwrap(), b"version two, longer");
}

#[tokio::test]
async fn test_deletion_propagates_as_tombstone() {
	let cluster = Cluster::new(1);
	let a = TempDir::new().unwrap();
	let b = TempDir::new().unwrap();

	fs::write(a.path().join("a.txt"), b"hi").unwrap();
	cluster.sync(a.path()).await;
	cluster.sync(b.path()).await;

	fs::remove_file(a.path().join("a.txt")).unwrap();
	let report = cluster.sync(a.path()).await;
	assert_eq!(report.outcome("a.txt"), Some(&FileOutcome::TombstoneUploaded { version: 2 }));

	let remote = cluster.remote("a.txt").await.unwrap();
	assert!(remote.is_tombstone());
	assert_eq!(remote.version, 2);

	let report = cluster.sync(b.path()).await;
	assert_eq!(report.outcome("a.txt"), Some(&FileOutcome::DeletedLocally { version: 2 }));
	assert!(!b.path().join("a.txt").exists());
	assert_eq!(index_contents(b.path()), "a.txt,2,0\n");

	// Nothing left to do on either side.
	assert!(cluster.sync(a.path()).await.outcomes.is_empty());
	assert!(cluster.sync(b.path()).await.outcomes.is_empty());
}

#[tokio::test]
async fn test_recreate_after_delete() {
	let cluster = Cluster::new(1);
	let a = TempDir::new().unwrap();
	let b = TempDir::new().unwrap();

	fs::write(a.path().join("a.txt"), b"hi").unwrap();
	cluster.sync(a.path()).await;
	fs::remove_file(a.path().join("a.txt")).unwrap();
	cluster.sync(a.path()).await;
	cluster.sync(b.path()).await;

	fs::write(a.path().join("a.txt"), b"back again").unwrap();
	let report = cluster.sync(a.path()).await;
	assert_eq!(report.outcome("a.txt"), Some(&FileOutcome::Uploaded { version: 3 }));

	cluster.sync(b.path()).await;
	assert_eq!(fs::read(b.path().join("a.txt")).unwrap(), b"back again");
}

#[tokio::test]
async fn test_empty_file_round_trip() {
	let cluster = Cluster::new(2);
	let a = TempDir::new().unwrap();
	let b = TempDir::new().unwrap();

	fs::write(a.path().join("empty"), b"").unwrap();
	cluster.sync(a.path()).await;

	let remote = cluster.remote("empty").await.unwrap();
	assert!(remote.is_empty_file());
	assert_eq!(cluster.block_count().await, 0);

	let report = cluster.sync(b.path()).await;
	assert_eq!(report.outcome("empty"), Some(&FileOutcome::Downloaded { version: 1 }));
	assert_eq!(fs::read(b.path().join("empty")).unwrap().len(), 0);
}

#[tokio::test]
async fn test_multi_block_file_spread_over_stores() {
	let cluster = Cluster::new(3);
	let a = TempDir::new().unwrap();
	let b = TempDir::new().unwrap();

	let content: Vec<u8> = (0..40 * BLOCK_SIZE).map(|i| (i * 7 % 256) as u8).collect();
	fs::write(a.path().join("big.bin"), &content).unwrap();
	let report = cluster.sync(a.path()).await;

	let remote = cluster.remote("big.bin").await.unwrap();
	let unique: BTreeSet<&String> = remote.block_hash_list.iter().collect();
	assert_eq!(remote.block_hash_list.len(), 40);
	assert_eq!(report.blocks_uploaded, unique.len());
	assert_eq!(cluster.block_count().await, unique.len());

	let report = cluster.sync(b.path()).await;
	assert_eq!(report.blocks_downloaded, 40);
	assert_eq!(fs::read(b.path().join("big.bin")).unwrap(), content);
}

#[tokio::test]
async fn test_file_larger_than_one_read_batch() {
	let cluster = Cluster::new(2);
	let a = TempDir::new().unwrap();
	let b = TempDir::new().unwrap();

	// Every block distinct, with a repeat of the first block at the end.
	let mut content: Vec<u8> = (0..150u32).flat_map(|i| (i as u64).to_be_bytes()).collect();
	let first = content[..BLOCK_SIZE].to_vec();
	content.extend_from_slice(&first);
	content.extend_from_slice(b"tail");
	fs::write(a.path().join("large.bin"), &content).unwrap();

	let report = cluster.sync(a.path()).await;
	assert_eq!(report.outcome("large.bin"), Some(&FileOutcome::Uploaded { version: 1 }));
	assert_eq!(report.blocks_uploaded, 151);
	assert_eq!(cluster.remote("large.bin").await.unwrap().block_hash_list.len(), 152);

	let report = cluster.sync(b.path()).await;
	assert_eq!(report.blocks_downloaded, 152);
	assert_eq!(fs::read(b.path().join("large.bin")).unwrap(), content);
}

#[tokio::test]
async fn test_shared_blocks_are_not_resent() {
	let cluster = Cluster::new(2);
	let a = TempDir::new().unwrap();

	fs::write(a.path().join("x"), b"AAAAAAAABBBBBBBB").unwrap();
	let first = cluster.sync(a.path()).await;
	assert_eq!(first.blocks_uploaded, 2);

	fs::write(a.path().join("y"), b"BBBBBBBBAAAAAAAA").unwrap();
	let second = cluster.sync(a.path()).await;
	assert_eq!(second.outcome("y"), Some(&FileOutcome::Uploaded { version: 1 }));
	assert_eq!(second.blocks_uploaded, 0);
}

#[tokio::test]
async fn test_invalid_names_are_skipped() {
	let cluster = Cluster::new(1);
	let a = TempDir::new().unwrap();

	fs::write(a.path().join("a,b.txt"), b"comma").unwrap();
	fs::write(a.path().join("ok.txt"), b"fine").unwrap();
	fs::create_dir(a.path().join("subdir")).unwrap();
	let report = cluster.sync(a.path()).await;

	assert!(matches!(report.outcome("a,b.txt"), Some(FileOutcome::Skipped { .. })));
	let remote = cluster.meta.get_file_info_map().await.unwrap();
	assert_eq!(remote.keys().collect::<Vec<_>>(), vec!["ok.txt"]);
	assert!(!index_contents(a.path()).contains("index.db"));
}

#[tokio::test]
async fn test_newline_in_local_name_keeps_index_readable() {
	let cluster = Cluster::new(1);
	let a = TempDir::new().unwrap();
	let b = TempDir::new().unwrap();

	fs::write(a.path().join("a\nb"), b"split").unwrap();
	fs::write(a.path().join("ok.txt"), b"fine").unwrap();

	for _ in 0..2 {
		let report = cluster.sync(a.path()).await;
		assert!(matches!(report.outcome("a\nb"), Some(FileOutcome::Skipped { .. })));
	}
	assert!(cluster.remote("a\nb").await.is_none());
	assert_eq!(index_contents(a.path()).lines().count(), 1);

	cluster.sync(b.path()).await;
	let report = cluster.sync(b.path()).await;
	assert!(report.outcomes.is_empty(), "{:?}", report.outcomes);
	assert_eq!(fs::read(b.path().join("ok.txt")).unwrap(), b"fine");
}

#[tokio::test]
async fn test_remote_control_character_name_does_not_abort() {
	let cluster = Cluster::new(1);
	let a = TempDir::new().unwrap();
	cluster.meta.update_file(&FileMetadata::new("bad\0name", 1, vec!["-1".into()])).await.unwrap();

	fs::write(a.path().join("ok.txt"), b"fine").unwrap();
	let report = cluster.sync(a.path()).await;

	assert!(matches!(report.outcome("bad\0name"), Some(FileOutcome::Skipped { .. })));
	assert_eq!(report.outcome("ok.txt"), Some(&FileOutcome::Uploaded { version: 1 }));
	assert!(!index_contents(a.path()).contains('\0'));
}

#[tokio::test]
async fn test_hostile_remote_names_stay_inside_base_dir() {
	let cluster = Cluster::new(1);
	let root = TempDir::new().unwrap();
	let base = root.path().join("base");
	fs::create_dir(&base).unwrap();

	let names = ["../escape", "a,b", "x\ny"];
	for name in names {
		cluster.meta.update_file(&FileMetadata::new(name, 1, vec!["-1".into()])).await.unwrap();
	}
	cluster.meta.update_file(&FileMetadata::new("good.txt", 1, vec!["-1".into()])).await.unwrap();

	let report = cluster.sync(&base).await;
	for name in names {
		assert!(matches!(report.outcome(name), Some(FileOutcome::Skipped { .. })), "{:?}", name);
	}
	assert_eq!(report.outcome("good.txt"), Some(&FileOutcome::Downloaded { version: 1 }));
	assert!(!root.path().join("escape").exists());

	let entries: Vec<String> = fs::read_dir(&base)
		.unwrap()
		.map(|e| e.unwrap().file_name().into_string().unwrap())
		.collect::<BTreeSet<_>>()
		.into_iter()
		.collect();
	assert_eq!(entries, vec!["good.txt".to_string(), "index.db".to_string()]);

	let again = cluster.sync(&base).await;
	assert!(again.outcomes.iter().all(|(name, _)| names.contains(&name.as_str())), "{:?}", again.outcomes);
	assert_eq!(index_contents(&base), "good.txt,1,-1\n");
}

#[tokio::test]
async fn test_missing_block_aborts_without_saving_index() {
	let cluster = Cluster::new(1);
	let a = TempDir::new().unwrap();
	let b = TempDir::new().unwrap();

	fs::write(a.path().join("a.txt"), b"hi").unwrap();
	cluster.sync(a.path()).await;

	// Same address, but a store that never saw the block.
	let empty = LocalConnector::new()
		.with_store("mem:0", Arc::new(MemoryBlockStore::new()) as Arc<dyn BlockService>);
	let engine = SyncEngine::new(&Cluster::config(b.path(), 0), cluster.meta.clone(), Arc::new(empty));
	let err = engine.run().await.unwrap_err();

	assert!(matches!(err, SyncError::Store(StoreError::NotFound { .. })));
	assert!(err.is_fatal());
	assert!(!b.path().join("index.db").exists());
	assert!(!b.path().join("a.txt").exists());
}

/// Serves an old snapshot once, as if another client raced us
struct StaleSnapshot {
	inner: Arc<MetaStoreHandle>,
	stale: BTreeMap<String, FileMetadata>,
	served: AtomicBool,
}

#[async_trait]
impl MetadataService for StaleSnapshot {
	async fn get_file_info_map(&self) -> StoreResult<BTreeMap<String, FileMetadata>> {
		if !self.served.swap(true, Ordering::SeqCst) {
			return Ok(self.stale.clone());
		}
		self.inner.get_file_info_map().await
	}

	async fn update_file(&self, candidate: &FileMetadata) -> StoreResult<i64> {
		self.inner.update_file(candidate).await
	}

	async fn get_block_store_map(
		&self,
		hashes: &[String],
	) -> StoreResult<BTreeMap<String, BTreeSet<String>>> {
		self.inner.get_block_store_map(hashes).await
	}

	async fn get_block_store_addrs(&self) -> StoreResult<Vec<String>> {
		self.inner.get_block_store_addrs().await
	}
}

/// A and B share notes.txt at v1, both edit it, A publishes first while
/// B is working from the v1 snapshot.
async fn racing_edit(cluster: &Cluster, a: &Path, b: &Path) -> StaleSnapshot {
	fs::write(a.join("notes.txt"), b"original").unwrap();
	cluster.sync(a).await;
	cluster.sync(b).await;
	let stale = cluster.meta.get_file_info_map().await.unwrap();

	fs::write(a.join("notes.txt"), b"edited by a").unwrap();
	fs::write(b.join("notes.txt"), b"edited by b").unwrap();
	let report = cluster.sync(a).await;
	assert_eq!(report.outcome("notes.txt"), Some(&FileOutcome::Uploaded { version: 2 }));

	StaleSnapshot { inner: cluster.meta.clone(), stale, served: AtomicBool::new(false) }
}

#[tokio::test]
async fn test_conflict_is_reported_per_file() {
	let cluster = Cluster::new(1);
	let a = TempDir::new().unwrap();
	let b = TempDir::new().unwrap();
	let meta = racing_edit(&cluster, a.path(), b.path()).await;
	fs::write(b.path().join("other.txt"), b"unrelated").unwrap();

	let engine = SyncEngine::new(&Cluster::config(b.path(), 0), Arc::new(meta), cluster.connector.clone());
	let report = engine.run().await.unwrap();

	assert_eq!(
		report.outcome("notes.txt"),
		Some(&FileOutcome::Conflict { attempted: 2, current: 2 })
	);
	assert_eq!(report.outcome("other.txt"), Some(&FileOutcome::Uploaded { version: 1 }));
	assert_eq!(report.conflicts(), 1);

	// Authority keeps the first writer's content; B keeps its own for now.
	let remote = cluster.remote("notes.txt").await.unwrap();
	assert_eq!(remote.version, 2);
	assert_eq!(fs::read(b.path().join("notes.txt")).unwrap(), b"edited by b");

	// Next pass with a fresh snapshot: the authority's version wins.
	let report = cluster.sync(b.path()).await;
	assert_eq!(report.outcome("notes.txt"), Some(&FileOutcome::Downloaded { version: 2 }));
	assert_eq!(fs::read(b.path().join("notes.txt")).unwrap(), b"edited by a");
}

#[tokio::test]
async fn test_conflict_retry_takes_remote_version() {
	let cluster = Cluster::new(1);
	let a = TempDir::new().unwrap();
	let b = TempDir::new().unwrap();
	let meta = racing_edit(&cluster, a.path(), b.path()).await;

	let engine = SyncEngine::new(&Cluster::config(b.path(), 2), Arc::new(meta), cluster.connector.clone());
	let report = engine.run().await.unwrap();

	assert_eq!(report.conflicts(), 1);
	assert_eq!(report.outcome("notes.txt"), Some(&FileOutcome::Downloaded { version: 2 }));
	assert_eq!(fs::read(b.path().join("notes.txt")).unwrap(), b"edited by a");
	assert!(index_contents(b.path()).starts_with("notes.txt,2,"));
}
