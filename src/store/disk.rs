//! Persistent block store backed by a redb database

use async_trait::async_trait;
use redb::{ReadableDatabase, ReadableTable, TableDefinition};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{verify_block, BlockService, StoreResult};
use crate::error::StoreError;
use crate::types::Block;

/// Table definition for stored blocks
/// Key: block hash (hex)
/// Value: block bytes
const BLOCKS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("blocks");

/// Database file name inside the data directory
pub const BLOCKS_DB_FILENAME: &str = "blocks.redb";

fn storage_error(e: impl Display) -> StoreError {
	StoreError::Storage { message: e.to_string() }
}

/// Block store persisting blocks in a single redb file
pub struct RedbBlockStore {
	db: redb::Database,
	db_path: PathBuf,
}

impl RedbBlockStore {
	/// Open or create the block database inside `data_dir`
	pub fn open(data_dir: &Path) -> StoreResult<Self> {
		std::fs::create_dir_all(data_dir).map_err(storage_error)?;
		let db_path = data_dir.join(BLOCKS_DB_FILENAME);
		let db = redb::Database::create(&db_path).map_err(storage_error)?;
		// Ensure the table exists so reads on a fresh store do not fail
		{
			let write_txn = db.begin_write().map_err(storage_error)?;
			let _ = write_txn.open_table(BLOCKS_TABLE).map_err(storage_error)?;
			write_txn.commit().map_err(storage_error)?;
		}
		Ok(RedbBlockStore { db, db_path })
	}

	pub fn path(&self) -> &Path {
		&self.db_path
	}

	fn read(&self, hash: &str) -> StoreResult<Option<Vec<u8>>> {
		let read_txn = self.db.begin_read().map_err(storage_error)?;
		let table = read_txn.open_table(BLOCKS_TABLE).map_err(storage_error)?;
		let entry = table.get(hash).map_err(storage_error)?;
		Ok(entry.map(|e| e.value().to_vec()))
	}
}

#[async_trait]
impl BlockService for RedbBlockStore {
	async fn has_block(&self, hash: &str) -> StoreResult<bool> {
		Ok(self.read(hash)?.is_some())
	}

	async fn get_block(&self, hash: &str) -> StoreResult<Block> {
		match self.read(hash)? {
			Some(data) => Ok(Block { hash: hash.to_string(), data }),
			None => Err(StoreError::NotFound { hash: hash.to_string() }),
		}
	}

	async fn put_block(&self, block: &Block) -> StoreResult<bool> {
		verify_block(block)?;
		if self.read(&block.hash)?.is_some() {
			return Ok(true);
		}

		let write_txn = self.db.begin_write().map_err(storage_error)?;
		{
			let mut table = write_txn.open_table(BLOCKS_TABLE).map_err(storage_error)?;
			table.insert(block.hash.as_str(), block.data.as_slice()).map_err(storage_error)?;
		}
		write_txn.commit().map_err(storage_error)?;
		debug!("[redb_store] stored block {} ({} bytes)", block.hash, block.size());
		Ok(true)
	}
}


// vim: ts=4
