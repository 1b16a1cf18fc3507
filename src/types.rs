//! Core data model: blocks and versioned file metadata

use serde::{Deserialize, Serialize};

/// Hash list marker for a deleted file
pub const TOMBSTONE_HASH: &str = "0";

/// Hash list marker for a zero-length file
pub const EMPTY_FILE_HASH: &str = "-1";

/// A content-addressed block of file data
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
	pub hash: String,
	pub data: Vec<u8>,
}

impl Block {
	/// Build a block from raw bytes, computing its hash
	pub fn new(data: Vec<u8>) -> Self {
		Block { hash: crate::chunking::hash_block(&data), data }
	}

	pub fn size(&self) -> usize {
		self.data.len()
	}
}

/// Versioned state of one file as known to the authority or a client
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileMetadata {
	#[serde(rename = "name")]
	pub filename: String,
	#[serde(rename = "ver")]
	pub version: i64,
	#[serde(rename = "hashes")]
	pub block_hash_list: Vec<String>,
}

impl FileMetadata {
	pub fn new(filename: &str, version: i64, block_hash_list: Vec<String>) -> Self {
		FileMetadata { filename: filename.to_string(), version, block_hash_list }
	}

	/// Tombstone entry for `filename` at `version`
	pub fn tombstone(filename: &str, version: i64) -> Self {
		Self::new(filename, version, tombstone_list())
	}

	pub fn is_tombstone(&self) -> bool {
		is_single(&self.block_hash_list, TOMBSTONE_HASH)
	}

	pub fn is_empty_file(&self) -> bool {
		is_single(&self.block_hash_list, EMPTY_FILE_HASH)
	}

	/// Same version and element-wise equal hash lists
	pub fn content_equal(&self, other: &FileMetadata) -> bool {
		self.version == other.version
			&& hash_lists_equal(&self.block_hash_list, &other.block_hash_list)
	}
}

pub fn tombstone_list() -> Vec<String> {
	vec![TOMBSTONE_HASH.to_string()]
}

pub fn empty_file_list() -> Vec<String> {
	vec![EMPTY_FILE_HASH.to_string()]
}

/// Order-sensitive comparison of two hash lists
pub fn hash_lists_equal(a: &[String], b: &[String]) -> bool {
	if a.len() != b.len() {
		return false;
	}
	a.iter().zip(b).all(|(x, y)| x == y)
}

fn is_single(list: &[String], marker: &str) -> bool {
	list.len() == 1 && list[0] == marker
}


// vim: ts=4
