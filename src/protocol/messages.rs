//! Wire messages
//!
//! Every message is a single JSON object on its own line. Requests carry
//! their command in `cmd`, responses their kind in `res`:
//!
//! ```text
//! {"cmd":"UPDATE_FILE","meta":{"name":"a.txt","ver":2,"hashes":["..."]}}
//! {"res":"VERSION","ver":2}
//! {"cmd":"GET_BLOCK","hash":"..."}
//! {"res":"BLOCK","block":{"hash":"...","data":"aGk="}}
//! ```

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::error::ProtocolError;
use crate::error::StoreError;
use crate::types::{Block, FileMetadata};

/// Requests understood by a metadata server
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "cmd", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetaRequest {
	GetFileInfoMap,
	UpdateFile { meta: FileMetadata },
	GetBlockStoreMap { hashes: Vec<String> },
	GetBlockStoreAddrs,
}

/// Requests understood by a block server
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "cmd", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockRequest {
	HasBlock { hash: String },
	GetBlock { hash: String },
	PutBlock { block: WireBlock },
}

/// Responses of both servers
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "res", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Response {
	FileInfoMap { files: BTreeMap<String, FileMetadata> },
	Version { ver: i64 },
	BlockStoreMap { map: BTreeMap<String, BTreeSet<String>> },
	Addrs { addrs: Vec<String> },
	Bool { value: bool },
	Block { block: WireBlock },
	Error { error: WireError },
}

impl Response {
	/// Short name for log messages
	pub fn kind(&self) -> &'static str {
		match self {
			Response::FileInfoMap { .. } => "FILE_INFO_MAP",
			Response::Version { .. } => "VERSION",
			Response::BlockStoreMap { .. } => "BLOCK_STORE_MAP",
			Response::Addrs { .. } => "ADDRS",
			Response::Bool { .. } => "BOOL",
			Response::Block { .. } => "BLOCK",
			Response::Error { .. } => "ERROR",
		}
	}
}

/// Block with base64-encoded payload
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct WireBlock {
	pub hash: String,
	pub data: String,
}

impl From<&Block> for WireBlock {
	fn from(block: &Block) -> Self {
		WireBlock { hash: block.hash.clone(), data: BASE64.encode(&block.data) }
	}
}

impl WireBlock {
	/// Decode the payload; the hash is taken as sent, stores verify it
	pub fn into_block(self) -> Result<Block, ProtocolError> {
		let data = BASE64.decode(self.data.as_bytes())?;
		Ok(Block { hash: self.hash, data })
	}
}

/// Store errors that survive the trip over the wire
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WireError {
	VersionConflict { filename: String, attempted: i64, current: i64 },
	NotFound { hash: String },
	HashMismatch { expected: String, actual: String },
	Other { message: String },
}

impl From<&StoreError> for WireError {
	fn from(e: &StoreError) -> Self {
		match e {
			StoreError::VersionConflict { filename, attempted, current } => {
				WireError::VersionConflict {
					filename: filename.clone(),
					attempted: *attempted,
					current: *current,
				}
			}
			StoreError::NotFound { hash } => WireError::NotFound { hash: hash.clone() },
			StoreError::HashMismatch { expected, actual } => {
				WireError::HashMismatch { expected: expected.clone(), actual: actual.clone() }
			}
			other => WireError::Other { message: other.to_string() },
		}
	}
}

impl WireError {
	/// Rebuild the store error reported by the server at `address`
	pub fn into_store_error(self, address: &str) -> StoreError {
		match self {
			WireError::VersionConflict { filename, attempted, current } => {
				StoreError::VersionConflict { filename, attempted, current }
			}
			WireError::NotFound { hash } => StoreError::NotFound { hash },
			WireError::HashMismatch { expected, actual } => {
				StoreError::HashMismatch { expected, actual }
			}
			WireError::Other { message } => StoreError::transport(address, message),
		}
	}
}


// vim: ts=4
