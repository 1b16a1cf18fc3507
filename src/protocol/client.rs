//! Remote service clients
//!
//! Each client owns one TCP connection guarded by a mutex, so requests on
//! a client are strictly sequential. A connection that failed mid-request
//! is dropped and transparently reopened by the next request.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::debug;

use super::error::ProtocolError;
use super::messages::{BlockRequest, MetaRequest, Response, WireBlock};
use crate::error::StoreError;
use crate::meta::MetadataService;
use crate::store::{BlockConnector, BlockService, StoreResult};
use crate::types::{Block, FileMetadata};

struct Stream {
	reader: BufReader<OwnedReadHalf>,
	writer: OwnedWriteHalf,
}

/// Request/response exchange with one server
struct Connection {
	addr: String,
	timeout: Duration,
	stream: Mutex<Option<Stream>>,
}

impl Connection {
	async fn open(addr: &str, limit: Duration) -> Result<Stream, ProtocolError> {
		let stream = timeout(limit, TcpStream::connect(addr)).await??;
		stream.set_nodelay(true)?;
		let (read_half, writer) = stream.into_split();
		debug!("[client] connected to {}", addr);
		Ok(Stream { reader: BufReader::new(read_half), writer })
	}

	async fn connect(addr: &str, limit: Duration) -> StoreResult<Self> {
		let stream = Self::open(addr, limit).await.map_err(|e| e.into_store_error(addr))?;
		Ok(Connection { addr: addr.to_string(), timeout: limit, stream: Mutex::new(Some(stream)) })
	}

	async fn call<R: Serialize>(&self, request: &R) -> StoreResult<Response> {
		let mut guard = self.stream.lock().await;
		if guard.is_none() {
			let stream =
				Self::open(&self.addr, self.timeout).await.map_err(|e| e.into_store_error(&self.addr))?;
			*guard = Some(stream);
		}

		let result = match guard.as_mut() {
			Some(stream) => timeout(self.timeout, exchange(stream, request))
				.await
				.map_err(ProtocolError::from)
				.and_then(|r| r),
			None => Err(ProtocolError::Disconnected),
		};

		match result {
			Ok(Response::Error { error }) => Err(error.into_store_error(&self.addr)),
			Ok(response) => Ok(response),
			Err(e) => {
				*guard = None;
				Err(e.into_store_error(&self.addr))
			}
		}
	}

	fn unexpected(&self, response: &Response) -> StoreError {
		StoreError::transport(&self.addr, format!("unexpected {} response", response.kind()))
	}
}

async fn exchange<R: Serialize>(stream: &mut Stream, request: &R) -> Result<Response, ProtocolError> {
	let mut out = serde_json::to_string(request)?;
	out.push('\n');
	stream.writer.write_all(out.as_bytes()).await?;
	stream.writer.flush().await?;

	let mut line = String::new();
	if stream.reader.read_line(&mut line).await? == 0 {
		return Err(ProtocolError::Disconnected);
	}
	Ok(serde_json::from_str(line.trim())?)
}

/// [`MetadataService`] of a remote metadata server
pub struct RemoteMetaClient {
	conn: Connection,
}

impl RemoteMetaClient {
	pub async fn connect(addr: &str, timeout: Duration) -> StoreResult<Self> {
		Ok(RemoteMetaClient { conn: Connection::connect(addr, timeout).await? })
	}
}

#[async_trait]
impl MetadataService for RemoteMetaClient {
	async fn get_file_info_map(&self) -> StoreResult<BTreeMap<String, FileMetadata>> {
		match self.conn.call(&MetaRequest::GetFileInfoMap).await? {
			Response::FileInfoMap { files } => Ok(files),
			other => Err(self.conn.unexpected(&other)),
		}
	}

	async fn update_file(&self, candidate: &FileMetadata) -> StoreResult<i64> {
		let request = MetaRequest::UpdateFile { meta: candidate.clone() };
		match self.conn.call(&request).await? {
			Response::Version { ver } => Ok(ver),
			other => Err(self.conn.unexpected(&other)),
		}
	}

	async fn get_block_store_map(
		&self,
		hashes: &[String],
	) -> StoreResult<BTreeMap<String, BTreeSet<String>>> {
		let request = MetaRequest::GetBlockStoreMap { hashes: hashes.to_vec() };
		match self.conn.call(&request).await? {
			Response::BlockStoreMap { map } => Ok(map),
			other => Err(self.conn.unexpected(&other)),
		}
	}

	async fn get_block_store_addrs(&self) -> StoreResult<Vec<String>> {
		match self.conn.call(&MetaRequest::GetBlockStoreAddrs).await? {
			Response::Addrs { addrs } => Ok(addrs),
			other => Err(self.conn.unexpected(&other)),
		}
	}
}

/// [`BlockService`] of a remote block server
pub struct RemoteBlockClient {
	conn: Connection,
}

impl RemoteBlockClient {
	pub async fn connect(addr: &str, timeout: Duration) -> StoreResult<Self> {
		Ok(RemoteBlockClient { conn: Connection::connect(addr, timeout).await? })
	}
}

#[async_trait]
impl BlockService for RemoteBlockClient {
	async fn has_block(&self, hash: &str) -> StoreResult<bool> {
		match self.conn.call(&BlockRequest::HasBlock { hash: hash.to_string() }).await? {
			Response::Bool { value } => Ok(value),
			other => Err(self.conn.unexpected(&other)),
		}
	}

	async fn get_block(&self, hash: &str) -> StoreResult<Block> {
		match self.conn.call(&BlockRequest::GetBlock { hash: hash.to_string() }).await? {
			Response::Block { block } => {
				block.into_block().map_err(|e| e.into_store_error(&self.conn.addr))
			}
			other => Err(self.conn.unexpected(&other)),
		}
	}

	async fn put_block(&self, block: &Block) -> StoreResult<bool> {
		let request = BlockRequest::PutBlock { block: WireBlock::from(block) };
		match self.conn.call(&request).await? {
			Response::Bool { value } => Ok(value),
			other => Err(self.conn.unexpected(&other)),
		}
	}
}

/// Opens [`RemoteBlockClient`]s over TCP
#[derive(Clone, Debug)]
pub struct TcpBlockConnector {
	timeout: Duration,
}

impl TcpBlockConnector {
	pub fn new(timeout: Duration) -> Self {
		TcpBlockConnector { timeout }
	}
}

#[async_trait]
impl BlockConnector for TcpBlockConnector {
	async fn connect(&self, addr: &str) -> StoreResult<Arc<dyn BlockService>> {
		Ok(Arc::new(RemoteBlockClient::connect(addr, self.timeout).await?))
	}
}

// vim: ts=4
