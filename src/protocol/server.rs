//! JSON-lines server loop
//!
//! One task per accepted connection; each task reads a request line,
//! hands it to the [`RequestHandler`] and writes back exactly one response
//! line. Connections are independent, so a slow client never blocks the
//! others. Serialisation of metadata updates happens behind the handler,
//! in the metadata actor.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use super::error::ProtocolError;
use super::messages::{BlockRequest, MetaRequest, Response, WireError};
use crate::error::StoreError;
use crate::meta::MetadataService;
use crate::store::BlockService;

/// Turns one decoded request into one response
#[async_trait]
pub trait RequestHandler: Send + Sync + 'static {
	type Request: DeserializeOwned + Send;

	async fn handle(&self, request: Self::Request) -> Response;
}

fn error_response(e: &StoreError) -> Response {
	Response::Error { error: WireError::from(e) }
}

/// Serves [`MetaRequest`]s from a metadata service
pub struct MetaHandler {
	meta: Arc<dyn MetadataService>,
}

impl MetaHandler {
	pub fn new(meta: Arc<dyn MetadataService>) -> Self {
		MetaHandler { meta }
	}
}

#[async_trait]
impl RequestHandler for MetaHandler {
	type Request = MetaRequest;

	async fn handle(&self, request: MetaRequest) -> Response {
		let result = match request {
			MetaRequest::GetFileInfoMap => {
				self.meta.get_file_info_map().await.map(|files| Response::FileInfoMap { files })
			}
			MetaRequest::UpdateFile { meta } => {
				self.meta.update_file(&meta).await.map(|ver| Response::Version { ver })
			}
			MetaRequest::GetBlockStoreMap { hashes } => self
				.meta
				.get_block_store_map(&hashes)
				.await
				.map(|map| Response::BlockStoreMap { map }),
			MetaRequest::GetBlockStoreAddrs => {
				self.meta.get_block_store_addrs().await.map(|addrs| Response::Addrs { addrs })
			}
		};
		result.unwrap_or_else(|e| error_response(&e))
	}
}

/// Serves [`BlockRequest`]s from a block store
pub struct BlockHandler {
	store: Arc<dyn BlockService>,
}

impl BlockHandler {
	pub fn new(store: Arc<dyn BlockService>) -> Self {
		BlockHandler { store }
	}
}

#[async_trait]
impl RequestHandler for BlockHandler {
	type Request = BlockRequest;

	async fn handle(&self, request: BlockRequest) -> Response {
		let result = match request {
			BlockRequest::HasBlock { hash } => {
				self.store.has_block(&hash).await.map(|value| Response::Bool { value })
			}
			BlockRequest::GetBlock { hash } => self
				.store
				.get_block(&hash)
				.await
				.map(|block| Response::Block { block: (&block).into() }),
			BlockRequest::PutBlock { block } => match block.into_block() {
				Ok(block) => self.store.put_block(&block).await.map(|value| Response::Bool { value }),
				Err(e) => Err(StoreError::Storage { message: e.to_string() }),
			},
		};
		result.unwrap_or_else(|e| error_response(&e))
	}
}

/// Accept connections on `listener` forever
pub async fn serve<H: RequestHandler>(
	listener: TcpListener,
	handler: Arc<H>,
) -> Result<(), ProtocolError> {
	if let Ok(addr) = listener.local_addr() {
		info!("Listening on {}", addr);
	}

	loop {
		let (stream, peer) = listener.accept().await?;
		debug!("[server] connection from {}", peer);
		let handler = Arc::clone(&handler);
		tokio::spawn(async move {
			if let Err(e) = handle_connection(stream, handler.as_ref()).await {
				warn!("Connection from {} failed: {}", peer, e);
			}
			debug!("[server] {} disconnected", peer);
		});
	}
}

async fn handle_connection<H: RequestHandler>(
	stream: TcpStream,
	handler: &H,
) -> Result<(), ProtocolError> {
	let (read_half, mut writer) = stream.into_split();
	let mut reader = BufReader::new(read_half);
	let mut line = String::new();

	loop {
		line.clear();
		if reader.read_line(&mut line).await? == 0 {
			return Ok(()); // EOF
		}
		let trimmed = line.trim();
		if trimmed.is_empty() {
			continue;
		}

		let response = match serde_json::from_str::<H::Request>(trimmed) {
			Ok(request) => handler.handle(request).await,
			Err(e) => {
				warn!("Bad request: {}", e);
				Response::Error { error: WireError::Other { message: format!("bad request: {}", e) } }
			}
		};
		debug!("[server] -> {}", response.kind());

		let mut out = serde_json::to_string(&response)?;
		out.push('\n');
		writer.write_all(out.as_bytes()).await?;
		writer.flush().await?;
	}
}

// vim: ts=4
