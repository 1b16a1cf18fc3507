//! Fixed-size chunking and block hashing
//!
//! Files are split into blocks of exactly `block_size` bytes, the last block
//! holding the remainder. Each block is identified by the hex blake3 digest
//! of its bytes. A zero-length file has no blocks and is represented by the
//! `["-1"]` hash list so it cannot be mistaken for a missing file.

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use crate::error::ChunkError;
use crate::types::{empty_file_list, Block};

/// Default block size in bytes
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Content hash of a block
pub fn hash_block(data: &[u8]) -> String {
	hex::encode(blake3::hash(data).as_bytes())
}

/// Lazy iterator over the fixed-size blocks of a reader
pub struct BlockChunker<R: Read> {
	reader: R,
	block_size: usize,
	done: bool,
}

impl<R: Read> BlockChunker<R> {
	pub fn new(reader: R, block_size: usize) -> Result<Self, ChunkError> {
		if block_size == 0 {
			return Err(ChunkError::InvalidBlockSize { size: block_size });
		}
		Ok(BlockChunker { reader, block_size, done: false })
	}

	/// Fill `buf` as far as the reader allows; short only at end of input
	fn read_full(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		let mut filled = 0;
		while filled < buf.len() {
			match self.reader.read(&mut buf[filled..]) {
				Ok(0) => break,
				Ok(n) => filled += n,
				Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
				Err(e) => return Err(e),
			}
		}
		Ok(filled)
	}
}

impl<R: Read> Iterator for BlockChunker<R> {
	type Item = Result<Block, ChunkError>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.done {
			return None;
		}
		let mut buf = vec![0u8; self.block_size];
		match self.read_full(&mut buf) {
			Ok(0) => {
				self.done = true;
				None
			}
			Ok(n) => {
				if n < self.block_size {
					self.done = true;
				}
				buf.truncate(n);
				Some(Ok(Block::new(buf)))
			}
			Err(e) => {
				self.done = true;
				Some(Err(ChunkError::from(e)))
			}
		}
	}
}

/// Hash list of everything readable from `reader`
pub fn hash_list_from_reader<R: Read>(
	reader: R,
	block_size: usize,
) -> Result<Vec<String>, ChunkError> {
	let mut hashes = Vec::new();
	for block in BlockChunker::new(reader, block_size)? {
		hashes.push(block?.hash);
	}
	if hashes.is_empty() {
		return Ok(empty_file_list());
	}
	Ok(hashes)
}

/// Hash list of a file on disk
pub fn file_hash_list(path: &Path, block_size: usize) -> Result<Vec<String>, ChunkError> {
	let file = fs::File::open(path)?;
	hash_list_from_reader(io::BufReader::new(file), block_size)
}

/// Split an in-memory buffer into blocks
pub fn chunk_bytes(data: &[u8], block_size: usize) -> Result<Vec<Block>, ChunkError> {
	BlockChunker::new(data, block_size)?.collect()
}

/// Concatenate blocks back into the original byte stream
pub fn reassemble(blocks: &[Block]) -> Vec<u8> {
	let total = blocks.iter().map(Block::size).sum();
	let mut out = Vec::with_capacity(total);
	for block in blocks {
		out.extend_from_slice(&block.data);
	}
	out
}


// vim: ts=4
