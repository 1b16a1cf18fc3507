//! Consistent hash ring mapping block hashes to block store addresses
//!
//! Each store address contributes `virtual_nodes` positions on a 64-bit
//! ring. A block hash is owned by the first virtual node at or after its own
//! position, wrapping around to the smallest position. Removing one address
//! only hands that address's arcs to their successors, so roughly `1/N` of
//! the blocks change owner.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::StoreError;

/// Default number of virtual nodes per store address
pub const DEFAULT_VIRTUAL_NODES: usize = 64;

#[derive(Debug, Clone)]
pub struct ConsistentHashRing {
	positions: BTreeMap<u64, String>,
	addrs: Vec<String>,
}

/// Position of an arbitrary key on the ring
fn ring_position(key: &str) -> u64 {
	let digest = blake3::hash(key.as_bytes());
	let mut head = [0u8; 8];
	head.copy_from_slice(&digest.as_bytes()[..8]);
	u64::from_be_bytes(head)
}

impl ConsistentHashRing {
	/// Build the ring from a store address set
	pub fn new(addrs: &[String], virtual_nodes: usize) -> Result<Self, StoreError> {
		if virtual_nodes == 0 {
			return Err(StoreError::Configuration {
				message: "virtual node count must be positive".to_string(),
			});
		}

		let mut unique: Vec<String> = Vec::with_capacity(addrs.len());
		for addr in addrs {
			if !unique.contains(addr) {
				unique.push(addr.clone());
			}
		}
		if unique.is_empty() {
			return Err(StoreError::Configuration {
				message: "block store address set is empty".to_string(),
			});
		}

		let mut positions = BTreeMap::new();
		for addr in &unique {
			for i in 0..virtual_nodes {
				// First writer keeps a colliding position; deterministic by address order.
				positions.entry(ring_position(&format!("{}#{}", addr, i))).or_insert(addr.clone());
			}
		}

		Ok(ConsistentHashRing { positions, addrs: unique })
	}

	/// Store address owning `block_hash`
	pub fn route(&self, block_hash: &str) -> &str {
		let pos = ring_position(block_hash);
		self.positions
			.range(pos..)
			.next()
			.or_else(|| self.positions.iter().next())
			.map(|(_, addr)| addr.as_str())
			// Construction guarantees at least one position.
			.unwrap_or_default()
	}

	/// Group block hashes by owning store address
	pub fn block_store_map<'a, I>(&self, hashes: I) -> BTreeMap<String, BTreeSet<String>>
	where
		I: IntoIterator<Item = &'a String>,
	{
		let mut map: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
		for hash in hashes {
			map.entry(self.route(hash).to_string()).or_default().insert(hash.clone());
		}
		map
	}

	/// Store addresses in configuration order, duplicates removed
	pub fn addrs(&self) -> &[String] {
		&self.addrs
	}
}


// vim: ts=4
