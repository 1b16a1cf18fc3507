//! # blocksync - Block-Based File Synchronization
//!
//! blocksync keeps flat directories on many clients in sync through a
//! shared metadata authority and a set of content-addressed block stores.
//! Files are cut into fixed-size blocks named by their blake3 hash; blocks
//! are spread over the stores by a consistent hash ring, and the authority
//! keeps one versioned block-hash list per filename. Concurrent writers are
//! arbitrated optimistically: the first update at a version wins and later
//! ones are told to catch up.
//!
//! ## One sync pass against in-process services
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use blocksync::{Config, ConsistentHashRing, MetaStore, MemoryBlockStore, SyncEngine};
//! use blocksync::store::LocalConnector;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let addrs = vec!["mem:0".to_string()];
//!     let meta = MetaStore::spawn(ConsistentHashRing::new(&addrs, 64)?);
//!     let connector = LocalConnector::new().with_store("mem:0", Arc::new(MemoryBlockStore::new()));
//!
//!     let config = Config { base_dir: "./dir".into(), ..Config::default() };
//!     let report = SyncEngine::new(&config, Arc::new(meta), Arc::new(connector)).run().await?;
//!     println!("{} uploaded, {} downloaded", report.uploaded(), report.downloaded());
//!     Ok(())
//! }
//! ```
//!
//! ## Over the network
//!
//! Run `blocksync block` for each store, `blocksync meta` for the
//! authority, then `blocksync sync DIR` on every client. The
//! [`protocol`] module holds the clients and servers used for that.

pub mod chunking;
pub mod config;
pub mod error;
pub mod index;
pub mod logging;
pub mod meta;
pub mod protocol;
pub mod ring;
pub mod store;
pub mod sync;
pub mod types;
pub mod validation;

// Re-export commonly used types and functions
pub use config::Config;
pub use error::{ChunkError, IndexError, StoreError, SyncError};
pub use meta::{MetaStore, MetaStoreHandle, MetadataService};
pub use ring::ConsistentHashRing;
pub use store::{BlockConnector, BlockService, MemoryBlockStore, RedbBlockStore, ShardedBlockStore};
pub use sync::{FileOutcome, SyncEngine, SyncReport};
pub use types::{Block, FileMetadata};

// vim: ts=4
