//! Network transport for the metadata and block services
//!
//! Both services speak line-delimited JSON over TCP. The server side wraps
//! any [`MetadataService`](crate::meta::MetadataService) or
//! [`BlockService`](crate::store::BlockService) in a [`RequestHandler`];
//! the client side implements the same traits again, so the sync engine
//! cannot tell a remote service from an in-process one.
//!
//! ```ignore
//! let listener = TcpListener::bind("127.0.0.1:8081").await?;
//! serve(listener, Arc::new(BlockHandler::new(store))).await?;
//! ```

pub mod client;
pub mod error;
pub mod messages;
pub mod server;

pub use client::{RemoteBlockClient, RemoteMetaClient, TcpBlockConnector};
pub use error::ProtocolError;
pub use messages::{BlockRequest, MetaRequest, Response, WireBlock, WireError};
pub use server::{serve, BlockHandler, MetaHandler, RequestHandler};

// vim: ts=4
