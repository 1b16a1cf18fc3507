//! Transport error types
//!
//! Wire-level failures stay inside the transport; callers of the remote
//! clients only ever see them as `StoreError::Transport`.

use std::fmt;
use std::io;

use crate::error::StoreError;

/// Protocol error type
#[derive(Debug)]
pub enum ProtocolError {
	/// I/O error on the socket
	Io(io::Error),
	/// Malformed JSON message
	Json(String),
	/// Base64 decoding error
	Base64(String),
	/// Peer closed the connection
	Disconnected,
	/// No answer within the configured timeout
	Timeout,
}

impl ProtocolError {
	/// Fold into the store error seen by callers talking to `address`
	pub fn into_store_error(self, address: &str) -> StoreError {
		StoreError::transport(address, self)
	}
}

impl fmt::Display for ProtocolError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ProtocolError::Io(e) => write!(f, "I/O error: {}", e),
			ProtocolError::Json(msg) => write!(f, "JSON parse error: {}", msg),
			ProtocolError::Base64(msg) => write!(f, "Base64 decode error: {}", msg),
			ProtocolError::Disconnected => write!(f, "Connection closed by peer"),
			ProtocolError::Timeout => write!(f, "Timed out"),
		}
	}
}

impl std::error::Error for ProtocolError {}

impl From<io::Error> for ProtocolError {
	fn from(e: io::Error) -> Self {
		ProtocolError::Io(e)
	}
}

impl From<base64::DecodeError> for ProtocolError {
	fn from(e: base64::DecodeError) -> Self {
		ProtocolError::Base64(e.to_string())
	}
}

impl From<serde_json::Error> for ProtocolError {
	fn from(e: serde_json::Error) -> Self {
		ProtocolError::Json(e.to_string())
	}
}

impl From<tokio::time::error::Elapsed> for ProtocolError {
	fn from(_: tokio::time::error::Elapsed) -> Self {
		ProtocolError::Timeout
	}
}

// vim: ts=4
