//! Error types for the session transport.

use thiserror::Error;

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to the owner of a listener or client session.
///
/// Failures on an already-established session never reach callers; they are
/// logged and terminate that session only.
#[derive(Debug, Error)]
pub enum Error {
	/// The listening socket could not be bound or configured.
	#[error("Failed to bind session listener to {addr}: {source}")]
	Bind {
		addr: String,
		#[source]
		source: std::io::Error,
	},

	/// Client connection or WebSocket handshake failed.
	#[error("Failed to connect to {url}: {source}")]
	Connect {
		url: String,
		#[source]
		source: tokio_tungstenite::tungstenite::Error,
	},

	/// I/O error.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}
