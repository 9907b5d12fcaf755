//! Error types for jsrt.

use thiserror::Error;

/// Result type alias for jsrt operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to whoever builds or owns a decorated runtime.
///
/// Script evaluation never returns these: engine failures keep the engine's
/// own error type, and cache or debugger-session failures are logged.
#[derive(Debug, Error)]
pub enum Error {
	/// Listener bind or client connection failure.
	#[error(transparent)]
	Transport(#[from] jsrt_runtime::Error),

	/// A debugger frame could not be decoded or encoded.
	#[error(transparent)]
	Protocol(#[from] jsrt_protocol::ProtocolError),

	/// Invalid bridge configuration.
	#[error("Invalid configuration: {0}")]
	Config(String),

	/// The bridge worker thread or its runtime could not be started.
	#[error("Failed to start debug bridge worker: {0}")]
	Worker(#[source] std::io::Error),
}

/// Why the bytecode compiler produced no artifact.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
	/// The compiler does not handle this source; evaluate it as-is.
	#[error("bytecode compilation not supported for {url}")]
	Unsupported { url: String },

	/// The compiler ran and failed.
	#[error("failed to compile {url}: {message}")]
	Failed { url: String, message: String },
}

/// Failure reported by a prepared-script store.
#[derive(Debug, Error)]
pub enum StoreError {
	#[error("script store I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("script store unavailable: {0}")]
	Unavailable(String),
}
