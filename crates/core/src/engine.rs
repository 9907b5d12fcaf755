//! Contracts between the decorators and the embedded engine.
//!
//! The engine, its bytecode compiler and its native debugger are external
//! collaborators. jsrt only ever talks to them through these traits.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::CompileError;

/// Immutable script bytes: UTF-8 source or compiled bytecode.
pub type Buffer = Arc<[u8]>;

/// Identity of an engine build; cached bytecode is only valid for the build
/// that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuntimeSignature {
	pub runtime: String,
	pub version: u32,
}

impl RuntimeSignature {
	pub fn new(runtime: impl Into<String>, version: u32) -> Self {
		Self {
			runtime: runtime.into(),
			version,
		}
	}
}

impl fmt::Display for RuntimeSignature {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}", self.runtime, self.version)
	}
}

/// Evaluates scripts. Implemented by engines and by [`DecoratedRuntime`](crate::DecoratedRuntime).
pub trait ScriptRuntime: Send + Sync {
	type Value;
	type Error;

	/// Evaluates `source` (UTF-8 text or compiled bytecode) attributed to `source_url`.
	fn evaluate_javascript(&self, source: Buffer, source_url: &str) -> Result<Self::Value, Self::Error>;
}

/// Options for debug-mode evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebugFlags {
	/// Evaluate lazily compiled functions eagerly so breakpoints bind.
	pub eager: bool,
}

/// The full engine surface the decorators rely on.
pub trait ScriptEngine: ScriptRuntime + 'static {
	/// Engine name and bytecode version of this build.
	fn runtime_signature(&self) -> RuntimeSignature;

	/// Sniffs the bytecode magic header.
	fn is_bytecode(&self, bytes: &[u8]) -> bool;

	/// The value returned when an evaluation has no result of its own.
	fn undefined(&self) -> Self::Value;

	/// Queues `source` for evaluation under the attached debugger.
	///
	/// Returns once the script is handed to the engine; execution may be
	/// paused waiting for the debugger client.
	fn debug_evaluate(&self, source: &str, source_url: &str, flags: DebugFlags) -> Result<(), Self::Error>;

	/// Pause before the first statement of every newly loaded script.
	fn set_pause_on_load(&self, pause: bool);

	/// Opens the engine's native debugger protocol endpoint.
	fn connect_debugger(&self) -> Arc<dyn DebuggerConnection>;
}

/// Turns source text into engine bytecode.
pub trait BytecodeCompiler: Send + Sync {
	/// An empty `Ok` is treated the same as [`CompileError::Unsupported`].
	fn compile(&self, source: &str, source_url: &str) -> Result<Vec<u8>, CompileError>;
}

/// Native debugger endpoint inside the engine.
pub trait DebuggerConnection: Send + Sync {
	/// Attaches the remote side. Returns `false` if the engine refused it.
	fn connect(&self, remote: Box<dyn RemoteConnection>) -> bool;

	/// Detaches the current remote side, if any.
	fn disconnect(&self);

	/// Delivers one protocol message from the debugger client.
	fn send_message(&self, message: String);
}

/// Receives what the native debugger emits.
pub trait RemoteConnection: Send + Sync {
	fn on_message(&self, message: String);
	fn on_disconnect(&self);
}
