//! jsrt - bytecode caching and remote debugging for embedded JavaScript engines
//!
//! jsrt wraps an engine in a [`DecoratedRuntime`] that keeps the engine's
//! evaluation contract while intercepting `evaluate_javascript`:
//!
//! - **[`PreparedScriptCache`]**: compiles a script once, stores the bytecode
//!   in a [`PreparedScriptStore`] and evaluates the stored bytecode afterwards.
//! - **[`DebugBridge`]**: evaluates under the engine's debugger and exposes
//!   that debugger to one remote client over WebSocket.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use jsrt::{MemoryScriptStore, ScriptRuntime, make_prepared_script_runtime};
//!
//! let runtime = make_prepared_script_runtime(engine, compiler, Some(Arc::new(MemoryScriptStore::new())));
//! runtime.evaluate_javascript(b"print(1)"[..].into(), "a.js")?;
//! ```
//!
//! The engine, its compiler and its native debugger are supplied by the
//! embedder through the traits in [`engine`].

pub mod config;
pub mod debug;
pub mod decorator;
pub mod engine;
pub mod error;
pub mod logging;
pub mod prepared;
pub mod store;

use std::sync::Arc;

pub use config::BridgeConfig;
pub use debug::{DebugBridge, ScriptRegistry};
pub use decorator::{DecoratedRuntime, Interceptor, Next, RuntimeBuilder};
pub use engine::{
	Buffer, BytecodeCompiler, DebugFlags, DebuggerConnection, RemoteConnection, RuntimeSignature, ScriptEngine,
	ScriptRuntime,
};
pub use error::{CompileError, Error, Result, StoreError};
pub use prepared::PreparedScriptCache;
pub use store::{MemoryScriptStore, PreparedScriptStore, ScriptSignature};

/// Builds a runtime that evaluates through a [`PreparedScriptCache`].
///
/// With `store` set to `None` every evaluation goes straight to the engine.
pub fn make_prepared_script_runtime<E: ScriptEngine>(
	engine: E,
	compiler: Arc<dyn BytecodeCompiler>,
	store: Option<Arc<dyn PreparedScriptStore>>,
) -> DecoratedRuntime<E> {
	RuntimeBuilder::new(engine)
		.with(PreparedScriptCache::new(compiler, store))
		.build()
}

/// Builds a runtime whose evaluations run under the debug bridge, configured
/// from the environment (see [`BridgeConfig::from_env`]).
pub fn make_debug_runtime<E: ScriptEngine>(engine: E) -> Result<DecoratedRuntime<E>> {
	let config = BridgeConfig::from_env()?;
	make_debug_runtime_with(engine, &config)
}

/// Builds a runtime whose evaluations run under a [`DebugBridge`] started with `config`.
///
/// The bridge lives as long as the returned runtime.
pub fn make_debug_runtime_with<E: ScriptEngine>(engine: E, config: &BridgeConfig) -> Result<DecoratedRuntime<E>> {
	let builder = RuntimeBuilder::new(engine);
	let bridge = DebugBridge::start(&**builder.engine(), config)?;
	Ok(builder.with(bridge).build())
}
