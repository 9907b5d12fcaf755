//! Compile-once evaluation backed by a [`PreparedScriptStore`].
//!
//! Per evaluation:
//!
//! 1. No store configured, or the input already is bytecode: pass it on.
//! 2. Look the script up under (URL + version, engine build).
//! 3. Hit with valid bytecode: evaluate the stored artifact.
//! 4. Miss, stale artifact or failed lookup: compile. A non-empty artifact is
//!    persisted and evaluated; otherwise the raw source is evaluated.
//!
//! Nothing is locked across evaluations. Two concurrent misses for the same
//! script may both compile and persist; the last write wins.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::decorator::{Interceptor, Next};
use crate::engine::{Buffer, BytecodeCompiler, RuntimeSignature, ScriptEngine};
use crate::error::CompileError;
use crate::store::{PREPARE_TAG, PROVENANCE_TAG, PreparedScriptStore, ScriptSignature};

/// Version tag used for [`ScriptSignature`]s unless overridden.
pub const DEFAULT_SCRIPT_VERSION: u64 = 1;

/// Interceptor turning source evaluation into compile, cache and reuse.
pub struct PreparedScriptCache {
	compiler: Arc<dyn BytecodeCompiler>,
	store: Option<Arc<dyn PreparedScriptStore>>,
	script_version: u64,
}

impl PreparedScriptCache {
	/// Without a store every evaluation goes straight to the engine.
	pub fn new(compiler: Arc<dyn BytecodeCompiler>, store: Option<Arc<dyn PreparedScriptStore>>) -> Self {
		Self {
			compiler,
			store,
			script_version: DEFAULT_SCRIPT_VERSION,
		}
	}

	/// Sets the version half of every [`ScriptSignature`]. Changing it orphans
	/// everything stored under the previous version.
	pub fn with_script_version(mut self, version: u64) -> Self {
		self.script_version = version;
		self
	}

	pub fn script_version(&self) -> u64 {
		self.script_version
	}

	fn lookup(
		&self,
		store: &dyn PreparedScriptStore,
		script: &ScriptSignature,
		runtime: &RuntimeSignature,
	) -> Option<Buffer> {
		match store.try_get_prepared_script(script, runtime, PREPARE_TAG) {
			Ok(found) => found,
			Err(err) => {
				warn!(target = "jsrt.cache", %script, error = %err, "prepared script lookup failed");
				None
			}
		}
	}

	fn compile(&self, source: &[u8], source_url: &str) -> Option<Buffer> {
		let Ok(text) = std::str::from_utf8(source) else {
			debug!(target = "jsrt.cache", url = source_url, "source is not UTF-8; not compiling");
			return None;
		};
		match self.compiler.compile(text, source_url) {
			Ok(bytecode) if !bytecode.is_empty() => Some(bytecode.into()),
			Ok(_) | Err(CompileError::Unsupported { .. }) => {
				debug!(target = "jsrt.cache", url = source_url, "compiler produced no bytecode");
				None
			}
			Err(err) => {
				warn!(target = "jsrt.cache", url = source_url, error = %err, "bytecode compilation failed");
				None
			}
		}
	}
}

impl<E: ScriptEngine> Interceptor<E> for PreparedScriptCache {
	fn evaluate_javascript(
		&self,
		source: Buffer,
		source_url: &str,
		next: Next<'_, E>,
	) -> Result<E::Value, E::Error> {
		let engine = next.engine();
		let Some(store) = self.store.as_deref() else {
			return next.run(source, source_url);
		};
		if engine.is_bytecode(&source) {
			return next.run(source, source_url);
		}

		let script = ScriptSignature::new(source_url, self.script_version);
		let runtime = engine.runtime_signature();

		if let Some(cached) = self.lookup(store, &script, &runtime) {
			if engine.is_bytecode(&cached) {
				trace!(target = "jsrt.cache", %script, %runtime, "prepared script hit");
				return next.run(cached, source_url);
			}
			debug!(target = "jsrt.cache", %script, %runtime, "stored artifact is not valid bytecode; recompiling");
		}

		let Some(bytecode) = self.compile(&source, source_url) else {
			return next.run(source, source_url);
		};
		match store.persist_prepared_script(bytecode.clone(), &script, &runtime, PROVENANCE_TAG) {
			Ok(()) => debug!(target = "jsrt.cache", %script, %runtime, bytes = bytecode.len(), "persisted prepared script"),
			Err(err) => warn!(target = "jsrt.cache", %script, error = %err, "failed to persist prepared script"),
		}
		next.run(bytecode, source_url)
	}
}

impl fmt::Debug for PreparedScriptCache {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PreparedScriptCache")
			.field("has_store", &self.store.is_some())
			.field("script_version", &self.script_version)
			.finish()
	}
}
