//! Prepared-script storage.
//!
//! A store keeps compiled bytecode addressed by the script (URL plus version
//! tag) and the engine build that produced it. Tags passed alongside a lookup
//! or a write describe why the call is made; they are not part of the key.

use std::fmt;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::{Buffer, RuntimeSignature};
use crate::error::StoreError;

/// Purpose tag passed on every lookup made while preparing a script.
pub const PREPARE_TAG: &str = "perf";

/// Provenance tag recorded on every artifact written after a compile.
pub const PROVENANCE_TAG: &str = "jsrt.prepared";

/// Identity of a logical script.
///
/// There is no content hash: two different sources evaluated under the same
/// URL and version share one entry. Bump the version to invalidate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScriptSignature {
	pub url: String,
	pub version: u64,
}

impl ScriptSignature {
	pub fn new(url: impl Into<String>, version: u64) -> Self {
		Self {
			url: url.into(),
			version,
		}
	}
}

impl fmt::Display for ScriptSignature {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}@{}", self.url, self.version)
	}
}

/// Storage backend for compiled scripts.
pub trait PreparedScriptStore: Send + Sync {
	fn try_get_prepared_script(
		&self,
		script: &ScriptSignature,
		runtime: &RuntimeSignature,
		purpose: &str,
	) -> Result<Option<Buffer>, StoreError>;

	fn persist_prepared_script(
		&self,
		prepared: Buffer,
		script: &ScriptSignature,
		runtime: &RuntimeSignature,
		provenance: &str,
	) -> Result<(), StoreError>;
}

#[derive(Debug, Clone)]
struct StoredScript {
	bytes: Buffer,
	provenance: String,
}

/// Concurrent in-process store.
#[derive(Debug, Default)]
pub struct MemoryScriptStore {
	entries: DashMap<(ScriptSignature, RuntimeSignature), StoredScript>,
}

impl MemoryScriptStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Provenance tag of the stored entry, if any.
	pub fn provenance(&self, script: &ScriptSignature, runtime: &RuntimeSignature) -> Option<String> {
		self.entries
			.get(&(script.clone(), runtime.clone()))
			.map(|entry| entry.provenance.clone())
	}

	/// Drops every entry for `url`, across versions and engine builds.
	/// Returns how many entries were removed.
	pub fn invalidate(&self, url: &str) -> usize {
		let before = self.entries.len();
		self.entries.retain(|(script, _), _| script.url != url);
		let removed = before.saturating_sub(self.entries.len());
		debug!(target = "jsrt.cache", url, removed, "invalidated prepared scripts");
		removed
	}

	pub fn clear(&self) {
		self.entries.clear();
	}
}

impl PreparedScriptStore for MemoryScriptStore {
	fn try_get_prepared_script(
		&self,
		script: &ScriptSignature,
		runtime: &RuntimeSignature,
		_purpose: &str,
	) -> Result<Option<Buffer>, StoreError> {
		Ok(self
			.entries
			.get(&(script.clone(), runtime.clone()))
			.map(|entry| entry.bytes.clone()))
	}

	fn persist_prepared_script(
		&self,
		prepared: Buffer,
		script: &ScriptSignature,
		runtime: &RuntimeSignature,
		provenance: &str,
	) -> Result<(), StoreError> {
		self.entries.insert(
			(script.clone(), runtime.clone()),
			StoredScript {
				bytes: prepared,
				provenance: provenance.to_string(),
			},
		);
		Ok(())
	}
}
