//! Script id → URL → source lookup for the debug bridge.
//!
//! Both tables sit behind one lock so a lookup never observes a half-applied
//! update. Entries are never removed while the bridge lives; a second source
//! recorded for the same URL replaces the first.

use std::collections::HashMap;
use std::sync::Arc;

use jsrt_protocol::ScriptId;
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct Tables {
	urls: HashMap<ScriptId, String>,
	sources: HashMap<String, Arc<str>>,
}

#[derive(Debug, Default)]
pub struct ScriptRegistry {
	tables: Mutex<Tables>,
}

impl ScriptRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Records the URL the native debugger reported for `id`.
	pub fn record_script(&self, id: ScriptId, url: impl Into<String>) {
		self.tables.lock().urls.insert(id, url.into());
	}

	/// Records the source text handed to the engine for `url`.
	pub fn record_source(&self, url: impl Into<String>, source: impl Into<Arc<str>>) {
		self.tables.lock().sources.insert(url.into(), source.into());
	}

	pub fn url_for(&self, id: ScriptId) -> Option<String> {
		self.tables.lock().urls.get(&id).cloned()
	}

	/// Resolves `id` to its URL and then to the recorded source.
	pub fn source_for(&self, id: ScriptId) -> Option<Arc<str>> {
		let tables = self.tables.lock();
		let url = tables.urls.get(&id)?;
		tables.sources.get(url).cloned()
	}
}
