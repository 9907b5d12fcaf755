use std::sync::Arc;

use jsrt_protocol::DebuggerEvent;
use jsrt_runtime::Session;
use tracing::{debug, trace};

use super::registry::ScriptRegistry;
use crate::engine::RemoteConnection;

/// Carries native debugger output to one client session.
///
/// Every message is written through unchanged. Script-parsed notifications
/// are also recorded so later source fetches can be answered locally.
pub(crate) struct RemoteConnectionAdapter {
	session: Arc<Session>,
	registry: Arc<ScriptRegistry>,
}

impl RemoteConnectionAdapter {
	pub(crate) fn new(session: Arc<Session>, registry: Arc<ScriptRegistry>) -> Self {
		Self { session, registry }
	}
}

impl RemoteConnection for RemoteConnectionAdapter {
	fn on_message(&self, message: String) {
		match DebuggerEvent::parse(&message) {
			Ok(DebuggerEvent::ScriptParsed(params)) => {
				trace!(target = "jsrt.debug", script_id = %params.script_id, url = %params.url, "script parsed");
				self.registry.record_script(params.script_id, params.url);
			}
			Ok(DebuggerEvent::Other) => {}
			Err(err) => {
				debug!(target = "jsrt.debug", session = self.session.id(), error = %err, "uninterpreted debugger message");
			}
		}
		self.session.write(message);
	}

	fn on_disconnect(&self) {
		debug!(target = "jsrt.debug", session = self.session.id(), "native debugger detached");
		self.session.close();
	}
}
