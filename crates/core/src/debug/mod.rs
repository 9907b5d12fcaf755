//! Remote debugging bridge.
//!
//! Exposes the engine's native debugger connection to one external debugger
//! client over a WebSocket session:
//!
//! ```text
//! client ──ws──► Session ──► route ──┬─► getScriptSource: answered from ScriptRegistry
//!                                    └─► everything else: DebuggerConnection::send_message
//!
//! DebuggerConnection ──► RemoteConnectionAdapter ──► Session ──ws──► client
//!                         (records scriptParsed)
//! ```
//!
//! The accept loop runs on a dedicated worker thread with its own tokio
//! runtime, so the bridge works the same whether or not the embedding
//! application runs async code. A newer client replaces the current one; when
//! a client goes away the native connection is detached until the next one
//! arrives.

mod adapter;
mod registry;

use std::fmt;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::thread::JoinHandle;

use jsrt_protocol::{ClientCommand, SOURCE_UNAVAILABLE, script_source_response};
use jsrt_runtime::{Session, SessionListener};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use self::adapter::RemoteConnectionAdapter;
pub use self::registry::ScriptRegistry;
use crate::config::BridgeConfig;
use crate::decorator::{Interceptor, Next};
use crate::engine::{Buffer, DebugFlags, DebuggerConnection, ScriptEngine};
use crate::error::{Error, Result};

/// Interceptor routing evaluation through the engine's debugger, plus the
/// network endpoint a debugger client attaches to.
pub struct DebugBridge {
	shared: Arc<BridgeShared>,
	local_addr: SocketAddr,
	shutdown_tx: watch::Sender<bool>,
	worker: Mutex<Option<JoinHandle<()>>>,
}

struct BridgeShared {
	connection: Arc<dyn DebuggerConnection>,
	registry: Arc<ScriptRegistry>,
	/// The attached client. The lock is also held while the native
	/// connection is attached or detached, so those calls never interleave.
	client: Mutex<ClientSlot>,
}

#[derive(Default)]
struct ClientSlot {
	session: Option<Arc<Session>>,
	/// Set once the bridge shuts down; later clients are turned away.
	closed: bool,
}

impl DebugBridge {
	/// Binds the listener, opens the native debugger connection and starts
	/// accepting clients.
	///
	/// # Errors
	///
	/// Bind failures and worker start-up failures are returned; the engine is
	/// left untouched in that case.
	pub fn start<E: ScriptEngine>(engine: &E, config: &BridgeConfig) -> Result<Self> {
		let addr = config.bind_addr();
		let listener = TcpListener::bind(&addr).map_err(|source| jsrt_runtime::Error::Bind {
			addr: addr.clone(),
			source,
		})?;
		let local_addr = listener.local_addr().map_err(jsrt_runtime::Error::Io)?;

		let runtime = tokio::runtime::Builder::new_multi_thread()
			.worker_threads(1)
			.thread_name("jsrt-debug-io")
			.enable_all()
			.build()
			.map_err(Error::Worker)?;

		engine.set_pause_on_load(config.pause_on_load);
		let shared = Arc::new(BridgeShared {
			connection: engine.connect_debugger(),
			registry: Arc::new(ScriptRegistry::new()),
			client: Mutex::new(ClientSlot::default()),
		});

		let (shutdown_tx, shutdown_rx) = watch::channel(false);
		let worker_shared = Arc::downgrade(&shared);
		let shutdown_timeout = config.shutdown_timeout();
		let worker = std::thread::Builder::new()
			.name("jsrt-debug-bridge".into())
			.spawn(move || {
				runtime.block_on(async move {
					let listener = match SessionListener::from_std(listener) {
						Ok(listener) => listener,
						Err(err) => {
							warn!(target = "jsrt.debug", error = %err, "debug listener unusable");
							return;
						}
					};
					let on_connected = move |session: Arc<Session>| {
						if let Some(shared) = worker_shared.upgrade() {
							BridgeShared::attach(&shared, session);
						} else {
							session.close();
						}
					};
					if let Err(err) = listener.run(on_connected, shutdown_rx).await {
						warn!(target = "jsrt.debug", error = %err, "debug listener stopped");
					}
				});
				runtime.shutdown_timeout(shutdown_timeout);
			})
			.map_err(Error::Worker)?;

		info!(target = "jsrt.debug", addr = %local_addr, pause_on_load = config.pause_on_load, "debug bridge listening");
		Ok(Self {
			shared,
			local_addr,
			shutdown_tx,
			worker: Mutex::new(Some(worker)),
		})
	}

	/// The address clients connect to. Differs from the configured one when
	/// port `0` was requested.
	pub fn local_addr(&self) -> SocketAddr {
		self.local_addr
	}

	pub fn registry(&self) -> &ScriptRegistry {
		&self.shared.registry
	}

	pub fn has_client(&self) -> bool {
		self.shared.client.lock().session.is_some()
	}

	/// Stops accepting, closes the client, detaches the native connection and
	/// joins the worker. Later calls do nothing.
	pub fn shutdown(&self) {
		let Some(worker) = self.worker.lock().take() else {
			return;
		};
		let _ = self.shutdown_tx.send(true);
		self.shared.close();

		if worker.thread().id() == std::thread::current().id() {
			// Called from a callback on the worker itself; it exits on its own.
			return;
		}
		if worker.join().is_err() {
			warn!(target = "jsrt.debug", "debug bridge worker panicked");
		}
		info!(target = "jsrt.debug", addr = %self.local_addr, "debug bridge stopped");
	}
}

impl Drop for DebugBridge {
	fn drop(&mut self) {
		self.shutdown();
	}
}

impl fmt::Debug for DebugBridge {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("DebugBridge")
			.field("local_addr", &self.local_addr)
			.field("has_client", &self.has_client())
			.finish_non_exhaustive()
	}
}

impl BridgeShared {
	fn attach(shared: &Arc<Self>, session: Arc<Session>) {
		let mut client = shared.client.lock();
		if client.closed {
			debug!(target = "jsrt.debug", session = session.id(), "bridge is shut down; rejecting client");
			session.close();
			return;
		}
		if let Some(previous) = client.session.replace(Arc::clone(&session)) {
			info!(
				target = "jsrt.debug",
				previous = previous.id(),
				session = session.id(),
				"new debugger client replaces current one"
			);
			previous.close();
			shared.connection.disconnect();
		}

		let adapter = RemoteConnectionAdapter::new(Arc::clone(&session), Arc::clone(&shared.registry));
		if !shared.connection.connect(Box::new(adapter)) {
			warn!(target = "jsrt.debug", session = session.id(), "native debugger refused the connection");
			client.session.take();
			session.close();
			return;
		}
		drop(client);

		let weak_shared = Arc::downgrade(shared);
		let weak_session = Arc::downgrade(&session);
		session.set_on_read(move |text| {
			let (Some(shared), Some(session)) = (weak_shared.upgrade(), weak_session.upgrade()) else {
				return;
			};
			shared.route(&text, |reply| session.write(reply));
		});

		let weak_shared = Arc::downgrade(shared);
		tokio::spawn(async move {
			session.closed().await;
			if let Some(shared) = weak_shared.upgrade() {
				shared.detach(session.id());
			}
		});
	}

	/// Closes the current client, detaches the native connection and refuses
	/// any client that attaches afterwards.
	fn close(&self) {
		let mut client = self.client.lock();
		client.closed = true;
		if let Some(session) = client.session.take() {
			session.close();
		}
		self.connection.disconnect();
	}

	/// Forgets the client if it is still the current one.
	fn detach(&self, session_id: u64) {
		let mut client = self.client.lock();
		if client.session.as_ref().is_some_and(|s| s.id() == session_id) {
			client.session.take();
			self.connection.disconnect();
			info!(target = "jsrt.debug", session = session_id, "debugger client disconnected");
		}
	}

	/// Handles one client frame. `reply` sends a frame back to that client.
	fn route(&self, text: &str, reply: impl FnOnce(String)) {
		match ClientCommand::parse(text) {
			Ok(ClientCommand::GetScriptSource { id, script_id }) => {
				let source = self.registry.source_for(script_id);
				if source.is_none() {
					debug!(target = "jsrt.debug", %script_id, "no source recorded for script");
				}
				let source = source.as_deref().unwrap_or(SOURCE_UNAVAILABLE);
				match script_source_response(id, source) {
					Ok(frame) => reply(frame),
					Err(err) => warn!(target = "jsrt.debug", %script_id, error = %err, "failed to encode script source"),
				}
			}
			Ok(ClientCommand::Forward { method }) => {
				trace!(target = "jsrt.debug", %method, "forwarding to native debugger");
				self.connection.send_message(text.to_string());
			}
			Err(err) => {
				warn!(target = "jsrt.debug", error = %err, "dropping malformed debugger message");
			}
		}
	}
}

impl<E: ScriptEngine> Interceptor<E> for DebugBridge {
	/// Hands source to the engine's debug-mode evaluation and returns
	/// `undefined`; the script's own result is only visible to the debugger.
	fn evaluate_javascript(
		&self,
		source: Buffer,
		source_url: &str,
		next: Next<'_, E>,
	) -> std::result::Result<E::Value, E::Error> {
		let engine = next.engine();
		if engine.is_bytecode(&source) {
			debug!(target = "jsrt.debug", url = source_url, "bytecode cannot be source-debugged; passing through");
			return next.run(source, source_url);
		}

		let text = String::from_utf8_lossy(&source);
		self.shared.registry.record_source(source_url, &*text);
		engine.debug_evaluate(&text, source_url, DebugFlags::default())?;
		Ok(engine.undefined())
	}
}
