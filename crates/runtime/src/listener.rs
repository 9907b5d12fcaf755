//! Accept loop for server-side sessions.

use std::io;
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::transport::{CLOSE_TIMEOUT, Session, SessionRole};

/// Pause after a failed `accept`, so persistent errors such as descriptor
/// exhaustion do not turn the loop into a busy spin.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Listens on one port and turns every accepted WebSocket connection into a [`Session`].
#[derive(Debug)]
pub struct SessionListener {
	listener: TcpListener,
	local_addr: SocketAddr,
}

impl SessionListener {
	/// Binds the listening socket.
	///
	/// # Errors
	///
	/// Returns [`Error::Bind`] if the address cannot be bound.
	pub async fn bind<A: ToSocketAddrs + std::fmt::Debug>(addr: A) -> Result<Self> {
		let label = format!("{addr:?}");
		let listener = TcpListener::bind(addr).await.map_err(|source| Error::Bind {
			addr: label.clone(),
			source,
		})?;
		Self::from_tokio(listener, label)
	}

	/// Adopts a socket bound synchronously, for owners that must learn about
	/// bind failures before any async runtime is running.
	///
	/// Must be called from within a tokio runtime.
	pub fn from_std(listener: StdTcpListener) -> Result<Self> {
		let label = listener
			.local_addr()
			.map(|addr| addr.to_string())
			.unwrap_or_else(|_| "<unbound>".to_string());
		let bind_err = |source| Error::Bind {
			addr: label.clone(),
			source,
		};
		listener.set_nonblocking(true).map_err(bind_err)?;
		let listener = TcpListener::from_std(listener).map_err(bind_err)?;
		Self::from_tokio(listener, label)
	}

	fn from_tokio(listener: TcpListener, label: String) -> Result<Self> {
		let local_addr = listener
			.local_addr()
			.map_err(|source| Error::Bind { addr: label, source })?;
		Ok(Self {
			listener,
			local_addr,
		})
	}

	pub fn local_addr(&self) -> SocketAddr {
		self.local_addr
	}

	/// Accepts connections until `shutdown` flips to `true` or its sender is dropped.
	///
	/// `on_connected` runs after the WebSocket handshake and before the first
	/// read, so a read callback installed there sees every message. A failed
	/// handshake or a broken connection only ends that connection.
	pub async fn run<F>(self, on_connected: F, mut shutdown: watch::Receiver<bool>) -> Result<()>
	where
		F: Fn(Arc<Session>) + Send + Sync + 'static,
	{
		let on_connected = Arc::new(on_connected);
		let mut connections = JoinSet::new();
		let mut live: Vec<Weak<Session>> = Vec::new();

		info!(target = "jsrt.transport", addr = %self.local_addr, "session listener running");

		loop {
			if *shutdown.borrow() {
				break;
			}
			tokio::select! {
				changed = shutdown.changed() => {
					if changed.is_err() || *shutdown.borrow() {
						break;
					}
				}
				Some(_) = connections.join_next(), if !connections.is_empty() => {}
				accepted = self.listener.accept() => {
					let (stream, peer) = match accepted {
						Ok(conn) => conn,
						Err(err) => {
							pause_after_accept_error(&err).await;
							continue;
						}
					};
					let (session, driver) = Session::new(SessionRole::Server, Some(peer));
					live.retain(|s| s.strong_count() > 0);
					live.push(Arc::downgrade(&session));
					let on_connected = Arc::clone(&on_connected);
					connections.spawn(async move {
						let ws = match handshake(stream, peer).await {
							Some(ws) => ws,
							None => return,
						};
						on_connected(session);
						driver.run(ws).await;
					});
				}
			}
		}

		info!(target = "jsrt.transport", addr = %self.local_addr, "session listener stopping");
		for session in live.iter().filter_map(Weak::upgrade) {
			session.close();
		}
		let drained = tokio::time::timeout(CLOSE_TIMEOUT, async {
			while connections.join_next().await.is_some() {}
		})
		.await;
		if drained.is_err() {
			warn!(target = "jsrt.transport", "sessions did not close in time; aborting");
			connections.shutdown().await;
		}
		Ok(())
	}
}

async fn pause_after_accept_error(err: &io::Error) {
	warn!(
		target = "jsrt.transport",
		error = %err,
		retry_in_ms = ACCEPT_RETRY_DELAY.as_millis() as u64,
		"accept failed"
	);
	tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
}

async fn handshake(
	stream: TcpStream,
	peer: SocketAddr,
) -> Option<tokio_tungstenite::WebSocketStream<TcpStream>> {
	match tokio_tungstenite::accept_async(stream).await {
		Ok(ws) => {
			debug!(target = "jsrt.transport", %peer, "accepted session");
			Some(ws)
		}
		Err(err) => {
			warn!(target = "jsrt.transport", %peer, error = %err, "handshake failed");
			None
		}
	}
}

/// Binds `addr` and accepts sessions for as long as the returned future runs.
///
/// # Errors
///
/// Returns [`Error::Bind`] if the address cannot be bound.
pub async fn listen<A, F>(addr: A, on_connected: F) -> Result<()>
where
	A: ToSocketAddrs + std::fmt::Debug,
	F: Fn(Arc<Session>) + Send + Sync + 'static,
{
	let listener = SessionListener::bind(addr).await?;
	// The sender lives as long as this future, so the loop never sees a shutdown.
	let (_shutdown_tx, shutdown_rx) = watch::channel(false);
	listener.run(on_connected, shutdown_rx).await
}
