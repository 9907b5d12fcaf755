//! Message-framed sessions over WebSocket.
//!
//! A [`Session`] is one bidirectional connection carrying UTF-8 text
//! messages. The two directions are decoupled:
//!
//! - **Writes** go into an unbounded FIFO queue and return immediately. A
//!   dedicated writer task takes every pending message in one batch, writes
//!   them without holding any lock, and flushes once per batch.
//! - **Reads** are queued by the reader task to a per-session dispatcher on
//!   tokio's blocking pool, which hands each non-empty message to the
//!   installed read callback in arrival order. A callback that blocks stalls
//!   only its own session's reads, never the runtime's workers.
//!
//! Transport failures are logged and end the affected session; they are never
//! returned to whoever calls [`Session::write`] or [`Session::close`].

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, trace, warn};

/// Handler invoked once per received message, on the session's dispatcher thread.
pub type ReadCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Upper bound on messages taken from the queue per writer wakeup.
const WRITE_BATCH: usize = 64;

/// How long a closing session waits for the other half to wind down.
pub(crate) const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Which side initiated the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRole {
	/// Accepted by a [`SessionListener`](crate::SessionListener).
	Server,
	/// Opened with [`connect`](crate::connect).
	Client,
}

/// Session lifecycle. States only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
	Connecting,
	Open,
	Closing,
	Closed,
}

enum Outbound {
	Text(String),
	Close,
}

/// One message-framed network connection.
pub struct Session {
	id: u64,
	role: SessionRole,
	peer_addr: Option<SocketAddr>,
	state: watch::Sender<SessionState>,
	outbound: mpsc::UnboundedSender<Outbound>,
	on_read: RwLock<Option<ReadCallback>>,
}

impl Session {
	pub(crate) fn new(role: SessionRole, peer_addr: Option<SocketAddr>) -> (Arc<Self>, SessionDriver) {
		let (tx, rx) = mpsc::unbounded_channel();
		let (state, _) = watch::channel(SessionState::Connecting);
		let session = Arc::new(Self {
			id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
			role,
			peer_addr,
			state,
			outbound: tx,
			on_read: RwLock::new(None),
		});
		let driver = SessionDriver {
			session: Arc::clone(&session),
			outbound: rx,
		};
		(session, driver)
	}

	/// Process-unique session identifier.
	pub fn id(&self) -> u64 {
		self.id
	}

	pub fn role(&self) -> SessionRole {
		self.role
	}

	pub fn peer_addr(&self) -> Option<SocketAddr> {
		self.peer_addr
	}

	pub fn state(&self) -> SessionState {
		*self.state.borrow()
	}

	/// Returns `true` until [`close`](Self::close) is called or the connection drops.
	pub fn is_open(&self) -> bool {
		self.state() < SessionState::Closing
	}

	/// Queues a message for delivery and returns immediately.
	///
	/// Messages written on one session reach the wire in call order. Writes
	/// after [`close`](Self::close) are dropped.
	pub fn write(&self, message: impl Into<String>) {
		if !self.is_open() {
			trace!(target = "jsrt.transport", session = self.id, "write after close dropped");
			return;
		}
		if self.outbound.send(Outbound::Text(message.into())).is_err() {
			trace!(target = "jsrt.transport", session = self.id, "writer gone; message dropped");
		}
	}

	/// Installs the read callback, replacing any previous one.
	///
	/// The replacement applies to messages received after this call.
	pub fn set_on_read<F>(&self, callback: F)
	where
		F: Fn(String) + Send + Sync + 'static,
	{
		*self.on_read.write() = Some(Arc::new(callback));
	}

	/// Removes the read callback; received messages are dropped until a new one is set.
	pub fn clear_on_read(&self) {
		self.on_read.write().take();
	}

	/// Starts the close handshake.
	///
	/// Messages queued before this call are still written. Calling it again,
	/// or on a session that already failed, is a no-op.
	pub fn close(&self) {
		let started = self.state.send_if_modified(|state| {
			if *state < SessionState::Closing {
				*state = SessionState::Closing;
				true
			} else {
				false
			}
		});
		if started {
			debug!(target = "jsrt.transport", session = self.id, "closing session");
			let _ = self.outbound.send(Outbound::Close);
		}
	}

	/// Resolves once the session has fully shut down.
	pub async fn closed(&self) {
		let mut state = self.state.subscribe();
		let _ = state.wait_for(|s| *s == SessionState::Closed).await;
	}

	async fn read_loop<S>(
		&self,
		mut stream: SplitStream<WebSocketStream<S>>,
		inbound: mpsc::UnboundedSender<String>,
	) where
		S: AsyncRead + AsyncWrite + Unpin,
	{
		while let Some(frame) = stream.next().await {
			let text = match frame {
				Ok(Message::Text(text)) => text,
				Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
					Ok(text) => text,
					Err(_) => {
						warn!(
							target = "jsrt.transport",
							session = self.id,
							"dropping binary frame that is not UTF-8"
						);
						continue;
					}
				},
				Ok(Message::Close(frame)) => {
					debug!(target = "jsrt.transport", session = self.id, ?frame, "peer closed session");
					break;
				}
				Ok(_) => continue,
				Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => break,
				Err(err) => {
					warn!(target = "jsrt.transport", session = self.id, error = %err, "read failed");
					break;
				}
			};
			if inbound.send(text).is_err() {
				trace!(target = "jsrt.transport", session = self.id, "dispatcher gone; message dropped");
			}
		}
	}

	fn deliver(&self, text: String) {
		if text.is_empty() {
			trace!(target = "jsrt.transport", session = self.id, "discarding empty message");
			return;
		}
		// Clone out of the lock so the callback may replace itself.
		let callback = self.on_read.read().clone();
		match callback {
			Some(callback) => callback(text),
			None => trace!(target = "jsrt.transport", session = self.id, "no read callback; message dropped"),
		}
	}
}

impl fmt::Debug for Session {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Session")
			.field("id", &self.id)
			.field("role", &self.role)
			.field("peer_addr", &self.peer_addr)
			.field("state", &self.state())
			.finish()
	}
}

/// Owns the receiving end of a session's write queue until the session runs.
pub(crate) struct SessionDriver {
	session: Arc<Session>,
	outbound: mpsc::UnboundedReceiver<Outbound>,
}

impl SessionDriver {
	/// Pumps the connection until either direction ends, then marks the session closed.
	pub(crate) async fn run<S>(self, ws: WebSocketStream<S>)
	where
		S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
	{
		let SessionDriver { session, outbound } = self;
		session.state.send_if_modified(|state| {
			if *state == SessionState::Connecting {
				*state = SessionState::Open;
				true
			} else {
				false
			}
		});
		debug!(
			target = "jsrt.transport",
			session = session.id,
			role = ?session.role,
			peer = ?session.peer_addr,
			"session open"
		);

		let (sink, stream) = ws.split();
		let mut writer = tokio::spawn(write_loop(session.id, sink, outbound));
		let (inbound, dispatcher) = spawn_dispatcher(Arc::clone(&session));
		{
			let reader = session.read_loop(stream, inbound);
			tokio::pin!(reader);

			tokio::select! {
				() = &mut reader => {
					session.close();
					if tokio::time::timeout(CLOSE_TIMEOUT, &mut writer).await.is_err() {
						writer.abort();
					}
				}
				_ = &mut writer => {
					// Writer finished: either our close frame is out or the write side
					// failed. Keep reading briefly so the peer's close reply is consumed.
					session.close();
					let _ = tokio::time::timeout(CLOSE_TIMEOUT, reader).await;
				}
			}
		}

		// The reader is gone, so the dispatcher exits once its queue is drained.
		if tokio::time::timeout(CLOSE_TIMEOUT, dispatcher).await.is_err() {
			warn!(target = "jsrt.transport", session = session.id, "read callback still running after close");
		}
		session.state.send_replace(SessionState::Closed);
		session.clear_on_read();
		debug!(target = "jsrt.transport", session = session.id, "session closed");
	}
}

/// Runs read callbacks for one session on the blocking pool, one message at a time.
fn spawn_dispatcher(session: Arc<Session>) -> (mpsc::UnboundedSender<String>, JoinHandle<()>) {
	let (tx, mut rx) = mpsc::unbounded_channel();
	let handle = tokio::task::spawn_blocking(move || {
		while let Some(text) = rx.blocking_recv() {
			session.deliver(text);
		}
	});
	(tx, handle)
}

async fn write_loop<S>(
	session_id: u64,
	mut sink: SplitSink<WebSocketStream<S>, Message>,
	mut outbound: mpsc::UnboundedReceiver<Outbound>,
) where
	S: AsyncRead + AsyncWrite + Unpin,
{
	let mut batch = Vec::with_capacity(WRITE_BATCH);
	while outbound.recv_many(&mut batch, WRITE_BATCH).await > 0 {
		for item in batch.drain(..) {
			match item {
				Outbound::Text(text) => {
					if let Err(err) = sink.feed(Message::Text(text)).await {
						warn!(target = "jsrt.transport", session = session_id, error = %err, "write failed");
						return;
					}
				}
				Outbound::Close => {
					if let Err(err) = sink.close().await {
						debug!(target = "jsrt.transport", session = session_id, error = %err, "close handshake incomplete");
					}
					return;
				}
			}
		}
		if let Err(err) = sink.flush().await {
			warn!(target = "jsrt.transport", session = session_id, error = %err, "flush failed");
			return;
		}
	}
}
