//! Client-initiated sessions.

use std::sync::Arc;

use tokio_tungstenite::MaybeTlsStream;
use tracing::debug;

use crate::error::{Error, Result};
use crate::transport::{Session, SessionRole};

/// Connects to a WebSocket endpoint such as `ws://127.0.0.1:8888/`.
///
/// `on_connected` runs after the handshake and before the first read. The
/// session is then driven on a spawned task, so this must be called from
/// within a tokio runtime.
///
/// # Errors
///
/// Returns [`Error::Connect`] if the address cannot be resolved, the TCP
/// connection fails, or the WebSocket handshake is rejected.
pub async fn connect<F>(url: &str, on_connected: F) -> Result<Arc<Session>>
where
	F: FnOnce(&Arc<Session>),
{
	let (ws, _response) = tokio_tungstenite::connect_async(url)
		.await
		.map_err(|source| Error::Connect {
			url: url.to_string(),
			source,
		})?;

	let peer = match ws.get_ref() {
		MaybeTlsStream::Plain(stream) => stream.peer_addr().ok(),
		_ => None,
	};
	debug!(target = "jsrt.transport", url, ?peer, "connected session");

	let (session, driver) = Session::new(SessionRole::Client, peer);
	on_connected(&session);
	tokio::spawn(driver.run(ws));
	Ok(session)
}
