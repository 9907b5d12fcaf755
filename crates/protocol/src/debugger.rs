//! The debugger methods the bridge understands.
//!
//! Only two messages are interpreted: the client's script-source fetch, which
//! the bridge answers itself, and the native debugger's script-parsed
//! notification, which tells the bridge which script id belongs to which URL.
//! Every other method is opaque and travels as the original text.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::message::{Envelope, ProtocolError, RequestId, Response, Result};

/// Client request asking for the source text of a parsed script.
pub const GET_SCRIPT_SOURCE: &str = "Debugger.getScriptSource";

/// Native debugger notification announcing a newly parsed script.
pub const SCRIPT_PARSED: &str = "Debugger.scriptParsed";

/// `scriptSource` returned when no source is known for a script id.
pub const SOURCE_UNAVAILABLE: &str = "<source unavailable>";

/// Default port the debug bridge listens on.
pub const DEFAULT_DEBUG_PORT: u16 = 8888;

/// Default interface the debug bridge listens on.
pub const DEFAULT_DEBUG_HOST: &str = "127.0.0.1";

/// Engine-assigned script identifier.
///
/// On the wire it is a string-encoded integer (`"7"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScriptId(pub u32);

impl fmt::Display for ScriptId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for ScriptId {
	type Err = ProtocolError;

	fn from_str(s: &str) -> Result<Self> {
		s.parse()
			.map(ScriptId)
			.map_err(|e| ProtocolError::InvalidField {
				field: "scriptId",
				reason: format!("{s:?}: {e}"),
			})
	}
}

impl Serialize for ScriptId {
	fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
		serializer.collect_str(self)
	}
}

impl<'de> Deserialize<'de> for ScriptId {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
		let text = String::deserialize(deserializer)?;
		text.parse().map_err(serde::de::Error::custom)
	}
}

/// `params` of [`SCRIPT_PARSED`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptParsedParams {
	pub script_id: ScriptId,
	pub url: String,
}

/// `params` of [`GET_SCRIPT_SOURCE`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetScriptSourceParams {
	pub script_id: ScriptId,
}

/// `result` of [`GET_SCRIPT_SOURCE`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptSourceResult {
	pub script_source: String,
}

/// Builds the text frame answering a script-source fetch.
pub fn script_source_response(id: RequestId, script_source: impl Into<String>) -> Result<String> {
	Response::new(
		id,
		ScriptSourceResult {
			script_source: script_source.into(),
		},
	)
	.to_text()
}

/// Classification of a frame sent by the debugger client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
	/// Answered locally from the bridge's lookup tables.
	GetScriptSource { id: RequestId, script_id: ScriptId },
	/// Forwarded to the native debugger unchanged.
	Forward { method: String },
}

impl ClientCommand {
	/// Classifies a client frame.
	///
	/// A frame without `method` is rejected. A script-source fetch must also
	/// carry `id` and a valid `params.scriptId`.
	pub fn parse(text: &str) -> Result<Self> {
		let envelope = Envelope::parse(text)?;
		let method = envelope.method()?;
		if method != GET_SCRIPT_SOURCE {
			return Ok(ClientCommand::Forward {
				method: method.to_string(),
			});
		}

		let id = envelope.id()?.clone();
		let params: GetScriptSourceParams = envelope.params()?;
		Ok(ClientCommand::GetScriptSource {
			id,
			script_id: params.script_id,
		})
	}
}

/// Classification of a frame emitted by the native debugger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebuggerEvent {
	ScriptParsed(ScriptParsedParams),
	/// Responses and every other notification.
	Other,
}

impl DebuggerEvent {
	pub fn parse(text: &str) -> Result<Self> {
		let envelope = Envelope::parse(text)?;
		match envelope.method.as_deref() {
			Some(SCRIPT_PARSED) => Ok(DebuggerEvent::ScriptParsed(envelope.params()?)),
			_ => Ok(DebuggerEvent::Other),
		}
	}
}
