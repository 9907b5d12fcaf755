//! Message envelope shared by every frame on a debugging session.
//!
//! Frames are UTF-8 JSON objects. Requests carry `id`, `method` and `params`,
//! notifications carry `method` and `params`, responses carry `id` and
//! `result`. Decoding fails closed: anything that is not a JSON object is a
//! [`ProtocolError`], and the accessors report absent fields as errors rather
//! than handing back defaults.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Result type alias for wire decoding.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// A frame that could not be interpreted.
#[derive(Debug, Error)]
pub enum ProtocolError {
	/// The frame is not a JSON object of the expected shape.
	#[error("invalid JSON frame: {0}")]
	Json(#[from] serde_json::Error),

	/// A field required by the message kind is absent.
	#[error("message has no `{0}` field")]
	MissingField(&'static str),

	/// A field is present but does not decode.
	#[error("invalid `{field}`: {reason}")]
	InvalidField { field: &'static str, reason: String },
}

/// Request identifier, echoed verbatim in the matching response.
///
/// Any JSON value is accepted. Peers mostly send integers or strings, but the
/// id is opaque here and must round-trip unchanged, including unsigned 64-bit,
/// fractional and structured ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub Value);

impl RequestId {
	pub fn as_value(&self) -> &Value {
		&self.0
	}
}

impl fmt::Display for RequestId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.0 {
			Value::String(s) => f.write_str(s),
			other => write!(f, "{other}"),
		}
	}
}

impl From<i64> for RequestId {
	fn from(id: i64) -> Self {
		RequestId(Value::from(id))
	}
}

impl From<&str> for RequestId {
	fn from(id: &str) -> Self {
		RequestId(Value::from(id))
	}
}

impl From<String> for RequestId {
	fn from(id: String) -> Self {
		RequestId(Value::String(id))
	}
}

/// The envelope every frame is decoded into before dispatch.
///
/// Unknown top-level fields (`result`, `error`, `sessionId`, ...) are ignored
/// here; frames that are only inspected are forwarded as the original text,
/// never re-encoded from this struct.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<RequestId>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub method: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub params: Option<Value>,
}

impl Envelope {
	/// Decodes a text frame.
	pub fn parse(text: &str) -> Result<Self> {
		Ok(serde_json::from_str(text)?)
	}

	pub fn method(&self) -> Result<&str> {
		self.method
			.as_deref()
			.ok_or(ProtocolError::MissingField("method"))
	}

	pub fn id(&self) -> Result<&RequestId> {
		self.id.as_ref().ok_or(ProtocolError::MissingField("id"))
	}

	/// Decodes `params` into a typed parameter struct.
	pub fn params<'a, T: Deserialize<'a>>(&'a self) -> Result<T> {
		let params = self
			.params
			.as_ref()
			.ok_or(ProtocolError::MissingField("params"))?;
		T::deserialize(params).map_err(|e| ProtocolError::InvalidField {
			field: "params",
			reason: e.to_string(),
		})
	}
}

/// Successful response frame: `{"id": ..., "result": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response<T> {
	pub id: RequestId,
	pub result: T,
}

impl<T: Serialize> Response<T> {
	pub fn new(id: RequestId, result: T) -> Self {
		Self { id, result }
	}

	/// Encodes the response as a text frame.
	pub fn to_text(&self) -> Result<String> {
		Ok(serde_json::to_string(self)?)
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn parses_request_envelope() {
		let env = Envelope::parse(r#"{"id": 3, "method": "Debugger.enable", "params": {}}"#).unwrap();
		assert_eq!(env.id().unwrap(), &RequestId::from(3));
		assert_eq!(env.method().unwrap(), "Debugger.enable");
		assert_eq!(env.params, Some(json!({})));
	}

	#[test]
	fn string_ids_are_preserved() {
		let env = Envelope::parse(r#"{"id": "req-9", "method": "Runtime.enable"}"#).unwrap();
		assert_eq!(env.id().unwrap(), &RequestId::from("req-9"));
		assert_eq!(env.id().unwrap().to_string(), "req-9");
	}

	#[test]
	fn ids_outside_i64_are_kept_exactly() {
		for (frame, expected) in [
			(r#"{"id": 18446744073709551615, "method": "Debugger.resume"}"#, json!(u64::MAX)),
			(r#"{"id": 1.5, "method": "Debugger.resume"}"#, json!(1.5)),
			(r#"{"id": {"n": 1}, "method": "Debugger.resume"}"#, json!({"n": 1})),
			(r#"{"id": [2], "method": "Debugger.resume"}"#, json!([2])),
		] {
			let env = Envelope::parse(frame).unwrap();
			assert_eq!(env.id().unwrap().as_value(), &expected);
			let text = Response::new(env.id().unwrap().clone(), json!({})).to_text().unwrap();
			let value: Value = serde_json::from_str(&text).unwrap();
			assert_eq!(value["id"], expected);
		}
	}

	#[test]
	fn null_id_counts_as_missing() {
		let env = Envelope::parse(r#"{"id": null, "method": "Runtime.enable"}"#).unwrap();
		assert!(matches!(env.id(), Err(ProtocolError::MissingField("id"))));
	}

	#[test]
	fn missing_fields_are_errors_not_defaults() {
		let env = Envelope::parse(r#"{"id": 1}"#).unwrap();
		assert!(matches!(env.method(), Err(ProtocolError::MissingField("method"))));
		assert!(matches!(
			env.params::<Value>(),
			Err(ProtocolError::MissingField("params"))
		));
	}

	#[test]
	fn non_object_frames_are_rejected() {
		assert!(matches!(Envelope::parse("not json"), Err(ProtocolError::Json(_))));
		assert!(matches!(Envelope::parse("[1, 2]"), Err(ProtocolError::Json(_))));
		assert!(matches!(
			Envelope::parse(r#"{"method": 42}"#),
			Err(ProtocolError::Json(_))
		));
	}

	#[test]
	fn response_encodes_id_and_result() {
		let text = Response::new(RequestId::from(1), json!({"ok": true}))
			.to_text()
			.unwrap();
		let value: Value = serde_json::from_str(&text).unwrap();
		assert_eq!(value, json!({"id": 1, "result": {"ok": true}}));
	}
}
