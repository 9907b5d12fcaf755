//! Wire types for the jsrt remote debugging bridge.
//!
//! The bridge treats the debugging protocol as opaque JSON frames, except for
//! the handful of methods in [`debugger`] that it must recognize.
//!
//! # Main Types
//!
//! - [`Envelope`] - fail-closed decoding of `{id, method, params}`
//! - [`ClientCommand`] - frames sent by the debugger client
//! - [`DebuggerEvent`] - frames emitted by the native debugger
//! - [`ScriptId`] - engine-assigned script identifier

pub mod debugger;
pub mod message;

pub use debugger::{
	ClientCommand, DEFAULT_DEBUG_HOST, DEFAULT_DEBUG_PORT, DebuggerEvent, GET_SCRIPT_SOURCE,
	GetScriptSourceParams, SCRIPT_PARSED, SOURCE_UNAVAILABLE, ScriptId, ScriptParsedParams,
	ScriptSourceResult, script_source_response,
};
pub use message::{Envelope, ProtocolError, RequestId, Response, Result};
