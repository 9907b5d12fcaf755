//! Debug bridge configuration.

use std::time::Duration;

use jsrt_protocol::{DEFAULT_DEBUG_HOST, DEFAULT_DEBUG_PORT};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const ENV_HOST: &str = "JSRT_DEBUG_HOST";
pub const ENV_PORT: &str = "JSRT_DEBUG_PORT";
pub const ENV_PAUSE_ON_LOAD: &str = "JSRT_DEBUG_PAUSE_ON_LOAD";

/// Where and how the debug bridge listens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeConfig {
	pub host: String,
	/// `0` picks a free port; read it back with `DebugBridge::local_addr`.
	pub port: u16,
	/// Pause before the first statement of every newly loaded script.
	pub pause_on_load: bool,
	/// Upper bound on how long shutdown waits for the worker.
	pub shutdown_timeout_ms: u64,
}

impl Default for BridgeConfig {
	fn default() -> Self {
		Self {
			host: DEFAULT_DEBUG_HOST.to_string(),
			port: DEFAULT_DEBUG_PORT,
			pause_on_load: true,
			shutdown_timeout_ms: 2000,
		}
	}
}

impl BridgeConfig {
	/// Defaults overlaid with `JSRT_DEBUG_HOST`, `JSRT_DEBUG_PORT` and
	/// `JSRT_DEBUG_PAUSE_ON_LOAD`.
	pub fn from_env() -> Result<Self> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	pub fn from_json(text: &str) -> Result<Self> {
		serde_json::from_str(text).map_err(|e| Error::Config(format!("invalid bridge config: {e}")))
	}

	fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
		let mut config = Self::default();
		if let Some(host) = lookup(ENV_HOST).filter(|h| !h.trim().is_empty()) {
			config.host = host.trim().to_string();
		}
		if let Some(port) = lookup(ENV_PORT) {
			config.port = port
				.trim()
				.parse()
				.map_err(|_| Error::Config(format!("{ENV_PORT} must be a port number, got {port:?}")))?;
		}
		if let Some(pause) = lookup(ENV_PAUSE_ON_LOAD) {
			config.pause_on_load = parse_flag(&pause)
				.ok_or_else(|| Error::Config(format!("{ENV_PAUSE_ON_LOAD} must be a boolean, got {pause:?}")))?;
		}
		Ok(config)
	}

	/// `host:port`, bracketing IPv6 literals.
	pub fn bind_addr(&self) -> String {
		if self.host.contains(':') && !self.host.starts_with('[') {
			format!("[{}]:{}", self.host, self.port)
		} else {
			format!("{}:{}", self.host, self.port)
		}
	}

	pub fn shutdown_timeout(&self) -> Duration {
		Duration::from_millis(self.shutdown_timeout_ms)
	}
}

fn parse_flag(value: &str) -> Option<bool> {
	match value.trim().to_ascii_lowercase().as_str() {
		"1" | "true" | "yes" | "on" => Some(true),
		"0" | "false" | "no" | "off" => Some(false),
		_ => None,
	}
}
