//! Service configuration
//!
//! The configuration follows a priority chain:
//! 1. Built-in defaults (`ServiceConfig::default()`)
//! 2. Config file given with `-c` (`.toml`, or `.json`/`.json5`)
//! 3. CLI flags (highest priority)

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ServiceError;
use crate::hook::DEFAULT_CHECKPOINT_INTERVAL;

/// Script name meaning "read the script from standard input"
pub const STDIN_SCRIPT: &str = "-";

/// Configuration of one service process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServiceConfig {
	// ========================================================================
	// SCRIPT
	// ========================================================================
	/// Main script path, or "-" for standard input
	pub script: String,

	/// Arguments passed to the script (varargs and `arg[1..]`)
	pub script_args: Vec<String>,

	/// Libraries `require`d, in order, before the script is loaded
	pub libraries: Vec<String>,

	// ========================================================================
	// PROCESS
	// ========================================================================
	/// Write the service pid here after daemonizing
	pub pidfile: Option<PathBuf>,

	/// Stay attached to the terminal instead of forking into the background
	pub foreground: bool,

	/// Name used as `arg[-1]` and in diagnostics
	pub program_name: String,

	// ========================================================================
	// SAFE POINTS
	// ========================================================================
	/// VM instructions between count checkpoints. Bounds the latency between
	/// a signal and the resulting `stop()` inside tight loops.
	pub checkpoint_interval: u32,

	// ========================================================================
	// LOGGING
	// ========================================================================
	/// Log level used when RUST_LOG is not set (trace, debug, info, warn, error)
	pub log_level: String,
}

impl Default for ServiceConfig {
	fn default() -> Self {
		ServiceConfig {
			script: String::new(),
			script_args: vec![],
			libraries: vec![],
			pidfile: None,
			foreground: false,
			program_name: "luasvc".to_string(),
			checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
			log_level: "info".to_string(),
		}
	}
}

impl ServiceConfig {
	/// Load a config file; the format is picked by extension
	pub fn from_file(path: &Path) -> Result<Self, ServiceError> {
		let contents = fs::read_to_string(path).map_err(|e| ServiceError::ConfigFile {
			path: path.to_path_buf(),
			message: e.to_string(),
		})?;

		let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
		let parsed = match ext {
			"json" | "json5" => json5::from_str(&contents).map_err(|e| e.to_string()),
			_ => toml::from_str(&contents).map_err(|e| e.to_string()),
		};
		parsed.map_err(|message| ServiceError::ConfigFile { path: path.to_path_buf(), message })
	}

	/// Whether the script is read from standard input
	pub fn reads_stdin(&self) -> bool {
		self.script == STDIN_SCRIPT
	}

	pub fn validate(&self) -> Result<(), ServiceError> {
		if self.script.is_empty() {
			return Err(ServiceError::InvalidConfig { message: "no script given".to_string() });
		}
		if self.checkpoint_interval == 0 {
			return Err(ServiceError::InvalidConfig {
				message: "checkpointInterval must be greater than 0".to_string(),
			});
		}
		Ok(())
	}
}


// vim: ts=4
