//! Error types for luasvc

use std::error::Error;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Placeholder reported when a script raises a non-text error value
pub const NON_STRING_ERROR: &str = "(error object is not a string)";

/// Main error type for the service process
#[derive(Debug)]
pub enum ServiceError {
	/// Invalid configuration
	InvalidConfig { message: String },

	/// Failed to read a configuration file
	ConfigFile { path: PathBuf, message: String },

	/// Scripting engine could not be created or prepared
	Engine { message: String },

	/// Signal dispositions could not be installed
	SignalSetup { signal: i32, source: io::Error },

	/// Daemonizing failed
	Daemonize { source: io::Error },

	/// Startup failed before the service loop was entered (nested)
	Startup(StartupError),
}

impl fmt::Display for ServiceError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ServiceError::InvalidConfig { message } => {
				write!(f, "Invalid configuration: {}", message)
			}
			ServiceError::ConfigFile { path, message } => {
				write!(f, "Cannot read config file {}: {}", path.display(), message)
			}
			ServiceError::Engine { message } => write!(f, "engine error: {}", message),
			ServiceError::SignalSetup { signal, source } => {
				write!(f, "Failed to install handler for signal {}: {}", signal, source)
			}
			ServiceError::Daemonize { source } => {
				write!(f, "cannot create child process: {}", source)
			}
			ServiceError::Startup(e) => write!(f, "{}", e),
		}
	}
}

impl Error for ServiceError {}

impl From<StartupError> for ServiceError {
	fn from(e: StartupError) -> Self {
		ServiceError::Startup(e)
	}
}

impl From<mlua::Error> for ServiceError {
	fn from(e: mlua::Error) -> Self {
		ServiceError::Engine { message: e.to_string() }
	}
}

/// Fatal errors raised before the service loop starts
#[derive(Debug)]
pub enum StartupError {
	/// Script could not be read or compiled
	ScriptLoad { script: String, message: String },

	/// Script body raised an error while executing
	ScriptFailed(InvocationError),

	/// Script did not return a table
	NotATable { found: String },

	/// Required entry point missing or not callable
	MissingMethod { method: String },

	/// A `-l` library failed to load
	LibraryFailed(InvocationError),

	/// A termination request aborted loading
	Interrupted(InvocationError),

	/// Engine failure while preparing the script environment
	Engine { message: String },
}

impl fmt::Display for StartupError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			StartupError::ScriptLoad { script, message } => {
				write!(f, "cannot load {}: {}", script, message)
			}
			StartupError::ScriptFailed(e) => write!(f, "{}", e),
			StartupError::NotATable { found } => {
				write!(f, "Script return value is not a table (got {})", found)
			}
			StartupError::MissingMethod { method } => {
				write!(f, "Method {} is not a function or not present", method)
			}
			StartupError::LibraryFailed(e) => write!(f, "{}", e),
			StartupError::Interrupted(e) => write!(f, "{} interrupted by termination request", e.target),
			StartupError::Engine { message } => write!(f, "{}", message),
		}
	}
}

impl Error for StartupError {}

impl From<mlua::Error> for StartupError {
	fn from(e: mlua::Error) -> Self {
		StartupError::Engine { message: e.to_string() }
	}
}

/// Failure of a single dispatched call into the engine
///
/// `message` is `None` when the script raised `nil`, which is reported as a
/// failure but prints nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationError {
	/// What was being called (`run`, `stop`, `require "name"`, script name)
	pub target: String,

	/// Error message including traceback, if any
	pub message: Option<String>,
}

impl InvocationError {
	pub fn new(target: impl Into<String>, message: Option<String>) -> Self {
		InvocationError { target: target.into(), message }
	}

	/// Text printed by the error-report path
	pub fn report_text(&self) -> Option<&str> {
		self.message.as_deref()
	}
}

impl fmt::Display for InvocationError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.message {
			Some(msg) => write!(f, "{}", msg),
			None => write!(f, "{} failed", self.target),
		}
	}
}

impl Error for InvocationError {}


// vim: ts=4
