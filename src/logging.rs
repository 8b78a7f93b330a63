//! Logging prelude module for convenient access to tracing macros.
//!
//! ```ignore
//! use crate::logging::*;
//!
//! info!("service started");
//! warn!("run() returned without a stop request");
//! error!("stop() failed: {}", err);
//! ```

use std::io::IsTerminal;

pub use tracing::{debug, error, info, warn};

/// Initialize the tracing subscriber with environment filter support.
///
/// `RUST_LOG` takes precedence; otherwise `default_level` is used:
///
/// ```bash
/// RUST_LOG=debug luasvc -f service.lua
/// RUST_LOG=luasvc::hook=trace luasvc -f service.lua
/// ```
///
/// Output goes to standard error so a daemonized service that keeps its
/// stderr redirected still gets every diagnostic. Colors only on a terminal.
/// A stderr that can no longer be written (closed pipe, vanished terminal)
/// drops log lines silently instead of taking the service down. Calling this
/// twice is harmless.
pub fn init_tracing(default_level: &str) {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
		)
		.with_writer(std::io::stderr)
		.with_ansi(std::io::stderr().is_terminal())
		.with_target(false)
		.log_internal_errors(false)
		.try_init();
}

// vim: ts=4
