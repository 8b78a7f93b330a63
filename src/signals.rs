//! Signal latch: the only code that runs in signal-handler context
//!
//! Handlers registered here touch nothing but the atomics in
//! [`LifecycleState`]. Turning a latched request into an actual `stop()` call
//! or abort is left to the checkpoint hook on the engine thread.

use std::sync::Arc;

use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
use signal_hook::low_level;
use signal_hook::SigId;

use crate::error::ServiceError;
use crate::logging::*;
use crate::state::{Escalation, LifecycleState};

/// Signals that request a graceful, then forced, stop
pub const TERMINATION_SIGNALS: [i32; 2] = [SIGINT, SIGTERM];

/// Restart-style signal, re-armed on every loop iteration and otherwise inert
pub const RELOAD_SIGNAL: i32 = SIGHUP;

/// Human readable signal name for log messages
pub fn signal_name(signal: i32) -> &'static str {
	match signal {
		SIGINT => "SIGINT",
		SIGTERM => "SIGTERM",
		SIGHUP => "SIGHUP",
		_ => "signal",
	}
}

/// Installed signal dispositions. Dropping the latch removes them.
pub struct SignalLatch {
	state: Arc<LifecycleState>,
	termination: Vec<SigId>,
	reload: Option<SigId>,
}

impl SignalLatch {
	/// Route `interrupt` and `terminate` to the latch.
	pub fn install(state: Arc<LifecycleState>) -> Result<Self, ServiceError> {
		let mut latch = SignalLatch { state, termination: Vec::new(), reload: None };

		for &signal in TERMINATION_SIGNALS.iter() {
			let state = Arc::clone(&latch.state);
			// SAFETY: the action only performs atomic operations and, once the
			// escalation is exhausted, emulate_default_handler, which is
			// async-signal-safe.
			let id = unsafe {
				low_level::register(signal, move || {
					if state.escalate() == Escalation::Exhausted {
						let _ = low_level::emulate_default_handler(signal);
					}
				})
			}
			.map_err(|source| ServiceError::SignalSetup { signal, source })?;
			latch.termination.push(id);
			debug!("Installed {} handler", signal_name(signal));
		}

		Ok(latch)
	}

	/// Re-arm the reload disposition.
	///
	/// The handler is registered on first use; after that re-arming only
	/// clears the "ignore further reloads" flag the handler sets on delivery.
	pub fn rearm_reload(&mut self) -> Result<(), ServiceError> {
		if self.reload.is_none() {
			let state = Arc::clone(&self.state);
			// SAFETY: the action only performs atomic operations.
			let id = unsafe {
				low_level::register(RELOAD_SIGNAL, move || {
					state.latch_reload();
				})
			}
			.map_err(|source| ServiceError::SignalSetup { signal: RELOAD_SIGNAL, source })?;
			self.reload = Some(id);
			debug!("Installed {} handler", signal_name(RELOAD_SIGNAL));
		}
		self.state.rearm_reload();
		Ok(())
	}
}

impl Drop for SignalLatch {
	fn drop(&mut self) {
		for id in self.termination.drain(..) {
			low_level::unregister(id);
		}
		if let Some(id) = self.reload.take() {
			low_level::unregister(id);
		}
	}
}


// vim: ts=4
