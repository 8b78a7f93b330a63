//! Safe-point hook controller
//!
//! The checkpoint hook fires on function calls, function returns and every
//! N VM instructions, always on the engine thread and with the interpreter in
//! a consistent state. It consumes whatever disposition the signal latch left
//! behind and acts on it: call the service's `stop()`, or raise
//! "interrupted!" to unwind the running invocation.

use std::sync::Arc;

use mlua::{HookTriggers, Lua, VmState};

use crate::dispatch;
use crate::logging::*;
use crate::state::{HookDisposition, LifecycleState};

/// Error raised into the script on a forced abort
pub const INTERRUPTED: &str = "interrupted!";

/// Instructions between count checkpoints unless configured otherwise
pub const DEFAULT_CHECKPOINT_INTERVAL: u32 = 1000;

/// What a fired checkpoint is allowed to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointMode {
	/// Loading libraries or the script: no handle to stop yet, any
	/// termination request aborts the call
	Startup,
	/// Inside `run()`: graceful stop first, abort on escalation
	Service,
}

pub struct HookController {
	state: Arc<LifecycleState>,
	interval: u32,
}

impl HookController {
	pub fn new(state: Arc<LifecycleState>, interval: u32) -> Self {
		HookController { state, interval: interval.max(1) }
	}

	pub fn interval(&self) -> u32 {
		self.interval
	}

	/// Checkpoint granularity: calls, returns and an instruction-count tick
	/// bounding latency inside tight loops
	pub fn triggers(&self) -> HookTriggers {
		HookTriggers::new().on_calls().on_returns().every_nth_instruction(self.interval)
	}

	pub fn install(&self, lua: &Lua, mode: CheckpointMode) {
		let state = Arc::clone(&self.state);
		lua.set_hook(self.triggers(), move |lua, _debug| checkpoint(lua, &state, mode));
	}

	pub fn remove(&self, lua: &Lua) {
		lua.remove_hook();
	}

	/// Run `f` with the checkpoint hook installed in `mode`
	pub fn guarded<R>(&self, lua: &Lua, mode: CheckpointMode, f: impl FnOnce() -> R) -> R {
		self.install(lua, mode);
		let result = f();
		self.remove(lua);
		result
	}
}

fn checkpoint(lua: &Lua, state: &LifecycleState, mode: CheckpointMode) -> mlua::Result<VmState> {
	match state.take_disposition() {
		HookDisposition::Idle => Ok(VmState::Continue),
		HookDisposition::InvokeStop if mode == CheckpointMode::Service => {
			invoke_stop(lua, state);
			Ok(VmState::Continue)
		}
		disposition => {
			state.mark_stopping();
			info!("Termination forced ({:?} during {:?}), aborting", disposition, mode);
			Err(mlua::Error::runtime(INTERRUPTED))
		}
	}
}

/// Deliver the graceful stop. Lua suspends hooks while this runs, so a
/// second signal arriving meanwhile is acted on at the next checkpoint.
fn invoke_stop(lua: &Lua, state: &LifecycleState) {
	state.mark_stopping();
	info!("Termination requested, invoking stop()");
	if dispatch::call_stop(lua).is_err() {
		state.record_stop_failure();
	}
	state.rearm_reload();
}


// vim: ts=4
