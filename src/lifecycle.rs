//! Run/stop lifecycle loop
//!
//! ```text
//! STARTING --(latch installed, script validated)--> RUNNING --(termination latched)--> EXITING
//!                                                     ^   |
//!                                                     +---+ run() returned, no termination
//! ```

use std::process::ExitCode;
use std::sync::Arc;

use mlua::{Lua, MultiValue, Value};

use crate::contract::ServiceHandle;
use crate::dispatch;
use crate::engine::{self, ScriptSource};
use crate::error::{InvocationError, ServiceError, StartupError};
use crate::hook::{CheckpointMode, HookController};
use crate::logging::*;
use crate::signals::SignalLatch;
use crate::state::{HookDisposition, LifecycleState, TerminationRequest};

/// Lifecycle phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
	Starting,
	Running,
	Exiting,
}

/// Summary of a finished service loop
#[derive(Debug, Clone, Default)]
pub struct LoopOutcome {
	/// Number of `run()` invocations
	pub iterations: u64,

	/// Invocations that ended without the hook having fired
	pub unexpected_returns: u64,

	/// Invocations that reported an error
	pub failed_runs: u64,

	/// Error of the final `run()` invocation, still outstanding at exit
	pub last_error: Option<InvocationError>,

	/// A `stop()` delivered during the final invocation failed
	pub stop_failed: bool,

	/// The final invocation was aborted by a forced termination
	pub forced: bool,
}

impl LoopOutcome {
	pub fn succeeded(&self) -> bool {
		self.last_error.is_none() && !self.stop_failed
	}

	pub fn exit_code(&self) -> ExitCode {
		if self.succeeded() {
			ExitCode::SUCCESS
		} else {
			ExitCode::FAILURE
		}
	}
}

/// The service main state machine
pub struct ServiceLoop {
	lua: Lua,
	state: Arc<LifecycleState>,
	latch: SignalLatch,
	hooks: HookController,
	phase: Phase,
}

impl ServiceLoop {
	/// STARTING: prepare the dispatcher and route termination signals to the latch.
	pub fn start(lua: Lua, checkpoint_interval: u32) -> Result<Self, ServiceError> {
		Self::with_state(lua, Arc::new(LifecycleState::new()), checkpoint_interval)
	}

	/// Like [`ServiceLoop::start`] but sharing an existing lifecycle state
	pub fn with_state(
		lua: Lua,
		state: Arc<LifecycleState>,
		checkpoint_interval: u32,
	) -> Result<Self, ServiceError> {
		dispatch::install(&lua)?;
		let latch = SignalLatch::install(Arc::clone(&state))?;
		let hooks = HookController::new(Arc::clone(&state), checkpoint_interval);
		debug!("Checkpoint every {} instructions", hooks.interval());
		Ok(ServiceLoop { lua, state, latch, hooks, phase: Phase::Starting })
	}

	pub fn lua(&self) -> &Lua {
		&self.lua
	}

	pub fn state(&self) -> &Arc<LifecycleState> {
		&self.state
	}

	pub fn phase(&self) -> Phase {
		self.phase
	}

	/// `require` each library in order; the first failure aborts startup
	pub fn load_libraries(&self, names: &[String]) -> Result<(), StartupError> {
		for name in names {
			debug!("Loading library {}", name);
			self.hooks
				.guarded(&self.lua, CheckpointMode::Startup, || {
					dispatch::require_library(&self.lua, name)
				})
				.map_err(|e| self.startup_failure(e, StartupError::LibraryFailed))?;
		}
		Ok(())
	}

	/// Load and execute the main script, then validate and retain the
	/// returned service handle.
	pub fn load_script(&self, source: &ScriptSource, args: &[String]) -> Result<(), StartupError> {
		let chunk = engine::load_script(&self.lua, source)?;

		let mut call_args = Vec::with_capacity(args.len());
		for arg in args {
			call_args.push(Value::String(self.lua.create_string(arg)?));
		}

		let name = source.display_name();
		let returned = self
			.hooks
			.guarded(&self.lua, CheckpointMode::Startup, || {
				dispatch::call(&self.lua, &name, chunk, MultiValue::from_vec(call_args))
			})
			.map_err(|e| self.startup_failure(e, StartupError::ScriptFailed))?;

		let value = returned.into_iter().next().unwrap_or(Value::Nil);
		ServiceHandle::validate(value)?.retain(&self.lua)?;
		info!("Service script {} loaded", name);
		Ok(())
	}

	/// A startup call aborted by a termination request is an interruption,
	/// not a script fault
	fn startup_failure(
		&self,
		err: InvocationError,
		otherwise: fn(InvocationError) -> StartupError,
	) -> StartupError {
		if self.state.is_termination_requested() {
			StartupError::Interrupted(err)
		} else {
			otherwise(err)
		}
	}

	/// RUNNING until a termination has been requested, then EXITING.
	///
	/// `run()` is always invoked at least once. Invocation errors are reported
	/// and the loop carries on; only the last invocation's status survives
	/// into the outcome.
	pub fn run(&mut self) -> Result<LoopOutcome, ServiceError> {
		ServiceHandle::retained(&self.lua)?;
		self.phase = Phase::Running;
		let mut outcome = LoopOutcome::default();

		loop {
			self.state.begin_iteration();
			self.latch.rearm_reload()?;
			let reloads = self.state.take_reloads();
			if reloads > 0 {
				debug!("Ignoring {} reload request(s)", reloads);
			}

			outcome.iterations += 1;
			let lua = &self.lua;
			let result =
				self.hooks.guarded(lua, CheckpointMode::Service, || dispatch::call_run(lua));

			if result.is_err() {
				outcome.failed_runs += 1;
			}
			if !self.state.is_stopping() {
				outcome.unexpected_returns += 1;
				warn!("Service terminated unexpectedly (run() returned without a stop request)");
			}
			outcome.forced = result.is_err() && self.state.request() == TerminationRequest::Forced;
			outcome.last_error = result.err();
			outcome.stop_failed = self.state.stop_failed();

			if self.state.is_termination_requested() {
				break;
			}
		}

		self.settle_pending_stop(&mut outcome);
		self.phase = Phase::Exiting;
		info!(
			"Service loop finished after {} iteration(s), termination {}",
			outcome.iterations,
			self.state.request()
		);
		Ok(outcome)
	}

	/// A termination latched after the last checkpoint of the final `run()`
	/// never reached the hook. Deliver the graceful stop here instead, under
	/// the same checkpoint so a second signal still aborts it.
	fn settle_pending_stop(&self, outcome: &mut LoopOutcome) {
		if self.state.is_stopping() {
			return;
		}
		if self.state.take_disposition() == HookDisposition::InvokeStop {
			info!("Termination requested after run() returned, invoking stop()");
			self.state.mark_stopping();
			let lua = &self.lua;
			let result =
				self.hooks.guarded(lua, CheckpointMode::Service, || dispatch::call_stop(lua));
			if result.is_err() {
				outcome.stop_failed = true;
				outcome.forced = self.state.request() == TerminationRequest::Forced;
			}
		}
	}
}


// vim: ts=4
