//! Lifecycle state shared between signal context and the engine thread
//!
//! Everything in here is a plain atomic so the signal latch can write it from
//! inside a signal handler. The engine thread only reads and clears it at
//! checkpoints and between loop iterations.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

/// How far a termination request has progressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum TerminationRequest {
	/// No termination signal seen
	None = 0,
	/// A graceful stop was requested, `stop()` not yet delivered
	Pending = 1,
	/// A second request arrived, the running invocation must be aborted
	Forced = 2,
}

impl TerminationRequest {
	fn from_u8(v: u8) -> Self {
		match v {
			0 => TerminationRequest::None,
			1 => TerminationRequest::Pending,
			_ => TerminationRequest::Forced,
		}
	}
}

impl fmt::Display for TerminationRequest {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			TerminationRequest::None => write!(f, "none"),
			TerminationRequest::Pending => write!(f, "pending"),
			TerminationRequest::Forced => write!(f, "forced"),
		}
	}
}

/// Behavior the checkpoint hook performs the next time it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum HookDisposition {
	/// Nothing to do, execution continues
	Idle = 0,
	/// Call the service handle's `stop()`
	InvokeStop = 1,
	/// Raise "interrupted!" and unwind the current invocation
	AbortWithError = 2,
}

impl HookDisposition {
	fn from_u8(v: u8) -> Self {
		match v {
			0 => HookDisposition::Idle,
			1 => HookDisposition::InvokeStop,
			_ => HookDisposition::AbortWithError,
		}
	}
}

/// Result of latching one termination signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
	/// First request: graceful stop scheduled
	Graceful,
	/// Second request: forced abort scheduled
	Forced,
	/// Third or later request: caller must fall back to the default action
	Exhausted,
}

/// Single lifecycle-state value passed to the latch, the hook and the loop
#[derive(Debug)]
pub struct LifecycleState {
	request: AtomicU8,
	disposition: AtomicU8,
	signals: AtomicU8,
	stopping: AtomicBool,
	stop_failed: AtomicBool,
	reload_armed: AtomicBool,
	reloads: AtomicU32,
}

impl Default for LifecycleState {
	fn default() -> Self {
		Self::new()
	}
}

impl LifecycleState {
	pub fn new() -> Self {
		LifecycleState {
			request: AtomicU8::new(TerminationRequest::None as u8),
			disposition: AtomicU8::new(HookDisposition::Idle as u8),
			signals: AtomicU8::new(0),
			stopping: AtomicBool::new(false),
			stop_failed: AtomicBool::new(false),
			reload_armed: AtomicBool::new(true),
			reloads: AtomicU32::new(0),
		}
	}

	// ------------------------------------------------------------------
	// Signal side. Async-signal-safe: atomics only.
	// ------------------------------------------------------------------

	/// Latch one termination signal and schedule the matching hook behavior.
	///
	/// The request only ever moves forward (`none` → `pending` → `forced`), and
	/// `abort-with-error` supersedes `invoke-stop` even if the latter has not
	/// been consumed yet.
	pub fn escalate(&self) -> Escalation {
		let seen = self
			.signals
			.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_add(1)))
			.unwrap_or(u8::MAX);

		match seen {
			0 => {
				self.request.fetch_max(TerminationRequest::Pending as u8, Ordering::SeqCst);
				self.disposition.fetch_max(HookDisposition::InvokeStop as u8, Ordering::SeqCst);
				Escalation::Graceful
			}
			1 => {
				self.request.fetch_max(TerminationRequest::Forced as u8, Ordering::SeqCst);
				self.disposition.store(HookDisposition::AbortWithError as u8, Ordering::SeqCst);
				Escalation::Forced
			}
			_ => Escalation::Exhausted,
		}
	}

	/// Latch one reload signal. Returns `false` if the reload disposition was
	/// disarmed, in which case the signal is ignored.
	pub fn latch_reload(&self) -> bool {
		if self.reload_armed.swap(false, Ordering::SeqCst) {
			self.reloads.fetch_add(1, Ordering::SeqCst);
			true
		} else {
			false
		}
	}

	// ------------------------------------------------------------------
	// Engine side
	// ------------------------------------------------------------------

	pub fn request(&self) -> TerminationRequest {
		TerminationRequest::from_u8(self.request.load(Ordering::SeqCst))
	}

	/// Whether any termination has been requested at all
	pub fn is_termination_requested(&self) -> bool {
		self.request() != TerminationRequest::None
	}

	/// Disposition currently latched, without consuming it
	pub fn disposition(&self) -> HookDisposition {
		HookDisposition::from_u8(self.disposition.load(Ordering::SeqCst))
	}

	/// Consume the latched disposition, resetting it to idle
	pub fn take_disposition(&self) -> HookDisposition {
		HookDisposition::from_u8(
			self.disposition.swap(HookDisposition::Idle as u8, Ordering::SeqCst),
		)
	}

	/// Reset per-iteration markers before `run()` is invoked
	pub fn begin_iteration(&self) {
		self.stopping.store(false, Ordering::SeqCst);
		self.stop_failed.store(false, Ordering::SeqCst);
	}

	/// Set by the hook whenever it actually fires a stop or an abort
	pub fn mark_stopping(&self) {
		self.stopping.store(true, Ordering::SeqCst);
	}

	pub fn is_stopping(&self) -> bool {
		self.stopping.load(Ordering::SeqCst)
	}

	pub fn record_stop_failure(&self) {
		self.stop_failed.store(true, Ordering::SeqCst);
	}

	/// Whether a `stop()` fired during the current iteration failed
	pub fn stop_failed(&self) -> bool {
		self.stop_failed.load(Ordering::SeqCst)
	}

	pub fn rearm_reload(&self) {
		self.reload_armed.store(true, Ordering::SeqCst);
	}

	pub fn is_reload_armed(&self) -> bool {
		self.reload_armed.load(Ordering::SeqCst)
	}

	/// Number of reload requests latched since the last call
	pub fn take_reloads(&self) -> u32 {
		self.reloads.swap(0, Ordering::SeqCst)
	}
}


// vim: ts=4
