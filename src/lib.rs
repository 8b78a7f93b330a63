//! # luasvc - Lua service wrapper
//!
//! luasvc turns a Lua script into a long-running service process. The script
//! must return a table with two functions, `run` and `stop`. `run` is called
//! over and over as the service body; a termination signal makes luasvc call
//! `stop` at the next safe point inside the running script instead of killing
//! it.
//!
//! ```lua
//! local running = true
//! return {
//!     run = function()
//!         while running do
//!             -- serve
//!         end
//!     end,
//!     stop = function() running = false end,
//! }
//! ```
//!
//! ## Signals
//!
//! - First `SIGINT`/`SIGTERM`: `stop()` is invoked at the next checkpoint
//! - Second: the running `run()` is aborted with an "interrupted!" error
//! - Third: default action, the process dies
//! - `SIGHUP`: re-armed every loop iteration, otherwise ignored
//!
//! ## Embedding
//!
//! ```rust,ignore
//! use luasvc::engine::{self, ScriptSource};
//! use luasvc::lifecycle::ServiceLoop;
//!
//! let mut service = ServiceLoop::start(engine::create(), 1000)?;
//! service.load_script(&ScriptSource::from_arg("service.lua"), &[])?;
//! let outcome = service.run()?;
//! std::process::exit(if outcome.succeeded() { 0 } else { 1 });
//! ```

pub mod config;
pub mod contract;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod hook;
pub mod lifecycle;
pub mod logging;
pub mod signals;
pub mod state;
pub mod supervisor;

// Re-export commonly used types
pub use config::ServiceConfig;
pub use contract::ServiceHandle;
pub use error::{InvocationError, ServiceError, StartupError};
pub use lifecycle::{LoopOutcome, Phase, ServiceLoop};
pub use state::{HookDisposition, LifecycleState, TerminationRequest};

// vim: ts=4
