//! Process supervisor: daemonize, pidfile, engine ownership

use std::fs;
use std::io;
use std::path::Path;
use std::process::ExitCode;

use crate::config::ServiceConfig;
use crate::engine::{self, ScriptSource};
use crate::error::{ServiceError, StartupError};
use crate::lifecycle::{LoopOutcome, ServiceLoop};
use crate::logging::*;

/// Which side of the fork we are on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fork {
	Parent(libc::pid_t),
	Child,
}

/// Fork into the background. The parent is expected to exit right away;
/// the child leaves the controlling terminal's session.
///
/// Must be called before any thread is spawned.
pub fn daemonize() -> Result<Fork, ServiceError> {
	// SAFETY: the process is still single-threaded at this point
	match unsafe { libc::fork() } {
		-1 => Err(ServiceError::Daemonize { source: io::Error::last_os_error() }),
		0 => {
			// SAFETY: plain syscall, the child is not a process group leader
			if unsafe { libc::setsid() } == -1 {
				debug!("setsid failed: {}", io::Error::last_os_error());
			}
			Ok(Fork::Child)
		}
		pid => Ok(Fork::Parent(pid)),
	}
}

/// Write `pid` as plain decimal text
pub fn write_pidfile(path: &Path, pid: u32) -> io::Result<()> {
	fs::write(path, pid.to_string())
}

/// Create the engine, load everything and run the service loop to completion.
pub fn run_service(config: &ServiceConfig) -> Result<LoopOutcome, ServiceError> {
	let lua = engine::create();
	engine::set_args(&lua, &config.program_name, &config.script, &config.script_args)?;

	let mut service = ServiceLoop::start(lua, config.checkpoint_interval)?;
	service.load_libraries(&config.libraries)?;
	service.load_script(&ScriptSource::from_arg(&config.script), &config.script_args)?;
	service.run()
}

/// Entry point used by the binary once the configuration is final
pub fn supervise(config: &ServiceConfig) -> ExitCode {
	if let Err(e) = config.validate() {
		error!("{}", e);
		return ExitCode::FAILURE;
	}

	if !config.foreground {
		match daemonize() {
			Ok(Fork::Parent(pid)) => {
				debug!("Service forked as pid {}", pid);
				return ExitCode::SUCCESS;
			}
			Ok(Fork::Child) => {}
			Err(e) => {
				error!("{}", e);
				return ExitCode::FAILURE;
			}
		}
	}

	let pid = std::process::id();
	if let Some(pidfile) = &config.pidfile {
		if let Err(e) = write_pidfile(pidfile, pid) {
			error!("cannot write pidfile {}: {}", pidfile.display(), e);
		}
	}
	info!("Starting service {} (pid {})", config.script, pid);

	match run_service(config) {
		Ok(outcome) => outcome.exit_code(),
		Err(ServiceError::Startup(StartupError::ScriptFailed(e)))
		| Err(ServiceError::Startup(StartupError::LibraryFailed(e))) => {
			// Already on the error path via the dispatcher
			debug!("Startup aborted: {} failed", e.target);
			ExitCode::FAILURE
		}
		Err(e) => {
			error!("{}", e);
			ExitCode::FAILURE
		}
	}
}


// vim: ts=4
