//! Integration tests for signal handling and graceful termination
//!
//! These run the built `luasvc` binary in the foreground with a real script
//! and deliver real signals with kill(2).

use std::fs;
use std::os::unix::io::FromRawFd;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const TIMEOUT: Duration = Duration::from_secs(20);

fn spawn_service(script: &Path, extra: &[&str]) -> Child {
	Command::new(env!("CARGO_BIN_EXE_luasvc"))
		.arg("-f")
		.args(extra)
		.arg(script)
		.stdout(Stdio::null())
		.stderr(Stdio::null())
		.spawn()
		.expect("spawn luasvc")
}

fn write_script(dir: &TempDir, body: &str) -> PathBuf {
	let path = dir.path().join("service.lua");
	fs::write(&path, body).expect("write script");
	path
}

/// Wait until `path` exists, so the script is known to be inside run()
fn wait_for_file(path: &Path) {
	let start = Instant::now();
	while !path.exists() {
		assert!(start.elapsed() < TIMEOUT, "timed out waiting for {}", path.display());
		thread::sleep(Duration::from_millis(20));
	}
}

fn send(child: &Child, signal: i32) {
	let rc = unsafe { libc::kill(child.id() as libc::pid_t, signal) };
	assert_eq!(rc, 0, "kill failed");
}

fn wait_status(child: &mut Child) -> ExitStatus {
	let start = Instant::now();
	loop {
		if let Some(status) = child.try_wait().expect("try_wait") {
			return status;
		}
		if start.elapsed() > TIMEOUT {
			let _ = child.kill();
			panic!("service did not exit in time");
		}
		thread::sleep(Duration::from_millis(20));
	}
}

/// Wait for exit; `None` means the process was killed by a signal
fn wait_exit(child: &mut Child) -> Option<i32> {
	wait_status(child).code()
}

/// Write end of a pipe whose read end is already closed
fn broken_pipe() -> Stdio {
	let mut fds = [0 as libc::c_int; 2];
	assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0, "pipe failed");
	unsafe {
		libc::close(fds[0]);
		Stdio::from_raw_fd(fds[1])
	}
}

/// Script looping in run() until stop(); both phases leave a marker file
fn stoppable_script(dir: &TempDir, ready: &Path, stopped: &Path) -> PathBuf {
	write_script(
		dir,
		&format!(
			r#"
			local running = true
			return {{
				run = function()
					io.open({ready}, "w"):close()
					while running do end
				end,
				stop = function()
					running = false
					io.open({stopped}, "w"):close()
				end,
			}}
			"#,
			ready = lua_path(ready),
			stopped = lua_path(stopped)
		),
	)
}

/// Lua string literal for a path
fn lua_path(path: &Path) -> String {
	format!("{:?}", path.display().to_string())
}

#[test]
fn test_sigint_invokes_stop_and_exits_zero() {
	let dir = TempDir::new().unwrap();
	let ready = dir.path().join("ready");
	let stopped = dir.path().join("stopped");
	let script = write_script(
		&dir,
		&format!(
			r#"
			local running = true
			local counter = 0
			return {{
				run = function()
					io.open({ready}, "w"):close()
					while running do counter = counter + 1 end
				end,
				stop = function()
					running = false
					io.open({stopped}, "w"):close()
				end,
			}}
			"#,
			ready = lua_path(&ready),
			stopped = lua_path(&stopped)
		),
	);

	let mut child = spawn_service(&script, &[]);
	wait_for_file(&ready);
	send(&child, libc::SIGINT);

	assert_eq!(wait_exit(&mut child), Some(0));
	assert!(stopped.exists(), "stop() was not invoked");
}

#[test]
fn test_sigterm_behaves_like_sigint() {
	let dir = TempDir::new().unwrap();
	let ready = dir.path().join("ready");
	let script = write_script(
		&dir,
		&format!(
			r#"
			local running = true
			return {{
				run = function()
					io.open({ready}, "w"):close()
					while running do end
				end,
				stop = function() running = false end,
			}}
			"#,
			ready = lua_path(&ready)
		),
	);

	let mut child = spawn_service(&script, &["--checkpoint-interval", "10"]);
	wait_for_file(&ready);
	send(&child, libc::SIGTERM);

	assert_eq!(wait_exit(&mut child), Some(0));
}

#[test]
fn test_second_signal_forces_abort() {
	let dir = TempDir::new().unwrap();
	let ready = dir.path().join("ready");
	let stopped = dir.path().join("stopped");
	let script = write_script(
		&dir,
		&format!(
			r#"
			return {{
				run = function()
					io.open({ready}, "w"):close()
					while true do end
				end,
				stop = function() io.open({stopped}, "w"):close() end,
			}}
			"#,
			ready = lua_path(&ready),
			stopped = lua_path(&stopped)
		),
	);

	let mut child = spawn_service(&script, &[]);
	wait_for_file(&ready);
	send(&child, libc::SIGINT);
	wait_for_file(&stopped);
	send(&child, libc::SIGINT);

	assert_eq!(wait_exit(&mut child), Some(1));
}

#[test]
fn test_sigint_then_sigterm_forces_abort() {
	let dir = TempDir::new().unwrap();
	let ready = dir.path().join("ready");
	let stopped = dir.path().join("stopped");
	let script = write_script(
		&dir,
		&format!(
			r#"
			return {{
				run = function()
					io.open({ready}, "w"):close()
					while true do end
				end,
				stop = function() io.open({stopped}, "w"):close() end,
			}}
			"#,
			ready = lua_path(&ready),
			stopped = lua_path(&stopped)
		),
	);

	let mut child = spawn_service(&script, &[]);
	wait_for_file(&ready);
	send(&child, libc::SIGINT);
	wait_for_file(&stopped);
	send(&child, libc::SIGTERM);

	assert_eq!(wait_exit(&mut child), Some(1));
}

#[test]
fn test_third_signal_takes_default_action() {
	let dir = TempDir::new().unwrap();
	let ready = dir.path().join("ready");
	let stopped = dir.path().join("stopped");
	let aborted = dir.path().join("aborted");
	// run() swallows the forced abort and keeps going
	let script = write_script(
		&dir,
		&format!(
			r#"
			return {{
				run = function()
					io.open({ready}, "w"):close()
					while true do
						local ok = pcall(function() while true do end end)
						if not ok then io.open({aborted}, "w"):close() end
					end
				end,
				stop = function() io.open({stopped}, "w"):close() end,
			}}
			"#,
			ready = lua_path(&ready),
			stopped = lua_path(&stopped),
			aborted = lua_path(&aborted)
		),
	);

	let mut child = spawn_service(&script, &[]);
	wait_for_file(&ready);
	send(&child, libc::SIGINT);
	wait_for_file(&stopped);
	send(&child, libc::SIGINT);
	wait_for_file(&aborted);
	send(&child, libc::SIGINT);

	let status = wait_status(&mut child);
	assert_eq!(status.code(), None, "service survived the third signal");
	assert_eq!(status.signal(), Some(libc::SIGINT));
}

#[test]
fn test_unwritable_stderr_does_not_crash() {
	let dir = TempDir::new().unwrap();
	let ready = dir.path().join("ready");
	let stopped = dir.path().join("stopped");
	let script = stoppable_script(&dir, &ready, &stopped);

	let mut child = Command::new(env!("CARGO_BIN_EXE_luasvc"))
		.args(["-f", "--log-level", "debug"])
		.arg(&script)
		.stdout(Stdio::null())
		.stderr(broken_pipe())
		.spawn()
		.expect("spawn luasvc");
	wait_for_file(&ready);
	send(&child, libc::SIGINT);

	assert_eq!(wait_exit(&mut child), Some(0));
	assert!(stopped.exists(), "stop() was not invoked");
}

#[test]
fn test_sighup_does_not_stop_service() {
	let dir = TempDir::new().unwrap();
	let ready = dir.path().join("ready");
	let stopped = dir.path().join("stopped");
	let script = write_script(
		&dir,
		&format!(
			r#"
			local running = true
			return {{
				run = function()
					io.open({ready}, "w"):close()
					while running do end
				end,
				stop = function()
					running = false
					io.open({stopped}, "w"):close()
				end,
			}}
			"#,
			ready = lua_path(&ready),
			stopped = lua_path(&stopped)
		),
	);

	let mut child = spawn_service(&script, &[]);
	wait_for_file(&ready);
	send(&child, libc::SIGHUP);
	send(&child, libc::SIGHUP);
	thread::sleep(Duration::from_millis(200));

	// Still alive and stop() not called
	assert!(child.try_wait().unwrap().is_none(), "SIGHUP terminated the service");
	assert!(!stopped.exists(), "SIGHUP triggered stop()");

	send(&child, libc::SIGINT);
	assert_eq!(wait_exit(&mut child), Some(0));
	assert!(stopped.exists());
}

#[test]
fn test_missing_stop_fails_startup() {
	let dir = TempDir::new().unwrap();
	let ran = dir.path().join("ran");
	let script = write_script(
		&dir,
		&format!(r#"return {{ run = function() io.open({ran}, "w"):close() end }}"#, ran = lua_path(&ran)),
	);

	let output = Command::new(env!("CARGO_BIN_EXE_luasvc"))
		.arg("-f")
		.arg(&script)
		.output()
		.expect("run luasvc");

	assert_eq!(output.status.code(), Some(1));
	let stderr = String::from_utf8_lossy(&output.stderr);
	assert!(stderr.contains("Method stop is not a function or not present"), "stderr: {}", stderr);
	assert!(!ran.exists(), "run() was called with an invalid handle");
}

#[test]
fn test_daemon_writes_pidfile() {
	let dir = TempDir::new().unwrap();
	let ready = dir.path().join("ready");
	let stopped = dir.path().join("stopped");
	let pidfile = dir.path().join("service.pid");
	let script = write_script(
		&dir,
		&format!(
			r#"
			local running = true
			return {{
				run = function()
					io.open({ready}, "w"):close()
					while running do end
				end,
				stop = function()
					running = false
					io.open({stopped}, "w"):close()
				end,
			}}
			"#,
			ready = lua_path(&ready),
			stopped = lua_path(&stopped)
		),
	);

	// Without -f the parent returns immediately with success
	let status = Command::new(env!("CARGO_BIN_EXE_luasvc"))
		.arg("-p")
		.arg(&pidfile)
		.arg(&script)
		.stdout(Stdio::null())
		.stderr(Stdio::null())
		.status()
		.expect("run luasvc");
	assert!(status.success());

	wait_for_file(&ready);
	let pid: libc::pid_t = fs::read_to_string(&pidfile).unwrap().trim().parse().unwrap();
	assert!(pid > 0);

	assert_eq!(unsafe { libc::kill(pid, libc::SIGTERM) }, 0);
	wait_for_file(&stopped);
}

// vim: ts=4
