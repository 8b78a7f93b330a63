//! Lua engine construction and script loading

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use mlua::{Function, Lua};

use crate::config::STDIN_SCRIPT;
use crate::error::StartupError;

/// Where the main script comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptSource {
	File(PathBuf),
	Stdin,
}

impl ScriptSource {
	/// `-` is always stdin, even after `--`; a file named `-` is given as `./-`
	pub fn from_arg(script: &str) -> Self {
		if script == STDIN_SCRIPT {
			ScriptSource::Stdin
		} else {
			ScriptSource::File(PathBuf::from(script))
		}
	}

	/// Name used in diagnostics
	pub fn display_name(&self) -> String {
		match self {
			ScriptSource::File(path) => path.display().to_string(),
			ScriptSource::Stdin => "stdin".to_string(),
		}
	}

	fn chunk_name(&self) -> String {
		match self {
			ScriptSource::File(path) => format!("@{}", path.display()),
			ScriptSource::Stdin => "=stdin".to_string(),
		}
	}

	fn read(&self) -> io::Result<Vec<u8>> {
		match self {
			ScriptSource::File(path) => fs::read(path),
			ScriptSource::Stdin => {
				let mut buf = Vec::new();
				io::stdin().read_to_end(&mut buf)?;
				Ok(buf)
			}
		}
	}
}

/// Create an engine with the complete standard library, `debug` included.
pub fn create() -> Lua {
	// SAFETY: scripts run with the same trust as the process itself; the
	// debug library is needed for tracebacks in error reports.
	unsafe { Lua::unsafe_new() }
}

/// Populate the global `arg` table: `arg[-1]` program, `arg[0]` script,
/// `arg[1..]` script arguments.
pub fn set_args(lua: &Lua, program: &str, script: &str, args: &[String]) -> mlua::Result<()> {
	let arg = lua.create_table()?;
	arg.raw_set(-1, program)?;
	arg.raw_set(0, script)?;
	for (i, value) in args.iter().enumerate() {
		arg.raw_set(i as i64 + 1, value.as_str())?;
	}
	lua.globals().set("arg", arg)
}

/// Blank out a leading `#!` line, keeping line numbers intact
fn skip_shebang(mut source: Vec<u8>) -> Vec<u8> {
	if source.first() == Some(&b'#') {
		let end = source.iter().position(|&b| b == b'\n').unwrap_or(source.len());
		source.drain(..end);
	}
	source
}

/// Read and compile the main script without running it
pub fn load_script(lua: &Lua, source: &ScriptSource) -> Result<Function, StartupError> {
	let load_error = |message: String| StartupError::ScriptLoad {
		script: source.display_name(),
		message,
	};

	let code = source.read().map_err(|e| load_error(e.to_string()))?;
	lua.load(skip_shebang(code))
		.set_name(source.chunk_name())
		.into_function()
		.map_err(|e| load_error(e.to_string()))
}


// vim: ts=4
