//! Call dispatcher: uniform error handling for every call into the engine
//!
//! Every invocation (script body, `require` of a library, `run`, `stop`) goes
//! through [`call`]. The target runs under `xpcall` with a traceback message
//! handler, failures are reported on the error path and followed by a full
//! garbage collection. A failed call never aborts the process here; callers
//! decide what a failure means.

use mlua::{Function, Lua, MultiValue, Value};

use crate::contract::{ServiceHandle, METHOD_RUN, METHOD_STOP};
use crate::error::{InvocationError, NON_STRING_ERROR};
use crate::logging::*;

const XPCALL_KEY: &str = "luasvc.xpcall";
const TRACEBACK_KEY: &str = "luasvc.traceback";

/// Prepare the engine for dispatching.
///
/// Captures `xpcall` before any user code runs so scripts that shadow the
/// global do not break error reporting.
pub fn install(lua: &Lua) -> mlua::Result<()> {
	let xpcall: Function = lua.globals().get("xpcall")?;
	lua.set_named_registry_value(XPCALL_KEY, xpcall)?;
	let handler = lua.create_function(traceback)?;
	lua.set_named_registry_value(TRACEBACK_KEY, handler)?;
	Ok(())
}

/// Message handler: append `debug.traceback` to text errors, leave any other
/// error value intact.
fn traceback(lua: &Lua, msg: Value) -> mlua::Result<Value> {
	if !matches!(msg, Value::String(_) | Value::Integer(_) | Value::Number(_)) {
		return Ok(msg);
	}
	let debug = match lua.globals().get::<Value>("debug")? {
		Value::Table(debug) => debug,
		_ => return Ok(msg),
	};
	let traceback = match debug.get::<Value>("traceback")? {
		Value::Function(traceback) => traceback,
		_ => return Ok(msg),
	};
	// Level 2 skips this handler and debug.traceback itself
	traceback.call::<Value>((msg, 2))
}

/// Turn an error value into report text. `nil` reports nothing.
fn error_message(value: Value) -> Option<String> {
	match value {
		Value::Nil => None,
		Value::String(s) => Some(s.to_string_lossy().to_string()),
		Value::Integer(i) => Some(i.to_string()),
		Value::Number(n) => Some(n.to_string()),
		Value::Error(e) => Some(e.to_string()),
		_ => Some(NON_STRING_ERROR.to_string()),
	}
}

fn protected_call(
	lua: &Lua,
	function: Function,
	args: MultiValue,
) -> mlua::Result<Result<MultiValue, Value>> {
	let xpcall: Function = lua.named_registry_value(XPCALL_KEY)?;
	let handler: Function = lua.named_registry_value(TRACEBACK_KEY)?;

	let mut call_args = Vec::with_capacity(args.len() + 2);
	call_args.push(Value::Function(function));
	call_args.push(Value::Function(handler));
	call_args.extend(args);

	let mut results = xpcall.call::<MultiValue>(MultiValue::from_vec(call_args))?.into_iter();
	match results.next() {
		Some(Value::Boolean(true)) => Ok(Ok(results.collect())),
		_ => Ok(Err(results.next().unwrap_or(Value::Nil))),
	}
}

/// Invoke `function` with `args` under the dispatcher's error convention.
///
/// `target` names the call in diagnostics.
pub fn call(
	lua: &Lua,
	target: &str,
	function: Function,
	args: MultiValue,
) -> Result<MultiValue, InvocationError> {
	let outcome = match protected_call(lua, function, args) {
		Ok(Ok(values)) => return Ok(values),
		Ok(Err(value)) => InvocationError::new(target, error_message(value)),
		// Raised outside the protected region, e.g. by a checkpoint hook
		// firing on the call into xpcall itself
		Err(e) => InvocationError::new(target, Some(e.to_string())),
	};

	if let Err(e) = lua.gc_collect() {
		warn!("Garbage collection after failed {} call failed: {}", target, e);
	}
	report(&outcome);
	Err(outcome)
}

/// Print a failed call on the error-report path
pub fn report(err: &InvocationError) {
	if let Some(msg) = err.report_text() {
		error!("{}", msg);
	} else {
		debug!("{} failed with a nil error value", err.target);
	}
}

/// Call an entry point of the retained service handle, resolving it first.
pub fn call_method(lua: &Lua, method: &str) -> Result<(), InvocationError> {
	let function = match ServiceHandle::method(lua, method) {
		Ok(function) => function,
		Err(e) => {
			let err = InvocationError::new(method, Some(e.to_string()));
			report(&err);
			return Err(err);
		}
	};
	call(lua, method, function, MultiValue::new()).map(|_| ())
}

/// Invoke the service body once
pub fn call_run(lua: &Lua) -> Result<(), InvocationError> {
	call_method(lua, METHOD_RUN)
}

/// Invoke the service's graceful stop
pub fn call_stop(lua: &Lua) -> Result<(), InvocationError> {
	call_method(lua, METHOD_STOP)
}

/// `require` a library by name, as the `-l` option does
pub fn require_library(lua: &Lua, name: &str) -> Result<(), InvocationError> {
	let target = format!("require \"{}\"", name);
	let require = match lua.globals().get::<Value>("require") {
		Ok(Value::Function(require)) => require,
		Ok(_) => {
			let err = InvocationError::new(&target, Some("require is not available".to_string()));
			report(&err);
			return Err(err);
		}
		Err(e) => {
			let err = InvocationError::new(&target, Some(e.to_string()));
			report(&err);
			return Err(err);
		}
	};
	let name = lua.create_string(name).map_err(|e| InvocationError::new(&target, Some(e.to_string())))?;
	call(lua, &target, require, MultiValue::from_vec(vec![Value::String(name)])).map(|_| ())
}


// vim: ts=4
