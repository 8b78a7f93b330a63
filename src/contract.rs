//! Script contract: the value returned by the main script must be a table
//! exposing callable `run` and `stop` entry points.

use mlua::{Function, Lua, Table, Value};

use crate::error::StartupError;

/// Service body entry point
pub const METHOD_RUN: &str = "run";

/// Graceful stop entry point
pub const METHOD_STOP: &str = "stop";

/// Entry points checked before the service loop starts, in order
pub const REQUIRED_METHODS: [&str; 2] = [METHOD_RUN, METHOD_STOP];

/// Registry slot the validated handle is retained in
const HANDLE_REGISTRY_KEY: &str = "luasvc.service";

/// Validated script-returned object
///
/// Once retained it lives in the Lua registry for the rest of the process;
/// entry points are looked up from there at every call so a script that
/// swaps in a new (still callable) `run` between iterations keeps working.
#[derive(Debug, Clone)]
pub struct ServiceHandle {
	table: Table,
}

impl ServiceHandle {
	/// Check `value` against the contract.
	///
	/// Fails on the first missing or non-callable entry point, naming it.
	pub fn validate(value: Value) -> Result<Self, StartupError> {
		let table = match value {
			Value::Table(table) => table,
			other => {
				return Err(StartupError::NotATable { found: other.type_name().to_string() })
			}
		};

		for method in REQUIRED_METHODS.iter() {
			match table.get::<Value>(*method)? {
				Value::Function(_) => {}
				_ => return Err(StartupError::MissingMethod { method: method.to_string() }),
			}
		}

		Ok(ServiceHandle { table })
	}

	/// Store the handle in the registry for the remainder of the process
	pub fn retain(self, lua: &Lua) -> mlua::Result<()> {
		lua.set_named_registry_value(HANDLE_REGISTRY_KEY, self.table)
	}

	/// Fetch the retained handle
	pub fn retained(lua: &Lua) -> mlua::Result<Self> {
		let table: Table = lua.named_registry_value(HANDLE_REGISTRY_KEY)?;
		Ok(ServiceHandle { table })
	}

	/// Resolve an entry point on the retained handle right now
	pub fn method(lua: &Lua, name: &str) -> mlua::Result<Function> {
		let handle = Self::retained(lua)?;
		match handle.table.get::<Value>(name)? {
			Value::Function(function) => Ok(function),
			other => Err(mlua::Error::runtime(format!(
				"Method {} is not a function (got {})",
				name,
				other.type_name()
			))),
		}
	}
}


// vim: ts=4
