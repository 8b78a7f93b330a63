use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use std::process::ExitCode;

use luasvc::config::ServiceConfig;
use luasvc::logging::{error, init_tracing};
use luasvc::supervisor;

fn cli() -> Command {
	Command::new("luasvc")
		.version(env!("CARGO_PKG_VERSION"))
		.author("Szilard Hajba <szilu@symbion.hu>")
		.about("Run a Lua script as a service")
		.arg(
			Arg::new("pidfile")
				.short('p')
				.long("pidfile")
				.value_name("FILE")
				.value_parser(value_parser!(PathBuf))
				.help("Write the service pid to FILE"),
		)
		.arg(
			Arg::new("library")
				.short('l')
				.long("library")
				.value_name("NAME")
				.action(ArgAction::Append)
				.help("Require library NAME before loading the script"),
		)
		.arg(
			Arg::new("config")
				.short('c')
				.long("config")
				.value_name("FILE")
				.value_parser(value_parser!(PathBuf))
				.help("Read settings from a TOML or JSON5 file"),
		)
		.arg(
			Arg::new("foreground")
				.short('f')
				.long("foreground")
				.action(ArgAction::SetTrue)
				.help("Do not fork into the background"),
		)
		.arg(
			Arg::new("checkpoint-interval")
				.long("checkpoint-interval")
				.value_name("N")
				.value_parser(value_parser!(u32).range(1..))
				.help("VM instructions between safe-point checks"),
		)
		.arg(
			Arg::new("log-level")
				.long("log-level")
				.value_name("LEVEL")
				.help("Log level when RUST_LOG is not set"),
		)
		.arg(Arg::new("script").value_name("SCRIPT").help("Service script, '-' for stdin"))
		.arg(
			Arg::new("args")
				.value_name("ARGS")
				.num_args(0..)
				.trailing_var_arg(true)
				.allow_hyphen_values(true)
				.help("Arguments passed to the script"),
		)
}

/// Defaults, then the config file, then command line flags
fn build_config(matches: &ArgMatches) -> Result<ServiceConfig, luasvc::ServiceError> {
	let mut config = match matches.get_one::<PathBuf>("config") {
		Some(path) => ServiceConfig::from_file(path)?,
		None => ServiceConfig::default(),
	};

	if let Some(pidfile) = matches.get_one::<PathBuf>("pidfile") {
		config.pidfile = Some(pidfile.clone());
	}
	if let Some(libs) = matches.get_many::<String>("library") {
		config.libraries = libs.cloned().collect();
	}
	if matches.get_flag("foreground") {
		config.foreground = true;
	}
	if let Some(interval) = matches.get_one::<u32>("checkpoint-interval") {
		config.checkpoint_interval = *interval;
	}
	if let Some(level) = matches.get_one::<String>("log-level") {
		config.log_level = level.clone();
	}
	if let Some(script) = matches.get_one::<String>("script") {
		config.script = script.clone();
		config.script_args =
			matches.get_many::<String>("args").map(|a| a.cloned().collect()).unwrap_or_default();
	}
	if let Some(name) = std::env::args().next() {
		config.program_name = name;
	}

	Ok(config)
}

fn main() -> ExitCode {
	let matches = cli().get_matches();

	let config = match build_config(&matches) {
		Ok(config) => config,
		Err(e) => {
			init_tracing("info");
			error!("{}", e);
			return ExitCode::FAILURE;
		}
	};

	init_tracing(&config.log_level);
	supervisor::supervise(&config)
}


// vim: ts=4
