use std::io::IsTerminal;
use std::path::PathBuf;

use clap::Parser;

/// Restart a script's runner every time the script changes.
#[derive(Debug, Parser)]
#[command(name = "respawn", version, about)]
pub struct Cli {
	/// Program that runs the script (e.g. bash, python3, node)
	pub runner: String,
	/// Script to run; writes in its directory trigger a restart
	pub script: PathBuf,
	/// Anything after the script is accepted and ignored
	#[arg(hide = true)]
	pub ignored: Vec<String>,
	/// Print status lines without ANSI colors
	#[arg(long)]
	pub no_color: bool,
	/// Show debug diagnostics (pids, signals, raw watch events)
	#[arg(short, long)]
	pub verbose: bool,
}

impl Cli {
	pub fn color(&self) -> bool {
		!self.no_color && std::io::stderr().is_terminal()
	}

	pub fn log_level(&self) -> tracing::Level {
		if self.verbose {
			tracing::Level::DEBUG
		} else {
			tracing::Level::INFO
		}
	}
}
