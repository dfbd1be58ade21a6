use std::io::Write;
use std::sync::{Arc, Mutex};

use owo_colors::OwoColorize;

/// Severity class of a status line. Each class has its own color on a
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
	Info,
	Success,
	Crash,
	Error,
}

/// Destination for the supervisor's user-facing status lines.
pub trait StatusSink: Send + Sync {
	fn emit(&self, severity: Severity, line: &str);
}

/// Writes status lines to stderr, colored by severity.
pub struct Terminal {
	color: bool,
}

impl Terminal {
	pub fn new(color: bool) -> Self {
		Self { color }
	}
}

impl StatusSink for Terminal {
	fn emit(&self, severity: Severity, line: &str) {
		let mut stderr = std::io::stderr().lock();
		let _ = if self.color {
			match severity {
				Severity::Info => writeln!(stderr, "{}", line.blue()),
				Severity::Success => writeln!(stderr, "{}", line.green()),
				Severity::Crash => writeln!(stderr, "{}", line.yellow()),
				Severity::Error => writeln!(stderr, "{}", line.red()),
			}
		} else {
			writeln!(stderr, "{}", line)
		};
	}
}

/// Keeps every status line in memory. Clones share the same buffer.
#[derive(Clone, Default)]
pub struct Recorder {
	lines: Arc<Mutex<Vec<(Severity, String)>>>,
}

impl Recorder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn snapshot(&self) -> Vec<(Severity, String)> {
		self.lines.lock().unwrap_or_else(|e| e.into_inner()).clone()
	}

	pub fn count(&self, severity: Severity) -> usize {
		self.snapshot().iter().filter(|(s, _)| *s == severity).count()
	}

	pub fn contains(&self, severity: Severity, needle: &str) -> bool {
		self.snapshot()
			.iter()
			.any(|(s, line)| *s == severity && line.contains(needle))
	}
}

impl StatusSink for Recorder {
	fn emit(&self, severity: Severity, line: &str) {
		self.lines
			.lock()
			.unwrap_or_else(|e| e.into_inner())
			.push((severity, line.to_string()));
	}
}
