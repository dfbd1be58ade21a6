use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::crash::CrashState;
use crate::output::{Severity, StatusSink};
use crate::process::{ProcessHandle, SpawnError};
use crate::types::*;
use crate::watcher::Restart;

/// How long a predecessor gets after SIGINT before its successor spawns.
pub const GRACE_WINDOW: Duration = Duration::from_secs(1);

pub const PREFIX: &str = "[ respawn ]";

#[derive(Default)]
struct Slot {
	handle: Option<ProcessHandle>,
	closed: bool,
}

/// Owns the single current run of the script.
pub struct Supervisor {
	target: WatchTarget,
	current: Mutex<Slot>,
	crash: CrashState,
	sink: Arc<dyn StatusSink>,
}

impl Supervisor {
	pub fn new(target: WatchTarget, sink: Arc<dyn StatusSink>) -> Arc<Self> {
		Arc::new(Self {
			target,
			current: Mutex::new(Slot::default()),
			crash: CrashState::new(),
			sink,
		})
	}

	pub fn target(&self) -> &WatchTarget {
		&self.target
	}

	pub fn crash_state(&self) -> &CrashState {
		&self.crash
	}

	pub async fn current_pid(&self) -> Option<u32> {
		self.current.lock().await.handle.as_ref().map(|h| h.pid())
	}

	pub async fn current_outcome(&self) -> Option<ExitOutcome> {
		self.current.lock().await.handle.as_ref().and_then(|h| h.outcome())
	}

	pub async fn is_shut_down(&self) -> bool {
		self.current.lock().await.closed
	}

	/// Stop the current run (if any), then start a fresh one and return its
	/// pid. Returns `None` without spawning once [`Supervisor::shutdown`] has
	/// been called.
	///
	/// The current-handle slot stays locked for the whole call, so concurrent
	/// callers queue up behind the grace window instead of spawning over a
	/// predecessor that may still be alive.
	pub async fn start_or_restart(&self, launch: Launch) -> Result<Option<u32>, SpawnError> {
		let mut current = self.current.lock().await;
		if current.closed {
			tracing::debug!(
				"supervisor shut down, not starting {}",
				self.target.script.display()
			);
			return Ok(None);
		}

		if let Some(previous) = current.handle.as_ref() {
			self.crash.retire_run();
			previous.terminate_group(GRACE_WINDOW).await;
		}

		let script = self.target.script.display();
		if !launch.is_restart() {
			self.sink.emit(
				Severity::Info,
				&format!("{} Directory watcher added {}", PREFIX, script),
			);
			self.sink.emit(
				Severity::Info,
				&format!("{} Restart handler added {}", PREFIX, script),
			);
			self.sink
				.emit(Severity::Info, &format!("{} Starting script {}", PREFIX, script));
		}

		let (handle, waiter) = ProcessHandle::spawn(&self.target)?;
		let pid = handle.pid();
		current.handle = Some(handle);

		let run = self.crash.begin_run();

		let crash = self.crash.clone();
		let sink = Arc::clone(&self.sink);
		tokio::spawn(async move {
			let outcome = waiter.await_exit().await;
			if !crash.record_exit(run, &outcome) {
				tracing::debug!("superseded run (pid {}) ended: {}", pid, outcome);
				return;
			}
			if outcome.is_abnormal() {
				sink.emit(
					Severity::Error,
					&format!("Script exited with error: {}", outcome),
				);
				sink.emit(
					Severity::Crash,
					&format!("{} Waiting for file changes before restarting...", PREFIX),
				);
			} else {
				sink.emit(
					Severity::Info,
					&format!("{} Script finished. Waiting for file changes...", PREFIX),
				);
			}
		});

		Ok(Some(pid))
	}

	/// Interrupt the current run and give it up to the grace window to exit.
	/// Later calls to [`Supervisor::start_or_restart`] spawn nothing.
	pub async fn shutdown(&self) -> Option<ExitOutcome> {
		let handle = {
			let mut current = self.current.lock().await;
			current.closed = true;
			current.handle.take()?
		};
		self.crash.retire_run();
		let outcome = handle.terminate_within(GRACE_WINDOW).await;
		match outcome {
			Some(o) => tracing::debug!("script (pid {}) stopped: {}", handle.pid(), o),
			None => tracing::warn!(
				"script (pid {}) still running after {:?}",
				handle.pid(),
				GRACE_WINDOW
			),
		}
		outcome
	}
}

impl Restart for Supervisor {
	fn is_crashed(&self) -> bool {
		self.crash.is_crashed()
	}

	fn restart(&self, reason: RestartReason) -> impl Future<Output = Result<(), SpawnError>> + Send {
		async move {
			self.start_or_restart(Launch::Restart(reason)).await?;
			Ok(())
		}
	}
}
