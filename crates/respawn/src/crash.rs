use std::sync::{Arc, Mutex, MutexGuard};

use crate::types::ExitOutcome;

/// Identifies one run of the script. Advanced by [`CrashState::begin_run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunId(u64);

#[derive(Debug, Default)]
struct Inner {
	crashed: bool,
	run: u64,
}

/// Whether the most recent run ended abnormally.
///
/// Shared between the restart path and the per-run exit waiters. Every
/// access holds the lock only long enough to touch the two fields.
#[derive(Debug, Clone, Default)]
pub struct CrashState {
	inner: Arc<Mutex<Inner>>,
}

impl CrashState {
	pub fn new() -> Self {
		Self::default()
	}

	fn lock(&self) -> MutexGuard<'_, Inner> {
		self.inner.lock().unwrap_or_else(|e| e.into_inner())
	}

	pub fn is_crashed(&self) -> bool {
		self.lock().crashed
	}

	pub fn set_crashed(&self, crashed: bool) {
		self.lock().crashed = crashed;
	}

	/// Start a new run with a clean slate.
	pub fn begin_run(&self) -> RunId {
		let mut inner = self.lock();
		inner.crashed = false;
		inner.run += 1;
		RunId(inner.run)
	}

	/// Detach the current run so its exit no longer touches the flag. Used
	/// right before the supervisor interrupts it on purpose.
	pub fn retire_run(&self) {
		self.lock().run += 1;
	}

	pub fn current_run(&self) -> RunId {
		RunId(self.lock().run)
	}

	/// Record how `run` ended. Returns `false` without touching the flag
	/// when a newer run has already begun.
	pub fn record_exit(&self, run: RunId, outcome: &ExitOutcome) -> bool {
		let mut inner = self.lock();
		if inner.run != run.0 {
			return false;
		}
		if outcome.is_abnormal() {
			inner.crashed = true;
		}
		true
	}
}
