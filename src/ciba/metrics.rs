// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for token endpoint polling, shared by every session of an issuer.
#[derive(Debug, Default)]
pub struct PollMetrics {
	attempts: AtomicU64,
	pending: AtomicU64,
	slow_downs: AtomicU64,
	terminal: AtomicU64,
}
impl PollMetrics {
	/// Returns the total number of poll requests issued.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of polls answered with "keep waiting" (including slow downs).
	pub fn pending(&self) -> u64 {
		self.pending.load(Ordering::Relaxed)
	}

	/// Returns the number of `slow_down` answers.
	pub fn slow_downs(&self) -> u64 {
		self.slow_downs.load(Ordering::Relaxed)
	}

	/// Returns the number of polls that ended a session, successfully or not.
	pub fn terminal(&self) -> u64 {
		self.terminal.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_pending(&self, slowed_down: bool) {
		self.pending.fetch_add(1, Ordering::Relaxed);

		if slowed_down {
			self.slow_downs.fetch_add(1, Ordering::Relaxed);
		}
	}

	pub(crate) fn record_terminal(&self) {
		self.terminal.fetch_add(1, Ordering::Relaxed);
	}
}
