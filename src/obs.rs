//! Optional observability helpers for backchannel flows.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `oauth2_ciba.flow` with the `flow` and
//!   `stage` (call site) fields.
//! - Enable `metrics` to increment the `oauth2_ciba_flow_total` counter for every recorded
//!   outcome, labeled by `flow` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Flow kinds observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// One-shot metadata discovery.
	Discovery,
	/// Backchannel authentication request.
	Initiation,
	/// Token endpoint polling.
	Poll,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Discovery => "discovery",
			FlowKind::Initiation => "initiation",
			FlowKind::Poll => "poll",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a flow step.
	Attempt,
	/// Successful completion.
	Success,
	/// The provider asked the client to keep waiting.
	Pending,
	/// Failure propagated back to the caller.
	Failure,
	/// The caller cancelled before the step ran.
	Cancelled,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Pending => "pending",
			FlowOutcome::Failure => "failure",
			FlowOutcome::Cancelled => "cancelled",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
