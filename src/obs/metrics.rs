// self
use crate::{
	_prelude::*,
	obs::{FlowKind, FlowOutcome},
};

/// Records a flow outcome via the global metrics recorder (when enabled).
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"oauth2_ciba_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records success or failure for a finished step, using `cancelled` for caller aborts.
pub fn record_result<T>(kind: FlowKind, result: &Result<T>) {
	let outcome = match result {
		Ok(_) => FlowOutcome::Success,
		Err(e) if e.is_cancelled() => FlowOutcome::Cancelled,
		Err(_) => FlowOutcome::Failure,
	};

	record_flow_outcome(kind, outcome);
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recording_is_a_noop_without_metrics() {
		record_flow_outcome(FlowKind::Poll, FlowOutcome::Pending);
		record_result::<()>(FlowKind::Initiation, &Err(Error::Cancelled));
		record_result(FlowKind::Discovery, &Ok(()));
	}
}
