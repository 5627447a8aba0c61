// self
use crate::{_prelude::*, obs::FlowKind};

/// Future returned by [`FlowSpan::instrument`]; instrumented only with the `tracing` feature.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Future returned by [`FlowSpan::instrument`]; instrumented only with the `tracing` feature.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// `oauth2_ciba.flow` span wrapping one discovery, initiation or poll step.
///
/// Poll spans also carry `interval_secs`, filled in once the step knows the interval it
/// will wait before the next poll.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a span tagged with `kind` and the calling `stage`.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"oauth2_ciba.flow",
				flow = kind.as_str(),
				stage,
				interval_secs = tracing::field::Empty
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Records the interval a pending poll will wait.
	pub fn record_interval(&self, interval: Duration) {
		#[cfg(feature = "tracing")]
		{
			self.span.record("interval_secs", interval.whole_seconds());
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = interval;
		}
	}

	/// Instruments a future without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}
