//! Token endpoint polling: one attempt, its classification, and the cooperative loop.

// crates.io
use oauth2::{HttpResponse, http::StatusCode};
use tokio::time;
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	auth::TokenBundle,
	ciba::{AuthSession, ViewedPolicy, session::deadline_after},
	error::{MalformedResponseError, decode_json},
	http::{BackchannelHttpClient, parse_retry_after},
	issuer::EndpointKind,
	oauth::{ErrorCode, ErrorResponse, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Grant type used when polling the token endpoint.
pub const CIBA_GRANT_TYPE: &str = "urn:openid:params:grant-type:ciba";

/// Result of a single poll.
#[derive(Debug)]
pub enum PollOutcome {
	/// The user has not finished yet; poll again after `interval`.
	Pending {
		/// Interval to wait before the next poll.
		interval: Duration,
		/// True when the provider asked the client to slow down.
		slowed_down: bool,
	},
	/// The user approved and the provider issued tokens.
	Success(TokenBundle),
	/// The session ended with an error.
	Fatal(Error),
}
impl PollOutcome {
	/// Returns true for [`PollOutcome::Success`] and [`PollOutcome::Fatal`].
	pub fn is_terminal(&self) -> bool {
		!matches!(self, Self::Pending { .. })
	}
}

/// Poll response classified before session state is updated.
#[derive(Debug)]
pub(crate) enum Verdict {
	Success(TokenBundle),
	Pending,
	SlowDown { retry_after: Option<Duration> },
	Fatal(Error),
}

/// Maps a token endpoint response onto exactly one verdict.
pub(crate) fn classify(response: &HttpResponse, viewed: ViewedPolicy) -> Verdict {
	let status = response.status();
	let body = response.body();

	if status == StatusCode::OK {
		return match decode_json::<TokenBundle>(body, status.as_u16()) {
			Ok(bundle) => Verdict::Success(bundle),
			Err(e) => Verdict::Fatal(e.into()),
		};
	}

	let Some(envelope) = ErrorResponse::parse(body, status.as_u16()) else {
		return Verdict::Fatal(MalformedResponseError::PollFailed { status: status.as_u16() }.into());
	};

	match envelope.error {
		ErrorCode::AuthorizationPending => Verdict::Pending,
		ErrorCode::SlowDown =>
			Verdict::SlowDown { retry_after: parse_retry_after(response.headers()) },
		ErrorCode::AuthorizationViewed if viewed == ViewedPolicy::Pending => Verdict::Pending,
		_ => Verdict::Fatal(envelope.into()),
	}
}

impl<C, M> AuthSession<'_, C, M>
where
	C: ?Sized + BackchannelHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Performs one poll of the token endpoint.
	///
	/// Transport failures are fatal and never retried. After a terminal outcome the session
	/// is closed and every later call yields [`Error::SessionClosed`] without a request.
	///
	/// The next deadline moves one interval past the start of the attempt before the request
	/// goes out, so dropping this future mid-flight still leaves a full interval to wait.
	pub async fn poll(&mut self) -> PollOutcome {
		const KIND: FlowKind = FlowKind::Poll;

		if self.terminated {
			return PollOutcome::Fatal(Error::SessionClosed);
		}

		let span = FlowSpan::new(KIND, "poll");
		let metrics = self.issuer.poll_metrics.clone();

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		metrics.record_attempt();

		self.next_poll_at = deadline_after(self.interval);

		let verdict = match span.instrument(self.request_token()).await {
			Ok(response) => classify(&response, self.options.viewed_policy),
			Err(e) => Verdict::Fatal(e),
		};
		let outcome = match verdict {
			Verdict::Pending => PollOutcome::Pending { interval: self.interval, slowed_down: false },
			Verdict::SlowDown { retry_after } => {
				self.interval = self.options.slowed_interval(self.interval, retry_after);

				PollOutcome::Pending { interval: self.interval, slowed_down: true }
			},
			Verdict::Success(bundle) => PollOutcome::Success(bundle),
			Verdict::Fatal(e) => PollOutcome::Fatal(e),
		};

		self.next_poll_at = deadline_after(self.interval);

		match &outcome {
			PollOutcome::Pending { interval, slowed_down } => {
				span.record_interval(*interval);
				metrics.record_pending(*slowed_down);
				obs::record_flow_outcome(KIND, FlowOutcome::Pending);
			},
			PollOutcome::Success(_) => {
				self.terminated = true;

				metrics.record_terminal();
				obs::record_flow_outcome(KIND, FlowOutcome::Success);
			},
			PollOutcome::Fatal(_) => {
				self.terminated = true;

				metrics.record_terminal();
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
			},
		}

		outcome
	}

	/// Polls at the session interval until a terminal outcome or cancellation.
	///
	/// Each wait lasts one full interval, measured from when the previous attempt resolved
	/// (or from initiation for the first poll). Cancellation wins over a due poll and also
	/// aborts a request in flight. A cancelled session stays open and can be resumed; after
	/// an aborted request the resumed loop still waits one interval from that attempt.
	pub async fn run_until_complete(&mut self, cancel: &CancellationToken) -> Result<TokenBundle> {
		loop {
			if self.terminated {
				return Err(Error::SessionClosed);
			}

			tokio::select! {
				biased;
				_ = cancel.cancelled() => return Err(cancelled()),
				_ = time::sleep_until(self.next_poll_at) => {},
			}

			let outcome = tokio::select! {
				biased;
				_ = cancel.cancelled() => return Err(cancelled()),
				outcome = self.poll() => outcome,
			};

			match outcome {
				PollOutcome::Pending { .. } => continue,
				PollOutcome::Success(bundle) => return Ok(bundle),
				PollOutcome::Fatal(e) => return Err(e),
			}
		}
	}

	async fn request_token(&self) -> Result<HttpResponse> {
		let endpoint = self.issuer.metadata.endpoint(EndpointKind::Token)?;
		let form = BTreeMap::from([
			("auth_req_id".to_owned(), self.auth_req_id.to_string()),
			("grant_type".to_owned(), CIBA_GRANT_TYPE.to_owned()),
		]);

		self.issuer.post_form(EndpointKind::Token, endpoint, form).await
	}
}

fn cancelled() -> Error {
	obs::record_flow_outcome(FlowKind::Poll, FlowOutcome::Cancelled);

	Error::Cancelled
}

#[cfg(test)]
mod tests {
	// crates.io
	use oauth2::http::{HeaderValue, header::RETRY_AFTER};
	// self
	use super::*;

	fn response(status: u16, body: &str) -> HttpResponse {
		let mut response = HttpResponse::new(body.as_bytes().to_vec());

		*response.status_mut() = StatusCode::from_u16(status).expect("Fixture status is valid.");

		response
	}

	#[test]
	fn success_decodes_the_token_bundle() {
		let verdict = classify(
			&response(200, r#"{"id_token":"a.b.c","token_type":"Bearer"}"#),
			ViewedPolicy::Terminal,
		);

		assert!(matches!(verdict, Verdict::Success(bundle) if bundle.id_token.expose() == "a.b.c"));
	}

	#[test]
	fn undecodable_success_is_fatal() {
		let verdict = classify(&response(200, "<html>"), ViewedPolicy::Terminal);

		assert!(matches!(verdict, Verdict::Fatal(Error::Malformed(MalformedResponseError::Decode {
			status: 200,
			..
		}))));
	}

	#[test]
	fn pending_and_slow_down_keep_the_session_alive() {
		assert!(matches!(
			classify(&response(400, r#"{"error":"authorization_pending"}"#), ViewedPolicy::Terminal),
			Verdict::Pending
		));

		let mut slow = response(400, r#"{"error":"slow_down"}"#);

		slow.headers_mut().insert(RETRY_AFTER, HeaderValue::from_static("20"));

		assert!(matches!(
			classify(&slow, ViewedPolicy::Terminal),
			Verdict::SlowDown { retry_after: Some(d) } if d == Duration::seconds(20)
		));
	}

	#[test]
	fn viewed_follows_the_policy() {
		let viewed = response(400, r#"{"error":"authorization_viewed"}"#);

		assert!(matches!(classify(&viewed, ViewedPolicy::Pending), Verdict::Pending));

		let Verdict::Fatal(e) = classify(&viewed, ViewedPolicy::Terminal) else {
			panic!("Viewed should be terminal by default.");
		};

		assert_eq!(e.code(), Some(&ErrorCode::AuthorizationViewed));
	}

	#[test]
	fn other_codes_and_unparseable_bodies_are_fatal() {
		let Verdict::Fatal(e) = classify(
			&response(403, r#"{"error":"access_denied","error_description":"User declined."}"#),
			ViewedPolicy::Terminal,
		) else {
			panic!("Access denied should be terminal.");
		};

		assert_eq!(e.code(), Some(&ErrorCode::AccessDenied));
		assert!(e.to_string().contains("User declined."));
		assert!(matches!(
			classify(&response(502, "Bad Gateway"), ViewedPolicy::Terminal),
			Verdict::Fatal(Error::Malformed(MalformedResponseError::PollFailed { status: 502 }))
		));
		assert!(matches!(
			classify(&response(201, "{}"), ViewedPolicy::Terminal),
			Verdict::Fatal(Error::Malformed(MalformedResponseError::PollFailed { status: 201 }))
		));
	}

	#[test]
	fn pending_outcomes_are_not_terminal() {
		assert!(!PollOutcome::Pending { interval: Duration::seconds(5), slowed_down: false }
			.is_terminal());
		assert!(PollOutcome::Fatal(Error::SessionClosed).is_terminal());
	}
}
