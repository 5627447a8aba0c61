//! Authentication session state and the initiation request that creates it.

// std
use std::time::Duration as StdDuration;
// crates.io
use oauth2::http::StatusCode;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	auth::{AuthReqId, ChallengeId, TokenBundle, TokenSecret},
	ciba::AuthenticationHints,
	error::{ConfigError, MalformedResponseError, decode_json},
	http::{BackchannelHttpClient, capped_seconds},
	issuer::{EndpointKind, Issuer},
	oauth::{ErrorResponse, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Poll interval used when the provider does not send one.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::seconds(5);
/// Amount added to the poll interval on every `slow_down` answer.
pub const DEFAULT_SLOW_DOWN_INCREMENT: Duration = Duration::seconds(5);
/// Smallest increment applied on `slow_down`, whatever the options say.
pub const MIN_SLOW_DOWN_INCREMENT: Duration = Duration::seconds(1);
/// Longest interval a session will wait between polls.
///
/// Provider intervals and `Retry-After` values above this are cut down to it.
pub const MAX_POLL_INTERVAL: Duration = Duration::days(1);

/// How an `authorization_viewed` answer is treated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ViewedPolicy {
	/// End the session with the provider error.
	#[default]
	Terminal,
	/// Keep polling at the current interval.
	Pending,
}

/// Caller-side tuning for a session's poll loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionOptions {
	/// Lower bound applied to the provider's interval.
	pub min_interval: Option<Duration>,
	/// Interval used when the provider omits one.
	pub default_interval: Duration,
	/// Amount added to the interval on `slow_down`; raised to [`MIN_SLOW_DOWN_INCREMENT`] when
	/// smaller.
	pub slow_down_increment: Duration,
	/// Handling of `authorization_viewed`.
	pub viewed_policy: ViewedPolicy,
}
impl SessionOptions {
	/// Sets the interval floor.
	pub fn with_min_interval(mut self, interval: Duration) -> Self {
		self.min_interval = Some(interval);

		self
	}

	/// Sets the fallback interval.
	pub fn with_default_interval(mut self, interval: Duration) -> Self {
		self.default_interval = interval;

		self
	}

	/// Sets the slow-down increment.
	pub fn with_slow_down_increment(mut self, increment: Duration) -> Self {
		self.slow_down_increment = increment;

		self
	}

	/// Sets the `authorization_viewed` policy.
	pub fn with_viewed_policy(mut self, policy: ViewedPolicy) -> Self {
		self.viewed_policy = policy;

		self
	}

	/// Resolves the first poll interval from the provider's hint.
	pub fn initial_interval(&self, provider_interval: Option<u64>) -> Duration {
		let provided = provider_interval
			.filter(|secs| *secs > 0)
			.map(|secs| capped_seconds(secs, MAX_POLL_INTERVAL))
			.unwrap_or(self.default_interval);

		self.clamp_interval(provided)
	}

	/// Interval that follows a `slow_down` answer.
	///
	/// Grows `current` by the increment and honors a longer `Retry-After`. The result is
	/// strictly greater than `current` unless `current` already sits at [`MAX_POLL_INTERVAL`].
	pub fn slowed_interval(&self, current: Duration, retry_after: Option<Duration>) -> Duration {
		let step = self.slow_down_increment.max(MIN_SLOW_DOWN_INCREMENT);
		let bumped = current.saturating_add(step);
		let wanted = retry_after.map_or(bumped, |retry_after| bumped.max(retry_after));

		self.clamp_interval(wanted)
	}

	/// Applies the caller floor, the positive fallback and the [`MAX_POLL_INTERVAL`] ceiling.
	///
	/// Non-positive results fall back to [`DEFAULT_POLL_INTERVAL`].
	pub fn clamp_interval(&self, interval: Duration) -> Duration {
		let floored = match self.min_interval {
			Some(min) => interval.max(min),
			None => interval,
		};
		let positive = if floored.is_positive() { floored } else { DEFAULT_POLL_INTERVAL };

		positive.min(MAX_POLL_INTERVAL)
	}
}
impl Default for SessionOptions {
	fn default() -> Self {
		Self {
			min_interval: None,
			default_interval: DEFAULT_POLL_INTERVAL,
			slow_down_increment: DEFAULT_SLOW_DOWN_INCREMENT,
			viewed_policy: ViewedPolicy::default(),
		}
	}
}

/// Out-of-band challenge (`qr_data` + `qr_secret`) some providers attach to the initiation
/// response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutOfBandChallenge {
	/// Challenge identifier shown to the user.
	pub id: ChallengeId,
	/// Shared secret signing the proof token.
	pub secret: TokenSecret,
}

#[derive(Debug, Deserialize)]
struct InitiationResponse {
	auth_req_id: AuthReqId,
	#[serde(default)]
	expires_in: Option<u64>,
	#[serde(default)]
	interval: Option<u64>,
	#[serde(default)]
	qr_data: Option<String>,
	#[serde(default)]
	qr_secret: Option<String>,
}
impl InitiationResponse {
	fn challenge(&self) -> Option<OutOfBandChallenge> {
		let id = ChallengeId::new(self.qr_data.as_deref()?).ok()?;
		let secret = self.qr_secret.as_deref().filter(|secret| !secret.is_empty())?;

		Some(OutOfBandChallenge { id, secret: TokenSecret::new(secret) })
	}
}

/// One in-flight backchannel authentication, borrowed from its [`Issuer`].
///
/// The `auth_req_id` is fixed for the life of the session. Polling requires `&mut self`, so a
/// session never has more than one outstanding request; once a poll succeeds or fails for
/// good the session is closed and further polls return [`Error::SessionClosed`].
pub struct AuthSession<'a, C, M>
where
	C: ?Sized + BackchannelHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) issuer: &'a Issuer<C, M>,
	pub(crate) auth_req_id: AuthReqId,
	pub(crate) expires_in: Option<Duration>,
	pub(crate) interval: Duration,
	pub(crate) started_at: OffsetDateTime,
	pub(crate) next_poll_at: Instant,
	pub(crate) challenge: Option<OutOfBandChallenge>,
	pub(crate) options: SessionOptions,
	pub(crate) terminated: bool,
}
impl<'a, C, M> AuthSession<'a, C, M>
where
	C: ?Sized + BackchannelHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Provider-assigned request identifier.
	pub fn auth_req_id(&self) -> &AuthReqId {
		&self.auth_req_id
	}

	/// Lifetime the provider granted to the request, when it sent one.
	pub fn expires_in(&self) -> Option<Duration> {
		self.expires_in
	}

	/// Current poll interval.
	pub fn interval(&self) -> Duration {
		self.interval
	}

	/// Wall-clock time at which the provider accepted the request.
	pub fn started_at(&self) -> OffsetDateTime {
		self.started_at
	}

	/// Runtime instant of the next scheduled poll.
	pub fn next_poll_at(&self) -> Instant {
		self.next_poll_at
	}

	/// Out-of-band challenge, when the provider attached one.
	pub fn challenge(&self) -> Option<&OutOfBandChallenge> {
		self.challenge.as_ref()
	}

	/// Options the session was started with.
	pub fn options(&self) -> &SessionOptions {
		&self.options
	}

	/// Returns true once a poll produced a terminal outcome.
	pub fn is_terminated(&self) -> bool {
		self.terminated
	}

	/// Issuer the session belongs to.
	pub fn issuer(&self) -> &'a Issuer<C, M> {
		self.issuer
	}

	fn from_response(
		issuer: &'a Issuer<C, M>,
		response: InitiationResponse,
		options: SessionOptions,
	) -> Self {
		let interval = options.initial_interval(response.interval);
		let challenge = response.challenge();

		Self {
			issuer,
			auth_req_id: response.auth_req_id,
			expires_in: response.expires_in.map(|secs| capped_seconds(secs, Duration::MAX)),
			interval,
			started_at: OffsetDateTime::now_utc(),
			next_poll_at: deadline_after(interval),
			challenge,
			options,
			terminated: false,
		}
	}
}
impl<C, M> Debug for AuthSession<'_, C, M>
where
	C: ?Sized + BackchannelHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthSession")
			.field("issuer", &self.issuer.issuer())
			.field("auth_req_id", &self.auth_req_id)
			.field("expires_in", &self.expires_in)
			.field("interval", &self.interval)
			.field("started_at", &self.started_at)
			.field("challenge", &self.challenge)
			.field("terminated", &self.terminated)
			.finish()
	}
}

impl<C, M> Issuer<C, M>
where
	C: ?Sized + BackchannelHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Sends a backchannel authentication request and returns the resulting session.
	///
	/// Endpoint and delivery-mode checks run before any request is sent. The request is
	/// never retried.
	pub async fn start_authentication(
		&self,
		hints: &AuthenticationHints,
		options: SessionOptions,
	) -> Result<AuthSession<'_, C, M>> {
		const KIND: FlowKind = FlowKind::Initiation;

		let span = FlowSpan::new(KIND, "start_authentication");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.initiate(hints, options)).await;

		obs::record_result(KIND, &result);

		result
	}

	/// Starts a session and polls it to completion.
	///
	/// Cancelling `cancel` aborts both the initiation request and the poll loop.
	pub async fn authenticate(
		&self,
		hints: &AuthenticationHints,
		options: SessionOptions,
		cancel: &CancellationToken,
	) -> Result<TokenBundle> {
		let mut session = tokio::select! {
			biased;
			_ = cancel.cancelled() => {
				obs::record_flow_outcome(FlowKind::Initiation, FlowOutcome::Cancelled);

				return Err(Error::Cancelled);
			},
			session = self.start_authentication(hints, options) => session?,
		};

		session.run_until_complete(cancel).await
	}

	async fn initiate(
		&self,
		hints: &AuthenticationHints,
		options: SessionOptions,
	) -> Result<AuthSession<'_, C, M>> {
		let endpoint = self.metadata.endpoint(EndpointKind::Initiation)?;

		self.metadata.endpoint(EndpointKind::Token)?;

		if !self.metadata.supports_poll_mode() {
			return Err(ConfigError::PollModeUnsupported { issuer: self.issuer().to_owned() }.into());
		}

		let response = self.post_form(EndpointKind::Initiation, endpoint, hints.to_form()).await?;
		let status = response.status();

		if status != StatusCode::OK {
			return Err(match ErrorResponse::parse(response.body(), status.as_u16()) {
				Some(envelope) => envelope.into(),
				None => MalformedResponseError::InitiationFailed { status: status.as_u16() }.into(),
			});
		}

		let body = decode_json::<InitiationResponse>(response.body(), status.as_u16())?;

		Ok(AuthSession::from_response(self, body, options))
	}
}

fn to_std(duration: Duration) -> StdDuration {
	StdDuration::try_from(duration).unwrap_or_default()
}

/// Runtime instant one `interval` from now.
pub(crate) fn deadline_after(interval: Duration) -> Instant {
	let now = Instant::now();

	now.checked_add(to_std(interval.min(MAX_POLL_INTERVAL))).unwrap_or(now)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn initial_interval_prefers_provider_then_default_then_floor() {
		let options = SessionOptions::default();

		assert_eq!(options.initial_interval(Some(7)), Duration::seconds(7));
		assert_eq!(options.initial_interval(None), DEFAULT_POLL_INTERVAL);
		assert_eq!(options.initial_interval(Some(0)), DEFAULT_POLL_INTERVAL);

		let floored = SessionOptions::default().with_min_interval(Duration::seconds(10));

		assert_eq!(floored.initial_interval(Some(2)), Duration::seconds(10));
		assert_eq!(floored.initial_interval(Some(30)), Duration::seconds(30));
	}

	#[test]
	fn initial_interval_is_always_positive() {
		let options = SessionOptions::default().with_default_interval(Duration::ZERO);

		assert_eq!(options.initial_interval(None), DEFAULT_POLL_INTERVAL);
	}

	#[test]
	fn oversized_provider_intervals_are_capped() {
		let options = SessionOptions::default();

		assert_eq!(options.initial_interval(Some(u64::MAX)), MAX_POLL_INTERVAL);
		assert_eq!(options.initial_interval(Some(90_000)), MAX_POLL_INTERVAL);
		assert_eq!(
			options.with_min_interval(Duration::weeks(1)).initial_interval(Some(5)),
			MAX_POLL_INTERVAL
		);
	}

	#[test]
	fn slowed_interval_always_grows_and_stays_positive() {
		let five = Duration::seconds(5);

		assert_eq!(SessionOptions::default().slowed_interval(five, None), Duration::seconds(10));
		assert_eq!(
			SessionOptions::default().slowed_interval(five, Some(Duration::seconds(30))),
			Duration::seconds(30)
		);

		for increment in [Duration::ZERO, Duration::seconds(-10), Duration::MIN] {
			let options = SessionOptions::default().with_slow_down_increment(increment);

			assert_eq!(options.slowed_interval(five, None), Duration::seconds(6));
		}

		let floored = SessionOptions::default().with_min_interval(Duration::seconds(20));

		assert_eq!(floored.slowed_interval(five, None), Duration::seconds(20));
	}

	#[test]
	fn slowed_interval_saturates_at_the_ceiling() {
		let options = SessionOptions::default().with_slow_down_increment(Duration::MAX);

		assert_eq!(options.slowed_interval(Duration::seconds(5), None), MAX_POLL_INTERVAL);
		assert_eq!(
			SessionOptions::default().slowed_interval(MAX_POLL_INTERVAL, Some(Duration::MAX)),
			MAX_POLL_INTERVAL
		);
	}

	#[test]
	fn challenge_requires_both_data_and_secret() {
		let decode = |json: &str| {
			serde_json::from_str::<InitiationResponse>(json)
				.expect("Initiation fixture should decode.")
				.challenge()
		};
		let challenge = decode(r#"{"auth_req_id":"abc","qr_data":"c-1","qr_secret":"s"}"#)
			.expect("Both fields present should yield a challenge.");

		assert_eq!(&*challenge.id, "c-1");
		assert_eq!(challenge.secret.expose(), "s");
		assert!(decode(r#"{"auth_req_id":"abc","qr_data":"c-1"}"#).is_none());
		assert!(decode(r#"{"auth_req_id":"abc","qr_data":"","qr_secret":"s"}"#).is_none());
	}

	#[test]
	fn empty_auth_req_id_fails_to_decode() {
		let err = decode_json::<InitiationResponse>(br#"{"auth_req_id":"","interval":5}"#, 200)
			.expect_err("Empty request identifiers should be rejected.");

		assert_eq!(err.status(), 200);
		assert!(decode_json::<InitiationResponse>(br#"{"interval":5}"#, 200).is_err());
	}

	#[test]
	fn negative_durations_convert_to_zero() {
		assert_eq!(to_std(Duration::seconds(-3)), StdDuration::ZERO);
		assert_eq!(to_std(Duration::milliseconds(1_500)), StdDuration::from_millis(1_500));
	}
}
