//! Transport primitives for backchannel requests.
//!
//! The module exposes [`BackchannelHttpClient`], the crate's only dependency on an HTTP
//! stack. An [`Issuer`](crate::issuer::Issuer) asks its client for a short-lived
//! [`AsyncHttpClient`] handle per request, so custom transports (a test double, a
//! proxy-aware client, a different TLS stack) plug in without touching the flow code.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
use oauth2::{
	AsyncHttpClient, HttpClientError,
	http::{HeaderMap, header::RETRY_AFTER},
};
#[cfg(feature = "reqwest")] use oauth2::{HttpRequest, HttpResponse};
use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, ciba::MAX_POLL_INTERVAL};
#[cfg(feature = "reqwest")] use crate::{error::ConfigError, issuer::ClientAuth};

/// Abstraction over HTTP transports able to execute backchannel requests.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared by every
/// session of an issuer, and the handles they return must own whatever state the request
/// needs so the request futures stay `Send`.
pub trait BackchannelHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// [`AsyncHttpClient`] handle used for a single request.
	type Handle: for<'c> AsyncHttpClient<
			'c,
			Error = HttpClientError<Self::TransportError>,
			Future: 'c + Send,
		>
		+ 'static
		+ Send
		+ Sync;

	/// Builds a handle for the next request.
	fn handle(&self) -> Self::Handle;
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Backchannel and token endpoints answer directly, so clients built through
/// [`ReqwestHttpClient::for_credentials`] never follow redirects.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client suited to the given credential strategy.
	///
	/// For [`ClientAuth::TlsClientAuth`] the client identity is installed on the TLS layer;
	/// the other strategies authenticate inside the request itself.
	pub fn for_credentials(credentials: &ClientAuth) -> Result<Self, ConfigError> {
		let mut builder = ReqwestClient::builder().redirect(reqwest::redirect::Policy::none());

		if let ClientAuth::TlsClientAuth { identity, .. } = credentials {
			builder = builder.identity(identity.to_reqwest()?);
		}

		Ok(Self(builder.build()?))
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl BackchannelHttpClient for ReqwestHttpClient {
	type Handle = ReqwestHandle;
	type TransportError = ReqwestError;

	fn handle(&self) -> Self::Handle {
		ReqwestHandle(self.0.clone())
	}
}

/// Handle returned by [`ReqwestHttpClient`] that satisfies [`BackchannelHttpClient`].
#[cfg(feature = "reqwest")]
#[derive(Clone)]
pub struct ReqwestHandle(ReqwestClient);
#[cfg(feature = "reqwest")]
impl<'c> AsyncHttpClient<'c> for ReqwestHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let client = self.0.clone();

		Box::pin(async move {
			let response =
				client.execute(request.try_into().map_err(Box::new)?).await.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let mut response_new =
				HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}

/// Converts a wire seconds count into a [`Duration`] no longer than `ceiling`.
pub(crate) fn capped_seconds(secs: u64, ceiling: Duration) -> Duration {
	match i64::try_from(secs) {
		Ok(secs) => Duration::seconds(secs).min(ceiling),
		Err(_) => ceiling,
	}
}

/// Reads a `Retry-After` header as a relative duration (delta-seconds or HTTP date), capped
/// at [`MAX_POLL_INTERVAL`].
pub(crate) fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(capped_seconds(secs, MAX_POLL_INTERVAL));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta.min(MAX_POLL_INTERVAL));
		}
	}

	None
}
