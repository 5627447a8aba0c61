//! OpenID client-initiated backchannel authentication (CIBA) for Rust: pluggable client
//! credentials, typed initiation hints, and a cancellable poll loop over any HTTP transport.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod ciba;
pub mod codec;
pub mod error;
pub mod http;
pub mod issuer;
pub mod oauth;
pub mod obs;
#[cfg(any(test, feature = "test"))]
#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports and an in-process scripted transport for unit and integration
	//! tests; enabled via `cfg(test)` or the `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::{collections::VecDeque, time::Duration as StdDuration};
	// crates.io
	use oauth2::{
		AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
		http::{HeaderMap, Method, StatusCode, header::CONTENT_TYPE},
	};
	use tokio::time::Instant;
	// self
	use crate::{
		http::BackchannelHttpClient,
		issuer::{ClientAuth, Issuer, IssuerMetadata},
		oauth::NetworkErrorMapper,
	};

	/// Issuer type alias used by scripted tests.
	pub type ScriptedIssuer = Issuer<ScriptedHttpClient, NetworkErrorMapper>;

	/// Failure injected by [`ScriptedHttpClient::push_failure`].
	#[derive(Debug, ThisError)]
	#[error("Scripted transport failure: {0}")]
	pub struct ScriptedTransportError(pub String);

	/// Request observed by the scripted transport.
	#[derive(Clone, Debug)]
	pub struct RecordedCall {
		/// Runtime instant at which the request was issued.
		pub at: Instant,
		/// HTTP method.
		pub method: Method,
		/// Target URI.
		pub uri: String,
		/// Request headers.
		pub headers: HeaderMap,
		/// Decoded form body (empty for non-form requests).
		pub form: BTreeMap<String, String>,
	}

	enum ScriptedReply {
		Response(HttpResponse),
		Failure(String),
	}

	#[derive(Default)]
	struct Script {
		replies: Mutex<VecDeque<ScriptedReply>>,
		calls: Mutex<Vec<RecordedCall>>,
		latency: Mutex<StdDuration>,
	}

	/// Transport that answers requests from a queue of canned replies and records every call.
	///
	/// Clones share one script, so a test can keep a handle after giving the transport to an
	/// issuer. An exhausted script answers with a transport failure.
	#[derive(Clone, Default)]
	pub struct ScriptedHttpClient(Arc<Script>);
	impl ScriptedHttpClient {
		/// Queues a JSON reply.
		pub fn push_json(&self, status: u16, body: serde_json::Value) -> &Self {
			let mut response = HttpResponse::new(body.to_string().into_bytes());

			*response.status_mut() = StatusCode::from_u16(status).expect("Scripted status must be valid.");
			response.headers_mut().insert(
				CONTENT_TYPE,
				"application/json".parse().expect("Static header value must be valid."),
			);

			self.push_response(response)
		}

		/// Queues a prebuilt reply.
		pub fn push_response(&self, response: HttpResponse) -> &Self {
			self.0.replies.lock().push_back(ScriptedReply::Response(response));

			self
		}

		/// Queues a transport failure.
		pub fn push_failure(&self, message: impl Into<String>) -> &Self {
			self.0.replies.lock().push_back(ScriptedReply::Failure(message.into()));

			self
		}

		/// Holds every later request for `latency` before answering.
		///
		/// The call is recorded when it starts; the reply is taken from the script only once
		/// the delay has passed, so a request dropped mid-flight consumes nothing.
		pub fn set_latency(&self, latency: StdDuration) -> &Self {
			*self.0.latency.lock() = latency;

			self
		}

		/// Returns every recorded call in order.
		pub fn calls(&self) -> Vec<RecordedCall> {
			self.0.calls.lock().clone()
		}

		/// Returns the number of recorded calls.
		pub fn call_count(&self) -> usize {
			self.0.calls.lock().len()
		}
	}
	impl BackchannelHttpClient for ScriptedHttpClient {
		type Handle = ScriptedHandle;
		type TransportError = ScriptedTransportError;

		fn handle(&self) -> Self::Handle {
			ScriptedHandle(self.0.clone())
		}
	}

	/// Handle returned by [`ScriptedHttpClient`].
	pub struct ScriptedHandle(Arc<Script>);
	impl<'c> AsyncHttpClient<'c> for ScriptedHandle {
		type Error = HttpClientError<ScriptedTransportError>;
		type Future = Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send>>;

		fn call(&'c self, request: HttpRequest) -> Self::Future {
			let script = self.0.clone();

			Box::pin(async move {
				let form = url::form_urlencoded::parse(request.body()).into_owned().collect();

				script.calls.lock().push(RecordedCall {
					at: Instant::now(),
					method: request.method().clone(),
					uri: request.uri().to_string(),
					headers: request.headers().clone(),
					form,
				});

				let latency = *script.latency.lock();

				if !latency.is_zero() {
					tokio::time::sleep(latency).await;
				}

				match script.replies.lock().pop_front() {
					Some(ScriptedReply::Response(response)) => Ok(response),
					Some(ScriptedReply::Failure(message)) =>
						Err(HttpClientError::Reqwest(Box::new(ScriptedTransportError(message)))),
					None => Err(HttpClientError::Other("Script exhausted.".into())),
				}
			})
		}
	}

	/// Metadata with both CIBA endpoints under `https://idp.example.com`.
	pub fn scripted_metadata() -> IssuerMetadata {
		IssuerMetadata::new("https://idp.example.com")
			.with_backchannel_authentication_endpoint(
				Url::parse("https://idp.example.com/bc-authorize").expect("Fixture URL must be valid."),
			)
			.with_token_endpoint(
				Url::parse("https://idp.example.com/token").expect("Fixture URL must be valid."),
			)
			.with_delivery_modes(["poll"])
	}

	/// Builds an issuer using `client_secret_post` over the scripted transport.
	pub fn scripted_issuer(metadata: IssuerMetadata, transport: ScriptedHttpClient) -> ScriptedIssuer {
		Issuer::with_http_client(
			metadata,
			ClientAuth::secret_post("rp-client", "rp-secret"),
			transport,
			NetworkErrorMapper,
		)
	}
}

mod _prelude {
	pub use std::{
		collections::BTreeMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use ciba::{AuthSession, AuthenticationHints, PollOutcome, SessionOptions, ViewedPolicy};
pub use codec::{Hs256Codec, TokenCodec};
pub use error::{Error, Result};
pub use issuer::{ClientAuth, Issuer, IssuerMetadata};
#[cfg(feature = "reqwest")] pub use reqwest;
pub use tokio_util::sync::CancellationToken;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
