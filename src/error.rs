//! Crate-level error types shared across the issuer handle, sessions, and transports.

// self
use crate::{_prelude::*, oauth::ErrorResponse};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem; no request was sent.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, timeouts).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Provider answered with a well-formed OAuth error envelope.
	#[error("Provider returned an OAuth error: {0}.")]
	Provider(#[from] ErrorResponse),
	/// Provider answered with a body that could not be interpreted.
	#[error(transparent)]
	Malformed(#[from] MalformedResponseError),
	/// Token codec failed to sign a proof token.
	#[error(transparent)]
	Codec(#[from] crate::codec::CodecError),

	/// Caller cancelled the poll loop before the flow finished.
	#[error("Backchannel authentication was cancelled by the caller.")]
	Cancelled,
	/// Session already reached a terminal outcome and cannot be polled again.
	#[error("Authentication session is closed; start a new one.")]
	SessionClosed,
}
impl Error {
	/// Returns the provider error code when the failure came from an OAuth error envelope.
	pub fn code(&self) -> Option<&crate::oauth::ErrorCode> {
		match self {
			Self::Provider(response) => Some(&response.error),
			_ => None,
		}
	}

	/// Returns true when the caller cancelled the flow.
	pub fn is_cancelled(&self) -> bool {
		matches!(self, Self::Cancelled)
	}
}

/// Configuration and validation failures surfaced before any request is issued.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Issuer metadata does not declare an endpoint the flow needs.
	#[error("Issuer `{issuer}` does not declare a {endpoint} endpoint.")]
	MissingEndpoint {
		/// Issuer identity string.
		issuer: String,
		/// Missing endpoint label.
		endpoint: &'static str,
	},
	/// Issuer advertises delivery modes but `poll` is not one of them.
	#[error("Issuer `{issuer}` does not support the poll delivery mode.")]
	PollModeUnsupported {
		/// Issuer identity string.
		issuer: String,
	},
	/// Discovery document names a different issuer than the one requested.
	#[error("Issuer mismatch: expected `{expected}`, discovered `{found}`.")]
	IssuerMismatch {
		/// Issuer the caller asked for.
		expected: String,
		/// Issuer found in the discovery document.
		found: String,
	},
	/// Issuer URL cannot be turned into a discovery URL.
	#[error("Issuer URL is invalid.")]
	InvalidIssuerUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// The TLS client identity could not be loaded.
	#[error("TLS client identity is invalid.")]
	InvalidTlsIdentity {
		/// Underlying parsing failure.
		#[source]
		source: BoxError,
	},
	/// The initiation response carried no out-of-band challenge to prove.
	#[error("Session has no out-of-band challenge to render.")]
	MissingChallenge,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the {endpoint} endpoint.")]
	Network {
		/// Endpoint label.
		endpoint: &'static str,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Request exceeded the transport's timeout.
	#[error("Request timed out while calling the {endpoint} endpoint.")]
	Timeout {
		/// Endpoint label.
		endpoint: &'static str,
		/// Transport-specific timeout error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during transport.")]
	Io(#[from] std::io::Error),
	/// Transport failed without a structured error.
	#[error("HTTP client error occurred while calling the {endpoint} endpoint: {message}.")]
	Other {
		/// Endpoint label.
		endpoint: &'static str,
		/// Transport-supplied message.
		message: String,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		endpoint: &'static str,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { endpoint, source: Box::new(src) }
	}
}

/// Responses that could not be interpreted as either a result or an OAuth error envelope.
#[derive(Debug, ThisError)]
pub enum MalformedResponseError {
	/// Initiation endpoint failed without a parseable error envelope.
	#[error("Backchannel authentication request failed with HTTP status {status}.")]
	InitiationFailed {
		/// HTTP status code.
		status: u16,
	},
	/// Token endpoint failed without a parseable error envelope.
	#[error("Backchannel poll failed with HTTP status {status}.")]
	PollFailed {
		/// HTTP status code.
		status: u16,
	},
	/// Discovery endpoint did not return a metadata document.
	#[error("Fetching issuer metadata failed with HTTP status {status}.")]
	DiscoveryFailed {
		/// HTTP status code.
		status: u16,
	},
	/// A success body could not be decoded.
	#[error("Provider returned a {status} response that could not be decoded.")]
	Decode {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code.
		status: u16,
	},
}
impl MalformedResponseError {
	/// HTTP status carried by every variant.
	pub fn status(&self) -> u16 {
		match self {
			Self::InitiationFailed { status }
			| Self::PollFailed { status }
			| Self::DiscoveryFailed { status }
			| Self::Decode { status, .. } => *status,
		}
	}
}

/// Decodes a JSON body, keeping the failing path for diagnostics.
pub(crate) fn decode_json<T>(body: &[u8], status: u16) -> Result<T, MalformedResponseError>
where
	T: serde::de::DeserializeOwned,
{
	let mut de = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut de)
		.map_err(|source| MalformedResponseError::Decode { source, status })
}
