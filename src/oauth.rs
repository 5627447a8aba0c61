//! OAuth wire vocabulary (error envelopes, error codes) and transport error mapping.

pub use oauth2;

// crates.io
use oauth2::HttpClientError;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError},
	issuer::EndpointKind,
};

/// Maps HTTP transport failures into crate [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a crate error.
	fn map_transport_error(&self, endpoint: EndpointKind, error: HttpClientError<E>) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		endpoint: EndpointKind,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(endpoint, *inner),
			other => NetworkErrorMapper.map_transport_error(endpoint, other),
		}
	}
}

/// Transport-agnostic mapper that treats every client failure as a network error.
#[derive(Clone, Debug, Default)]
pub struct NetworkErrorMapper;
impl<E> TransportErrorMapper<E> for NetworkErrorMapper
where
	E: 'static + Send + Sync + StdError,
{
	fn map_transport_error(&self, endpoint: EndpointKind, err: HttpClientError<E>) -> Error {
		let endpoint = endpoint.as_str();

		match err {
			HttpClientError::Reqwest(inner) =>
				TransportError::Network { endpoint, source: inner }.into(),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) => TransportError::Other { endpoint, message }.into(),
			_ => TransportError::Other { endpoint, message: "unknown transport failure".into() }
				.into(),
		}
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(endpoint: EndpointKind, err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransportError::Timeout { endpoint: endpoint.as_str(), source: Box::new(err) }
			.into();
	}

	TransportError::network(endpoint.as_str(), err).into()
}

/// OAuth / CIBA error codes carried in the `error` field of an error envelope.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ErrorCode {
	/// User has not finished authenticating yet.
	AuthorizationPending,
	/// Client polls too fast and must back off.
	SlowDown,
	/// User opened the request but has not answered it.
	AuthorizationViewed,
	/// User or provider refused the request.
	AccessDenied,
	/// `auth_req_id` expired before the user answered.
	ExpiredToken,
	/// Grant (here the `auth_req_id`) is invalid.
	InvalidGrant,
	/// Request is missing or repeats a parameter.
	InvalidRequest,
	/// Client authentication failed.
	InvalidClient,
	/// Client may not use this grant.
	UnauthorizedClient,
	/// Grant type is not supported by the provider.
	UnsupportedGrantType,
	/// Requested scope is invalid or exceeds what the client may ask for.
	InvalidScope,
	/// Provider-side transaction failed.
	TransactionFailed,
	/// Any code this crate does not know by name.
	Other(String),
}
impl ErrorCode {
	/// Returns the wire representation of the code.
	pub fn as_str(&self) -> &str {
		match self {
			Self::AuthorizationPending => "authorization_pending",
			Self::SlowDown => "slow_down",
			Self::AuthorizationViewed => "authorization_viewed",
			Self::AccessDenied => "access_denied",
			Self::ExpiredToken => "expired_token",
			Self::InvalidGrant => "invalid_grant",
			Self::InvalidRequest => "invalid_request",
			Self::InvalidClient => "invalid_client",
			Self::UnauthorizedClient => "unauthorized_client",
			Self::UnsupportedGrantType => "unsupported_grant_type",
			Self::InvalidScope => "invalid_scope",
			Self::TransactionFailed => "transaction_failed",
			Self::Other(code) => code,
		}
	}
}
impl From<String> for ErrorCode {
	fn from(value: String) -> Self {
		match value.as_str() {
			"authorization_pending" => Self::AuthorizationPending,
			"slow_down" => Self::SlowDown,
			"authorization_viewed" => Self::AuthorizationViewed,
			"access_denied" => Self::AccessDenied,
			"expired_token" => Self::ExpiredToken,
			"invalid_grant" => Self::InvalidGrant,
			"invalid_request" => Self::InvalidRequest,
			"invalid_client" => Self::InvalidClient,
			"unauthorized_client" => Self::UnauthorizedClient,
			"unsupported_grant_type" => Self::UnsupportedGrantType,
			"invalid_scope" => Self::InvalidScope,
			"transaction_failed" => Self::TransactionFailed,
			_ => Self::Other(value),
		}
	}
}
impl From<ErrorCode> for String {
	fn from(value: ErrorCode) -> Self {
		match value {
			ErrorCode::Other(code) => code,
			known => known.as_str().to_owned(),
		}
	}
}
impl Display for ErrorCode {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// OAuth error envelope returned on non-200 responses by both CIBA endpoints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error code.
	pub error: ErrorCode,
	/// Human-readable description, when supplied.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error_description: Option<String>,
	/// Link to a page describing the error, when supplied.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error_uri: Option<String>,
	/// HTTP status that carried the envelope.
	#[serde(skip)]
	pub status: Option<u16>,
}
impl ErrorResponse {
	/// Creates an envelope with only an error code.
	pub fn new(error: ErrorCode) -> Self {
		Self { error, error_description: None, error_uri: None, status: None }
	}

	/// Adds a description.
	pub fn with_description(mut self, description: impl Into<String>) -> Self {
		self.error_description = Some(description.into());

		self
	}

	/// Parses an envelope from a response body, recording the HTTP status.
	///
	/// Returns `None` when the body is not a JSON object with an `error` field.
	pub fn parse(body: &[u8], status: u16) -> Option<Self> {
		let mut response = serde_json::from_slice::<Self>(body).ok()?;

		response.status = Some(status);

		Some(response)
	}
}
impl Display for ErrorResponse {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match &self.error_description {
			Some(description) if !description.is_empty() =>
				write!(f, "{}; {description}", self.error),
			_ => write!(f, "{}", self.error),
		}
	}
}
impl StdError for ErrorResponse {}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn error_codes_round_trip_known_and_unknown_values() {
		for code in [
			"authorization_pending",
			"slow_down",
			"authorization_viewed",
			"access_denied",
			"expired_token",
			"invalid_grant",
			"invalid_request",
			"invalid_client",
			"unauthorized_client",
			"unsupported_grant_type",
			"invalid_scope",
			"transaction_failed",
		] {
			let parsed = ErrorCode::from(code.to_owned());

			assert!(!matches!(parsed, ErrorCode::Other(_)), "{code} should be a known code.");
			assert_eq!(parsed.as_str(), code);
		}

		let unknown = ErrorCode::from("unknown_user_id".to_owned());

		assert_eq!(unknown, ErrorCode::Other("unknown_user_id".into()));
		assert_eq!(String::from(unknown), "unknown_user_id");
	}

	#[test]
	fn envelope_parsing_keeps_status_and_rejects_non_envelopes() {
		let response = ErrorResponse::parse(
			br#"{"error":"access_denied","error_description":"user said no"}"#,
			403,
		)
		.expect("A valid envelope should parse.");

		assert_eq!(response.error, ErrorCode::AccessDenied);
		assert_eq!(response.status, Some(403));
		assert_eq!(response.to_string(), "access_denied; user said no");
		assert!(ErrorResponse::parse(b"<html>bad gateway</html>", 502).is_none());
		assert!(ErrorResponse::parse(br#"{"message":"nope"}"#, 400).is_none());
	}

	#[test]
	fn network_mapper_classifies_client_errors() {
		let err = <NetworkErrorMapper as TransportErrorMapper<std::io::Error>>::map_transport_error(
			&NetworkErrorMapper,
			EndpointKind::Token,
			HttpClientError::Other("connection reset".into()),
		);

		assert!(matches!(
			err,
			Error::Transport(TransportError::Other { endpoint: "token", .. })
		));

		let err = <NetworkErrorMapper as TransportErrorMapper<std::io::Error>>::map_transport_error(
			&NetworkErrorMapper,
			EndpointKind::Initiation,
			HttpClientError::Reqwest(Box::new(std::io::Error::other("refused"))),
		);

		assert!(matches!(
			err,
			Error::Transport(TransportError::Network { endpoint: "backchannel_authentication", .. })
		));
	}
}
