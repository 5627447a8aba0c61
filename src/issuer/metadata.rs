//! Issuer metadata consumed by backchannel flows, plus one-shot discovery.

// crates.io
use oauth2::http::{
	Method, Request, StatusCode,
	header::{ACCEPT, HeaderValue},
};
// self
use crate::{
	_prelude::*,
	error::{ConfigError, MalformedResponseError, decode_json},
	http::BackchannelHttpClient,
	oauth::TransportErrorMapper,
};

const WELL_KNOWN_PATH: &str = ".well-known/openid-configuration";
/// Delivery mode label for client-initiated polling.
pub const POLL_DELIVERY_MODE: &str = "poll";

/// Endpoints the crate talks to, used for error labels and observability.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EndpointKind {
	/// OpenID discovery document.
	Discovery,
	/// Backchannel authentication (initiation) endpoint.
	Initiation,
	/// Token endpoint used for polling.
	Token,
}
impl EndpointKind {
	/// Returns a stable label suitable for error messages and span fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			EndpointKind::Discovery => "discovery",
			EndpointKind::Initiation => "backchannel_authentication",
			EndpointKind::Token => "token",
		}
	}
}
impl Display for EndpointKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Provider metadata relevant to CIBA, as published in the discovery document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IssuerMetadata {
	/// Issuer identity string.
	pub issuer: String,
	/// Key-set URL; consumed by token verification, not by this crate.
	#[serde(default, alias = "jwks_url", skip_serializing_if = "Option::is_none")]
	pub jwks_uri: Option<Url>,
	/// Token endpoint polled for results.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub token_endpoint: Option<Url>,
	/// Endpoint that starts a backchannel authentication.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub backchannel_authentication_endpoint: Option<Url>,
	/// Delivery modes the provider supports (`poll`, `ping`, `push`).
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub backchannel_token_delivery_modes_supported: Vec<String>,
	/// Provider-specific page that renders an out-of-band proof token.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub backchannel_qr_endpoint: Option<Url>,
	/// Remaining metadata fields, untouched.
	#[serde(flatten)]
	pub extra: serde_json::Map<String, serde_json::Value>,
}
impl IssuerMetadata {
	/// Creates metadata for `issuer` with no endpoints declared.
	pub fn new(issuer: impl Into<String>) -> Self {
		Self {
			issuer: issuer.into(),
			jwks_uri: None,
			token_endpoint: None,
			backchannel_authentication_endpoint: None,
			backchannel_token_delivery_modes_supported: Vec::new(),
			backchannel_qr_endpoint: None,
			extra: Default::default(),
		}
	}

	/// Sets the token endpoint.
	pub fn with_token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Sets the backchannel authentication endpoint.
	pub fn with_backchannel_authentication_endpoint(mut self, url: Url) -> Self {
		self.backchannel_authentication_endpoint = Some(url);

		self
	}

	/// Sets the out-of-band display endpoint.
	pub fn with_backchannel_qr_endpoint(mut self, url: Url) -> Self {
		self.backchannel_qr_endpoint = Some(url);

		self
	}

	/// Replaces the advertised delivery modes.
	pub fn with_delivery_modes<I, S>(mut self, modes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.backchannel_token_delivery_modes_supported =
			modes.into_iter().map(Into::into).collect();

		self
	}

	/// Returns the endpoint for `kind`, or a configuration error naming it.
	pub fn endpoint(&self, kind: EndpointKind) -> Result<&Url, ConfigError> {
		let endpoint = match kind {
			EndpointKind::Initiation => self.backchannel_authentication_endpoint.as_ref(),
			EndpointKind::Token => self.token_endpoint.as_ref(),
			EndpointKind::Discovery => None,
		};

		endpoint.ok_or_else(|| ConfigError::MissingEndpoint {
			issuer: self.issuer.clone(),
			endpoint: kind.as_str(),
		})
	}

	/// Returns true when polling is allowed; an empty mode list is read as "unspecified".
	pub fn supports_poll_mode(&self) -> bool {
		self.backchannel_token_delivery_modes_supported.is_empty()
			|| self
				.backchannel_token_delivery_modes_supported
				.iter()
				.any(|mode| mode == POLL_DELIVERY_MODE)
	}

	/// Fetches `<issuer>/.well-known/openid-configuration` and checks the issuer matches.
	pub async fn discover<C, M>(issuer: &str, http_client: &C, mapper: &M) -> Result<Self>
	where
		C: ?Sized + BackchannelHttpClient,
		M: ?Sized + TransportErrorMapper<C::TransportError>,
	{
		let url = discovery_url(issuer)?;
		let request = Request::builder()
			.method(Method::GET)
			.uri(url.as_str())
			.header(ACCEPT, HeaderValue::from_static("application/json"))
			.body(Vec::new())
			.map_err(ConfigError::from)?;
		let handle = http_client.handle();
		let response = oauth2::AsyncHttpClient::call(&handle, request)
			.await
			.map_err(|e| mapper.map_transport_error(EndpointKind::Discovery, e))?;
		let status = response.status();

		if status != StatusCode::OK {
			return Err(MalformedResponseError::DiscoveryFailed { status: status.as_u16() }.into());
		}

		let metadata: Self = decode_json(response.body(), status.as_u16())?;

		if metadata.issuer != issuer {
			return Err(ConfigError::IssuerMismatch {
				expected: issuer.to_owned(),
				found: metadata.issuer,
			}
			.into());
		}

		Ok(metadata)
	}
}

fn discovery_url(issuer: &str) -> Result<Url, ConfigError> {
	let base = format!("{}/", issuer.trim_end_matches('/'));

	Url::parse(&base)
		.and_then(|base| base.join(WELL_KNOWN_PATH))
		.map_err(|source| ConfigError::InvalidIssuerUrl { source })
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn discovery_url_handles_paths_and_trailing_slashes() {
		assert_eq!(
			discovery_url("https://idp.example.com").expect("Bare issuer should be valid.").as_str(),
			"https://idp.example.com/.well-known/openid-configuration",
		);
		assert_eq!(
			discovery_url("https://idp.example.com/realms/main/")
				.expect("Issuer with a path should be valid.")
				.as_str(),
			"https://idp.example.com/realms/main/.well-known/openid-configuration",
		);
		assert!(discovery_url("not a url").is_err());
	}

	#[test]
	fn metadata_deserializes_ciba_fields_and_keeps_extras() {
		let metadata: IssuerMetadata = serde_json::from_str(
			r#"{
				"issuer": "https://idp.example.com",
				"jwks_uri": "https://idp.example.com/jwks",
				"token_endpoint": "https://idp.example.com/token",
				"backchannel_authentication_endpoint": "https://idp.example.com/bc-authorize",
				"backchannel_token_delivery_modes_supported": ["poll", "ping"],
				"grant_types_supported": ["urn:openid:params:grant-type:ciba"]
			}"#,
		)
		.expect("Discovery fixture should deserialize.");

		assert_eq!(
			metadata.endpoint(EndpointKind::Initiation).map(Url::as_str).ok(),
			Some("https://idp.example.com/bc-authorize"),
		);
		assert!(metadata.supports_poll_mode());
		assert!(metadata.backchannel_qr_endpoint.is_none());
		assert!(metadata.extra.contains_key("grant_types_supported"));
	}

	#[test]
	fn missing_endpoints_and_push_only_modes_are_reported() {
		let metadata = IssuerMetadata::new("https://idp.example.com").with_delivery_modes(["push"]);
		let err = metadata
			.endpoint(EndpointKind::Token)
			.expect_err("Token endpoint was never configured.");

		assert!(matches!(err, ConfigError::MissingEndpoint { endpoint: "token", .. }));
		assert!(!metadata.supports_poll_mode());
		assert!(IssuerMetadata::new("https://idp.example.com").supports_poll_mode());
	}
}
