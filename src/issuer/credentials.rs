//! Client credential strategies that authenticate every outbound backchannel request.
//!
//! Each strategy is a variant of [`ClientAuth`] and owns its credential material. The
//! single operation, [`ClientAuth::attach`], turns a request builder plus form
//! parameters into a ready-to-send request. Strategies hold no per-call state, so one
//! `Arc<ClientAuth>` is shared by every session of an issuer.

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
use oauth2::{
	ClientId, ClientSecret, HttpRequest,
	http::{
		HeaderValue,
		header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
		request::Builder as RequestBuilder,
	},
};
use url::form_urlencoded;
// self
use crate::{_prelude::*, error::ConfigError};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_ACCEPT: &str = "application/json";

/// Client authentication methods, named as in OpenID client registration metadata.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	/// Form POST body parameters for `client_id`/`client_secret`.
	ClientSecretPost,
	/// HTTP Basic with `client_id`/`client_secret`.
	ClientSecretBasic,
	/// Mutual TLS with a client certificate (RFC 8705).
	TlsClientAuth,
}
impl ClientAuthMethod {
	/// Returns the registration identifier for the method.
	pub fn as_str(self) -> &'static str {
		match self {
			ClientAuthMethod::ClientSecretPost => "client_secret_post",
			ClientAuthMethod::ClientSecretBasic => "client_secret_basic",
			ClientAuthMethod::TlsClientAuth => "tls_client_auth",
		}
	}
}
impl Display for ClientAuthMethod {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// PEM-encoded client certificate chain plus private key used for mutual TLS.
#[derive(Clone, PartialEq, Eq)]
pub struct TlsIdentity {
	pem: Vec<u8>,
}
impl TlsIdentity {
	/// Wraps a PEM bundle holding the certificate chain and the private key.
	pub fn from_pem(pem: impl Into<Vec<u8>>) -> Self {
		Self { pem: pem.into() }
	}

	/// Converts the bundle into a reqwest identity.
	#[cfg(feature = "reqwest")]
	pub fn to_reqwest(&self) -> Result<reqwest::Identity, ConfigError> {
		reqwest::Identity::from_pem(&self.pem)
			.map_err(|e| ConfigError::InvalidTlsIdentity { source: Box::new(e) })
	}
}
impl Debug for TlsIdentity {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TlsIdentity").field(&"<redacted>").finish()
	}
}

/// Credential strategy applied to every request sent to an issuer.
#[derive(Clone, Debug)]
pub enum ClientAuth {
	/// Shared secret carried in the form body.
	ClientSecretPost {
		/// OAuth 2.0 client identifier.
		client_id: ClientId,
		/// Client secret.
		client_secret: ClientSecret,
		/// Redirect URL for redirect-based flows; unused by CIBA.
		redirect_url: Option<Url>,
	},
	/// Shared secret carried in an HTTP Basic `Authorization` header.
	ClientSecretBasic {
		/// OAuth 2.0 client identifier.
		client_id: ClientId,
		/// Client secret.
		client_secret: ClientSecret,
		/// Redirect URL for redirect-based flows; unused by CIBA.
		redirect_url: Option<Url>,
	},
	/// Certificate presented by the transport during the TLS handshake.
	TlsClientAuth {
		/// OAuth 2.0 client identifier.
		client_id: ClientId,
		/// Client certificate and key.
		identity: TlsIdentity,
		/// Redirect URL for redirect-based flows; unused by CIBA.
		redirect_url: Option<Url>,
	},
}
impl ClientAuth {
	/// Builds a `client_secret_post` strategy.
	pub fn secret_post(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
		Self::ClientSecretPost {
			client_id: ClientId::new(client_id.into()),
			client_secret: ClientSecret::new(client_secret.into()),
			redirect_url: None,
		}
	}

	/// Builds a `client_secret_basic` strategy.
	pub fn secret_basic(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
		Self::ClientSecretBasic {
			client_id: ClientId::new(client_id.into()),
			client_secret: ClientSecret::new(client_secret.into()),
			redirect_url: None,
		}
	}

	/// Builds a `tls_client_auth` strategy.
	pub fn mutual_tls(client_id: impl Into<String>, identity: TlsIdentity) -> Self {
		Self::TlsClientAuth { client_id: ClientId::new(client_id.into()), identity, redirect_url: None }
	}

	/// Sets the redirect URL kept for redirect-based flows.
	pub fn with_redirect_url(mut self, url: Url) -> Self {
		match &mut self {
			Self::ClientSecretPost { redirect_url, .. }
			| Self::ClientSecretBasic { redirect_url, .. }
			| Self::TlsClientAuth { redirect_url, .. } => *redirect_url = Some(url),
		}

		self
	}

	/// Returns the authentication method implemented by this strategy.
	pub fn method(&self) -> ClientAuthMethod {
		match self {
			Self::ClientSecretPost { .. } => ClientAuthMethod::ClientSecretPost,
			Self::ClientSecretBasic { .. } => ClientAuthMethod::ClientSecretBasic,
			Self::TlsClientAuth { .. } => ClientAuthMethod::TlsClientAuth,
		}
	}

	/// Client identifier shared by every strategy.
	pub fn client_id(&self) -> &ClientId {
		match self {
			Self::ClientSecretPost { client_id, .. }
			| Self::ClientSecretBasic { client_id, .. }
			| Self::TlsClientAuth { client_id, .. } => client_id,
		}
	}

	/// Redirect URL, when one was configured.
	pub fn redirect_url(&self) -> Option<&Url> {
		match self {
			Self::ClientSecretPost { redirect_url, .. }
			| Self::ClientSecretBasic { redirect_url, .. }
			| Self::TlsClientAuth { redirect_url, .. } => redirect_url.as_ref(),
		}
	}

	/// Adds client authentication to `builder` and sets `form` as the url-encoded body.
	pub fn attach(
		&self,
		builder: RequestBuilder,
		mut form: BTreeMap<String, String>,
	) -> Result<HttpRequest, ConfigError> {
		let mut builder = builder
			.header(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE))
			.header(ACCEPT, HeaderValue::from_static(JSON_ACCEPT));

		match self {
			Self::ClientSecretPost { client_id, client_secret, .. } => {
				form.insert("client_id".into(), client_id.as_str().to_owned());
				form.insert("client_secret".into(), client_secret.secret().to_owned());
			},
			Self::ClientSecretBasic { client_id, client_secret, .. } => {
				builder = builder.header(
					AUTHORIZATION,
					basic_authorization(client_id.as_str(), client_secret.secret()),
				);
			},
			Self::TlsClientAuth { client_id, .. } => {
				form.insert("client_id".into(), client_id.as_str().to_owned());
			},
		}

		Ok(builder.body(encode_form(&form))?)
	}
}

fn basic_authorization(client_id: &str, client_secret: &str) -> String {
	// RFC 6749 section 2.3.1: both halves are form-encoded before base64.
	let credentials =
		format!("{}:{}", form_encode_component(client_id), form_encode_component(client_secret));

	format!("Basic {}", STANDARD.encode(credentials))
}

fn form_encode_component(value: &str) -> String {
	form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

fn encode_form(form: &BTreeMap<String, String>) -> Vec<u8> {
	form_urlencoded::Serializer::new(String::new()).extend_pairs(form.iter()).finish().into_bytes()
}

#[cfg(test)]
mod tests {
	// crates.io
	use oauth2::http::{Method, Request};
	// self
	use super::*;

	fn form() -> BTreeMap<String, String> {
		BTreeMap::from([("auth_req_id".to_owned(), "abc".to_owned())])
	}

	fn builder() -> RequestBuilder {
		Request::builder().method(Method::POST).uri("https://idp.example.com/token")
	}

	fn body(request: &HttpRequest) -> String {
		String::from_utf8(request.body().clone()).expect("Form bodies should be UTF-8.")
	}

	#[test]
	fn secret_post_moves_credentials_into_the_body() {
		let request = ClientAuth::secret_post("client", "s3cr3t")
			.attach(builder(), form())
			.expect("Attaching post credentials should succeed.");

		assert_eq!(body(&request), "auth_req_id=abc&client_id=client&client_secret=s3cr3t");
		assert!(request.headers().get(AUTHORIZATION).is_none());
		assert_eq!(
			request.headers().get(CONTENT_TYPE).map(HeaderValue::as_bytes),
			Some(FORM_CONTENT_TYPE.as_bytes()),
		);
	}

	#[test]
	fn secret_basic_uses_an_encoded_authorization_header() {
		let request = ClientAuth::secret_basic("client id", "p@ss:word")
			.attach(builder(), form())
			.expect("Attaching basic credentials should succeed.");
		let header = request
			.headers()
			.get(AUTHORIZATION)
			.and_then(|value| value.to_str().ok())
			.expect("Basic auth should set an Authorization header.");
		let decoded = STANDARD
			.decode(header.trim_start_matches("Basic "))
			.expect("Authorization header should carry base64.");

		assert_eq!(decoded, b"client+id:p%40ss%3Aword");
		assert_eq!(body(&request), "auth_req_id=abc");
	}

	#[test]
	fn mutual_tls_sends_only_the_client_id() {
		let credentials = ClientAuth::mutual_tls("client", TlsIdentity::from_pem(b"pem".to_vec()));
		let request =
			credentials.attach(builder(), form()).expect("Attaching mTLS credentials should succeed.");

		assert_eq!(body(&request), "auth_req_id=abc&client_id=client");
		assert!(request.headers().get(AUTHORIZATION).is_none());
		assert_eq!(credentials.method(), ClientAuthMethod::TlsClientAuth);
		assert!(!format!("{credentials:?}").contains("pem"));
	}

	#[test]
	fn redirect_url_is_kept_but_never_sent() {
		let redirect =
			Url::parse("https://rp.example.com/cb").expect("Redirect fixture should parse.");
		let credentials = ClientAuth::secret_post("client", "secret").with_redirect_url(redirect);
		let request =
			credentials.attach(builder(), form()).expect("Attaching credentials should succeed.");

		assert_eq!(
			credentials.redirect_url().map(Url::as_str),
			Some("https://rp.example.com/cb"),
		);
		assert!(!body(&request).contains("redirect"));
		assert_eq!(credentials.client_id().as_str(), "client");
	}
}
