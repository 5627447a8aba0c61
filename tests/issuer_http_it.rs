#![cfg(feature = "reqwest")]

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
use httpmock::prelude::*;
// self
use oauth2_ciba::{
	_preludet::*,
	CancellationToken,
	ciba::{AuthenticationHints, SessionOptions},
	error::{ConfigError, MalformedResponseError},
	issuer::{ClientAuth, Issuer, IssuerMetadata},
	oauth::ErrorCode,
};

const CLIENT_ID: &str = "rp-client";
const CLIENT_SECRET: &str = "rp-secret";

fn build_metadata(server: &MockServer) -> IssuerMetadata {
	IssuerMetadata::new(server.base_url())
		.with_backchannel_authentication_endpoint(
			Url::parse(&server.url("/bc-authorize"))
				.expect("Mock initiation endpoint should parse successfully."),
		)
		.with_token_endpoint(
			Url::parse(&server.url("/token")).expect("Mock token endpoint should parse successfully."),
		)
}

#[tokio::test]
async fn secret_post_round_trip_over_http() {
	let server = MockServer::start_async().await;
	let initiation = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/bc-authorize")
				.header("content-type", "application/x-www-form-urlencoded")
				.form_urlencoded_tuple("login_hint", "alice@example.com")
				.form_urlencoded_tuple("scope", "openid")
				.form_urlencoded_tuple("client_id", CLIENT_ID)
				.form_urlencoded_tuple("client_secret", CLIENT_SECRET);
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"auth_req_id\":\"req-1\",\"expires_in\":120,\"interval\":1}");
		})
		.await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.form_urlencoded_tuple("auth_req_id", "req-1")
				.form_urlencoded_tuple("grant_type", "urn:openid:params:grant-type:ciba");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"id_token\":\"h.c.s\",\"token_type\":\"Bearer\"}");
		})
		.await;
	let issuer = Issuer::new(build_metadata(&server), ClientAuth::secret_post(CLIENT_ID, CLIENT_SECRET))
		.expect("Reqwest issuer should build.");
	let bundle = issuer
		.authenticate(
			&AuthenticationHints::default().with_login_hint("alice@example.com"),
			SessionOptions::default(),
			&CancellationToken::new(),
		)
		.await
		.expect("Authentication should complete after one poll.");

	assert_eq!(bundle.id_token.expose(), "h.c.s");

	initiation.assert_calls_async(1).await;
	token.assert_calls_async(1).await;
}

#[tokio::test]
async fn secret_basic_sends_credentials_in_the_header_only() {
	let server = MockServer::start_async().await;
	let expected = format!("Basic {}", STANDARD.encode(format!("{CLIENT_ID}:{CLIENT_SECRET}")));
	let initiation = server
		.mock_async(|when, then| {
			when.method(POST).path("/bc-authorize").header("authorization", expected.as_str());
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_request\",\"error_description\":\"Missing hint.\"}");
		})
		.await;
	let issuer =
		Issuer::new(build_metadata(&server), ClientAuth::secret_basic(CLIENT_ID, CLIENT_SECRET))
			.expect("Reqwest issuer should build.");
	let err = issuer
		.start_authentication(&AuthenticationHints::default(), SessionOptions::default())
		.await
		.expect_err("Provider error envelope should fail initiation.");

	assert_eq!(err.code(), Some(&ErrorCode::InvalidRequest));
	assert!(err.to_string().contains("Missing hint."));

	initiation.assert_calls_async(1).await;
}

#[tokio::test]
async fn unparseable_initiation_failures_keep_the_status() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/bc-authorize");
			then.status(503).body("maintenance");
		})
		.await;

	let issuer = Issuer::new(build_metadata(&server), ClientAuth::secret_post(CLIENT_ID, CLIENT_SECRET))
		.expect("Reqwest issuer should build.");
	let err = issuer
		.start_authentication(&AuthenticationHints::default(), SessionOptions::default())
		.await
		.expect_err("Service unavailable should fail initiation.");

	assert!(matches!(err, Error::Malformed(MalformedResponseError::InitiationFailed { status: 503 })));
}

#[tokio::test]
async fn discovery_loads_ciba_metadata() {
	let server = MockServer::start_async().await;
	let document = serde_json::json!({
		"issuer": server.base_url(),
		"token_endpoint": server.url("/token"),
		"backchannel_authentication_endpoint": server.url("/bc-authorize"),
		"backchannel_token_delivery_modes_supported": ["poll"],
		"jwks_uri": server.url("/jwks"),
	});
	let discovery = server
		.mock_async(|when, then| {
			when.method(GET).path("/.well-known/openid-configuration");
			then.status(200).header("content-type", "application/json").body(document.to_string());
		})
		.await;
	let issuer = Issuer::discover(&server.base_url(), ClientAuth::secret_post(CLIENT_ID, CLIENT_SECRET))
		.await
		.expect("Discovery should succeed.");

	assert_eq!(issuer.issuer(), server.base_url());
	assert_eq!(
		issuer.metadata.token_endpoint.as_ref().map(Url::as_str),
		Some(server.url("/token").as_str()),
	);
	assert!(issuer.metadata.supports_poll_mode());

	discovery.assert_calls_async(1).await;
}

#[tokio::test]
async fn discovery_rejects_a_different_issuer() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/.well-known/openid-configuration");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"issuer\":\"https://evil.example.com\"}");
		})
		.await;

	let err = Issuer::discover(&server.base_url(), ClientAuth::secret_post(CLIENT_ID, CLIENT_SECRET))
		.await
		.expect_err("Issuer mismatch should be rejected.");

	assert!(matches!(err, Error::Config(ConfigError::IssuerMismatch { .. })));
}

#[tokio::test]
async fn discovery_failures_report_the_status() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/.well-known/openid-configuration");
			then.status(404);
		})
		.await;

	let err = Issuer::discover(&server.base_url(), ClientAuth::secret_post(CLIENT_ID, CLIENT_SECRET))
		.await
		.expect_err("Missing discovery document should fail.");

	assert!(matches!(err, Error::Malformed(MalformedResponseError::DiscoveryFailed { status: 404 })));
}
