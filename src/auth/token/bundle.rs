//! Successful token endpoint response for a completed backchannel authentication.

// self
use crate::{
	_prelude::*,
	auth::{Scopes, TokenSecret},
	http::capped_seconds,
};

/// Tokens issued once the user approved the request.
///
/// The ID token is carried as opaque text; parsing and signature checks belong to a
/// token verifier, not to this crate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenBundle {
	/// Signed ID token describing the authenticated user.
	pub id_token: TokenSecret,
	/// Access token, when the provider issued one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub access_token: Option<TokenSecret>,
	/// Refresh token, when the provider issued one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<TokenSecret>,
	/// Token type (normally `Bearer`).
	pub token_type: String,
	/// Access token lifetime in seconds.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expires_in: Option<u64>,
	/// Granted scope, when it differs from (or restates) the request.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub scope: Option<Scopes>,
	/// Provider-specific fields.
	#[serde(flatten)]
	pub extra: serde_json::Map<String, serde_json::Value>,
}
impl TokenBundle {
	/// Access token lifetime as a duration.
	pub fn expires_in(&self) -> Option<Duration> {
		self.expires_in.map(|secs| capped_seconds(secs, Duration::MAX))
	}

	/// Returns true when the token type is `Bearer` (case-insensitive).
	pub fn is_bearer(&self) -> bool {
		self.token_type.eq_ignore_ascii_case("bearer")
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn bundle_decodes_optional_fields_and_extensions() {
		let bundle: TokenBundle = serde_json::from_str(
			r#"{
				"id_token": "header.claims.sig",
				"access_token": "at",
				"token_type": "Bearer",
				"expires_in": 3600,
				"scope": "openid profile",
				"acr": "urn:mace:incommon:iap:silver"
			}"#,
		)
		.expect("Token response fixture should decode.");

		assert_eq!(bundle.id_token.expose(), "header.claims.sig");
		assert_eq!(bundle.access_token.as_ref().map(TokenSecret::expose), Some("at"));
		assert!(bundle.refresh_token.is_none());
		assert!(bundle.is_bearer());
		assert_eq!(bundle.expires_in(), Some(Duration::hours(1)));
		assert_eq!(bundle.scope.as_ref().map(Scopes::joined), Some("openid profile".into()));
		assert_eq!(bundle.extra.get("acr").and_then(|v| v.as_str()), Some("urn:mace:incommon:iap:silver"));
	}

	#[test]
	fn bundle_requires_an_id_token() {
		assert!(
			serde_json::from_str::<TokenBundle>(r#"{"access_token":"at","token_type":"Bearer"}"#)
				.is_err()
		);
	}

	#[test]
	fn debug_output_redacts_tokens() {
		let bundle: TokenBundle =
			serde_json::from_str(r#"{"id_token":"very-secret","token_type":"Bearer"}"#)
				.expect("Minimal token response should decode.");

		assert!(!format!("{bundle:?}").contains("very-secret"));
	}

	#[test]
	fn oversized_lifetimes_saturate() {
		let bundle: TokenBundle = serde_json::from_str(
			r#"{"id_token":"t","token_type":"Bearer","expires_in":18446744073709551615}"#,
		)
		.expect("Large lifetimes should decode.");

		assert_eq!(bundle.expires_in(), Some(Duration::MAX));
	}
}
