//! Typed initiation parameters and their wire form.

// self
use crate::{
	_prelude::*,
	auth::{OPENID_SCOPE, Scopes},
};

/// Caller-supplied parameters for a backchannel authentication request.
///
/// At most one user hint reaches the wire. When several are set, the hint token wins over
/// the ID token hint, which wins over the plain login hint; empty strings count as unset.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthenticationHints {
	/// Signed token identifying the user (`login_hint_token`).
	pub login_hint_token: Option<String>,
	/// Previously issued ID token identifying the user (`id_token_hint`).
	pub id_token_hint: Option<String>,
	/// Plain identifier such as an email address or national ID (`login_hint`).
	pub login_hint: Option<String>,
	/// Requested scopes in order; `openid` is sent when empty.
	pub scopes: Scopes,
	/// Short text shown on both the consumption and authentication devices.
	pub binding_message: Option<String>,
	/// Requested lifetime of the authentication request.
	pub requested_expiry: Option<Duration>,
	/// Requested authentication context class references, in preference order.
	pub acr_values: Vec<String>,
	/// Provider-specific parameters. Keys that collide with protocol fields are ignored.
	pub extra_params: BTreeMap<String, String>,
}
impl AuthenticationHints {
	/// Sets the plain login hint.
	pub fn with_login_hint(mut self, hint: impl Into<String>) -> Self {
		self.login_hint = Some(hint.into());

		self
	}

	/// Sets the login hint token.
	pub fn with_login_hint_token(mut self, token: impl Into<String>) -> Self {
		self.login_hint_token = Some(token.into());

		self
	}

	/// Sets the ID token hint.
	pub fn with_id_token_hint(mut self, token: impl Into<String>) -> Self {
		self.id_token_hint = Some(token.into());

		self
	}

	/// Replaces the requested scopes.
	pub fn with_scopes(mut self, scopes: Scopes) -> Self {
		self.scopes = scopes;

		self
	}

	/// Sets the binding message.
	pub fn with_binding_message(mut self, message: impl Into<String>) -> Self {
		self.binding_message = Some(message.into());

		self
	}

	/// Sets the requested expiry.
	pub fn with_requested_expiry(mut self, expiry: Duration) -> Self {
		self.requested_expiry = Some(expiry);

		self
	}

	/// Appends ACR values.
	pub fn with_acr_values<I, S>(mut self, values: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.acr_values.extend(values.into_iter().map(Into::into));

		self
	}

	/// Adds one provider-specific parameter.
	pub fn with_extra_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.extra_params.insert(key.into(), value.into());

		self
	}

	/// Builds the form parameters sent to the initiation endpoint.
	///
	/// Credential fields are added later by the credential strategy.
	pub fn to_form(&self) -> BTreeMap<String, String> {
		let mut form = BTreeMap::new();
		let hint = [
			("login_hint_token", &self.login_hint_token),
			("id_token_hint", &self.id_token_hint),
			("login_hint", &self.login_hint),
		]
		.into_iter()
		.find_map(|(key, value)| non_empty(value).map(|value| (key, value)));

		if let Some((key, value)) = hint {
			form.insert(key.to_owned(), value.to_owned());
		}

		let scope = if self.scopes.is_empty() { OPENID_SCOPE.to_owned() } else { self.scopes.joined() };

		form.insert("scope".into(), scope);

		if let Some(message) = non_empty(&self.binding_message) {
			form.insert("binding_message".into(), message.to_owned());
		}
		// Positive sub-second expiries are still sent, truncated to zero.
		if let Some(expiry) = self.requested_expiry.filter(|expiry| expiry.is_positive()) {
			form.insert("requested_expiry".into(), expiry.whole_seconds().to_string());
		}
		if !self.acr_values.is_empty() {
			form.insert("acr_values".into(), self.acr_values.join(" "));
		}

		for (key, value) in &self.extra_params {
			if is_protocol_field(key) {
				continue;
			}

			form.entry(key.clone()).or_insert_with(|| value.clone());
		}

		form
	}
}

fn non_empty(value: &Option<String>) -> Option<&str> {
	value.as_deref().filter(|value| !value.is_empty())
}

fn is_protocol_field(key: &str) -> bool {
	matches!(
		key,
		"login_hint_token"
			| "id_token_hint"
			| "login_hint"
			| "scope"
			| "binding_message"
			| "requested_expiry"
			| "acr_values"
			| "client_id"
			| "client_secret"
			| "grant_type"
			| "auth_req_id"
	)
}
