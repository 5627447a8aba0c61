//! Out-of-band proof token rendered into the provider's display URL.

// self
use crate::{
	_prelude::*,
	ciba::AuthSession,
	codec::{CodecError, TokenCodec},
	error::ConfigError,
	http::BackchannelHttpClient,
	oauth::TransportErrorMapper,
};

#[derive(Debug, Serialize)]
struct ProofClaims<'a> {
	challenge_id: &'a str,
	duration: i64,
}

impl<C, M> AuthSession<'_, C, M>
where
	C: ?Sized + BackchannelHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Returns the display URL carrying a freshly signed proof token.
	///
	/// The token claims the challenge identifier and the whole seconds elapsed since the
	/// session started, signed with the challenge secret; every call signs a new token.
	pub fn render_proof(&self, codec: &dyn TokenCodec) -> Result<Url> {
		self.render_proof_at(codec, OffsetDateTime::now_utc())
	}

	pub(crate) fn render_proof_at(&self, codec: &dyn TokenCodec, now: OffsetDateTime) -> Result<Url> {
		let challenge = self.challenge.as_ref().ok_or(ConfigError::MissingChallenge)?;
		let endpoint = self.issuer.metadata.backchannel_qr_endpoint.as_ref().ok_or_else(|| {
			ConfigError::MissingEndpoint {
				issuer: self.issuer.issuer().to_owned(),
				endpoint: "backchannel_qr",
			}
		})?;
		let claims = ProofClaims {
			challenge_id: &challenge.id,
			duration: (now - self.started_at).whole_seconds().max(0),
		};
		let claims = serde_json::to_value(claims).map_err(CodecError::from)?;
		let token = codec.sign(&claims, challenge.secret.expose().as_bytes())?;
		let mut url = endpoint.clone();

		url.query_pairs_mut().append_pair("token", &token);

		Ok(url)
	}
}
