//! Token codec seam used to sign out-of-band proof tokens.
//!
//! Verification, key-set handling and other algorithms live behind the same trait in
//! downstream crates; [`Hs256Codec`] covers the shared-secret case the proof token needs.

// crates.io
use jsonwebtoken::{Algorithm, EncodingKey, Header};
// self
use crate::_prelude::*;

/// Failures raised while producing a signed token.
#[derive(Debug, ThisError)]
pub enum CodecError {
	/// Claims could not be serialized.
	#[error("Token claims could not be serialized.")]
	Claims(#[from] serde_json::Error),
	/// The JWT encoder rejected the key or the claims.
	#[error("Token could not be signed.")]
	Jwt(#[from] jsonwebtoken::errors::Error),
}

/// Signs claim sets into compact tokens.
pub trait TokenCodec: Send + Sync {
	/// JOSE algorithm label (`alg` header value).
	fn algorithm(&self) -> &'static str;

	/// Signs `claims` with `key` and returns the compact serialization.
	fn sign(&self, claims: &serde_json::Value, key: &[u8]) -> Result<String, CodecError>;
}

/// Compact JWS signer using HMAC-SHA256.
#[derive(Clone, Copy, Debug, Default)]
pub struct Hs256Codec;
impl TokenCodec for Hs256Codec {
	fn algorithm(&self) -> &'static str {
		"HS256"
	}

	fn sign(&self, claims: &serde_json::Value, key: &[u8]) -> Result<String, CodecError> {
		let token = jsonwebtoken::encode(
			&Header::new(Algorithm::HS256),
			claims,
			&EncodingKey::from_secret(key),
		)?;

		Ok(token)
	}
}
