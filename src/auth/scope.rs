//! Ordered scope lists used in backchannel requests and token responses.

// std
use std::slice::Iter;
// crates.io
use serde::{Deserializer, Serializer, de::Error as DeError};
// self
use crate::_prelude::*;

/// Scope requested when the caller asks for nothing else.
pub const OPENID_SCOPE: &str = "openid";
/// Scope that asks the provider for a refresh token.
pub const OFFLINE_ACCESS_SCOPE: &str = "offline_access";

/// Errors emitted when validating scopes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ScopeValidationError {
	/// Empty scope entries are not allowed.
	#[error("Scope entries cannot be empty.")]
	Empty,
	/// Scopes cannot contain embedded whitespace characters.
	#[error("Scope contains whitespace: {scope}.")]
	ContainsWhitespace {
		/// The offending scope string.
		scope: String,
	},
}

/// Validated OAuth scopes kept in caller order.
///
/// Providers may attach meaning to the order of requested scopes, so unlike a set the
/// list neither sorts nor deduplicates. On the wire it is a single space-delimited string.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Scopes(Vec<String>);
impl Scopes {
	/// Creates a scope list from any iterator, keeping the input order.
	pub fn new<I, S>(scopes: I) -> Result<Self, ScopeValidationError>
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let mut list = Vec::new();

		for scope in scopes {
			let owned: String = scope.into();

			if owned.is_empty() {
				return Err(ScopeValidationError::Empty);
			}
			if owned.chars().any(char::is_whitespace) {
				return Err(ScopeValidationError::ContainsWhitespace { scope: owned });
			}

			list.push(owned);
		}

		Ok(Self(list))
	}

	/// Number of scopes.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns true if no scopes are defined.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Returns true if the list contains the provided scope.
	pub fn contains(&self, scope: &str) -> bool {
		self.0.iter().any(|candidate| candidate == scope)
	}

	/// Iterator over scopes in order.
	pub fn iter(&self) -> ScopeIter<'_> {
		ScopeIter { inner: self.0.iter() }
	}

	/// Returns the space-delimited wire representation.
	pub fn joined(&self) -> String {
		self.0.join(" ")
	}

	/// Returns the underlying slice of scope strings.
	pub fn as_slice(&self) -> &[String] {
		&self.0
	}
}
impl Debug for Scopes {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("Scopes").field(&self.0).finish()
	}
}
impl Display for Scopes {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.joined())
	}
}

/// Iterator over scope strings.
pub struct ScopeIter<'a> {
	inner: Iter<'a, String>,
}
impl<'a> Iterator for ScopeIter<'a> {
	type Item = &'a str;

	fn next(&mut self) -> Option<Self::Item> {
		self.inner.next().map(|s| s.as_str())
	}
}
impl<'a> IntoIterator for &'a Scopes {
	type IntoIter = ScopeIter<'a>;
	type Item = &'a str;

	fn into_iter(self) -> Self::IntoIter {
		self.iter()
	}
}
impl TryFrom<Vec<String>> for Scopes {
	type Error = ScopeValidationError;

	fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}
impl FromStr for Scopes {
	type Err = ScopeValidationError;

	/// Splits on any whitespace; an empty or blank string is an empty list.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s.split_whitespace())
	}
}
impl Serialize for Scopes {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&self.joined())
	}
}
impl<'de> Deserialize<'de> for Scopes {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let raw = String::deserialize(deserializer)?;

		raw.parse().map_err(DeError::custom)
	}
}
