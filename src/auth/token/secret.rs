//! Access-token wrapper that redacts sensitive material.

// crates.io
use http::HeaderValue;
// self
use crate::{_prelude::*, error::TokenRequestError};

/// Redacted access-token wrapper keeping bearer credentials out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Builds the `Authorization: Bearer <token>` header value, marked sensitive.
	pub fn bearer_header(&self) -> Result<HeaderValue, TokenRequestError> {
		let mut value = HeaderValue::try_from(format!("Bearer {}", self.0))
			.map_err(|_| TokenRequestError::UnusableAccessToken)?;

		value.set_sensitive(true);

		Ok(value)
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}
