//! Stateless strategy that injects one fixed credential header.

// crates.io
use http::{HeaderName, HeaderValue, header::AUTHORIZATION};
// self
use crate::{
	_prelude::*,
	error::ConfigError,
	fetch,
	provider::{AuthProvider, ProviderFuture},
	transport::{Body, HttpTransport},
};

/// [`AuthProvider`] that adds a fixed header (API key, long-lived bearer token) to every
/// request.
///
/// There is no expiry to recover from, so a 401 is returned to the caller untouched and
/// the session operations do nothing.
pub struct StaticCredentialProvider<T>
where
	T: ?Sized + HttpTransport,
{
	base_url: Url,
	header_name: HeaderName,
	header_value: HeaderValue,
	transport: Arc<T>,
}
impl<T> StaticCredentialProvider<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a provider sending `name: value` on every request.
	pub fn new(
		base_url: Url,
		name: &str,
		value: &str,
		transport: impl Into<Arc<T>>,
	) -> Result<Self, ConfigError> {
		let invalid = |reason: String| ConfigError::InvalidCredentialHeader {
			name: name.to_owned(),
			reason,
		};
		let header_name = HeaderName::try_from(name).map_err(|e| invalid(e.to_string()))?;
		let mut header_value = HeaderValue::try_from(value).map_err(|e| invalid(e.to_string()))?;

		header_value.set_sensitive(true);

		Ok(Self { base_url, header_name, header_value, transport: transport.into() })
	}

	/// Creates a provider sending `Authorization: Bearer <token>`.
	pub fn bearer(
		base_url: Url,
		token: &str,
		transport: impl Into<Arc<T>>,
	) -> Result<Self, ConfigError> {
		Self::new(base_url, AUTHORIZATION.as_str(), &format!("Bearer {token}"), transport)
	}
}
impl<T> AuthProvider for StaticCredentialProvider<T>
where
	T: ?Sized + HttpTransport,
{
	fn base_url(&self) -> &Url {
		&self.base_url
	}

	fn fetch(&self, mut request: http::Request<Body>) -> ProviderFuture<'_, http::Response<Bytes>> {
		Box::pin(async move {
			fetch::ensure_within_base(&self.base_url, request.uri())?;
			request.headers_mut().insert(self.header_name.clone(), self.header_value.clone());

			Ok(self.transport.send(request).await?)
		})
	}

	fn establish_session(&self) -> ProviderFuture<'_, ()> {
		Box::pin(async { Ok(()) })
	}

	fn revoke_session(&self) -> ProviderFuture<'_, ()> {
		Box::pin(async { Ok(()) })
	}
}
impl<T> Debug for StaticCredentialProvider<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("StaticCredentialProvider")
			.field("base_url", &self.base_url)
			.field("header_name", &self.header_name)
			.finish()
	}
}
