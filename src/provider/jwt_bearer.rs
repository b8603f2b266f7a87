//! SMART Backend Services strategy: JWT-bearer client credentials.

// self
use crate::{
	_prelude::*,
	config::JwtBearerConfig,
	error::ConfigError,
	fetch::AuthenticatedFetch,
	flows::TokenManager,
	provider::{AuthProvider, ProviderFuture},
	transport::{Body, HttpTransport},
};
#[cfg(feature = "reqwest")] use crate::transport::ReqwestTransport;

#[cfg(feature = "reqwest")]
/// JWT-bearer provider specialized for the crate's default reqwest transport.
pub type ReqwestJwtBearerProvider = JwtBearerProvider<ReqwestTransport>;

/// [`AuthProvider`] that authenticates with short-lived tokens obtained through signed
/// client assertions.
///
/// A 401 from the API is read as "the cached token is stale": the token is invalidated
/// and the request is replayed once with a fresh one.
pub struct JwtBearerProvider<T>
where
	T: ?Sized + HttpTransport,
{
	fetch: AuthenticatedFetch<T>,
}
impl<T> JwtBearerProvider<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a provider that reuses the caller-provided transport.
	pub fn with_transport(
		config: JwtBearerConfig,
		transport: impl Into<Arc<T>>,
	) -> Result<Self, ConfigError> {
		Ok(Self { fetch: AuthenticatedFetch::new(TokenManager::new(config, transport)?) })
	}

	/// Token manager, for callers that need the raw token or its metrics.
	pub fn tokens(&self) -> &TokenManager<T> {
		self.fetch.tokens()
	}
}
#[cfg(feature = "reqwest")]
impl JwtBearerProvider<ReqwestTransport> {
	/// Creates a provider with its own redirect-free reqwest transport.
	pub fn new(config: JwtBearerConfig) -> Result<Self, ConfigError> {
		Self::with_transport(config, ReqwestTransport::new()?)
	}
}
impl<T> AuthProvider for JwtBearerProvider<T>
where
	T: ?Sized + HttpTransport,
{
	fn base_url(&self) -> &Url {
		self.fetch.base_url()
	}

	fn fetch(&self, request: http::Request<Body>) -> ProviderFuture<'_, http::Response<Bytes>> {
		self.fetch.fetch(request)
	}

	fn establish_session(&self) -> ProviderFuture<'_, ()> {
		Box::pin(self.tokens().establish_session())
	}

	fn revoke_session(&self) -> ProviderFuture<'_, ()> {
		Box::pin(async move {
			self.tokens().revoke_session().await;

			Ok(())
		})
	}
}
impl<T> Debug for JwtBearerProvider<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("JwtBearerProvider").field("tokens", self.tokens()).finish()
	}
}
