//! Authentication strategies behind one capability contract.
//!
//! Every strategy implements [`AuthProvider`]: `fetch`, `establish_session`,
//! `revoke_session`, and a readable base URL. Each variant owns its 401 policy.
//! [`JwtBearerProvider`] refreshes its token and replays the request once;
//! [`StaticCredentialProvider`] has nothing to refresh and returns the 401 as-is.

pub mod jwt_bearer;
pub mod static_credential;

pub use jwt_bearer::*;
pub use static_credential::*;

// self
use crate::{_prelude::*, transport::Body};

/// Boxed future returned by [`AuthProvider`] operations.
pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Capability every authentication strategy exposes to the REST client.
///
/// Implementors are required to be `Send + Sync` so one provider can back many
/// concurrent requests. Callers never branch on the concrete strategy.
pub trait AuthProvider: Send + Sync {
	/// Base URL that every request handled by this provider must stay under.
	fn base_url(&self) -> &Url;

	/// Sends `request` with this strategy's credentials applied.
	fn fetch(&self, request: http::Request<Body>) -> ProviderFuture<'_, http::Response<Bytes>>;

	/// Prepares credentials ahead of the first request.
	fn establish_session(&self) -> ProviderFuture<'_, ()>;

	/// Discards any credentials held by the strategy.
	fn revoke_session(&self) -> ProviderFuture<'_, ()>;
}
