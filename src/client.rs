//! Generic REST client that delegates authentication to an [`AuthProvider`].

// crates.io
use http::{
	Method,
	header::{ACCEPT, CONTENT_TYPE},
};
// self
use crate::{_prelude::*, error::ConfigError, provider::AuthProvider, transport::Body};

/// Thin REST client; resolves paths against the provider base URL and forwards requests.
///
/// The client only uses the provider contract, so swapping strategies never changes
/// call sites.
#[derive(Clone)]
pub struct RestClient {
	provider: Arc<dyn AuthProvider>,
}
impl RestClient {
	/// Wraps a shared provider.
	pub fn new(provider: Arc<dyn AuthProvider>) -> Self {
		Self { provider }
	}

	/// Wraps an owned provider.
	pub fn from_provider<P>(provider: P) -> Self
	where
		P: 'static + AuthProvider,
	{
		Self::new(Arc::new(provider))
	}

	/// Provider backing this client.
	pub fn provider(&self) -> &Arc<dyn AuthProvider> {
		&self.provider
	}

	/// Provider base URL.
	pub fn base_url(&self) -> &Url {
		self.provider.base_url()
	}

	/// Resolves `path` (optionally carrying a query) below the base URL.
	pub fn url(&self, path: &str) -> Result<Url> {
		let base = self.base_url().as_str().trim_end_matches('/');
		let path = path.trim_start_matches('/');

		Url::parse(&format!("{base}/{path}")).map_err(|e| {
			ConfigError::InvalidUrl { field: "path", reason: e.to_string() }.into()
		})
	}

	/// Sends a fully formed request through the provider.
	pub async fn send(&self, request: http::Request<Body>) -> Result<http::Response<Bytes>> {
		self.provider.fetch(request).await
	}

	/// `GET {base}/{path}` expecting JSON.
	pub async fn get(&self, path: &str) -> Result<http::Response<Bytes>> {
		let request = self.request(Method::GET, path)?.body(Body::Empty).map_err(ConfigError::from)?;

		self.send(request).await
	}

	/// `POST {base}/{path}` with a JSON body.
	pub async fn post_json<B>(&self, path: &str, body: &B) -> Result<http::Response<Bytes>>
	where
		B: ?Sized + Serialize,
	{
		let payload =
			serde_json::to_vec(body).map_err(|e| Error::RequestBody { reason: e.to_string() })?;
		let request = self
			.request(Method::POST, path)?
			.header(CONTENT_TYPE, "application/json")
			.body(Body::from(payload))
			.map_err(ConfigError::from)?;

		self.send(request).await
	}

	/// Forwards to [`AuthProvider::establish_session`].
	pub async fn establish_session(&self) -> Result<()> {
		self.provider.establish_session().await
	}

	/// Forwards to [`AuthProvider::revoke_session`].
	pub async fn revoke_session(&self) -> Result<()> {
		self.provider.revoke_session().await
	}

	fn request(&self, method: Method, path: &str) -> Result<http::request::Builder> {
		let url = self.url(path)?;

		Ok(http::Request::builder()
			.method(method)
			.uri(url.as_str())
			.header(ACCEPT, "application/json"))
	}
}
impl Debug for RestClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RestClient").field("base_url", self.base_url()).finish()
	}
}
