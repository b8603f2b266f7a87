//! Bearer-authenticated requests with one transparent retry on 401.
//!
//! [`AuthenticatedFetch`] checks that the request stays under the configured base URL,
//! attaches a token from the [`TokenManager`], and sends. A 401 invalidates the rejected
//! token and the same request is resent once with a fresh token and a replay of the body.
//! Whatever the retry returns is handed back unchanged.

pub mod body;

pub use body::*;

// crates.io
use futures::future;
use http::{StatusCode, header::AUTHORIZATION, request::Parts};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	flows::TokenManager,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	transport::{Body, HttpTransport},
};

/// Boxed future returned by [`AuthenticatedFetch::fetch`].
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<http::Response<Bytes>>> + 'a + Send>>;

/// Sends requests with a bearer token and replays them once after a 401.
pub struct AuthenticatedFetch<T>
where
	T: ?Sized + HttpTransport,
{
	tokens: TokenManager<T>,
}
impl<T> AuthenticatedFetch<T>
where
	T: ?Sized + HttpTransport,
{
	/// Wraps a token manager.
	pub fn new(tokens: TokenManager<T>) -> Self {
		Self { tokens }
	}

	/// Token manager backing this fetcher.
	pub fn tokens(&self) -> &TokenManager<T> {
		&self.tokens
	}

	/// Base URL every request must stay under.
	pub fn base_url(&self) -> &Url {
		&self.tokens.config().base_url
	}

	/// Sends `request` with a bearer token.
	///
	/// Requests outside the base URL fail with [`Error::TargetMismatch`] before any token
	/// or network work happens.
	pub fn fetch(&self, request: http::Request<Body>) -> FetchFuture<'_> {
		const KIND: FlowKind = FlowKind::AuthenticatedFetch;

		if let Err(e) = ensure_within_base(self.base_url(), request.uri()) {
			return Box::pin(future::ready(Err(e)));
		}

		let span = FlowSpan::new(KIND, "fetch");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		Box::pin(async move {
			let result = span.instrument(self.fetch_with_retry(request)).await;

			obs::record_result(KIND, result)
		})
	}

	async fn fetch_with_retry(&self, request: http::Request<Body>) -> Result<http::Response<Bytes>> {
		let (parts, body) = request.into_parts();
		let (body, replay) = split_for_retry(body);
		let token = self.tokens.access_token().await?;
		let response = self.send(&parts, body, &token).await?;

		if response.status() != StatusCode::UNAUTHORIZED {
			return Ok(response);
		}

		obs::record_event(FlowKind::AuthenticatedFetch, "retrying once after 401 with a fresh token");
		self.tokens.invalidate(&token);

		let token = self.tokens.access_token().await?;

		self.send(&parts, replay, &token).await
	}

	async fn send(
		&self,
		parts: &Parts,
		body: Body,
		token: &TokenSecret,
	) -> Result<http::Response<Bytes>> {
		let mut request = http::Request::new(body);

		*request.method_mut() = parts.method.clone();
		*request.uri_mut() = parts.uri.clone();
		*request.version_mut() = parts.version;
		*request.headers_mut() = parts.headers.clone();
		request.headers_mut().insert(AUTHORIZATION, token.bearer_header()?);

		Ok(self.tokens.transport().send(request).await?)
	}
}
impl<T> Clone for AuthenticatedFetch<T>
where
	T: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self { tokens: self.tokens.clone() }
	}
}
impl<T> Debug for AuthenticatedFetch<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthenticatedFetch").field("base_url", self.base_url()).finish()
	}
}

/// Ensures `target` shares scheme, host, and port with `base` and sits under its path.
///
/// Path containment is segment-aware: `/api` admits `/api` and `/api/x` but not `/apix`.
pub fn ensure_within_base(base: &Url, target: &http::Uri) -> Result<()> {
	let mismatch = || Error::TargetMismatch { target: target.to_string(), base: base.to_string() };
	let target_url = Url::parse(&target.to_string()).map_err(|_| mismatch())?;

	if target_url.scheme() != base.scheme()
		|| target_url.host_str() != base.host_str()
		|| target_url.port_or_known_default() != base.port_or_known_default()
	{
		return Err(mismatch());
	}

	let base_path = base.path().trim_end_matches('/');
	let path = target_url.path();
	let contained = base_path.is_empty()
		|| path == base_path
		|| path.strip_prefix(base_path).is_some_and(|rest| rest.starts_with('/'));

	if contained { Ok(()) } else { Err(mismatch()) }
}
