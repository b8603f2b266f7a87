//! Token lifecycle: cache, deduplicated acquisition, and revocation.
//!
//! [`TokenManager`] owns the per-provider state (token cache, discovery cache, imported
//! key) and exposes one "get a valid token" operation. A cache hit returns without
//! suspending. A miss joins the request already in flight or starts one:
//! import key → resolve endpoint → sign assertion → POST → cache. Failures are shared with
//! every joiner and leave the cache untouched.

pub mod client_credentials;
mod metrics;
pub mod singleflight;

pub use client_credentials::*;
pub use metrics::*;
pub use singleflight::*;

// crates.io
use futures::FutureExt;
// self
use crate::{
	_prelude::*,
	auth::{CachedToken, TokenCache, TokenSecret},
	config::JwtBearerConfig,
	discovery::DiscoveryCache,
	error::ConfigError,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	signing::{AssertionClaims, SigningEngine},
	transport::HttpTransport,
};
#[cfg(feature = "reqwest")] use crate::transport::ReqwestTransport;

#[cfg(feature = "reqwest")]
/// Token manager specialized for the crate's default reqwest transport.
pub type ReqwestTokenManager = TokenManager<ReqwestTransport>;

/// Acquires, caches, and revokes access tokens for one JWT-bearer client.
///
/// Clones share all state; each independently constructed manager has its own caches.
pub struct TokenManager<T>
where
	T: ?Sized + HttpTransport,
{
	inner: Arc<Inner<T>>,
}
impl<T> TokenManager<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a manager for `config`, sending every request through `transport`.
	pub fn new(config: JwtBearerConfig, transport: impl Into<Arc<T>>) -> Result<Self, ConfigError> {
		config.validate()?;

		let transport = transport.into();
		let discovery = DiscoveryCache::new(Arc::clone(&transport), &config)?;
		let signer = SigningEngine::from_config(&config);

		Ok(Self {
			inner: Arc::new(Inner {
				config,
				transport,
				discovery,
				signer,
				cache: Default::default(),
				flights: Default::default(),
				metrics: Default::default(),
			}),
		})
	}

	/// Immutable configuration.
	pub fn config(&self) -> &JwtBearerConfig {
		&self.inner.config
	}

	/// Shared transport.
	pub fn transport(&self) -> &Arc<T> {
		&self.inner.transport
	}

	/// Discovery cache, exposed so callers can inspect the fetched document.
	pub fn discovery(&self) -> &DiscoveryCache<T> {
		&self.inner.discovery
	}

	/// In-process counters.
	pub fn metrics(&self) -> &TokenMetrics {
		&self.inner.metrics
	}

	/// Snapshot of the cached token regardless of expiry.
	pub fn cached_token(&self) -> Option<CachedToken> {
		self.inner.cache.snapshot()
	}

	/// Returns `true` while a token request is pending.
	pub fn is_request_in_flight(&self) -> bool {
		self.inner.flights.is_pending()
	}

	/// Returns a token usable under the expiration buffer, requesting one when needed.
	///
	/// Concurrent callers that miss the cache share a single token request and observe
	/// the same token or the same error.
	pub async fn access_token(&self) -> Result<TokenSecret> {
		let buffer = self.inner.config.expiration_buffer();

		if let Some(token) = self.inner.cache.usable(OffsetDateTime::now_utc(), buffer) {
			self.inner.metrics.record_cache_hit();

			return Ok(token);
		}

		let inner = Arc::clone(&self.inner);
		let joined = self.inner.flights.join_or_start(
			|| self.inner.cache.usable(OffsetDateTime::now_utc(), buffer),
			move || request_token(inner).boxed(),
		);

		match joined {
			Joined::Ready(token) => {
				self.inner.metrics.record_cache_hit();

				Ok(token)
			},
			Joined::Pending(flight) => {
				self.inner.metrics.record_join();

				flight.await
			},
		}
	}

	/// Ensures a usable token exists, surfacing credential problems eagerly.
	pub async fn establish_session(&self) -> Result<()> {
		self.access_token().await.map(|_| ())
	}

	/// Drops the cached token, imported key, and discovery document.
	///
	/// A token request already in flight is awaited first (its outcome is ignored) so it
	/// cannot repopulate the cache after revocation.
	pub async fn revoke_session(&self) {
		if let Some(flight) = self.inner.flights.current() {
			obs::record_event(FlowKind::TokenRequest, "revocation waiting for in-flight token request");

			let _ = flight.await;
		}

		self.inner.discovery.settle().await;
		self.inner.cache.clear();
		self.inner.signer.clear();
		self.inner.discovery.clear();
	}

	/// Evicts `rejected` if it is still the cached token.
	///
	/// A server rejection is authoritative even when the token has not expired locally.
	/// Returns `true` when an entry was evicted.
	pub fn invalidate(&self, rejected: &TokenSecret) -> bool {
		self.inner.cache.evict_if(rejected)
	}
}
impl<T> Clone for TokenManager<T>
where
	T: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self { inner: Arc::clone(&self.inner) }
	}
}
impl<T> Debug for TokenManager<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenManager")
			.field("client_id", &self.inner.config.client_id)
			.field("discovery", &self.inner.discovery)
			.field("signer", &self.inner.signer)
			.field("cached", &self.inner.cache.snapshot())
			.field("flights", &self.inner.flights)
			.finish()
	}
}

struct Inner<T>
where
	T: ?Sized + HttpTransport,
{
	config: JwtBearerConfig,
	transport: Arc<T>,
	discovery: DiscoveryCache<T>,
	signer: SigningEngine,
	cache: TokenCache,
	flights: Singleflight<TokenSecret>,
	metrics: TokenMetrics,
}

async fn request_token<T>(inner: Arc<Inner<T>>) -> Result<TokenSecret>
where
	T: ?Sized + HttpTransport,
{
	const KIND: FlowKind = FlowKind::TokenRequest;

	let span = FlowSpan::new(KIND, "request_token");

	obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
	inner.metrics.record_request();

	let result = span
		.instrument(async {
			// Key format problems must surface before any network call.
			inner.signer.import_key()?;

			let endpoint = inner.discovery.resolve_token_endpoint().await?;

			let advertised = inner
				.discovery
				.document()
				.and_then(|document| document.supports_signing_algorithm(inner.signer.algorithm()));

			if advertised == Some(false) {
				obs::record_event(KIND, "server does not advertise the configured signing algorithm");
			}

			let claims =
				AssertionClaims::new(&inner.config.client_id, &endpoint, OffsetDateTime::now_utc());
			let assertion = inner.signer.build_assertion(&claims)?;
			let request =
				client_credentials::token_request(&endpoint, &assertion, &inner.config.scope)?;
			let response = inner.transport.send(request).await?;
			let token = client_credentials::parse_token_response(&response)?;
			let cached = CachedToken::issued(
				token.access_token.clone(),
				OffsetDateTime::now_utc(),
				token.lifetime(),
			)?;

			inner.cache.store(cached);

			Ok(token.access_token)
		})
		.await;

	if result.is_err() {
		inner.metrics.record_failure();
	}

	obs::record_result(KIND, result)
}
