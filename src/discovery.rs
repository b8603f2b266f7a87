//! Token endpoint resolution through the SMART discovery document.
//!
//! [`DiscoveryCache`] answers "where do tokens come from" for one provider. An explicit or
//! default endpoint is returned without I/O. Otherwise the document at
//! `{base_url}/.well-known/smart-configuration` is fetched once, cached whole, and shared by
//! every concurrent caller that arrives while the fetch is pending.

// crates.io
use futures::FutureExt;
use http::header::ACCEPT;
use serde_json::{Map, Value};
// self
use crate::{
	_prelude::*,
	config::{JwtBearerConfig, TokenEndpointSource},
	error::{ConfigError, DiscoveryError},
	flows::{Joined, Singleflight},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	signing::SigningAlgorithm,
	transport::{Body, HttpTransport},
};

const TOKEN_ENDPOINT_FIELD: &str = "token_endpoint";
const SIGNING_ALGS_FIELD: &str = "token_endpoint_auth_signing_alg_values_supported";

/// Parsed discovery document. Fields other than `token_endpoint` pass through untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SmartConfiguration {
	/// Where token requests are posted.
	pub token_endpoint: Url,
	/// Every other advertised field.
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}
impl SmartConfiguration {
	/// Parses a discovery response body.
	pub fn from_slice(raw: &[u8]) -> Result<Self, DiscoveryError> {
		let de = &mut serde_json::Deserializer::from_slice(raw);
		let mut extra: Map<String, Value> = serde_path_to_error::deserialize(de)
			.map_err(|e| DiscoveryError::Malformed { source: Arc::new(e) })?;
		let token_endpoint = match extra.remove(TOKEN_ENDPOINT_FIELD) {
			None | Some(Value::Null) => return Err(DiscoveryError::MissingTokenEndpoint),
			Some(Value::String(value)) => Url::parse(&value)
				.map_err(|_| DiscoveryError::InvalidTokenEndpoint { value: value.clone() })?,
			Some(other) => {
				return Err(DiscoveryError::InvalidTokenEndpoint { value: other.to_string() });
			},
		};

		Ok(Self { token_endpoint, extra })
	}

	/// Returns a pass-through field.
	pub fn get(&self, field: &str) -> Option<&Value> {
		self.extra.get(field)
	}

	/// Reports whether the server advertises `algorithm` for client assertions.
	///
	/// `None` when the document does not list signing algorithms at all.
	pub fn supports_signing_algorithm(&self, algorithm: SigningAlgorithm) -> Option<bool> {
		let advertised = self.get(SIGNING_ALGS_FIELD)?.as_array()?;

		Some(advertised.iter().any(|value| value.as_str() == Some(algorithm.as_str())))
	}
}

/// Resolves and caches the token endpoint for one provider.
pub struct DiscoveryCache<T>
where
	T: ?Sized + HttpTransport,
{
	transport: Arc<T>,
	source: TokenEndpointSource,
	document: Arc<RwLock<Option<Arc<SmartConfiguration>>>>,
	flights: Singleflight<Arc<SmartConfiguration>>,
}
impl<T> DiscoveryCache<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a cache for the endpoint source described by `config`.
	pub fn new(transport: Arc<T>, config: &JwtBearerConfig) -> Result<Self, ConfigError> {
		Ok(Self {
			transport,
			source: config.token_endpoint_source()?,
			document: Default::default(),
			flights: Default::default(),
		})
	}

	/// Where the token endpoint comes from.
	pub fn source(&self) -> &TokenEndpointSource {
		&self.source
	}

	/// Returns the token endpoint, fetching the discovery document on first use.
	pub async fn resolve_token_endpoint(&self) -> Result<Url> {
		match &self.source {
			TokenEndpointSource::Explicit(url) | TokenEndpointSource::Default(url) =>
				Ok(url.clone()),
			TokenEndpointSource::Discovery(_) =>
				self.discover().await.map(|document| document.token_endpoint.clone()),
		}
	}

	/// Returns the cached discovery document, fetching it when absent.
	///
	/// Explicit and default endpoint sources never fetch; they produce a synthetic document
	/// holding only the endpoint.
	pub async fn discover(&self) -> Result<Arc<SmartConfiguration>> {
		let url = match &self.source {
			TokenEndpointSource::Explicit(url) | TokenEndpointSource::Default(url) =>
				return Ok(Arc::new(SmartConfiguration {
					token_endpoint: url.clone(),
					extra: Map::new(),
				})),
			TokenEndpointSource::Discovery(url) => url.clone(),
		};

		if let Some(document) = self.document() {
			return Ok(document);
		}

		let transport = Arc::clone(&self.transport);
		let cache = Arc::clone(&self.document);
		let joined = self.flights.join_or_start(
			|| self.document(),
			move || fetch_and_store(transport, url, cache).boxed(),
		);

		match joined {
			Joined::Ready(document) => Ok(document),
			Joined::Pending(flight) => flight.await,
		}
	}

	/// Returns the cached document without fetching.
	pub fn document(&self) -> Option<Arc<SmartConfiguration>> {
		self.document.read().clone()
	}

	/// Waits for a pending discovery to settle, ignoring its outcome.
	pub async fn settle(&self) {
		if let Some(flight) = self.flights.current() {
			let _ = flight.await;
		}
	}

	/// Drops the cached document.
	pub fn clear(&self) {
		*self.document.write() = None;
	}
}
impl<T> Debug for DiscoveryCache<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("DiscoveryCache")
			.field("source", &self.source)
			.field("cached", &self.document.read().is_some())
			.field("flights", &self.flights)
			.finish()
	}
}

async fn fetch_and_store<T>(
	transport: Arc<T>,
	url: Url,
	cache: Arc<RwLock<Option<Arc<SmartConfiguration>>>>,
) -> Result<Arc<SmartConfiguration>>
where
	T: ?Sized + HttpTransport,
{
	const KIND: FlowKind = FlowKind::Discovery;

	let span = FlowSpan::new(KIND, "fetch_document");

	obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

	let result = span
		.instrument(async move {
			let document = Arc::new(fetch_document(transport.as_ref(), &url).await?);

			*cache.write() = Some(document.clone());

			Ok(document)
		})
		.await;

	obs::record_result(KIND, result)
}

async fn fetch_document<T>(transport: &T, url: &Url) -> Result<SmartConfiguration>
where
	T: ?Sized + HttpTransport,
{
	let request = http::Request::get(url.as_str())
		.header(ACCEPT, "application/json")
		.body(Body::Empty)
		.map_err(ConfigError::from)?;
	let response = transport.send(request).await.map_err(DiscoveryError::Unreachable)?;

	if !response.status().is_success() {
		return Err(DiscoveryError::Status {
			status: response.status().as_u16(),
			body: String::from_utf8_lossy(response.body()).into_owned(),
		}
		.into());
	}

	Ok(SmartConfiguration::from_slice(response.body())?)
}
