//! Immutable JWT-bearer provider configuration.
//!
//! [`JwtBearerConfig`] is created once (through [`JwtBearerConfigBuilder`] or deserialized
//! from JSON) and never mutated afterwards. It decides where tokens come from: an explicit
//! endpoint wins, then the fixed `{base_url}/auth/token` path when discovery is skipped, and
//! finally the discovery document at `{base_url}/.well-known/smart-configuration`.

mod builder;

pub use builder::*;

// self
use crate::{
	_prelude::*,
	auth::{ClientId, KeyId, PrivateKeyPem},
	error::ConfigError,
	signing::SigningAlgorithm,
};

/// Default safety margin subtracted from token expiry.
pub const DEFAULT_EXPIRATION_BUFFER_SECS: u32 = 30;

const DISCOVERY_PATH: &str = ".well-known/smart-configuration";
const DEFAULT_TOKEN_PATH: &str = "auth/token";

/// Where the token endpoint is taken from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenEndpointSource {
	/// Configured explicitly; no discovery or caching involved.
	Explicit(Url),
	/// Discovery skipped; the fixed default path under the base URL.
	Default(Url),
	/// Read from the discovery document at this URL.
	Discovery(Url),
}

/// Configuration for the SMART Backend Services JWT-bearer provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtBearerConfig {
	/// API base URL; every authenticated request must target a path under it.
	pub base_url: Url,
	/// OAuth client identifier.
	pub client_id: ClientId,
	/// PKCS#8 PEM private key used to sign assertions.
	pub private_key: PrivateKeyPem,
	/// Key identifier advertised as `kid`.
	pub key_id: KeyId,
	/// Space-delimited scope string sent verbatim with each token request.
	pub scope: String,
	/// Assertion signing algorithm.
	#[serde(default)]
	pub algorithm: SigningAlgorithm,
	/// Seconds subtracted from token expiry before a cached token is considered stale.
	#[serde(default = "default_expiration_buffer_secs")]
	pub expiration_buffer_secs: u32,
	/// Explicit token endpoint; bypasses discovery entirely.
	#[serde(default)]
	pub token_endpoint: Option<Url>,
	/// Skips discovery and uses `{base_url}/auth/token` when no explicit endpoint is set.
	#[serde(default)]
	pub skip_discovery: bool,
}
impl JwtBearerConfig {
	/// Creates a new builder for the provided base URL.
	pub fn builder(base_url: Url) -> JwtBearerConfigBuilder {
		JwtBearerConfigBuilder::new(base_url)
	}

	/// Parses and validates a JSON configuration document.
	pub fn from_json(raw: &str) -> Result<Self> {
		let de = &mut serde_json::Deserializer::from_str(raw);
		let config: Self = serde_path_to_error::deserialize(de)
			.map_err(|e| ConfigError::Malformed { source: Arc::new(e) })?;

		config.validate()?;

		Ok(config)
	}

	/// Expiration buffer as a [`Duration`].
	pub fn expiration_buffer(&self) -> Duration {
		Duration::seconds(i64::from(self.expiration_buffer_secs))
	}

	/// Resolves where the token endpoint comes from.
	pub fn token_endpoint_source(&self) -> Result<TokenEndpointSource, ConfigError> {
		if let Some(explicit) = &self.token_endpoint {
			return Ok(TokenEndpointSource::Explicit(explicit.clone()));
		}
		if self.skip_discovery {
			return join_path(&self.base_url, DEFAULT_TOKEN_PATH).map(TokenEndpointSource::Default);
		}

		join_path(&self.base_url, DISCOVERY_PATH).map(TokenEndpointSource::Discovery)
	}

	/// Validates invariants for the configuration.
	pub fn validate(&self) -> Result<(), ConfigError> {
		validate_base_url(&self.base_url)?;

		if let Some(endpoint) = &self.token_endpoint {
			validate_http_url("token_endpoint", endpoint)?;
		}
		if self.scope.trim().is_empty() {
			return Err(ConfigError::EmptyScope);
		}

		Ok(())
	}
}

fn default_expiration_buffer_secs() -> u32 {
	DEFAULT_EXPIRATION_BUFFER_SECS
}

/// Appends `suffix` as path segments below `base`, keeping any base path.
fn join_path(base: &Url, suffix: &str) -> Result<Url, ConfigError> {
	let joined = format!("{}/{suffix}", base.as_str().trim_end_matches('/'));

	Url::parse(&joined)
		.map_err(|e| ConfigError::InvalidUrl { field: "base_url", reason: e.to_string() })
}

fn validate_base_url(url: &Url) -> Result<(), ConfigError> {
	validate_http_url("base_url", url)?;

	if url.query().is_some() || url.fragment().is_some() {
		return Err(ConfigError::InvalidUrl {
			field: "base_url",
			reason: "query strings and fragments are not allowed".into(),
		});
	}

	Ok(())
}

fn validate_http_url(field: &'static str, url: &Url) -> Result<(), ConfigError> {
	match url.scheme() {
		"http" | "https" if url.has_host() => Ok(()),
		"http" | "https" => Err(ConfigError::InvalidUrl { field, reason: "missing host".into() }),
		scheme => Err(ConfigError::InvalidUrl {
			field,
			reason: format!("unsupported scheme `{scheme}`"),
		}),
	}
}
