//! Crate-level error types shared by discovery, signing, token requests, and fetches.
//!
//! [`Error`] is `Clone` because one settled token or discovery request is handed to every
//! caller that joined it; foreign error sources are therefore held behind [`Arc`].

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type SharedError = Arc<dyn StdError + Send + Sync>;
type JsonPathError = Arc<serde_path_to_error::Error<serde_json::Error>>;

/// Canonical error exposed by public APIs.
#[derive(Clone, Debug, ThisError)]
pub enum Error {
	/// Local configuration problem (bad key format, missing settings).
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Token endpoint discovery failed.
	#[error(transparent)]
	Discovery(#[from] DiscoveryError),
	/// Token endpoint refused or garbled the token request.
	#[error(transparent)]
	TokenRequest(#[from] TokenRequestError),
	/// Transport failure (DNS, TCP, TLS) outside discovery.
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Signing the client assertion failed after the key was imported.
	#[error("Client assertion signing failed: {reason}.")]
	Signing {
		/// Signer-supplied reason string.
		reason: String,
	},
	/// Request body could not be serialized.
	#[error("Request body could not be serialized: {reason}.")]
	RequestBody {
		/// Serializer-supplied reason.
		reason: String,
	},
	/// Outbound request points outside the configured base URL.
	#[error("Request target `{target}` is outside the configured base URL `{base}`.")]
	TargetMismatch {
		/// Rejected request target.
		target: String,
		/// Configured base URL.
		base: String,
	},
}

/// Configuration and validation failures. These are never retried or auto-corrected.
#[derive(Clone, Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: SharedError,
	},
	/// HTTP request construction failed.
	#[error("HTTP request could not be constructed.")]
	HttpRequest {
		/// Underlying request builder failure.
		#[source]
		source: Arc<http::Error>,
	},
	/// A required configuration field was not supplied.
	#[error("Configuration field `{field}` is required.")]
	MissingField {
		/// Name of the missing field.
		field: &'static str,
	},
	/// A configured URL is unusable.
	#[error("Configuration field `{field}` is not a usable URL: {reason}.")]
	InvalidUrl {
		/// Name of the offending field.
		field: &'static str,
		/// Human-readable reason.
		reason: String,
	},
	/// Configuration document could not be parsed.
	#[error("Configuration document is malformed.")]
	Malformed {
		/// Structured parsing failure.
		#[source]
		source: JsonPathError,
	},
	/// An identifier failed validation.
	#[error(transparent)]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
	/// The requested scope string is empty.
	#[error("Requested scope cannot be empty.")]
	EmptyScope,
	/// The private key file could not be read.
	#[error("Private key file `{path}` could not be read.")]
	KeyFile {
		/// Path that failed to load.
		path: String,
		/// Underlying IO failure.
		#[source]
		source: Arc<std::io::Error>,
	},
	/// A static credential cannot be carried in an HTTP header.
	#[error("Credential header `{name}` is invalid: {reason}.")]
	InvalidCredentialHeader {
		/// Header name as supplied.
		name: String,
		/// Parser-supplied reason.
		reason: String,
	},
	/// PKCS#1 RSA key supplied where PKCS#8 is required.
	#[error(
		"Private key is PKCS#1 (`BEGIN RSA PRIVATE KEY`); convert it to PKCS#8 with `openssl pkcs8 -topk8 -nocrypt -in key.pem -out key-pkcs8.pem`."
	)]
	Pkcs1PrivateKey,
	/// SEC1 EC key supplied where PKCS#8 is required.
	#[error(
		"Private key is SEC1 (`BEGIN EC PRIVATE KEY`); convert it to PKCS#8 with `openssl pkcs8 -topk8 -nocrypt -in key.pem -out key-pkcs8.pem`."
	)]
	Sec1PrivateKey,
	/// Key material is not a PKCS#8 PEM document.
	#[error("Private key must be a PKCS#8 PEM document (`BEGIN PRIVATE KEY`).")]
	NotPkcs8,
	/// PKCS#8 document could not be imported for the configured algorithm.
	#[error("Private key cannot be imported for {algorithm}: {reason}.")]
	InvalidPrivateKey {
		/// Configured signing algorithm.
		algorithm: &'static str,
		/// Decoder-supplied reason.
		reason: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Arc::new(src) }
	}
}
impl From<http::Error> for ConfigError {
	fn from(e: http::Error) -> Self {
		Self::HttpRequest { source: Arc::new(e) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Failures while resolving the token endpoint through the discovery document.
#[derive(Clone, Debug, ThisError)]
pub enum DiscoveryError {
	/// Discovery endpoint could not be reached.
	#[error("Discovery endpoint is unreachable.")]
	Unreachable(#[source] TransportError),
	/// Discovery endpoint answered with a non-success status.
	#[error("Discovery endpoint returned HTTP {status}: {body}")]
	Status {
		/// HTTP status code.
		status: u16,
		/// Response body text.
		body: String,
	},
	/// Discovery document is not valid JSON for the expected shape.
	#[error("Discovery document is malformed.")]
	Malformed {
		/// Structured parsing failure.
		#[source]
		source: JsonPathError,
	},
	/// Discovery document omitted `token_endpoint`.
	#[error("Discovery document is missing `token_endpoint`.")]
	MissingTokenEndpoint,
	/// Discovery document advertised an unparsable `token_endpoint`.
	#[error("Discovery document advertises an invalid `token_endpoint`: {value}.")]
	InvalidTokenEndpoint {
		/// Raw advertised value.
		value: String,
	},
}

/// Failures reported by the token endpoint. Credential mismatches (wrong key, unknown
/// client) land here too; the distinction lives on the server.
#[derive(Clone, Debug, ThisError)]
pub enum TokenRequestError {
	/// Token endpoint answered with a non-success status.
	#[error("Token endpoint returned HTTP {status}: {body}")]
	Rejected {
		/// HTTP status code.
		status: u16,
		/// Response body text, verbatim.
		body: String,
		/// OAuth `error` code when the body is an OAuth error document.
		oauth_error: Option<String>,
	},
	/// Token endpoint responded with JSON that could not be parsed.
	#[error("Token endpoint returned a malformed token response.")]
	Malformed {
		/// Structured parsing failure.
		#[source]
		source: JsonPathError,
	},
	/// Token endpoint returned a non-positive `expires_in`.
	#[error("The expires_in value must be positive, got {expires_in}.")]
	NonPositiveExpiresIn {
		/// Value returned by the server.
		expires_in: i64,
	},
	/// Token endpoint returned an `expires_in` whose expiry instant cannot be represented.
	#[error("The expires_in value {expires_in} is out of range.")]
	ExpiresInOutOfRange {
		/// Value returned by the server.
		expires_in: i64,
	},
	/// The access token cannot be carried in an `Authorization` header.
	#[error("Token endpoint returned an access token that is not a valid header value.")]
	UnusableAccessToken,
}

/// Transport-level failures (network, IO).
#[derive(Clone, Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling `{target}`.")]
	Network {
		/// Request target that failed.
		target: String,
		/// Transport-specific network error.
		#[source]
		source: SharedError,
	},
	/// Request URI could not be handed to the HTTP client.
	#[error("Request URI `{uri}` is not an absolute URL.")]
	InvalidUri {
		/// Offending URI.
		uri: String,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during transport.")]
	Io(#[source] Arc<std::io::Error>),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(target: impl Into<String>, src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { target: target.into(), source: Arc::new(src) }
	}
}
impl From<std::io::Error> for TransportError {
	fn from(e: std::io::Error) -> Self {
		Self::Io(Arc::new(e))
	}
}
