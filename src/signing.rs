//! Signed JWT client assertions (`private_key_jwt`) for the SMART Backend Services flow.
//!
//! [`SigningEngine`] turns [`AssertionClaims`] into a compact JWS:
//! `b64url(header).b64url(payload).b64url(signature)`, all segments unpadded. The header is
//! `{"alg","typ":"JWT","kid"}` and the signature covers the ASCII bytes of `header.payload`.
//! Private keys must be PKCS#8; the imported key is cached until [`SigningEngine::clear`].

mod key;

pub use key::*;

// std
use std::fmt::Write as _;
// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
// self
use crate::{
	_prelude::*,
	auth::{ClientId, KeyId, PrivateKeyPem},
	config::JwtBearerConfig,
	error::ConfigError,
};

/// Lifetime of every assertion. Fixed; not configurable.
pub const ASSERTION_LIFETIME: Duration = Duration::seconds(300);

const JTI_BYTES: usize = 16;

/// Assertion signing algorithms accepted by SMART Backend Services servers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SigningAlgorithm {
	/// RSASSA-PKCS1-v1.5 with SHA-384.
	#[default]
	#[serde(rename = "RS384")]
	Rs384,
	/// ECDSA on P-384 with SHA-384.
	#[serde(rename = "ES384")]
	Es384,
}
impl SigningAlgorithm {
	/// Returns the JOSE `alg` identifier.
	pub const fn as_str(self) -> &'static str {
		match self {
			SigningAlgorithm::Rs384 => "RS384",
			SigningAlgorithm::Es384 => "ES384",
		}
	}
}
impl Display for SigningAlgorithm {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Claim set of one client assertion. Built fresh for every token request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
	/// Issuer; always the client identifier.
	pub iss: String,
	/// Subject; always the client identifier.
	pub sub: String,
	/// Audience; the token endpoint URL.
	pub aud: String,
	/// Expiry as UNIX seconds.
	pub exp: i64,
	/// Unique assertion identifier, preventing replay.
	pub jti: String,
}
impl AssertionClaims {
	/// Builds claims for `client_id` addressed to `token_endpoint`, issued at `issued_at`.
	pub fn new(client_id: &ClientId, token_endpoint: &Url, issued_at: OffsetDateTime) -> Self {
		Self {
			iss: client_id.to_string(),
			sub: client_id.to_string(),
			aud: token_endpoint.to_string(),
			exp: (issued_at + ASSERTION_LIFETIME).unix_timestamp(),
			jti: generate_jti(),
		}
	}
}

#[derive(Serialize)]
struct JoseHeader<'a> {
	alg: &'static str,
	typ: &'static str,
	kid: &'a str,
}

/// Builds and signs client assertions, caching the imported key.
pub struct SigningEngine {
	algorithm: SigningAlgorithm,
	key_id: KeyId,
	private_key: PrivateKeyPem,
	imported: Mutex<Option<Arc<ImportedKey>>>,
}
impl SigningEngine {
	/// Creates an engine; the key is not imported until first use.
	pub fn new(algorithm: SigningAlgorithm, key_id: KeyId, private_key: PrivateKeyPem) -> Self {
		Self { algorithm, key_id, private_key, imported: Mutex::new(None) }
	}

	/// Creates an engine from the signing-related configuration fields.
	pub fn from_config(config: &JwtBearerConfig) -> Self {
		Self::new(config.algorithm, config.key_id.clone(), config.private_key.clone())
	}

	/// Configured algorithm.
	pub fn algorithm(&self) -> SigningAlgorithm {
		self.algorithm
	}

	/// Imports the private key once and returns the cached handle afterwards.
	///
	/// Format problems (PKCS#1, SEC1, wrong key type) are configuration errors and are
	/// reported on every call until the configuration is fixed; nothing is cached for them.
	pub fn import_key(&self) -> Result<Arc<ImportedKey>, ConfigError> {
		let mut slot = self.imported.lock();

		if let Some(key) = slot.as_ref() {
			return Ok(key.clone());
		}

		let key = Arc::new(ImportedKey::import(self.algorithm, &self.private_key)?);

		*slot = Some(key.clone());

		Ok(key)
	}

	/// Returns `true` once a key import has succeeded and not been cleared.
	pub fn has_imported_key(&self) -> bool {
		self.imported.lock().is_some()
	}

	/// Signs `claims` into a compact JWT.
	pub fn build_assertion(&self, claims: &AssertionClaims) -> Result<String> {
		let key = self.import_key()?;
		let header = JoseHeader { alg: self.algorithm.as_str(), typ: "JWT", kid: self.key_id.as_ref() };
		let signing_input = format!("{}.{}", encode_segment(&header)?, encode_segment(claims)?);
		let signature = key.sign(signing_input.as_bytes())?;

		Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature)))
	}

	/// Forgets the imported key.
	pub fn clear(&self) {
		*self.imported.lock() = None;
	}
}
impl Debug for SigningEngine {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SigningEngine")
			.field("algorithm", &self.algorithm)
			.field("key_id", &self.key_id)
			.field("key_imported", &self.has_imported_key())
			.finish()
	}
}

/// Returns a hex-encoded identifier carrying 128 bits from the thread-local CSPRNG.
pub fn generate_jti() -> String {
	let bytes: [u8; JTI_BYTES] = rand::random();

	bytes.iter().fold(String::with_capacity(JTI_BYTES * 2), |mut buf, byte| {
		// Writing into a `String` cannot fail.
		let _ = write!(buf, "{byte:02x}");

		buf
	})
}

fn encode_segment(value: &impl Serialize) -> Result<String> {
	let json =
		serde_json::to_vec(value).map_err(|e| Error::Signing { reason: e.to_string() })?;

	Ok(URL_SAFE_NO_PAD.encode(json))
}
