//! Imported signing keys.

// crates.io
use p384::ecdsa::{Signature as EcdsaSignature, SigningKey as EcdsaSigningKey};
use rsa::{
	RsaPrivateKey,
	pkcs1v15::{Signature as RsaSignature, SigningKey as RsaSigningKey},
};
use sha2::Sha384;
// self
use crate::{_prelude::*, auth::PrivateKeyPem, error::ConfigError, signing::SigningAlgorithm};

/// Private key imported for one algorithm, ready to sign.
pub enum ImportedKey {
	/// RSASSA-PKCS1-v1.5 / SHA-384 signer.
	Rs384(Box<RsaSigningKey<Sha384>>),
	/// ECDSA P-384 / SHA-384 signer.
	Es384(Box<EcdsaSigningKey>),
}
impl ImportedKey {
	/// Imports a PKCS#8 PEM document for `algorithm`.
	pub fn import(algorithm: SigningAlgorithm, pem: &PrivateKeyPem) -> Result<Self, ConfigError> {
		let pem = pem.require_pkcs8()?;
		let invalid = |reason: String| ConfigError::InvalidPrivateKey {
			algorithm: algorithm.as_str(),
			reason,
		};

		match algorithm {
			SigningAlgorithm::Rs384 => {
				let key = <RsaPrivateKey as rsa::pkcs8::DecodePrivateKey>::from_pkcs8_pem(pem)
					.map_err(|e| invalid(e.to_string()))?;

				Ok(Self::Rs384(Box::new(RsaSigningKey::<Sha384>::new(key))))
			},
			SigningAlgorithm::Es384 => {
				let key = <EcdsaSigningKey as p384::pkcs8::DecodePrivateKey>::from_pkcs8_pem(pem)
					.map_err(|e| invalid(e.to_string()))?;

				Ok(Self::Es384(Box::new(key)))
			},
		}
	}

	/// Algorithm this key signs for.
	pub fn algorithm(&self) -> SigningAlgorithm {
		match self {
			Self::Rs384(_) => SigningAlgorithm::Rs384,
			Self::Es384(_) => SigningAlgorithm::Es384,
		}
	}

	/// Signs `message`, returning the raw JWS signature bytes.
	///
	/// ES384 signatures are the fixed-width `r || s` form (96 bytes), not DER.
	pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
		match self {
			Self::Rs384(key) => {
				let signature: RsaSignature = rsa::signature::Signer::try_sign(&**key, message)
					.map_err(|e| Error::Signing { reason: e.to_string() })?;

				Ok(rsa::signature::SignatureEncoding::to_vec(&signature))
			},
			Self::Es384(key) => {
				let signature: EcdsaSignature =
					p384::ecdsa::signature::Signer::try_sign(&**key, message)
						.map_err(|e| Error::Signing { reason: e.to_string() })?;

				Ok(signature.to_bytes().to_vec())
			},
		}
	}
}
impl Debug for ImportedKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("ImportedKey").field(&self.algorithm()).finish()
	}
}
