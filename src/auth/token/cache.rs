//! Cached access token with an expiry safety buffer.

// self
use crate::{_prelude::*, auth::TokenSecret, error::TokenRequestError};

/// Access token plus the absolute instant it stops being accepted.
#[derive(Clone, PartialEq, Eq)]
pub struct CachedToken {
	/// Opaque access token; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Absolute expiry instant derived from `issued_at + expires_in`.
	pub expires_at: OffsetDateTime,
}
impl CachedToken {
	/// Creates a token that expires `expires_in` after `issued_at`.
	///
	/// Fails when the expiry instant is not representable.
	pub fn issued(
		access_token: TokenSecret,
		issued_at: OffsetDateTime,
		expires_in: Duration,
	) -> Result<Self, TokenRequestError> {
		let expires_at = issued_at.checked_add(expires_in).ok_or(
			TokenRequestError::ExpiresInOutOfRange { expires_in: expires_in.whole_seconds() },
		)?;

		Ok(Self { access_token, expires_at })
	}

	/// Returns `true` while `now + buffer` is still strictly before the expiry instant.
	///
	/// The buffer keeps a token from being sent when it would lapse mid-request.
	pub fn is_usable_at(&self, now: OffsetDateTime, buffer: Duration) -> bool {
		now + buffer < self.expires_at
	}
}
impl Debug for CachedToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CachedToken")
			.field("access_token", &"<redacted>")
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Single-slot token cache owned by one token manager.
#[derive(Debug, Default)]
pub struct TokenCache(RwLock<Option<CachedToken>>);
impl TokenCache {
	/// Returns the cached token if it is usable at `now` under `buffer`.
	pub fn usable(&self, now: OffsetDateTime, buffer: Duration) -> Option<TokenSecret> {
		self.0
			.read()
			.as_ref()
			.filter(|token| token.is_usable_at(now, buffer))
			.map(|token| token.access_token.clone())
	}

	/// Returns a copy of the cached entry regardless of expiry.
	pub fn snapshot(&self) -> Option<CachedToken> {
		self.0.read().clone()
	}

	/// Replaces the cached entry wholesale.
	pub fn store(&self, token: CachedToken) {
		*self.0.write() = Some(token);
	}

	/// Drops the cached entry only if it still holds `rejected`.
	///
	/// Returns `true` when an entry was evicted.
	pub fn evict_if(&self, rejected: &TokenSecret) -> bool {
		let mut guard = self.0.write();

		if guard.as_ref().is_some_and(|token| &token.access_token == rejected) {
			*guard = None;

			true
		} else {
			false
		}
	}

	/// Drops the cached entry.
	pub fn clear(&self) {
		*self.0.write() = None;
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	const BUFFER: Duration = Duration::seconds(30);

	fn token_expiring_in(now: OffsetDateTime, secs: i64) -> CachedToken {
		CachedToken::issued(TokenSecret::new("cached"), now, Duration::seconds(secs))
			.expect("Fixture lifetime should be representable.")
	}

	#[test]
	fn buffer_boundary_is_strict() {
		let now = macros::datetime!(2025-06-01 12:00 UTC);

		assert!(!token_expiring_in(now, 29).is_usable_at(now, BUFFER));
		assert!(!token_expiring_in(now, 30).is_usable_at(now, BUFFER));
		assert!(token_expiring_in(now, 31).is_usable_at(now, BUFFER));
	}

	#[test]
	fn cache_returns_only_usable_tokens() {
		let now = macros::datetime!(2025-06-01 12:00 UTC);
		let cache = TokenCache::default();

		assert!(cache.usable(now, BUFFER).is_none());

		cache.store(token_expiring_in(now, 3600));

		assert_eq!(cache.usable(now, BUFFER), Some(TokenSecret::new("cached")));
		assert!(cache.usable(now + Duration::seconds(3571), BUFFER).is_none());
		assert!(cache.snapshot().is_some(), "Expired entries stay until replaced or cleared.");

		cache.clear();

		assert!(cache.snapshot().is_none());
	}

	#[test]
	fn evict_if_only_drops_the_rejected_token() {
		let now = OffsetDateTime::now_utc();
		let cache = TokenCache::default();

		cache.store(token_expiring_in(now, 600));

		assert!(!cache.evict_if(&TokenSecret::new("other")));
		assert!(cache.snapshot().is_some());
		assert!(cache.evict_if(&TokenSecret::new("cached")));
		assert!(cache.snapshot().is_none());
	}

	#[test]
	fn unrepresentable_expiry_is_an_error() {
		let err = CachedToken::issued(
			TokenSecret::new("huge"),
			macros::datetime!(2025-06-01 12:00 UTC),
			Duration::seconds(999_999_999_999),
		)
		.expect_err("Expiry past the supported date range must be rejected.");

		assert!(matches!(err, TokenRequestError::ExpiresInOutOfRange { expires_in: 999_999_999_999 }));
	}

	#[test]
	fn debug_redacts_the_access_token() {
		let token = token_expiring_in(macros::datetime!(2025-06-01 12:00 UTC), 60);

		assert!(!format!("{token:?}").contains("cached"));
	}
}
