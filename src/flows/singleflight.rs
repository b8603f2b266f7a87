//! In-flight deduplication shared by token requests and discovery.
//!
//! A [`Singleflight`] holds at most one pending operation. The first caller that misses
//! starts it; every caller arriving before it settles receives a clone of the same
//! [`Shared`] future and therefore the same outcome. The operation clears its own slot once
//! it settles, whether it succeeded or failed.
//!
//! The slot only holds a [`WeakShared`]. An operation lives exactly as long as some caller
//! holds its flight; once every caller has dropped it the operation is dropped with it and the
//! next caller starts fresh.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
// self
use crate::_prelude::*;

/// Clonable handle to one in-flight operation.
pub type Flight<T> = Shared<BoxFuture<'static, Result<T>>>;

/// Result of [`Singleflight::join_or_start`].
pub enum Joined<T>
where
	T: 'static + Clone + Send + Sync,
{
	/// The caller's cache check succeeded; nothing was started.
	Ready(T),
	/// The caller should await this flight.
	Pending(Flight<T>),
}

/// Slot holding at most one pending operation.
pub struct Singleflight<T>
where
	T: 'static + Clone + Send + Sync,
{
	slot: Arc<Mutex<Option<(u64, WeakShared<BoxFuture<'static, Result<T>>>)>>>,
	next_id: AtomicU64,
}
impl<T> Singleflight<T>
where
	T: 'static + Clone + Send + Sync,
{
	/// Returns the cached value, joins the pending flight, or starts a new one.
	///
	/// `cached` runs under the slot lock, so a flight that stores its value and then clears
	/// the slot can never be missed by a concurrent caller. `start` runs at most once and only
	/// when nothing is pending.
	pub fn join_or_start<C, S>(&self, cached: C, start: S) -> Joined<T>
	where
		C: FnOnce() -> Option<T>,
		S: FnOnce() -> BoxFuture<'static, Result<T>>,
	{
		let mut slot = self.slot.lock();

		if let Some(flight) = slot.as_ref().and_then(|(_, weak)| weak.upgrade()) {
			return Joined::Pending(flight);
		}
		if let Some(value) = cached() {
			return Joined::Ready(value);
		}

		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let operation = start();
		let owner = Arc::clone(&self.slot);
		let flight = async move {
			let result = operation.await;
			let mut slot = owner.lock();

			if slot.as_ref().is_some_and(|(current, _)| *current == id) {
				*slot = None;
			}

			result
		}
		.boxed()
		.shared();

		// A fresh flight has not completed, so it can always be downgraded.
		*slot = flight.downgrade().map(|weak| (id, weak));

		Joined::Pending(flight)
	}

	/// Returns the pending flight, if any caller still holds it.
	pub fn current(&self) -> Option<Flight<T>> {
		self.slot.lock().as_ref().and_then(|(_, weak)| weak.upgrade())
	}

	/// Returns `true` while an operation is pending and held by a caller.
	pub fn is_pending(&self) -> bool {
		self.current().is_some()
	}
}
impl<T> Default for Singleflight<T>
where
	T: 'static + Clone + Send + Sync,
{
	fn default() -> Self {
		Self { slot: Default::default(), next_id: AtomicU64::new(0) }
	}
}
impl<T> Debug for Singleflight<T>
where
	T: 'static + Clone + Send + Sync,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Singleflight").field("pending", &self.is_pending()).finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::AtomicUsize;
	// crates.io
	use tokio::sync::oneshot;
	// self
	use super::*;
	use crate::error::TokenRequestError;

	fn pending<T>(joined: Joined<T>) -> Flight<T>
	where
		T: 'static + Clone + Send + Sync,
	{
		match joined {
			Joined::Pending(flight) => flight,
			Joined::Ready(_) => panic!("Expected a pending flight."),
		}
	}

	#[tokio::test]
	async fn concurrent_callers_share_one_operation() {
		let flights = Singleflight::<String>::default();
		let starts = Arc::new(AtomicUsize::new(0));
		let (tx, rx) = oneshot::channel::<()>();
		let mut rx = Some(rx);
		let mut joined = Vec::new();

		for _ in 0..5 {
			let starts = starts.clone();
			let rx = rx.take();

			joined.push(pending(flights.join_or_start(
				|| None,
				move || {
					starts.fetch_add(1, Ordering::SeqCst);

					async move {
						if let Some(rx) = rx {
							let _ = rx.await;
						}

						Ok("token".to_owned())
					}
					.boxed()
				},
			)));
		}

		assert!(flights.is_pending());

		tx.send(()).expect("Receiver should still be waiting.");

		for flight in joined {
			assert_eq!(flight.await.expect("Flight should succeed."), "token");
		}

		assert_eq!(starts.load(Ordering::SeqCst), 1);
		assert!(!flights.is_pending(), "Settled flights clear their slot.");
	}

	#[tokio::test]
	async fn failures_are_shared_and_cleared() {
		let flights = Singleflight::<String>::default();
		let first = pending(flights.join_or_start(
			|| None,
			|| async { Err(TokenRequestError::UnusableAccessToken.into()) }.boxed(),
		));
		let second = pending(flights.join_or_start(|| None, || panic!("Must join the pending flight.")));

		assert!(first.await.is_err());
		assert!(second.await.is_err());
		assert!(!flights.is_pending());

		let retried = pending(
			flights.join_or_start(|| None, || async { Ok("after-failure".to_owned()) }.boxed()),
		);

		assert_eq!(retried.await.expect("Retry should start a new flight."), "after-failure");
	}

	#[tokio::test]
	async fn abandoned_flights_are_dropped_and_restarted() {
		let flights = Singleflight::<String>::default();
		let (_tx, rx) = oneshot::channel::<()>();
		let abandoned = pending(flights.join_or_start(
			|| None,
			move || {
				async move {
					let _ = rx.await;

					Ok("stale".to_owned())
				}
				.boxed()
			},
		));

		assert!(flights.is_pending());

		drop(abandoned);

		assert!(!flights.is_pending(), "Dropping every caller drops the operation.");

		let restarted =
			pending(flights.join_or_start(|| None, || async { Ok("fresh".to_owned()) }.boxed()));

		assert_eq!(restarted.await.expect("A new flight should start."), "fresh");
	}

	#[test]
	fn cached_values_skip_the_operation() {
		let flights = Singleflight::<u8>::default();

		assert!(matches!(
			flights.join_or_start(|| Some(7), || panic!("Cached values must not start work.")),
			Joined::Ready(7)
		));
		assert!(flights.current().is_none());
	}
}
