//! Request bodies that survive one resend.
//!
//! Buffered bodies are cloned. Streams are teed: both readers share the source and a log
//! of every chunk pulled so far, so whichever reader runs second replays the log before
//! continuing from the source. The log lives as long as either reader does.

// std
use std::{
	io,
	task::{Context, Poll},
};
// crates.io
use futures::{Stream, StreamExt};
// self
use crate::{_prelude::*, transport::{Body, BodyStream}};

/// Splits `body` into the body for the first attempt and an identical copy for the retry.
pub fn split_for_retry(body: Body) -> (Body, Body) {
	match body {
		Body::Empty => (Body::Empty, Body::Empty),
		Body::Bytes(bytes) => (Body::Bytes(bytes.clone()), Body::Bytes(bytes)),
		Body::Stream(source) => {
			let state = Arc::new(Mutex::new(TeeState {
				source: Some(source),
				chunks: Vec::new(),
				failure: None,
			}));

			(
				Body::Stream(Box::pin(TeeReader { state: state.clone(), position: 0 })),
				Body::Stream(Box::pin(TeeReader { state, position: 0 })),
			)
		},
	}
}

struct TeeState {
	/// `None` once the source is exhausted or failed.
	source: Option<BodyStream>,
	chunks: Vec<Bytes>,
	failure: Option<(io::ErrorKind, String)>,
}

struct TeeReader {
	state: Arc<Mutex<TeeState>>,
	position: usize,
}
impl Stream for TeeReader {
	type Item = io::Result<Bytes>;

	fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		let shared = Arc::clone(&self.state);
		let mut state = shared.lock();

		if let Some(chunk) = state.chunks.get(self.position).cloned() {
			self.position += 1;

			return Poll::Ready(Some(Ok(chunk)));
		}

		let Some(source) = state.source.as_mut() else {
			return match state.failure.as_ref() {
				Some((kind, message)) if self.position == state.chunks.len() => {
					// Report the failure once per reader.
					self.position += 1;

					Poll::Ready(Some(Err(io::Error::new(*kind, message.clone()))))
				},
				_ => Poll::Ready(None),
			};
		};

		match source.poll_next_unpin(cx) {
			Poll::Pending => Poll::Pending,
			Poll::Ready(Some(Ok(chunk))) => {
				state.chunks.push(chunk.clone());
				self.position = state.chunks.len();

				Poll::Ready(Some(Ok(chunk)))
			},
			Poll::Ready(Some(Err(e))) => {
				state.source = None;
				state.failure = Some((e.kind(), e.to_string()));
				self.position = state.chunks.len() + 1;

				Poll::Ready(Some(Err(e)))
			},
			Poll::Ready(None) => {
				state.source = None;

				Poll::Ready(None)
			},
		}
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use futures::stream;
	// self
	use super::*;

	fn chunked(parts: &[&'static str]) -> Body {
		Body::wrap_stream(stream::iter(
			parts.iter().map(|part| Ok(Bytes::from_static(part.as_bytes()))).collect::<Vec<_>>(),
		))
	}

	#[tokio::test]
	async fn replay_after_full_read_is_byte_identical() {
		let (first, second) = split_for_retry(chunked(&["{\"a\":", "1,", "\"b\":2}"]));

		assert_eq!(first.into_bytes().await.expect("First read should succeed."), "{\"a\":1,\"b\":2}");
		assert_eq!(second.into_bytes().await.expect("Replay should succeed."), "{\"a\":1,\"b\":2}");
	}

	#[tokio::test]
	async fn replay_continues_from_source_after_partial_read() {
		let (first, second) = split_for_retry(chunked(&["one", "two", "three"]));
		let Body::Stream(mut first) = first else { panic!("Tee should yield streams.") };

		assert_eq!(
			first.next().await.expect("First chunk should exist.").expect("Chunk should be ok."),
			"one"
		);

		drop(first);

		assert_eq!(second.into_bytes().await.expect("Replay should succeed."), "onetwothree");
	}

	#[tokio::test]
	async fn source_failures_reach_both_readers() {
		let source = Body::wrap_stream(stream::iter(vec![
			Ok(Bytes::from_static(b"head")),
			Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated")),
		]));
		let (first, second) = split_for_retry(source);

		assert_eq!(
			first.into_bytes().await.expect_err("First reader should fail.").kind(),
			io::ErrorKind::UnexpectedEof
		);
		assert_eq!(
			second.into_bytes().await.expect_err("Replay should fail the same way.").kind(),
			io::ErrorKind::UnexpectedEof
		);
	}

	#[tokio::test]
	async fn buffered_bodies_are_cloned() {
		let (first, second) = split_for_retry(Body::from("payload"));

		assert!(!first.is_stream());
		assert_eq!(second.into_bytes().await.expect("Clone should read."), "payload");
	}
}
