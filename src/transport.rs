//! HTTP transport seam shared by discovery, token requests, and authenticated fetches.
//!
//! [`HttpTransport`] is the crate's only dependency on an HTTP stack. It takes a fully
//! formed [`http::Request`] carrying a [`Body`] and resolves to an [`http::Response`] whose
//! body has been read into memory. Implementations must be `Send + Sync + 'static` so one
//! transport can be shared by every component of a provider.

// std
use std::io;
// crates.io
use futures::{Stream, TryStreamExt};
// self
use crate::{_prelude::*, error::TransportError};
#[cfg(feature = "reqwest")] use crate::error::ConfigError;

/// One-shot byte stream accepted as a request body.
pub type BodyStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Boxed future returned by [`HttpTransport::send`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<http::Response<Bytes>, TransportError>> + 'a + Send>>;

/// Outbound request body.
#[derive(Default)]
pub enum Body {
	/// No body.
	#[default]
	Empty,
	/// Fully buffered body; cheap to clone.
	Bytes(Bytes),
	/// One-shot stream; can only be read once.
	Stream(BodyStream),
}
impl Body {
	/// Wraps a one-shot stream.
	pub fn wrap_stream<S>(stream: S) -> Self
	where
		S: 'static + Send + Stream<Item = io::Result<Bytes>>,
	{
		Self::Stream(Box::pin(stream))
	}

	/// Returns `true` for one-shot stream bodies.
	pub fn is_stream(&self) -> bool {
		matches!(self, Self::Stream(_))
	}

	/// Drains the body into memory.
	pub async fn into_bytes(self) -> io::Result<Bytes> {
		match self {
			Self::Empty => Ok(Bytes::new()),
			Self::Bytes(bytes) => Ok(bytes),
			Self::Stream(stream) => {
				let chunks: Vec<Bytes> = stream.try_collect().await?;

				Ok(Bytes::from(chunks.concat()))
			},
		}
	}
}
impl Debug for Body {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Empty => f.write_str("Body::Empty"),
			Self::Bytes(bytes) => write!(f, "Body::Bytes({} bytes)", bytes.len()),
			Self::Stream(_) => f.write_str("Body::Stream(..)"),
		}
	}
}
impl From<Bytes> for Body {
	fn from(value: Bytes) -> Self {
		Self::Bytes(value)
	}
}
impl From<Vec<u8>> for Body {
	fn from(value: Vec<u8>) -> Self {
		Self::Bytes(value.into())
	}
}
impl From<String> for Body {
	fn from(value: String) -> Self {
		Self::Bytes(value.into())
	}
}
impl From<&'static str> for Body {
	fn from(value: &'static str) -> Self {
		Self::Bytes(Bytes::from_static(value.as_bytes()))
	}
}

/// Abstraction over HTTP stacks able to execute a single request.
///
/// Implementations must not retry, authenticate, or rewrite requests; those policies live
/// in the providers. Every non-network outcome (including 4xx/5xx) is an `Ok` response.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and reads the whole response body.
	fn send(&self, request: http::Request<Body>) -> TransportFuture<'_>;
}

/// [`HttpTransport`] backed by a shared [`ReqwestClient`].
///
/// Token endpoints should answer directly instead of redirecting, so [`ReqwestTransport::new`]
/// disables redirect following. Configure any custom client passed to
/// [`ReqwestTransport::with_client`] the same way.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Builds a client that never follows redirects.
	pub fn new() -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().redirect(reqwest::redirect::Policy::none()).build()?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn send(&self, request: http::Request<Body>) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let target = request.uri().to_string();
			let url = Url::parse(&target)
				.map_err(|_| TransportError::InvalidUri { uri: target.clone() })?;
			let (parts, body) = request.into_parts();
			let builder = client.request(parts.method, url).headers(parts.headers);
			let builder = match body {
				Body::Empty => builder,
				Body::Bytes(bytes) => builder.body(bytes),
				Body::Stream(stream) => builder.body(reqwest::Body::wrap_stream(stream)),
			};
			let response =
				builder.send().await.map_err(|e| TransportError::network(&target, e))?;
			let status = response.status();
			let version = response.version();
			let headers = response.headers().to_owned();
			let bytes = response.bytes().await.map_err(|e| TransportError::network(&target, e))?;
			let mut response_new = http::Response::new(bytes);

			*response_new.status_mut() = status;
			*response_new.version_mut() = version;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}
