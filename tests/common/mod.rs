//! Shared fixtures for integration tests.

#![allow(dead_code)]

// crates.io
use http::{HeaderMap, Method};
use tokio::sync::{Notify, oneshot};
// self
use smart_backend_auth::{
	_preludet::*,
	config::{JwtBearerConfig, JwtBearerConfigBuilder},
	error::TransportError,
	transport::{Body, HttpTransport, TransportFuture},
};

pub const RS384_PEM: &str = include_str!("../fixtures/rs384_pkcs8.pem");
pub const ES384_PEM: &str = include_str!("../fixtures/es384_pkcs8.pem");
pub const RSA_PKCS1_PEM: &str = include_str!("../fixtures/rsa_pkcs1.pem");

pub const CLIENT_ID: &str = "svc-bulk-export";
pub const KEY_ID: &str = "kid-2025-06";
pub const SCOPE: &str = "system/Patient.rs system/Observation.rs";
pub const TOKEN_PATH: &str = "/auth/token";

/// Builder seeded with the shared client identity and an RS384 key.
pub fn jwt_config(base_url: &str) -> JwtBearerConfigBuilder {
	JwtBearerConfig::builder(Url::parse(base_url).expect("Base URL fixture should parse."))
		.client_id(CLIENT_ID)
		.key_id(KEY_ID)
		.private_key(RS384_PEM)
		.scope(SCOPE)
}

/// Builds an in-memory response.
pub fn response(status: u16, body: impl Into<Bytes>) -> http::Response<Bytes> {
	http::Response::builder()
		.status(status)
		.header("content-type", "application/json")
		.body(body.into())
		.expect("Response fixture should build.")
}

/// Token endpoint success body.
pub fn token_json(access_token: &str, expires_in: i64) -> String {
	format!(
		"{{\"access_token\":\"{access_token}\",\"token_type\":\"bearer\",\"expires_in\":{expires_in}}}"
	)
}

/// Request as observed by [`ScriptedTransport`], with the body fully drained.
#[derive(Clone, Debug)]
pub struct RecordedRequest {
	pub method: Method,
	pub uri: String,
	pub headers: HeaderMap,
	pub body: Bytes,
}
impl RecordedRequest {
	pub fn path(&self) -> String {
		Url::parse(&self.uri).expect("Recorded URI should be absolute.").path().to_owned()
	}

	pub fn authorization(&self) -> Option<&str> {
		self.headers.get("authorization").and_then(|value| value.to_str().ok())
	}

	pub fn form_value(&self, key: &str) -> Option<String> {
		url::form_urlencoded::parse(&self.body)
			.find(|(name, _)| name == key)
			.map(|(_, value)| value.into_owned())
	}
}

type Responder = Box<dyn Fn(&RecordedRequest, usize) -> http::Response<Bytes> + Send + Sync>;

/// In-process transport that drains every body, records the request, and answers from a
/// closure. Token requests can be held until the test releases them.
pub struct ScriptedTransport {
	responder: Responder,
	requests: Mutex<Vec<RecordedRequest>>,
	token_gate: Mutex<Option<oneshot::Receiver<()>>>,
	pub token_requested: Notify,
}
impl ScriptedTransport {
	/// `responder` receives the request and its zero-based index among requests to the same
	/// path.
	pub fn new<F>(responder: F) -> Self
	where
		F: 'static + Send + Sync + Fn(&RecordedRequest, usize) -> http::Response<Bytes>,
	{
		Self {
			responder: Box::new(responder),
			requests: Mutex::new(Vec::new()),
			token_gate: Mutex::new(None),
			token_requested: Notify::new(),
		}
	}

	/// Answers token requests with `token-1`, `token-2`, ... and everything else through
	/// `resource`.
	pub fn with_token_endpoint<F>(resource: F) -> Self
	where
		F: 'static + Send + Sync + Fn(&RecordedRequest, usize) -> http::Response<Bytes>,
	{
		Self::new(move |request, index| {
			if request.path().ends_with(TOKEN_PATH) {
				response(200, token_json(&format!("token-{}", index + 1), 3600))
			} else {
				resource(request, index)
			}
		})
	}

	/// Holds the next token request until the returned sender fires or drops.
	pub fn hold_next_token_request(&self) -> oneshot::Sender<()> {
		let (tx, rx) = oneshot::channel();

		*self.token_gate.lock() = Some(rx);

		tx
	}

	pub fn requests(&self) -> Vec<RecordedRequest> {
		self.requests.lock().clone()
	}

	pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
		self.requests().into_iter().filter(|request| request.path().ends_with(path)).collect()
	}
}
impl HttpTransport for ScriptedTransport {
	fn send(&self, request: http::Request<Body>) -> TransportFuture<'_> {
		Box::pin(async move {
			let (parts, body) = request.into_parts();
			let body = body.into_bytes().await.map_err(TransportError::from)?;
			let recorded = RecordedRequest {
				method: parts.method,
				uri: parts.uri.to_string(),
				headers: parts.headers,
				body,
			};
			let path = recorded.path();

			if path.ends_with(TOKEN_PATH) {
				self.token_requested.notify_one();

				let gate = self.token_gate.lock().take();

				if let Some(gate) = gate {
					let _ = gate.await;
				}
			}

			let index = {
				let mut requests = self.requests.lock();
				let index = requests.iter().filter(|seen| seen.path() == path).count();

				requests.push(recorded.clone());

				index
			};

			Ok((self.responder)(&recorded, index))
		})
	}
}
