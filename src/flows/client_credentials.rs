//! Wire format of the `client_credentials` token request with a JWT-bearer assertion.

// crates.io
use http::{
	Method,
	header::{ACCEPT, CONTENT_TYPE},
};
use url::form_urlencoded::Serializer;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::{ConfigError, TokenRequestError},
	transport::Body,
};

/// Fixed `client_assertion_type` for signed JWT client authentication.
pub const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

const GRANT_TYPE: &str = "client_credentials";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Successful token endpoint response.
#[derive(Clone, Debug, Deserialize)]
pub struct TokenResponse {
	/// Issued access token.
	pub access_token: TokenSecret,
	/// Lifetime in seconds, counted from receipt.
	pub expires_in: i64,
	/// Token type, normally `bearer`.
	#[serde(default)]
	pub token_type: Option<String>,
	/// Granted scope when it differs from the request.
	#[serde(default)]
	pub scope: Option<String>,
}
impl TokenResponse {
	/// Lifetime as a [`Duration`].
	pub fn lifetime(&self) -> Duration {
		Duration::seconds(self.expires_in)
	}
}

/// Builds the form-encoded token request.
pub fn token_request(
	endpoint: &Url,
	assertion: &str,
	scope: &str,
) -> Result<http::Request<Body>, ConfigError> {
	let form = Serializer::new(String::new())
		.append_pair("grant_type", GRANT_TYPE)
		.append_pair("client_assertion_type", CLIENT_ASSERTION_TYPE)
		.append_pair("client_assertion", assertion)
		.append_pair("scope", scope)
		.finish();

	Ok(http::Request::builder()
		.method(Method::POST)
		.uri(endpoint.as_str())
		.header(CONTENT_TYPE, FORM_CONTENT_TYPE)
		.header(ACCEPT, "application/json")
		.body(Body::from(form))?)
}

/// Interprets a token endpoint response.
pub fn parse_token_response(
	response: &http::Response<Bytes>,
) -> Result<TokenResponse, TokenRequestError> {
	let status = response.status();

	if !status.is_success() {
		return Err(TokenRequestError::Rejected {
			status: status.as_u16(),
			body: String::from_utf8_lossy(response.body()).into_owned(),
			oauth_error: oauth_error_code(response.body()),
		});
	}

	let de = &mut serde_json::Deserializer::from_slice(response.body());
	let token: TokenResponse = serde_path_to_error::deserialize(de)
		.map_err(|e| TokenRequestError::Malformed { source: Arc::new(e) })?;

	if token.expires_in <= 0 {
		return Err(TokenRequestError::NonPositiveExpiresIn { expires_in: token.expires_in });
	}

	token.access_token.bearer_header()?;

	Ok(token)
}

fn oauth_error_code(body: &[u8]) -> Option<String> {
	#[derive(Deserialize)]
	struct OAuthErrorBody {
		error: String,
	}

	serde_json::from_slice::<OAuthErrorBody>(body).ok().map(|body| body.error)
}
