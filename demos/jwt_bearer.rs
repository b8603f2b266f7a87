//! Demonstrates SMART Backend Services authentication end to end against a mock EHR:
//! discovery, a signed RS384 client assertion, the token request, and an authenticated
//! FHIR read through the generic REST client.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use url::Url;
// self
use smart_backend_auth::{
	client::RestClient,
	config::JwtBearerConfig,
	provider::{AuthProvider, ReqwestJwtBearerProvider},
};

const PRIVATE_KEY: &str = include_str!("../tests/fixtures/rs384_pkcs8.pem");

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let discovery_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/fhir/.well-known/smart-configuration");
			then.status(200).header("content-type", "application/json").body(format!(
				"{{\"token_endpoint\":\"{}\",\"token_endpoint_auth_signing_alg_values_supported\":[\"RS384\"]}}",
				server.url("/oauth/token")
			));
		})
		.await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"token_type\":\"bearer\",\"expires_in\":300}",
			);
		})
		.await;
	let patient_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/fhir/Patient/example").header("authorization", "Bearer demo-access");
			then.status(200)
				.header("content-type", "application/fhir+json")
				.body("{\"resourceType\":\"Patient\",\"id\":\"example\"}");
		})
		.await;
	let config = JwtBearerConfig::builder(Url::parse(&server.url("/fhir"))?)
		.client_id("demo-backend-service")
		.key_id("demo-key-1")
		.private_key(PRIVATE_KEY)
		.scope("system/Patient.rs")
		.build()?;
	let provider = ReqwestJwtBearerProvider::new(config)?;

	provider.establish_session().await?;

	let metrics = provider.tokens().metrics();

	println!("Token requests after warm-up: {}.", metrics.requests());

	let client = RestClient::from_provider(provider);
	let response = client.get("Patient/example").await?;

	println!("GET Patient/example -> {}: {}", response.status(), String::from_utf8_lossy(response.body()));

	client.revoke_session().await?;

	discovery_mock.assert_async().await;
	token_mock.assert_async().await;
	patient_mock.assert_async().await;

	Ok(())
}
