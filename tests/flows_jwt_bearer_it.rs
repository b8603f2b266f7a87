mod common;

// std
use std::time::Duration as StdDuration;
// crates.io
use futures::future;
use httpmock::prelude::*;
// self
use common::*;
use smart_backend_auth::{
	_preludet::*,
	error::TokenRequestError,
	flows::TokenManager,
	signing::SigningAlgorithm,
	transport::ReqwestTransport,
};

fn manager(server: &MockServer, buffer_secs: u32) -> TokenManager<ReqwestTransport> {
	let config = jwt_config(&server.url("/fhir"))
		.token_endpoint(Url::parse(&server.url("/token")).expect("Token URL should parse."))
		.expiration_buffer_secs(buffer_secs)
		.build()
		.expect("Config should build.");

	TokenManager::new(config, ReqwestTransport::new().expect("Reqwest transport should build."))
		.expect("Manager should build.")
}

async fn token_mock<'a>(server: &'a MockServer, body: String) -> httpmock::Mock<'a> {
	server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.header("content-type", "application/x-www-form-urlencoded");
			then.status(200).header("content-type", "application/json").body(body);
		})
		.await
}

#[tokio::test]
async fn valid_tokens_are_served_from_cache() {
	let server = MockServer::start_async().await;
	let mock = token_mock(&server, token_json("cached-token", 1800)).await;
	let manager = manager(&server, 30);

	manager.establish_session().await.expect("Session should be established.");

	for _ in 0..3 {
		assert_eq!(
			manager.access_token().await.expect("Cached token should be returned.").expose(),
			"cached-token"
		);
	}

	mock.assert_calls_async(1).await;
	assert_eq!(manager.metrics().requests(), 1);
	assert_eq!(manager.metrics().cache_hits(), 3);
}

#[tokio::test]
async fn token_inside_the_buffer_triggers_a_refresh() {
	let server = MockServer::start_async().await;
	let mock = token_mock(&server, token_json("short-lived", 29)).await;
	let manager = manager(&server, 30);

	manager.access_token().await.expect("First token should be issued.");
	manager.access_token().await.expect("Second token should be issued.");

	mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn token_outside_the_buffer_is_reused() {
	let server = MockServer::start_async().await;
	let mock = token_mock(&server, token_json("long-enough", 31)).await;
	let manager = manager(&server, 30);

	manager.access_token().await.expect("First token should be issued.");
	manager.access_token().await.expect("Cached token should be returned.");

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn concurrent_cold_callers_share_one_token_request() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200)
				.header("content-type", "application/json")
				.delay(StdDuration::from_millis(300))
				.body(token_json("shared-token", 900));
		})
		.await;
	let manager = manager(&server, 30);
	let tokens = future::join_all((0..5).map(|_| manager.access_token())).await;

	for token in tokens {
		assert_eq!(token.expect("Every caller should get the token.").expose(), "shared-token");
	}

	mock.assert_calls_async(1).await;
	assert_eq!(manager.metrics().requests(), 1);
}

#[tokio::test]
async fn concurrent_callers_share_one_failure_and_nothing_is_cached() {
	let server = MockServer::start_async().await;
	let mut mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(400)
				.header("content-type", "application/json")
				.delay(StdDuration::from_millis(200))
				.body("{\"error\":\"invalid_client\",\"error_description\":\"unknown kid\"}");
		})
		.await;
	let manager = manager(&server, 30);
	let results = future::join_all((0..5).map(|_| manager.access_token())).await;

	for result in results {
		match result.expect_err("Every caller should observe the failure.") {
			Error::TokenRequest(TokenRequestError::Rejected { status, body, oauth_error }) => {
				assert_eq!(status, 400);
				assert!(body.contains("unknown kid"));
				assert_eq!(oauth_error.as_deref(), Some("invalid_client"));
			},
			other => panic!("Unexpected error: {other:?}"),
		}
	}

	mock.assert_calls_async(1).await;
	assert!(manager.cached_token().is_none());
	assert!(!manager.is_request_in_flight());
	assert_eq!(manager.metrics().failures(), 1);

	mock.delete_async().await;
	mock = token_mock(&server, token_json("recovered", 900)).await;

	assert_eq!(
		manager.access_token().await.expect("Retry after failure should succeed.").expose(),
		"recovered"
	);

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn es384_clients_obtain_tokens() {
	let server = MockServer::start_async().await;
	let mock = token_mock(&server, token_json("ec-token", 600)).await;
	let config = jwt_config(&server.url("/fhir"))
		.private_key(ES384_PEM)
		.algorithm(SigningAlgorithm::Es384)
		.token_endpoint(Url::parse(&server.url("/token")).expect("Token URL should parse."))
		.build()
		.expect("Config should build.");
	let manager = TokenManager::<ReqwestTransport>::new(
		config,
		ReqwestTransport::new().expect("Reqwest transport should build."),
	)
	.expect("Manager should build.");

	assert_eq!(manager.access_token().await.expect("Token should be issued.").expose(), "ec-token");

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn non_positive_lifetimes_are_rejected() {
	let server = MockServer::start_async().await;
	let _mock = token_mock(&server, token_json("instantly-stale", 0)).await;
	let manager = manager(&server, 30);
	let err = manager.access_token().await.expect_err("expires_in = 0 must be rejected.");

	assert!(matches!(
		err,
		Error::TokenRequest(TokenRequestError::NonPositiveExpiresIn { expires_in: 0 })
	));
	assert!(manager.cached_token().is_none());
}

#[tokio::test]
async fn unrepresentable_lifetimes_fail_without_wedging_the_manager() {
	let server = MockServer::start_async().await;
	let mock = token_mock(&server, token_json("far-future", 999_999_999_999)).await;
	let manager = manager(&server, 30);

	for _ in 0..2 {
		let err = manager.access_token().await.expect_err("Out-of-range expires_in must be rejected.");

		assert!(matches!(
			err,
			Error::TokenRequest(TokenRequestError::ExpiresInOutOfRange {
				expires_in: 999_999_999_999
			})
		));
		assert!(!manager.is_request_in_flight());
		assert!(manager.cached_token().is_none());
	}

	mock.assert_calls_async(2).await;
	assert_eq!(manager.metrics().failures(), 2);
}

#[tokio::test]
async fn revoke_then_fetch_requests_a_new_token() {
	let server = MockServer::start_async().await;
	let mock = token_mock(&server, token_json("rotating", 900)).await;
	let manager = manager(&server, 30);

	manager.establish_session().await.expect("Session should be established.");
	manager.revoke_session().await;

	assert!(manager.cached_token().is_none());

	manager.establish_session().await.expect("Session should be re-established.");

	mock.assert_calls_async(2).await;
}
