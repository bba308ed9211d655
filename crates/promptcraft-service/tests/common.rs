//! Common test utilities for promptcraft integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::Router;
use axum_test::{TestResponse, TestServer};
use jsonwebtoken::{encode, EncodingKey, Header};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate, Times};

use promptcraft_core::{PricingCatalog, UserId};
use promptcraft_service::auth::{JwtClaims, TOKEN_AUDIENCE};
use promptcraft_service::crypto::hmac_sha256_hex;
use promptcraft_service::{create_router, AppState, ServiceConfig};
use promptcraft_store::{MemoryStore, Store};

pub const JWT_SECRET: &str = "test-jwt-secret-with-enough-length";
pub const WEBHOOK_SECRET: &str = "whsec_test";
pub const GENERATION_COST: i64 = 10;
pub const PACK_PRICE: &str = "price_pack_small";
pub const PACK_CREDITS: i64 = 100;
pub const PLAN_PRICE: &str = "price_plan_monthly";
pub const PLAN_CREDITS: i64 = 500;
pub const BUCKET: &str = "generated_images";

/// Test harness containing everything needed for integration tests.
///
/// A single mock server stands in for Stripe, the image API, object storage
/// and the auth API; their paths do not overlap.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Upstream mock server.
    pub mock: MockServer,
    /// The in-memory store behind the service.
    pub store: Arc<MemoryStore>,
    /// A test user ID for authenticated requests.
    pub test_user_id: UserId,
}

impl TestHarness {
    /// Create a harness with every upstream pointed at the mock server.
    pub async fn new() -> Self {
        Self::with_options(|_| {}, |store| store as Arc<dyn Store>).await
    }

    /// Create a harness with a modified config.
    pub async fn with_config(configure: impl FnOnce(&mut ServiceConfig)) -> Self {
        Self::with_options(configure, |store| store as Arc<dyn Store>).await
    }

    /// Create a harness, adjusting the config and wrapping the store.
    pub async fn with_options(
        configure: impl FnOnce(&mut ServiceConfig),
        wrap_store: impl FnOnce(Arc<MemoryStore>) -> Arc<dyn Store>,
    ) -> Self {
        let mock = MockServer::start().await;
        let store = Arc::new(MemoryStore::new());

        let mut config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            base_url: "http://localhost:3000".into(),
            supabase_url: Some(mock.uri()),
            supabase_anon_key: Some("anon-key".into()),
            supabase_service_role_key: Some("service-role-key".into()),
            supabase_jwt_secret: Some(JWT_SECRET.into()),
            storage_bucket: BUCKET.into(),
            session_cookie_secure: false,
            stripe_api_key: Some("sk_test_123".into()),
            stripe_webhook_secret: Some(WEBHOOK_SECRET.into()),
            stripe_api_base: format!("{}/v1", mock.uri()),
            openai_api_key: Some("sk-openai-test".into()),
            openai_base_url: mock.uri(),
            generation_cost: GENERATION_COST,
            pricing: PricingCatalog::from_price_maps(
                &format!("{PACK_PRICE}={PACK_CREDITS}"),
                &format!("{PLAN_PRICE}={PLAN_CREDITS}"),
            )
            .expect("valid test pricing"),
            ..ServiceConfig::default()
        };
        configure(&mut config);

        let state = AppState::new(wrap_store(store.clone()), config);
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            mock,
            store,
            test_user_id: UserId::generate(),
        }
    }

    /// Mint an access token for a user.
    pub fn token_for(user_id: &UserId) -> String {
        let claims = JwtClaims {
            sub: user_id.to_string(),
            email: Some("user@example.com".into()),
            aud: Some(serde_json::json!(TOKEN_AUDIENCE)),
            exp: chrono::Utc::now().timestamp() + 3600,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
        )
        .expect("Failed to sign token")
    }

    /// Authorization header for the test user.
    pub fn user_auth_header(&self) -> HeaderValue {
        Self::auth_header_for(&self.test_user_id)
    }

    /// Authorization header for another user.
    pub fn auth_header_for(user_id: &UserId) -> HeaderValue {
        HeaderValue::from_str(&format!("Bearer {}", Self::token_for(user_id)))
            .expect("valid header value")
    }

    /// Give the test user a balance.
    pub async fn seed_credits(&self, credits: i64) {
        self.store
            .ensure_profile(&self.test_user_id)
            .await
            .expect("ensure profile");
        self.store
            .set_credits(&self.test_user_id, credits)
            .expect("set credits");
    }

    /// Current balance of the test user.
    pub async fn balance(&self) -> i64 {
        self.store
            .get_profile(&self.test_user_id)
            .await
            .expect("get profile")
            .map_or(0, |p| p.credits)
    }

    /// Build a `Stripe-Signature` header for a payload signed now.
    pub fn sign_webhook(payload: &str) -> String {
        let timestamp = chrono::Utc::now().timestamp();
        let signature = hmac_sha256_hex(WEBHOOK_SECRET, &format!("{timestamp}.{payload}"))
            .expect("hmac accepts any key length");
        format!("t={timestamp},v1={signature}")
    }

    /// Deliver a correctly signed webhook event.
    pub async fn post_webhook(&self, event: &serde_json::Value) -> TestResponse {
        let payload = event.to_string();
        let signature = Self::sign_webhook(&payload);
        self.server
            .post("/api/webhooks/stripe")
            .add_header(
                axum::http::HeaderName::from_static("stripe-signature"),
                HeaderValue::from_str(&signature).expect("valid header value"),
            )
            .text(payload)
            .await
    }

    /// Mount a successful image API, download, upload and signing chain.
    pub async fn mount_generation_success(&self) {
        self.mount_image_api(1_u64..).await;
        self.mount_storage_upload(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "Key": format!("{BUCKET}/object")
        })))
        .await;
        Mock::given(method("POST"))
            .and(path_regex(format!("^/storage/v1/object/sign/{BUCKET}/.+")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "signedURL": "/object/sign/generated_images/img.png?token=abc"
            })))
            .mount(&self.mock)
            .await;
    }

    /// Mount the image API and the temporary image URL it returns.
    pub async fn mount_image_api(&self, expected_calls: impl Into<Times>) {
        Mock::given(method("POST"))
            .and(path("/v1/images/generations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "created": 1,
                "data": [{"url": format!("{}/tmp/generated.png", self.mock.uri())}]
            })))
            .expect(expected_calls)
            .mount(&self.mock)
            .await;
        Mock::given(method("GET"))
            .and(path("/tmp/generated.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(vec![0x89, b'P', b'N', b'G']),
            )
            .mount(&self.mock)
            .await;
    }

    /// Mount the object upload endpoint with a given response.
    pub async fn mount_storage_upload(&self, response: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path_regex(format!("^/storage/v1/object/{BUCKET}/[^/]+/[^/]+$")))
            .respond_with(response)
            .mount(&self.mock)
            .await;
    }

    /// Mount the object removal endpoint, expecting a number of calls.
    pub async fn mount_storage_remove(&self, expected_calls: impl Into<Times>) {
        Mock::given(method("DELETE"))
            .and(path(format!("/storage/v1/object/{BUCKET}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(expected_calls)
            .mount(&self.mock)
            .await;
    }
}
