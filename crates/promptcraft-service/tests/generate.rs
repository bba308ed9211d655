//! Image generation integration tests.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use common::{TestHarness, GENERATION_COST};
use promptcraft_core::{
    CreditGrant, CreditTransaction, GrantOutcome, ImageId, ImageRecord, NewImage, Profile,
    ProfileUpdate, TransactionKind, UserId,
};
use promptcraft_store::{MemoryStore, Store, StoreError};

/// Delegates to the memory store but fails every generation commit.
struct FailingCommitStore(Arc<MemoryStore>);

#[async_trait]
impl Store for FailingCommitStore {
    async fn get_profile(&self, user_id: &UserId) -> promptcraft_store::Result<Option<Profile>> {
        self.0.get_profile(user_id).await
    }

    async fn ensure_profile(&self, user_id: &UserId) -> promptcraft_store::Result<Profile> {
        self.0.ensure_profile(user_id).await
    }

    async fn update_profile(
        &self,
        user_id: &UserId,
        update: &ProfileUpdate,
    ) -> promptcraft_store::Result<Profile> {
        self.0.update_profile(user_id, update).await
    }

    async fn set_stripe_customer_id(
        &self,
        user_id: &UserId,
        customer_id: &str,
    ) -> promptcraft_store::Result<()> {
        self.0.set_stripe_customer_id(user_id, customer_id).await
    }

    async fn find_profile_by_stripe_customer(
        &self,
        customer_id: &str,
    ) -> promptcraft_store::Result<Option<Profile>> {
        self.0.find_profile_by_stripe_customer(customer_id).await
    }

    async fn grant_credits(&self, grant: &CreditGrant) -> promptcraft_store::Result<GrantOutcome> {
        self.0.grant_credits(grant).await
    }

    async fn process_image_generation(&self, _image: &NewImage) -> promptcraft_store::Result<i64> {
        Err(StoreError::Database("connection reset".into()))
    }

    async fn list_transactions(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> promptcraft_store::Result<Vec<CreditTransaction>> {
        self.0.list_transactions(user_id, limit, offset).await
    }

    async fn list_images(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> promptcraft_store::Result<Vec<ImageRecord>> {
        self.0.list_images(user_id, limit, offset).await
    }

    async fn get_image(
        &self,
        user_id: &UserId,
        image_id: &ImageId,
    ) -> promptcraft_store::Result<Option<ImageRecord>> {
        self.0.get_image(user_id, image_id).await
    }

    async fn delete_image(
        &self,
        user_id: &UserId,
        image_id: &ImageId,
    ) -> promptcraft_store::Result<ImageRecord> {
        self.0.delete_image(user_id, image_id).await
    }
}

async fn generate(harness: &TestHarness, prompt: &str) -> axum_test::TestResponse {
    harness
        .server
        .post("/api/generate")
        .add_header(AUTHORIZATION, harness.user_auth_header())
        .json(&json!({ "prompt": prompt }))
        .await
}

// ============================================================================
// Success
// ============================================================================

#[tokio::test]
async fn generation_debits_and_records_image() {
    let harness = TestHarness::new().await;
    harness.seed_credits(25).await;
    harness.mount_generation_success().await;

    let response = generate(&harness, "a lighthouse at dusk").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["new_credits"], 25 - GENERATION_COST);
    assert!(body["image_url"]
        .as_str()
        .unwrap()
        .contains("/storage/v1/object/sign/"));
    assert_eq!(harness.balance().await, 25 - GENERATION_COST);

    let images = harness
        .store
        .list_images(&harness.test_user_id, 10, 0)
        .await
        .unwrap();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].id.to_string(), body["image_id"].as_str().unwrap());
    assert_eq!(images[0].prompt, "a lighthouse at dusk");
    assert_eq!(images[0].cost, GENERATION_COST);
    assert!(images[0]
        .storage_path
        .starts_with(&format!("{}/", harness.test_user_id)));
    assert!(images[0].storage_path.ends_with(".png"));

    let ledger = harness
        .store
        .list_transactions(&harness.test_user_id, 10, 0)
        .await
        .unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].kind, TransactionKind::Generation);
    assert_eq!(ledger[0].amount, -GENERATION_COST);
    assert_eq!(ledger[0].balance_after, 25 - GENERATION_COST);
}

#[tokio::test]
async fn balance_runs_out_after_affordable_generations() {
    let harness = TestHarness::new().await;
    harness.seed_credits(2 * GENERATION_COST).await;
    harness.mount_generation_success().await;

    generate(&harness, "one").await.assert_status_ok();
    generate(&harness, "two").await.assert_status_ok();
    generate(&harness, "three")
        .await
        .assert_status(StatusCode::PAYMENT_REQUIRED);

    assert_eq!(harness.balance().await, 0);
}

#[tokio::test]
async fn concurrent_generations_never_overdraw() {
    let harness = TestHarness::new().await;
    harness.seed_credits(GENERATION_COST).await;
    harness.mount_generation_success().await;
    harness.mount_storage_remove(0..=1_u64).await;

    let (first, second) = tokio::join!(generate(&harness, "left"), generate(&harness, "right"));

    let mut statuses = [first.status_code(), second.status_code()];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::OK, StatusCode::PAYMENT_REQUIRED]);
    assert_eq!(harness.balance().await, 0);

    let images = harness
        .store
        .list_images(&harness.test_user_id, 10, 0)
        .await
        .unwrap();
    assert_eq!(images.len(), 1);
}

// ============================================================================
// Refusals
// ============================================================================

#[tokio::test]
async fn insufficient_credits_skips_upstream_work() {
    let harness = TestHarness::new().await;
    harness.seed_credits(GENERATION_COST - 1).await;
    harness.mount_image_api(0_u64).await;

    let response = generate(&harness, "anything").await;

    response.assert_status(StatusCode::PAYMENT_REQUIRED);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "insufficient_credits");
    assert_eq!(body["error"]["details"]["balance"], GENERATION_COST - 1);
    assert_eq!(body["error"]["details"]["required"], GENERATION_COST);
    assert_eq!(harness.balance().await, GENERATION_COST - 1);
}

#[tokio::test]
async fn negative_cost_never_credits_the_user() {
    let harness = TestHarness::with_config(|config| config.generation_cost = -5).await;
    harness.seed_credits(0).await;
    harness.mount_image_api(0_u64).await;

    generate(&harness, "free money")
        .await
        .assert_status(StatusCode::INTERNAL_SERVER_ERROR);

    assert_eq!(harness.balance().await, 0);
    let ledger = harness
        .store
        .list_transactions(&harness.test_user_id, 10, 0)
        .await
        .unwrap();
    assert!(ledger.is_empty());
}

#[tokio::test]
async fn new_user_starts_without_credits() {
    let harness = TestHarness::new().await;
    harness.mount_image_api(0_u64).await;

    generate(&harness, "anything")
        .await
        .assert_status(StatusCode::PAYMENT_REQUIRED);
}

#[tokio::test]
async fn blank_prompt_is_rejected() {
    let harness = TestHarness::new().await;
    harness.seed_credits(100).await;

    let response = generate(&harness, "   ").await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(harness.balance().await, 100);
}

#[tokio::test]
async fn generation_requires_auth() {
    let harness = TestHarness::new().await;

    let response = harness
        .server
        .post("/api/generate")
        .json(&json!({ "prompt": "x" }))
        .await;

    response.assert_status_unauthorized();
}

// ============================================================================
// Upstream failures
// ============================================================================

#[tokio::test]
async fn image_api_failure_keeps_balance() {
    let harness = TestHarness::new().await;
    harness.seed_credits(50).await;
    Mock::given(method("POST"))
        .and(path("/v1/images/generations"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "message": "content policy violation", "type": "invalid_request_error" }
        })))
        .mount(&harness.mock)
        .await;

    let response = generate(&harness, "forbidden").await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "external_service_error");
    assert_eq!(harness.balance().await, 50);
}

#[tokio::test]
async fn upload_failure_keeps_balance() {
    let harness = TestHarness::new().await;
    harness.seed_credits(50).await;
    harness.mount_image_api(1_u64).await;
    harness
        .mount_storage_upload(ResponseTemplate::new(500).set_body_json(json!({
            "statusCode": "500", "error": "internal", "message": "disk full"
        })))
        .await;

    let response = generate(&harness, "a cat").await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(harness.balance().await, 50);
    assert!(harness
        .store
        .list_images(&harness.test_user_id, 10, 0)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn failed_commit_removes_uploaded_object() {
    let harness = TestHarness::with_options(
        |_| {},
        |store| Arc::new(FailingCommitStore(store)) as Arc<dyn Store>,
    )
    .await;
    harness.seed_credits(50).await;
    harness.mount_generation_success().await;
    harness.mount_storage_remove(1_u64).await;

    let response = generate(&harness, "a dog").await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(harness.balance().await, 50);
}
