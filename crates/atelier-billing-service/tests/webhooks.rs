//! Webhook integration tests.
//!
//! These run the full axum router with a real temp store and real HMAC
//! signatures, exercising the verify -> claim -> apply -> acknowledge path.

use std::sync::Arc;

use axum_test::TestServer;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use atelier_billing_core::{
    Account, AccountId, SubscriptionStatus, MONTHLY_SUBSCRIPTION_CREDITS,
};
use atelier_billing_service::crypto::hmac_sha256_hex;
use atelier_billing_service::{create_router, AppState, ServiceConfig};
use atelier_billing_store::{RocksStore, Store};

const WEBHOOK_SECRET: &str = "whsec_test_secret";

struct Harness {
    server: TestServer,
    store: Arc<RocksStore>,
    _temp_dir: TempDir,
}

fn create_harness(stripe_api_url: Option<&str>) -> Harness {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let store = Arc::new(RocksStore::open(temp_dir.path()).expect("Failed to open store"));

    let config = ServiceConfig {
        listen_addr: "127.0.0.1:0".into(),
        data_dir: temp_dir.path().to_string_lossy().to_string(),
        service_api_key: Some("test-service-key".into()),
        stripe_api_key: Some("sk_test_xxx".into()),
        stripe_webhook_secret: Some(WEBHOOK_SECRET.into()),
        stripe_api_url: stripe_api_url
            .unwrap_or("http://127.0.0.1:9/stripe-unreachable")
            .into(),
        fal_api_url: "http://127.0.0.1:9/fal-unreachable".into(),
        fal_api_key: None,
        generation_timeout_seconds: 5,
        cors_origins: vec!["*".into()],
        max_body_bytes: 1024 * 1024,
        request_timeout_seconds: 30,
    };

    let state = AppState::new(Arc::clone(&store), config);
    let server = TestServer::new(create_router(state)).expect("Failed to create test server");

    Harness {
        server,
        store,
        _temp_dir: temp_dir,
    }
}

fn create_account(store: &RocksStore, permanent: i64, subscription: i64) -> AccountId {
    let account_id = AccountId::generate();
    let mut account = Account::new(account_id);
    account.permanent_credits = permanent;
    account.subscription_credits = subscription;
    store.put_account(&account).unwrap();
    account_id
}

fn signature_header(payload: &str) -> String {
    let timestamp = "1700000000";
    let signature = hmac_sha256_hex(WEBHOOK_SECRET, &format!("{timestamp}.{payload}"));
    format!("t={timestamp},v1={signature}")
}

async fn deliver(harness: &Harness, payload: &serde_json::Value) -> axum_test::TestResponse {
    let body = serde_json::to_string(payload).unwrap();
    harness
        .server
        .post("/webhooks/stripe")
        .add_header("stripe-signature", signature_header(&body))
        .text(body)
        .await
}

fn checkout_event(session_id: &str, account_id: &AccountId, credits: i64, plan_kind: &str) -> serde_json::Value {
    json!({
        "id": format!("evt_{session_id}"),
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": session_id,
                "payment_status": "paid",
                "customer": "cus_test_1",
                "amount_total": 999,
                "currency": "usd",
                "metadata": {
                    "account_id": account_id.to_string(),
                    "plan_id": if plan_kind == "subscription" { "studio-monthly" } else { "pack-small" },
                    "credits": credits.to_string(),
                    "plan_kind": plan_kind,
                }
            }
        }
    })
}

// ============================================================================
// Signature Gate
// ============================================================================

#[tokio::test]
async fn missing_signature_is_rejected() {
    let harness = create_harness(None);

    let response = harness
        .server
        .post("/webhooks/stripe")
        .text(r#"{"id":"evt_1","type":"checkout.session.completed","data":{"object":{}}}"#)
        .await;

    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn invalid_signature_is_rejected() {
    let harness = create_harness(None);

    let response = harness
        .server
        .post("/webhooks/stripe")
        .add_header("stripe-signature", "t=1700000000,v1=deadbeef")
        .text(r#"{"id":"evt_1","type":"checkout.session.completed","data":{"object":{}}}"#)
        .await;

    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn unparseable_body_is_rejected() {
    let harness = create_harness(None);
    let body = "not json at all";

    let response = harness
        .server
        .post("/webhooks/stripe")
        .add_header("stripe-signature", signature_header(body))
        .text(body)
        .await;

    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn unhandled_event_kind_is_acknowledged() {
    let harness = create_harness(None);

    let response = deliver(
        &harness,
        &json!({
            "id": "evt_noop",
            "type": "customer.updated",
            "data": { "object": {} }
        }),
    )
    .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["received"], true);
}

/// Internal failures after signature verification must not bounce the event
/// back to the processor.
#[tokio::test]
async fn internal_failure_is_still_acknowledged() {
    let harness = create_harness(None);

    // Account does not exist: credit grant fails internally.
    let ghost = AccountId::generate();
    let event = checkout_event("cs_ghost", &ghost, 100, "pack");

    let response = deliver(&harness, &event).await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["received"], true);
}

// ============================================================================
// Checkout Completion
// ============================================================================

#[tokio::test]
async fn pack_purchase_grants_permanent_credits() {
    let harness = create_harness(None);
    let account_id = create_account(&harness.store, 0, 0);

    let event = checkout_event("cs_pack_1", &account_id, 100, "pack");
    deliver(&harness, &event).await.assert_status_ok();

    let balances = harness.store.get_balances(&account_id).unwrap();
    assert_eq!(balances.permanent, 100);
    assert_eq!(balances.subscription, 0);

    let entries = harness.store.list_entries_by_account(&account_id, 10, 0).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].delta, 100);
    assert_eq!(entries[0].metadata["session_id"], "cs_pack_1");
}

/// Duplicate delivery of the same checkout session credits exactly once.
#[tokio::test]
async fn duplicate_checkout_session_credits_once() {
    let harness = create_harness(None);
    let account_id = create_account(&harness.store, 0, 0);

    let event = checkout_event("cs_dup_1", &account_id, 100, "pack");
    deliver(&harness, &event).await.assert_status_ok();
    deliver(&harness, &event).await.assert_status_ok();

    let balances = harness.store.get_balances(&account_id).unwrap();
    assert_eq!(balances.permanent, 100);

    let entries = harness.store.list_entries_by_account(&account_id, 10, 0).unwrap();
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn unpaid_checkout_session_is_ignored() {
    let harness = create_harness(None);
    let account_id = create_account(&harness.store, 0, 0);

    let mut event = checkout_event("cs_unpaid", &account_id, 100, "pack");
    event["data"]["object"]["payment_status"] = json!("unpaid");

    deliver(&harness, &event).await.assert_status_ok();

    assert_eq!(harness.store.get_balances(&account_id).unwrap().total(), 0);
    // Nothing was claimed, so a later paid delivery still lands.
    assert!(!harness.store.has_processed_event("cs_unpaid").unwrap());
}

/// Subscription checkout without reachable provider details falls back to a
/// 30-day period rather than failing.
#[tokio::test]
async fn subscription_checkout_activates_with_fallback_period() {
    let harness = create_harness(None);
    let account_id = create_account(&harness.store, 0, 0);

    let mut event = checkout_event("cs_sub_1", &account_id, 500, "subscription");
    event["data"]["object"]["subscription"] = json!("sub_test_1");

    deliver(&harness, &event).await.assert_status_ok();

    let account = harness.store.get_account(&account_id).unwrap().unwrap();
    assert_eq!(account.subscription_status, SubscriptionStatus::Active);
    assert_eq!(account.subscription_plan.as_deref(), Some("studio-monthly"));
    assert_eq!(account.subscription_credits, 500);

    // Fallback window: roughly 30 days out.
    let end = account.subscription_end.unwrap();
    let days = (end - chrono::Utc::now()).num_days();
    assert!((29..=30).contains(&days), "unexpected fallback window: {days} days");

    // The processor customer is linked for later lifecycle events.
    assert_eq!(
        harness.store.resolve_customer("cus_test_1").unwrap(),
        Some(account_id)
    );
}

/// When the processor serves subscription details, the reported period wins.
#[tokio::test]
async fn subscription_checkout_uses_provider_period() {
    let mock = MockServer::start().await;
    let period_start = 1_750_000_000;
    let period_end = 1_752_592_000;

    Mock::given(method("GET"))
        .and(path("/subscriptions/sub_test_2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "sub_test_2",
            "status": "active",
            "current_period_start": period_start,
            "current_period_end": period_end,
        })))
        .expect(1)
        .mount(&mock)
        .await;

    let harness = create_harness(Some(&mock.uri()));
    let account_id = create_account(&harness.store, 0, 0);

    let mut event = checkout_event("cs_sub_2", &account_id, 500, "subscription");
    event["data"]["object"]["subscription"] = json!("sub_test_2");

    deliver(&harness, &event).await.assert_status_ok();

    let account = harness.store.get_account(&account_id).unwrap().unwrap();
    assert_eq!(account.subscription_status, SubscriptionStatus::Active);
    assert_eq!(account.subscription_start.unwrap().timestamp(), period_start);
    assert_eq!(account.subscription_end.unwrap().timestamp(), period_end);
}

// ============================================================================
// Renewal
// ============================================================================

async fn activate_via_checkout(harness: &Harness, account_id: &AccountId, session_id: &str) {
    let mut event = checkout_event(session_id, account_id, 500, "subscription");
    event["data"]["object"]["subscription"] = json!("sub_live");
    deliver(harness, &event).await.assert_status_ok();
}

#[tokio::test]
async fn renewal_grants_cycle_credits_once() {
    let harness = create_harness(None);
    let account_id = create_account(&harness.store, 0, 0);
    activate_via_checkout(&harness, &account_id, "cs_renew_base").await;

    let renewal = json!({
        "id": "evt_renewal_1",
        "type": "invoice.payment_succeeded",
        "data": {
            "object": {
                "id": "in_renew_1",
                "billing_reason": "subscription_cycle",
                "customer": "cus_test_1",
                "amount_paid": 999,
                "currency": "usd",
                "lines": { "data": [ { "period": { "end": 1_760_000_000 } } ] }
            }
        }
    });

    deliver(&harness, &renewal).await.assert_status_ok();
    // Redelivered invoice is deduplicated by its id.
    deliver(&harness, &renewal).await.assert_status_ok();

    let account = harness.store.get_account(&account_id).unwrap().unwrap();
    assert_eq!(
        account.subscription_credits,
        500 + MONTHLY_SUBSCRIPTION_CREDITS
    );
    assert_eq!(account.subscription_end.unwrap().timestamp(), 1_760_000_000);

    let entries = harness.store.list_entries_by_account(&account_id, 10, 0).unwrap();
    // Activation grant + one renewal grant.
    assert_eq!(entries.len(), 2);
}

#[tokio::test]
async fn non_cycle_invoice_grants_nothing() {
    let harness = create_harness(None);
    let account_id = create_account(&harness.store, 0, 0);
    activate_via_checkout(&harness, &account_id, "cs_create_base").await;

    let first_invoice = json!({
        "id": "evt_first_invoice",
        "type": "invoice.payment_succeeded",
        "data": {
            "object": {
                "id": "in_first_1",
                "billing_reason": "subscription_create",
                "customer": "cus_test_1"
            }
        }
    });

    deliver(&harness, &first_invoice).await.assert_status_ok();

    let account = harness.store.get_account(&account_id).unwrap().unwrap();
    assert_eq!(account.subscription_credits, 500);
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn cancellation_zeroes_subscription_credits() {
    let harness = create_harness(None);
    let account_id = create_account(&harness.store, 40, 0);
    activate_via_checkout(&harness, &account_id, "cs_cancel_base").await;

    let cancellation = json!({
        "id": "evt_cancel_1",
        "type": "customer.subscription.deleted",
        "data": {
            "object": {
                "id": "sub_live",
                "customer": "cus_test_1"
            }
        }
    });

    deliver(&harness, &cancellation).await.assert_status_ok();

    let account = harness.store.get_account(&account_id).unwrap().unwrap();
    assert_eq!(account.subscription_status, SubscriptionStatus::Canceled);
    assert_eq!(account.subscription_credits, 0);
    assert_eq!(account.permanent_credits, 40);

    // Redelivery is a natural no-op: no new audit entries appear.
    let entries_before = harness
        .store
        .list_entries_by_account(&account_id, 10, 0)
        .unwrap()
        .len();
    deliver(&harness, &cancellation).await.assert_status_ok();
    let entries_after = harness
        .store
        .list_entries_by_account(&account_id, 10, 0)
        .unwrap()
        .len();
    assert_eq!(entries_before, entries_after);
}

// ============================================================================
// Payment Failure (expiry threshold)
// ============================================================================

fn payment_failed_event(attempt: i64) -> serde_json::Value {
    json!({
        "id": format!("evt_fail_{attempt}"),
        "type": "invoice.payment_failed",
        "data": {
            "object": {
                "id": "in_failing_1",
                "subscription": "sub_live",
                "customer": "cus_test_1",
                "attempt_count": attempt
            }
        }
    })
}

/// Attempts 1 and 2 leave the subscription active; attempt 3 expires it and
/// zeroes the cycle credits.
#[tokio::test]
async fn third_consecutive_payment_failure_expires_subscription() {
    let harness = create_harness(None);
    let account_id = create_account(&harness.store, 25, 0);
    activate_via_checkout(&harness, &account_id, "cs_fail_base").await;

    for attempt in [1, 2] {
        deliver(&harness, &payment_failed_event(attempt))
            .await
            .assert_status_ok();

        let account = harness.store.get_account(&account_id).unwrap().unwrap();
        assert_eq!(account.subscription_status, SubscriptionStatus::Active);
        assert_eq!(account.subscription_credits, 500);
    }

    deliver(&harness, &payment_failed_event(3))
        .await
        .assert_status_ok();

    let account = harness.store.get_account(&account_id).unwrap().unwrap();
    assert_eq!(account.subscription_status, SubscriptionStatus::Expired);
    assert_eq!(account.subscription_credits, 0);
    assert_eq!(account.permanent_credits, 25);
}

#[tokio::test]
async fn payment_failure_without_subscription_is_ignored() {
    let harness = create_harness(None);
    let account_id = create_account(&harness.store, 0, 0);
    activate_via_checkout(&harness, &account_id, "cs_onetime_base").await;

    let event = json!({
        "id": "evt_fail_onetime",
        "type": "invoice.payment_failed",
        "data": {
            "object": {
                "id": "in_onetime_1",
                "customer": "cus_test_1",
                "attempt_count": 5
            }
        }
    });

    deliver(&harness, &event).await.assert_status_ok();

    let account = harness.store.get_account(&account_id).unwrap().unwrap();
    assert_eq!(account.subscription_status, SubscriptionStatus::Active);
}
