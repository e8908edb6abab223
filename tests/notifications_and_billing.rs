use serde_json::json;
use slotscout::api::{ApiClient, Platform};
use slotscout::billing::{BillingError, BillingService};
use slotscout::config::ApiConfig;
use slotscout::notifications::NotificationFeed;
use slotscout::store::{MemoryStore, ProfileStore, UserProfile};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LICENCE: &str = "SMITH912345AB9CD";

fn client_for(server: &MockServer) -> Arc<ApiClient> {
    let config = ApiConfig {
        base_url: server.uri(),
        timeout: Duration::from_secs(5),
    };
    Arc::new(ApiClient::new(&config).expect("client builds"))
}

fn stored_profile() -> UserProfile {
    serde_json::from_value(json!({
        "_id": "66f0c2",
        "licenseNumber": LICENCE,
        "selectedCentres": [{"name": "Wood Green", "postalCode": "N22 5EY"}],
        "availability": {"03/03/25": ["Morning"], "04/03/25": ["Afternoon"]},
    }))
    .expect("valid profile")
}

#[tokio::test]
async fn matched_notices_line_up_with_watched_dates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/notifications/66f0c2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "_id": "n1",
                "userId": "66f0c2",
                "text": "A slot opened at Wood Green",
                "read": false,
                "readApp": false,
                "selectedCentre": {"name": "wood green ", "postalCode": "n22 5ey"},
                "selectedDate": "Monday 3 March 2025",
            },
        ])))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::with_profile(stored_profile()));
    let feed = NotificationFeed::new(client_for(&server), store);

    let notices = feed.fetch_matched().await.expect("notices fetched");
    assert_eq!(notices.len(), 2);
    assert_eq!(notices[0].text.as_deref(), Some("A slot opened at Wood Green"));
    assert_eq!(notices[1].text, None);
}

#[tokio::test]
async fn new_notifications_come_from_the_delivery_sweep_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/notifications/new/66f0c2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "_id": "n9",
                "userId": "66f0c2",
                "text": "A slot opened at Wood Green",
                "read": false,
                "readApp": false,
            },
        ])))
        .expect(1)
        .mount(&server)
        .await;
    // The full listing is older and must not be consulted.
    Mock::given(method("GET"))
        .and(path("/api/notifications/66f0c2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::with_profile(stored_profile()));
    let feed = NotificationFeed::new(client_for(&server), store);

    let records = feed.fetch_new().await.expect("new notifications fetched");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, "n9");
}

#[tokio::test]
async fn mark_read_posts_the_ids_for_the_stored_user() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/notifications/update"))
        .and(body_partial_json(json!({
            "userId": "66f0c2",
            "notificationIds": ["n1", "n2"],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::with_profile(stored_profile()));
    let feed = NotificationFeed::new(client_for(&server), store);

    feed.mark_read(&["n1".to_string(), "n2".to_string()])
        .await
        .expect("mark read succeeds");

    // Empty id lists never hit the network.
    feed.mark_read(&[]).await.expect("no-op succeeds");
    let updates = server
        .received_requests()
        .await
        .expect("requests recorded")
        .len();
    assert_eq!(updates, 1);
}

#[tokio::test]
async fn valid_receipt_upgrades_and_persists_the_profile() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/verifyPayment"))
        .and(body_partial_json(json!({"receipt": "r-1", "platform": "ios"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"isValid": true})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/updateUserPremiumStatus"))
        .and(body_partial_json(json!({
            "licenseNumber": LICENCE,
            "isPremium": true,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": {
                "_id": "66f0c2",
                "licenseNumber": LICENCE,
                "isPremium": true,
            },
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::with_profile(stored_profile()));
    let billing = BillingService::new(client_for(&server), store.clone());

    let user = billing
        .redeem("r-1", Platform::Ios)
        .await
        .expect("redeem succeeds");
    assert!(user.is_premium);

    let stored = store
        .load()
        .expect("store readable")
        .expect("profile present");
    assert!(stored.is_premium);
}

#[tokio::test]
async fn invalid_receipt_leaves_the_profile_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/verifyPayment"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"isValid": false})))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::with_profile(stored_profile()));
    let billing = BillingService::new(client_for(&server), store.clone());

    let err = billing
        .redeem("r-2", Platform::Android)
        .await
        .expect_err("redeem fails");
    assert!(matches!(err, BillingError::InvalidReceipt));

    let stored = store
        .load()
        .expect("store readable")
        .expect("profile present");
    assert!(!stored.is_premium);
}
