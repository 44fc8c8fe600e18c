//! Integration tests for the Leakdrop backend.


use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::TempDir;

use crate::cache::ApiCache;
use crate::config::Config;
use crate::db::{init_database, Repository};
use crate::jobs::{DeliverySchedule, NotificationSchedule};
use crate::{create_router, AppState};

use fixtures::*;

const TEST_PSK: &str = "test-api-key";

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    pool: SqlitePool,
    repo: Arc<Repository>,
    config: Arc<Config>,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    async fn with_config(customize: impl FnOnce(&mut Config)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        let pool = init_database(&db_path).await.expect("Failed to init DB");
        seed(&pool).await;
        let repo = Arc::new(Repository::new(pool.clone()));

        let mut config = Config {
            api_psk: Some(TEST_PSK.to_string()),
            db_path,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
            devel_mode: false,
            accept_submissions: true,
            notification_interval: Duration::from_secs(60),
            notification_limit: 30,
            notif_source_name: "name fake".to_string(),
            notif_source_email: "mail@fake.xxx".to_string(),
        };
        customize(&mut config);
        let config = Arc::new(config);

        let state = AppState {
            repo: repo.clone(),
            cache: ApiCache::new(),
            config: config.clone(),
        };

        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("x-api-key", TEST_PSK.parse().unwrap());
        let client = Client::builder().default_headers(headers).build().unwrap();

        TestFixture {
            client,
            base_url,
            pool,
            repo,
            config,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json(&self, path: &str) -> Value {
        let resp = self.client.get(self.url(path)).send().await.unwrap();
        assert_eq!(resp.status(), 200, "GET {}", path);
        resp.json().await.unwrap()
    }

    async fn execute(&self, sql: &str) {
        sqlx::query(sql).execute(&self.pool).await.unwrap();
    }

    async fn submit(&self, receivers: &[&str]) -> reqwest::Response {
        self.client
            .post(self.url("/api/submission"))
            .json(&json!({
                "context_id": CONTEXT_ID,
                "receivers": receivers,
                "answers": { REQUIRED_FIELD: "o1" },
                "finalize": true,
            }))
            .send()
            .await
            .unwrap()
    }

    fn notification_schedule(&self) -> NotificationSchedule {
        NotificationSchedule::new(self.repo.clone(), self.config.clone())
    }
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_public_resources() {
    let fixture = TestFixture::new().await;

    let body = fixture.get_json("/api/public").await;

    let node = &body["node"];
    assert_eq!(node["name"], "Leak Watch");
    assert_eq!(node["description"], "Report safely");
    assert_eq!(node["footer"], "Leak Watch footer");
    assert_eq!(node["presentation"], "");
    assert_eq!(node["languages_enabled"], json!(["en", "it"]));
    assert_eq!(node["configured"], true);
    assert_eq!(node["accept_submissions"], true);
    assert_eq!(node["logo"], "bG9nbw==");
    assert_eq!(node["css"], "");
    assert_eq!(node["submission_minimum_delay"], 10);

    let contexts = body["contexts"].as_array().unwrap();
    assert_eq!(contexts.len(), 1);
    let context = &contexts[0];
    assert_eq!(context["id"], CONTEXT_ID);
    assert_eq!(context["name"], "Corruption");
    assert_eq!(context["picture"], "Y29udGV4dA==");
    assert_eq!(context["receivers"], json!([ALICE, BOB]));
    assert_eq!(context["tip_timetolive"], 15);

    let questionnaire = &context["questionnaire"];
    assert_eq!(questionnaire["key"], "default");
    let step = &questionnaire["steps"][0];
    assert_eq!(step["label"], "Your report");
    assert_eq!(step["children"][0]["id"], REQUIRED_FIELD);
    assert_eq!(step["children"][0]["type"], "selectbox");
    assert_eq!(step["children"][0]["options"][1]["label"], "Other");
    assert_eq!(step["children"][1]["attrs"]["max_len"]["value"], "4096");
    assert_eq!(step["children"][1]["template_id"], "");

    let receivers = body["receivers"].as_array().unwrap();
    let ids: Vec<_> = receivers.iter().map(|r| r["id"].clone()).collect();
    assert_eq!(ids, [json!(ALICE), json!(BOB)]);
    assert_eq!(receivers[0]["name"], "Alice");
    assert_eq!(receivers[0]["username"], "");
    assert_eq!(receivers[0]["contexts"], json!([CONTEXT_ID]));
    assert_eq!(receivers[0]["description"], "Investigative journalist");
    assert!(receivers.iter().all(|r| r["id"] != CAROL));
}

#[tokio::test]
async fn test_public_language_selection() {
    let fixture = TestFixture::new().await;

    let body = fixture.get_json("/api/public?lang=it").await;
    assert_eq!(body["node"]["description"], "Segnala in sicurezza");
    assert_eq!(body["contexts"][0]["name"], "Corruzione");
    // Missing translations fall back to the default language
    assert_eq!(body["node"]["footer"], "Leak Watch footer");

    let resp = fixture
        .client
        .get(fixture.url("/api/public"))
        .header("GL-Language", "it")
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["node"]["description"], "Segnala in sicurezza");

    let resp = fixture
        .client
        .get(fixture.url("/api/public"))
        .header("Accept-Language", "it,en;q=0.8")
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["node"]["description"], "Segnala in sicurezza");

    // Languages not enabled on the node resolve to the default language
    let body = fixture.get_json("/api/public?lang=fr").await;
    assert_eq!(body["node"]["description"], "Report safely");
}

#[tokio::test]
async fn test_public_resources_cached_until_invalidation() {
    let fixture = TestFixture::new().await;

    let body = fixture.get_json("/api/public").await;
    assert_eq!(body["node"]["name"], "Leak Watch");

    fixture
        .execute("UPDATE node SET name = 'Renamed' WHERE id = 1")
        .await;

    let body = fixture.get_json("/api/public").await;
    assert_eq!(body["node"]["name"], "Leak Watch");

    let resp = fixture
        .client
        .post(fixture.url("/api/internal/cache/invalidate"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["revisionId"], 1);

    let body = fixture.get_json("/api/public").await;
    assert_eq!(body["node"]["name"], "Renamed");
}

#[tokio::test]
async fn test_revision_bump_refreshes_cache() {
    let fixture = TestFixture::new().await;

    fixture.get_json("/api/public").await;
    fixture
        .execute("UPDATE node SET name = 'Renamed' WHERE id = 1")
        .await;
    fixture
        .execute("UPDATE meta SET revision_id = revision_id + 1 WHERE id = 1")
        .await;

    let body = fixture.get_json("/api/public").await;
    assert_eq!(body["node"]["name"], "Renamed");
}

#[tokio::test]
async fn test_ahmia_descriptor_disabled() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/description.json"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_ahmia_descriptor_enabled() {
    let fixture = TestFixture::new().await;
    fixture.execute("UPDATE node SET ahmia = 1 WHERE id = 1").await;

    let body = fixture.get_json("/description.json").await;
    assert_eq!(
        body,
        json!({
            "title": "Leak Watch",
            "description": "Report safely",
            "keywords": "Leak Watch (Leakdrop instance)",
            "relation": "https://leakwatch.example",
            "language": "en",
            "contactInformation": "",
            "type": "Leakdrop",
        })
    );
}

#[tokio::test]
async fn test_robots_txt() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/robots.txt"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let content_type = resp.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain"));
    assert_eq!(resp.text().await.unwrap(), "User-agent: *\nDisallow: /");

    fixture
        .execute("UPDATE node SET allow_indexing = 1 WHERE id = 1")
        .await;

    let resp = fixture
        .client
        .get(fixture.url("/robots.txt"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.text().await.unwrap(), "User-agent: *\nAllow: /");
}

#[tokio::test]
async fn test_tor2web_requests() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/api/public"))
        .header("X-Tor2Web", "1")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    fixture
        .execute("UPDATE node SET tor2web_unauth = 0 WHERE id = 1")
        .await;

    let resp = fixture
        .client
        .get(fixture.url("/api/public"))
        .header("X-Tor2Web", "1")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    // Direct onion access is unaffected
    let resp = fixture
        .client
        .get(fixture.url("/api/public"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_internal_routes_require_psk() {
    let fixture = TestFixture::new().await;
    let client = Client::new();

    let resp = client
        .post(fixture.url("/api/internal/cache/invalidate"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let resp = client
        .post(fixture.url("/api/internal/jobs/notification"))
        .header("x-api-key", "wrong-key")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .post(fixture.url("/api/internal/jobs/notification"))
        .bearer_auth(TEST_PSK)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // Public routes need no key
    let resp = client.get(fixture.url("/api/public")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_create_submission() {
    let fixture = TestFixture::new().await;

    let resp = fixture.submit(&[ALICE]).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["context_id"], CONTEXT_ID);
    assert_eq!(body["data"]["progressive"], 1);
    assert_eq!(body["data"]["receivers"], json!([ALICE]));
    assert_eq!(body["data"]["finalized"], true);

    let body: Value = fixture.submit(&[ALICE, BOB]).await.json().await.unwrap();
    assert_eq!(body["data"]["progressive"], 2);
}

#[tokio::test]
async fn test_submission_validation_errors() {
    let fixture = TestFixture::new().await;

    let resp = fixture.submit(&[]).await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let resp = fixture.submit(&[CAROL]).await;
    assert_eq!(resp.status(), 400);

    let resp = fixture
        .client
        .post(fixture.url("/api/submission"))
        .json(&json!({
            "context_id": CONTEXT_ID,
            "receivers": [ALICE],
            "answers": {},
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = fixture
        .client
        .post(fixture.url("/api/submission"))
        .json(&json!({
            "context_id": EMPTY_CONTEXT_ID,
            "receivers": [ALICE],
            "answers": { REQUIRED_FIELD: "o1" },
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_submissions_disabled() {
    let fixture = TestFixture::with_config(|config| config.accept_submissions = false).await;

    let body = fixture.get_json("/api/public").await;
    assert_eq!(body["node"]["accept_submissions"], false);

    let resp = fixture.submit(&[ALICE]).await;
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn test_tip_notification() {
    let fixture = TestFixture::new().await;
    let schedule = fixture.notification_schedule();

    // Start from an empty queue
    schedule.operation().await.unwrap();

    assert_eq!(fixture.submit(&[ALICE]).await.status(), 200);
    let delivered = DeliverySchedule::new(fixture.repo.clone())
        .tip_creation()
        .await
        .unwrap();
    assert_eq!(delivered, 1);

    let (events, enqueued) = schedule.create_tip_notification_events(0).await.unwrap();
    assert_eq!(enqueued, 1);
    assert_eq!(events[0].receiver_id, ALICE);
    assert_eq!(events[0].tip_progressive, 1);

    let queued = schedule.do_tip_notification(&events).await.unwrap();
    assert_eq!(queued, 1);

    let outbox = fixture.repo.list_outbox().await.unwrap();
    assert_eq!(outbox.len(), 1);
    let mail = &outbox[0];
    assert_eq!(mail.event_id, events[0].id);
    assert_eq!(mail.address, "alice@leakwatch.example");
    assert_eq!(mail.source, "name fake <mail@fake.xxx>");
    assert_eq!(mail.subject, "[Leak Watch] Tip #1 for Alice");
    assert!(mail.body.contains("Corruption"));

    // Nothing left to notify
    let (_, enqueued) = schedule.create_tip_notification_events(0).await.unwrap();
    assert_eq!(enqueued, 0);
}

#[tokio::test]
async fn test_notification_limit() {
    let fixture = TestFixture::with_config(|config| config.notification_limit = 1).await;
    let schedule = fixture.notification_schedule();

    fixture.submit(&[ALICE]).await;
    fixture.submit(&[ALICE]).await;
    let delivered = DeliverySchedule::new(fixture.repo.clone())
        .tip_creation()
        .await
        .unwrap();
    assert_eq!(delivered, 2);

    // The limit is already reached by what the caller counted
    let (_, enqueued) = schedule.create_tip_notification_events(1).await.unwrap();
    assert_eq!(enqueued, 0);

    let (events, enqueued) = schedule.create_tip_notification_events(0).await.unwrap();
    assert_eq!(enqueued, 1);
    assert_eq!(events[0].tip_progressive, 1);

    let (events, enqueued) = schedule.create_tip_notification_events(0).await.unwrap();
    assert_eq!(enqueued, 1);
    assert_eq!(events[0].tip_progressive, 2);
}

#[tokio::test]
async fn test_receiver_without_mail_address_is_skipped() {
    let fixture = TestFixture::new().await;
    let schedule = fixture.notification_schedule();

    fixture.submit(&[BOB]).await;
    DeliverySchedule::new(fixture.repo.clone())
        .tip_creation()
        .await
        .unwrap();

    let (events, enqueued) = schedule.create_tip_notification_events(0).await.unwrap();
    assert_eq!(enqueued, 1);
    assert_eq!(schedule.do_tip_notification(&events).await.unwrap(), 0);
    assert!(fixture.repo.list_outbox().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_disabled_tip_notification_creates_no_event() {
    let fixture = TestFixture::new().await;
    fixture
        .execute("UPDATE receivers SET tip_notification = 0 WHERE id = 'r1'")
        .await;

    fixture.submit(&[ALICE]).await;
    DeliverySchedule::new(fixture.repo.clone())
        .tip_creation()
        .await
        .unwrap();

    let (events, enqueued) = fixture
        .notification_schedule()
        .create_tip_notification_events(0)
        .await
        .unwrap();
    assert_eq!(enqueued, 0);
    assert!(events.is_empty());
}

#[tokio::test]
async fn test_notification_job_endpoint() {
    let fixture = TestFixture::new().await;

    fixture.submit(&[ALICE, BOB]).await;

    let resp = fixture
        .client
        .post(fixture.url("/api/internal/jobs/notification"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(
        body["data"],
        json!({"tips_created": 2, "events_enqueued": 2, "mails_queued": 1})
    );
}

#[tokio::test]
async fn test_public_resources_follow_presentation_order() {
    let fixture = TestFixture::new().await;
    // Rows are stored against their presentation order so neither insertion
    // order nor ids match the expected listing
    fixture
        .execute(
            r#"
            INSERT INTO contexts (id, questionnaire_id, presentation_order, tip_timetolive, name)
            VALUES ('c_z', 'q1', -1, 15, '{"en": "Environment"}');
            INSERT INTO receiver_contexts (receiver_id, context_id, presentation_order)
            VALUES ('r1', 'c_z', 0);

            UPDATE receiver_contexts SET presentation_order = 2
            WHERE receiver_id = 'r1' AND context_id = 'c1';
            UPDATE receivers SET presentation_order = 5 WHERE id = 'r1';

            INSERT INTO steps (id, questionnaire_id, presentation_order, label)
            VALUES ('s_z', 'q1', -1, '{"en": "Introduction"}');

            UPDATE fields SET y = 3 WHERE id = 'f_question';
            INSERT INTO fields (id, key, type, step_id, required, x, y, label) VALUES
                ('f_a', 'when', 'date', 's1', 0, 1, 2, '{"en": "When"}'),
                ('f_b', 'where', 'inputbox', 's1', 0, 0, 2, '{"en": "Where"}');

            UPDATE field_options SET presentation_order = 2 WHERE id = 'o1';
            "#,
        )
        .await;

    let body = fixture.get_json("/api/public").await;
    let ids = |value: &Value| -> Vec<String> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["id"].as_str().unwrap().to_string())
            .collect()
    };

    assert_eq!(ids(&body["contexts"]), ["c_z", CONTEXT_ID]);
    assert_eq!(ids(&body["receivers"]), [BOB, ALICE]);

    let context = &body["contexts"][1];
    assert_eq!(context["receivers"], json!([BOB, ALICE]));

    let steps = &context["questionnaire"]["steps"];
    assert_eq!(ids(steps), ["s_z", "s1"]);

    let children = &steps[1]["children"];
    assert_eq!(ids(children), ["f_comment", "f_b", "f_a", REQUIRED_FIELD]);
    assert_eq!(ids(&children[3]["options"]), ["o2", "o1"]);
}

#[tokio::test]
async fn test_duplicate_receivers_are_stored_once() {
    let fixture = TestFixture::new().await;

    let body: Value = fixture.submit(&[ALICE, ALICE]).await.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["receivers"], json!([ALICE]));

    let fixture = TestFixture::new().await;
    fixture
        .execute("UPDATE contexts SET maximum_selectable_receivers = 1 WHERE id = 'c1'")
        .await;

    let resp = fixture.submit(&[ALICE, ALICE]).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["receivers"], json!([ALICE]));

    let resp = fixture.submit(&[BOB, ALICE, BOB]).await;
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_draft_submission_rejected() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/submission"))
        .json(&json!({
            "context_id": CONTEXT_ID,
            "receivers": [ALICE],
            "answers": { REQUIRED_FIELD: "o1" },
            "finalize": false,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_concurrent_submissions_get_distinct_numbers() {
    let fixture = Arc::new(TestFixture::new().await);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let fixture = Arc::clone(&fixture);
            tokio::spawn(async move {
                let resp = fixture.submit(&[ALICE]).await;
                assert_eq!(resp.status(), 200);
                let body: Value = resp.json().await.unwrap();
                body["data"]["progressive"].as_i64().unwrap()
            })
        })
        .collect();

    let mut numbers = Vec::new();
    for handle in handles {
        numbers.push(handle.await.unwrap());
    }
    numbers.sort_unstable();
    assert_eq!(numbers, (1..=8).collect::<Vec<i64>>());
}

#[tokio::test]
async fn test_unsent_notification_is_retried() {
    let fixture = TestFixture::new().await;
    let schedule = fixture.notification_schedule();

    fixture.submit(&[BOB]).await;
    DeliverySchedule::new(fixture.repo.clone())
        .tip_creation()
        .await
        .unwrap();

    assert_eq!(schedule.operation().await.unwrap(), (1, 0));
    assert!(fixture.repo.list_outbox().await.unwrap().is_empty());

    fixture
        .execute("UPDATE users SET mail_address = 'bob@leakwatch.example' WHERE id = 'r2'")
        .await;

    // No new event, but the pending one gets its mail
    assert_eq!(schedule.operation().await.unwrap(), (0, 1));
    let outbox = fixture.repo.list_outbox().await.unwrap();
    assert_eq!(outbox.len(), 1);
    assert_eq!(outbox[0].address, "bob@leakwatch.example");

    assert_eq!(schedule.operation().await.unwrap(), (0, 0));
}
