#![allow(clippy::unwrap_used)]
// Integration tests for `PasswordReconciler` against a wiremock Device42.

use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{body_string, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use d42_core::{
    CoreError, DeleteOutcome, DesiredPassword, Device42Client, Lifecycle, PasswordReconciler,
    PasswordState, ReconcilePolicy, RemoteId,
};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, Device42Client) {
    let server = MockServer::start().await;
    let base = Url::parse(&format!("{}/api/", server.uri())).unwrap();
    let client = Device42Client::with_client(reqwest::Client::new(), base, None);
    (server, client)
}

fn ok(msg: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"code": 0, "msg": msg}))
}

fn password_list(secret: &str, fields: &[(&str, &str)]) -> Value {
    let custom_fields: Vec<Value> = fields
        .iter()
        .map(|(k, v)| json!({"key": k, "value": v, "notes": ""}))
        .collect();
    json!({"passwords": [{
        "id": 7,
        "username": "root",
        "password": secret,
        "label": "db01",
        "category": null,
        "notes": "",
        "custom_fields": custom_fields,
        "last_pw_change": "2024-02-10T09:30:00"
    }]})
}

async fn mount_password(server: &MockServer, body: Value) {
    Mock::given(method("GET"))
        .and(path("/api/1.0/passwords/"))
        .and(query_param("id", "7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

fn root_at_db01(secret: &str) -> DesiredPassword {
    DesiredPassword::new("root", SecretString::from(secret.to_owned())).with_label("db01")
}

// ── Create ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_create_binds_after_custom_fields() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/1.0/passwords/"))
        .and(body_string("username=root&password=s3cret&label=db01&notes="))
        .respond_with(ok(json!(["password added or updated", 7, "root"])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/1.0/custom_fields/password"))
        .and(body_string("username=root&bulk_fields=env%3Aprod%2Ctier%3A1"))
        .respond_with(ok(json!(["custom key pair values added or updated"])))
        .expect(1)
        .mount(&server)
        .await;
    mount_password(&server, password_list("s3cret", &[("env", "prod"), ("tier", "1")])).await;

    let reconciler = PasswordReconciler::new(&client, ReconcilePolicy::default());
    let mut state = PasswordState::absent();
    let desired = root_at_db01("s3cret")
        .with_custom_field("env", "prod")
        .with_custom_field("tier", "1");
    reconciler.create(&desired, &mut state).await.unwrap();

    assert_eq!(state.id(), Some(RemoteId::new(7)));
    let observed = state.observed().unwrap();
    assert_eq!(observed.password.as_ref().unwrap().expose_secret(), "s3cret");
    assert!(observed.last_pw_change.is_some());
}

#[tokio::test]
async fn test_create_partial_failure_reports_orphan() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/1.0/passwords/"))
        .respond_with(ok(json!(["password added or updated", 7, "root"])))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let reconciler = PasswordReconciler::new(&client, ReconcilePolicy::default());
    let mut state = PasswordState::absent();
    let err = reconciler
        .create(&root_at_db01("s3cret").with_custom_field("env", "prod"), &mut state)
        .await
        .unwrap_err();

    assert!(
        matches!(err, CoreError::PartialCreate { orphan_id, .. } if orphan_id == RemoteId::new(7)),
        "got: {err:?}"
    );
    assert!(!state.is_bound());
}

// ── Read ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_read_without_plain_text_hides_secret() {
    let (server, client) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/1.0/passwords/"))
        .and(query_param("plain_text", "no"))
        .respond_with(ResponseTemplate::new(200).set_body_json(password_list("****", &[])))
        .expect(1)
        .mount(&server)
        .await;

    let reconciler = PasswordReconciler::new(&client, ReconcilePolicy::default());
    let mut state = PasswordState::bound(RemoteId::new(7));
    reconciler.read(&mut state, false).await.unwrap();

    let observed = state.observed().unwrap();
    assert!(observed.password.is_none());
    assert_eq!(observed.identity(), "password 'root@db01'");
}

#[tokio::test]
async fn test_read_empty_list_clears_binding() {
    let (server, client) = setup().await;
    mount_password(&server, json!({"passwords": []})).await;

    let reconciler = PasswordReconciler::new(&client, ReconcilePolicy::default());
    let mut state = PasswordState::bound(RemoteId::new(7));
    reconciler.read(&mut state, true).await.unwrap();

    assert_eq!(state.id(), None);
    assert_eq!(state.lifecycle(), Lifecycle::Deleted);
}

// ── Update ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_update_rotates_secret_with_full_field_set() {
    let (server, client) = setup().await;
    mount_password(&server, password_list("s3cret", &[])).await;
    Mock::given(method("POST"))
        .and(path("/api/1.0/passwords/"))
        .and(body_string(
            "id=7&username=root&password=rotated&label=db01&notes=&category=&device=&appcomp=",
        ))
        .respond_with(ok(json!(["password added or updated", 7, "root"])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ok(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let reconciler = PasswordReconciler::new(&client, ReconcilePolicy::default());
    let mut state = PasswordState::bound(RemoteId::new(7));
    reconciler.read(&mut state, true).await.unwrap();

    let plan = reconciler
        .update(&root_at_db01("rotated"), &mut state)
        .await
        .unwrap();
    assert_eq!(plan.write_count(), 1);
    assert!(plan.attributes[0].sensitive);
}

#[tokio::test]
async fn test_update_custom_field_writes_by_username() {
    let (server, client) = setup().await;
    mount_password(&server, password_list("s3cret", &[("env", "prod"), ("owner", "alice")])).await;
    Mock::given(method("PUT"))
        .and(path("/api/1.0/custom_fields/password"))
        .and(body_string("username=root&key=env&value=staging"))
        .respond_with(ok(json!(["custom key pair values added or updated"])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ok(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let reconciler = PasswordReconciler::new(&client, ReconcilePolicy::default());
    let mut state = PasswordState::bound(RemoteId::new(7));
    reconciler.read(&mut state, true).await.unwrap();

    let desired = root_at_db01("s3cret").with_custom_field("env", "staging");
    let plan = reconciler.update(&desired, &mut state).await.unwrap();
    assert_eq!(plan.write_count(), 1);
}

#[tokio::test]
async fn test_update_writes_each_changed_key_once() {
    let (server, client) = setup().await;
    mount_password(
        &server,
        password_list("s3cret", &[("env", "prod"), ("tier", "1"), ("owner", "alice")]),
    )
    .await;
    for body in ["username=root&key=env&value=staging", "username=root&key=region&value=emea"] {
        Mock::given(method("PUT"))
            .and(path("/api/1.0/custom_fields/password"))
            .and(body_string(body))
            .respond_with(ok(json!(["custom key pair values added or updated"])))
            .expect(1)
            .mount(&server)
            .await;
    }
    Mock::given(method("PUT"))
        .respond_with(ok(json!([])))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ok(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let reconciler = PasswordReconciler::new(&client, ReconcilePolicy::default());
    let mut state = PasswordState::bound(RemoteId::new(7));
    reconciler.read(&mut state, true).await.unwrap();

    let desired = root_at_db01("s3cret")
        .with_custom_field("env", "staging")
        .with_custom_field("region", "emea")
        .with_custom_field("tier", "1");
    let plan = reconciler.update(&desired, &mut state).await.unwrap();

    assert!(plan.attributes.is_empty());
    assert_eq!(plan.write_count(), 2);
}

#[tokio::test]
async fn test_create_refuses_bound_state() {
    let (server, client) = setup().await;
    Mock::given(method("POST"))
        .respond_with(ok(json!(["password added or updated", 8, "root"])))
        .expect(0)
        .mount(&server)
        .await;

    let reconciler = PasswordReconciler::new(&client, ReconcilePolicy::default());
    let mut state = PasswordState::bound(RemoteId::new(7));
    let err = reconciler
        .create(&root_at_db01("s3cret"), &mut state)
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::AlreadyBound { .. }), "got: {err:?}");
    assert_eq!(state.id(), Some(RemoteId::new(7)));
}

// ── Delete ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_delete_targets_password_endpoint() {
    let (server, client) = setup().await;
    Mock::given(method("DELETE"))
        .and(path("/api/1.0/passwords/7/"))
        .respond_with(ok(json!(["deleted"])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/1.0/devices/7/"))
        .respond_with(ok(json!(["deleted"])))
        .expect(0)
        .mount(&server)
        .await;

    let reconciler = PasswordReconciler::new(&client, ReconcilePolicy::default());
    let mut state = PasswordState::bound(RemoteId::new(7));
    let outcome = reconciler.delete(&mut state).await.unwrap();

    assert!(matches!(outcome, DeleteOutcome::Deleted));
    assert_eq!(state.lifecycle(), Lifecycle::Deleted);
}
