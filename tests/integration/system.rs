use crate::common::test_client;
use rocket::http::Status;

#[test]
fn health_reports_ok() {
    let client = test_client();
    let res = client.get("/api/health").dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "endpoint-relay");
}

#[test]
fn stats_starts_at_zero() {
    let client = test_client();
    let res = client.get("/api/stats").dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["direct_messages"], 0);
    assert_eq!(body["groups"], 0);
    assert_eq!(body["online_sessions"], 0);
}

#[test]
fn mint_id_returns_four_char_uppercase_alphanumeric() {
    let client = test_client();
    let res = client.get("/api/generate-id").dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    let id = body["id"].as_str().unwrap();
    assert_eq!(id.len(), 4);
    assert!(id.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
}

#[test]
fn presence_probe_reports_offline_for_unknown_id() {
    let client = test_client();
    let res = client.get("/api/status/ZZZZ").dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["online"], false);
}
