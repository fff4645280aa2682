// Direct-message history and purge are exercised by seeding the store
// directly (the websocket session route isn't reachable over the blocking
// test client) and then driving the control-plane REST surface against it.

use crate::common::test_client;
use endpoint_relay::db::Store;
use endpoint_relay::models::{DeliveryStatus, DirectMessageRecord};
use rocket::http::Status;

fn seed(db_path: &str, id: &str, from: &str, to: &str) {
    let store = Store::open(db_path);
    store.insert_direct_message(&DirectMessageRecord {
        id: id.to_string(),
        from_id: from.to_string(),
        to_id: to.to_string(),
        content: "hello".to_string(),
        reply_to: None,
        timestamp: 1,
        delivered: false,
        read_status: false,
        status: DeliveryStatus::Sent,
    });
}

#[test]
fn direct_history_returns_participant_range() {
    let client = test_client();
    seed(client.db_path(), "m1", "A", "B");
    seed(client.db_path(), "m2", "A", "C");

    let res = client.get("/api/messages/A").dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: Vec<serde_json::Value> = res.into_json().unwrap();
    assert_eq!(body.len(), 2);
}

#[test]
fn purge_removes_only_the_named_pair() {
    let client = test_client();
    seed(client.db_path(), "m1", "A", "B");
    seed(client.db_path(), "m2", "A", "C");

    let res = client.delete("/api/messages/A/B").dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["success"], true);

    let res = client.get("/api/messages/A").dispatch();
    let body: Vec<serde_json::Value> = res.into_json().unwrap();
    assert_eq!(body.len(), 1);
    assert_eq!(body[0]["id"], "m2");
}
