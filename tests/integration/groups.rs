use crate::common::{create_test_group, test_client};
use rocket::http::{ContentType, Status};

#[test]
fn create_group_seats_creator_as_admin_and_seeds_members() {
    let client = test_client();
    let group_id = create_test_group(&client, "crew", "A", &["B", "C"]);

    let res = client.get(format!("/api/groups/{group_id}")).dispatch();
    assert_eq!(res.status(), Status::Ok);
    let body: serde_json::Value = res.into_json().unwrap();
    assert_eq!(body["memberCount"], 3);

    let res = client.get(format!("/api/groups/{group_id}/members")).dispatch();
    let members: Vec<serde_json::Value> = res.into_json().unwrap();
    assert_eq!(members.len(), 3);
}

#[test]
fn add_members_requires_existing_non_banned_member() {
    let client = test_client();
    let group_id = create_test_group(&client, "crew", "A", &[]);

    let res = client
        .post(format!("/api/groups/{group_id}/members"))
        .header(ContentType::JSON)
        .body(r#"{"userIds": ["D"], "addedBy": "stranger"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Forbidden);

    let res = client
        .post(format!("/api/groups/{group_id}/members"))
        .header(ContentType::JSON)
        .body(r#"{"userIds": ["D"], "addedBy": "A"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::NoContent);
}

#[test]
fn non_admin_cannot_mute_another_member() {
    let client = test_client();
    let group_id = create_test_group(&client, "crew", "A", &["B"]);

    let res = client
        .post(format!("/api/groups/{group_id}/admin"))
        .header(ContentType::JSON)
        .body(r#"{"performedBy": "B", "targetUserId": "A", "action": "mute"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::Forbidden);
}

#[test]
fn leave_guard_rejects_sole_admin_while_others_remain() {
    let client = test_client();
    let group_id = create_test_group(&client, "crew", "A", &["B"]);

    let res = client
        .post(format!("/api/groups/{group_id}/leave"))
        .header(ContentType::JSON)
        .body(r#"{"userId": "A"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::BadRequest);
    let body: serde_json::Value = res.into_json().unwrap();
    assert!(body["error"].as_str().unwrap().contains("only admin"));
}

#[test]
fn banning_sole_admin_is_rejected() {
    let client = test_client();
    let group_id = create_test_group(&client, "crew", "A", &["B"]);

    let res = client
        .post(format!("/api/groups/{group_id}/admin"))
        .header(ContentType::JSON)
        .body(r#"{"performedBy": "A", "targetUserId": "A", "action": "ban"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::BadRequest);

    let member = client.get(format!("/api/groups/{group_id}/members")).dispatch();
    let members: Vec<serde_json::Value> = member.into_json().unwrap();
    assert!(members.iter().any(|m| m["userId"] == "A" && m["isBanned"] == false));
}

#[test]
fn ban_then_unban_round_trips_membership() {
    let client = test_client();
    let group_id = create_test_group(&client, "crew", "A", &["B"]);

    let res = client
        .post(format!("/api/groups/{group_id}/admin"))
        .header(ContentType::JSON)
        .body(r#"{"performedBy": "A", "targetUserId": "B", "action": "ban"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::NoContent);

    let res = client.get(format!("/api/groups/{group_id}/members")).dispatch();
    let members: Vec<serde_json::Value> = res.into_json().unwrap();
    assert_eq!(members.len(), 1);

    let res = client
        .post(format!("/api/groups/{group_id}/admin"))
        .header(ContentType::JSON)
        .body(r#"{"performedBy": "A", "targetUserId": "B", "action": "unban"}"#)
        .dispatch();
    assert_eq!(res.status(), Status::NoContent);

    let res = client.get(format!("/api/groups/{group_id}/members")).dispatch();
    let members: Vec<serde_json::Value> = res.into_json().unwrap();
    assert_eq!(members.len(), 2);
}

#[test]
fn member_listing_reports_offline_without_a_live_session() {
    let client = test_client();
    let group_id = create_test_group(&client, "crew", "A", &["B"]);

    let res = client.get(format!("/api/groups/{group_id}/members")).dispatch();
    let members: Vec<serde_json::Value> = res.into_json().unwrap();
    assert!(members.iter().all(|m| m["online"] == false));
}

#[test]
fn group_history_requires_membership() {
    let client = test_client();
    let group_id = create_test_group(&client, "crew", "A", &["B"]);

    let res = client
        .get(format!("/api/groups/{group_id}/messages?userId=stranger"))
        .dispatch();
    assert_eq!(res.status(), Status::Forbidden);

    let res = client
        .get(format!("/api/groups/{group_id}/messages?userId=A"))
        .dispatch();
    assert_eq!(res.status(), Status::Ok);
}

#[test]
fn banned_member_cannot_fetch_group_history() {
    let client = test_client();
    let group_id = create_test_group(&client, "crew", "A", &["B"]);
    client
        .post(format!("/api/groups/{group_id}/admin"))
        .header(ContentType::JSON)
        .body(r#"{"performedBy": "A", "targetUserId": "B", "action": "ban"}"#)
        .dispatch();

    let res = client
        .get(format!("/api/groups/{group_id}/messages?userId=B"))
        .dispatch();
    assert_eq!(res.status(), Status::Forbidden);
}
