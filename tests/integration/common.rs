use endpoint_relay::config::RelayConfig;
use rocket::local::blocking::Client;

/// Wrapper around `Client` that auto-deletes the temp sqlite file (and its
/// WAL/SHM siblings) on drop, mirroring the teacher's `TestClient`
/// (tests/integration/common.rs) — avoids accumulating throwaway db files
/// across test runs.
pub struct TestClient {
    client: Option<Client>,
    db_path: String,
}

impl Drop for TestClient {
    fn drop(&mut self) {
        drop(self.client.take());
        let _ = std::fs::remove_file(&self.db_path);
        let _ = std::fs::remove_file(format!("{}-wal", self.db_path));
        let _ = std::fs::remove_file(format!("{}-shm", self.db_path));
    }
}

impl std::ops::Deref for TestClient {
    type Target = Client;
    fn deref(&self) -> &Client {
        self.client.as_ref().unwrap()
    }
}

impl TestClient {
    pub fn db_path(&self) -> &str {
        &self.db_path
    }
}

pub fn test_client() -> TestClient {
    let db_path = format!(
        "/tmp/relay_test_{}.db",
        uuid::Uuid::new_v4().to_string().split('-').next().unwrap()
    );
    let config = RelayConfig {
        address: "127.0.0.1".to_string(),
        port: 0,
        db_path: db_path.clone(),
        log_filter: "off".to_string(),
        tls_cert: None,
        tls_key: None,
        fanout_policy: endpoint_relay::config::FanoutPolicy::Synchronous,
    };
    let rocket = endpoint_relay::build_relay(&config);
    let client = Client::tracked(rocket).expect("valid rocket instance");
    TestClient { client: Some(client), db_path }
}

/// Create a group via the control plane and return its id.
pub fn create_test_group(client: &Client, name: &str, created_by: &str, initial_members: &[&str]) -> String {
    use rocket::http::ContentType;
    let members = initial_members
        .iter()
        .map(|m| format!("\"{m}\""))
        .collect::<Vec<_>>()
        .join(",");
    let res = client
        .post("/api/groups")
        .header(ContentType::JSON)
        .body(format!(
            r#"{{"name": "{name}", "createdBy": "{created_by}", "initialMembers": [{members}]}}"#
        ))
        .dispatch();
    let body: serde_json::Value = res.into_json().unwrap();
    body["id"].as_str().unwrap().to_string()
}
