// Integration test suite: one module per control-plane feature area,
// sharing the common::TestClient for DB lifecycle management.

mod common;

mod groups;
mod messages;
mod system;
