pub mod codec;
pub mod config;
pub mod db;
pub mod error;
pub mod group;
pub mod ids;
pub mod models;
pub mod registry;
pub mod relay;
pub mod router;
pub mod routes;
pub mod session;
pub mod signaling;

use config::{FanoutPolicy, RelayConfig};
use db::Store;
use registry::Registry;
use relay::Relay;
use rocket_cors::CorsOptions;
use std::sync::Arc;

/// Assemble the Rocket instance: managed [`Relay`] state, CORS (LAN clients
/// are expected to come from arbitrary origins, same as the teacher's
/// default-permissive `CorsOptions`), the websocket session route, and the
/// control-plane REST surface (§4.H). Grounded in the teacher's
/// `build_rocket` (src/lib.rs), generalized from `Db`/`EventBus`/etc as
/// five separate managed values to the single `Arc<Relay>` bundle every
/// handler here actually needs.
pub fn build_relay(config: &RelayConfig) -> rocket::Rocket<rocket::Build> {
    if let Some(parent) = std::path::Path::new(&config.db_path).parent() {
        std::fs::create_dir_all(parent).ok();
    }

    let store = Arc::new(Store::open(&config.db_path));
    let registry = Arc::new(Registry::new());
    let relay = Relay::new(store, registry);

    let cors = CorsOptions::default().to_cors().expect("failed to build CORS layer");

    if config.fanout_policy != FanoutPolicy::Synchronous {
        tracing::warn!(
            policy = ?config.fanout_policy,
            "fan-out back-pressure policy is not yet implemented; falling back to synchronous delivery"
        );
    }

    let mut figment = rocket::Config::figment()
        .merge(("address", config.address.clone()))
        .merge(("port", config.port));
    if let (Some(cert), Some(key)) = (&config.tls_cert, &config.tls_key) {
        figment = figment.merge(("tls.certs", cert.clone())).merge(("tls.key", key.clone()));
    }

    rocket::custom(figment)
        .manage(relay)
        .attach(cors)
        .register("/", rocket::catchers![routes::not_found])
        .mount(
            "/",
            rocket::routes![
                session::connect,
                routes::health,
                routes::stats,
                routes::mint_id,
                routes::global_presence,
                routes::presence_probe,
                routes::direct_history,
                routes::purge_conversation,
                routes::create_group,
                routes::get_group,
                routes::list_groups,
                routes::list_members,
                routes::add_members,
                routes::group_messages,
                routes::admin_action,
                routes::leave_group,
            ],
        )
}
