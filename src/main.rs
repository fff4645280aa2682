use endpoint_relay::config::RelayConfig;

#[rocket::main]
async fn main() {
    let config = RelayConfig::load();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(config.log_filter.clone()))
        .init();

    if let Err(error) = endpoint_relay::build_relay(&config).launch().await {
        tracing::error!(%error, "server terminated");
        std::process::exit(1);
    }
}
