//! Process configuration (§4.H ambient concerns). Grounded in the pack's
//! clap-derive idiom (sblanchard-SerialAgent, iwismer-rusty-timer both
//! parse a `#[derive(Parser)]` struct with `#[arg(env = ...)]` fallbacks),
//! generalized from the teacher's raw `env::var(...).unwrap_or_else(...)`
//! calls scattered across `src/lib.rs` into one struct parsed once at
//! startup.

use clap::{Parser, ValueEnum};

/// Fan-out back-pressure policy (§9 Open Question: "expose the policy as
/// configuration"). `Synchronous` is the source/spec-default behavior
/// implemented throughout this crate — every push is a direct, serialized
/// write awaited by the caller. `BoundedQueueDrop` names the alternative the
/// spec describes (a bounded per-session outbound queue with a drop policy)
/// for operators who want to select it; the queue itself is not built, so
/// selecting it currently falls back to `Synchronous` with a startup warning
/// rather than silently behaving as if it were implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FanoutPolicy {
    Synchronous,
    BoundedQueueDrop,
}

#[derive(Debug, Parser)]
#[command(name = "endpoint-relay", about = "Real-time messaging relay")]
pub struct RelayConfig {
    /// Address to bind the listener to.
    #[arg(long, env = "RELAY_ADDRESS", default_value = "0.0.0.0")]
    pub address: String,

    /// Port to bind the listener to.
    #[arg(long, env = "RELAY_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Path to the sqlite database file.
    #[arg(long, env = "RELAY_DB_PATH", default_value = "data/relay.db")]
    pub db_path: String,

    /// Log filter passed to `tracing_subscriber::EnvFilter`.
    #[arg(long, env = "RELAY_LOG", default_value = "info")]
    pub log_filter: String,

    /// TLS certificate chain (PEM). Requires `tls_key`; secure transport is
    /// optional and provided by the process launcher otherwise (§6 "Exit and
    /// configuration").
    #[arg(long, env = "RELAY_TLS_CERT")]
    pub tls_cert: Option<String>,

    /// TLS private key (PEM). Requires `tls_cert`.
    #[arg(long, env = "RELAY_TLS_KEY")]
    pub tls_key: Option<String>,

    /// Fan-out back-pressure policy for group/receipt delivery (§9 Open
    /// Question).
    #[arg(long, env = "RELAY_FANOUT_POLICY", value_enum, default_value = "synchronous")]
    pub fanout_policy: FanoutPolicy,
}

impl RelayConfig {
    pub fn load() -> Self {
        RelayConfig::parse()
    }
}
