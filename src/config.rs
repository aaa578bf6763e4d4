//! Runtime configuration, read from command-line flags or the environment.

use clap::Args;

pub const DEFAULT_DATABASE_URL: &str = "sqlite:orderdesk.db?mode=rwc";
pub const DEFAULT_PORT: u16 = 9090;

/// Where the ledger store lives and how many connections to pool.
#[derive(Args, Debug, Clone)]
pub struct StoreConfig {
    /// Store connection string
    #[arg(
        short,
        long,
        env = "DATABASE_URL",
        default_value = DEFAULT_DATABASE_URL,
        global = true
    )]
    pub database_url: String,

    /// Maximum pooled store connections
    #[arg(long, default_value_t = 10, global = true)]
    pub max_connections: u32,
}

/// HTTP listener settings.
#[derive(Args, Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "ORDERDESK_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
}
