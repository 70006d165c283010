mod access;
mod config;
mod crypto;
mod error;
mod gateway;
mod kv;
mod otp;
mod phone;
mod providers;
mod ratelimit;
mod sms;
mod token;

use anyhow::Result;
use clap::Parser;

use config::Config;

/// Edge authentication and LLM proxy gateway.
#[derive(Parser, Debug)]
#[command(name = "varco", version, about)]
struct Cli {
    /// Address to bind.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8787)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "varco=info,tower_http=warn".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    gateway::run_gateway(&cli.host, cli.port, config).await
}
