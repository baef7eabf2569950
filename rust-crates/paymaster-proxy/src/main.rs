use anyhow::{
    Context,
    Result,
    anyhow,
};
use clap::Parser;
use url::Url;

mod service;

const SERVICE_URL_ENV: &str = "PAYMASTER_SERVICE_URL";

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Port to listen on; a random free port when omitted.
    #[arg(short, long)]
    port: Option<u16>,

    #[arg(short, long, default_value = "false")]
    tracing: bool,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}

async fn handle_interrupt() {
    match tokio::signal::ctrl_c().await {
        Ok(_) => tracing::info!("Received interrupt, exiting"),
        Err(_) => tracing::warn!("Received interrupt error, exiting anyway"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    if args.tracing {
        init_tracing();
    }

    let raw = std::env::var(SERVICE_URL_ENV)
        .map_err(|_| anyhow!("{SERVICE_URL_ENV} environment variable not set"))?;
    let service_url: Url = raw
        .parse()
        .with_context(|| format!("{SERVICE_URL_ENV} is not a valid URL: {raw}"))?;

    let proxy = service::PaymasterProxy::new(args.port, service_url)?;
    tracing::info!("serving sponsorship lookups at {}/api/paymaster", proxy.base_url());

    handle_interrupt().await;
    drop(proxy);
    Ok(())
}
