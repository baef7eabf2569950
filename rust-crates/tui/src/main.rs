use color_eyre::eyre::{
    Result,
    eyre,
};
use tracing_subscriber::EnvFilter;

mod cache;
mod client;
mod gateway;
mod ui;
mod wallets;

fn print_usage_and_exit() -> ! {
    println!(
        "Usage: haiku-tui [--gateway-url <url>] [--wallet <name>] [--wallet-dir <path>]\n\
         [--chain-id <id>]\n\
         \n\
         Flags:\n\
           --gateway-url <url> Wallet gateway endpoint (default {})\n\
           --wallet <name>     Keystore file to unlock (without .json)\n\
           --wallet-dir <path> Override keystore directory (defaults to ~/.haiku/keystores)\n\
           --chain-id <id>     Chain the haiku contract lives on (default {})",
        client::DEFAULT_GATEWAY_URL,
        client::DEFAULT_CHAIN_ID,
    );
    std::process::exit(0);
}

fn parse_cli_args() -> Result<client::AppConfig> {
    let mut args = std::env::args().skip(1);
    let mut gateway_url: Option<String> = None;
    let mut wallet_dir: Option<String> = None;
    let mut wallet_name: Option<String> = None;
    let mut chain_id: Option<u64> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--gateway-url" => {
                let url = args
                    .next()
                    .ok_or_else(|| eyre!("--gateway-url requires a URL argument"))?;
                if gateway_url.is_some() {
                    return Err(eyre!("--gateway-url may only be specified once"));
                }
                gateway_url = Some(url);
            }
            "--wallet" => {
                let name = args
                    .next()
                    .ok_or_else(|| eyre!("--wallet requires a wallet name"))?;
                if wallet_name.is_some() {
                    return Err(eyre!("--wallet may only be specified once"));
                }
                wallet_name = Some(name);
            }
            "--wallet-dir" => {
                let dir = args
                    .next()
                    .ok_or_else(|| eyre!("--wallet-dir requires a path argument"))?;
                if wallet_dir.is_some() {
                    return Err(eyre!("--wallet-dir may only be specified once"));
                }
                wallet_dir = Some(dir);
            }
            "--chain-id" => {
                let raw = args
                    .next()
                    .ok_or_else(|| eyre!("--chain-id requires a numeric argument"))?;
                if chain_id.is_some() {
                    return Err(eyre!("--chain-id may only be specified once"));
                }
                let id = raw
                    .parse::<u64>()
                    .map_err(|_| eyre!("--chain-id must be a number, got '{raw}'"))?;
                chain_id = Some(id);
            }
            "--help" | "-h" => print_usage_and_exit(),
            other => return Err(eyre!("Unknown argument: {other}")),
        }
    }

    Ok(client::AppConfig {
        gateway_url: gateway_url
            .unwrap_or_else(|| client::DEFAULT_GATEWAY_URL.to_string()),
        wallet: wallet_name,
        wallet_dir,
        chain_id: chain_id.unwrap_or(client::DEFAULT_CHAIN_ID),
    })
}

/// Logs go to a file under `.haiku/`; the terminal belongs to the UI.
fn init_tracing() -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let appender = tracing_appender::rolling::daily(cache::CACHE_ROOT, "haiku-tui.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let _guard = init_tracing()?;
    tracing::info!("starting haiku client");
    let app_config = parse_cli_args()?;
    client::run_app(app_config).await
}
