// Auction terminal client entry point.
//
// `auction console` startup sequence:
// 1. Initialize tracing (log to file, not terminal)
// 2. Load config
// 3. Build the HTTP gateway and the broadcaster
// 4. Spawn the broadcast hub task
// 5. Spawn the controller task
// 6. Run the console TUI until the operator quits
// 7. Cleanup on exit
//
// `auction projector` follows the hub of a running console.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{error, info};

use auction_console::client::ApiClient;
use auction_console::tui;
use auction_core::broadcast::Broadcaster;
use auction_core::config::{self, Config};
use auction_core::controller::{self, Controller};
use auction_core::hub;
use auction_core::session::AuctionSession;

#[derive(Parser, Debug)]
#[command(name = "auction", about = "Live cricket auction console and projector", version)]
struct Cli {
    /// Directory containing config/auction.toml
    #[arg(long, default_value = ".", env = "AUCTION_HOME")]
    home: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the operator console and host the projector broadcast
    Console {
        /// API base URL (overrides [console].api_url)
        #[arg(long, env = "AUCTION_API_URL")]
        api_url: Option<String>,
    },
    /// Show the live auction from a running console's broadcast
    Projector {
        /// Broadcast hub URL (defaults to the configured [broadcast] address)
        #[arg(long, env = "AUCTION_HUB_URL")]
        url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_name = match cli.command {
        Command::Console { .. } => "auction-console.log",
        Command::Projector { .. } => "auction-projector.log",
    };
    init_tracing(log_name)?;

    for created in config::ensure_config_files(&cli.home).context("failed to create configuration")? {
        info!("Created {} from defaults", created.display());
    }
    let config = config::load_config_from(&cli.home).context("failed to load configuration")?;
    info!(
        "Config loaded: api={}, broadcast={}",
        config.console.api_url,
        config.broadcast.url()
    );

    match cli.command {
        Command::Console { api_url } => run_console(config, api_url).await,
        Command::Projector { url } => run_projector(config, url).await,
    }
}

async fn run_console(config: Config, api_url: Option<String>) -> anyhow::Result<()> {
    info!("Auction console starting up");

    let client = ApiClient::new(api_url.unwrap_or_else(|| config.console.api_url.clone()))
        .context("failed to create API client")?;
    info!("Using API at {}", client.base_url());
    let broadcaster = Broadcaster::new();

    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (ui_tx, ui_rx) = mpsc::channel(256);

    let hub_handle = {
        let broadcaster = broadcaster.clone();
        let host = config.broadcast.host.clone();
        let port = config.broadcast.port;
        tokio::spawn(async move {
            if let Err(e) = hub::run(&host, port, broadcaster).await {
                error!("Broadcast hub error on {host}:{port}: {e}");
            }
        })
    };

    let controller = Controller::new(
        AuctionSession::new(config.rules.clone()),
        Arc::new(client),
        broadcaster,
    );
    let app_handle = tokio::spawn(async move {
        if let Err(e) = controller::run(cmd_rx, ui_tx, controller).await {
            error!("Controller loop error: {e}");
        }
    });

    if let Err(e) = tui::console::run(ui_rx, cmd_tx, config.rules.clone()).await {
        error!("Console TUI error: {e}");
    }

    let _ = tokio::time::timeout(Duration::from_secs(5), async {
        let _ = app_handle.await;
    })
    .await;

    hub_handle.abort();

    info!("Auction console shut down cleanly");
    Ok(())
}

async fn run_projector(config: Config, url: Option<String>) -> anyhow::Result<()> {
    let url = url.unwrap_or_else(|| config.broadcast.url());
    info!("Projector following {url}");

    let (tx, rx) = mpsc::channel(16);
    let feed_handle = tokio::spawn(tui::projector::follow_hub(url, tx));

    if let Err(e) = tui::projector::run(rx, config.rules.countdown_secs).await {
        error!("Projector TUI error: {e}");
    }

    feed_handle.abort();
    info!("Projector shut down");
    Ok(())
}

/// Log to a file; the terminal belongs to the TUI.
fn init_tracing(file_name: &str) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join(file_name))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("auction_core=info,auction_console=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
