// Auction API server entry point.
//
// Startup sequence:
// 1. Initialize tracing (stdout)
// 2. Load config, creating config/auction.toml from defaults if missing
// 3. Open the database
// 4. Serve the API until Ctrl+C

use anyhow::Context;
use tracing::info;

use auction_core::config;
use auction_core::db::Database;
use auction_server::ApiServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;
    info!("Auction server starting up");

    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: bind={}, database={}, uploads={}",
        config.server.bind, config.db_path, config.storage.uploads_dir
    );

    let db = Database::open(&config.db_path).context("failed to open database")?;
    info!("Database opened at {}", config.db_path);

    ApiServer::new(&config, db).start().await
}

fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("auction_core=info,auction_server=info,tower_http=info,warn")
        }))
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
