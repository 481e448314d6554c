use clap::Parser;
use hairlink_core::cli::{Cli, Commands, DbCommands, HairdresserCommands, LedgerCommands};
use hairlink_core::config::Config;
use hairlink_core::{cli, create_app, db, AppState};
use std::net::SocketAddr;
use std::path::Path;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Config => cli::handle_config_validate(&config),
        Commands::Hairdresser(HairdresserCommands::Approve { id }) => {
            let pool = db::create_pool(&config).await?;
            cli::handle_hairdresser_approve(&pool, id).await
        }
        Commands::Ledger(LedgerCommands::Approve { tx_id }) => {
            let pool = db::create_pool(&config).await?;
            cli::handle_ledger_approve(&pool, &config, tx_id).await
        }
    }
}

fn init_tracing() {
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let pool = db::create_pool(&config).await?;
    db::run_migrations(&pool, Path::new(db::MIGRATIONS_DIR)).await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let state = AppState::new(pool, config)?;
    let app = create_app(state);

    tracing::info!("listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
