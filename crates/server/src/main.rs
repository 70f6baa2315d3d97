use clap::{Parser, Subcommand};
use migration::{Migrator, MigratorTrait};
use sea_orm::Database;
use sleep_notifications::AppResources;
use sleep_notifications::api::start_webserver;
use sleep_notifications::config::load_config_from;
use sleep_notifications::notifications::{NotificationStore, backfill_all, verify_backfill};
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(
    name = "sleep-notifications",
    version,
    about = "Notification preferences and delivery history service"
)]
struct Cli {
    /// Path to the YAML configuration file (optional, environment overrides apply)
    #[arg(long, default_value = "config.yaml")]
    config: String,

    /// Apply pending database migrations before running the command
    #[arg(long)]
    migrate: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Create default preferences for every user from their legacy settings
    Backfill,
    /// Check that every user has the default preferences
    Verify,
}

fn initialize_standard_tracing() {
    let default_directives = "sleep_notifications=info,sea_orm=info,tower_http=info";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer().with_target(true).with_level(true);

    registry.with(layer).init();
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    initialize_standard_tracing();

    let cli = Cli::parse();
    let config = Arc::new(load_config_from(&cli.config)?);

    let db = Arc::new(Database::connect(&config.database_url).await?);

    if cli.migrate {
        tracing::info!("Applying pending migrations");
        Migrator::up(db.as_ref(), None).await?;
    }

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            tracing::info!(
                min_interval_minutes = config.notifications.min_interval_minutes,
                history_limit = config.notifications.history_limit,
                max_send_retries = config.notifications.max_send_retries,
                "notification configuration"
            );
            let resources = AppResources { db, config };
            start_webserver(resources).await?;
        }
        Command::Backfill => {
            let store = NotificationStore::new(db);
            let report = backfill_all(&store).await?;
            tracing::info!(
                migrated = report.migrated,
                errors = report.errors,
                "Backfill finished"
            );
            if report.errors > 0 {
                color_eyre::eyre::bail!("{} users could not be migrated", report.errors);
            }
        }
        Command::Verify => {
            let store = NotificationStore::new(db);
            let report = verify_backfill(&store).await?;
            tracing::info!(
                users = report.total_users,
                preferences = report.total_preferences,
                expected = report.expected(),
                "Verification finished"
            );
            if !report.passed() {
                color_eyre::eyre::bail!(
                    "expected {} preferences, found {}",
                    report.expected(),
                    report.total_preferences
                );
            }
        }
    }

    Ok(())
}
