use config::{Config, File};
use sea_orm_migration::prelude::*;
use std::env;

/// Reads `database_url` from the service configuration file.
fn database_url_from_config(path: &str) -> Result<String, String> {
    let settings = Config::builder()
        .add_source(File::with_name(path).required(false))
        .build()
        .map_err(|e| format!("Failed to read {path}: {e}"))?;
    settings
        .get_string("database_url")
        .map_err(|_| format!("DATABASE_URL is not set and {path} has no database_url"))
}

#[tokio::main]
async fn main() {
    // DATABASE_URL wins; otherwise fall back to the service configuration so both
    // binaries point at the same database.
    if env::var("DATABASE_URL").is_err() {
        match database_url_from_config("config.yaml") {
            Ok(url) => env::set_var("DATABASE_URL", url),
            Err(message) => {
                eprintln!("{message}");
                std::process::exit(1);
            }
        }
    }
    cli::run_cli(migration::Migrator).await;
}
