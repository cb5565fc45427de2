//! Database bootstrap command: `mini-notion init`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use mini_notion::backend::db::NotionDb;
use mini_notion::logging;

use super::super::Cli;

pub fn cmd_init(cli: &Cli, db_path: Option<PathBuf>) -> Result<()> {
    let config = super::effective_config(cli)?;
    let db_path = db_path.unwrap_or(config.database.path);
    logging::init(&config.logging.filter, config.logging.log_format(), cli.verbose)?;

    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    NotionDb::new(&db_path).context("Failed to initialize database")?;
    info!(db = %db_path.display(), "Schema ready");

    println!("Database initialized at {}", db_path.display());
    Ok(())
}
