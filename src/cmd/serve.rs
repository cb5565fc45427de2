//! HTTP API command: `mini-notion serve`.

use std::path::PathBuf;

use anyhow::Result;
use tracing::warn;

use mini_notion::backend::server;
use mini_notion::logging;

use super::super::Cli;

pub async fn cmd_serve(cli: &Cli, port: Option<u16>, db_path: Option<PathBuf>, dev: bool) -> Result<()> {
    let mut config = super::effective_config(cli)?;
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(path) = db_path {
        config.database.path = path;
    }

    logging::init(&config.logging.filter, config.logging.log_format(), cli.verbose)?;
    for warning in config.validate() {
        warn!("{}", warning);
    }

    server::start_server(config.to_server_config(dev)).await
}
