//! CLI command implementations.
//!
//! | Module   | Commands handled |
//! |----------|------------------|
//! | `serve`  | `Serve`          |
//! | `init`   | `Init`           |
//! | `config` | `Config`         |

pub mod config;
pub mod init;
pub mod serve;

pub use config::cmd_config;
pub use init::cmd_init;
pub use serve::cmd_serve;

use anyhow::Result;
use mini_notion::config::Config;

use super::Cli;

/// Config file (or defaults) with environment overrides applied.
fn effective_config(cli: &Cli) -> Result<Config> {
    Config::resolve(&cli.config)
}
