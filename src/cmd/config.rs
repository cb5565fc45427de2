//! Configuration view and bootstrap commands: `mini-notion config`.

use anyhow::{Context, Result, bail};

use mini_notion::config::Config;

use super::super::{Cli, ConfigCommands};

pub fn cmd_config(cli: &Cli, command: Option<ConfigCommands>) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            let config = super::effective_config(cli)?;

            println!();
            println!("Mini Notion Configuration");
            println!("=========================");
            println!();
            if cli.config.exists() {
                println!("Config file: {}", cli.config.display());
            } else {
                println!("No config file at {} (using defaults)", cli.config.display());
            }
            println!("Effective values (with env overrides):");
            println!();

            let rendered =
                toml::to_string_pretty(&config).context("Failed to render configuration")?;
            println!("{}", rendered);

            let warnings = config.validate();
            if !warnings.is_empty() {
                println!("Warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
        }
        Some(ConfigCommands::Init { force }) => {
            if cli.config.exists() && !force {
                bail!(
                    "{} already exists (use --force to overwrite)",
                    cli.config.display()
                );
            }
            Config::default().save(&cli.config)?;
            println!("Created {}", cli.config.display());
        }
    }
    Ok(())
}
