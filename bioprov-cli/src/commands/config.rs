//! Config command implementation - print or write configuration files

use anyhow::Result;
use std::path::PathBuf;

use crate::config::{Config, DEFAULT_CONFIG_FILE};

pub fn execute(config: &Config, example: bool, show: bool, write: Option<PathBuf>) -> Result<()> {
    if let Some(path) = write {
        let target = if example { Config::default() } else { config.clone() };
        target.save_to_file(&path)?;
        log::info!("Configuration written to {}", path.display());
        return Ok(());
    }

    if example {
        println!("# Example {}", DEFAULT_CONFIG_FILE);
        print!("{}", Config::example_toml()?);
    } else if show {
        print!("{}", config.to_toml()?);
    } else {
        println!("Use --example to print a sample configuration or --show for the effective one");
    }
    Ok(())
}
