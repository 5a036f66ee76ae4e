use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::collections::BTreeMap;

use sessionstore::cli::{Cli, Command};
use sessionstore::config::Config;
use sessionstore::{FileStore, KvStore};

fn setup_logging() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Warn)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    let store_path = cli.store.unwrap_or(config.store_path);

    info!("sessionstore opening {}", store_path.display());
    let mut store = FileStore::open(&store_path).context("Failed to open store")?;

    match cli.command {
        Command::Get { keys } => {
            let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
            let values = store.get(&refs)?;
            for key in &keys {
                match values.get(key) {
                    Some(value) => println!("{} {}", key.cyan(), serde_json::to_string(value)?),
                    None => println!("{} {}", key.cyan(), "(missing)".dimmed()),
                }
            }
        }
        Command::Set { key, value } => {
            let parsed = serde_json::from_str(&value).unwrap_or(serde_json::Value::String(value));
            store.set(BTreeMap::from([(key.clone(), parsed)]))?;
            println!("{} Set {}", "✓".green(), key);
        }
        Command::Remove { key } => {
            store.remove(&key)?;
            println!("{} Removed {}", "✓".green(), key);
        }
        Command::List => {
            let keys = store.keys()?;
            if keys.is_empty() {
                println!("No keys found");
            } else {
                for key in keys {
                    println!("{}", key);
                }
            }
        }
    }

    Ok(())
}
