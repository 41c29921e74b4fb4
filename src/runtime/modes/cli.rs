//! CLI mode
//!
//! One-shot commands operating directly on the data directory.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use colored::Colorize;

use crate::cli::{Commands, ConfigCommands};
use crate::config::StaticConfig;
use crate::errors::SafelinkError;
use crate::runtime::lifetime::startup::build_classifier;
use crate::services::{LinkService, Resolution};
use crate::storage::{Health, Store};
use crate::system::DataDirLock;

fn colored_health(health: Health) -> String {
    match health {
        Health::Ok => health.as_str().green().to_string(),
        Health::Unknown => health.as_str().yellow().to_string(),
        Health::Phishing | Health::Malware => health.as_str().red().bold().to_string(),
    }
}

/// Run CLI mode
pub async fn run_cli(command: Commands, config: &StaticConfig) -> Result<()> {
    match command {
        Commands::Serve => super::run_serve(config).await,
        Commands::Shorten { url, json } => shorten(config, &url, json).await,
        Commands::Resolve { code, json } => resolve(config, &code, json),
        Commands::Config {
            action: ConfigCommands::Generate { output_path, force },
        } => config_generate(output_path, force),
    }
}

async fn shorten(config: &StaticConfig, url: &str, json: bool) -> Result<()> {
    let _lock = DataDirLock::acquire(&config.storage.data_dir)
        .context("Failed to lock data directory")?;

    let classifier = Arc::new(build_classifier(config)?);
    let store = Arc::new(Store::open(&config.storage));
    let service = LinkService::new(store, classifier);

    let (shortened, health) = match service.shorten_and_classify(url).await {
        Ok(result) => result,
        Err(e) => {
            eprintln!("{}", e.format_colored());
            return Err(e.into());
        }
    };

    if json {
        let out = serde_json::json!({
            "code": shortened.code().as_str(),
            "address": shortened.record.address(),
            "created": shortened.created,
            "health": health,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if shortened.created {
        println!(
            "{} Shortened: {} -> {} [{}]",
            "✓".bold().green(),
            shortened.code().as_str().cyan(),
            shortened.record.address().blue().underline(),
            colored_health(health)
        );
    } else {
        println!(
            "{} Already shortened: {} -> {} [{}]",
            "ℹ".bold().blue(),
            shortened.code().as_str().cyan(),
            shortened.record.address().blue().underline(),
            colored_health(health)
        );
    }
    Ok(())
}

fn resolve(config: &StaticConfig, code: &str, json: bool) -> Result<()> {
    let store = Arc::new(Store::open(&config.storage));
    let classifier = Arc::new(build_classifier(config)?);
    let service = LinkService::new(store, classifier);

    let resolution = service.resolve(code);
    if json {
        println!("{}", serde_json::to_string_pretty(&resolution.summary())?);
        return Ok(());
    }

    match &resolution {
        Resolution::Redirect(record) => println!(
            "{} {} -> {} [{}]",
            "→".bold().green(),
            record.code().as_str().cyan(),
            record.address().blue().underline(),
            colored_health(record.health())
        ),
        Resolution::Blocked(record, health) => println!(
            "{} {} -> {} [{}]",
            "✗".bold().red(),
            record.code().as_str().cyan(),
            record.address().dimmed(),
            colored_health(*health)
        ),
        Resolution::NotFound => {
            let err = SafelinkError::validation(format!("Short code not found: {}", code));
            eprintln!("{}", err.format_colored());
            bail!("short code not found");
        }
    }
    Ok(())
}

/// Generate example configuration file
fn config_generate(output_path: Option<String>, force: bool) -> Result<()> {
    let path = output_path.unwrap_or_else(|| "config.example.toml".to_string());

    if !force && Path::new(&path).exists() {
        println!(
            "{} {} {}",
            "File already exists:".yellow(),
            path.blue(),
            "(use --force to overwrite)".yellow()
        );
        bail!("refusing to overwrite {}", path);
    }

    StaticConfig::default()
        .save_to_file(&path)
        .with_context(|| format!("Unable to write configuration file {}", path))?;

    println!(
        "  {} {}",
        "Configuration file generated successfully".green(),
        path.blue()
    );
    Ok(())
}
