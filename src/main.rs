use anyhow::Result;
use clap::Parser;

use safelink::cli::{Cli, Commands};
use safelink::config::{StaticConfig, init_config};
use safelink::runtime::modes;
use safelink::system::logging::init_logging;

#[cfg(feature = "cli")]
async fn dispatch(command: Commands, config: &StaticConfig) -> Result<()> {
    modes::run_cli(command, config).await
}

#[cfg(not(feature = "cli"))]
async fn dispatch(command: Commands, config: &StaticConfig) -> Result<()> {
    let Commands::Serve = command;
    modes::run_serve(config).await
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Serve);

    let config = init_config(cli.config.as_deref());

    // 一次性命令只输出警告以上的日志，避免干扰命令输出
    let mut logging = config.logging.clone();
    if !command.is_serve() {
        logging.level = "warn".to_string();
    }
    let _guard = init_logging(&logging)?;

    dispatch(command, &config).await
}
