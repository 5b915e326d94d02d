//! UTDRS CLI main entry point

use anyhow::Result;
use clap::Parser;
use utdrs_api::AppConfig;
use utdrs_cli::{
    commands::{Cli, CommandExecutor},
    logging::init_tracing,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ファイル → 環境変数 (UTDRS_*) の順で上書き
    let config = AppConfig::load(cli.config.as_deref())?;
    init_tracing(&config.logging)?;

    let executor = CommandExecutor::new(config);
    let result = executor.execute(cli.command).await?;

    if !result.success {
        eprintln!("{}", result.message);
        if let Some(partial) = result.data {
            eprintln!("Partial result: {}", serde_json::to_string_pretty(&partial)?);
        }
    }

    // Exit with appropriate code
    if result.success {
        std::process::exit(0);
    } else {
        std::process::exit(1);
    }
}
