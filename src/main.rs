use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    match args.get_command() {
        cli::Commands::Start => {
            // Tracing is initialized inside, once the configured level and format are known
            commands::start::execute(&args.config).await?;
        }
        cli::Commands::Test => {
            ops_dashboard::init_tracing("warn", "text");
            commands::test::execute(&args.config)?;
        }
        cli::Commands::Config { action } => match action {
            cli::ConfigCommands::Show => {
                ops_dashboard::init_tracing("warn", "text");
                commands::config::show(&args.config)?;
            }
        },
        cli::Commands::Version => {
            println!("Ops Dashboard v{}", env!("CARGO_PKG_VERSION"));
            println!("Rust {}", env!("CARGO_PKG_RUST_VERSION"));
        }
    }

    Ok(())
}
