//! Lookout CLI - object detection and voice interaction toolkit

use clap::Parser;
use env_logger::Env;
use log::info;

use lookout::cli::{commands, Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    info!("Lookout v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(cmd) => {
            if let Err(e) = handle_command(cmd) {
                for tip in e.recovery_suggestions() {
                    eprintln!("hint: {tip}");
                }
                return Err(e.into());
            }
            Ok(())
        }
        None => {
            println!("Lookout v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands) -> lookout::Result<()> {
    match cmd {
        Commands::Detect(args) => commands::detect(&args),
        Commands::Watch(args) => commands::watch(&args),
        Commands::Transcribe(args) => commands::transcribe(&args),
        Commands::Say(args) => commands::say(&args),
        Commands::Listen(args) => commands::listen(&args),
        Commands::Engines => commands::engines(),
    }
}
