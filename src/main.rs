mod cli;
mod commands;
mod config;
mod error;
mod inventory;
mod metrics;
mod output;

use clap::Parser;
use cli::{Cli, Commands};
use commands::{handle_collect_command, handle_post_command};
use config::Config;
use output::print_error;
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env(&cli.connection)?;

    match &cli.command {
        Commands::Collect { format } => handle_collect_command(format, &config),
        Commands::Post { api_url } => handle_post_command(api_url, &config),
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(&cli) {
        print_error(&e.to_string());
        std::process::exit(1);
    }
}
