pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use dealroom_core::config::{AppConfig, LoadOptions, LogFormat};

#[derive(Debug, Parser)]
#[command(
    name = "dealroom",
    about = "Dealroom operator CLI",
    long_about = "Inspect configuration, apply migrations, preview payment schedules, and replay a booking negotiation.",
    after_help = "Examples:\n  dealroom config\n  dealroom schedule --price 90000\n  dealroom simulate --in-memory"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Print the effective configuration with the source of each value")]
    Config,
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Split a finalized price into the booking, pre-event and final slabs")]
    Schedule {
        #[arg(long, help = "Agreed price, e.g. 90000 or 1250.50")]
        price: String,
    },
    #[command(about = "Replay a full customer-vendor negotiation through the booking service")]
    Simulate {
        #[arg(long, help = "Use an in-memory store instead of the configured database")]
        in_memory: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Command::Config => commands::config::run(),
        Command::Migrate => commands::migrate::run(),
        Command::Schedule { price } => commands::schedule::run(&price),
        Command::Simulate { in_memory } => commands::simulate::run(in_memory),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logs go to stderr so stdout stays a single JSON document.
fn init_logging() {
    use tracing::Level;

    let (level, format) = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => (
            config.logging.level.parse::<Level>().unwrap_or(Level::INFO),
            config.logging.format,
        ),
        Err(_) => (Level::WARN, LogFormat::Compact),
    };

    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .with_writer(std::io::stderr);
    let initialized = match format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if let Err(error) = initialized {
        eprintln!("logging already initialized: {error}");
    }
}
