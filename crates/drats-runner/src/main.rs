use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use drats_runner::{clear_locks, init_logging, install_stop_handler, list_ports, monitor, Config, RunnerResult, Station};

#[derive(Parser)]
#[command(name = "drats", author, version, about = "D-RATS station runner")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "drats.yaml")]
    config: PathBuf,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured ports
    Ports,

    /// Print raw traffic received on a port
    Monitor {
        port: String,

        /// Stop after this many reads
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },

    /// Route queued outgoing messages
    Route {
        /// Keep routing until interrupted
        #[arg(short, long)]
        watch: bool,
    },

    /// Winlink 2000 mail
    Wl2k {
        #[command(subcommand)]
        command: Wl2kCommands,
    },

    /// Message lock maintenance
    Locks {
        #[command(subcommand)]
        command: LockCommands,
    },
}

#[derive(Subcommand)]
enum Wl2kCommands {
    /// Download our mail into the inbox
    Fetch,

    /// Send one stored message
    Send {
        file: PathBuf,

        /// Winlink address, defaults to the message destination
        #[arg(long)]
        to: Option<String>,
    },
}

#[derive(Subcommand)]
enum LockCommands {
    /// Remove every lock file in the store
    Clear,
}

fn run(cli: Cli) -> RunnerResult<()> {
    let config = Config::load(&cli.config)?;
    drats_metrics::describe_metrics();
    tracing::debug!(config = %cli.config.display(), callsign = %config.callsign, "Loaded configuration");

    match cli.command {
        Commands::Ports => list_ports(&config),
        Commands::Monitor { port, count } => {
            let running = install_stop_handler()?;
            monitor(&config, &port, count, &running)
        }
        Commands::Route { watch: false } => Station::build(&config)?.route_once(),
        Commands::Route { watch: true } => {
            let running = install_stop_handler()?;
            Station::build(&config)?.route_watch(&running)
        }
        Commands::Wl2k { command } => {
            let mut station = Station::build(&config)?;
            match command {
                Wl2kCommands::Fetch => station.wl2k_fetch(),
                Wl2kCommands::Send { file, to } => station.wl2k_send(&file, to.as_deref()),
            }
        }
        Commands::Locks {
            command: LockCommands::Clear,
        } => clear_locks(&config),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
