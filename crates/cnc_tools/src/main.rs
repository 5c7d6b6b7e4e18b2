//! CnC Lockstep - Development Tools

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cnc_tools::error::Result;
use cnc_tools::{inspect, simulate, track_dump, validate};

#[derive(Parser)]
#[command(name = "cnc-tools")]
#[command(about = "Development tools for the CnC lockstep simulation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario headless and print a summary
    Simulate {
        /// Scenario RON file
        scenario: PathBuf,
        /// Frames to run (defaults to the scenario's length)
        #[arg(short, long)]
        frames: Option<u32>,
        /// Write a replay of the run
        #[arg(long)]
        replay: Option<PathBuf>,
        /// Write a save of the final world
        #[arg(long)]
        save: Option<PathBuf>,
    },
    /// Print drive track control entries
    Tracks {
        /// Control entry number (all when omitted)
        number: Option<usize>,
        /// Show the short tracks used when starting from rest
        #[arg(long)]
        short: bool,
    },
    /// Play a replay and check it reproduces the recorded result
    VerifyReplay {
        /// Replay file
        path: PathBuf,
    },
    /// Summarize a save file
    InspectSave {
        /// Save file
        path: PathBuf,
    },
    /// Validate data files
    Validate {
        /// Path to data directory
        #[arg(default_value = "data")]
        path: PathBuf,
    },
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Simulate {
            scenario,
            frames,
            replay,
            save,
        } => {
            tracing::info!("Simulating {}", scenario.display());
            let summary = simulate::simulate_file(&scenario, frames, replay.as_deref(), save.as_deref())?;
            println!("{summary}");
        }
        Commands::Tracks { number, short } => {
            let stdout = std::io::stdout();
            track_dump::dump_tracks(&mut stdout.lock(), number, short)?;
        }
        Commands::VerifyReplay { path } => {
            let summary = inspect::verify_replay(&path)?;
            println!("{summary}");
        }
        Commands::InspectSave { path } => {
            let summary = inspect::inspect_save(&path)?;
            print!("{summary}");
        }
        Commands::Validate { path } => {
            tracing::info!("Validating data files in: {}", path.display());
            let files = validate::validate_data_directory(&path)?;
            tracing::info!(files, "Validation passed");
        }
    }
    Ok(())
}

fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli.command) {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}
