//! proctor CLI: take a timed assessment from the terminal.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "proctor", version, about = "Timed assessment client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Take the assessment
    Take {
        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,

        /// Assessment server base URL (overrides config)
        #[arg(long)]
        api_base: Option<String>,

        /// Candidate name; skips the name prompt
        #[arg(long)]
        name: Option<String>,

        /// Directory for the results file (overrides config)
        #[arg(long)]
        export_dir: Option<PathBuf>,

        /// Advance to the next question immediately after answering
        #[arg(long)]
        no_feedback_delay: bool,
    },

    /// Show the server's assessment configuration
    Check {
        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,

        /// Assessment server base URL (overrides config)
        #[arg(long)]
        api_base: Option<String>,
    },

    /// Summarise an exported results file
    Show {
        /// Path to an interview_results_*.json file
        file: PathBuf,
    },

    /// Create a starter proctor.toml
    Init,
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so they never interleave with the assessment screen.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("proctor=warn")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Take {
            config,
            api_base,
            name,
            export_dir,
            no_feedback_delay,
        } => {
            commands::take::execute(commands::take::TakeArgs {
                config,
                api_base,
                name,
                export_dir,
                no_feedback_delay,
            })
            .await
        }
        Commands::Check { config, api_base } => commands::check::execute(config, api_base).await,
        Commands::Show { file } => commands::show::execute(file),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
