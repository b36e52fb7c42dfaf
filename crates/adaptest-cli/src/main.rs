//! adaptest CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "adaptest", version, about = "Computerized adaptive testing engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulated batch of adaptive sessions
    Simulate {
        /// Path to the .toml item bank
        #[arg(long)]
        bank: PathBuf,

        /// Number of simulated examinees
        #[arg(long)]
        examinees: Option<usize>,

        /// Max concurrent sessions
        #[arg(long)]
        parallelism: Option<usize>,

        /// Seed for abilities, answers and random selection
        #[arg(long)]
        seed: Option<u64>,

        /// Estimation method: EAP, MLE, MAP
        #[arg(long)]
        estimation: Option<String>,

        /// Selection method: MFI, KL, RANDOM
        #[arg(long)]
        selection: Option<String>,

        /// Output directory
        #[arg(long)]
        output: Option<PathBuf>,

        /// Output format: json, html, all
        #[arg(long, default_value = "json")]
        format: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,

        /// Seed exposure rates from a previous batch report
        #[arg(long)]
        prior: Option<PathBuf>,
    },

    /// Validate item bank TOML files
    Validate {
        /// Path to item bank file or directory
        #[arg(long)]
        bank: PathBuf,
    },

    /// Print session reports from a saved batch report
    Report {
        /// Batch report JSON
        #[arg(long)]
        input: PathBuf,

        /// Only report this examinee
        #[arg(long)]
        examinee: Option<String>,

        /// Also write an HTML report to this path
        #[arg(long)]
        html: Option<PathBuf>,
    },

    /// Create starter config and example item bank
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("adaptest=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Simulate {
            bank,
            examinees,
            parallelism,
            seed,
            estimation,
            selection,
            output,
            format,
            config,
            prior,
        } => {
            commands::simulate::execute(commands::simulate::SimulateArgs {
                bank,
                examinees,
                parallelism,
                seed,
                estimation,
                selection,
                output,
                format,
                config,
                prior,
            })
            .await
        }
        Commands::Validate { bank } => commands::validate::execute(bank),
        Commands::Report {
            input,
            examinee,
            html,
        } => commands::report::execute(input, examinee, html),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
