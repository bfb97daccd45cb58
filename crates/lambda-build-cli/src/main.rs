mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lambda_build_core::BuildKind;

#[derive(Parser)]
#[command(
    name = "lambda-build",
    about = "Build dependency layers and function packages for serverless Python projects"
)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    overrides: commands::Overrides,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the builds configured in pyproject.toml
    Build,
    /// Build the dependency layer only
    Layer {
        /// Write the artifact here instead of the configured path
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
    /// Build the function code package only
    Function {
        /// Write the artifact here instead of the configured path
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
    /// Build dependencies and project code into one package
    Package {
        /// Write the artifact here instead of the configured path
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
    /// Print the resolved build parameters
    Config {
        /// Print JSON instead of TOML
        #[arg(long)]
        json: bool,
    },
    /// Check that the required tools are installed
    Doctor,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let overrides = cli.overrides;

    match cli.command {
        Commands::Build => commands::build(&overrides)?,
        Commands::Layer { output } => commands::build_one(&overrides, BuildKind::Layer, output)?,
        Commands::Function { output } => {
            commands::build_one(&overrides, BuildKind::Function, output)?
        }
        Commands::Package { output } => {
            commands::build_one(&overrides, BuildKind::Package, output)?
        }
        Commands::Config { json } => commands::show_config(&overrides, json)?,
        Commands::Doctor => commands::doctor(&overrides)?,
    }

    Ok(())
}
