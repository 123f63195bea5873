//! Quill command line interface
//!
//! Lowers JSON-encoded syntax trees to the typed IR and runs them

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod check;
mod compiler;
mod config;
mod convert;
mod logging;
mod run;

use config::QuillConfig;

#[derive(Parser)]
#[command(name = "quill")]
#[command(about = "Lower and run Quill syntax trees", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lower a syntax tree and report the first error
    Check {
        /// JSON file holding the syntax tree
        input: PathBuf,

        /// Print the lowered IR
        #[arg(long)]
        dump_ir: bool,

        /// Configuration file (defaults to quill.toml next to the input)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Lower a syntax tree and run one of its functions
    Run {
        /// JSON file holding the syntax tree
        input: PathBuf,

        /// Function to run (overrides `[run] entry`)
        #[arg(long)]
        entry: Option<String>,

        /// Argument for the entry function, as JSON; repeat per parameter
        #[arg(long = "arg", value_name = "JSON")]
        args: Vec<String>,

        /// Configuration file (defaults to quill.toml next to the input)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            input,
            dump_ir,
            config,
        } => {
            let config = QuillConfig::load(&input, config.as_deref())?;
            logging::init(&config.log.level);
            check::check(&input, &config, dump_ir)?;
        }
        Commands::Run {
            input,
            entry,
            args,
            config,
        } => {
            let config = QuillConfig::load(&input, config.as_deref())?;
            logging::init(&config.log.level);
            run::run(&input, &config, entry.as_deref(), &args)?;
        }
    }

    Ok(())
}
