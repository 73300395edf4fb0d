use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod error;

use commands::project::ExportFormat;
use commands::workflow::WorkflowArgs;
use config::Config;
use error::{print_error_and_exit, CliError};

#[derive(Parser)]
#[command(name = "bioprov")]
#[command(about = "BioProv - provenance tracking for bioinformatics pipelines")]
#[command(version)]
#[command(long_about = "
BioProv runs command-line bioinformatics tools over sets of samples and records
what was run, on which files, by whom and with what result.

Examples:
  bioprov workflow genome_annotation --input samples.csv --tag ecoli_assemblies
  bioprov workflow genome_annotation --input samples.csv --file-col contigs --run prokka
  bioprov workflow blastn --dir reads/ --db /data/blast/nt --skip blastn
  bioprov workflow kaiju --input reads.tsv --index-col sample-id --kaiju-db kaiju.fmi --nodes nodes.dmp --names names.dmp
  bioprov list
  bioprov show ecoli_assemblies
  bioprov export ecoli_assemblies --format tsv
  bioprov config --example > bioprov.toml
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a built-in workflow over every sample of a table or directory
    Workflow(WorkflowArgs),

    /// List projects in the store
    List,

    /// Show the samples, files and runs of a stored project
    Show {
        /// Project tag
        tag: String,
    },

    /// Export a stored project as JSON or as a sample table
    Export {
        /// Project tag
        tag: String,

        /// Output format
        #[arg(short, long, default_value = "json")]
        format: ExportFormat,

        /// Output file (defaults to ./<tag>.<format>)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print or write configuration
    Config {
        /// Print an example configuration
        #[arg(long)]
        example: bool,

        /// Print the effective configuration
        #[arg(long)]
        show: bool,

        /// Write the configuration (or the example, with --example) to a file
        #[arg(long)]
        write: Option<PathBuf>,
    },
}

fn setup_logging(verbose: u8, quiet: bool) -> Result<()> {
    if quiet {
        std::env::set_var("RUST_LOG", "error");
    } else {
        let level = match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        std::env::set_var("RUST_LOG", level);
    }

    env_logger::Builder::from_default_env()
        .format_timestamp_secs()
        .init();

    Ok(())
}

fn dispatch(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Workflow(args) => commands::workflow::execute(config, args),
        Commands::List => commands::project::list(config),
        Commands::Show { tag } => commands::project::show(config, &tag),
        Commands::Export { tag, format, output } => {
            commands::project::export(config, &tag, format, output)
        }
        Commands::Config { example, show, write } => {
            commands::config::execute(config, example, show, write)
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet)?;

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => print_error_and_exit(&CliError::config(format!("{:#}", err))),
    };

    if let Err(err) = dispatch(cli.command, &config) {
        if let Some(cli_err) = err.downcast_ref::<CliError>() {
            print_error_and_exit(cli_err);
        }
        return Err(err);
    }

    Ok(())
}
