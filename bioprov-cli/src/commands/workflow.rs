//! Workflow command implementation - run a built-in workflow over a sample table or directory

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use bioprov_core::table::delimiter_for;
use bioprov_core::workflow::{self, BUILTIN_WORKFLOWS};
use bioprov_core::{IndexCol, ParamKind, Parameter, TableOptions, Workflow, WorkflowInput};

use crate::commands::open_store;
use crate::config::Config;
use crate::error::{CliError, CliResult};

#[derive(Args, Debug, Clone)]
pub struct WorkflowArgs {
    /// Workflow to run (genome_annotation, blastn, kaiju)
    pub name: String,

    /// Sample table (CSV, or TSV by extension)
    #[arg(short, long, conflicts_with = "dir", required_unless_present = "dir")]
    pub input: Option<PathBuf>,

    /// Directory with one sequence file per sample
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// Project tag (random when omitted)
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Column holding sample ids, by name or zero-based position
    #[arg(long, default_value = "0")]
    pub index_col: String,

    /// Table columns holding input paths, one per file the workflow reads and
    /// in the same order. Defaults to columns named after those files' tags.
    #[arg(long, value_delimiter = ',')]
    pub file_col: Vec<String>,

    /// Compute sequence statistics for the input files
    #[arg(long)]
    pub import_data: bool,

    /// Extensions of sample files when reading a directory
    #[arg(long, value_delimiter = ',', default_value = "fasta,fna,fa")]
    pub extensions: Vec<String>,

    /// Steps to leave out
    #[arg(long, value_delimiter = ',')]
    pub skip: Vec<String>,

    /// Non-default steps to run
    #[arg(long, value_delimiter = ',')]
    pub run: Vec<String>,

    /// BLAST database (blastn workflow)
    #[arg(long)]
    pub db: Option<String>,

    /// Kaiju database file (kaiju workflow)
    #[arg(long)]
    pub kaiju_db: Option<String>,

    /// NCBI taxonomy nodes.dmp (kaiju workflow)
    #[arg(long)]
    pub nodes: Option<String>,

    /// NCBI taxonomy names.dmp (kaiju workflow)
    #[arg(long)]
    pub names: Option<String>,

    /// Taxonomic ranks to report (kaiju workflow)
    #[arg(long, value_delimiter = ',', default_value = "superkingdom,phylum,class,order,family,genus,species")]
    pub ranks: Vec<String>,

    /// Run steps again even when their outputs exist
    #[arg(long)]
    pub no_resume: bool,

    /// Do not write the project to the store
    #[arg(long)]
    pub no_store: bool,
}

pub fn execute(config: &Config, args: WorkflowArgs) -> Result<()> {
    log::info!("Starting workflow {}", args.name);

    let (mut workflow, input_tags) = builtin_workflow(&args, config.general.threads)?;
    for step in &args.skip {
        workflow.skip(step).map_err(CliError::from)?;
    }
    for step in &args.run {
        workflow.enable(step).map_err(CliError::from)?;
    }
    if args.no_resume {
        workflow.resume = false;
    }
    let steps: Vec<&str> = workflow.enabled_steps().map(|s| s.name()).collect();
    log::info!("Steps: {}", steps.join(", "));

    let input = workflow_input(&args, input_tags)?;
    let mut project = input.load(args.tag.as_deref()).map_err(CliError::from)?;

    if !args.no_store {
        let store = open_store(config)?;
        project.attach_store(Box::new(store));
        project.set_auto_update(config.storage.auto_update);
    }

    let report = workflow.run(&mut project).map_err(CliError::from)?;
    project.set_suppress_threshold(config.runs.suppress_stdout_over);

    if project.has_store() {
        project
            .save()
            .map_err(CliError::from)
            .with_context(|| format!("Failed to store project {}", project.tag))?;
        log::info!(
            "Project {} stored in {}",
            project.tag,
            config.storage.db_path.display()
        );
    }

    println!("{}: {}", project.tag, report);
    Ok(())
}

const ASSEMBLY_INPUT: &[&str] = &["assembly"];
const QUERY_INPUT: &[&str] = &["query"];
const PAIRED_READS: &[&str] = &["R1", "R2"];

fn required<'a>(value: &'a Option<String>, flag: &str, workflow: &str) -> CliResult<&'a str> {
    value
        .as_deref()
        .ok_or_else(|| CliError::validation(format!("the {} workflow requires {}", workflow, flag)))
}

/// Built-in workflow by name, with the file tags its steps read from each sample
pub fn builtin_workflow(
    args: &WorkflowArgs,
    threads: usize,
) -> CliResult<(Workflow, &'static [&'static str])> {
    match args.name.as_str() {
        "genome_annotation" => Ok((workflow::genome_annotation(threads), ASSEMBLY_INPUT)),
        "blastn" => {
            let db = required(&args.db, "--db", "blastn")?;
            let mut wf = workflow::blastn(db)?;
            if let Some(step) = wf.steps.get_mut("blastn") {
                step.preset
                    .add_extra_flag(Parameter::with_kind("-num_threads", threads, ParamKind::Misc));
            }
            Ok((wf, QUERY_INPUT))
        }
        "kaiju" => {
            let kaijudb = required(&args.kaiju_db, "--kaiju-db", "kaiju")?;
            let nodes = required(&args.nodes, "--nodes", "kaiju")?;
            let names = required(&args.names, "--names", "kaiju")?;
            let ranks: Vec<&str> = args.ranks.iter().map(String::as_str).collect();
            let wf = workflow::kaiju(kaijudb, nodes, names, threads, &ranks)?;
            Ok((wf, PAIRED_READS))
        }
        other => Err(CliError::unknown_workflow(other, BUILTIN_WORKFLOWS)),
    }
}

/// Samples come from a table, with `--file-col` columns registered under
/// `input_tags` in order, or from a directory for single-input workflows.
fn workflow_input(args: &WorkflowArgs, input_tags: &[&str]) -> CliResult<WorkflowInput> {
    if args.file_col.len() > input_tags.len() {
        return Err(CliError::validation(format!(
            "workflow {} reads {} file(s) per sample ({}) but {} columns were given",
            args.name,
            input_tags.len(),
            input_tags.join(", "),
            args.file_col.len()
        )));
    }

    if let Some(path) = &args.input {
        if !path.exists() {
            return Err(CliError::file_not_found(path.clone()));
        }
        let index_col = match args.index_col.parse::<usize>() {
            Ok(pos) => IndexCol::Position(pos),
            Err(_) => IndexCol::Name(args.index_col.clone()),
        };
        let mut options = TableOptions::for_path(path).index_col(index_col);
        for (i, tag) in input_tags.iter().enumerate() {
            let column = args.file_col.get(i).map(String::as_str).unwrap_or(*tag);
            options = if args.import_data {
                options.seqfile_col_as(column, *tag)
            } else {
                options.file_col_as(column, *tag)
            };
        }
        options.import_data = args.import_data;
        log::debug!(
            "Reading {} with delimiter {:?}",
            path.display(),
            delimiter_for(path) as char
        );
        return Ok(WorkflowInput::Table {
            path: path.clone(),
            options,
        });
    }

    let file_tag = match input_tags {
        [tag] => *tag,
        _ => {
            return Err(CliError::validation(format!(
                "workflow {} reads {} per sample; use --input with a sample table",
                args.name,
                input_tags.join(" and ")
            )))
        }
    };
    match &args.dir {
        Some(dir) if dir.is_dir() => Ok(WorkflowInput::Directory {
            path: dir.clone(),
            extensions: args.extensions.clone(),
            file_tag: file_tag.to_string(),
        }),
        Some(dir) => Err(CliError::file_not_found(dir.clone())),
        None => Err(CliError::validation("either --input or --dir is required")),
    }
}
