//! Project commands - list, show and export projects held in the store

use anyhow::{Context, Result};
use clap::ValueEnum;
use std::fmt::Write as _;
use std::path::PathBuf;

use bioprov_core::{DocumentStore, Project};

use crate::commands::{load_project, open_store};
use crate::config::Config;
use crate::error::CliError;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
    Tsv,
}

/// Print the tag and sample count of every stored project
pub fn list(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let tags = store.list().map_err(CliError::from)?;
    if tags.is_empty() {
        log::info!("No projects in {}", config.storage.db_path.display());
        return Ok(());
    }
    for tag in tags {
        match Project::load(&store, &tag) {
            Ok(Some(project)) => println!("{}\t{} samples", tag, project.len()),
            Ok(None) => {}
            Err(e) => log::warn!("Could not load project {}: {}", tag, e),
        }
    }
    Ok(())
}

pub fn show(config: &Config, tag: &str) -> Result<()> {
    let project = load_project(config, tag)?;
    print!("{}", describe(&project));
    Ok(())
}

/// Write a stored project as JSON or as a sample table
pub fn export(
    config: &Config,
    tag: &str,
    format: ExportFormat,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut project = load_project(config, tag)?;
    let path = match format {
        ExportFormat::Json => project.to_json(output.as_deref()),
        ExportFormat::Csv => project.to_csv(output.as_deref(), b','),
        ExportFormat::Tsv => project.to_csv(output.as_deref(), b'\t'),
    }
    .map_err(CliError::from)
    .with_context(|| format!("Failed to export project {}", tag))?;

    println!("{}", path.display());
    Ok(())
}

/// Human-readable summary of a project, its samples, files and runs
pub fn describe(project: &Project) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Project {} ({} samples)", project.tag, project.len());
    let _ = writeln!(out, "  sha1: {}", project.sha1);
    for (tag, file) in &project.files {
        let _ = writeln!(out, "  file {}: {}", tag, file.path().display());
    }

    for sample in project.samples.values() {
        let _ = writeln!(out, "  sample {}", sample.name);
        for (tag, file) in &sample.files {
            let status = if file.exists() { "" } else { " (missing)" };
            let _ = writeln!(out, "    file {}: {}{}", tag, file.path().display(), status);
        }
        for program in sample.programs.values() {
            match program.last_run() {
                Some(run) => {
                    let exit = run
                        .exit_code
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "-".to_string());
                    let _ = writeln!(
                        out,
                        "    program {}: {} runs, last {} (exit {})",
                        program.name,
                        program.runs.len(),
                        run.status(),
                        exit
                    );
                }
                None => {
                    let _ = writeln!(out, "    program {}: not run", program.name);
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use bioprov_core::{File, Program, Run, Sample};

    #[test]
    fn test_describe_lists_samples_and_runs() {
        let mut program = Program::with_path("prodigal", "/usr/bin/prodigal");
        let mut run = Run::new("prodigal", "/usr/bin/prodigal -i a.fna", Some("s1"));
        run.finished = true;
        run.exit_code = Some(0);
        program.runs.insert("1".to_string(), run);

        let mut sample = Sample::new("s1").with_files(File::new("/nonexistent/a.fna", Some("assembly")));
        sample.add_programs(program);
        let project = Project::new(Some("demo")).with_samples([sample, Sample::new("s2")]);

        let text = describe(&project);
        assert!(text.starts_with("Project demo (2 samples)"));
        assert!(text.contains("file assembly: /nonexistent/a.fna (missing)"));
        assert!(text.contains("program prodigal: 1 runs, last Finished (exit 0)"));
        assert!(text.contains("sample s2"));
    }
}
