//! Workflows: ordered preset steps applied to every sample of a project

use crate::error::{BioprovError, Result};
use crate::preset::PresetProgram;
use crate::presets;
use crate::project::Project;
use crate::sample::Sample;
use crate::table::TableOptions;
use indexmap::IndexMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// A preset plus whether it runs unless told otherwise
#[derive(Debug, Clone)]
pub struct Step {
    pub preset: PresetProgram,
    pub default: bool,
    pub enabled: bool,
    pub description: String,
}

impl Step {
    pub fn new(preset: PresetProgram, default: bool) -> Self {
        Self {
            preset,
            default,
            enabled: default,
            description: String::new(),
        }
    }

    pub fn described<D: Into<String>>(mut self, description: D) -> Self {
        self.description = description.into();
        self
    }

    pub fn name(&self) -> &str {
        self.preset.name()
    }
}

/// Where a workflow's samples come from
#[derive(Debug, Clone)]
pub enum WorkflowInput {
    Table { path: PathBuf, options: TableOptions },
    Directory { path: PathBuf, extensions: Vec<String>, file_tag: String },
}

impl WorkflowInput {
    pub fn load(&self, tag: Option<&str>) -> Result<Project> {
        match self {
            WorkflowInput::Table { path, options } => {
                let mut options = options.clone();
                if let Some(tag) = tag {
                    options.tag = Some(tag.to_string());
                }
                Project::from_table(path, &options)
            }
            WorkflowInput::Directory {
                path,
                extensions,
                file_tag,
            } => {
                let extensions: Vec<&str> = extensions.iter().map(String::as_str).collect();
                Project::from_directory(path, &extensions, file_tag, tag)
            }
        }
    }
}

/// Outcome of running a workflow over a project
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkflowReport {
    pub total: usize,
    /// Samples whose registered files all exist after the run
    pub success: usize,
    /// Samples that could not be bound to a step
    pub skipped: usize,
}

impl fmt::Display for WorkflowReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} out of {} samples processed successfully ({} skipped)",
            self.success, self.total, self.skipped
        )
    }
}

#[derive(Debug, Clone)]
pub struct Workflow {
    pub name: String,
    pub description: String,
    pub steps: IndexMap<String, Step>,
    /// Leave steps whose outputs already exist unrun
    pub resume: bool,
}

impl Workflow {
    pub fn new<N: Into<String>, D: Into<String>>(name: N, description: D) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            steps: IndexMap::new(),
            resume: false,
        }
    }

    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.add_step(step);
        self
    }

    pub fn add_step(&mut self, step: Step) {
        let name = step.name().to_string();
        if self.steps.insert(name.clone(), step).is_some() {
            log::info!("Replaced step '{}' of workflow {}", name, self.name);
        }
    }

    fn step_mut(&mut self, name: &str) -> Result<&mut Step> {
        let workflow = self.name.clone();
        self.steps.get_mut(name).ok_or_else(|| {
            BioprovError::invalid_input(format!("workflow {} has no step '{}'", workflow, name))
        })
    }

    pub fn skip(&mut self, name: &str) -> Result<()> {
        self.step_mut(name)?.enabled = false;
        Ok(())
    }

    pub fn enable(&mut self, name: &str) -> Result<()> {
        self.step_mut(name)?.enabled = true;
        Ok(())
    }

    pub fn enabled_steps(&self) -> impl Iterator<Item = &Step> {
        self.steps.values().filter(|s| s.enabled)
    }

    /// Bind and run every enabled step on one sample, in step order.
    /// Returns whether all of the sample's files exist afterwards.
    pub fn run_sample(&mut self, sample: &mut Sample) -> Result<bool> {
        let resume = self.resume;
        for step in self.steps.values_mut().filter(|s| s.enabled) {
            step.preset.create_func(sample, None)?;
            if resume && step.preset.outputs_exist(sample) {
                log::info!(
                    "Outputs of {} for sample {} exist, not running it again",
                    step.preset.name(),
                    sample.name
                );
                continue;
            }
            step.preset.run(sample)?;
        }
        Ok(sample.files.values().all(|f| f.exists()))
    }

    /// Run the workflow on every sample of `project`, one after the other.
    /// Samples that fail to bind are skipped; other errors stop the workflow.
    pub fn run(&mut self, project: &mut Project) -> Result<WorkflowReport> {
        let names: Vec<String> = project.samples.keys().cloned().collect();
        let mut report = WorkflowReport {
            total: names.len(),
            ..WorkflowReport::default()
        };
        log::info!(
            "Running workflow {} on {} samples of project {}",
            self.name,
            report.total,
            project.tag
        );

        for name in &names {
            match project.update_sample(name, |sample| self.run_sample(sample))? {
                Ok(true) => report.success += 1,
                Ok(false) => log::warn!("Sample {} is missing expected outputs", name),
                Err(e @ BioprovError::TagNotFound { .. })
                | Err(e @ BioprovError::FileNotFound { .. }) => {
                    log::warn!("Skipping sample {}: {}", name, e);
                    report.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }
        log::info!("{}", report);
        Ok(report)
    }
}

/// Gene prediction with Prodigal on the `assembly` file of each sample.
/// Prokka annotation is available as a step that is off by default.
pub fn genome_annotation(threads: usize) -> Workflow {
    Workflow::new(
        "genome_annotation",
        "Genome annotation with Prodigal and Prokka.",
    )
    .with_step(
        Step::new(presets::prodigal("assembly"), true)
            .described("Predict genes and proteins with Prodigal"),
    )
    .with_step(
        Step::new(presets::prokka("assembly", threads), false)
            .described("Annotate the assembly with Prokka"),
    )
}

/// Nucleotide BLAST of the `query` file of each sample against `db`
pub fn blastn(db: &str) -> Result<Workflow> {
    Ok(Workflow::new("blastn", "Align nucleotide sequences to a reference database with BLASTN.")
        .with_step(Step::new(presets::blastn(db, "query", 6)?, true).described("Run BLASTN")))
}

/// Kaiju classification of the `R1`/`R2` reads of each sample, then one
/// kaiju2table report per rank in `ranks`. Resumes by default.
pub fn kaiju(
    kaijudb: &str,
    nodes: &str,
    names: &str,
    threads: usize,
    ranks: &[&str],
) -> Result<Workflow> {
    for path in [kaijudb, nodes, names] {
        if !Path::new(path).is_file() {
            return Err(BioprovError::file_not_found(path));
        }
    }
    let mut wf = Workflow::new(
        "kaiju",
        "Run Kaiju on metagenomic data and create reports for taxonomic ranks.",
    )
    .with_resume(true)
    .with_step(
        Step::new(presets::kaiju(kaijudb, nodes, threads, "R1", "R2"), true)
            .described("Classify paired-end reads with Kaiju"),
    );
    for rank in ranks {
        let report = presets::kaiju2table(rank, nodes, names, "kaiju_output")?;
        wf.add_step(Step::new(report, true).described(format!("Kaiju report at {} rank", rank)));
    }
    Ok(wf)
}

/// Names of the built-in workflows
pub const BUILTIN_WORKFLOWS: &[&str] = &["genome_annotation", "blastn", "kaiju"];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::{absolutize, File};
    use crate::parameter::Parameter;
    use crate::program::Program;
    use std::fs;
    use tempfile::TempDir;

    /// Copies the `query` file to the `copy` output with plain `cp`
    fn copy_step() -> Step {
        let preset = PresetProgram::new(Program::new("cp"))
            .input("", "query")
            .output("", "copy", "_copy.txt")
            .extra_flag(Parameter::flag("-f"));
        Step::new(preset, true)
    }

    #[test]
    fn test_skip_and_enable() {
        let mut wf = genome_annotation(2);
        assert_eq!(wf.enabled_steps().count(), 1);
        wf.skip("prodigal").unwrap();
        assert_eq!(wf.enabled_steps().count(), 0);
        wf.enable("prokka").unwrap();
        assert_eq!(wf.enabled_steps().map(|s| s.name()).collect::<Vec<_>>(), vec!["prokka"]);
        assert!(wf.skip("barrnap").is_err());
    }

    /// Kaiju reference files plus a sample with both read files
    fn kaiju_fixture(dir: &Path) -> (Vec<String>, Sample) {
        let refs: Vec<String> = ["db.fmi", "nodes.dmp", "names.dmp"]
            .iter()
            .map(|name| {
                let path = dir.join(name);
                fs::write(&path, "").unwrap();
                path.display().to_string()
            })
            .collect();
        let r1 = dir.join("s1_R1.fastq");
        let r2 = dir.join("s1_R2.fastq");
        fs::write(&r1, "@r\nACGT\n+\nIIII\n").unwrap();
        fs::write(&r2, "@r\nACGT\n+\nIIII\n").unwrap();
        let sample = Sample::new("s1").with_files(vec![
            File::new(&r1, Some("R1")),
            File::new(&r2, Some("R2")),
        ]);
        (refs, sample)
    }

    #[test]
    fn test_kaiju_binds_every_step() {
        let dir = TempDir::new().unwrap();
        let (refs, mut sample) = kaiju_fixture(dir.path());
        let mut wf = kaiju(&refs[0], &refs[1], &refs[2], 4, presets::TAXONOMIC_RANKS).unwrap();
        assert!(wf.resume);
        assert_eq!(wf.steps.len(), 1 + presets::TAXONOMIC_RANKS.len());

        let mut steps = wf.steps.values_mut();
        let classify = steps.next().unwrap();
        classify.preset.create_func(&mut sample, None).unwrap();
        assert_eq!(
            sample.files["kaiju_output"].path(),
            absolutize("./s1_kaiju.out").as_path()
        );

        // Reports read the classifier output, so it has to exist before they bind
        let kaiju_out = dir.path().join("s1_kaiju.out");
        fs::write(&kaiju_out, "").unwrap();
        sample.add_files(File::new(&kaiju_out, Some("kaiju_output")));
        for step in steps {
            step.preset.create_func(&mut sample, None).unwrap();
            assert!(step.preset.ready, "{} not bound", step.name());
        }

        assert!(sample.programs.contains_key("kaiju"));
        for rank in presets::TAXONOMIC_RANKS {
            let report = format!("kaiju_report_{}", rank);
            assert!(sample.files.contains_key(&report), "missing {}", report);
            let program = &sample.programs[&format!("kaiju2table_{}", rank)];
            assert!(program.cmd.contains(&format!("-r {}", rank)));
            assert!(program.cmd.ends_with(&kaiju_out.display().to_string()));
        }
    }

    #[test]
    fn test_kaiju_requires_reference_files() {
        let err = kaiju("/nonexistent/db.fmi", "nodes.dmp", "names.dmp", 1, &["genus"]).unwrap_err();
        assert!(matches!(err, BioprovError::FileNotFound { .. }));
    }

    #[test]
    fn test_resume_leaves_existing_outputs() {
        let dir = TempDir::new().unwrap();
        let query = dir.path().join("s1.txt");
        let copied = dir.path().join("s1_copy.txt");
        fs::write(&query, "new\n").unwrap();
        fs::write(&copied, "old\n").unwrap();

        let mut project = Project::new(Some("resumed"))
            .with_samples([Sample::new("s1").with_files(File::new(&query, Some("query")))]);
        let mut step = copy_step();
        step.preset = step.preset.preffix_tag("query");
        let mut wf = Workflow::new("copy", "Copy files").with_step(step).with_resume(true);

        let report = wf.run(&mut project).unwrap();
        assert_eq!(report.success, 1);
        assert_eq!(fs::read_to_string(&copied).unwrap(), "old\n");
        assert!(project.samples["s1"].programs["cp"].runs.is_empty());
    }

    #[test]
    fn test_run_counts_success_and_skipped() {
        let dir = TempDir::new().unwrap();
        let query = dir.path().join("s1.txt");
        fs::write(&query, "hello\n").unwrap();

        let mut project = Project::new(Some("wf")).with_samples([
            Sample::new("s1").with_files(File::new(&query, Some("query"))),
            Sample::new("s2"),
        ]);
        let mut preset_step = copy_step();
        preset_step.preset = preset_step.preset.preffix_tag("query");
        let mut wf = Workflow::new("copy", "Copy files").with_step(preset_step);

        let report = wf.run(&mut project).unwrap();
        assert_eq!(report.total, 2);
        assert_eq!(report.success, 1);
        assert_eq!(report.skipped, 1);

        let copied = dir.path().join("s1_copy.txt");
        assert_eq!(fs::read_to_string(copied).unwrap(), "hello\n");
        assert_eq!(project.samples["s1"].programs["cp"].runs.len(), 1);
    }
}
