//! Reusable program templates bound to samples through file tags

use crate::error::{BioprovError, Result};
use crate::files::{absolutize, Directory, File, FileEntry};
use crate::parameter::{ParamKind, Parameter};
use crate::program::Program;
use crate::sample::Sample;
use indexmap::IndexMap;
use std::fmt;
use std::path::PathBuf;

/// A program whose input and output files are declared by tag.
///
/// Binding with [`PresetProgram::create_func`] resolves input tags against a
/// sample's files and registers the expected outputs in the sample before
/// anything runs. The same preset can be bound to many samples in turn; each
/// binding replaces the input and output parameters of the previous one.
#[derive(Debug, Clone)]
pub struct PresetProgram {
    pub program: Program,
    /// Name of the bound sample
    pub sample: Option<String>,
    /// flag -> file tag. An empty flag makes the path a trailing positional argument.
    pub input_files: IndexMap<String, String>,
    /// flag -> (file tag, suffix appended to the output prefix). Empty flags
    /// are positional and follow positional inputs.
    pub output_files: IndexMap<String, (String, String)>,
    /// (flag, tag, suffix) of a directory the program writes into
    pub output_dir: Option<(String, String, String)>,
    /// tag -> extension of files written inside `output_dir` as `<sample><ext>`
    pub dir_outputs: IndexMap<String, String>,
    /// Flag that receives the sample name
    pub name_flag: Option<String>,
    /// Tag of the file whose stem seeds output names
    pub preffix_tag: Option<String>,
    pub extra_flags: Vec<Parameter>,
    pub ready: bool,
}

impl PresetProgram {
    pub fn new(program: Program) -> Self {
        Self {
            program,
            sample: None,
            input_files: IndexMap::new(),
            output_files: IndexMap::new(),
            output_dir: None,
            dir_outputs: IndexMap::new(),
            name_flag: None,
            preffix_tag: None,
            extra_flags: Vec::new(),
            ready: false,
        }
    }

    /// Key of the program in sample and workflow registries (its tag)
    pub fn name(&self) -> &str {
        &self.program.tag
    }

    pub fn input<F: Into<String>, T: Into<String>>(mut self, flag: F, tag: T) -> Self {
        self.input_files.insert(flag.into(), tag.into());
        self
    }

    pub fn output<F, T, S>(mut self, flag: F, tag: T, suffix: S) -> Self
    where
        F: Into<String>,
        T: Into<String>,
        S: Into<String>,
    {
        self.output_files
            .insert(flag.into(), (tag.into(), suffix.into()));
        self
    }

    pub fn output_dir<F, T, S>(mut self, flag: F, tag: T, suffix: S) -> Self
    where
        F: Into<String>,
        T: Into<String>,
        S: Into<String>,
    {
        self.output_dir = Some((flag.into(), tag.into(), suffix.into()));
        self
    }

    /// Register `<output_dir>/<sample><extension>` under `tag` on binding
    pub fn dir_output<T: Into<String>, E: Into<String>>(mut self, tag: T, extension: E) -> Self {
        self.dir_outputs.insert(tag.into(), extension.into());
        self
    }

    pub fn name_flag<F: Into<String>>(mut self, flag: F) -> Self {
        self.name_flag = Some(flag.into());
        self
    }

    pub fn preffix_tag<T: Into<String>>(mut self, tag: T) -> Self {
        self.preffix_tag = Some(tag.into());
        self
    }

    /// Sample-independent parameter, added once
    pub fn extra_flag(mut self, param: Parameter) -> Self {
        self.add_extra_flag(param);
        self
    }

    pub fn add_extra_flag(&mut self, param: Parameter) {
        self.program.add_parameter(param.clone());
        self.extra_flags.push(param);
    }

    /// Tags of every file registered on binding
    pub fn output_tags(&self) -> impl Iterator<Item = &str> {
        self.output_files
            .values()
            .map(|(tag, _)| tag.as_str())
            .chain(self.output_dir.iter().map(|(_, tag, _)| tag.as_str()))
            .chain(self.dir_outputs.keys().map(String::as_str))
    }

    /// Whether `sample` already holds every output of this preset on disk.
    /// False for presets without outputs.
    pub fn outputs_exist(&self, sample: &Sample) -> bool {
        let mut tags = self.output_tags().peekable();
        tags.peek().is_some()
            && tags.all(|tag| sample.file(tag).map(|f| f.exists()).unwrap_or(false))
    }

    /// Bind the preset to `sample`.
    ///
    /// Every input and the output prefix are resolved first. On `TagNotFound`
    /// or `FileNotFound` neither the sample nor the preset is modified, so a
    /// failed rebind keeps the previous binding.
    pub fn create_func(&mut self, sample: &mut Sample, preffix_tag: Option<&str>) -> Result<()> {
        let preffix_tag = preffix_tag
            .map(str::to_string)
            .or_else(|| self.preffix_tag.clone());

        let mut params = Vec::with_capacity(self.input_files.len() + self.output_files.len() + 2);
        for (flag, tag) in &self.input_files {
            let file = sample.file(tag)?;
            if !file.exists() {
                return Err(BioprovError::file_not_found(file.path()));
            }
            let path = file.path().display().to_string();
            params.push(if flag.is_empty() {
                Parameter::positional(tag.clone(), path, ParamKind::Input, -1)
            } else {
                Parameter::with_kind(flag.clone(), path, ParamKind::Input).tagged(tag.clone())
            });
        }

        let prefix = match &preffix_tag {
            Some(tag) => sample.file(tag)?.stem_path(),
            None => absolutize(format!("./{}", sample.name)),
        };
        let prefix = prefix.display().to_string();

        if let Some(flag) = &self.name_flag {
            params.push(Parameter::with_kind(flag.clone(), &sample.name, ParamKind::Misc));
        }

        let mut outputs: Vec<FileEntry> = Vec::new();
        for (flag, (tag, suffix)) in &self.output_files {
            let path = format!("{}{}", prefix, suffix);
            outputs.push(File::new(&path, Some(tag.as_str())).into());
            params.push(if flag.is_empty() {
                Parameter::positional(tag.clone(), path, ParamKind::Output, -1)
            } else {
                Parameter::with_kind(flag.clone(), path, ParamKind::Output).tagged(tag.clone())
            });
        }

        if let Some((flag, tag, suffix)) = &self.output_dir {
            let dir = PathBuf::from(format!("{}{}", prefix, suffix));
            for (file_tag, extension) in &self.dir_outputs {
                let path = dir.join(format!("{}{}", sample.name, extension));
                outputs.push(File::new(&path, Some(file_tag.as_str())).into());
            }
            outputs.push(Directory::new(&dir, Some(tag.as_str())).into());
            params.push(
                Parameter::with_kind(flag.clone(), dir.display(), ParamKind::Output)
                    .tagged(tag.clone()),
            );
        }

        self.preffix_tag = preffix_tag;
        self.sample = Some(sample.name.clone());
        self.program.remove_file_params();
        self.program.add_parameters(params);
        self.program.generate_cmd();
        sample.add_files(outputs);
        sample.add_programs(self.program.clone());
        self.ready = true;
        log::debug!("Bound {} to sample {}", self.name(), sample.name);
        Ok(())
    }

    /// Run the bound program on its sample; the run is recorded on the
    /// sample's copy of the program.
    pub fn run(&mut self, sample: &mut Sample) -> Result<()> {
        if !self.ready || self.sample.as_deref() != Some(sample.name.as_str()) {
            return Err(BioprovError::invalid_input(format!(
                "{} is not bound to sample {}",
                self.program.name, sample.name
            )));
        }
        let name = self.name().to_string();
        if !sample.programs.contains_key(&name) {
            sample.add_programs(self.program.clone());
        }
        sample.run_program(&name)?;
        if let Some(bound) = sample.programs.get(&name) {
            self.program = bound.clone();
        }
        Ok(())
    }
}

impl fmt::Display for PresetProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sample {
            Some(sample) => write!(f, "Preset {} bound to {}", self.program.name, sample),
            None => write!(f, "Preset {} (unbound)", self.program.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn aligner() -> PresetProgram {
        PresetProgram::new(Program::with_path("aligner", "aligner"))
            .input("-q", "query")
            .output("-o", "hits", "_hits.tsv")
            .extra_flag(Parameter::with_kind("-t", 2, ParamKind::Misc))
    }

    #[test]
    fn test_prefix_from_tag_strips_extension() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("genome.fna");
        std::fs::write(&input, ">c\nACGT\n").unwrap();

        let mut sample = Sample::new("s1").with_files(File::new(&input, Some("assembly")));
        let mut preset = PresetProgram::new(Program::with_path("prodigal", "prodigal"))
            .input("-i", "assembly")
            .output("-a", "proteins", "_proteins.faa");
        preset.create_func(&mut sample, Some("assembly")).unwrap();

        let expected = dir.path().join("genome_proteins.faa");
        assert_eq!(sample.files["proteins"].path(), expected.as_path());
        assert!(preset.ready);
    }

    #[test]
    fn test_missing_input_fails_before_binding() {
        let mut sample = Sample::new("s1");
        let mut preset = aligner();
        let err = preset.create_func(&mut sample, None).unwrap_err();
        assert!(matches!(err, BioprovError::TagNotFound { .. }));
        assert!(!preset.ready);
        assert!(sample.files.is_empty());
        assert!(sample.programs.is_empty());
    }

    #[test]
    fn test_input_must_exist() {
        let mut sample =
            Sample::new("s1").with_files(File::new("/nonexistent/in.fna", Some("query")));
        let err = aligner().create_func(&mut sample, None).unwrap_err();
        assert!(matches!(err, BioprovError::FileNotFound { .. }));
    }

    #[test]
    fn test_positional_input() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("s1_kaiju.out");
        std::fs::write(&input, "").unwrap();

        let mut sample = Sample::new("s1").with_files(File::new(&input, Some("kaiju_output")));
        let mut preset = PresetProgram::new(Program::with_path("kaiju2table", "kaiju2table"))
            .input("", "kaiju_output")
            .output("-o", "report", "_report.tsv")
            .extra_flag(Parameter::new("-r", "phylum"));
        preset.create_func(&mut sample, None).unwrap();

        let cmd = &preset.program.cmd;
        assert!(cmd.ends_with(&input.display().to_string()));
        assert!(cmd.starts_with("kaiju2table -r phylum -o "));
    }

    #[test]
    fn test_run_requires_binding() {
        let mut sample = Sample::new("s1");
        let mut preset = aligner();
        assert!(matches!(
            preset.run(&mut sample),
            Err(BioprovError::InvalidInput { .. })
        ));
    }
}
