//! External program descriptors and command assembly

use crate::error::{BioprovError, Result};
use crate::parameter::{render_params, ParamKind, Parameter};
use crate::run::Run;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::process::Command;

/// An external binary with an ordered set of parameters and its execution history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ProgramDoc")]
pub struct Program {
    pub name: String,
    pub tag: String,
    pub path: PathBuf,
    pub found: bool,
    pub version: Option<String>,
    pub cmd: String,
    pub param_str: String,
    pub params: IndexMap<String, Parameter>,
    #[serde(rename = "_runs")]
    pub runs: IndexMap<String, Run>,
}

impl Program {
    /// Resolve `name` on `$PATH`. A missing binary is recorded, not an error.
    pub fn new<N: Into<String>>(name: N) -> Self {
        let name = name.into();
        let (path, found) = match which::which(&name) {
            Ok(path) => (path, true),
            Err(_) => {
                log::debug!("Program '{}' not found on $PATH", name);
                (PathBuf::from(&name), false)
            }
        };
        Self::build(name, path, found)
    }

    /// Use an explicit binary location instead of a `$PATH` lookup
    pub fn with_path<N: Into<String>, P: Into<PathBuf>>(name: N, path: P) -> Self {
        let path = path.into();
        let found = path.is_file() || which::which(&path).is_ok();
        Self::build(name.into(), path, found)
    }

    fn build(name: String, path: PathBuf, found: bool) -> Self {
        let mut program = Self {
            tag: name.clone(),
            name,
            path,
            found,
            version: None,
            cmd: String::new(),
            param_str: String::new(),
            params: IndexMap::new(),
            runs: IndexMap::new(),
        };
        program.generate_cmd();
        program
    }

    pub fn tagged<T: Into<String>>(mut self, tag: T) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn with_params<I: IntoIterator<Item = Parameter>>(mut self, params: I) -> Self {
        self.add_parameters(params);
        self
    }

    /// Add a parameter under its key. An existing parameter with the same key
    /// is replaced in place and keeps its position.
    pub fn add_parameter(&mut self, param: Parameter) {
        if let Some(previous) = self.params.get(&param.key) {
            log::info!(
                "Replacing parameter '{}' of {} ('{}' -> '{}')",
                param.key,
                self.name,
                previous.cmd_string,
                param.cmd_string
            );
        }
        self.params.insert(param.key.clone(), param);
        self.generate_cmd();
    }

    pub fn add_parameters<I: IntoIterator<Item = Parameter>>(&mut self, params: I) {
        for param in params {
            self.add_parameter(param);
        }
    }

    pub fn remove_parameter(&mut self, key: &str) -> Option<Parameter> {
        let removed = self.params.shift_remove(key);
        if removed.is_some() {
            self.generate_cmd();
        }
        removed
    }

    /// Drop every input and output parameter, keeping misc ones
    pub fn remove_file_params(&mut self) {
        self.params.retain(|_, p| !p.kind.is_file());
        self.generate_cmd();
    }

    pub fn params_of_kind(&self, kind: ParamKind) -> impl Iterator<Item = &Parameter> {
        self.params.values().filter(move |p| p.kind == kind)
    }

    /// Re-derive `param_str` and `cmd` from the current parameters
    pub fn generate_cmd(&mut self) -> &str {
        self.param_str = render_params(&self.params);
        self.cmd = format!("{} {}", self.path.display(), self.param_str)
            .trim()
            .to_string();
        &self.cmd
    }

    /// Execute the current command and record the run under the next index
    pub fn run(&mut self, sample: Option<&str>) -> Result<&Run> {
        if !self.found {
            return Err(BioprovError::ProgramNotFound {
                program: self.name.clone(),
            });
        }
        self.generate_cmd();

        let mut run = Run::new(&self.name, &self.cmd, sample);
        run.run()?;

        let key = (self.runs.len() + 1).to_string();
        self.runs.insert(key.clone(), run);
        self.runs
            .get(&key)
            .ok_or_else(|| BioprovError::invalid_input(format!("run '{}' was not recorded", key)))
    }

    pub fn last_run(&self) -> Option<&Run> {
        self.runs.values().last()
    }

    /// Run `<path> --version` and keep the first non-empty output line
    pub fn detect_version(&mut self) -> Option<&str> {
        if !self.found {
            return None;
        }
        let output = match Command::new(&self.path).arg("--version").output() {
            Ok(output) => output,
            Err(e) => {
                log::debug!("Could not query version of {}: {}", self.name, e);
                return None;
            }
        };
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let line = stdout
            .lines()
            .chain(stderr.lines())
            .map(str::trim)
            .find(|l| !l.is_empty())?
            .to_string();
        self.version = Some(line);
        self.version.as_deref()
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Program '{}' with command '{}'", self.name, self.cmd)
    }
}

/// Persisted shape of a program. Parameters are replayed on load so the
/// command is rebuilt from them.
#[derive(Deserialize)]
struct ProgramDoc {
    name: String,
    #[serde(default)]
    tag: Option<String>,
    #[serde(default)]
    path: Option<PathBuf>,
    #[serde(default)]
    found: bool,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    params: IndexMap<String, Parameter>,
    #[serde(default, rename = "_runs")]
    runs: IndexMap<String, Run>,
}

impl From<ProgramDoc> for Program {
    fn from(doc: ProgramDoc) -> Self {
        let path = doc
            .path
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from(&doc.name));
        let mut program = Program::build(doc.name, path, doc.found);
        if let Some(tag) = doc.tag {
            program.tag = tag;
        }
        program.version = doc.version;
        for (_, mut param) in doc.params {
            if param.tag.is_empty() {
                param.tag = param.key.clone();
            }
            if param.cmd_string.is_empty() {
                param.rerender();
            }
            program.params.insert(param.key.clone(), param);
        }
        program.generate_cmd();
        program.runs = doc.runs;
        for run in program.runs.values_mut() {
            if run.program.is_empty() {
                run.program = program.name.clone();
            }
        }
        program
    }
}

/// Programs accepted by `add_programs`: a single program, a list, or a mapping
pub enum ProgramInput {
    Single(Program),
    List(Vec<Program>),
    Map(IndexMap<String, Program>),
}

impl ProgramInput {
    /// Singles and list entries are keyed by program tag, which defaults to the name
    pub fn into_map(self) -> IndexMap<String, Program> {
        match self {
            ProgramInput::Single(p) => {
                let mut map = IndexMap::new();
                map.insert(p.tag.clone(), p);
                map
            }
            ProgramInput::List(list) => list.into_iter().map(|p| (p.tag.clone(), p)).collect(),
            ProgramInput::Map(map) => map,
        }
    }
}

impl From<Program> for ProgramInput {
    fn from(p: Program) -> Self {
        ProgramInput::Single(p)
    }
}

impl From<Vec<Program>> for ProgramInput {
    fn from(list: Vec<Program>) -> Self {
        ProgramInput::List(list)
    }
}

impl From<IndexMap<String, Program>> for ProgramInput {
    fn from(map: IndexMap<String, Program>) -> Self {
        ProgramInput::Map(map)
    }
}
