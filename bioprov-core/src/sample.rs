//! Samples: named entities owning files, programs and attributes

use crate::error::{BioprovError, Result};
use crate::files::{File, FileEntry, FileInput};
use crate::program::{Program, ProgramInput};
use crate::serialization::{write_json, DocumentRef};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};

/// Replace whitespace so names are usable in file names and commands
pub(crate) fn sanitize(name: &str) -> String {
    name.trim().replace(char::is_whitespace, "_")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SampleDoc")]
pub struct Sample {
    pub name: String,
    pub tag: String,
    pub files: IndexMap<String, FileEntry>,
    pub programs: IndexMap<String, Program>,
    pub attributes: IndexMap<String, Value>,
    /// Tag of the owning project
    pub project: Option<String>,
}

/// Persisted shape of a sample. Older documents write a null `tag` and keep
/// programs under `_programs`.
#[derive(Deserialize)]
struct SampleDoc {
    name: String,
    #[serde(default)]
    tag: Option<String>,
    #[serde(default)]
    files: IndexMap<String, FileEntry>,
    #[serde(default, alias = "_programs")]
    programs: IndexMap<String, Program>,
    #[serde(default)]
    attributes: IndexMap<String, Value>,
    #[serde(default)]
    project: Option<String>,
}

impl From<SampleDoc> for Sample {
    fn from(doc: SampleDoc) -> Self {
        Self {
            tag: doc.tag.unwrap_or_else(|| doc.name.clone()),
            name: doc.name,
            files: doc.files,
            programs: doc.programs,
            attributes: doc.attributes,
            project: doc.project,
        }
    }
}

impl Sample {
    pub fn new<N: AsRef<str>>(name: N) -> Self {
        let name = sanitize(name.as_ref());
        Self {
            tag: name.clone(),
            name,
            files: IndexMap::new(),
            programs: IndexMap::new(),
            attributes: IndexMap::new(),
            project: None,
        }
    }

    pub fn tagged<T: Into<String>>(mut self, tag: T) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn with_files<F: Into<FileInput>>(mut self, files: F) -> Self {
        self.add_files(files);
        self
    }

    pub fn with_attribute<K: Into<String>, V: Into<Value>>(mut self, key: K, value: V) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Merge files into the registry, replacing entries that share a tag
    pub fn add_files<F: Into<FileInput>>(&mut self, files: F) {
        for (tag, entry) in files.into().into_map() {
            if let Some(previous) = self.files.insert(tag.clone(), entry) {
                log::info!(
                    "Replaced file '{}' of sample {} (was {})",
                    tag,
                    self.name,
                    previous
                );
            } else {
                log::debug!("Added file '{}' to sample {}", tag, self.name);
            }
        }
    }

    /// Merge programs into the registry, replacing programs that share a tag
    pub fn add_programs<P: Into<ProgramInput>>(&mut self, programs: P) {
        for (name, program) in programs.into().into_map() {
            if self.programs.insert(name.clone(), program).is_some() {
                log::info!("Replaced program '{}' of sample {}", name, self.name);
            } else {
                log::debug!("Added program '{}' to sample {}", name, self.name);
            }
        }
    }

    pub fn remove_file(&mut self, tag: &str) -> Option<FileEntry> {
        self.files.shift_remove(tag)
    }

    /// Look up a file by tag
    pub fn file(&self, tag: &str) -> Result<&FileEntry> {
        self.files.get(tag).ok_or_else(|| BioprovError::TagNotFound {
            tag: tag.to_string(),
            sample: self.name.clone(),
            available: self.files.keys().cloned().collect(),
        })
    }

    /// Run every registered program in insertion order
    pub fn run_programs(&mut self) -> Result<()> {
        let name = self.name.clone();
        for program in self.programs.values_mut() {
            program.run(Some(name.as_str()))?;
        }
        Ok(())
    }

    pub fn run_program(&mut self, program: &str) -> Result<()> {
        let name = self.name.clone();
        let program = self
            .programs
            .get_mut(program)
            .ok_or_else(|| BioprovError::ProgramNotFound {
                program: program.to_string(),
            })?;
        program.run(Some(name.as_str()))?;
        Ok(())
    }

    /// Rewrite file paths, see [`File::replace_path`]. Returns how many changed.
    pub fn replace_paths(&mut self, old_terms: &[&str], new: &str, warn: bool) -> usize {
        self.files
            .values_mut()
            .filter_map(|f| f.replace_path(old_terms, new, warn).then_some(()))
            .count()
    }

    /// Write the sample as JSON, by default to `./<tag>.json`, and register
    /// the written path under the `json` tag.
    pub fn to_json(&mut self, path: Option<&Path>) -> Result<PathBuf> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(format!("{}.json", self.tag)));
        self.add_files(File::new(&path, Some("json")));
        write_json(&path, &DocumentRef::Sample(self))?;
        log::info!("Wrote sample {} to {}", self.name, path.display());
        Ok(path)
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Sample {} with {} files and {} programs",
            self.name,
            self.files.len(),
            self.programs.len()
        )
    }
}
