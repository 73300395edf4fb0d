//! Projects: collections of samples with change detection and persistence

use crate::env::{current_user, EnvSnapshot};
use crate::error::{BioprovError, Result};
use crate::files::{File, FileEntry, FileInput};
use crate::program::{Program, ProgramInput};
use crate::sample::{sanitize, Sample};
use crate::serialization::{write_json, DocumentRef};
use crate::store::{DocumentStore, UpsertOutcome};
use indexmap::IndexMap;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha1::{Digest, Sha1};
use std::fmt;
use std::path::{Path, PathBuf};

const ADJECTIVES: &[&str] = &[
    "amber", "brisk", "calm", "daring", "eager", "fuzzy", "gentle", "hidden", "icy", "jolly",
    "keen", "lucky", "mellow", "nimble", "odd", "proud", "quiet", "rapid", "shy", "tidy",
];

const NOUNS: &[&str] = &[
    "archaea", "bacillus", "capsid", "diatom", "enzyme", "fungus", "genome", "helix", "intron",
    "kinase", "lichen", "microbe", "nucleus", "operon", "plasmid", "ribosome", "spore", "tardigrade",
    "virion", "yeast",
];

/// Two-word slug used when a project is created without a tag
pub fn random_tag() -> String {
    let mut rng = rand::thread_rng();
    let adjective = ADJECTIVES.choose(&mut rng).copied().unwrap_or("quiet");
    let noun = NOUNS.choose(&mut rng).copied().unwrap_or("genome");
    format!("{}_{}", adjective, noun)
}

/// A set of samples plus project-level files and programs.
///
/// The project owns its samples; each sample records the project's tag.
/// Mutations re-hash the serialized project and, with `auto_update` on and a
/// store attached, write it to the store when the hash changed.
#[derive(Debug, Serialize, Deserialize)]
pub struct Project {
    pub tag: String,
    #[serde(rename = "_samples", default)]
    pub samples: IndexMap<String, Sample>,
    #[serde(default)]
    pub files: IndexMap<String, FileEntry>,
    #[serde(default)]
    pub programs: IndexMap<String, Program>,
    #[serde(default)]
    pub users: IndexMap<String, IndexMap<String, EnvSnapshot>>,
    #[serde(default)]
    pub sha1: String,
    #[serde(default)]
    pub auto_update: bool,
    #[serde(skip)]
    store: Option<Box<dyn DocumentStore>>,
}

impl Project {
    /// Create an empty project. Without a tag a random slug is used.
    pub fn new(tag: Option<&str>) -> Self {
        let tag = match tag.map(sanitize) {
            Some(tag) if !tag.is_empty() => tag,
            _ => random_tag(),
        };
        let mut project = Self {
            tag,
            samples: IndexMap::new(),
            files: IndexMap::new(),
            programs: IndexMap::new(),
            users: IndexMap::new(),
            sha1: String::new(),
            auto_update: false,
            store: None,
        };
        project.record_environment(EnvSnapshot::capture());
        project.update_hash();
        project
    }

    /// Add samples keyed by name. A later sample replaces an earlier one
    /// with the same name.
    pub fn with_samples<I: IntoIterator<Item = Sample>>(mut self, samples: I) -> Self {
        for mut sample in samples {
            sample.project = Some(self.tag.clone());
            if let Some(previous) = self.samples.insert(sample.name.clone(), sample) {
                log::warn!(
                    "Replaced sample '{}' of project {} (had {} files)",
                    previous.name,
                    self.tag,
                    previous.files.len()
                );
            }
        }
        self.update_hash();
        self
    }

    /// Rebuild a project from its serialized form
    pub fn from_value(value: Value) -> Result<Self> {
        let mut project: Project = serde_json::from_value(value)?;
        for sample in project.samples.values_mut() {
            sample.project = Some(project.tag.clone());
        }
        project.record_environment(EnvSnapshot::capture());
        project.update_hash();
        Ok(project)
    }

    /// Load a project from a store by tag
    pub fn load(store: &dyn DocumentStore, tag: &str) -> Result<Option<Self>> {
        store.find(tag)?.map(Self::from_value).transpose()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn sample(&self, name: &str) -> Result<&Sample> {
        self.samples.get(name).ok_or_else(|| self.missing_sample(name))
    }

    fn missing_sample(&self, name: &str) -> BioprovError {
        BioprovError::SampleNotFound {
            name: name.to_string(),
            project: self.tag.clone(),
        }
    }

    /// Add a sample, replacing one with the same name
    pub fn insert_sample(&mut self, mut sample: Sample) -> Result<()> {
        sample.project = Some(self.tag.clone());
        if self.samples.insert(sample.name.clone(), sample).is_some() {
            log::info!("Replaced a sample of project {}", self.tag);
        }
        self.auto_update_db()
    }

    pub fn remove_sample(&mut self, name: &str) -> Result<Sample> {
        let mut sample = self
            .samples
            .shift_remove(name)
            .ok_or_else(|| self.missing_sample(name))?;
        sample.project = None;
        self.auto_update_db()?;
        Ok(sample)
    }

    /// Mutate one sample in place, then run the persistence hook
    pub fn update_sample<F, R>(&mut self, name: &str, f: F) -> Result<R>
    where
        F: FnOnce(&mut Sample) -> R,
    {
        let sample = match self.samples.get_mut(name) {
            Some(sample) => sample,
            None => return Err(self.missing_sample(name)),
        };
        let out = f(sample);
        self.auto_update_db()?;
        Ok(out)
    }

    /// Project-level files
    pub fn add_files<F: Into<FileInput>>(&mut self, files: F) -> Result<()> {
        for (tag, entry) in files.into().into_map() {
            if self.files.insert(tag.clone(), entry).is_some() {
                log::info!("Replaced file '{}' of project {}", tag, self.tag);
            }
        }
        self.auto_update_db()
    }

    /// Project-level programs
    pub fn add_programs<P: Into<ProgramInput>>(&mut self, programs: P) -> Result<()> {
        for (name, program) in programs.into().into_map() {
            if self.programs.insert(name.clone(), program).is_some() {
                log::info!("Replaced program '{}' of project {}", name, self.tag);
            }
        }
        self.auto_update_db()
    }

    /// Run every sample's programs, samples in insertion order
    pub fn run_programs(&mut self) -> Result<()> {
        for sample in self.samples.values_mut() {
            sample.run_programs()?;
        }
        self.auto_update_db()
    }

    fn record_environment(&mut self, env: EnvSnapshot) {
        let user = if env.user == "unknown" {
            current_user()
        } else {
            env.user.clone()
        };
        self.users
            .entry(user)
            .or_default()
            .entry(env.env_hash.clone())
            .or_insert(env);
    }

    /// SHA-1 of the canonical serialization, excluding the stored hash itself
    pub fn compute_sha1(&self) -> Result<String> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut value {
            map.remove("sha1");
        }
        let canonical = serde_json::to_string(&canonicalize(value))?;
        let mut hasher = Sha1::new();
        hasher.update(canonical.as_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Refresh `sha1`; returns whether it changed
    pub fn update_hash(&mut self) -> bool {
        match self.compute_sha1() {
            Ok(hash) if hash != self.sha1 => {
                self.sha1 = hash;
                true
            }
            Ok(_) => false,
            Err(e) => {
                log::warn!("Could not hash project {}: {}", self.tag, e);
                false
            }
        }
    }

    pub fn attach_store(&mut self, store: Box<dyn DocumentStore>) {
        self.store = Some(store);
    }

    pub fn detach_store(&mut self) -> Option<Box<dyn DocumentStore>> {
        self.store.take()
    }

    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    pub fn set_auto_update(&mut self, enabled: bool) {
        self.auto_update = enabled;
    }

    /// Re-hash and, if auto-update is on, a store is attached and the hash
    /// changed, upsert the project under its tag.
    pub fn auto_update_db(&mut self) -> Result<()> {
        let changed = self.update_hash();
        if !self.auto_update || self.store.is_none() || !changed {
            return Ok(());
        }
        self.save().map(|_| ())
    }

    /// Upsert into the attached store regardless of `auto_update`
    pub fn save(&mut self) -> Result<UpsertOutcome> {
        self.update_hash();
        let document = serde_json::to_value(DocumentRef::Project(self))?;
        let tag = self.tag.clone();
        let store = self
            .store
            .as_mut()
            .ok_or_else(|| BioprovError::store(format!("no store attached to project {}", tag)))?;
        let outcome = store.upsert(&tag, document)?;
        log::info!("{:?} project {} in store", outcome, tag);
        Ok(outcome)
    }

    /// Rewrite paths of project and sample files. Returns how many changed.
    pub fn replace_paths(&mut self, old_terms: &[&str], new: &str, warn: bool) -> usize {
        let mut changed = self
            .files
            .values_mut()
            .map(|f| f.replace_path(old_terms, new, warn))
            .filter(|changed| *changed)
            .count();
        for sample in self.samples.values_mut() {
            changed += sample.replace_paths(old_terms, new, warn);
        }
        if changed > 0 {
            self.update_hash();
        }
        changed
    }

    /// Stdout threshold above which every recorded run is stored without its stdout
    pub fn set_suppress_threshold(&mut self, threshold: usize) {
        let sample_programs = self.samples.values_mut().flat_map(|s| s.programs.values_mut());
        for program in self.programs.values_mut().chain(sample_programs) {
            for run in program.runs.values_mut() {
                run.suppress_threshold = threshold;
            }
        }
        self.update_hash();
    }

    /// Point paths under other recorded home directories at the current `HOME`
    pub fn replace_home(&mut self, warn: bool) -> usize {
        let current = match std::env::var("HOME") {
            Ok(home) => home,
            Err(_) => return 0,
        };
        let homes: Vec<String> = self
            .users
            .values()
            .flat_map(|envs| envs.values())
            .filter_map(|env| env.home().map(str::to_string))
            .filter(|home| *home != current)
            .collect();
        if homes.is_empty() {
            return 0;
        }
        let terms: Vec<&str> = homes.iter().map(String::as_str).collect();
        self.replace_paths(&terms, &current, warn)
    }

    /// Write the project as JSON, by default to `./<tag>.json`, and register
    /// the written path as project file `json`.
    pub fn to_json(&mut self, path: Option<&Path>) -> Result<PathBuf> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(format!("{}.json", self.tag)));
        self.files
            .insert("json".to_string(), File::new(&path, Some("json")).into());
        self.update_hash();
        write_json(&path, &DocumentRef::Project(self))?;
        log::info!("Wrote project {} to {}", self.tag, path.display());
        Ok(path)
    }

    /// Write one row per sample with its file paths and attributes.
    /// Defaults to `./<tag>.csv`, or `.tsv` with a tab delimiter.
    pub fn to_csv(&self, path: Option<&Path>, delimiter: u8) -> Result<PathBuf> {
        let extension = if delimiter == b'\t' { "tsv" } else { "csv" };
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(format!("{}.{}", self.tag, extension)));

        let mut file_tags: Vec<&str> = Vec::new();
        let mut attribute_keys: Vec<&str> = Vec::new();
        for sample in self.samples.values() {
            for tag in sample.files.keys() {
                if !file_tags.contains(&tag.as_str()) {
                    file_tags.push(tag);
                }
            }
            for key in sample.attributes.keys() {
                if !attribute_keys.contains(&key.as_str()) {
                    attribute_keys.push(key);
                }
            }
        }

        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_path(&path)?;
        let mut header = vec!["sample"];
        header.extend(&file_tags);
        header.extend(&attribute_keys);
        writer.write_record(&header)?;

        for sample in self.samples.values() {
            let mut row = vec![sample.name.clone()];
            for tag in &file_tags {
                row.push(
                    sample
                        .files
                        .get(*tag)
                        .map(|f| f.path().display().to_string())
                        .unwrap_or_default(),
                );
            }
            for key in &attribute_keys {
                row.push(match sample.attributes.get(*key) {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                });
            }
            writer.write_record(&row)?;
        }
        writer.flush()?;
        log::info!("Wrote {} samples to {}", self.samples.len(), path.display());
        Ok(path)
    }
}

impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Project '{}' with {} samples", self.tag, self.samples.len())
    }
}

/// Sort object keys recursively so hashing does not depend on insertion order
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, canonicalize(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}
