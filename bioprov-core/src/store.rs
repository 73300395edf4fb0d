//! Tag-indexed document store for serialized projects
//!
//! The on-disk layout is a single JSON file holding a table of numbered
//! documents:
//! - `{"_default": {"1": {...}, "2": {...}}}`
//!
//! Documents are matched on their top-level `tag` field. Every write is a
//! read-modify-write of the whole file with no locking, so only one process
//! should write a given project at a time.

use crate::error::{BioprovError, Result};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the table documents are kept in
const DEFAULT_TABLE: &str = "_default";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Query-by-tag storage for project documents
pub trait DocumentStore: fmt::Debug {
    /// Document whose `tag` equals `tag`
    fn find(&self, tag: &str) -> Result<Option<Value>>;

    /// Replace the document with this tag, or insert it if absent
    fn upsert(&mut self, tag: &str, document: Value) -> Result<UpsertOutcome>;

    /// Tags of all stored documents in insertion order
    fn list(&self) -> Result<Vec<String>>;

    /// Remove the document with this tag; returns whether one existed
    fn remove(&mut self, tag: &str) -> Result<bool>;
}

fn document_tag(doc: &Value) -> Option<&str> {
    doc.get("tag").and_then(Value::as_str)
}

/// JSON-file backed store
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Open a store at `path`. The file is created on first write.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_table(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        let root: Value = serde_json::from_str(&content)?;
        match root.get(DEFAULT_TABLE) {
            None => Ok(Map::new()),
            Some(Value::Object(table)) => Ok(table.clone()),
            Some(_) => Err(BioprovError::store(format!(
                "table '{}' in {} is not an object",
                DEFAULT_TABLE,
                self.path.display()
            ))),
        }
    }

    fn write_table(&self, table: Map<String, Value>) -> Result<()> {
        let mut root = Map::new();
        root.insert(DEFAULT_TABLE.to_string(), Value::Object(table));
        let content = serde_json::to_string_pretty(&Value::Object(root))?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

impl DocumentStore for JsonFileStore {
    fn find(&self, tag: &str) -> Result<Option<Value>> {
        Ok(self
            .read_table()?
            .into_iter()
            .map(|(_, doc)| doc)
            .find(|doc| document_tag(doc) == Some(tag)))
    }

    fn upsert(&mut self, tag: &str, document: Value) -> Result<UpsertOutcome> {
        let mut table = self.read_table()?;
        let existing = table
            .iter()
            .find(|(_, doc)| document_tag(doc) == Some(tag))
            .map(|(id, _)| id.clone());

        let outcome = match existing {
            Some(id) => {
                table.insert(id, document);
                UpsertOutcome::Updated
            }
            None => {
                let next_id = table
                    .keys()
                    .filter_map(|k| k.parse::<u64>().ok())
                    .max()
                    .unwrap_or(0)
                    + 1;
                table.insert(next_id.to_string(), document);
                UpsertOutcome::Inserted
            }
        };
        self.write_table(table)?;
        log::debug!("{:?} document '{}' in {}", outcome, tag, self.path.display());
        Ok(outcome)
    }

    fn list(&self) -> Result<Vec<String>> {
        Ok(self
            .read_table()?
            .values()
            .filter_map(|doc| document_tag(doc).map(str::to_string))
            .collect())
    }

    fn remove(&mut self, tag: &str) -> Result<bool> {
        let mut table = self.read_table()?;
        let before = table.len();
        table.retain(|_, doc| document_tag(doc) != Some(tag));
        let removed = table.len() != before;
        if removed {
            self.write_table(table)?;
        }
        Ok(removed)
    }
}

/// In-memory store, mostly for tests and dry runs
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    documents: IndexMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl DocumentStore for MemoryStore {
    fn find(&self, tag: &str) -> Result<Option<Value>> {
        Ok(self.documents.get(tag).cloned())
    }

    fn upsert(&mut self, tag: &str, document: Value) -> Result<UpsertOutcome> {
        match self.documents.insert(tag.to_string(), document) {
            Some(_) => Ok(UpsertOutcome::Updated),
            None => Ok(UpsertOutcome::Inserted),
        }
    }

    fn list(&self) -> Result<Vec<String>> {
        Ok(self.documents.keys().cloned().collect())
    }

    fn remove(&mut self, tag: &str) -> Result<bool> {
        Ok(self.documents.shift_remove(tag).is_some())
    }
}
