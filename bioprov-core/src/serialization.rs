//! Top-level JSON documents
//!
//! Samples and projects are written with a `kind` field naming the entity.
//! Older documents without it are classified by shape: a top-level `name`
//! marks a sample, anything else is read as a project.

use crate::error::{BioprovError, Result};
use crate::project::Project;
use crate::sample::Sample;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::io::BufWriter;
use std::path::Path;

/// Borrowed view used when writing a document
#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DocumentRef<'a> {
    Sample(&'a Sample),
    Project(&'a Project),
}

/// A loaded document
#[derive(Debug)]
pub enum Document {
    Sample(Sample),
    Project(Project),
}

impl Document {
    pub fn from_value(value: Value) -> Result<Self> {
        let kind = value.get("kind").and_then(Value::as_str).map(str::to_string);
        match kind.as_deref() {
            Some("sample") => Ok(Document::Sample(serde_json::from_value(value)?)),
            Some("project") => Ok(Document::Project(Project::from_value(value)?)),
            Some(other) => Err(BioprovError::invalid_input(format!(
                "unknown document kind '{}'",
                other
            ))),
            None if value.get("name").is_some() => {
                log::warn!("Document has no 'kind' field; reading it as a sample");
                Ok(Document::Sample(serde_json::from_value(value)?))
            }
            None => {
                log::warn!("Document has no 'kind' field; reading it as a project");
                Ok(Document::Project(Project::from_value(value)?))
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Document::Sample(_) => "sample",
            Document::Project(_) => "project",
        }
    }

    pub fn into_sample(self) -> Result<Sample> {
        match self {
            Document::Sample(sample) => Ok(sample),
            Document::Project(project) => Err(BioprovError::invalid_input(format!(
                "document '{}' is a project, not a sample",
                project.tag
            ))),
        }
    }

    pub fn into_project(self) -> Result<Project> {
        match self {
            Document::Project(project) => Ok(project),
            Document::Sample(sample) => Err(BioprovError::invalid_input(format!(
                "document '{}' is a sample, not a project",
                sample.name
            ))),
        }
    }
}

/// Read a sample or project from a JSON file
pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Document> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(BioprovError::file_not_found(path));
    }
    let content = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content)?;
    let document = Document::from_value(value)?;
    log::info!("Loaded {} from {}", document.kind(), path.display());
    Ok(document)
}

/// Write any serializable value as pretty-printed JSON
pub fn write_json<P: AsRef<Path>, T: Serialize + ?Sized>(path: P, value: &T) -> Result<()> {
    let file = fs::File::create(path.as_ref())?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::File;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_sample_document_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("s1.json");
        let sample = Sample::new("s1")
            .with_files(File::new("/d/a.fna", Some("assembly")))
            .with_attribute("origin", "soil");

        write_json(&path, &DocumentRef::Sample(&sample)).unwrap();
        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["kind"], "sample");
        assert_eq!(raw["files"]["assembly"]["kind"], "file");

        let loaded = from_json(&path).unwrap().into_sample().unwrap();
        assert_eq!(loaded, sample);
    }

    #[test]
    fn test_untyped_documents_are_sniffed() {
        let sample = Document::from_value(json!({"name": "s1", "tag": "s1"})).unwrap();
        assert_eq!(sample.kind(), "sample");

        let project = Document::from_value(json!({"tag": "demo", "_samples": {}})).unwrap();
        assert_eq!(project.kind(), "project");
        assert!(project.into_sample().is_err());
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let err = Document::from_value(json!({"kind": "pipeline", "tag": "x"})).unwrap_err();
        assert!(matches!(err, BioprovError::InvalidInput { .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = from_json("/nonexistent/bioprov.json").unwrap_err();
        assert!(matches!(err, BioprovError::FileNotFound { .. }));
    }
}
