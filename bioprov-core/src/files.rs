//! Files, sequence files and directories tracked by samples and projects
//!
//! Existence, size and content hash are always queried live from the file
//! system; only path-derived attributes are stored.

use crate::error::Result;
use crate::seqstats::SeqStats;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sha1::{Digest, Sha1};
use std::fmt;
use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

/// Make a path absolute against the current directory, dropping `.` components
pub fn absolutize<P: AsRef<Path>>(path: P) -> PathBuf {
    let path = path.as_ref();
    let cleaned: PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    if cleaned.is_absolute() {
        cleaned
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(cleaned),
            Err(_) => cleaned,
        }
    }
}

/// Human readable size, e.g. `3.4 KB`
pub fn convert_bytes(num: u64) -> String {
    let mut size = num as f64;
    for unit in ["bytes", "KB", "MB", "GB", "TB"] {
        if size < 1024.0 {
            return format!("{:.1} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.1} PB", size)
}

/// A file referenced by a sample or project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct File {
    pub path: PathBuf,
    pub tag: String,
    pub name: String,
    pub basename: String,
    pub directory: PathBuf,
    pub extension: String,
    #[serde(default)]
    pub attributes: IndexMap<String, Value>,
}

impl File {
    /// Track a file under a tag. The tag defaults to the file stem.
    pub fn new<P: AsRef<Path>>(path: P, tag: Option<&str>) -> Self {
        let path = absolutize(path);
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let basename = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let directory = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let extension = path
            .extension()
            .map(|s| format!(".{}", s.to_string_lossy()))
            .unwrap_or_default();
        let tag = tag.map(str::to_string).unwrap_or_else(|| name.clone());

        Self {
            path,
            tag,
            name,
            basename,
            directory,
            extension,
            attributes: IndexMap::new(),
        }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Size in bytes, 0 if the file does not exist
    pub fn raw_size(&self) -> u64 {
        fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }

    pub fn size(&self) -> String {
        convert_bytes(self.raw_size())
    }

    /// SHA-1 of the file contents, `None` if the file cannot be read
    pub fn sha1(&self) -> Option<String> {
        let mut file = fs::File::open(&self.path).ok()?;
        let mut hasher = Sha1::new();
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = file.read(&mut buf).ok()?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Some(format!("{:x}", hasher.finalize()))
    }

    /// Path with the extension stripped, used to seed output file names
    pub fn stem_path(&self) -> PathBuf {
        self.directory.join(&self.name)
    }

    /// Replace any of `old_terms` in the path with `new`; returns whether the path changed.
    /// With `warn` set, paths that do not exist after replacement are logged.
    pub fn replace_path(&mut self, old_terms: &[&str], new: &str, warn: bool) -> bool {
        let original = self.path.to_string_lossy().into_owned();
        let mut replaced = original.clone();
        for term in old_terms {
            if !term.is_empty() {
                replaced = replaced.replace(term, new);
            }
        }
        if replaced == original {
            return false;
        }

        let mut updated = File::new(&replaced, Some(self.tag.as_str()));
        updated.attributes = std::mem::take(&mut self.attributes);
        *self = updated;
        if warn && !self.exists() {
            log::warn!("Replaced path '{}' does not exist", self.path.display());
        }
        true
    }
}

impl fmt::Display for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// A sequence file with optional summary statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeqFile {
    #[serde(flatten)]
    pub file: File,
    pub format: String,
    #[serde(default)]
    pub seqstats: Option<SeqStats>,
}

impl SeqFile {
    /// Track a FASTA file. With `import_data`, statistics are computed if the file exists.
    pub fn new<P: AsRef<Path>>(path: P, tag: Option<&str>, import_data: bool) -> Result<Self> {
        let mut seqfile = Self {
            file: File::new(path, tag),
            format: "fasta".to_string(),
            seqstats: None,
        };
        if import_data && seqfile.file.exists() {
            seqfile.import_data()?;
        }
        Ok(seqfile)
    }

    /// Compute (or recompute) the sequence statistics
    pub fn import_data(&mut self) -> Result<&SeqStats> {
        let stats = SeqStats::from_fasta(&self.file.path)?;
        Ok(self.seqstats.insert(stats))
    }
}

/// A directory referenced by a sample or project. Its path renders with a trailing `/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Directory {
    pub path: PathBuf,
    pub tag: String,
    pub name: String,
    #[serde(default)]
    pub attributes: IndexMap<String, Value>,
}

impl Directory {
    pub fn new<P: AsRef<Path>>(path: P, tag: Option<&str>) -> Self {
        let abs = absolutize(path);
        let name = abs
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let rendered = abs.to_string_lossy();
        let path = if rendered.ends_with('/') {
            abs.clone()
        } else {
            PathBuf::from(format!("{}/", rendered))
        };
        let tag = tag.map(str::to_string).unwrap_or_else(|| name.clone());
        Self {
            path,
            tag,
            name,
            attributes: IndexMap::new(),
        }
    }

    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }
}

/// Anything a sample or project can hold in its file registry.
///
/// Serialized with an explicit `kind` field. Documents that predate the
/// discriminator are classified by shape instead: a `format` field marks a
/// sequence file, a trailing `/` marks a directory, anything else is a file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileEntry {
    File(File),
    SeqFile(SeqFile),
    Directory(Directory),
}

impl FileEntry {
    pub fn path(&self) -> &Path {
        match self {
            FileEntry::File(f) => &f.path,
            FileEntry::SeqFile(s) => &s.file.path,
            FileEntry::Directory(d) => &d.path,
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            FileEntry::File(f) => &f.tag,
            FileEntry::SeqFile(s) => &s.file.tag,
            FileEntry::Directory(d) => &d.tag,
        }
    }

    /// Stem of the file name, or the directory name
    pub fn name(&self) -> &str {
        match self {
            FileEntry::File(f) => &f.name,
            FileEntry::SeqFile(s) => &s.file.name,
            FileEntry::Directory(d) => &d.name,
        }
    }

    pub fn exists(&self) -> bool {
        match self {
            FileEntry::File(f) => f.exists(),
            FileEntry::SeqFile(s) => s.file.exists(),
            FileEntry::Directory(d) => d.exists(),
        }
    }

    /// Path without extension; directories are returned unchanged
    pub fn stem_path(&self) -> PathBuf {
        match self {
            FileEntry::File(f) => f.stem_path(),
            FileEntry::SeqFile(s) => s.file.stem_path(),
            FileEntry::Directory(d) => d.path.clone(),
        }
    }

    pub fn replace_path(&mut self, old_terms: &[&str], new: &str, warn: bool) -> bool {
        match self {
            FileEntry::File(f) => f.replace_path(old_terms, new, warn),
            FileEntry::SeqFile(s) => s.file.replace_path(old_terms, new, warn),
            FileEntry::Directory(d) => {
                let original = d.path.to_string_lossy().into_owned();
                let mut replaced = original.clone();
                for term in old_terms.iter().filter(|t| !t.is_empty()) {
                    replaced = replaced.replace(term, new);
                }
                if replaced == original {
                    return false;
                }
                let attributes = std::mem::take(&mut d.attributes);
                *d = Directory::new(&replaced, Some(d.tag.as_str()));
                d.attributes = attributes;
                if warn && !d.exists() {
                    log::warn!("Replaced path '{}' does not exist", d.path.display());
                }
                true
            }
        }
    }

    /// Rebuild an entry from its serialized form
    pub fn from_value(value: Value) -> std::result::Result<Self, serde_json::Error> {
        use serde::de::Error;

        let kind = value.get("kind").and_then(Value::as_str).map(str::to_string);
        match kind.as_deref() {
            Some("file") => Ok(FileEntry::File(serde_json::from_value(value)?)),
            Some("seq_file") => Ok(FileEntry::SeqFile(serde_json::from_value(value)?)),
            Some("directory") => Ok(FileEntry::Directory(serde_json::from_value(value)?)),
            Some(other) => Err(serde_json::Error::custom(format!(
                "unknown file kind '{}'",
                other
            ))),
            None => Self::sniff(value),
        }
    }

    fn sniff(value: Value) -> std::result::Result<Self, serde_json::Error> {
        use serde::de::Error;

        let path = value
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| serde_json::Error::custom("file entry without a 'path'"))?
            .to_string();
        let tag = value.get("tag").and_then(Value::as_str).map(str::to_string);
        let attributes: IndexMap<String, Value> = match value.get("attributes") {
            Some(v) if v.is_object() => serde_json::from_value(v.clone())?,
            _ => IndexMap::new(),
        };
        log::debug!("Classifying untyped file entry '{}' by shape", path);

        if let Some(format) = value.get("format").and_then(Value::as_str) {
            let seqstats = match value.get("seqstats") {
                Some(v) if !v.is_null() => serde_json::from_value(v.clone()).ok(),
                _ => None,
            };
            let mut file = File::new(&path, tag.as_deref());
            file.attributes = attributes;
            Ok(FileEntry::SeqFile(SeqFile {
                file,
                format: format.to_string(),
                seqstats,
            }))
        } else if path.ends_with('/') {
            let mut dir = Directory::new(&path, tag.as_deref());
            dir.attributes = attributes;
            Ok(FileEntry::Directory(dir))
        } else {
            let mut file = File::new(&path, tag.as_deref());
            file.attributes = attributes;
            Ok(FileEntry::File(file))
        }
    }
}

impl<'de> Deserialize<'de> for FileEntry {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        FileEntry::from_value(value).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for FileEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path().display())
    }
}

impl From<File> for FileEntry {
    fn from(file: File) -> Self {
        FileEntry::File(file)
    }
}

impl From<SeqFile> for FileEntry {
    fn from(file: SeqFile) -> Self {
        FileEntry::SeqFile(file)
    }
}

impl From<Directory> for FileEntry {
    fn from(dir: Directory) -> Self {
        FileEntry::Directory(dir)
    }
}

/// Files accepted by `add_files`: a single entry, a list, or a mapping.
///
/// Single entries are keyed by their tag; list entries by their tag as well;
/// mapping keys are used as given.
pub enum FileInput {
    Single(FileEntry),
    List(Vec<FileEntry>),
    Map(IndexMap<String, FileEntry>),
}

impl FileInput {
    pub fn into_map(self) -> IndexMap<String, FileEntry> {
        match self {
            FileInput::Single(entry) => {
                let mut map = IndexMap::new();
                map.insert(entry.tag().to_string(), entry);
                map
            }
            FileInput::List(entries) => entries
                .into_iter()
                .map(|e| (e.tag().to_string(), e))
                .collect(),
            FileInput::Map(map) => map,
        }
    }
}

impl From<FileEntry> for FileInput {
    fn from(entry: FileEntry) -> Self {
        FileInput::Single(entry)
    }
}

impl From<File> for FileInput {
    fn from(file: File) -> Self {
        FileInput::Single(FileEntry::File(file))
    }
}

impl From<SeqFile> for FileInput {
    fn from(file: SeqFile) -> Self {
        FileInput::Single(FileEntry::SeqFile(file))
    }
}

impl From<Directory> for FileInput {
    fn from(dir: Directory) -> Self {
        FileInput::Single(FileEntry::Directory(dir))
    }
}

impl From<Vec<FileEntry>> for FileInput {
    fn from(entries: Vec<FileEntry>) -> Self {
        FileInput::List(entries)
    }
}

impl From<Vec<File>> for FileInput {
    fn from(files: Vec<File>) -> Self {
        FileInput::List(files.into_iter().map(FileEntry::File).collect())
    }
}

impl From<IndexMap<String, FileEntry>> for FileInput {
    fn from(map: IndexMap<String, FileEntry>) -> Self {
        FileInput::Map(map)
    }
}

/// A mapping of tag to path; each path becomes a plain `File` tagged with its key
impl<K: Into<String>, P: AsRef<Path>> FromIterator<(K, P)> for FileInput {
    fn from_iter<I: IntoIterator<Item = (K, P)>>(iter: I) -> Self {
        FileInput::Map(
            iter.into_iter()
                .map(|(k, p)| {
                    let tag = k.into();
                    let file = File::new(p, Some(tag.as_str()));
                    (tag, FileEntry::File(file))
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_file_attributes_from_path() {
        let f = File::new("/data/run1/assembly.fna", None);
        assert_eq!(f.name, "assembly");
        assert_eq!(f.basename, "assembly.fna");
        assert_eq!(f.extension, ".fna");
        assert_eq!(f.directory, PathBuf::from("/data/run1"));
        assert_eq!(f.tag, "assembly");
        assert_eq!(f.stem_path(), PathBuf::from("/data/run1/assembly"));
        assert!(!f.exists());
        assert_eq!(f.raw_size(), 0);
    }

    #[test]
    fn test_relative_paths_are_absolutized() {
        let f = File::new("./reads.fq", Some("reads"));
        assert!(f.path.is_absolute());
        assert!(f.path.ends_with("reads.fq"));
        assert!(!f.path.to_string_lossy().contains("/./"));
    }

    #[test]
    fn test_live_size_and_hash() {
        let mut tmp = NamedTempFile::new().unwrap();
        write!(tmp, "hello").unwrap();
        tmp.flush().unwrap();

        let f = File::new(tmp.path(), Some("greeting"));
        assert!(f.exists());
        assert_eq!(f.raw_size(), 5);
        assert_eq!(f.size(), "5.0 bytes");
        assert_eq!(
            f.sha1().as_deref(),
            Some("aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d")
        );
    }

    #[test]
    fn test_convert_bytes() {
        assert_eq!(convert_bytes(512), "512.0 bytes");
        assert_eq!(convert_bytes(2048), "2.0 KB");
        assert_eq!(convert_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn test_replace_path() {
        let mut f = File::new("/home/old/data/a.fna", Some("assembly"));
        assert!(f.replace_path(&["/home/old"], "/home/new", false));
        assert_eq!(f.path, PathBuf::from("/home/new/data/a.fna"));
        assert_eq!(f.tag, "assembly");
        assert!(!f.replace_path(&["/nowhere"], "/x", false));
    }

    #[test]
    fn test_directory_trailing_slash() {
        let d = Directory::new("/data/outputs", None);
        assert!(d.path.to_string_lossy().ends_with('/'));
        assert_eq!(d.name, "outputs");
    }

    #[test]
    fn test_tagged_roundtrip() {
        let entry = FileEntry::File(File::new("/data/a.fna", Some("assembly")));
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["kind"], "file");
        let back: FileEntry = serde_json::from_value(value).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_untyped_entries_are_sniffed() {
        let seq = FileEntry::from_value(json!({"path": "/d/a.fna", "tag": "assembly", "format": "fasta"}))
            .unwrap();
        assert!(matches!(seq, FileEntry::SeqFile(_)));

        let dir = FileEntry::from_value(json!({"path": "/d/out/", "tag": "outdir"})).unwrap();
        assert!(matches!(dir, FileEntry::Directory(_)));

        let file = FileEntry::from_value(json!({"path": "/d/a.txt", "tag": "notes"})).unwrap();
        assert!(matches!(file, FileEntry::File(_)));
        assert_eq!(file.tag(), "notes");
    }

    #[test]
    fn test_file_input_normalization() {
        let single: FileInput = File::new("/d/a.fna", Some("assembly")).into();
        assert_eq!(single.into_map().keys().collect::<Vec<_>>(), vec!["assembly"]);

        let mapped: FileInput = [("r1", "/d/r1.fq"), ("r2", "/d/r2.fq")].into_iter().collect();
        let map = mapped.into_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map["r2"].tag(), "r2");
    }
}
