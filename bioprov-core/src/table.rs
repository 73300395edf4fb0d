//! Building projects from sample tables and directories

use crate::error::{BioprovError, Result};
use crate::files::{File, FileEntry, SeqFile};
use crate::project::Project;
use crate::sample::Sample;
use csv::ReaderBuilder;
use indexmap::IndexMap;
use serde_json::{Number, Value};
use std::fs;
use std::path::Path;

/// Column holding sample ids
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexCol {
    Name(String),
    Position(usize),
}

impl Default for IndexCol {
    fn default() -> Self {
        IndexCol::Position(0)
    }
}

#[derive(Debug, Clone)]
pub struct TableOptions {
    pub delimiter: u8,
    pub index_col: IndexCol,
    /// Columns whose cells are paths to plain files
    pub file_cols: Vec<String>,
    /// Columns whose cells are paths to FASTA files
    pub seqfile_cols: Vec<String>,
    /// column -> file tag for file columns registered under another name.
    /// Unmapped columns use the column name as the tag.
    pub column_tags: IndexMap<String, String>,
    pub tag: Option<String>,
    /// Compute sequence statistics for sequence-file columns
    pub import_data: bool,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            index_col: IndexCol::default(),
            file_cols: Vec::new(),
            seqfile_cols: Vec::new(),
            column_tags: IndexMap::new(),
            tag: None,
            import_data: false,
        }
    }
}

impl TableOptions {
    /// Options with the delimiter guessed from the file extension
    pub fn for_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            delimiter: delimiter_for(path),
            ..Self::default()
        }
    }

    pub fn file_col<S: Into<String>>(mut self, column: S) -> Self {
        self.file_cols.push(column.into());
        self
    }

    pub fn seqfile_col<S: Into<String>>(mut self, column: S) -> Self {
        self.seqfile_cols.push(column.into());
        self
    }

    /// Read paths from `column` but register them under `tag`
    pub fn file_col_as<C: Into<String>, T: Into<String>>(mut self, column: C, tag: T) -> Self {
        let column = column.into();
        self.column_tags.insert(column.clone(), tag.into());
        self.file_col(column)
    }

    pub fn seqfile_col_as<C: Into<String>, T: Into<String>>(mut self, column: C, tag: T) -> Self {
        let column = column.into();
        self.column_tags.insert(column.clone(), tag.into());
        self.seqfile_col(column)
    }

    /// File tag for values read from `column`
    pub fn tag_for<'a>(&'a self, column: &'a str) -> &'a str {
        self.column_tags
            .get(column)
            .map(String::as_str)
            .unwrap_or(column)
    }

    pub fn index_col(mut self, index_col: IndexCol) -> Self {
        self.index_col = index_col;
        self
    }

    pub fn tag<S: Into<String>>(mut self, tag: S) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

/// Tab for `.tsv`/`.tab`/`.txt`, comma otherwise
pub fn delimiter_for<P: AsRef<Path>>(path: P) -> u8 {
    match path
        .as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("tsv") | Some("tab") | Some("txt") => b'\t',
        _ => b',',
    }
}

/// Integers and floats become numbers, empty cells null, anything else a string
fn parse_cell(cell: &str) -> Value {
    let cell = cell.trim();
    if cell.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = cell.parse::<i64>() {
        return Value::from(i);
    }
    if let Some(n) = cell.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(n);
    }
    Value::String(cell.to_string())
}

impl Project {
    /// One sample per row. The table path is registered as project file
    /// `project_csv`. Every path in a file column must exist.
    pub fn from_table<P: AsRef<Path>>(path: P, options: &TableOptions) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(BioprovError::file_not_found(path));
        }
        let mut reader = ReaderBuilder::new()
            .delimiter(options.delimiter)
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)?;

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let column = |name: &str| -> Result<usize> {
            headers.iter().position(|h| h == name).ok_or_else(|| {
                BioprovError::invalid_input(format!(
                    "column '{}' not present in {}; columns are [{}]",
                    name,
                    path.display(),
                    headers.join(", ")
                ))
            })
        };

        let index = match &options.index_col {
            IndexCol::Name(name) => column(name)?,
            IndexCol::Position(pos) if *pos < headers.len() => *pos,
            IndexCol::Position(pos) => {
                return Err(BioprovError::invalid_input(format!(
                    "index column {} out of range for {} columns",
                    pos,
                    headers.len()
                )))
            }
        };
        let file_cols = options
            .file_cols
            .iter()
            .map(|c| column(c).map(|i| (i, options.tag_for(c))))
            .collect::<Result<Vec<_>>>()?;
        let seqfile_cols = options
            .seqfile_cols
            .iter()
            .map(|c| column(c).map(|i| (i, options.tag_for(c))))
            .collect::<Result<Vec<_>>>()?;
        let attribute_cols: Vec<usize> = (0..headers.len())
            .filter(|i| {
                *i != index
                    && !file_cols.iter().any(|(c, _)| c == i)
                    && !seqfile_cols.iter().any(|(c, _)| c == i)
            })
            .collect();

        let mut samples: Vec<Sample> = Vec::new();
        for record in reader.records() {
            let record = record?;
            let id = record.get(index).unwrap_or_default();
            if id.is_empty() {
                log::warn!("Skipping row without a sample id in {}", path.display());
                continue;
            }
            let mut sample = Sample::new(id);

            for (i, tag) in &file_cols {
                let cell = record.get(*i).unwrap_or_default();
                let file = File::new(cell, Some(*tag));
                if !file.exists() {
                    return Err(BioprovError::file_not_found(&file.path));
                }
                sample.add_files(file);
            }
            for (i, tag) in &seqfile_cols {
                let cell = record.get(*i).unwrap_or_default();
                let seqfile = SeqFile::new(cell, Some(*tag), options.import_data)?;
                if !seqfile.file.exists() {
                    return Err(BioprovError::file_not_found(&seqfile.file.path));
                }
                sample.add_files(seqfile);
            }
            for i in &attribute_cols {
                let value = parse_cell(record.get(*i).unwrap_or_default());
                sample.attributes.insert(headers[*i].clone(), value);
            }
            samples.push(sample);
        }

        let mut project = Project::new(options.tag.as_deref()).with_samples(samples);
        project.add_files(FileEntry::from(File::new(path, Some("project_csv"))))?;
        log::info!(
            "Loaded {} samples from {} into project {}",
            project.len(),
            path.display(),
            project.tag
        );
        Ok(project)
    }

    /// One sample per file in `dir` whose extension is in `extensions`, named
    /// after the file stem, with the file under `file_tag`.
    pub fn from_directory<P: AsRef<Path>>(
        dir: P,
        extensions: &[&str],
        file_tag: &str,
        tag: Option<&str>,
    ) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(BioprovError::file_not_found(dir));
        }
        let wanted: Vec<String> = extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
            .collect();

        let mut paths: Vec<_> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| wanted.contains(&e.to_ascii_lowercase()))
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();

        let samples = paths.iter().map(|p| {
            let file = File::new(p, Some(file_tag));
            Sample::new(&file.name).with_files(file)
        });
        let project = Project::new(tag).with_samples(samples);
        log::info!(
            "Loaded {} samples from {} into project {}",
            project.len(),
            dir.display(),
            project.tag
        );
        Ok(project)
    }
}
