//! BioProv Core Library
//!
//! Programs, runs, samples and projects for provenance-tracked bioinformatics
//! pipelines, with JSON serialization and a tag-indexed document store.

pub mod error;
pub mod env;
pub mod parameter;
pub mod run;
pub mod program;
pub mod preset;
pub mod presets;
pub mod seqstats;
pub mod files;
pub mod sample;
pub mod project;
pub mod serialization;
pub mod store;
pub mod table;
pub mod workflow;

// Re-export commonly used types and functions
pub use error::{BioprovError, Result};
pub use env::EnvSnapshot;
pub use parameter::{render_params, ParamKind, Parameter};
pub use run::{Run, RunStatus};
pub use program::{Program, ProgramInput};
pub use preset::PresetProgram;
pub use seqstats::{calculate_n50, SeqStats};
pub use files::{Directory, File, FileEntry, FileInput, SeqFile};
pub use sample::Sample;
pub use project::Project;
pub use serialization::{from_json, Document};
pub use store::{DocumentStore, JsonFileStore, MemoryStore, UpsertOutcome};
pub use table::{IndexCol, TableOptions};
pub use workflow::{Step, Workflow, WorkflowInput, WorkflowReport};

/// Version information for the BioProv core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
