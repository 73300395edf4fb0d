//! Error handling for the BioProv CLI

use bioprov_core::BioprovError;
use std::path::PathBuf;
use thiserror::Error;

/// User-facing failures of the BioProv CLI
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Input/Output error: {message}")]
    Io { message: String },

    #[error("File not found: {}", .path.display())]
    FileNotFound { path: PathBuf },

    #[error("External tool error: {tool} - {message}")]
    ExternalTool { tool: String, message: String },

    #[error("Unknown workflow '{name}'. Available workflows: {}", .available.join(", "))]
    UnknownWorkflow { name: String, available: Vec<String> },

    #[error("Project '{tag}' not found in {}", .db.display())]
    ProjectNotFound { tag: String, db: PathBuf },

    #[error("Database error: {message}")]
    Database { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },
}

impl CliError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io { message: message.into() }
    }

    pub fn file_not_found(path: PathBuf) -> Self {
        Self::FileNotFound { path }
    }

    pub fn external_tool<S: Into<String>>(tool: S, message: S) -> Self {
        Self::ExternalTool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn unknown_workflow<S: Into<String>>(name: S, available: &[&str]) -> Self {
        Self::UnknownWorkflow {
            name: name.into(),
            available: available.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn project_not_found<S: Into<String>>(tag: S, db: PathBuf) -> Self {
        Self::ProjectNotFound { tag: tag.into(), db }
    }

    pub fn database<S: Into<String>>(message: S) -> Self {
        Self::Database { message: message.into() }
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into() }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

impl From<BioprovError> for CliError {
    fn from(err: BioprovError) -> Self {
        match err {
            BioprovError::ProgramNotFound { program } => {
                Self::external_tool(program.as_str(), "not found on $PATH")
            }
            BioprovError::FileNotFound { path } => Self::file_not_found(path),
            BioprovError::Store { message } => Self::database(message),
            BioprovError::Io(e) => Self::io(e.to_string()),
            other => Self::validation(other.to_string()),
        }
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Provide helpful error messages and suggestions
pub fn format_error_with_suggestions(error: &CliError) -> String {
    let mut message = error.to_string();

    match error {
        CliError::FileNotFound { path } => {
            message.push_str(&format!(
                "\n\nSuggestions:\n\
                 • Check that the file path is correct: {}\n\
                 • Relative paths in sample tables are resolved from the working directory\n\
                 • Ensure you have read permissions for the file",
                path.display()
            ));
        }

        CliError::ExternalTool { tool, .. } => match tool.as_str() {
            "blastn" | "blastp" => {
                message.push_str(
                    "\n\nSuggestions:\n\
                     • Install BLAST+: https://blast.ncbi.nlm.nih.gov/doc/blast-help/downloadblastdata.html\n\
                     • Ensure the BLAST+ binaries are in your PATH",
                );
            }
            "prodigal" => {
                message.push_str(
                    "\n\nSuggestions:\n\
                     • Install Prodigal: https://github.com/hyattpd/Prodigal\n\
                     • Ensure prodigal is in your PATH",
                );
            }
            "prokka" => {
                message.push_str(
                    "\n\nSuggestions:\n\
                     • Install Prokka: https://github.com/tseemann/prokka\n\
                     • Or leave the step out with --skip prokka",
                );
            }
            "kaiju" | "kaiju2table" => {
                message.push_str(
                    "\n\nSuggestions:\n\
                     • Install Kaiju: https://github.com/bioinformatics-centre/kaiju\n\
                     • Ensure kaiju and kaiju2table are in your PATH",
                );
            }
            _ => {
                message.push_str(&format!(
                    "\n\nSuggestions:\n\
                     • Install {}\n\
                     • Ensure {} is in your PATH",
                    tool, tool
                ));
            }
        },

        CliError::Config { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Check your bioprov.toml configuration file\n\
                 • Use 'bioprov config --example' to generate a sample configuration",
            );
        }

        CliError::UnknownWorkflow { .. } => {
            message.push_str("\n\nSuggestions:\n• Check the spelling of the workflow name");
        }

        CliError::ProjectNotFound { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Use 'bioprov list' to see the stored projects\n\
                 • Check [storage] db_path in your configuration",
            );
        }

        CliError::Database { .. } => {
            message.push_str(
                "\n\nSuggestions:\n\
                 • Check that the database file is valid JSON\n\
                 • Ensure you have write permissions for the database file",
            );
        }

        _ => {}
    }

    message
}

/// Print error with helpful suggestions and exit
pub fn print_error_and_exit(error: &CliError) -> ! {
    eprintln!("Error: {}", format_error_with_suggestions(error));
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = CliError::config("test message");
        assert!(matches!(err, CliError::Config { .. }));
        assert_eq!(err.to_string(), "Configuration error: test message");
    }

    #[test]
    fn test_error_suggestions() {
        let err = CliError::file_not_found(PathBuf::from("samples.csv"));
        let formatted = format_error_with_suggestions(&err);
        assert!(formatted.contains("Suggestions:"));
        assert!(formatted.contains("Check that the file path is correct"));
    }

    #[test]
    fn test_core_error_conversion() {
        let err: CliError = BioprovError::ProgramNotFound {
            program: "prodigal".to_string(),
        }
        .into();
        assert!(matches!(err, CliError::ExternalTool { ref tool, .. } if tool == "prodigal"));
        assert!(format_error_with_suggestions(&err).contains("Install Prodigal"));

        let err: CliError = BioprovError::invalid_input("bad rank").into();
        assert!(matches!(err, CliError::Validation { .. }));
    }

    #[test]
    fn test_unknown_workflow_lists_available() {
        let err = CliError::unknown_workflow("assembly", &["genome_annotation", "blastn"]);
        assert!(err.to_string().contains("genome_annotation, blastn"));
    }
}
