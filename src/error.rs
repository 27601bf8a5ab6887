use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum MapsError {
    #[error("{artifact} does not exist")]
    #[diagnostic(help("run `{hint}` first"))]
    MissingInput { artifact: String, hint: String },

    #[error("download of {url} failed: {message}")]
    Network { url: String, message: String },

    #[error("download of {url} returned status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("failed to extract {path}: {message}")]
    CorruptArchive { path: String, message: String },

    #[error("unknown archive type {0}")]
    UnsupportedArchive(String),

    #[error("command `{command}` failed ({}): {output}", exit_label(.code))]
    ProcessExecution {
        command: String,
        code: Option<i32>,
        output: String,
    },

    #[error("{0}")]
    Precondition(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("invalid region name: {0}")]
    InvalidRegion(String),

    #[error("no style {style} for schema {schema}")]
    StyleNotFound { schema: String, style: String },

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code".to_string(),
    }
}
