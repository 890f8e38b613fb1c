use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum SpireError {
    #[error("invalid sample id: {0}")]
    InvalidSampleId(String),

    #[error("invalid study name: {0}")]
    InvalidStudyName(String),

    #[error("invalid genome id: {0}")]
    InvalidGenomeId(String),

    #[error("invalid AMR mode: {0} (expected deeparg, megares or vfdb)")]
    InvalidAmrMode(String),

    #[error("invalid view target: {0}")]
    InvalidTarget(String),

    #[error("no matching {target} view for {kind}")]
    UnsupportedTarget { kind: String, target: String },

    #[error("SPIRE request failed: {0}")]
    Http(String),

    #[error("SPIRE returned status {status} for {url}: {message}")]
    Status {
        status: u16,
        url: String,
        message: String,
    },

    #[error("failed to decode payload from {url}: {message}")]
    Payload { url: String, message: String },

    #[error("malformed TSV: {0}")]
    Tsv(String),

    #[error("table has no column {0}")]
    MissingColumn(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("reconstruction failed for {genome}: {message}")]
    Reconstruction { genome: String, message: String },
}
