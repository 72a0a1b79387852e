use thiserror::Error;

use crate::ir::BlockKind;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Malformed JSON: {source}")]
    ParseError {
        #[from]
        source: serde_json::Error,
    },

    #[error("Unknown node kind: {kind}")]
    UnknownKind { kind: String },

    #[error("Node at {path} has no type")]
    MissingKind { path: String },

    #[error("Schema error at {path}: {message}")]
    SchemaError { path: String, message: String },

    #[error("Program root must be a start block, found {found}")]
    NotStart { found: BlockKind },

    #[error("No program: {reason}")]
    NoProgram { reason: String },

    #[error("Failed to construct the start block: {source}")]
    RootConstructionError {
        #[source]
        source: SinkError,
    },

    #[error("IO error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },
}

impl LoadError {
    /// Schema-class failures: the text was JSON but not a usable program
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownKind { .. }
                | Self::MissingKind { .. }
                | Self::SchemaError { .. }
                | Self::NotStart { .. }
                | Self::NoProgram { .. }
        )
    }
}

/// Отказ редактора при построении блока
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("Cannot create block of kind {kind}")]
    Rejected { kind: BlockKind },

    #[error("Block {kind} has no input {input}")]
    MissingInput { kind: BlockKind, input: String },

    #[error("Block {kind} has no field {field}")]
    MissingField { kind: BlockKind, field: String },

    #[error("Cannot connect {child} to {parent}: {message}")]
    Connection {
        parent: BlockKind,
        child: BlockKind,
        message: String,
    },

    #[error("Unknown block handle")]
    UnknownBlock,
}

#[derive(Error, Debug)]
pub enum RunError {
    #[error("Run task failed: {source}")]
    TaskFailed {
        #[from]
        source: tokio::task::JoinError,
    },
}
