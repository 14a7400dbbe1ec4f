use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single match file. None of these stop the run.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("missing required field `{field}` in {}", path.display())]
    MissingField { path: PathBuf, field: &'static str },

    #[error("expected exactly two teams in {}, found {found}", path.display())]
    InvalidTeams { path: PathBuf, found: usize },

    #[error("store write failed: {0}")]
    StoreWrite(#[from] StoreError),
}

impl IngestError {
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::Read { .. } | IngestError::Decode { .. } => "DecodeError",
            IngestError::MissingField { .. } | IngestError::InvalidTeams { .. } => {
                "MissingRequiredField"
            }
            IngestError::StoreWrite(_) => "StoreWriteError",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("encode properties: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store connection lock poisoned")]
    Poisoned,
}
