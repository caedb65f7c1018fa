use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Backing store error: {0}")]
    Sled(#[from] sled::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Shard layout mismatch: on disk {on_disk}, requested {requested}")]
    LayoutMismatch { on_disk: String, requested: String },

    #[error("Failed to open shard {index} at {}: {source}", path.display())]
    ShardOpen {
        index: usize,
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    /// Shards listed in `committed` were written and stay written.
    #[error("Batch commit failed on shard {shard} after committing shards {committed:?}: {source}")]
    PartialCommit {
        shard: usize,
        committed: Vec<usize>,
        #[source]
        source: Box<Error>,
    },

    #[error("Unknown property: {0}")]
    UnknownProperty(String),

    #[error("Store is closed")]
    Closed,

    #[error("Overrides error: {0}")]
    Overrides(#[from] csv::Error),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl Error {
    pub fn error_code(&self) -> i32 {
        match self {
            Error::Io(_) => -1,
            Error::Sled(_) => -2,
            Error::Config(_) => -3,
            Error::LayoutMismatch { .. } => -4,
            Error::ShardOpen { .. } => -5,
            Error::PartialCommit { .. } => -6,
            Error::UnknownProperty(_) => -7,
            Error::Closed => -8,
            Error::Overrides(_) => -9,
            Error::Storage(_) => -14,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}
