// Error types for medalstore operations
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Key column '{column}' not found in table")]
    MissingKeyColumn { column: String },

    #[error("Store lock poisoned: {0}")]
    StorePoisoned(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl Error {
    pub fn io<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub fn missing_key<S: Into<String>>(column: S) -> Self {
        Error::MissingKeyColumn {
            column: column.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
