use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SprayDryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("root '{name}' version '{version}' already exists")]
    DuplicateRoot { name: String, version: String },

    #[error("unsupported file type: {0}")]
    UnsupportedFileType(PathBuf),

    #[error("integrity error: {0}")]
    Integrity(String),
}

pub type Result<R> = std::result::Result<R, SprayDryError>;
