use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::toolchain::ScriptKind;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Cannot read config file {path}: {source}")]
    ConfigRead { path: PathBuf, source: io::Error },

    #[error("Invalid config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Local build directory not found: {0}")]
    MissingLocalDir(PathBuf),

    #[error("Cannot put {field} in a {kind} script: {reason}")]
    UnsafeValue {
        field: &'static str,
        kind: ScriptKind,
        reason: &'static str,
    },

    #[error("Failed to start {program}: {source}")]
    Spawn { program: String, source: io::Error },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, DeployError>;
