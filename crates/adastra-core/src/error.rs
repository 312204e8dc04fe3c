use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Core error type for adastra operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read config at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config at {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("Authentication failed for {store}: {message}")]
    Authentication { store: String, message: String },

    #[error("Failed to launch `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Theme command exited with {status}")]
    CommandFailed { status: ExitStatus },

    #[error("Failed to listen on {addr}: {source}")]
    Listen {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to restart asset server: {0}")]
    ListenerRestart(#[source] std::io::Error),

    #[error("No string aliases resolved to path rewrites; add a `resolve.alias` entry with a string `find`")]
    NoAliasRewrites,

    #[error("Failed to parse manifest at {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    Other(String),
}

impl Error {
    #[must_use]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
