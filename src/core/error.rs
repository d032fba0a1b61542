//! Crate error type.
//!
//! Only configuration loading, feed parsing and the command channel return
//! errors. The trigger path never does: missing live data is a no-op and
//! failed sends are logged where they happen.

use std::path::{Path, PathBuf};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BridgeError>;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration parse failure: {details}")]
    ConfigParse { details: String },

    #[error("invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("unreadable feed line {line:?}: {details}")]
    FeedParse { line: String, details: String },

    #[error("malformed command frame: {details}")]
    Frame { details: String },

    #[error("websocket failure: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("channel closed in component {component}")]
    ChannelClosed { component: &'static str },
}

impl BridgeError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}
