use thiserror::Error;

use crate::host::NodeId;

#[derive(Debug, Error)]
pub enum Error {
    #[error("an overlay is already attached to frame {frame}")]
    DuplicateAttachment { frame: NodeId },
    #[error("host page: {0}")]
    Host(String),
    #[error("player bind failed: {0}")]
    PlayerBind(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type AppResult<T> = Result<T, Error>;
