use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid payload: {0}")]
    Payload(String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to write output: {0}")]
    Write(#[from] std::io::Error),
    #[error("rasterization failed: {0}")]
    Raster(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
