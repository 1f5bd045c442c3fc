//! Typed failures for the two places where the update run needs to tell
//! errors apart: fetching a channel and persisting the store.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Why a channel produced no batch at all.
///
/// An empty channel is not an error: adapters return an empty batch for it.
/// Every variant here is logged and the channel is skipped.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("could not start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} did not finish within {}s", timeout.as_secs())]
    Timeout { program: String, timeout: Duration },

    #[error("{program} exited with {status} and printed no entries: {stderr}")]
    Status {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("request to {url} failed: {message}")]
    Http { url: String, message: String },

    #[error("feed from {url} could not be parsed: {message}")]
    Feed { url: String, message: String },
}

/// Failure to write the store. This is the only fatal error of a run.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("creating directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serializing store: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("writing {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
