//! Error types for the export pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while fetching upstream data or writing export files.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("request to Variomedia API failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Variomedia API returned {status} for {url}")]
    UpstreamStatus {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("failed to decode Variomedia response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write CSV to {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ExportError {
    /// True for errors scoped to a single upstream call.
    ///
    /// The orchestrator skips the affected customer or domain on these and
    /// keeps going; everything else aborts the run.
    pub fn is_fetch_error(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::UpstreamStatus { .. } | Self::Decode { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ExportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_errors_are_scoped() {
        let status = ExportError::UpstreamStatus {
            status: reqwest::StatusCode::BAD_GATEWAY,
            url: "http://upstream/customers".to_string(),
        };
        assert!(status.is_fetch_error());

        let io = ExportError::Io {
            path: PathBuf::from("/tmp/x.csv"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        };
        assert!(!io.is_fetch_error());
        assert!(io.to_string().contains("/tmp/x.csv"));
    }
}
