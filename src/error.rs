use thiserror::Error;

/// Why a candidate file was refused before any network call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Unsupported file type '{actual}'. Accepted types: {}", .accepted.join(", "))]
    WrongType {
        actual: String,
        accepted: Vec<String>,
    },

    #[error("File is {size} bytes, which exceeds the maximum of {max} bytes")]
    TooLarge { size: u64, max: u64 },

    #[error("File is empty")]
    Empty,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid file: {0}")]
    Validation(#[from] ValidationError),

    #[error("Not authenticated: no bearer token available")]
    Auth,

    #[error("Failed to upload chunk {chunk_index}: {}{status_text}{}",
        .http_status.map(|s| format!("{s} ")).unwrap_or_default(),
        .detail.as_ref().map(|d| format!(" ({d})")).unwrap_or_default())]
    ChunkTransport {
        chunk_index: u64,
        http_status: Option<u16>,
        status_text: String,
        detail: Option<String>,
    },

    #[error("Upload finished but the server response was unusable: {0}")]
    Finalization(String),

    #[error("Upload cancelled")]
    Cancelled,

    #[error("No file selected")]
    NoFile,

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("File error: {0}")]
    FileError(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl Error {
    /// Index of the chunk that failed, when the error belongs to one.
    #[must_use]
    pub fn chunk_index(&self) -> Option<u64> {
        match self {
            Error::ChunkTransport { chunk_index, .. } => Some(*chunk_index),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_transport_message() {
        let err = Error::ChunkTransport {
            chunk_index: 2,
            http_status: Some(500),
            status_text: "Internal Server Error".to_string(),
            detail: Some("disk full".to_string()),
        };

        assert_eq!(
            err.to_string(),
            "Failed to upload chunk 2: 500 Internal Server Error (disk full)"
        );
        assert_eq!(err.chunk_index(), Some(2));
    }

    #[test]
    fn test_network_failure_message_has_no_status() {
        let err = Error::ChunkTransport {
            chunk_index: 0,
            http_status: None,
            status_text: "timed out".to_string(),
            detail: None,
        };

        assert_eq!(err.to_string(), "Failed to upload chunk 0: timed out");
        assert_eq!(Error::Auth.chunk_index(), None);
    }
}
