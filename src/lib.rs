//! Chunked uploads of book, audio and manga files to the Shelf publishing API

pub mod config;
pub mod credentials;
pub mod error;
pub mod file_config;

pub mod api;
pub mod upload;

pub use config::Config;
pub use credentials::{CredentialProvider, StaticToken};
pub use error::{Error, Result, ValidationError};

// Re-export commonly used types
pub use api::UploadTarget;
pub use upload::{
    CancelHandle, SourceFile, UploadCallbacks, UploadConfig, UploadOptions, UploadOutcome,
    UploadResult, UploadSession, UploadState, upload_file,
};
