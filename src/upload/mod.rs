pub mod cancel;
pub mod finalize;
pub mod planner;
pub mod progress;
pub mod retry;
pub mod session;
pub mod source;
pub mod transport;

use crate::api::UploadTarget;
use crate::config::Config;
use crate::credentials::StaticToken;
use crate::error::{Error, Result};
use crate::upload::planner::validate_attributes;
use indicatif::ProgressBar;
use log::info;
use std::path::Path;
use std::time::Duration;
use url::Url;

pub use cancel::CancelHandle;
pub use finalize::UploadResult;
pub use planner::Chunk;
pub use retry::RetryPolicy;
pub use session::{UploadCallbacks, UploadOutcome, UploadSession, UploadState, UploadTask};
pub use source::{FileInfo, SourceFile};
pub use transport::{HttpTransport, Transport};

pub const DEFAULT_CHUNK_SIZE: u64 = 5 * 1024 * 1024; // 5MB
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024; // 100MB

/// Everything a session needs to know about where and how to upload.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub endpoint: Url,
    pub chunk_size: u64,
    pub max_file_size: u64,
    /// Exact MIME allow-list; empty accepts anything.
    pub accepted_types: Vec<String>,
    /// Sent as the `fileType` form field when set.
    pub file_type: Option<String>,
    /// Additional text fields sent with every chunk.
    pub extra_fields: Vec<(String, String)>,
    pub chunk_timeout: Duration,
    pub retry: RetryPolicy,
}

impl UploadConfig {
    /// Defaults for `endpoint`: 5 MiB chunks, 100 MiB limit, any file type,
    /// no retries. Use [`UploadConfig::for_target`] for the API's presets.
    #[must_use]
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            accepted_types: Vec::new(),
            file_type: None,
            extra_fields: Vec::new(),
            chunk_timeout: transport::DEFAULT_CHUNK_TIMEOUT,
            retry: RetryPolicy::none(),
        }
    }

    /// Preset for one of the API's upload targets.
    ///
    /// # Errors
    ///
    /// Returns an error if the target endpoint cannot be resolved against the API URL.
    pub fn for_target(config: &Config, target: UploadTarget) -> Result<Self> {
        let mut upload = Self::new(config.endpoint_url(target.endpoint())?);
        upload.max_file_size = target.max_file_size();
        upload.accepted_types = target.accepted_types();
        upload.file_type = target.file_type().map(ToString::to_string);
        Ok(upload)
    }

    /// Checks the values a session relies on.
    ///
    /// # Errors
    ///
    /// Returns an error if the chunk size or maximum file size is zero.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::ConfigError("Chunk size must be positive".to_string()));
        }
        if self.max_file_size == 0 {
            return Err(Error::ConfigError(
                "Maximum file size must be positive".to_string(),
            ));
        }
        if self.chunk_timeout.is_zero() {
            return Err(Error::ConfigError("Chunk timeout must be positive".to_string()));
        }
        Ok(())
    }
}

/// Options for uploading a file
#[derive(Clone)]
pub struct UploadOptions {
    pub upload: UploadConfig,
    pub progress_bar: Option<ProgressBar>,
    pub cancel: CancelHandle,
}

/// Upload a file from disk with a fresh session.
///
/// # Errors
///
/// Returns an error if:
/// - The file cannot be read or accessed
/// - The file fails validation (checked before its contents are loaded)
/// - No API token is configured
/// - A chunk fails to upload or the final response is unusable
pub async fn upload_file(
    config: &Config,
    file_path: impl AsRef<Path>,
    options: UploadOptions,
) -> Result<UploadOutcome> {
    let file_path = file_path.as_ref();
    let upload = options.upload;

    let info = FileInfo::inspect(file_path).await?;
    if let Err(e) = validate_attributes(
        &info.mime_type,
        info.size,
        upload.max_file_size,
        &upload.accepted_types,
    ) {
        info!("Rejected {}: {e}", info.name);
        if let Some(pb) = &options.progress_bar {
            pb.abandon_with_message("Invalid file");
        }
        return Err(e.into());
    }

    let file = SourceFile::from_path(file_path).await?;

    let pb = options
        .progress_bar
        .unwrap_or_else(|| progress::file_progress_bar(file.name()));
    pb.set_message(format!("Uploading {}", file.name()));

    let callbacks = UploadCallbacks::default().on_upload_progress(progress::bar_callback(pb.clone()));
    let mut session = UploadSession::new(upload, StaticToken::from(config))?
        .with_callbacks(callbacks)
        .with_cancel_handle(options.cancel);

    session.select_file(file)?;
    let outcome = session.start().await;

    match &outcome {
        Ok(UploadOutcome::Completed(_)) => pb.finish_with_message("Upload complete"),
        Ok(UploadOutcome::Cancelled) => pb.abandon_with_message("Upload cancelled"),
        Err(_) => pb.abandon_with_message("Upload failed"),
    }

    outcome
}
