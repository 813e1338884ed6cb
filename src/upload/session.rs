//! The upload state machine.
//!
//! One session owns one selected file and drives its chunks strictly in
//! order: chunk `i + 1` is only dispatched after chunk `i` was acknowledged.
//!
//! ```text
//! Idle ──select_file──> Validating ──ok──> Idle (file set) ──start──> Uploading
//!                            └──invalid──> Idle                         │
//!          Completed <──last ack + finalize ok──────────────────────────┤
//!          Failed    <──transport / finalize / auth error───────────────┤
//!          Cancelled <──cancel observed─────────────────────────────────┘
//! ```
//!
//! `start()` may be called again from any state with a file selected, which
//! is how callers offer a retry after `Failed` or `Cancelled`.

use crate::credentials::CredentialProvider;
use crate::error::{Error, Result};
use crate::upload::cancel::CancelHandle;
use crate::upload::finalize::{UploadResult, finalize};
use crate::upload::planner::{chunk_range, plan_chunks, validate_file};
use crate::upload::progress::{ProgressCallback, ProgressReporter};
use crate::upload::source::SourceFile;
use crate::upload::transport::{ChunkAck, ChunkRequest, HttpTransport, Transport};
use crate::upload::UploadConfig;
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    Validating,
    Uploading,
    Completed,
    Cancelled,
    Failed,
}

/// How a started upload ended, when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Completed(UploadResult),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskError {
    pub chunk_index: Option<u64>,
    pub message: String,
}

/// Snapshot of the current (or last) upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTask {
    pub upload_id: String,
    pub chunk_size: u64,
    pub total_chunks: u64,
    pub current_chunk_index: u64,
    pub state: UploadState,
    pub error: Option<TaskError>,
}

type FileChangeCallback = Arc<dyn Fn(Option<&SourceFile>) + Send + Sync>;
type CompleteCallback = Arc<dyn Fn(&UploadResult) + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(&str, Option<u64>) + Send + Sync>;

/// Hooks for presentation code. All of them are optional.
#[derive(Clone, Default)]
pub struct UploadCallbacks {
    on_file_change: Option<FileChangeCallback>,
    on_upload_progress: Option<ProgressCallback>,
    on_upload_complete: Option<CompleteCallback>,
    on_upload_error: Option<ErrorCallback>,
}

impl UploadCallbacks {
    #[must_use]
    pub fn on_file_change(mut self, f: impl Fn(Option<&SourceFile>) + Send + Sync + 'static) -> Self {
        self.on_file_change = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_upload_progress(mut self, f: impl Fn(u8) + Send + Sync + 'static) -> Self {
        self.on_upload_progress = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_upload_complete(mut self, f: impl Fn(&UploadResult) + Send + Sync + 'static) -> Self {
        self.on_upload_complete = Some(Arc::new(f));
        self
    }

    /// Called with a readable message and, for transport failures, the index
    /// of the chunk that failed. Never called for cancellations.
    #[must_use]
    pub fn on_upload_error(mut self, f: impl Fn(&str, Option<u64>) + Send + Sync + 'static) -> Self {
        self.on_upload_error = Some(Arc::new(f));
        self
    }

    fn file_changed(&self, file: Option<&SourceFile>) {
        if let Some(callback) = &self.on_file_change {
            callback(file);
        }
    }

    fn completed(&self, result: &UploadResult) {
        if let Some(callback) = &self.on_upload_complete {
            callback(result);
        }
    }

    fn failed(&self, message: &str, chunk_index: Option<u64>) {
        if let Some(callback) = &self.on_upload_error {
            callback(message, chunk_index);
        }
    }
}

pub struct UploadSession {
    config: UploadConfig,
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialProvider>,
    callbacks: UploadCallbacks,
    progress: ProgressReporter,
    cancel: CancelHandle,
    file: Option<SourceFile>,
    task: Option<UploadTask>,
    state: watch::Sender<UploadState>,
}

impl UploadSession {
    /// Creates a session that talks HTTP to `config.endpoint`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: UploadConfig, credentials: impl CredentialProvider + 'static) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(config.chunk_timeout));
        Self::with_transport(config, credentials, transport)
    }

    /// Creates a session with a custom transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_transport(
        config: UploadConfig,
        credentials: impl CredentialProvider + 'static,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        config.validate()?;
        let (state, _) = watch::channel(UploadState::Idle);

        Ok(Self {
            config,
            transport,
            credentials: Arc::new(credentials),
            callbacks: UploadCallbacks::default(),
            progress: ProgressReporter::default(),
            cancel: CancelHandle::new(),
            file: None,
            task: None,
            state,
        })
    }

    #[must_use]
    pub fn with_callbacks(mut self, callbacks: UploadCallbacks) -> Self {
        self.progress = ProgressReporter::new(callbacks.on_upload_progress.clone());
        self.callbacks = callbacks;
        self
    }

    /// Uses a caller-owned cancel handle, e.g. one shared with a signal handler.
    #[must_use]
    pub fn with_cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    /// Handle that cancels this session's running upload from another task.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    #[must_use]
    pub fn state(&self) -> UploadState {
        *self.state.borrow()
    }

    /// Watches state transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<UploadState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn file(&self) -> Option<&SourceFile> {
        self.file.as_ref()
    }

    #[must_use]
    pub fn task(&self) -> Option<&UploadTask> {
        self.task.as_ref()
    }

    #[must_use]
    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Validates and selects a file.
    ///
    /// An invalid file leaves the session `Idle` with the previous selection
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the file has the wrong type, is too
    /// large, or is empty.
    pub fn select_file(&mut self, file: SourceFile) -> Result<()> {
        self.recover_abandoned();
        self.set_state(UploadState::Validating);

        if let Err(e) = validate_file(&file, self.config.max_file_size, &self.config.accepted_types) {
            info!("Rejected {}: {e}", file.name());
            self.set_state(UploadState::Idle);
            return Err(e.into());
        }

        debug!("Selected {} ({} bytes)", file.name(), file.size());
        self.task = None;
        self.callbacks.file_changed(Some(&file));
        self.file = Some(file);
        self.set_state(UploadState::Idle);
        Ok(())
    }

    /// Clears the selection, cancelling a running upload first.
    pub fn remove_file(&mut self) {
        self.recover_abandoned();
        self.cancel.cancel();
        self.cancel.finish();

        self.file = None;
        self.task = None;
        self.set_state(UploadState::Idle);
        self.callbacks.file_changed(None);
    }

    /// Uploads the selected file, one chunk at a time.
    ///
    /// Each call starts over with a new upload id. Cancellation through
    /// [`CancelHandle::cancel`] is observed before the next chunk is
    /// dispatched (or immediately, if the transport aborts in-flight
    /// requests) and returns `Ok(UploadOutcome::Cancelled)`.
    ///
    /// # Errors
    ///
    /// - [`Error::NoFile`] if no file is selected
    /// - [`Error::Auth`] if the credential provider has no token; nothing is sent
    /// - [`Error::ChunkTransport`] if a chunk fails (after any retries)
    /// - [`Error::Finalization`] if the last response lacks the file reference
    pub async fn start(&mut self) -> Result<UploadOutcome> {
        self.recover_abandoned();
        let file = self.file.clone().ok_or(Error::NoFile)?;

        let chunk_size = self.config.chunk_size;
        let total_chunks = plan_chunks(file.size(), chunk_size);
        let upload_id = new_upload_id();

        self.task = Some(UploadTask {
            upload_id: upload_id.clone(),
            chunk_size,
            total_chunks,
            current_chunk_index: 0,
            state: UploadState::Idle,
            error: None,
        });

        let Some(auth_token) = self.credentials.bearer_token() else {
            return Err(self.fail(Error::Auth));
        };

        let cancel = self.cancel.begin();
        self.set_state(UploadState::Uploading);

        #[allow(clippy::cast_precision_loss)]
        let size_mb = file.size() as f64 / 1024.0 / 1024.0;
        info!(
            "Uploading {} ({size_mb:.2} MB) in {total_chunks} chunk(s) as {upload_id}",
            file.name()
        );

        let result = self
            .run(&file, &upload_id, total_chunks, &auth_token, &cancel)
            .await;
        self.cancel.finish();

        match result {
            Ok(upload_result) => {
                self.progress.report(total_chunks, total_chunks);
                self.set_state(UploadState::Completed);
                info!("Upload {upload_id} complete: {}", upload_result.file_path);
                self.callbacks.completed(&upload_result);
                Ok(UploadOutcome::Completed(upload_result))
            }
            Err(Error::Cancelled) => {
                self.progress.reset();
                self.set_state(UploadState::Cancelled);
                info!("Upload {upload_id} cancelled");
                Ok(UploadOutcome::Cancelled)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn run(
        &mut self,
        file: &SourceFile,
        upload_id: &str,
        total_chunks: u64,
        auth_token: &str,
        cancel: &CancellationToken,
    ) -> Result<UploadResult> {
        let endpoint = self.config.endpoint.clone();
        let extra_fields = self.config.extra_fields.clone();
        let file_type = self.config.file_type.clone();

        for index in 0..total_chunks {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let chunk = chunk_range(index, file.size(), self.config.chunk_size);
            let request = ChunkRequest {
                endpoint: &endpoint,
                upload_id,
                file_name: file.name(),
                chunk_index: index,
                total_chunks,
                data: file.slice(chunk.start, chunk.end),
                file_type: file_type.as_deref(),
                extra_fields: &extra_fields,
            };

            let ack = self.send_with_retry(request, auth_token, cancel).await?;
            debug!(
                "Chunk {}/{total_chunks} acknowledged with status {}",
                index + 1,
                ack.status
            );

            if let Some(task) = self.task.as_mut() {
                task.current_chunk_index = index + 1;
            }

            if index + 1 == total_chunks {
                return finalize(&ack.body);
            }
            self.progress.report(index + 1, total_chunks);
        }

        // Validation rejects empty files, so the loop always returns.
        Err(Error::Finalization("no chunks were sent".to_string()))
    }

    async fn send_with_retry(
        &self,
        request: ChunkRequest<'_>,
        auth_token: &str,
        cancel: &CancellationToken,
    ) -> Result<ChunkAck> {
        let mut attempt = 0;

        loop {
            match self
                .transport
                .send_chunk(request, Some(auth_token), cancel)
                .await
            {
                Ok(ack) => return Ok(ack),
                Err(_) if cancel.is_cancelled() => return Err(Error::Cancelled),
                Err(e) => {
                    attempt += 1;
                    if !self.config.retry.should_retry(&e, attempt) {
                        return Err(e);
                    }

                    let delay = self.config.retry.delay_for(attempt);
                    warn!(
                        "{e}; retrying in {:.1}s (attempt {attempt}/{})",
                        delay.as_secs_f64(),
                        self.config.retry.max_retries
                    );

                    tokio::select! {
                        () = cancel.cancelled() => return Err(Error::Cancelled),
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// Records a terminal failure and notifies the error callback.
    fn fail(&mut self, error: Error) -> Error {
        let chunk_index = error.chunk_index();
        let message = error.to_string();

        match &error {
            Error::Finalization(_) => {
                error!("All chunks were transferred but finalization failed: {message}");
            }
            _ => error!("Upload failed: {message}"),
        }

        if let Some(task) = self.task.as_mut() {
            task.error = Some(TaskError {
                chunk_index,
                message: message.clone(),
            });
        }
        self.set_state(UploadState::Failed);
        self.callbacks.failed(&message, chunk_index);
        error
    }

    /// A `start()` future dropped mid-upload leaves the state at `Uploading`;
    /// since every other method needs `&mut self`, seeing that state here
    /// means the loop is gone.
    fn recover_abandoned(&mut self) {
        if self.state() == UploadState::Uploading {
            warn!("Previous upload was abandoned without finishing");
            self.cancel.cancel();
            self.cancel.finish();
            self.set_state(UploadState::Cancelled);
        }
    }

    fn set_state(&mut self, state: UploadState) {
        if let Some(task) = self.task.as_mut() {
            task.state = state;
        }
        self.state.send_replace(state);
    }
}

fn new_upload_id() -> String {
    format!("upload_{}", Uuid::new_v4().simple())
}
