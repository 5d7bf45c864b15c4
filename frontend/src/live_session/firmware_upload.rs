// frontend/src/live_session/firmware_upload.rs

use crate::error::{ClientError, Result};
use crate::transport::{MultipartBody, Reply, ReplyBody, RigTransport, routes};
use labstand_shared::FlashReport;
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_BOARD_FQBN: &str = "arduino:avr:uno";
pub const CHOOSE_A_FILE: &str = "choose a file";
pub const UPLOADING: &str = "uploading...";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl FirmwareFile {
    pub async fn read(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "firmware.ino".to_string());
        Ok(Self { name, bytes })
    }
}

/// What the operator filled in. Empty strings mean "not given".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirmwareForm {
    pub file: Option<FirmwareFile>,
    pub board_fqbn: String,
    pub sketch_main: String,
}

/// A submission that passed the file check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadJob {
    pub file: FirmwareFile,
    pub board_fqbn: String,
    pub sketch_main: Option<String>,
}

impl UploadJob {
    pub fn new(file: FirmwareFile, board_fqbn: &str, sketch_main: &str) -> Self {
        let board_fqbn = if board_fqbn.is_empty() {
            DEFAULT_BOARD_FQBN.to_string()
        } else {
            board_fqbn.to_string()
        };
        let sketch_main = (!sketch_main.is_empty()).then(|| sketch_main.to_string());
        Self {
            file,
            board_fqbn,
            sketch_main,
        }
    }

    pub fn to_multipart(&self) -> MultipartBody {
        let mut fields = vec![("board_fqbn", self.board_fqbn.clone())];
        if let Some(sketch) = &self.sketch_main {
            fields.push(("sketch_main", sketch.clone()));
        }
        MultipartBody {
            file_field: "file",
            file_name: self.file.name.clone(),
            file_bytes: self.file.bytes.clone(),
            fields,
        }
    }
}

/// How an upload attempt ended.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    /// The server answered with a JSON document, shown verbatim whatever its
    /// status or `ok` flag.
    Responded(Value),
    /// No usable answer: the message to show instead.
    Failed(String),
}

impl UploadOutcome {
    pub fn status_text(&self) -> String {
        match self {
            UploadOutcome::Responded(v) => {
                serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string())
            }
            UploadOutcome::Failed(msg) => msg.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum UploadState {
    #[default]
    Idle,
    AwaitingFileCheck,
    Uploading,
    Done(UploadOutcome),
}

impl UploadState {
    /// Text for the upload status area; `None` while nothing has been shown yet.
    pub fn status_text(&self) -> Option<String> {
        match self {
            UploadState::Idle | UploadState::AwaitingFileCheck => None,
            UploadState::Uploading => Some(UPLOADING.to_string()),
            UploadState::Done(outcome) => Some(outcome.status_text()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UploadId(pub u64);

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One submission and its own status. Overlapping uploads never share one.
#[derive(Debug)]
pub struct UploadAttempt {
    id: UploadId,
    state: UploadState,
}

impl UploadAttempt {
    pub fn new(id: UploadId) -> Self {
        Self {
            id,
            state: UploadState::Idle,
        }
    }

    pub fn id(&self) -> UploadId {
        self.id
    }

    pub fn state(&self) -> &UploadState {
        &self.state
    }

    /// Runs the file check. Returns the job to send, or `None` when the attempt
    /// already ended with "choose a file".
    pub fn submit(&mut self, form: FirmwareForm) -> Option<UploadJob> {
        self.state = UploadState::AwaitingFileCheck;
        match form.file {
            None => {
                self.state = UploadState::Done(UploadOutcome::Failed(CHOOSE_A_FILE.to_string()));
                None
            }
            Some(file) => {
                self.state = UploadState::Uploading;
                Some(UploadJob::new(file, &form.board_fqbn, &form.sketch_main))
            }
        }
    }

    pub fn finish(&mut self, outcome: UploadOutcome) {
        self.state = UploadState::Done(outcome);
    }
}

// ---------- Sequencer ----------

pub struct FirmwareUploadSequencer<T> {
    transport: Arc<T>,
    timeout: Option<Duration>,
}

impl<T> Clone for FirmwareUploadSequencer<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            timeout: self.timeout,
        }
    }
}

impl<T: RigTransport> FirmwareUploadSequencer<T> {
    pub fn new(transport: Arc<T>, timeout: Option<Duration>) -> Self {
        Self { transport, timeout }
    }

    /// Sends one job. Compiles and flashes can take minutes, so there is no
    /// deadline unless one was configured.
    pub async fn upload(&self, job: &UploadJob) -> UploadOutcome {
        let send = self
            .transport
            .post_multipart(routes::FIRMWARE_UPLOAD, job.to_multipart());

        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, send).await {
                Ok(r) => r,
                Err(_) => Err(ClientError::Timeout(limit)),
            },
            None => send.await,
        };

        match result {
            Ok(Reply {
                status,
                body: ReplyBody::Json(v),
            }) => {
                match serde_json::from_value::<FlashReport>(v.clone()) {
                    Ok(report) if report.ok => {
                        tracing::info!(status, "firmware upload: {}", report.summary());
                    }
                    Ok(report) => {
                        tracing::warn!(status, "firmware upload failed: {}", report.summary());
                    }
                    Err(_) => tracing::warn!(status, "firmware upload reply has no flash report"),
                }
                UploadOutcome::Responded(v)
            }
            Ok(Reply {
                status,
                body: ReplyBody::Text(text),
            }) => {
                tracing::warn!(status, "firmware upload reply is not JSON");
                if text.trim().is_empty() {
                    UploadOutcome::Failed(format!("empty reply (HTTP {status})"))
                } else {
                    UploadOutcome::Failed(text)
                }
            }
            Err(e) => {
                tracing::warn!("firmware upload failed: {e}");
                UploadOutcome::Failed(e.to_string())
            }
        }
    }

    /// One complete attempt, reporting every status change through `on_status`.
    pub async fn run(
        &self,
        attempt: &mut UploadAttempt,
        form: FirmwareForm,
        mut on_status: impl FnMut(&UploadState),
    ) {
        let job = attempt.submit(form);
        on_status(attempt.state());
        if let Some(job) = job {
            let outcome = self.upload(&job).await;
            attempt.finish(outcome);
            on_status(attempt.state());
        }
    }
}
