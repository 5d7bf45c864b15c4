use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreamOutput {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
}

/// Result of one compile + flash run on the server.
///
/// Returned by the firmware upload endpoint and embedded as `baseline_flash`
/// in mode-switch replies. Every field is optional on the wire; error replies
/// (HTTP 409/400) carry only `ok` and `error`/`detail`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FlashReport {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub compile: StreamOutput,
    #[serde(default)]
    pub upload: StreamOutput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_port: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FlashReport {
    /// One-line summary for logs: the message, or the error on rejected uploads.
    pub fn summary(&self) -> &str {
        if !self.message.is_empty() {
            &self.message
        } else {
            self.error.as_deref().unwrap_or("")
        }
    }
}
