use crate::FlashReport;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which authority may drive the actuators.
///
/// `Unknown` is the state before the first successful fetch, and also what any
/// unrecognized server value decodes to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ControlMode {
    /// Teacher drives actuators by hand; the student board runs baseline firmware.
    Baseline,
    /// Student firmware owns the actuators.
    Student,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ControlMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlMode::Baseline => "baseline",
            ControlMode::Student => "student",
            ControlMode::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseModeError(pub String);

impl fmt::Display for ParseModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown mode '{}' (expected baseline or student)", self.0)
    }
}

impl std::error::Error for ParseModeError {}

impl FromStr for ControlMode {
    type Err = ParseModeError;

    /// Only the two settable modes parse; `unknown` is never requested.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "baseline" => Ok(ControlMode::Baseline),
            "student" => Ok(ControlMode::Student),
            other => Err(ParseModeError(other.to_string())),
        }
    }
}

/// Body of `POST /api/teacher/student_mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeRequest {
    pub mode: ControlMode,
}

/// Reply of both `GET` and `POST /api/teacher/student_mode`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModeReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    #[serde(default)]
    pub mode: Option<ControlMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    /// Present when switching to baseline triggered a baseline reflash.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_flash: Option<FlashReport>,
}

impl ModeReply {
    /// The mode the server reports, `Unknown` when it reported none.
    pub fn effective_mode(&self) -> ControlMode {
        self.mode.unwrap_or_default()
    }

    /// Warning text, with empty strings treated as absent.
    pub fn warning_text(&self) -> Option<&str> {
        self.warning.as_deref().filter(|w| !w.is_empty())
    }
}
