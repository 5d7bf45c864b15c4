//! Tracks who owns the actuators and which control surfaces that allows.
//!
//! The server is the only authority on the mode. Every reply replaces the
//! local view, and mode and gate always change in the same step, so no
//! caller ever sees a gate that disagrees with the mode next to it.

use crate::error::{ClientError, Result};
use crate::transport::{Reply, ReplyBody, RigTransport, routes};
use labstand_shared::{ControlMode, ModeReply, ModeRequest};

pub const MANUAL_DISABLED_NOTE: &str = "Student firmware controls actuators.";
pub const UPLOAD_ENABLED_NOTE: &str = "Upload is enabled by teacher.";
pub const UPLOAD_DISABLED_NOTE: &str = "Upload disabled; teacher must enable student firmware mode.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Surface {
    /// Heater, drain valve and actuator commands.
    ManualControls,
    FirmwareUpload,
}

/// Enablement of the two mutually exclusive control surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeGate {
    pub manual_controls: bool,
    pub firmware_upload: bool,
}

impl ModeGate {
    pub fn for_mode(mode: ControlMode) -> Self {
        match mode {
            ControlMode::Baseline => Self {
                manual_controls: true,
                firmware_upload: false,
            },
            ControlMode::Student => Self {
                manual_controls: false,
                firmware_upload: true,
            },
            ControlMode::Unknown => Self {
                manual_controls: false,
                firmware_upload: false,
            },
        }
    }

    pub fn permits(&self, surface: Surface) -> bool {
        match surface {
            Surface::ManualControls => self.manual_controls,
            Surface::FirmwareUpload => self.firmware_upload,
        }
    }

    pub fn manual_note(&self) -> &'static str {
        if self.manual_controls {
            ""
        } else {
            MANUAL_DISABLED_NOTE
        }
    }

    pub fn upload_note(&self) -> &'static str {
        if self.firmware_upload {
            UPLOAD_ENABLED_NOTE
        } else {
            UPLOAD_DISABLED_NOTE
        }
    }
}

impl Default for ModeGate {
    fn default() -> Self {
        Self::for_mode(ControlMode::Unknown)
    }
}

/// Which call a mode reply answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeSource {
    Fetch,
    Set,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModeSnapshot {
    pub mode: ControlMode,
    pub warning: Option<String>,
    pub gate: ModeGate,
}

#[derive(Debug, Default)]
pub struct ModeReconciler {
    snapshot: ModeSnapshot,
}

impl ModeReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> &ModeSnapshot {
        &self.snapshot
    }

    pub fn mode(&self) -> ControlMode {
        self.snapshot.mode
    }

    pub fn gate(&self) -> ModeGate {
        self.snapshot.gate
    }

    pub fn permits(&self, surface: Surface) -> bool {
        self.snapshot.gate.permits(surface)
    }

    /// Applies a server reply.
    ///
    /// A set reply replaces the warning (clearing it when absent). A fetch
    /// reply only replaces it when it carries one.
    pub fn apply(&mut self, source: ModeSource, reply: &ModeReply) -> &ModeSnapshot {
        let mode = reply.effective_mode();
        match source {
            ModeSource::Set => {
                self.snapshot.warning = reply.warning_text().map(str::to_owned);
            }
            ModeSource::Fetch => {
                if let Some(w) = reply.warning_text() {
                    self.snapshot.warning = Some(w.to_owned());
                }
            }
        }
        self.snapshot.mode = mode;
        self.snapshot.gate = ModeGate::for_mode(mode);
        &self.snapshot
    }

    /// A mode call failed: the authority is no longer known, close both surfaces.
    pub fn invalidate(&mut self) -> &ModeSnapshot {
        self.snapshot.mode = ControlMode::Unknown;
        self.snapshot.gate = ModeGate::for_mode(ControlMode::Unknown);
        &self.snapshot
    }

    /// Fetch and apply.
    pub async fn refresh<T: RigTransport>(&mut self, transport: &T) -> Result<ModeSnapshot> {
        match fetch_mode(transport).await {
            Ok(reply) => Ok(self.apply(ModeSource::Fetch, &reply).clone()),
            Err(e) => {
                tracing::warn!("mode fetch failed: {e}");
                self.invalidate();
                Err(e)
            }
        }
    }

    /// Set, apply, then re-fetch and apply. The re-fetch runs even when the
    /// set failed, so the final state is always the server's.
    pub async fn switch<T: RigTransport>(
        &mut self,
        transport: &T,
        mode: ControlMode,
    ) -> Result<ModeSnapshot> {
        match set_mode(transport, mode).await {
            Ok(reply) => {
                self.apply(ModeSource::Set, &reply);
            }
            Err(e) => {
                tracing::warn!("mode set to {mode} failed: {e}");
                self.invalidate();
            }
        }
        self.refresh(transport).await
    }
}

fn decode_mode_reply(reply: Reply) -> Result<ModeReply> {
    if !reply.is_success() {
        return Err(ClientError::UnexpectedReply {
            status: reply.status,
            body: reply.display(),
        });
    }
    match reply.body {
        ReplyBody::Json(v) => Ok(serde_json::from_value::<ModeReply>(v)?),
        ReplyBody::Text(body) => Err(ClientError::UnexpectedReply {
            status: reply.status,
            body,
        }),
    }
}

pub async fn fetch_mode<T: RigTransport>(transport: &T) -> Result<ModeReply> {
    let reply = transport.get(routes::MODE).await?;
    decode_mode_reply(reply)
}

pub async fn set_mode<T: RigTransport>(transport: &T, mode: ControlMode) -> Result<ModeReply> {
    let body = serde_json::to_value(ModeRequest { mode })?;
    tracing::info!("requesting mode {mode}");
    let reply = transport.post_json(routes::MODE, body).await?;
    decode_mode_reply(reply)
}
