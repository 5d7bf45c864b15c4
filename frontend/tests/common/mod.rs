#![allow(dead_code)]

use labstand_frontend::error::{ClientError, Result};
use labstand_frontend::live_session::Presenter;
use labstand_frontend::live_session::command_dispatcher::CommandRequest;
use labstand_frontend::live_session::firmware_upload::UploadId;
use labstand_frontend::live_session::mode_reconciler::ModeSnapshot;
use labstand_frontend::live_session::telemetry_channel::ConnectionStatus;
use labstand_frontend::live_session::telemetry_view::TelemetryView;
use labstand_frontend::transport::{MultipartBody, Reply, RigTransport, routes};
use labstand_shared::{ControlMode, FlashReport};
use serde_json::{Value, json};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Get(&'static str),
    Post(&'static str, Value),
    Multipart(&'static str, MultipartBody),
}

/// In-memory rig server with the real server's mode interlocks.
pub struct FakeRig {
    mode: Mutex<ControlMode>,
    upload_enabled: AtomicBool,
    offline: AtomicBool,
    fail_posts: AtomicBool,
    upload_reply: Mutex<Option<Reply>>,
    upload_delay: Mutex<Duration>,
    calls: Mutex<Vec<Call>>,
}

fn refused() -> ClientError {
    ClientError::Io(std::io::Error::new(
        std::io::ErrorKind::ConnectionRefused,
        "connection refused",
    ))
}

impl FakeRig {
    pub fn new(mode: ControlMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            upload_enabled: AtomicBool::new(true),
            offline: AtomicBool::new(false),
            fail_posts: AtomicBool::new(false),
            upload_reply: Mutex::new(None),
            upload_delay: Mutex::new(Duration::ZERO),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set_offline(&self, v: bool) {
        self.offline.store(v, Ordering::SeqCst);
    }

    pub fn set_fail_posts(&self, v: bool) {
        self.fail_posts.store(v, Ordering::SeqCst);
    }

    pub fn set_upload_enabled(&self, v: bool) {
        self.upload_enabled.store(v, Ordering::SeqCst);
    }

    pub fn set_upload_reply(&self, reply: Reply) {
        *self.upload_reply.lock().unwrap() = Some(reply);
    }

    pub fn set_upload_delay(&self, d: Duration) {
        *self.upload_delay.lock().unwrap() = d;
    }

    pub fn mode(&self) -> ControlMode {
        *self.mode.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn posts_to(&self, path: &str) -> Vec<Value> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Post(p, body) if p == path => Some(body),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.offline.load(Ordering::SeqCst) {
            return Err(refused());
        }
        Ok(())
    }

    fn conflict(message: &str) -> Reply {
        Reply::json(409, json!({"ok": false, "error": message}))
    }
}

impl RigTransport for FakeRig {
    async fn get(&self, path: &'static str) -> Result<Reply> {
        self.record(Call::Get(path))?;
        match path {
            routes::MODE => Ok(Reply::json(200, json!({"ok": true, "mode": self.mode().as_str()}))),
            _ => Ok(Reply::json(404, json!({"detail": "Not Found"}))),
        }
    }

    async fn post_json(&self, path: &'static str, body: Value) -> Result<Reply> {
        self.record(Call::Post(path, body.clone()))?;
        if self.fail_posts.load(Ordering::SeqCst) {
            return Err(refused());
        }

        let mode = self.mode();
        match path {
            routes::MODE => {
                let requested = match body["mode"].as_str() {
                    Some("baseline") => ControlMode::Baseline,
                    Some("student") => ControlMode::Student,
                    _ => return Ok(Reply::json(422, json!({"detail": "invalid mode"}))),
                };
                *self.mode.lock().unwrap() = requested;
                let mut reply = json!({"ok": true, "mode": requested.as_str()});
                if requested == ControlMode::Student && !self.upload_enabled.load(Ordering::SeqCst) {
                    reply["warning"] = json!("upload disabled by configuration");
                }
                Ok(Reply::json(200, reply))
            }
            routes::TEACHER_ACTUATORS if mode != ControlMode::Baseline => Ok(Self::conflict(
                "Student firmware mode enabled; web actuators disabled.",
            )),
            routes::STUDENT_ACTUATORS if mode != ControlMode::Baseline => Ok(Self::conflict(
                "Student firmware mode enabled by teacher; web actuators disabled.",
            )),
            routes::HEATER_MANUAL
            | routes::HEATER_RANDOM
            | routes::HEATER_STOP
            | routes::DRAIN_VALVE
            | routes::TEACHER_ACTUATORS
            | routes::STUDENT_ACTUATORS => Ok(Reply::json(200, json!({"ok": true}))),
            _ => Ok(Reply::json(404, json!({"detail": "Not Found"}))),
        }
    }

    async fn post_multipart(&self, path: &'static str, body: MultipartBody) -> Result<Reply> {
        let delay = *self.upload_delay.lock().unwrap();
        self.record(Call::Multipart(path, body.clone()))?;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(reply) = self.upload_reply.lock().unwrap().clone() {
            return Ok(reply);
        }
        if self.mode() != ControlMode::Student {
            return Ok(Self::conflict(
                "Firmware upload disabled; teacher must enable student mode.",
            ));
        }
        Ok(Reply::json(
            200,
            json!({
                "ok": true,
                "message": "uploaded",
                "compile": {"stdout": "Sketch uses 924 bytes", "stderr": ""},
                "upload": {"stdout": "", "stderr": ""},
                "upload_enabled": true,
                "student_port": "/dev/ttyACM1"
            }),
        ))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shown {
    Status(ConnectionStatus),
    Telemetry(TelemetryView),
    Raw(String),
    Mode(ModeSnapshot),
    ModeError(String),
    Flash(String),
    Command { route: &'static str, status: Option<u16> },
    Upload(UploadId, String),
}

/// Presenter that keeps everything it was asked to show.
#[derive(Debug, Default)]
pub struct Recorder {
    pub shown: Vec<Shown>,
}

impl Recorder {
    pub fn last_mode(&self) -> Option<&ModeSnapshot> {
        self.shown.iter().rev().find_map(|s| match s {
            Shown::Mode(m) => Some(m),
            _ => None,
        })
    }

    pub fn uploads(&self) -> Vec<(UploadId, String)> {
        self.shown
            .iter()
            .filter_map(|s| match s {
                Shown::Upload(id, text) => Some((*id, text.clone())),
                _ => None,
            })
            .collect()
    }
}

impl Presenter for Recorder {
    fn connection_status(&mut self, status: ConnectionStatus) {
        self.shown.push(Shown::Status(status));
    }

    fn telemetry(&mut self, view: &TelemetryView, _document: &Value) {
        self.shown.push(Shown::Telemetry(view.clone()));
    }

    fn raw_telemetry(&mut self, text: &str) {
        self.shown.push(Shown::Raw(text.to_string()));
    }

    fn mode(&mut self, snapshot: &ModeSnapshot) {
        self.shown.push(Shown::Mode(snapshot.clone()));
    }

    fn mode_error(&mut self, error: &ClientError) {
        self.shown.push(Shown::ModeError(error.to_string()));
    }

    fn baseline_flash(&mut self, report: &FlashReport) {
        self.shown.push(Shown::Flash(report.summary().to_string()));
    }

    fn command_result(&mut self, request: &CommandRequest, result: &Result<Reply>) {
        self.shown.push(Shown::Command {
            route: request.route(),
            status: result.as_ref().ok().map(|r| r.status),
        });
    }

    fn upload_status(&mut self, id: UploadId, text: &str) {
        self.shown.push(Shown::Upload(id, text.to_string()));
    }
}
