// frontend/src/terminal.rs

use crate::error::ClientError;
use crate::live_session::Presenter;
use crate::live_session::command_dispatcher::CommandRequest;
use crate::live_session::firmware_upload::UploadId;
use crate::live_session::mode_reconciler::ModeSnapshot;
use crate::live_session::telemetry_channel::ConnectionStatus;
use crate::live_session::telemetry_view::{TelemetryView, pretty_document};
use crate::transport::Reply;
use labstand_shared::FlashReport;
use serde_json::Value;

fn stamp() -> String {
    chrono::Local::now().format("%H:%M:%S%.3f").to_string()
}

/// Prints session output to stdout.
pub struct TerminalPresenter {
    /// Print every n-th telemetry frame.
    telemetry_every: u32,
    /// Also print the whole frame as indented JSON.
    show_document: bool,
    seen: u64,
}

impl TerminalPresenter {
    pub fn new(telemetry_every: u32, show_document: bool) -> Self {
        Self {
            telemetry_every: telemetry_every.max(1),
            show_document,
            seen: 0,
        }
    }
}

impl Presenter for TerminalPresenter {
    fn connection_status(&mut self, status: ConnectionStatus) {
        println!("[{}] telemetry {status}", stamp());
    }

    fn telemetry(&mut self, view: &TelemetryView, document: &Value) {
        self.seen += 1;
        if self.seen % u64::from(self.telemetry_every) != 0 {
            return;
        }
        let line = view
            .fields()
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("  ");
        println!("[{}] {line}", stamp());
        if self.show_document {
            println!("{}", pretty_document(document));
        }
    }

    fn raw_telemetry(&mut self, text: &str) {
        println!("[{}] raw: {text}", stamp());
    }

    fn mode(&mut self, snapshot: &ModeSnapshot) {
        println!("[{}] mode: {}", stamp(), snapshot.mode);
        if let Some(warning) = &snapshot.warning {
            println!("    warning: {warning}");
        }
        let gate = snapshot.gate;
        let manual = if gate.manual_controls { "enabled" } else { "disabled" };
        println!("    manual controls {manual} {}", gate.manual_note());
        println!("    {}", gate.upload_note());
    }

    fn mode_error(&mut self, error: &ClientError) {
        println!("[{}] mode request failed: {error}", stamp());
    }

    fn baseline_flash(&mut self, report: &FlashReport) {
        let outcome = if report.ok { "ok" } else { "failed" };
        println!("[{}] baseline flash {outcome}: {}", stamp(), report.summary());
    }

    fn command_result(&mut self, request: &CommandRequest, result: &Result<Reply, ClientError>) {
        match result {
            Ok(reply) => println!(
                "[{}] {request} -> HTTP {}\n{}",
                stamp(),
                reply.status,
                reply.display()
            ),
            Err(e) => println!("[{}] {request} failed: {e}", stamp()),
        }
    }

    fn upload_status(&mut self, id: UploadId, text: &str) {
        println!("[{}] upload {id}: {text}", stamp());
    }
}
