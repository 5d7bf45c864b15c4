//! The live control session: one telemetry stream, one mode view, and the
//! command and upload traffic the operator triggers.
//!
//! Everything that touches session state goes through [`SessionController::dispatch`].
//! Network calls run on spawned tasks and report back as [`SessionEvent`]s on the
//! same queue, so state is only ever mutated in one place and in arrival order.

pub mod command_dispatcher;
pub mod firmware_upload;
pub mod mode_reconciler;
pub mod telemetry_channel;
pub mod telemetry_view;

use crate::error::ClientError;
use crate::transport::{Reply, RigTransport};
use command_dispatcher::{
    ActuatorForm, Authority, CommandDispatcher, CommandRequest, HeaterManualForm, HeaterRandomForm,
};
use firmware_upload::{
    FirmwareForm, FirmwareUploadSequencer, UploadAttempt, UploadId, UploadOutcome,
};
use labstand_shared::{ControlMode, DrainValveBody, FlashReport, ModeReply, TelemetrySample};
use mode_reconciler::{ModeReconciler, ModeSnapshot, ModeSource, Surface};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use telemetry_channel::{ConnectionStatus, Connector, TelemetryChannel, TelemetryEvent};
use telemetry_view::TelemetryView;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Where the session's output goes.
pub trait Presenter: Send + 'static {
    fn connection_status(&mut self, status: ConnectionStatus);

    fn telemetry(&mut self, view: &TelemetryView, document: &Value);

    fn raw_telemetry(&mut self, text: &str);

    fn mode(&mut self, snapshot: &ModeSnapshot);

    fn mode_error(&mut self, _error: &ClientError) {}

    fn baseline_flash(&mut self, _report: &FlashReport) {}

    fn command_result(&mut self, request: &CommandRequest, result: &Result<Reply, ClientError>);

    fn upload_status(&mut self, id: UploadId, text: &str);
}

/// Something the operator asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum UserIntent {
    HeaterManual(HeaterManualForm),
    HeaterRandom(HeaterRandomForm),
    HeaterStop,
    DrainValve { open: bool },
    Actuators {
        authority: Authority,
        form: ActuatorForm,
    },
    SetMode(ControlMode),
    RefreshMode,
    UploadFirmware(FirmwareForm),
}

impl UserIntent {
    /// The control surface this intent belongs to, if it is gated at all.
    pub fn surface(&self) -> Option<Surface> {
        match self {
            UserIntent::HeaterManual(_)
            | UserIntent::HeaterRandom(_)
            | UserIntent::HeaterStop
            | UserIntent::DrainValve { .. }
            | UserIntent::Actuators { .. } => Some(Surface::ManualControls),
            UserIntent::UploadFirmware(_) => Some(Surface::FirmwareUpload),
            UserIntent::SetMode(_) | UserIntent::RefreshMode => None,
        }
    }
}

#[derive(Debug)]
pub enum SessionEvent {
    Telemetry(TelemetryEvent),
    Intent(UserIntent),
    ModeReplied {
        source: ModeSource,
        result: Result<ModeReply, ClientError>,
    },
    CommandFinished {
        request: CommandRequest,
        result: Result<Reply, ClientError>,
    },
    UploadFinished {
        id: UploadId,
        outcome: UploadOutcome,
    },
    Shutdown,
}

impl From<TelemetryEvent> for SessionEvent {
    fn from(ev: TelemetryEvent) -> Self {
        SessionEvent::Telemetry(ev)
    }
}

impl From<UserIntent> for SessionEvent {
    fn from(intent: UserIntent) -> Self {
        SessionEvent::Intent(intent)
    }
}

#[derive(Debug, Default)]
pub struct SessionState {
    pub connection: ConnectionStatus,
    pub reconciler: ModeReconciler,
    pub last_sample: Option<TelemetrySample>,
    /// Attempts still waiting on the server; dropped once they finish.
    pub uploads: BTreeMap<UploadId, UploadAttempt>,
    next_upload: u64,
}

impl SessionState {
    fn next_upload_id(&mut self) -> UploadId {
        self.next_upload += 1;
        UploadId(self.next_upload)
    }
}

/// Cloneable sender for feeding a running session.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionHandle {
    /// Returns `false` once the session is gone.
    pub fn submit(&self, intent: UserIntent) -> bool {
        self.tx.send(SessionEvent::Intent(intent)).is_ok()
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(SessionEvent::Shutdown);
    }
}

pub struct SessionController<T, P> {
    state: SessionState,
    transport: Arc<T>,
    dispatcher: CommandDispatcher<T>,
    sequencer: FirmwareUploadSequencer<T>,
    presenter: P,
    tx: mpsc::UnboundedSender<SessionEvent>,
    rx: mpsc::UnboundedReceiver<SessionEvent>,
    telemetry_task: Option<JoinHandle<()>>,
}

impl<T: RigTransport, P: Presenter> SessionController<T, P> {
    pub fn new(transport: Arc<T>, presenter: P, upload_timeout: Option<Duration>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            state: SessionState::default(),
            dispatcher: CommandDispatcher::new(Arc::clone(&transport)),
            sequencer: FirmwareUploadSequencer::new(Arc::clone(&transport), upload_timeout),
            transport,
            presenter,
            tx,
            rx,
            telemetry_task: None,
        }
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            tx: self.tx.clone(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    /// Opens the telemetry stream and fetches the initial mode.
    pub fn start<C: Connector>(&mut self, channel: TelemetryChannel<C>) {
        let task = tokio::spawn(channel.run(self.tx.clone()));
        self.telemetry_task = Some(task);
        self.spawn_mode_fetch();
    }

    /// Waits for and handles one event. Returns `false` on shutdown.
    pub async fn step(&mut self) -> bool {
        match self.rx.recv().await {
            Some(SessionEvent::Shutdown) | None => false,
            Some(event) => {
                self.dispatch(event);
                true
            }
        }
    }

    pub async fn run(mut self) -> P {
        while self.step().await {}
        if let Some(task) = self.telemetry_task.take() {
            task.abort();
        }
        tracing::info!("session closed");
        self.presenter
    }

    pub fn dispatch(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Telemetry(ev) => self.on_telemetry(ev),
            SessionEvent::Intent(intent) => self.on_intent(intent),
            SessionEvent::ModeReplied { source, result } => self.on_mode_reply(source, result),
            SessionEvent::CommandFinished { request, result } => {
                self.presenter.command_result(&request, &result);
            }
            SessionEvent::UploadFinished { id, outcome } => self.on_upload_finished(id, outcome),
            SessionEvent::Shutdown => {}
        }
    }

    fn on_telemetry(&mut self, ev: TelemetryEvent) {
        match ev {
            TelemetryEvent::Status(status) => {
                self.state.connection = status;
                self.presenter.connection_status(status);
            }
            TelemetryEvent::Sample { sample, document } => {
                let view = TelemetryView::from_sample(&sample);
                self.presenter.telemetry(&view, &document);
                self.state.last_sample = Some(sample);
            }
            TelemetryEvent::Raw(text) => self.presenter.raw_telemetry(&text),
        }
    }

    fn on_intent(&mut self, intent: UserIntent) {
        if let Some(surface) = intent.surface()
            && !self.state.reconciler.permits(surface)
        {
            tracing::debug!(
                ?surface,
                mode = %self.state.reconciler.mode(),
                "control disabled, intent dropped"
            );
            return;
        }

        match intent {
            UserIntent::HeaterManual(form) => self.spawn_command(form.to_request()),
            UserIntent::HeaterRandom(form) => self.spawn_command(form.to_request()),
            UserIntent::HeaterStop => self.spawn_command(CommandRequest::HeaterStop),
            UserIntent::DrainValve { open } => {
                self.spawn_command(CommandRequest::DrainValve(DrainValveBody { open }))
            }
            UserIntent::Actuators { authority, form } => {
                self.spawn_command(form.to_request(authority))
            }
            UserIntent::SetMode(mode) => self.spawn_mode_switch(mode),
            UserIntent::RefreshMode => self.spawn_mode_fetch(),
            UserIntent::UploadFirmware(form) => self.start_upload(form),
        }
    }

    fn on_mode_reply(&mut self, source: ModeSource, result: Result<ModeReply, ClientError>) {
        match result {
            Ok(reply) => {
                if let Some(report) = &reply.baseline_flash {
                    tracing::info!("baseline flash: {}", report.summary());
                    self.presenter.baseline_flash(report);
                }
                let snapshot = self.state.reconciler.apply(source, &reply);
                tracing::info!(mode = %snapshot.mode, ?source, "mode updated");
                self.presenter.mode(snapshot);
            }
            Err(e) => {
                tracing::warn!(?source, "mode call failed: {e}");
                self.presenter.mode_error(&e);
                let snapshot = self.state.reconciler.invalidate();
                self.presenter.mode(snapshot);
            }
        }
    }

    fn on_upload_finished(&mut self, id: UploadId, outcome: UploadOutcome) {
        if self.state.uploads.remove(&id).is_none() {
            tracing::warn!(%id, "result for unknown upload");
        }
        self.presenter.upload_status(id, &outcome.status_text());
    }

    fn spawn_command(&self, request: CommandRequest) {
        let dispatcher = self.dispatcher.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = dispatcher.send(&request).await;
            let _ = tx.send(SessionEvent::CommandFinished { request, result });
        });
    }

    fn spawn_mode_fetch(&self) {
        let transport = Arc::clone(&self.transport);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = mode_reconciler::fetch_mode(&*transport).await;
            let _ = tx.send(SessionEvent::ModeReplied {
                source: ModeSource::Fetch,
                result,
            });
        });
    }

    /// Set, then re-fetch regardless of how the set went.
    fn spawn_mode_switch(&self, mode: ControlMode) {
        let transport = Arc::clone(&self.transport);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = mode_reconciler::set_mode(&*transport, mode).await;
            let sent = tx.send(SessionEvent::ModeReplied {
                source: ModeSource::Set,
                result,
            });
            if sent.is_err() {
                return;
            }
            let result = mode_reconciler::fetch_mode(&*transport).await;
            let _ = tx.send(SessionEvent::ModeReplied {
                source: ModeSource::Fetch,
                result,
            });
        });
    }

    fn start_upload(&mut self, form: FirmwareForm) {
        let id = self.state.next_upload_id();
        let mut attempt = UploadAttempt::new(id);
        let job = attempt.submit(form);
        if let Some(text) = attempt.state().status_text() {
            self.presenter.upload_status(id, &text);
        }
        if let Some(job) = job {
            self.state.uploads.insert(id, attempt);
            let sequencer = self.sequencer.clone();
            let tx = self.tx.clone();
            tokio::spawn(async move {
                let outcome = sequencer.upload(&job).await;
                let _ = tx.send(SessionEvent::UploadFinished { id, outcome });
            });
        }
    }
}
