mod common;

use common::{Call, FakeRig, Recorder, Shown};
use labstand_frontend::live_session::command_dispatcher::{
    ActuatorForm, Authority, HeaterManualForm,
};
use labstand_frontend::live_session::firmware_upload::{
    CHOOSE_A_FILE, FirmwareFile, FirmwareForm, UPLOADING, UploadId,
};
use labstand_frontend::live_session::mode_reconciler::{
    MANUAL_DISABLED_NOTE, ModeSnapshot, Surface,
};
use labstand_frontend::live_session::telemetry_channel::{ConnectionStatus, TelemetryEvent};
use labstand_frontend::live_session::{SessionController, SessionEvent, UserIntent};
use labstand_frontend::transport::routes;
use labstand_shared::{ControlMode, Reading};
use serde_json::json;
use std::sync::Arc;

fn session(rig: &Arc<FakeRig>) -> SessionController<FakeRig, Recorder> {
    SessionController::new(Arc::clone(rig), Recorder::default(), None)
}

fn intent(s: &mut SessionController<FakeRig, Recorder>, intent: UserIntent) {
    s.dispatch(SessionEvent::Intent(intent));
}

fn sketch() -> FirmwareFile {
    FirmwareFile {
        name: "blink.ino".into(),
        bytes: b"void setup(){}\nvoid loop(){}\n".to_vec(),
    }
}

#[tokio::test]
async fn everything_is_locked_until_the_mode_is_known() {
    let rig = Arc::new(FakeRig::new(ControlMode::Baseline));
    let mut s = session(&rig);

    let state = s.state();
    assert_eq!(state.reconciler.mode(), ControlMode::Unknown);
    assert!(!state.reconciler.permits(Surface::ManualControls));
    assert!(!state.reconciler.permits(Surface::FirmwareUpload));

    intent(&mut s, UserIntent::HeaterStop);
    intent(
        &mut s,
        UserIntent::UploadFirmware(FirmwareForm {
            file: Some(sketch()),
            ..Default::default()
        }),
    );

    intent(&mut s, UserIntent::RefreshMode);
    assert!(s.step().await);

    // only the refresh reached the server
    assert_eq!(rig.calls(), vec![Call::Get(routes::MODE)]);
    assert_eq!(s.state().reconciler.mode(), ControlMode::Baseline);
    assert!(s.state().uploads.is_empty());
}

#[tokio::test]
async fn baseline_to_student_handover() {
    let rig = Arc::new(FakeRig::new(ControlMode::Baseline));
    let mut s = session(&rig);

    intent(&mut s, UserIntent::RefreshMode);
    assert!(s.step().await);
    let gate = s.state().reconciler.gate();
    assert!(gate.manual_controls);
    assert!(!gate.firmware_upload);

    intent(
        &mut s,
        UserIntent::HeaterManual(HeaterManualForm { power: "40".into() }),
    );
    assert!(s.step().await);
    assert_eq!(rig.posts_to(routes::HEATER_MANUAL), vec![json!({"power": 40})]);

    // set reply, then the follow-up fetch
    intent(&mut s, UserIntent::SetMode(ControlMode::Student));
    assert!(s.step().await);
    assert!(s.step().await);
    assert_eq!(s.state().reconciler.mode(), ControlMode::Student);
    let gate = s.state().reconciler.gate();
    assert!(!gate.manual_controls);
    assert!(gate.firmware_upload);
    assert_eq!(gate.manual_note(), MANUAL_DISABLED_NOTE);

    // manual controls are now disabled: nothing is sent
    intent(
        &mut s,
        UserIntent::Actuators {
            authority: Authority::Teacher,
            form: ActuatorForm {
                pump: "100".into(),
                fan: ["1".into(), "2".into(), "3".into()],
            },
        },
    );
    assert!(rig.posts_to(routes::TEACHER_ACTUATORS).is_empty());

    intent(
        &mut s,
        UserIntent::UploadFirmware(FirmwareForm {
            file: Some(sketch()),
            ..Default::default()
        }),
    );
    assert!(s.step().await);

    let uploads = s.presenter().uploads();
    assert_eq!(uploads[0], (UploadId(1), UPLOADING.to_string()));
    assert!(uploads[1].1.contains("\"message\": \"uploaded\""));
    assert!(s.state().uploads.is_empty());

    let calls = rig.calls();
    let Some(Call::Multipart(path, body)) = calls.last() else {
        panic!("no upload sent");
    };
    assert_eq!(*path, routes::FIRMWARE_UPLOAD);
    assert_eq!(body.field("board_fqbn"), Some("arduino:avr:uno"));
    assert_eq!(body.field("sketch_main"), None);
}

#[tokio::test]
async fn failed_set_still_refreshes_from_server() {
    let rig = Arc::new(FakeRig::new(ControlMode::Baseline));
    let mut s = session(&rig);

    intent(&mut s, UserIntent::RefreshMode);
    assert!(s.step().await);

    rig.set_fail_posts(true);
    intent(&mut s, UserIntent::SetMode(ControlMode::Student));

    assert!(s.step().await);
    assert_eq!(s.state().reconciler.mode(), ControlMode::Unknown);
    assert!(matches!(
        s.presenter().shown.iter().rev().nth(1),
        Some(Shown::ModeError(_))
    ));

    assert!(s.step().await);
    assert_eq!(s.state().reconciler.mode(), ControlMode::Baseline);
    assert_eq!(
        rig.calls(),
        vec![
            Call::Get(routes::MODE),
            Call::Post(routes::MODE, json!({"mode": "student"})),
            Call::Get(routes::MODE),
        ]
    );
}

#[tokio::test]
async fn unreachable_server_leaves_mode_unknown() {
    let rig = Arc::new(FakeRig::new(ControlMode::Student));
    rig.set_offline(true);
    let mut s = session(&rig);

    intent(&mut s, UserIntent::RefreshMode);
    assert!(s.step().await);

    assert_eq!(s.presenter().last_mode(), Some(&ModeSnapshot::default()));
    assert!(!s.state().reconciler.permits(Surface::FirmwareUpload));
}

#[tokio::test]
async fn warning_survives_refresh_but_not_the_next_set() {
    let rig = Arc::new(FakeRig::new(ControlMode::Baseline));
    rig.set_upload_enabled(false);
    let mut s = session(&rig);

    intent(&mut s, UserIntent::SetMode(ControlMode::Student));
    assert!(s.step().await);
    assert_eq!(
        s.state().reconciler.snapshot().warning.as_deref(),
        Some("upload disabled by configuration")
    );

    // the refresh reply carries no warning; the old one stays
    assert!(s.step().await);
    assert_eq!(
        s.state().reconciler.snapshot().warning.as_deref(),
        Some("upload disabled by configuration")
    );

    intent(&mut s, UserIntent::SetMode(ControlMode::Baseline));
    assert!(s.step().await);
    assert_eq!(s.state().reconciler.snapshot().warning, None);
    assert!(s.step().await);
    assert_eq!(s.state().reconciler.mode(), ControlMode::Baseline);
}

#[tokio::test]
async fn upload_without_file_asks_for_one() {
    let rig = Arc::new(FakeRig::new(ControlMode::Student));
    let mut s = session(&rig);

    intent(&mut s, UserIntent::RefreshMode);
    assert!(s.step().await);

    intent(&mut s, UserIntent::UploadFirmware(FirmwareForm::default()));

    assert_eq!(
        s.presenter().uploads(),
        vec![(UploadId(1), CHOOSE_A_FILE.to_string())]
    );
    assert!(s.state().uploads.is_empty());
    assert_eq!(rig.calls(), vec![Call::Get(routes::MODE)]);
}

#[tokio::test]
async fn overlapping_uploads_report_separately() {
    let rig = Arc::new(FakeRig::new(ControlMode::Student));
    let mut s = session(&rig);

    intent(&mut s, UserIntent::RefreshMode);
    assert!(s.step().await);

    for _ in 0..2 {
        intent(
            &mut s,
            UserIntent::UploadFirmware(FirmwareForm {
                file: Some(sketch()),
                ..Default::default()
            }),
        );
    }
    assert_eq!(
        s.state().uploads.keys().copied().collect::<Vec<_>>(),
        vec![UploadId(1), UploadId(2)]
    );
    assert!(s.step().await);
    assert!(s.step().await);
    assert!(s.state().uploads.is_empty());

    let uploads = s.presenter().uploads();
    assert_eq!(uploads.len(), 4);
    for id in [UploadId(1), UploadId(2)] {
        let texts: Vec<_> = uploads.iter().filter(|(i, _)| *i == id).collect();
        assert_eq!(texts.len(), 2);
        assert_eq!(texts[0].1, UPLOADING);
    }
}

#[tokio::test]
async fn telemetry_events_reach_the_presenter() {
    let rig = Arc::new(FakeRig::new(ControlMode::Baseline));
    let mut s = session(&rig);

    s.dispatch(SessionEvent::Telemetry(TelemetryEvent::Status(
        ConnectionStatus::Connected,
    )));
    s.dispatch(SessionEvent::Telemetry(TelemetryEvent::parse(
        r#"{"type":"telemetry","t1":23.41,"fan":[10,20,30],"drain_valve":1}"#,
    )));
    s.dispatch(SessionEvent::Telemetry(TelemetryEvent::parse("hello")));

    assert_eq!(s.state().connection, ConnectionStatus::Connected);
    assert_eq!(
        s.state().last_sample.as_ref().and_then(|t| t.t1.clone()),
        Some(Reading(json!(23.41)))
    );

    let shown = &s.presenter().shown;
    assert_eq!(shown[0], Shown::Status(ConnectionStatus::Connected));
    let Shown::Telemetry(view) = &shown[1] else {
        panic!("expected telemetry, got {:?}", shown[1]);
    };
    assert_eq!(view.t1, "23.41");
    assert_eq!(view.t2, "n/a");
    assert_eq!(view.fan, "10, 20, 30");
    assert_eq!(view.drain_valve, "open");
    assert_eq!(shown[2], Shown::Raw("hello".into()));
}

#[tokio::test]
async fn shutdown_ends_the_loop() {
    let rig = Arc::new(FakeRig::new(ControlMode::Baseline));
    let s = session(&rig);
    let handle = s.handle();
    handle.shutdown();
    let recorder = s.run().await;
    assert!(recorder.shown.is_empty());
}
