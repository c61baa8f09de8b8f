// End-to-end engine tests over the in-process transport.
//
// The harness plays the panel: it drains what the engine transmits and
// feeds replies back through the incoming entry point. Timeout paths
// run under a paused tokio clock.

use std::sync::Arc;

use tokio::sync::mpsc;

use panel_sms_bridge::{
    EngineConfig, EngineError, LinkedTransport, MemoryStore, OutgoingSms, PanelEvent, PanelStatus,
    ResponseKind, ScenarioRecord, SmsPanel, SyncState, ZoneSet,
};

const PANEL_NUMBER: &str = "+393331234567";

type TestPanel = SmsPanel<LinkedTransport, MemoryStore>;

fn engine() -> (Arc<TestPanel>, mpsc::UnboundedReceiver<OutgoingSms>) {
    let config = EngineConfig::builder().panel_number(PANEL_NUMBER).build();
    let (transport, outgoing) = LinkedTransport::new();
    let panel = Arc::new(SmsPanel::new(config, transport, MemoryStore::new()));
    (panel, outgoing)
}

async fn expect_outgoing(outgoing: &mut mpsc::UnboundedReceiver<OutgoingSms>, body: &str) {
    let sms = outgoing.recv().await.expect("engine should transmit");
    assert_eq!(sms.destination, PANEL_NUMBER);
    assert_eq!(sms.body, body);
}

#[tokio::test]
async fn arm_scenario_round_trip() {
    let (panel, mut outgoing) = engine();

    let task = {
        let panel = panel.clone();
        tokio::spawn(async move { panel.arm_scenario(2).await })
    };
    expect_outgoing(&mut outgoing, "SCE:02").await;
    panel.handle_incoming(PANEL_NUMBER, "OK:ARMED:Casa#").await;

    let ack = task.await.unwrap().unwrap();
    assert_eq!(ack.status, PanelStatus::Armed);
    assert_eq!(ack.scenario.as_deref(), Some("Casa"));

    let snapshot = panel.store().status().await.unwrap();
    assert_eq!(snapshot.status, PanelStatus::Armed);
    assert_eq!(snapshot.scenario.as_deref(), Some("Casa"));
    assert!(!panel.exchange_pending().await);
}

#[tokio::test]
async fn command_argument_validation_is_local() {
    let (panel, mut outgoing) = engine();

    assert!(matches!(
        panel.arm_scenario(0).await.unwrap_err(),
        EngineError::InvalidSlot { slot: 0, .. }
    ));
    assert!(matches!(
        panel.arm_scenario(17).await.unwrap_err(),
        EngineError::InvalidSlot { slot: 17, .. }
    ));
    assert!(matches!(
        panel.arm_custom(ZoneSet::empty()).await.unwrap_err(),
        EngineError::NoZonesSelected
    ));
    assert!(matches!(
        panel.set_user_permissions(17, Default::default()).await.unwrap_err(),
        EngineError::InvalidSlot { slot: 17, .. }
    ));
    // Nothing reached the transport.
    assert!(outgoing.try_recv().is_err());
}

#[tokio::test]
async fn overlapping_send_is_refused_without_touching_the_live_exchange() {
    let (panel, mut outgoing) = engine();

    let task = {
        let panel = panel.clone();
        tokio::spawn(async move { panel.query_status().await })
    };
    expect_outgoing(&mut outgoing, "SYS?").await;

    // Second command while the first awaits its reply: caller error.
    let err = panel.disarm().await.unwrap_err();
    assert!(matches!(err, EngineError::ExchangeBusy));
    assert!(outgoing.try_recv().is_err());

    // The first exchange still resolves normally.
    panel
        .handle_incoming(PANEL_NUMBER, "STATUS:ARMED&SCE=Casa&ZONES=1,2#")
        .await;
    let report = task.await.unwrap().unwrap();
    assert_eq!(report.status, PanelStatus::Armed);
    assert_eq!(report.zones_raw.as_deref(), Some("1,2"));
}

#[tokio::test(start_paused = true)]
async fn command_times_out_and_frees_the_slot() {
    let (panel, mut outgoing) = engine();

    let task = {
        let panel = panel.clone();
        tokio::spawn(async move { panel.query_status().await })
    };
    expect_outgoing(&mut outgoing, "SYS?").await;

    // No reply; the paused clock runs the 60s window out.
    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, EngineError::ReplyTimeout { .. }));
    assert!(!panel.exchange_pending().await);

    // The slot is free for the next command.
    let task = {
        let panel = panel.clone();
        tokio::spawn(async move { panel.disarm().await })
    };
    expect_outgoing(&mut outgoing, "SYS OFF").await;
    panel.handle_incoming(PANEL_NUMBER, "OK:OFF#").await;
    let ack = task.await.unwrap().unwrap();
    assert_eq!(ack.status, PanelStatus::Disarmed);
}

#[tokio::test]
async fn free_text_does_not_resolve_a_pending_exchange() {
    let (panel, mut outgoing) = engine();

    let task = {
        let panel = panel.clone();
        tokio::spawn(async move { panel.query_status().await })
    };
    expect_outgoing(&mut outgoing, "SYS?").await;

    // Panels may send free-text log lines before the real reply.
    panel
        .handle_incoming(PANEL_NUMBER, "richiesta in elaborazione")
        .await;
    assert!(panel.exchange_pending().await);

    panel
        .handle_incoming(PANEL_NUMBER, "SYS: ON\nSCE:---\nZONES:1")
        .await;
    let report = task.await.unwrap().unwrap();
    assert_eq!(report.status, PanelStatus::Armed);
    assert_eq!(report.scenario, None);
}

#[tokio::test]
async fn unrelated_senders_are_ignored() {
    let (panel, mut outgoing) = engine();

    let task = {
        let panel = panel.clone();
        tokio::spawn(async move { panel.query_status().await })
    };
    expect_outgoing(&mut outgoing, "SYS?").await;

    panel.handle_incoming("+15550000000", "STATUS:ARMED#").await;
    assert!(panel.exchange_pending().await);

    // National form of the panel number still correlates.
    panel.handle_incoming("3331234567", "STATUS:OFF#").await;
    let report = task.await.unwrap().unwrap();
    assert_eq!(report.status, PanelStatus::Disarmed);
}

#[tokio::test]
async fn panel_error_reply_surfaces_the_code() {
    let (panel, mut outgoing) = engine();

    let task = {
        let panel = panel.clone();
        tokio::spawn(async move { panel.disarm().await })
    };
    expect_outgoing(&mut outgoing, "SYS OFF").await;
    panel.handle_incoming(PANEL_NUMBER, "ERR:E02").await;

    let err = task.await.unwrap().unwrap_err();
    match err {
        EngineError::Panel { code } => assert_eq!(code, "E02"),
        other => panic!("expected panel error, got {other:?}"),
    }
}

#[tokio::test]
async fn transport_failure_surfaces_immediately() {
    let config = EngineConfig::builder().panel_number(PANEL_NUMBER).build();
    let (transport, outgoing) = LinkedTransport::new();
    drop(outgoing); // messaging stack gone
    let panel = SmsPanel::new(config, transport, MemoryStore::new());

    let err = panel.query_status().await.unwrap_err();
    assert!(matches!(err, EngineError::Transport { .. }));
    assert!(!panel.exchange_pending().await);
}

#[tokio::test]
async fn spontaneous_status_is_persisted_and_announced() {
    let (panel, _outgoing) = engine();
    let mut events = panel.subscribe();

    panel
        .handle_incoming(
            PANEL_NUMBER,
            "SYS: ON\nSCE:Casa\nZONES:1,2,3\n230V: OK\nBATT: OK",
        )
        .await;

    let snapshot = panel.store().status().await.unwrap();
    assert_eq!(snapshot.status, PanelStatus::Armed);
    assert_eq!(snapshot.scenario.as_deref(), Some("Casa"));

    match events.recv().await.unwrap() {
        PanelEvent::SpontaneousStatus(report) => {
            assert_eq!(report.status, PanelStatus::Armed);
            assert_eq!(report.zones_raw.as_deref(), Some("1,2,3"));
        }
        other => panic!("expected spontaneous status event, got {other:?}"),
    }
}

const HANDSHAKE: [(&str, &str); 5] = [
    ("CONF1?", "CONF1:3.2&MAIN.1111&Z1=Ingresso&Z2=NE&Z8=Garage#"),
    ("CONF2?", "CONF2:S01=Casa&S02=Fuori&S03=NE#"),
    ("CONF3?", "CONF3:S09=NE&S10=Vacanza#"),
    ("CONF4?", "CONF4:RJO=Custode&R01=Anna#"),
    ("CONF5?", "CONF5:R09=NE#"),
];

#[tokio::test]
async fn configuration_download_runs_all_five_steps() {
    let (panel, mut outgoing) = engine();
    let mut events = panel.subscribe();

    // A locally created scenario must survive the download.
    panel
        .store()
        .add_custom_scenario(ScenarioRecord::custom(1, "Notte", ZoneSet::from_digits("12")))
        .await;

    let task = {
        let panel = panel.clone();
        tokio::spawn(async move { panel.run_configuration().await })
    };
    for (query, reply) in HANDSHAKE {
        expect_outgoing(&mut outgoing, query).await;
        panel.handle_incoming(PANEL_NUMBER, reply).await;
    }
    task.await.unwrap().unwrap();

    assert_eq!(panel.configuration_state().await, SyncState::Complete);
    assert_eq!(panel.configuration_percent().await, 100);

    let store = panel.store();
    assert!(store.is_configured().await);

    let zones = store.zones().await;
    assert_eq!(zones.len(), 3);
    assert!(zones[0].enabled);
    assert!(!zones[1].enabled);

    let scenarios = store.scenarios().await;
    assert_eq!(scenarios.len(), 6);
    assert!(
        scenarios
            .iter()
            .any(|s| s.is_custom && s.name == "Notte" && s.zones.digits() == "12")
    );

    let users = store.users().await;
    assert_eq!(users.len(), 3);
    assert!(users[0].is_joker);
    assert_eq!(users[1].name, "Anna");

    let info = panel.system_info().await.unwrap();
    assert_eq!(info.firmware.as_deref(), Some("3.2"));
    assert!(info.is_main);

    // Progress events arrive in step order, then completion.
    let mut percents = Vec::new();
    loop {
        match events.recv().await.unwrap() {
            PanelEvent::ConfigProgress { percent, .. } => percents.push(percent),
            PanelEvent::ConfigComplete => break,
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert_eq!(percents, vec![20, 40, 60, 80, 100]);
}

#[tokio::test]
async fn wrong_kind_reply_fails_the_download() {
    let (panel, mut outgoing) = engine();

    let task = {
        let panel = panel.clone();
        tokio::spawn(async move { panel.run_configuration().await })
    };
    let (query, reply) = HANDSHAKE[0];
    expect_outgoing(&mut outgoing, query).await;
    panel.handle_incoming(PANEL_NUMBER, reply).await;

    // A recognizable but wrong-kind reply during CONF2 is a desync,
    // never a silent skip.
    expect_outgoing(&mut outgoing, "CONF2?").await;
    panel.handle_incoming(PANEL_NUMBER, "OK:ARMED#").await;

    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        EngineError::Desync {
            expected: ResponseKind::Conf2,
            got: ResponseKind::Ack,
        }
    ));
    assert_eq!(panel.configuration_state().await, SyncState::Failed);
    assert!(!panel.store().is_configured().await);
    // Step 1 records are kept; the next run fully replaces them.
    assert_eq!(panel.store().zones().await.len(), 3);
}

#[tokio::test]
async fn download_can_be_rerun_after_a_failure() {
    let (panel, mut outgoing) = engine();

    let task = {
        let panel = panel.clone();
        tokio::spawn(async move { panel.run_configuration().await })
    };
    expect_outgoing(&mut outgoing, "CONF1?").await;
    panel.handle_incoming(PANEL_NUMBER, "ERR:E02").await;
    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, EngineError::Panel { .. }));
    assert_eq!(panel.configuration_state().await, SyncState::Failed);

    // A new run always restarts from step 1.
    let task = {
        let panel = panel.clone();
        tokio::spawn(async move { panel.run_configuration().await })
    };
    for (query, reply) in HANDSHAKE {
        expect_outgoing(&mut outgoing, query).await;
        panel.handle_incoming(PANEL_NUMBER, reply).await;
    }
    task.await.unwrap().unwrap();
    assert_eq!(panel.configuration_state().await, SyncState::Complete);
}

#[tokio::test(start_paused = true)]
async fn step_timeout_fails_the_download() {
    let (panel, mut outgoing) = engine();

    let task = {
        let panel = panel.clone();
        tokio::spawn(async move { panel.run_configuration().await })
    };
    expect_outgoing(&mut outgoing, "CONF1?").await;

    // 60 time-units of silence.
    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, EngineError::ReplyTimeout { .. }));
    assert_eq!(panel.configuration_state().await, SyncState::Failed);
    assert_eq!(panel.configuration_percent().await, 0);
    assert!(!panel.exchange_pending().await);
}

#[tokio::test]
async fn unconfigured_number_refuses_the_download() {
    let (transport, _outgoing) = LinkedTransport::new();
    let panel = SmsPanel::new(EngineConfig::default(), transport, MemoryStore::new());

    let err = panel.run_configuration().await.unwrap_err();
    assert!(matches!(err, EngineError::NoPanelNumber));
    assert_eq!(panel.configuration_state().await, SyncState::Idle);

    // Ordinary commands are refused the same way.
    let err = panel.query_status().await.unwrap_err();
    assert!(matches!(err, EngineError::NoPanelNumber));
}

#[tokio::test]
async fn cancelling_keeps_completed_steps() {
    let (panel, mut outgoing) = engine();

    let task = {
        let panel = panel.clone();
        tokio::spawn(async move { panel.run_configuration().await })
    };
    let (query, reply) = HANDSHAKE[0];
    expect_outgoing(&mut outgoing, query).await;
    panel.handle_incoming(PANEL_NUMBER, reply).await;
    expect_outgoing(&mut outgoing, "CONF2?").await;

    panel.cancel_configuration();
    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, EngineError::Cancelled));

    assert_eq!(panel.configuration_state().await, SyncState::Idle);
    assert!(!panel.exchange_pending().await);
    // Records from the completed step are intentionally retained.
    assert_eq!(panel.store().zones().await.len(), 3);
    assert_eq!(panel.configuration_percent().await, 20);

    // Cancelling again is a no-op.
    panel.cancel_configuration();
    panel.cancel_exchange().await;
}
