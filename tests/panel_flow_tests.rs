//! End-to-End-Flüsse über Kontext, Router und Bus-Fake: Boot, Stellbefehl,
//! Rückmeldung, Stale-Erkennung, Persistenz über Neustarts hinweg.

use anyhow::Result;
use lcc_turnout_panel::app::use_cases;
use lcc_turnout_panel::core::layout::{ConnectionRef, PointKind, Track};
use lcc_turnout_panel::{
    BusInterface, EventId, PanelContext, PanelOptions, StaleSupervisor, TurnoutState,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const EV_N: EventId = EventId(0x0501010122600000);
const EV_R: EventId = EventId(0x0501010122600001);

#[derive(Default)]
struct FakeBus {
    sent: Mutex<Vec<EventId>>,
    queried: Mutex<Vec<EventId>>,
}

impl BusInterface for FakeBus {
    fn send_event(&self, event: EventId) -> Result<()> {
        self.sent.lock().unwrap().push(event);
        Ok(())
    }

    fn query_producer(&self, event: EventId) -> Result<()> {
        self.queried.lock().unwrap().push(event);
        Ok(())
    }

    fn register_turnout_events(&self, _event_normal: EventId, _event_reverse: EventId) {}
}

fn context_in(dir: &std::path::Path) -> PanelContext {
    let mut options = PanelOptions::default();
    options.data_dir = dir.to_path_buf();
    PanelContext::init(options).expect("Init sollte ohne Fehler durchlaufen")
}

#[test]
fn test_command_and_feedback_round() {
    let dir = tempfile::tempdir().expect("Tempdir erwartet");
    let ctx = context_in(dir.path());
    let bus = FakeBus::default();

    use_cases::add_turnout(&ctx, &bus, EV_N, EV_R, "T1").expect("Anlegen erwartet");

    // Stellbefehl: Event raus, Befehl offen
    use_cases::command_turnout(&ctx, &bus, 0, TurnoutState::Normal).expect("Befehl erwartet");
    assert_eq!(bus.sent.lock().unwrap().as_slice(), &[EV_N]);
    assert!(ctx.registry.get(0).unwrap().command_pending);
    assert_eq!(ctx.registry.get(0).unwrap().state, TurnoutState::Unknown);

    // Rückmeldung vom Bus schließt den Befehl ab
    ctx.router.on_event_report(EV_N);
    let t = ctx.registry.get(0).unwrap();
    assert_eq!(t.state, TurnoutState::Normal);
    assert!(!t.command_pending);
}

#[test]
fn test_state_callback_carries_index_and_state() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context_in(dir.path());
    let bus = FakeBus::default();
    use_cases::add_turnout(&ctx, &bus, EV_N, EV_R, "T1").unwrap();

    let notifications: Arc<Mutex<Vec<(usize, TurnoutState)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = notifications.clone();
    ctx.registry.set_state_callback(Some(Arc::new(move |index, state| {
        sink.lock().unwrap().push((index, state));
    })));

    ctx.router.on_producer_identified(EV_R, true);
    ctx.router.on_producer_identified(EV_N, false);

    assert_eq!(
        notifications.lock().unwrap().as_slice(),
        &[(0, TurnoutState::Reverse)]
    );
}

#[test]
fn test_roster_and_layout_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let bus = FakeBus::default();

    {
        let mut ctx = context_in(dir.path());
        use_cases::add_turnout(&ctx, &bus, EV_N, EV_R, "Einfahrt").unwrap();
        let id = ctx.registry.get(0).unwrap().id;
        use_cases::place_turnout(&mut ctx, id, 4, 2).unwrap();
        let ep = ctx.layout.add_endpoint(9, 2).unwrap();
        use_cases::add_track(
            &mut ctx,
            Track {
                from: ConnectionRef::turnout(id, PointKind::Normal),
                to: ConnectionRef::endpoint(ep),
            },
        )
        .unwrap();
    }

    // "Neustart": frischer Kontext aus denselben Dateien
    let ctx = context_in(dir.path());
    assert_eq!(ctx.registry.len(), 1);
    assert_eq!(ctx.registry.get(0).unwrap().name, "Einfahrt");
    // Zustand wird nie persistiert
    assert_eq!(ctx.registry.get(0).unwrap().state, TurnoutState::Unknown);
    assert_eq!(ctx.layout.item_count(), 1);
    assert_eq!(ctx.layout.track_count(), 1);
    assert!(ctx
        .layout
        .resolve_track(&ctx.layout.tracks()[0])
        .is_some());
}

#[test]
fn test_stale_then_fresh_feedback() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context_in(dir.path());
    let bus = FakeBus::default();
    use_cases::add_turnout(&ctx, &bus, EV_N, EV_R, "T1").unwrap();

    ctx.router.on_event_report(EV_N);
    assert_eq!(ctx.registry.get(0).unwrap().state, TurnoutState::Normal);

    let supervisor =
        StaleSupervisor::start(ctx.registry.clone(), 20, Duration::from_millis(10));
    let mut state = TurnoutState::Normal;
    for _ in 0..50 {
        std::thread::sleep(Duration::from_millis(10));
        state = ctx.registry.get(0).unwrap().state;
        if state == TurnoutState::Stale {
            break;
        }
    }
    supervisor.stop();
    assert_eq!(state, TurnoutState::Stale);

    // Eine frische Rückmeldung holt die Weiche wieder aus Stale
    ctx.router.on_event_report(EV_R);
    assert_eq!(ctx.registry.get(0).unwrap().state, TurnoutState::Reverse);
}

#[test]
fn test_query_all_over_booted_roster() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("turnouts.json"),
        r#"{ "version": 1, "turnouts": [
            { "name": "A", "event_normal": "01", "event_reverse": "02" },
            { "name": "B", "event_normal": "03", "event_reverse": "04" }
        ] }"#,
    )
    .unwrap();

    let ctx = context_in(dir.path());
    let bus = FakeBus::default();
    ctx.router.query_all(&bus, Duration::from_millis(0));

    assert_eq!(
        bus.queried.lock().unwrap().as_slice(),
        &[EventId(1), EventId(2), EventId(3), EventId(4)]
    );
}
