mod common;

use common::*;
use crux_core::testing::AppTester;
use vida_shared::app::{AutoCallView, Screen};
use vida_shared::capabilities::TickerOperation;
use vida_shared::event::VictimChoice;
use vida_shared::protocols::Category;
use vida_shared::{AssistantConfig, Effect, Event, Model};

fn auto_call(app: &Tester, model: &Model) -> AutoCallView {
    match app.view(model).screen {
        Screen::Emergency(view) => view.guidance.expect("guidance").auto_call,
        Screen::Dashboard(_) => panic!("expected the emergency screen"),
    }
}

fn active_cardiac(app: &Tester, model: &mut Model, online: bool) {
    start(app, model, online);
    activate(
        app,
        model,
        VictimChoice::ThirdParty,
        Category::Clinical,
        CARDIAC_ARREST,
    );
}

#[test]
fn countdown_dials_once_at_zero() {
    let app = AppTester::<vida_shared::App, Effect>::default();
    let mut model = Model::default();
    active_cardiac(&app, &mut model, true);
    assert_eq!(
        auto_call(&app, &model),
        AutoCallView::Counting {
            remaining: 10,
            total: 10
        }
    );

    for second in 1..=9 {
        let update = tick(&app, &mut model);
        assert!(dialed(&update).is_empty(), "dialed early at {second}s");
    }
    assert_eq!(
        auto_call(&app, &model),
        AutoCallView::Counting {
            remaining: 1,
            total: 10
        }
    );

    let update = tick(&app, &mut model);
    assert_eq!(dialed(&update), vec!["192".to_string()]);
    assert_eq!(auto_call(&app, &model), AutoCallView::Dialed);

    for _ in 0..20 {
        assert!(dialed(&tick(&app, &mut model)).is_empty());
    }

    app.update(Event::EmergencyFinalized, &mut model);
    assert!(model.history[0].emergency_services_notified);
}

#[test]
fn cancelled_countdown_never_dials() {
    let app = AppTester::<vida_shared::App, Effect>::default();
    let mut model = Model::default();
    active_cardiac(&app, &mut model, true);

    for _ in 0..7 {
        tick(&app, &mut model);
    }
    app.update(Event::AutoCallCancelled, &mut model);
    assert_eq!(auto_call(&app, &model), AutoCallView::Cancelled);

    for _ in 0..20 {
        assert!(dialed(&tick(&app, &mut model)).is_empty());
    }
    assert_eq!(model.emergency.as_ref().map(|s| s.active_secs()), Some(27));

    app.update(Event::EmergencyFinalized, &mut model);
    assert!(!model.history[0].emergency_services_notified);
}

#[test]
fn offline_pauses_countdown_until_network_returns() {
    let app = AppTester::<vida_shared::App, Effect>::default();
    let mut model = Model::default();
    active_cardiac(&app, &mut model, false);

    for _ in 0..15 {
        assert!(dialed(&tick(&app, &mut model)).is_empty());
    }
    assert_eq!(auto_call(&app, &model), AutoCallView::Paused { remaining: 10 });
    assert_eq!(model.emergency.as_ref().map(|s| s.active_secs()), Some(15));

    app.update(Event::NetworkStatusChanged { online: true }, &mut model);
    for _ in 0..9 {
        assert!(dialed(&tick(&app, &mut model)).is_empty());
    }
    assert_eq!(dialed(&tick(&app, &mut model)), vec!["192".to_string()]);
}

#[test]
fn manual_call_dials_and_disarms_countdown() {
    let app = AppTester::<vida_shared::App, Effect>::default();
    let mut model = Model::default();
    active_cardiac(&app, &mut model, true);
    tick(&app, &mut model);

    let update = app.update(Event::EmergencyCallRequested, &mut model);
    assert_eq!(dialed(&update), vec!["192".to_string()]);
    assert_eq!(auto_call(&app, &model), AutoCallView::Cancelled);

    for _ in 0..15 {
        assert!(dialed(&tick(&app, &mut model)).is_empty());
    }
    app.update(Event::EmergencyFinalized, &mut model);
    assert!(model.history[0].emergency_services_notified);
}

#[test]
fn manual_call_is_refused_offline() {
    let app = AppTester::<vida_shared::App, Effect>::default();
    let mut model = Model::default();
    active_cardiac(&app, &mut model, false);

    let update = app.update(Event::EmergencyCallRequested, &mut model);
    assert!(dialed(&update).is_empty());
    assert_eq!(
        model.active_error.as_ref().map(|e| e.code()),
        Some("NETWORK_UNAVAILABLE")
    );
}

#[test]
fn configured_countdown_and_number_are_used() {
    let app = AppTester::<vida_shared::App, Effect>::default();
    let mut model = Model::default();
    let config = AssistantConfig {
        emergency_number: "193".into(),
        auto_call_countdown: 5,
        ..AssistantConfig::default()
    };
    app.update(
        Event::AppStarted {
            config: Some(config),
        },
        &mut model,
    );
    active_cardiac(&app, &mut model, true);

    for _ in 0..4 {
        assert!(dialed(&tick(&app, &mut model)).is_empty());
    }
    assert_eq!(dialed(&tick(&app, &mut model)), vec!["193".to_string()]);
}

#[test]
fn ticks_stop_after_finalize() {
    let app = AppTester::<vida_shared::App, Effect>::default();
    let mut model = Model::default();
    active_cardiac(&app, &mut model, true);
    let session = session_id(&model);
    tick(&app, &mut model);

    let update = app.update(Event::EmergencyFinalized, &mut model);
    assert!(ticker_ops(&update)
        .iter()
        .any(|op| matches!(op, TickerOperation::Cancel { .. })));

    let update = app.update(Event::Tick { session }, &mut model);
    assert!(update.effects.is_empty());
    assert!(ticker_ops(&update).is_empty());
}

#[test]
fn each_tick_rearms_the_next() {
    let app = AppTester::<vida_shared::App, Effect>::default();
    let mut model = Model::default();
    active_cardiac(&app, &mut model, true);

    let update = tick(&app, &mut model);
    let ops = ticker_ops(&update);
    assert_eq!(ops.len(), 1);
    assert!(matches!(ops[0], TickerOperation::After { millis: 1000, .. }));
    assert!(renders(&update));
}

#[test]
fn resolver_timeout_does_not_delay_the_call() {
    let app = AppTester::<vida_shared::App, Effect>::default();
    let mut model = Model::default();
    active_cardiac(&app, &mut model, true);
    let session = session_id(&model);
    let generation = model.emergency.as_ref().expect("session").generation();

    for _ in 0..9 {
        assert!(dialed(&tick(&app, &mut model)).is_empty());
    }
    app.update(
        Event::GuidanceDeadlineElapsed {
            session,
            generation,
        },
        &mut model,
    );
    let live = model.emergency.as_ref().expect("session");
    assert!(!live.is_refining());
    assert!(live.protocol().is_some_and(|p| p.is_cardiac_arrest));

    assert_eq!(dialed(&tick(&app, &mut model)), vec!["192".to_string()]);
}

#[test]
fn shell_cannot_speed_up_the_tick() {
    let app = AppTester::<vida_shared::App, Effect>::default();
    let mut model = Model::default();
    let config: AssistantConfig =
        serde_json::from_str(r#"{"tickIntervalMs":100,"autoCallCountdown":10}"#).expect("parse");
    app.update(
        Event::AppStarted {
            config: Some(config),
        },
        &mut model,
    );
    start(&app, &mut model, true);
    let update = activate(
        &app,
        &mut model,
        VictimChoice::ThirdParty,
        Category::Clinical,
        CARDIAC_ARREST,
    );
    assert!(ticker_ops(&update)
        .iter()
        .any(|op| matches!(op, TickerOperation::After { millis: 1000, .. })));

    for _ in 0..9 {
        let update = tick(&app, &mut model);
        assert!(dialed(&update).is_empty());
        assert!(ticker_ops(&update)
            .iter()
            .all(|op| matches!(op, TickerOperation::After { millis: 1000, .. })));
    }
    assert_eq!(dialed(&tick(&app, &mut model)), vec!["192".to_string()]);
}
