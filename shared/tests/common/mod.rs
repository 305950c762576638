#![allow(dead_code)]

use crux_core::testing::{AppTester, Update};
use vida_shared::capabilities::{GuidanceOperation, TickerOperation};
use vida_shared::event::VictimChoice;
use vida_shared::model::{SessionId, UserProfile};
use vida_shared::protocols::Category;
use vida_shared::{App, Effect, Event, Model};

pub type Tester = AppTester<App, Effect>;

pub const CARDIAC_ARREST: &str = "Parada Cardiorrespiratória";
pub const STROKE: &str = "AVC (Derrame / Fraqueza)";

pub fn profile() -> UserProfile {
    UserProfile {
        name: "Maria Souza".into(),
        age: 34,
        blood_type: "O+".into(),
        allergies: vec!["Penicilina".into()],
        ..UserProfile::default()
    }
}

pub fn session_id(model: &Model) -> SessionId {
    model
        .emergency
        .as_ref()
        .expect("live session")
        .id()
        .clone()
}

pub fn start(app: &Tester, model: &mut Model, online: bool) {
    app.update(Event::NetworkStatusChanged { online }, model);
    app.update(Event::EmergencyStarted, model);
}

/// Walks victim and category selection, then picks `label`.
pub fn activate(
    app: &Tester,
    model: &mut Model,
    victim: VictimChoice,
    category: Category,
    label: &str,
) -> Update<Effect, Event> {
    app.update(Event::VictimSelected(victim), model);
    app.update(Event::CategorySelected(category), model);
    app.update(
        Event::SubCategorySelected {
            label: Some(label.into()),
            description: None,
            image: None,
        },
        model,
    )
}

pub fn tick(app: &Tester, model: &mut Model) -> Update<Effect, Event> {
    let session = session_id(model);
    app.update(Event::Tick { session }, model)
}

pub fn dialed(update: &Update<Effect, Event>) -> Vec<String> {
    update
        .effects
        .iter()
        .filter_map(|e| match e {
            Effect::Dialer(request) => Some(request.operation.number.clone()),
            _ => None,
        })
        .collect()
}

pub fn renders(update: &Update<Effect, Event>) -> bool {
    update.effects.iter().any(|e| matches!(e, Effect::Render(_)))
}

pub fn ticker_ops(update: &Update<Effect, Event>) -> Vec<TickerOperation> {
    update
        .effects
        .iter()
        .filter_map(|e| match e {
            Effect::Ticker(request) => Some(request.operation.clone()),
            _ => None,
        })
        .collect()
}

pub fn guidance_ops(update: &Update<Effect, Event>) -> Vec<GuidanceOperation> {
    update
        .effects
        .iter()
        .filter_map(|e| match e {
            Effect::Guidance(request) => Some(request.operation.clone()),
            _ => None,
        })
        .collect()
}

pub fn has_http(update: &Update<Effect, Event>) -> bool {
    update.effects.iter().any(|e| matches!(e, Effect::Http(_)))
}

/// A well-formed resolver answer for a stroke.
pub fn stroke_protocol_json() -> String {
    r#"{
        "emergencyType": "AVC Isquêmico Provável",
        "criticality": "CRITICAL",
        "immediateInstruction": "Ligue 192 e anote o horário de início dos sintomas.",
        "isCardiacArrest": false,
        "nextSteps": [
            {"id": "ai1", "instruction": "Peça para a vítima sorrir.", "type": "check"},
            {"id": "ai2", "instruction": "Mantenha a vítima deitada de lado.", "type": "action"},
            {"id": "ai3", "instruction": "Não ofereça comida ou água.", "type": "alert"}
        ]
    }"#
    .to_string()
}
