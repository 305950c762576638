use crux_core::render::Render;
use crux_http::Http;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::capabilities::{Dialer, Geolocation, Guidance, Share, Ticker, TimerId};
use crate::config::AssistantConfig;
use crate::escalation::{EscalationState, EscalationTick};
use crate::event::{Event, VictimChoice};
use crate::guidance::{self, GuidanceError, GuidanceRequest, InlineImage, NearbyFacilities};
use crate::incident::{HistoryStats, IncidentRecord, DOSSIER_TITLE};
use crate::location::{self, LocationError, LocationFix, ReverseGeocodeResponse};
use crate::model::{
    ActionStep, Coordinates, Criticality, FailureType, ProtocolSource, SessionId, UnixTimeMs,
    UserProfile, VictimContext,
};
use crate::protocols::{self, Category};
use crate::session::{
    BackOutcome, EmergencySession, GuidanceOutcome, PendingGuidance, SessionError, SessionPhase,
};
use crate::{
    format_elapsed, AppError, ErrorKind, ToastKind, ToastMessage, COMPRESSIONS_PER_MINUTE,
    MAX_HISTORY_ENTRIES, TICK_INTERVAL,
};

#[derive(Default)]
pub struct App;

#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub render: Render<Event>,
    pub http: Http<Event>,
    pub ticker: Ticker<Event>,
    pub geolocation: Geolocation<Event>,
    pub guidance: Guidance<Event>,
    pub dialer: Dialer<Event>,
    pub share: Share<Event>,
}

// --- Model ---

/// Outstanding timers of the live session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionTimers {
    pub tick: Option<TimerId>,
    pub deadline: Option<TimerId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum NearbyState {
    #[default]
    Idle,
    /// Waiting for a position fix; the lookup starts once it arrives.
    Locating,
    Searching,
    Found(NearbyFacilities),
}

#[derive(Debug)]
pub struct Model {
    pub config: AssistantConfig,
    pub online: bool,
    pub profile: Option<UserProfile>,
    pub emergency: Option<EmergencySession>,
    pub timers: SessionTimers,
    /// Newest first.
    pub history: Vec<IncidentRecord>,
    pub last_position: Option<Coordinates>,
    pub nearby: NearbyState,
    pub active_error: Option<AppError>,
    pub active_notice: Option<ToastMessage>,
    next_timer_id: u64,
}

impl Default for Model {
    fn default() -> Self {
        Self {
            config: AssistantConfig::default(),
            online: true,
            profile: None,
            emergency: None,
            timers: SessionTimers::default(),
            history: Vec::new(),
            last_position: None,
            nearby: NearbyState::Idle,
            active_error: None,
            active_notice: None,
            next_timer_id: 0,
        }
    }
}

impl Model {
    fn allocate_timer(&mut self) -> TimerId {
        self.next_timer_id += 1;
        TimerId(self.next_timer_id)
    }

    fn set_error(&mut self, error: AppError) {
        warn!(code = error.code(), error = %error, "recoverable error");
        self.active_error = Some(error);
    }

    fn notify(&mut self, message: impl Into<String>, kind: ToastKind) {
        self.active_notice = Some(ToastMessage::new(message, kind));
    }

    /// Failures that leave local guidance in place surface as a notice.
    fn report_guidance_failure(&mut self, error: GuidanceError) {
        let error = AppError::from(error);
        if error.kind.keeps_local_guidance() {
            self.notify(error.user_facing_message(), ToastKind::Warning);
        } else {
            self.set_error(error);
        }
    }
}

fn session_mut(
    emergency: &mut Option<EmergencySession>,
) -> Result<&mut EmergencySession, SessionError> {
    emergency.as_mut().ok_or(SessionError::NoSession)
}

/// The live session, only if it is the one `id` refers to.
fn live_session<'a>(
    emergency: &'a mut Option<EmergencySession>,
    id: &SessionId,
) -> Option<&'a mut EmergencySession> {
    emergency.as_mut().filter(|s| s.id() == id)
}

// --- Update ---

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        let event_name = event.name();
        if event.is_periodic() {
            trace!(event = event_name, "event");
        } else if event.is_user_initiated() {
            info!(event = event_name, "user action");
        } else {
            debug!(event = event_name, "event");
        }

        match event {
            Event::Noop => return,

            Event::AppStarted { config } => {
                if let Some(config) = config {
                    match config.validated() {
                        Ok(config) => model.config = config,
                        Err(e) => model.set_error(e.into()),
                    }
                }
                info!(
                    emergency_number = %model.config.emergency_number,
                    countdown = model.config.auto_call_countdown,
                    "core started"
                );
                Self::request_position(model, caps, None);
            }

            Event::ProfileUpdated(profile) => {
                model.profile = Some(profile);
            }

            Event::NetworkStatusChanged { online } => {
                model.online = online;
                if let Some(session) = model.emergency.as_mut() {
                    session.set_online(online);
                }
                info!(online, "network status changed");
                if online {
                    model.notify("Conexão restabelecida", ToastKind::Info);
                } else {
                    model.notify(
                        "Modo Offline - Protocolos Locais de Emergência Ativos",
                        ToastKind::Warning,
                    );
                }
            }

            Event::EmergencyStarted => Self::start_emergency(model, caps),

            Event::VictimSelected(choice) => {
                let victim = match choice {
                    VictimChoice::Myself => model
                        .profile
                        .as_ref()
                        .and_then(VictimContext::for_operator),
                    VictimChoice::ThirdParty => Some(VictimContext::ThirdParty),
                };
                if let Err(e) = session_mut(&mut model.emergency).and_then(|s| s.select_victim(victim))
                {
                    model.set_error(e.into());
                }
            }

            Event::CategorySelected(category) => {
                if let Err(e) =
                    session_mut(&mut model.emergency).and_then(|s| s.select_category(category))
                {
                    model.set_error(e.into());
                }
            }

            Event::SubCategorySelected {
                label,
                description,
                image,
            } => Self::activate(model, caps, label, description, image),

            Event::NavigateBack => {
                let Some(session) = model.emergency.as_mut() else {
                    return;
                };
                let outcome = session.back();
                debug!(session = %session.id(), ?outcome, "back");
                if outcome == BackOutcome::Cancelled {
                    Self::close_session(model, caps);
                }
            }

            Event::EmergencyCancelled => {
                match session_mut(&mut model.emergency).and_then(EmergencySession::cancel) {
                    Ok(()) => Self::close_session(model, caps),
                    Err(e) => model.set_error(e.into()),
                }
            }

            Event::ActionToggled { step_id } => {
                let toggled = model
                    .emergency
                    .as_mut()
                    .and_then(|s| s.toggle_action(&step_id));
                match toggled {
                    Some(completed) => debug!(step = %step_id, completed, "step toggled"),
                    None => {
                        debug!(step = %step_id, "toggle ignored");
                        return;
                    }
                }
            }

            Event::AutoCallCancelled => {
                let Some(session) = model.emergency.as_mut() else {
                    return;
                };
                if session.cancel_auto_call() {
                    info!(session = %session.id(), "auto-call cancelled by operator");
                }
            }

            Event::EmergencyCallRequested => {
                match session_mut(&mut model.emergency)
                    .and_then(EmergencySession::call_emergency_services)
                {
                    Ok(()) => {
                        info!(number = %model.config.emergency_number, "manual emergency call");
                        caps.dialer.dial(model.config.emergency_number.clone());
                    }
                    Err(e) => model.set_error(e.into()),
                }
            }

            Event::FailureReportingOpened => {
                if let Err(e) =
                    session_mut(&mut model.emergency).and_then(EmergencySession::open_failure_reporting)
                {
                    model.set_error(e.into());
                }
            }

            Event::FailureReportingClosed => {
                if let Some(session) = model.emergency.as_mut() {
                    session.close_failure_reporting();
                }
            }

            Event::FailureReported(failure_type) => {
                if let Err(e) = session_mut(&mut model.emergency)
                    .and_then(|s| s.report_failure(failure_type))
                {
                    model.set_error(e.into());
                }
            }

            Event::EmergencyFinalized => Self::finalize(model, caps),

            Event::Tick { session } => {
                if !Self::handle_tick(model, caps, session) {
                    return;
                }
            }

            Event::GuidanceResolved {
                session,
                generation,
                result,
            } => {
                if !Self::handle_guidance(model, caps, &session, generation, result) {
                    return;
                }
            }

            Event::GuidanceDeadlineElapsed {
                session,
                generation,
            } => {
                let expired = live_session(&mut model.emergency, &session)
                    .is_some_and(|s| s.expire_guidance(generation));
                if !expired {
                    debug!(session = %session, generation, "deadline for settled request");
                    return;
                }
                model.timers.deadline = None;
                warn!(session = %session, generation, "resolver timed out, keeping local protocol");
                model.report_guidance_failure(GuidanceError::Timeout);
            }

            Event::PositionResolved { session, result } => {
                Self::handle_position(model, caps, session, result);
            }

            Event::AddressResolved {
                session,
                coords,
                result,
            } => {
                if let Err(e) = &result {
                    warn!(session = %session, error = %e, "reverse geocoding failed");
                }
                let Some(live) = live_session(&mut model.emergency, &session) else {
                    debug!(session = %session, "dropping address for stale session");
                    return;
                };
                live.set_location(LocationFix::geocoded(coords, result));
            }

            Event::NearbyFacilitiesRequested => Self::find_nearby(model, caps),

            Event::NearbyFacilitiesResolved(result) => match result {
                Ok(facilities) => {
                    info!(sources = facilities.sources.len(), "nearby facilities found");
                    model.nearby = NearbyState::Found(facilities);
                }
                Err(e) => {
                    model.nearby = NearbyState::Idle;
                    model.set_error(e.into());
                }
            },

            Event::DossierShareRequested { incident_id } => {
                match model.history.iter().find(|r| r.id == incident_id) {
                    Some(record) => {
                        info!(incident = %record.id, "sharing dossier");
                        caps.share.share(DOSSIER_TITLE, record.dossier_text());
                    }
                    None => model.set_error(
                        AppError::new(ErrorKind::InvalidInput, "unknown incident")
                            .with_context("incident_id", incident_id.as_str()),
                    ),
                }
            }

            Event::DismissError => model.active_error = None,
            Event::DismissNotice => model.active_notice = None,
        }

        caps.render.render();
    }

    fn view(&self, model: &Model) -> ViewModel {
        let screen = match &model.emergency {
            Some(session) => Screen::Emergency(EmergencyView::build(session, model)),
            None => Screen::Dashboard(DashboardView::build(model)),
        };
        ViewModel {
            screen,
            online: model.online,
            error: model.active_error.as_ref().map(ErrorView::from),
            notice: model.active_notice.clone(),
        }
    }
}

impl App {
    fn request_position(model: &Model, caps: &Capabilities, session: Option<SessionId>) {
        caps.geolocation
            .current_position(model.config.location_timeout(), move |result| {
                Event::PositionResolved { session, result }
            });
    }

    fn start_emergency(model: &mut Model, caps: &Capabilities) {
        if let Some(existing) = &model.emergency {
            warn!(session = %existing.id(), phase = %existing.phase(), "emergency already in progress");
            model.set_error(AppError::new(
                ErrorKind::InvalidState,
                "an emergency is already in progress",
            ));
            return;
        }
        let session = EmergencySession::new(model.online, model.config.auto_call_countdown);
        let session_id = session.id().clone();
        info!(session = %session_id, online = model.online, "emergency started");
        model.emergency = Some(session);
        model.timers = SessionTimers::default();
        model.active_error = None;
        Self::request_position(model, caps, Some(session_id));
    }

    fn activate(
        model: &mut Model,
        caps: &Capabilities,
        label: Option<String>,
        description: Option<String>,
        image: Option<Vec<u8>>,
    ) {
        let now = UnixTimeMs::now();
        let activated = session_mut(&mut model.emergency).and_then(|s| {
            s.select_sub_category(label.as_deref(), description.as_deref(), image.as_deref(), now)
                .map(|activation| (s.id().clone(), activation))
        });
        let (session_id, activation) = match activated {
            Ok(activated) => activated,
            Err(e) => {
                model.set_error(e.into());
                return;
            }
        };

        info!(session = %session_id, source = ?activation.source, "emergency active");
        Self::arm_tick(model, caps, session_id.clone());
        match activation.resolver {
            Some(pending) => Self::dispatch_guidance(model, caps, session_id, pending, image),
            None => debug!(session = %session_id, "offline, local protocol only"),
        }
    }

    fn dispatch_guidance(
        model: &mut Model,
        caps: &Capabilities,
        session_id: SessionId,
        pending: PendingGuidance,
        image: Option<Vec<u8>>,
    ) {
        let request = GuidanceRequest::new(
            &model.config,
            &pending.description,
            &pending.victim,
            image.map(InlineImage::jpeg),
        );
        let generation = pending.generation;
        info!(session = %session_id, generation, "requesting refined guidance");

        let tagged = session_id.clone();
        caps.guidance.resolve(request, move |result| Event::GuidanceResolved {
            session: tagged,
            generation,
            result,
        });

        if let Some(previous) = model.timers.deadline.take() {
            caps.ticker.cancel(previous);
        }
        let timer = model.allocate_timer();
        model.timers.deadline = Some(timer);
        caps.ticker.after(
            timer,
            model.config.resolver_timeout(),
            Event::GuidanceDeadlineElapsed {
                session: session_id,
                generation,
            },
        );
    }

    fn arm_tick(model: &mut Model, caps: &Capabilities, session_id: SessionId) {
        let timer = model.allocate_timer();
        model.timers.tick = Some(timer);
        caps.ticker.after(
            timer,
            TICK_INTERVAL,
            Event::Tick {
                session: session_id,
            },
        );
    }

    fn teardown_timers(model: &mut Model, caps: &Capabilities) {
        for timer in [model.timers.tick.take(), model.timers.deadline.take()]
            .into_iter()
            .flatten()
        {
            debug!(%timer, "cancelling timer");
            caps.ticker.cancel(timer);
        }
    }

    fn close_session(model: &mut Model, caps: &Capabilities) {
        Self::teardown_timers(model, caps);
        if let Some(session) = model.emergency.take() {
            info!(session = %session.id(), phase = %session.phase(), "emergency closed");
        }
    }

    /// Returns `false` when the tick was stale and nothing changed.
    fn handle_tick(model: &mut Model, caps: &Capabilities, session_id: SessionId) -> bool {
        let Some(session) = live_session(&mut model.emergency, &session_id) else {
            debug!(session = %session_id, "dropping tick for stale session");
            return false;
        };
        let Some(report) = session.tick() else {
            debug!(session = %session_id, phase = %session.phase(), "dropping tick outside active");
            return false;
        };
        model.timers.tick = None;

        match report.escalation {
            EscalationTick::Fire => {
                info!(
                    session = %session_id,
                    number = %model.config.emergency_number,
                    "auto-call countdown reached zero, dialing"
                );
                caps.dialer.dial(model.config.emergency_number.clone());
                model.notify(
                    format!("Ligando para {}", model.config.emergency_number),
                    ToastKind::Info,
                );
            }
            EscalationTick::Counting { remaining } => {
                trace!(session = %session_id, remaining, "auto-call countdown");
            }
            EscalationTick::Suppressed | EscalationTick::Idle => {}
        }

        Self::arm_tick(model, caps, session_id);
        true
    }

    fn handle_guidance(
        model: &mut Model,
        caps: &Capabilities,
        session_id: &SessionId,
        generation: u64,
        result: Result<String, GuidanceError>,
    ) -> bool {
        let Some(session) = live_session(&mut model.emergency, session_id) else {
            debug!(session = %session_id, generation, "dropping guidance for stale session");
            return false;
        };
        let parsed = result.and_then(|raw| guidance::parse_protocol(&raw));
        match session.apply_guidance(generation, parsed) {
            GuidanceOutcome::Replaced => {
                info!(session = %session_id, generation, "resolver protocol installed");
                Self::clear_deadline(model, caps);
                model.notify("Protocolo atualizado pela IA", ToastKind::Success);
                true
            }
            GuidanceOutcome::Failed(e) => {
                warn!(session = %session_id, generation, error = %e, "resolver failed, keeping local protocol");
                Self::clear_deadline(model, caps);
                model.report_guidance_failure(e);
                true
            }
            GuidanceOutcome::Dropped(reason) => {
                debug!(session = %session_id, generation, ?reason, "dropping stale guidance");
                false
            }
        }
    }

    fn clear_deadline(model: &mut Model, caps: &Capabilities) {
        if let Some(timer) = model.timers.deadline.take() {
            caps.ticker.cancel(timer);
        }
    }

    fn handle_position(
        model: &mut Model,
        caps: &Capabilities,
        session: Option<SessionId>,
        result: Result<Coordinates, LocationError>,
    ) {
        let coords = match result {
            Ok(coords) => coords,
            Err(e) => {
                warn!(error = %e, "position unavailable");
                if model.nearby == NearbyState::Locating {
                    model.nearby = NearbyState::Idle;
                    model.set_error(e.clone().into());
                }
                let Some(session_id) = session else {
                    return;
                };
                if let Some(live) = live_session(&mut model.emergency, &session_id) {
                    live.set_location(LocationFix::Unavailable {
                        reason: e.to_string(),
                    });
                }
                return;
            }
        };

        model.last_position = Some(coords);
        if model.nearby == NearbyState::Locating {
            Self::find_nearby(model, caps);
        }
        let Some(session_id) = session else {
            return;
        };
        let online = model.online;
        let Some(live) = live_session(&mut model.emergency, &session_id) else {
            debug!(session = %session_id, "dropping position for stale session");
            return;
        };
        if online {
            live.set_location(LocationFix::Geocoding { coords });
            Self::reverse_geocode(model, caps, session_id, coords);
        } else {
            live.set_location(LocationFix::offline(coords));
        }
    }

    fn reverse_geocode(
        model: &mut Model,
        caps: &Capabilities,
        session_id: SessionId,
        coords: Coordinates,
    ) {
        let url = match location::reverse_geocode_url(&model.config.reverse_geocode_url, coords) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "cannot build reverse geocode url");
                if let Some(live) = live_session(&mut model.emergency, &session_id) {
                    live.set_location(LocationFix::geocoded(coords, Err(e)));
                }
                return;
            }
        };

        caps.http
            .get(url.as_str())
            .header("User-Agent", model.config.user_agent.as_str())
            .expect_json::<ReverseGeocodeResponse>()
            .send(move |result| {
                let address = match result {
                    Ok(mut response) => response
                        .take_body()
                        .ok_or(LocationError::AddressNotFound)
                        .and_then(ReverseGeocodeResponse::into_address),
                    Err(e) => Err(LocationError::Geocoding(e.to_string())),
                };
                Event::AddressResolved {
                    session: session_id,
                    coords,
                    result: address,
                }
            });
    }

    fn finalize(model: &mut Model, caps: &Capabilities) {
        let now = UnixTimeMs::now();
        match session_mut(&mut model.emergency).and_then(|s| s.finalize(now)) {
            Ok(record) => {
                info!(
                    incident = %record.id,
                    session = %record.session_id,
                    notified = record.emergency_services_notified,
                    failure = record.institutional_failure_observed,
                    completed = record.completed_actions(),
                    "incident finalized"
                );
                Self::close_session(model, caps);
                model.history.insert(0, record);
                model.history.truncate(MAX_HISTORY_ENTRIES);
                model.notify("Dossiê de emergência registrado", ToastKind::Success);
            }
            Err(e) => model.set_error(e.into()),
        }
    }

    fn find_nearby(model: &mut Model, caps: &Capabilities) {
        if !model.online {
            if model.nearby == NearbyState::Locating {
                model.nearby = NearbyState::Idle;
            }
            model.set_error(GuidanceError::Offline.into());
            return;
        }
        let Some(coords) = model.last_position else {
            if model.nearby != NearbyState::Locating {
                model.nearby = NearbyState::Locating;
                model.notify("Aguardando localização GPS...", ToastKind::Info);
                Self::request_position(model, caps, None);
            }
            return;
        };
        model.nearby = NearbyState::Searching;
        caps.guidance.find_nearby(
            &model.config.guidance_model,
            coords,
            Event::NearbyFacilitiesResolved,
        );
    }
}

// --- View ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ViewModel {
    pub screen: Screen,
    pub online: bool,
    pub error: Option<ErrorView>,
    pub notice: Option<ToastMessage>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Screen {
    Dashboard(DashboardView),
    Emergency(EmergencyView),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ErrorView {
    pub code: String,
    pub message: String,
    pub is_transient: bool,
}

impl From<&AppError> for ErrorView {
    fn from(error: &AppError) -> Self {
        Self {
            code: error.code().to_string(),
            message: error.user_facing_message(),
            is_transient: error.severity == crate::ErrorSeverity::Transient,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DashboardView {
    pub operator_name: Option<String>,
    pub stats: HistoryStats,
    pub history: Vec<HistoryItemView>,
    pub nearby: NearbyState,
    pub has_position: bool,
}

impl DashboardView {
    fn build(model: &Model) -> Self {
        Self {
            operator_name: model
                .profile
                .as_ref()
                .filter(|p| p.is_complete())
                .map(|p| p.first_name().to_string()),
            stats: HistoryStats::from_records(&model.history),
            history: model.history.iter().map(HistoryItemView::from).collect(),
            nearby: model.nearby.clone(),
            has_position: model.last_position.is_some(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct HistoryItemView {
    pub id: String,
    pub diagnosis: String,
    pub category_label: String,
    pub started_at_ms: u64,
    pub duration: String,
    pub institutional_failure: bool,
    pub emergency_services_notified: bool,
    pub evidence_hash: String,
    pub verified: bool,
}

impl From<&IncidentRecord> for HistoryItemView {
    fn from(record: &IncidentRecord) -> Self {
        Self {
            id: record.id.to_string(),
            diagnosis: record.diagnosis.clone(),
            category_label: record.category.label().to_string(),
            started_at_ms: record.start_time,
            duration: format_elapsed(u32::try_from(record.duration_secs()).unwrap_or(u32::MAX)),
            institutional_failure: record.institutional_failure_observed,
            emergency_services_notified: record.emergency_services_notified,
            evidence_hash: record.evidence_hash.clone(),
            verified: record.verify(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct OperatorCard {
    pub first_name: String,
    pub age: u16,
    pub blood_type: String,
    pub allergies: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CategoryOption {
    pub category: Category,
    pub label: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SubCategoryOption {
    pub label: String,
    pub has_local_protocol: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AutoCallView {
    Counting { remaining: u8, total: u8 },
    /// Offline; the count resumes when the network returns.
    Paused { remaining: u8 },
    Dialed,
    Cancelled,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct FailureOption {
    pub failure_type: FailureType,
    pub label: String,
    pub selected: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct GuidanceView {
    pub emergency_type: String,
    pub criticality: Criticality,
    pub immediate_instruction: String,
    pub source: ProtocolSource,
    pub refining: bool,
    /// Metronome rate while compressions are required.
    pub compression_rate: Option<u32>,
    pub steps: Vec<ActionStep>,
    pub completed_count: usize,
    pub auto_call: AutoCallView,
    pub manual_call_enabled: bool,
    pub emergency_number: String,
    pub failure_reporting: bool,
    pub failure_options: Vec<FailureOption>,
    pub reported_failure: Option<FailureType>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EmergencyView {
    pub session_id: String,
    pub phase: SessionPhase,
    pub elapsed: String,
    pub address: String,
    pub offline_banner: bool,
    pub can_go_back: bool,
    pub operator: Option<OperatorCard>,
    pub categories: Vec<CategoryOption>,
    pub sub_categories: Vec<SubCategoryOption>,
    pub guidance: Option<GuidanceView>,
}

impl EmergencyView {
    fn build(session: &EmergencySession, model: &Model) -> Self {
        let phase = session.phase();
        let operator = model
            .profile
            .as_ref()
            .filter(|p| p.is_complete())
            .map(|p| OperatorCard {
                first_name: p.first_name().to_string(),
                age: p.age,
                blood_type: p.blood_type.clone(),
                allergies: p.allergies.clone(),
            });

        let categories = if phase == SessionPhase::AssessingCategory {
            Category::ALL
                .iter()
                .map(|c| CategoryOption {
                    category: *c,
                    label: c.label().to_string(),
                })
                .collect()
        } else {
            Vec::new()
        };

        let sub_categories = match (phase, session.category()) {
            (SessionPhase::AssessingSubCategory, Some(category)) => category
                .sub_categories()
                .iter()
                .map(|label| SubCategoryOption {
                    label: (*label).to_string(),
                    has_local_protocol: protocols::has_offline_protocol(label),
                })
                .collect(),
            _ => Vec::new(),
        };

        Self {
            session_id: session.id().to_string(),
            phase,
            elapsed: format_elapsed(session.active_secs()),
            address: session.location().display_address(),
            offline_banner: !session.is_online(),
            can_go_back: phase.is_assessing() || session.is_failure_reporting(),
            operator,
            categories,
            sub_categories,
            guidance: GuidanceView::build(session, model),
        }
    }
}

impl GuidanceView {
    fn build(session: &EmergencySession, model: &Model) -> Option<Self> {
        let protocol = session.protocol()?;
        let source = session.protocol_source()?;
        let escalation = session.escalation();
        let auto_call = match escalation.state() {
            EscalationState::Fired => AutoCallView::Dialed,
            EscalationState::Cancelled => AutoCallView::Cancelled,
            EscalationState::Counting if !session.is_online() => AutoCallView::Paused {
                remaining: escalation.remaining(),
            },
            EscalationState::Counting => AutoCallView::Counting {
                remaining: escalation.remaining(),
                total: escalation.start(),
            },
        };
        let reported = session.failure().map(|f| f.failure_type);

        Some(Self {
            emergency_type: protocol.emergency_type.clone(),
            criticality: protocol.criticality,
            immediate_instruction: protocol.immediate_instruction.clone(),
            source,
            refining: session.is_refining(),
            compression_rate: protocol.is_cardiac_arrest.then_some(COMPRESSIONS_PER_MINUTE),
            steps: session.checklist().snapshot(),
            completed_count: session.checklist().completed_count(),
            auto_call,
            manual_call_enabled: session.is_online() && session.phase() == SessionPhase::Active,
            emergency_number: model.config.emergency_number.clone(),
            failure_reporting: session.is_failure_reporting(),
            failure_options: FailureType::ALL
                .iter()
                .map(|t| FailureOption {
                    failure_type: *t,
                    label: t.label().to_string(),
                    selected: reported == Some(*t),
                })
                .collect(),
            reported_failure: reported,
        })
    }
}
