//! Emergency state machine.
//!
//! One `EmergencySession` per emergency, from victim selection to either a
//! finalised incident record or a cancellation. All mutation happens through
//! the methods below; asynchronous completions are tagged with the session id
//! and a protocol generation so late answers can be recognised and dropped.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

use crate::checklist::ActionChecklist;
use crate::escalation::{AutoEscalation, EscalationTick};
use crate::guidance::{self, GuidanceError};
use crate::incident::IncidentRecord;
use crate::location::LocationFix;
use crate::model::{
    FailureAnnotation, FailureType, Protocol, ProtocolSource, SessionId, UnixTimeMs,
    VictimContext,
};
use crate::protocols::{self, Category};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionPhase {
    AssessingVictim,
    AssessingCategory,
    AssessingSubCategory,
    Active,
    Finalized,
    Cancelled,
}

impl SessionPhase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AssessingVictim => "ASSESSING_VICTIM",
            Self::AssessingCategory => "ASSESSING_CATEGORY",
            Self::AssessingSubCategory => "ASSESSING_SUB_CATEGORY",
            Self::Active => "ACTIVE",
            Self::Finalized => "FINALIZED",
            Self::Cancelled => "CANCELLED",
        }
    }

    #[must_use]
    pub const fn is_assessing(self) -> bool {
        matches!(
            self,
            Self::AssessingVictim | Self::AssessingCategory | Self::AssessingSubCategory
        )
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finalized | Self::Cancelled)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("{operation} is not allowed while {phase}")]
    InvalidTransition {
        operation: &'static str,
        phase: SessionPhase,
    },
    #[error("no emergency in progress")]
    NoSession,
    #[error("network unavailable")]
    NetworkUnavailable,
}

/// What `back()` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackOutcome {
    ClosedFailureReporting,
    ReturnedTo(SessionPhase),
    Cancelled,
    /// Nothing to go back to (ACTIVE without overlay, or terminal).
    Ignored,
}

/// A resolver call the caller must dispatch for this activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingGuidance {
    pub generation: u64,
    pub description: String,
    pub victim: VictimContext,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activation {
    pub source: ProtocolSource,
    pub resolver: Option<PendingGuidance>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    NotActive,
    NotPending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuidanceOutcome {
    /// Resolver protocol installed; checklist reset.
    Replaced,
    /// Resolver failed; the local protocol stays.
    Failed(GuidanceError),
    Dropped(StaleReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub active_secs: u32,
    pub escalation: EscalationTick,
}

#[derive(Debug, Clone)]
pub struct EmergencySession {
    id: SessionId,
    phase: SessionPhase,
    online: bool,
    victim: Option<VictimContext>,
    category: Option<Category>,
    sub_category: Option<String>,
    free_text: Option<String>,
    protocol: Option<Protocol>,
    protocol_source: Option<ProtocolSource>,
    generation: u64,
    pending_generation: Option<u64>,
    checklist: ActionChecklist,
    escalation: AutoEscalation,
    failure: Option<FailureAnnotation>,
    failure_reporting: bool,
    location: LocationFix,
    manual_call_placed: bool,
    activated_at: Option<UnixTimeMs>,
    active_secs: u32,
}

impl EmergencySession {
    #[must_use]
    pub fn new(online: bool, countdown_start: u8) -> Self {
        Self::with_id(SessionId::generate(), online, countdown_start)
    }

    #[must_use]
    pub fn with_id(id: SessionId, online: bool, countdown_start: u8) -> Self {
        Self {
            id,
            phase: SessionPhase::AssessingVictim,
            online,
            victim: None,
            category: None,
            sub_category: None,
            free_text: None,
            protocol: None,
            protocol_source: None,
            generation: 0,
            pending_generation: None,
            checklist: ActionChecklist::default(),
            escalation: AutoEscalation::new(countdown_start),
            failure: None,
            failure_reporting: false,
            location: LocationFix::default(),
            manual_call_placed: false,
            activated_at: None,
            active_secs: 0,
        }
    }

    fn expect_phase(
        &self,
        expected: SessionPhase,
        operation: &'static str,
    ) -> Result<(), SessionError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition {
                operation,
                phase: self.phase,
            })
        }
    }

    fn enter(&mut self, phase: SessionPhase) {
        info!(session = %self.id, from = %self.phase, to = %phase, "session transition");
        self.phase = phase;
    }

    fn install(&mut self, protocol: Protocol, source: ProtocolSource) {
        self.generation += 1;
        self.checklist.replace(&protocol);
        debug!(
            session = %self.id,
            generation = self.generation,
            source = ?source,
            emergency_type = %protocol.emergency_type,
            "protocol installed"
        );
        self.protocol = Some(protocol);
        self.protocol_source = Some(source);
    }

    // --- Assessment ---

    pub fn select_victim(&mut self, victim: Option<VictimContext>) -> Result<(), SessionError> {
        self.expect_phase(SessionPhase::AssessingVictim, "select_victim")?;
        let victim = victim.ok_or_else(|| {
            SessionError::InvalidInput("a victim must be chosen before continuing".into())
        })?;
        self.victim = Some(victim);
        self.enter(SessionPhase::AssessingCategory);
        Ok(())
    }

    pub fn select_category(&mut self, category: Category) -> Result<(), SessionError> {
        self.expect_phase(SessionPhase::AssessingCategory, "select_category")?;
        self.category = Some(category);
        self.enter(SessionPhase::AssessingSubCategory);
        Ok(())
    }

    /// Activates the session with a local protocol.
    ///
    /// When online, also returns the resolver call to dispatch. Its answer
    /// must come back through [`Self::apply_guidance`] with the same
    /// generation.
    pub fn select_sub_category(
        &mut self,
        label: Option<&str>,
        free_text: Option<&str>,
        image: Option<&[u8]>,
        now: UnixTimeMs,
    ) -> Result<Activation, SessionError> {
        self.expect_phase(SessionPhase::AssessingSubCategory, "select_sub_category")?;
        let (Some(category), Some(victim)) = (self.category, self.victim.clone()) else {
            return Err(SessionError::InvalidTransition {
                operation: "select_sub_category",
                phase: self.phase,
            });
        };

        let label = label.map(str::trim).filter(|s| !s.is_empty());
        let free_text = free_text.map(str::trim).filter(|s| !s.is_empty());
        let description = guidance::describe_situation(label, free_text).ok_or_else(|| {
            SessionError::InvalidInput("choose a situation or describe it".into())
        })?;
        if let Some(label) = label {
            if !category.offers(label) {
                return Err(SessionError::InvalidInput(format!(
                    "{label:?} is not listed under {}",
                    category.code()
                )));
            }
        }
        if let Some(text) = free_text {
            guidance::validate_free_text(text).map_err(SessionError::InvalidInput)?;
        }
        if let Some(image) = image {
            guidance::validate_image(image).map_err(SessionError::InvalidInput)?;
        }

        let (protocol, source) = protocols::initial_protocol(label);
        self.sub_category = label.map(str::to_string);
        self.free_text = free_text.map(str::to_string);
        self.install(protocol, source);
        self.escalation = AutoEscalation::new(self.escalation.start());
        self.activated_at = Some(now);
        self.active_secs = 0;
        self.enter(SessionPhase::Active);

        let resolver = self.online.then(|| {
            self.pending_generation = Some(self.generation);
            PendingGuidance {
                generation: self.generation,
                description,
                victim,
            }
        });

        Ok(Activation { source, resolver })
    }

    /// Steps back one level. Never fails.
    pub fn back(&mut self) -> BackOutcome {
        match self.phase {
            SessionPhase::Active if self.failure_reporting => {
                self.failure_reporting = false;
                BackOutcome::ClosedFailureReporting
            }
            SessionPhase::AssessingSubCategory => {
                self.category = None;
                self.enter(SessionPhase::AssessingCategory);
                BackOutcome::ReturnedTo(SessionPhase::AssessingCategory)
            }
            SessionPhase::AssessingCategory => {
                self.victim = None;
                self.enter(SessionPhase::AssessingVictim);
                BackOutcome::ReturnedTo(SessionPhase::AssessingVictim)
            }
            SessionPhase::AssessingVictim => {
                self.enter(SessionPhase::Cancelled);
                BackOutcome::Cancelled
            }
            SessionPhase::Active | SessionPhase::Finalized | SessionPhase::Cancelled => {
                BackOutcome::Ignored
            }
        }
    }

    pub fn cancel(&mut self) -> Result<(), SessionError> {
        if !self.phase.is_assessing() {
            return Err(SessionError::InvalidTransition {
                operation: "cancel",
                phase: self.phase,
            });
        }
        self.enter(SessionPhase::Cancelled);
        Ok(())
    }

    // --- Active session ---

    /// Answer from the resolver for `generation`.
    pub fn apply_guidance(
        &mut self,
        generation: u64,
        result: Result<Protocol, GuidanceError>,
    ) -> GuidanceOutcome {
        if self.phase != SessionPhase::Active {
            debug!(session = %self.id, generation, phase = %self.phase, "dropping guidance for inactive session");
            return GuidanceOutcome::Dropped(StaleReason::NotActive);
        }
        if self.pending_generation != Some(generation) {
            debug!(session = %self.id, generation, "dropping guidance that is no longer pending");
            return GuidanceOutcome::Dropped(StaleReason::NotPending);
        }
        self.pending_generation = None;
        match result {
            Ok(protocol) => {
                self.install(protocol, ProtocolSource::Resolver);
                GuidanceOutcome::Replaced
            }
            Err(e) => GuidanceOutcome::Failed(e),
        }
    }

    /// The resolver deadline for `generation` passed. Returns `true` if that
    /// request was still pending and is now abandoned.
    pub fn expire_guidance(&mut self, generation: u64) -> bool {
        if self.phase == SessionPhase::Active && self.pending_generation == Some(generation) {
            self.pending_generation = None;
            true
        } else {
            false
        }
    }

    /// One second of ACTIVE time. `None` outside ACTIVE.
    pub fn tick(&mut self) -> Option<TickReport> {
        if self.phase != SessionPhase::Active {
            return None;
        }
        self.active_secs = self.active_secs.saturating_add(1);
        let escalation = self.escalation.tick(self.online);
        Some(TickReport {
            active_secs: self.active_secs,
            escalation,
        })
    }

    pub fn toggle_action(&mut self, step_id: &str) -> Option<bool> {
        if self.phase != SessionPhase::Active {
            return None;
        }
        self.checklist.toggle(step_id)
    }

    /// Disarms the auto-call. Returns `true` if a countdown was running.
    pub fn cancel_auto_call(&mut self) -> bool {
        self.escalation.cancel()
    }

    /// Operator-initiated call. The caller dials on `Ok`.
    pub fn call_emergency_services(&mut self) -> Result<(), SessionError> {
        self.expect_phase(SessionPhase::Active, "call_emergency_services")?;
        if !self.online {
            return Err(SessionError::NetworkUnavailable);
        }
        self.escalation.cancel();
        self.manual_call_placed = true;
        Ok(())
    }

    pub fn set_online(&mut self, online: bool) -> bool {
        let changed = self.online != online;
        self.online = online;
        changed
    }

    pub fn set_location(&mut self, fix: LocationFix) {
        if !self.phase.is_terminal() {
            self.location = fix;
        }
    }

    pub fn open_failure_reporting(&mut self) -> Result<(), SessionError> {
        self.expect_phase(SessionPhase::Active, "open_failure_reporting")?;
        self.failure_reporting = true;
        Ok(())
    }

    pub fn close_failure_reporting(&mut self) {
        self.failure_reporting = false;
    }

    pub fn report_failure(&mut self, failure_type: FailureType) -> Result<(), SessionError> {
        self.expect_phase(SessionPhase::Active, "report_failure")?;
        self.failure = Some(FailureAnnotation::record(failure_type, self.active_secs));
        self.failure_reporting = false;
        info!(session = %self.id, failure = failure_type.code(), "institutional failure reported");
        Ok(())
    }

    /// Seals the session into an incident record. Nothing is mutable
    /// afterwards; pending resolver answers will be dropped.
    pub fn finalize(&mut self, now: UnixTimeMs) -> Result<IncidentRecord, SessionError> {
        self.expect_phase(SessionPhase::Active, "finalize")?;
        let record = IncidentRecord::seal(self, now).ok_or(SessionError::InvalidTransition {
            operation: "finalize",
            phase: self.phase,
        })?;
        self.pending_generation = None;
        self.failure_reporting = false;
        self.escalation.cancel();
        self.enter(SessionPhase::Finalized);
        Ok(record)
    }

    // --- Accessors ---

    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    #[must_use]
    pub const fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[must_use]
    pub const fn is_online(&self) -> bool {
        self.online
    }

    #[must_use]
    pub fn victim(&self) -> Option<&VictimContext> {
        self.victim.as_ref()
    }

    #[must_use]
    pub const fn category(&self) -> Option<Category> {
        self.category
    }

    #[must_use]
    pub fn sub_category(&self) -> Option<&str> {
        self.sub_category.as_deref()
    }

    #[must_use]
    pub fn free_text(&self) -> Option<&str> {
        self.free_text.as_deref()
    }

    #[must_use]
    pub fn protocol(&self) -> Option<&Protocol> {
        self.protocol.as_ref()
    }

    #[must_use]
    pub const fn protocol_source(&self) -> Option<ProtocolSource> {
        self.protocol_source
    }

    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub const fn is_refining(&self) -> bool {
        self.pending_generation.is_some()
    }

    #[must_use]
    pub fn checklist(&self) -> &ActionChecklist {
        &self.checklist
    }

    #[must_use]
    pub fn escalation(&self) -> &AutoEscalation {
        &self.escalation
    }

    #[must_use]
    pub fn failure(&self) -> Option<&FailureAnnotation> {
        self.failure.as_ref()
    }

    #[must_use]
    pub const fn is_failure_reporting(&self) -> bool {
        self.failure_reporting
    }

    #[must_use]
    pub fn location(&self) -> &LocationFix {
        &self.location
    }

    #[must_use]
    pub const fn activated_at(&self) -> Option<UnixTimeMs> {
        self.activated_at
    }

    #[must_use]
    pub const fn active_secs(&self) -> u32 {
        self.active_secs
    }

    /// Auto-call fired or the operator dialed.
    #[must_use]
    pub fn emergency_services_notified(&self) -> bool {
        self.escalation.has_fired() || self.manual_call_placed
    }
}
