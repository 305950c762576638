//! Sealed incident records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    ActionStep, Criticality, FailureAnnotation, IncidentId, LocationSnapshot, ProtocolSource,
    SessionId, UnixTimeMs,
};
use crate::protocols::Category;
use crate::session::EmergencySession;

pub const DOSSIER_TITLE: &str = "Dossiê Vida 360";
const DEFAULT_DIAGNOSIS: &str = "Atendimento Emergencial APH";

/// Immutable summary of a finished emergency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentRecord {
    pub id: IncidentId,
    pub evidence_hash: String,
    pub session_id: SessionId,
    pub start_time: u64,
    pub end_time: u64,
    pub category: Category,
    pub sub_category: Option<String>,
    pub symptoms: Vec<String>,
    pub diagnosis: String,
    pub criticality: Criticality,
    pub protocol_source: ProtocolSource,
    pub location: LocationSnapshot,
    pub actions_taken: Vec<ActionStep>,
    pub emergency_services_notified: bool,
    pub institutional_failure_observed: bool,
    pub failure_details: Option<FailureAnnotation>,
}

impl IncidentRecord {
    /// Builds the record from an ACTIVE session. `None` if the session never
    /// reached a protocol.
    pub(crate) fn seal(session: &EmergencySession, now: UnixTimeMs) -> Option<Self> {
        let protocol = session.protocol()?;
        let category = session.category()?;
        let source = session.protocol_source()?;

        let start = session.activated_at().unwrap_or(now);
        let counted_end = start.add_millis(u64::from(session.active_secs()) * 1000);
        let end = now.max(counted_end);

        let symptoms = session
            .sub_category()
            .into_iter()
            .chain(session.free_text())
            .map(str::to_string)
            .collect();

        let failure = session.failure().cloned();
        let mut record = Self {
            id: IncidentId::generate(),
            evidence_hash: String::new(),
            session_id: session.id().clone(),
            start_time: start.as_millis(),
            end_time: end.as_millis(),
            category,
            sub_category: session.sub_category().map(str::to_string),
            symptoms,
            diagnosis: if protocol.emergency_type.is_empty() {
                DEFAULT_DIAGNOSIS.to_string()
            } else {
                protocol.emergency_type.clone()
            },
            criticality: protocol.criticality,
            protocol_source: source,
            location: session.location().snapshot(),
            actions_taken: session.checklist().snapshot(),
            emergency_services_notified: session.emergency_services_notified(),
            institutional_failure_observed: failure.is_some(),
            failure_details: failure,
        };
        record.evidence_hash = record.fingerprint();
        Some(record)
    }

    /// blake3 over every field except the hash itself. Fields are
    /// length-prefixed and lists count-prefixed so nothing can shift
    /// across a boundary.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        let h = &mut hasher;

        field(h, self.id.as_str().as_bytes());
        field(h, self.session_id.as_str().as_bytes());
        field(h, &self.start_time.to_le_bytes());
        field(h, &self.end_time.to_le_bytes());
        field(h, self.category.code().as_bytes());
        field(h, self.sub_category.as_deref().unwrap_or_default().as_bytes());
        count(h, self.symptoms.len());
        for symptom in &self.symptoms {
            field(h, symptom.as_bytes());
        }
        field(h, self.diagnosis.as_bytes());
        field(h, self.criticality.as_str().as_bytes());
        field(h, &[self.protocol_source as u8]);
        field(h, &self.location.lat.to_le_bytes());
        field(h, &self.location.lng.to_le_bytes());
        field(h, self.location.address.as_bytes());
        count(h, self.actions_taken.len());
        for step in &self.actions_taken {
            field(h, step.id.as_bytes());
            field(h, step.instruction.as_bytes());
            field(h, step.kind.as_str().as_bytes());
            field(h, &[u8::from(step.completed)]);
        }
        field(h, &[
            u8::from(self.emergency_services_notified),
            u8::from(self.institutional_failure_observed),
        ]);
        count(h, usize::from(self.failure_details.is_some()));
        if let Some(failure) = &self.failure_details {
            field(h, failure.failure_type.code().as_bytes());
            field(h, failure.description.as_bytes());
            field(h, &failure.response_time_seconds.unwrap_or(u32::MAX).to_le_bytes());
        }

        hasher.finalize().to_hex().to_string()
    }

    /// `false` if any field changed after sealing.
    #[must_use]
    pub fn verify(&self) -> bool {
        self.fingerprint() == self.evidence_hash
    }

    #[must_use]
    pub fn duration_secs(&self) -> u64 {
        self.end_time.saturating_sub(self.start_time) / 1000
    }

    #[must_use]
    pub fn completed_actions(&self) -> usize {
        self.actions_taken.iter().filter(|a| a.completed).count()
    }

    /// Plain-text dossier for sharing.
    #[must_use]
    pub fn dossier_text(&self) -> String {
        let status = if self.institutional_failure_observed {
            "FALHA INSTITUCIONAL DETECTADA"
        } else {
            "ATENDIMENTO CONCLUÍDO"
        };
        let date = i64::try_from(self.start_time)
            .ok()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map_or_else(|| "-".to_string(), |d| d.format("%d/%m/%Y %H:%M:%S").to_string());
        format!(
            "VIDA 360 - Dossiê de Emergência APH Nacional\n\n\
             Protocolo: {}\nStatus: {}\nHash de Auditoria: {}\nData: {}",
            self.diagnosis, status, self.evidence_hash, date
        )
    }
}

fn field(hasher: &mut blake3::Hasher, bytes: &[u8]) {
    count(hasher, bytes.len());
    hasher.update(bytes);
}

fn count(hasher: &mut blake3::Hasher, n: usize) {
    hasher.update(&(n as u64).to_le_bytes());
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryStats {
    pub total: usize,
    pub failures: usize,
    pub successes: usize,
}

impl HistoryStats {
    #[must_use]
    pub fn from_records(records: &[IncidentRecord]) -> Self {
        let failures = records
            .iter()
            .filter(|r| r.institutional_failure_observed)
            .count();
        Self {
            total: records.len(),
            failures,
            successes: records.len() - failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::LocationFix;
    use crate::model::{Coordinates, FailureType, VictimContext};

    const T0: UnixTimeMs = UnixTimeMs(1_700_000_000_000);

    fn cardiac_session() -> EmergencySession {
        let mut s = EmergencySession::with_id(SessionId::new("s-1"), false, 10);
        s.select_victim(Some(VictimContext::ThirdParty)).expect("victim");
        s.select_category(Category::Clinical).expect("category");
        s.select_sub_category(Some("Parada Cardiorrespiratória"), None, None, T0)
            .expect("activate");
        s
    }

    #[test]
    fn record_carries_checklist_and_flags() {
        let mut s = cardiac_session();
        s.toggle_action("off1");
        s.toggle_action("off2");
        for _ in 0..30 {
            s.tick();
        }
        let record = s.finalize(T0.add_millis(30_000)).expect("finalize");

        assert!(record.id.as_str().starts_with("BR-"));
        assert_eq!(record.category, Category::Clinical);
        assert_eq!(record.diagnosis, "PCR (Protocolo Offline)");
        assert_eq!(record.actions_taken.len(), 5);
        assert_eq!(record.completed_actions(), 2);
        assert!(!record.emergency_services_notified);
        assert!(!record.institutional_failure_observed);
        assert_eq!(record.failure_details, None);
        assert_eq!(record.duration_secs(), 30);
        assert!(record.end_time >= record.start_time);
        assert!(record.verify());
    }

    #[test]
    fn tick_count_bounds_end_time() {
        let mut s = cardiac_session();
        for _ in 0..12 {
            s.tick();
        }
        // Wall clock behind the tick count: the counted seconds win.
        let record = s.finalize(T0.add_millis(2_000)).expect("finalize");
        assert_eq!(record.end_time - record.start_time, 12_000);
    }

    #[test]
    fn failure_is_recorded() {
        let mut s = cardiac_session();
        s.report_failure(FailureType::RefusalOfCare).expect("report");
        let record = s.finalize(T0).expect("finalize");
        assert!(record.institutional_failure_observed);
        let details = record.failure_details.as_ref().expect("details");
        assert_eq!(details.description, "Negligência / Omissão de Socorro");
        assert!(record.dossier_text().contains("FALHA INSTITUCIONAL DETECTADA"));
    }

    #[test]
    fn missing_location_uses_placeholder() {
        let record = cardiac_session().finalize(T0).expect("finalize");
        assert_eq!((record.location.lat, record.location.lng), (0.0, 0.0));
        assert_eq!(record.location.address, crate::ADDRESS_UNKNOWN);
    }

    #[test]
    fn known_location_is_recorded() {
        let mut s = cardiac_session();
        let coords = Coordinates::new(-22.9068, -43.1729).expect("valid");
        s.set_location(LocationFix::Located {
            coords,
            address: "Rio de Janeiro, RJ".into(),
        });
        let record = s.finalize(T0).expect("finalize");
        assert_eq!(record.location.address, "Rio de Janeiro, RJ");
    }

    #[test]
    fn tampering_breaks_verification() {
        let mut record = cardiac_session().finalize(T0).expect("finalize");
        assert!(record.verify());
        record.actions_taken[0].completed = true;
        assert!(!record.verify());

        let mut record = cardiac_session().finalize(T0).expect("finalize");
        record.emergency_services_notified = true;
        assert!(!record.verify());
    }

    #[test]
    fn list_boundaries_are_part_of_the_hash() {
        fn lists(first: &[&str], second: &[&str]) -> blake3::Hash {
            let mut h = blake3::Hasher::new();
            for list in [first, second] {
                count(&mut h, list.len());
                for item in list {
                    field(&mut h, item.as_bytes());
                }
            }
            h.finalize()
        }
        assert_ne!(lists(&["febre", "convulsão"], &[]), lists(&["febre"], &["convulsão"]));

        let record = cardiac_session().finalize(T0).expect("finalize");
        let mut with_failure = record.clone();
        with_failure.failure_details =
            Some(FailureAnnotation::record(FailureType::DelayedResponse, 0));
        assert_ne!(record.fingerprint(), with_failure.fingerprint());
    }

    #[test]
    fn dossier_text_layout() {
        let record = cardiac_session().finalize(T0).expect("finalize");
        let text = record.dossier_text();
        assert!(text.starts_with("VIDA 360 - Dossiê de Emergência APH Nacional\n\n"));
        assert!(text.contains("Protocolo: PCR (Protocolo Offline)"));
        assert!(text.contains("Status: ATENDIMENTO CONCLUÍDO"));
        assert!(text.contains(&format!("Hash de Auditoria: {}", record.evidence_hash)));
        assert!(text.ends_with("Data: 14/11/2023 22:13:20"));
    }

    #[test]
    fn stats_split_failures() {
        let ok = cardiac_session().finalize(T0).expect("finalize");
        let mut s = cardiac_session();
        s.report_failure(FailureType::DelayedResponse).expect("report");
        let failed = s.finalize(T0).expect("finalize");

        let stats = HistoryStats::from_records(&[ok.clone(), failed, ok]);
        assert_eq!(
            stats,
            HistoryStats {
                total: 3,
                failures: 1,
                successes: 2
            }
        );
    }
}
