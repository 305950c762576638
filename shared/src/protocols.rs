//! Category menus and the curated offline protocol table.
//!
//! Everything here is static and available without network. A session always
//! starts from one of these protocols; resolver guidance may replace it later.

use serde::{Deserialize, Serialize};

use crate::model::{Criticality, Protocol, ProtocolSource, ProtocolStep, StepKind};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Clinical,
    Trauma,
    Pediatric,
    Environmental,
}

impl Category {
    pub const ALL: [Self; 4] = [
        Self::Clinical,
        Self::Trauma,
        Self::Pediatric,
        Self::Environmental,
    ];

    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Clinical => "CLINICAL",
            Self::Trauma => "TRAUMA",
            Self::Pediatric => "PEDIATRIC",
            Self::Environmental => "ENVIRONMENTAL",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Clinical => "Mal Estar / Doença",
            Self::Trauma => "Acidentes / Cortes",
            Self::Pediatric => "Crianças e Bebês",
            Self::Environmental => "Risco Ambiental",
        }
    }

    /// Fixed, ordered sub-category menu.
    #[must_use]
    pub const fn sub_categories(self) -> &'static [&'static str] {
        match self {
            Self::Clinical => &[
                "Parada Cardiorrespiratória",
                "AVC (Derrame / Fraqueza)",
                "Dor no Peito (Infarto)",
                "Convulsão (Ataque)",
                "Falta de Ar Grave",
            ],
            Self::Trauma => &[
                "Hemorragia / Sangramento",
                "Fratura Exposta / Queda",
                "Acidente de Trânsito",
                "Bateu a Cabeça (TCE)",
            ],
            Self::Pediatric => &[
                "Engasgo Infantil (OVACE)",
                "Febre com Convulsão",
                "Ingestão de Veneno",
                "Queda de Criança",
            ],
            Self::Environmental => &[
                "Choque Elétrico",
                "Afogamento",
                "Incêndio / Fumaça",
                "Animal Peçonhento (Cobra/Aranha)",
            ],
        }
    }

    #[must_use]
    pub fn offers(self, label: &str) -> bool {
        self.sub_categories().contains(&label)
    }
}

struct StaticProtocol {
    sub_category: &'static str,
    emergency_type: &'static str,
    criticality: Criticality,
    immediate_instruction: &'static str,
    is_cardiac_arrest: bool,
    steps: &'static [(&'static str, &'static str, StepKind)],
}

impl StaticProtocol {
    fn to_protocol(&self) -> Protocol {
        Protocol {
            emergency_type: self.emergency_type.to_string(),
            criticality: self.criticality,
            immediate_instruction: self.immediate_instruction.to_string(),
            is_cardiac_arrest: self.is_cardiac_arrest,
            steps: self
                .steps
                .iter()
                .map(|(id, instruction, kind)| ProtocolStep {
                    id: (*id).to_string(),
                    instruction: (*instruction).to_string(),
                    kind: *kind,
                })
                .collect(),
        }
    }
}

const OFFLINE_TABLE: &[StaticProtocol] = &[
    StaticProtocol {
        sub_category: "Parada Cardiorrespiratória",
        emergency_type: "PCR (Protocolo Offline)",
        criticality: Criticality::Critical,
        immediate_instruction: "INICIE MASSAGEM CARDÍACA IMEDIATAMENTE",
        is_cardiac_arrest: true,
        steps: &[
            ("off1", "DEITE A VÍTIMA DE COSTAS em superfície rígida.", StepKind::Critical),
            ("off2", "POSICIONE AS MÃOS no centro do peito (entre os mamilos).", StepKind::Critical),
            ("off3", "COMPRIMA COM FORÇA (5-6cm) e rapidez (ritmo de 100-120/min).", StepKind::Critical),
            ("off4", "Permita o retorno total do tórax entre as compressões.", StepKind::Action),
            ("off5", "Mantenha sem parar até o resgate chegar ou alguém assumir.", StepKind::Action),
        ],
    },
    StaticProtocol {
        sub_category: "AVC (Derrame / Fraqueza)",
        emergency_type: "AVC (Protocolo Offline)",
        criticality: Criticality::Critical,
        immediate_instruction: "IDENTIFIQUE OS SINAIS DE DERRAME",
        is_cardiac_arrest: false,
        steps: &[
            ("off_avc1", "SORRISO: Peça para a pessoa sorrir. Veja se a boca está torta.", StepKind::Critical),
            ("off_avc2", "ABRAÇO: Peça para levantar os braços. Veja se um cai.", StepKind::Critical),
            ("off_avc3", "MÚSICA: Peça para repetir uma frase. Veja se a fala é arrastada.", StepKind::Critical),
            ("off_avc4", "TEMPO: Se um desses estiver alterado, corra para o hospital.", StepKind::Alert),
            ("off_avc5", "Não ofereça água, comida ou remédios.", StepKind::Alert),
        ],
    },
    StaticProtocol {
        sub_category: "Engasgo Infantil (OVACE)",
        emergency_type: "ENGASGO (Protocolo Offline)",
        criticality: Criticality::Critical,
        immediate_instruction: "REALIZE MANOBRA DE DESOBSTRUÇÃO",
        is_cardiac_arrest: false,
        steps: &[
            ("off6", "BEBÊ: 5 batidas firmes nas costas e 5 compressões no tórax.", StepKind::Critical),
            ("off7", "ADULTO: Manobra de Heimlich (abraçar por trás e pressionar o abdômen para cima).", StepKind::Critical),
            ("off8", "Verifique se o objeto saiu. Não coloque o dedo no escuro.", StepKind::Check),
            ("off9", "Se desmaiar, inicie compressões cardíacas imediatamente.", StepKind::Alert),
        ],
    },
    StaticProtocol {
        sub_category: "Hemorragia / Sangramento",
        emergency_type: "HEMORRAGIA (Protocolo Offline)",
        criticality: Criticality::High,
        immediate_instruction: "PRESSIONE O LOCAL DO SANGRAMENTO",
        is_cardiac_arrest: false,
        steps: &[
            ("off10", "USE PANO LIMPO para fazer pressão direta e forte sobre a ferida.", StepKind::Critical),
            ("off11", "Não remova o pano; se encharcar, coloque outro por cima.", StepKind::Action),
            ("off12", "Se for braço ou perna, mantenha o membro elevado.", StepKind::Action),
            ("off13", "Evite torniquetes a menos que o sangramento seja incontrolável.", StepKind::Alert),
        ],
    },
];

const GENERIC_FALLBACK: StaticProtocol = StaticProtocol {
    sub_category: "",
    emergency_type: "Emergência (Modo Offline)",
    criticality: Criticality::High,
    immediate_instruction: "PROCURE AJUDA E MANTENHA A VÍTIMA CALMA",
    is_cardiac_arrest: false,
    steps: &[
        ("off99", "Verifique consciência e respiração da vítima.", StepKind::Check),
        ("off100", "Tente contato telefônico com 192 (SAMU) ou 193 (Bombeiros).", StepKind::Action),
    ],
};

/// Curated protocol for `sub_category`, if the offline table has one.
#[must_use]
pub fn offline_protocol(sub_category: &str) -> Option<Protocol> {
    OFFLINE_TABLE
        .iter()
        .find(|entry| entry.sub_category == sub_category)
        .map(StaticProtocol::to_protocol)
}

#[must_use]
pub fn has_offline_protocol(sub_category: &str) -> bool {
    OFFLINE_TABLE
        .iter()
        .any(|entry| entry.sub_category == sub_category)
}

#[must_use]
pub fn generic_fallback() -> Protocol {
    GENERIC_FALLBACK.to_protocol()
}

/// The protocol a session activates with before any resolver answer.
/// Never fails: unmapped or absent sub-categories get the generic fallback.
#[must_use]
pub fn initial_protocol(sub_category: Option<&str>) -> (Protocol, ProtocolSource) {
    match sub_category.and_then(offline_protocol) {
        Some(protocol) => (protocol, ProtocolSource::Offline),
        None => (generic_fallback(), ProtocolSource::Fallback),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn cardiac_arrest_is_flagged() {
        let protocol = offline_protocol("Parada Cardiorrespiratória").expect("mapped");
        assert!(protocol.is_cardiac_arrest);
        assert_eq!(protocol.criticality, Criticality::Critical);
        assert_eq!(protocol.steps.len(), 5);
        assert_eq!(protocol.steps[0].id, "off1");
    }

    #[test]
    fn only_cardiac_arrest_is_cardiac() {
        for entry in OFFLINE_TABLE {
            assert_eq!(
                entry.is_cardiac_arrest,
                entry.sub_category == "Parada Cardiorrespiratória",
                "{}",
                entry.sub_category
            );
        }
    }

    #[test]
    fn every_mapped_entry_is_on_a_menu() {
        for entry in OFFLINE_TABLE {
            assert!(
                Category::ALL.iter().any(|c| c.offers(entry.sub_category)),
                "{} not offered by any category",
                entry.sub_category
            );
        }
    }

    #[test]
    fn step_ids_are_unique_across_table() {
        let mut seen = HashSet::new();
        for entry in OFFLINE_TABLE.iter().chain(std::iter::once(&GENERIC_FALLBACK)) {
            assert!(!entry.steps.is_empty());
            for (id, _, _) in entry.steps {
                assert!(seen.insert(*id), "duplicate step id {id}");
            }
        }
    }

    #[test]
    fn unmapped_sub_category_gets_fallback() {
        let (protocol, source) = initial_protocol(Some("Afogamento"));
        assert_eq!(source, ProtocolSource::Fallback);
        assert_eq!(protocol.emergency_type, "Emergência (Modo Offline)");
        assert_eq!(protocol.criticality, Criticality::High);
        assert!(!protocol.is_cardiac_arrest);

        let (_, source) = initial_protocol(None);
        assert_eq!(source, ProtocolSource::Fallback);
    }

    #[test]
    fn menus_are_non_empty_and_ordered() {
        assert_eq!(Category::Clinical.sub_categories()[0], "Parada Cardiorrespiratória");
        for category in Category::ALL {
            assert!(!category.sub_categories().is_empty());
        }
        assert!(Category::Trauma.offers("Hemorragia / Sangramento"));
        assert!(!Category::Trauma.offers("Afogamento"));
    }
}
