//! Guidance resolver contract.
//!
//! The core builds the request and parses the raw model output; the shell
//! only moves bytes. Parsing is strict: anything that would put a
//! half-formed protocol in front of a bystander is rejected and the local
//! protocol stays on screen.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use thiserror::Error;

use crate::config::AssistantConfig;
use crate::model::{Protocol, VictimContext};
use crate::{MAX_FREE_TEXT_LEN, MAX_IMAGE_BYTES};

pub const SYSTEM_INSTRUCTION: &str = "Você é um especialista em Atendimento Pré-Hospitalar (APH) \
seguindo rigorosamente as diretrizes do Ministério da Saúde do Brasil (SAMU) e da SBC.
Sua missão é dar instruções de SALVAMENTO IMEDIATO para leigos.
Se uma imagem for fornecida, analise sinais de trauma, sangramento, cor da pele, postura e objetos ao redor para refinar o protocolo.

DIRETRIZES:
1. Linguagem simples, direta e imperativa.
2. Foque em manter a vida: RCP, controle de hemorragias, desobstrução de vias aéreas.
3. Se for Parada Cardíaca (PCR), defina isCardiacArrest como true.
4. Todas as respostas em Português do Brasil.";

pub const NEARBY_QUERY: &str = "Quais são os hospitais, pronto-socorros e unidades de saúde (UPA) \
mais próximos e abertos agora? Liste nome e distância aproximada.";

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum GuidanceError {
    #[error("guidance resolver timed out")]
    Timeout,
    #[error("guidance service needs network")]
    Offline,
    #[error("guidance resolver failed: {0}")]
    Unavailable(String),
    #[error("malformed guidance response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineImage {
    pub mime_type: String,
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
}

impl InlineImage {
    #[must_use]
    pub fn jpeg(data: Vec<u8>) -> Self {
        Self {
            mime_type: "image/jpeg".into(),
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuidanceRequest {
    pub model: String,
    pub system_instruction: String,
    pub prompt: String,
    pub image: Option<InlineImage>,
    pub response_mime_type: String,
    pub response_schema: Value,
    pub timeout_ms: u64,
}

impl GuidanceRequest {
    #[must_use]
    pub fn new(
        config: &AssistantConfig,
        description: &str,
        victim: &VictimContext,
        image: Option<InlineImage>,
    ) -> Self {
        Self {
            model: config.guidance_model.clone(),
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
            prompt: build_prompt(description, victim),
            image,
            response_mime_type: "application/json".into(),
            response_schema: protocol_schema(),
            timeout_ms: config.resolver_timeout_ms,
        }
    }
}

#[must_use]
pub fn build_prompt(description: &str, victim: &VictimContext) -> String {
    format!(
        "SITUAÇÃO DE EMERGÊNCIA NO BRASIL: {}. VÍTIMA: {}.",
        description.trim().trim_end_matches('.'),
        victim.describe().trim_end_matches('.')
    )
}

/// Resolver description from the menu label and/or the free text.
/// `None` when both are blank.
#[must_use]
pub fn describe_situation(label: Option<&str>, free_text: Option<&str>) -> Option<String> {
    let label = label.map(str::trim).filter(|s| !s.is_empty());
    let free_text = free_text.map(str::trim).filter(|s| !s.is_empty());
    match (label, free_text) {
        (Some(label), Some(text)) => Some(format!("{label}: {text}")),
        (Some(only), None) | (None, Some(only)) => Some(only.to_string()),
        (None, None) => None,
    }
}

pub fn validate_free_text(text: &str) -> Result<(), String> {
    if text.chars().count() > MAX_FREE_TEXT_LEN {
        return Err(format!("description exceeds {MAX_FREE_TEXT_LEN} characters"));
    }
    Ok(())
}

pub fn validate_image(data: &[u8]) -> Result<(), String> {
    if data.is_empty() {
        return Err("image is empty".into());
    }
    if data.len() > MAX_IMAGE_BYTES {
        return Err(format!("image exceeds {MAX_IMAGE_BYTES} bytes"));
    }
    Ok(())
}

#[must_use]
pub fn protocol_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "emergencyType": { "type": "STRING" },
            "criticality": {
                "type": "STRING",
                "enum": ["CRITICAL", "HIGH", "MODERATE", "LOW"]
            },
            "immediateInstruction": {
                "type": "STRING",
                "description": "Ação principal, clara e completa baseada no protocolo APH Brasil."
            },
            "isCardiacArrest": {
                "type": "BOOLEAN",
                "description": "Verdadeiro se o protocolo exigir massagem cardíaca (RCP)."
            },
            "nextSteps": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "id": { "type": "STRING" },
                        "instruction": {
                            "type": "STRING",
                            "description": "Instrução detalhada conforme normas do Ministério da Saúde."
                        },
                        "type": {
                            "type": "STRING",
                            "enum": ["action", "check", "alert", "critical"]
                        }
                    },
                    "required": ["id", "instruction", "type"]
                }
            }
        },
        "required": [
            "emergencyType",
            "criticality",
            "immediateInstruction",
            "nextSteps",
            "isCardiacArrest"
        ]
    })
}

/// Decodes raw model output into a protocol.
pub fn parse_protocol(raw: &str) -> Result<Protocol, GuidanceError> {
    let trimmed = strip_code_fence(raw.trim());
    if trimmed.is_empty() {
        return Err(GuidanceError::MalformedResponse("empty response".into()));
    }

    let mut protocol: Protocol = serde_json::from_str(trimmed)
        .map_err(|e| GuidanceError::MalformedResponse(e.to_string()))?;

    protocol.emergency_type = protocol.emergency_type.trim().to_string();
    protocol.immediate_instruction = protocol.immediate_instruction.trim().to_string();
    if protocol.emergency_type.is_empty() {
        return Err(GuidanceError::MalformedResponse("blank emergencyType".into()));
    }
    if protocol.immediate_instruction.is_empty() {
        return Err(GuidanceError::MalformedResponse(
            "blank immediateInstruction".into(),
        ));
    }
    if protocol.steps.is_empty() {
        return Err(GuidanceError::MalformedResponse("no steps".into()));
    }

    let mut seen = HashSet::new();
    for (index, step) in protocol.steps.iter_mut().enumerate() {
        step.instruction = step.instruction.trim().to_string();
        if step.instruction.is_empty() {
            return Err(GuidanceError::MalformedResponse(format!(
                "step {} has a blank instruction",
                index + 1
            )));
        }
        step.id = step.id.trim().to_string();
        if step.id.is_empty() {
            step.id = format!("ai-{}", index + 1);
        }
        if !seen.insert(step.id.clone()) {
            return Err(GuidanceError::MalformedResponse(format!(
                "duplicate step id {}",
                step.id
            )));
        }
    }

    Ok(protocol)
}

fn strip_code_fence(raw: &str) -> &str {
    let Some(body) = raw.strip_prefix("```") else {
        return raw;
    };
    let body = body.strip_prefix("json").unwrap_or(body);
    body.strip_suffix("```").unwrap_or(body).trim()
}

// --- Nearby facilities ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLink {
    pub title: String,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NearbyFacilities {
    pub text: String,
    #[serde(default)]
    pub sources: Vec<SourceLink>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Criticality, StepKind};
    use assert_matches::assert_matches;

    const CHOKING: &str = r#"{
        "emergencyType": "Engasgo em adulto",
        "criticality": "CRITICAL",
        "immediateInstruction": "FAÇA A MANOBRA DE HEIMLICH",
        "isCardiacArrest": false,
        "nextSteps": [
            {"id": "s1", "instruction": "Abrace a vítima por trás.", "type": "critical"},
            {"id": "s2", "instruction": "Pressione o abdômen para cima.", "type": "action"},
            {"id": "s3", "instruction": "Verifique se o objeto saiu.", "type": "check"}
        ]
    }"#;

    #[test]
    fn parses_well_formed_protocol() {
        let protocol = parse_protocol(CHOKING).expect("valid");
        assert_eq!(protocol.criticality, Criticality::Critical);
        assert_eq!(protocol.steps.len(), 3);
        assert_eq!(protocol.steps[2].kind, StepKind::Check);
        assert!(!protocol.is_cardiac_arrest);
    }

    #[test]
    fn accepts_fenced_json() {
        let fenced = format!("```json\n{CHOKING}\n```");
        assert!(parse_protocol(&fenced).is_ok());
    }

    #[test]
    fn assigns_ids_to_blank_steps() {
        let raw = r#"{
            "emergencyType": "X", "criticality": "LOW",
            "immediateInstruction": "Y", "isCardiacArrest": false,
            "nextSteps": [
                {"instruction": "a", "type": "action"},
                {"id": " ", "instruction": "b", "type": "alert"}
            ]
        }"#;
        let protocol = parse_protocol(raw).expect("valid");
        assert_eq!(protocol.steps[0].id, "ai-1");
        assert_eq!(protocol.steps[1].id, "ai-2");
    }

    #[test]
    fn rejects_missing_cardiac_flag() {
        let raw = r#"{"emergencyType":"X","criticality":"LOW","immediateInstruction":"Y",
            "nextSteps":[{"id":"a","instruction":"b","type":"action"}]}"#;
        assert_matches!(parse_protocol(raw), Err(GuidanceError::MalformedResponse(_)));
    }

    #[test]
    fn rejects_unknown_enum_values() {
        let raw = CHOKING.replace("\"CRITICAL\"", "\"URGENT\"");
        assert_matches!(parse_protocol(&raw), Err(GuidanceError::MalformedResponse(_)));
        let raw = CHOKING.replace("\"check\"", "\"note\"");
        assert_matches!(parse_protocol(&raw), Err(GuidanceError::MalformedResponse(_)));
    }

    #[test]
    fn rejects_empty_steps_and_duplicates() {
        let raw = r#"{"emergencyType":"X","criticality":"LOW","immediateInstruction":"Y",
            "isCardiacArrest":false,"nextSteps":[]}"#;
        assert_matches!(parse_protocol(raw), Err(GuidanceError::MalformedResponse(m)) if m == "no steps");

        let raw = CHOKING.replace("\"s2\"", "\"s1\"");
        assert_matches!(parse_protocol(&raw), Err(GuidanceError::MalformedResponse(m)) if m.contains("duplicate"));
    }

    #[test]
    fn rejects_non_json() {
        assert_matches!(parse_protocol("  "), Err(GuidanceError::MalformedResponse(_)));
        assert_matches!(parse_protocol("Ligue 192"), Err(GuidanceError::MalformedResponse(_)));
    }

    #[test]
    fn prompt_carries_situation_and_victim() {
        let prompt = build_prompt("Afogamento", &VictimContext::ThirdParty);
        assert_eq!(
            prompt,
            "SITUAÇÃO DE EMERGÊNCIA NO BRASIL: Afogamento. VÍTIMA: Vítima: TERCEIRO (Desconhecido)."
        );
    }

    #[test]
    fn situation_combines_label_and_text() {
        assert_eq!(
            describe_situation(Some("Afogamento"), Some("criança na piscina")).as_deref(),
            Some("Afogamento: criança na piscina")
        );
        assert_eq!(describe_situation(None, Some(" dor ")).as_deref(), Some("dor"));
        assert_eq!(describe_situation(Some(" "), None), None);
    }

    #[test]
    fn request_uses_configured_model_and_timeout() {
        let config = AssistantConfig::default();
        let request = GuidanceRequest::new(&config, "Afogamento", &VictimContext::ThirdParty, None);
        assert_eq!(request.model, crate::DEFAULT_GUIDANCE_MODEL);
        assert_eq!(request.timeout_ms, 9_000);
        assert_eq!(request.response_schema["required"].as_array().map(Vec::len), Some(5));
    }

    #[test]
    fn image_limits() {
        assert!(validate_image(&[]).is_err());
        assert!(validate_image(&[0xFF, 0xD8]).is_ok());
        assert!(validate_image(&vec![0; MAX_IMAGE_BYTES + 1]).is_err());
    }
}
