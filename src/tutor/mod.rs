//! Scaffolded tutoring core.
//!
//! This module provides:
//! - [`Stage`]: the six fixed pedagogical stages a scaffolded conversation
//!   progresses through
//! - [`TutorMode`]: scaffolding vs. single-shot tutoring modes
//! - [`ServiceId`]: parsed `<provider>-<mode>` service identifiers
//! - [`Evaluation`] extraction from model output
//! - [`TutorEngine`]: the per-turn stage machine

mod evaluation;
mod engine;

pub use engine::*;
pub use evaluation::*;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::TutorError;
use crate::provider::ProviderKind;

/// The six pedagogical stages of a scaffolded tutoring conversation, in
/// the fixed order the stage machine walks them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Restate the problem and surface ambiguities.
    Sensemaking,
    /// Identify inputs, outputs, and core operations.
    Representation,
    /// Propose and compare solution strategies.
    Planning,
    /// Walk a chosen strategy through a sample input.
    Execution,
    /// Diagnose divergence between expected and actual results.
    Monitoring,
    /// Summarize insights and remaining uncertainties.
    Reflection,
}

impl Stage {
    /// All stages in pedagogical order.
    pub const ALL: [Stage; 6] = [
        Stage::Sensemaking,
        Stage::Representation,
        Stage::Planning,
        Stage::Execution,
        Stage::Monitoring,
        Stage::Reflection,
    ];

    /// 0-based position in the stage sequence.
    pub fn index(&self) -> u32 {
        *self as u32
    }

    /// Stage for a persisted index. Out-of-range indices clamp to the final
    /// stage rather than wrapping or erroring.
    pub fn from_index(index: u32) -> Stage {
        Stage::ALL
            .get(index as usize)
            .copied()
            .unwrap_or(Stage::Reflection)
    }

    /// The following stage, or `None` at `Reflection`.
    pub fn next(&self) -> Option<Stage> {
        Stage::ALL.get(self.index() as usize + 1).copied()
    }

    /// Whether this is the terminal stage.
    pub fn is_final(&self) -> bool {
        *self == Stage::Reflection
    }

    /// Get the stage name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Sensemaking => "sensemaking",
            Stage::Representation => "representation",
            Stage::Planning => "planning",
            Stage::Execution => "execution",
            Stage::Monitoring => "monitoring",
            Stage::Reflection => "reflection",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sensemaking" => Ok(Stage::Sensemaking),
            "representation" => Ok(Stage::Representation),
            "planning" => Ok(Stage::Planning),
            "execution" => Ok(Stage::Execution),
            "monitoring" => Ok(Stage::Monitoring),
            "reflection" => Ok(Stage::Reflection),
            _ => Err(format!("Unknown stage: {}", s)),
        }
    }
}

/// Tutoring mode selected by the `<mode>` token of a service identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TutorMode {
    /// Six-stage scaffolded tutoring with per-turn evaluation.
    Scaffolding,
    /// Direct answers with no tutoring protocol.
    Direct,
    /// Answer first, then a short explanation.
    Explanation,
}

impl TutorMode {
    /// Whether this mode drives the stage machine.
    pub fn is_scaffolding(&self) -> bool {
        matches!(self, TutorMode::Scaffolding)
    }

    /// Get the mode name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            TutorMode::Scaffolding => "scaffolding",
            TutorMode::Direct => "direct",
            TutorMode::Explanation => "explanation",
        }
    }
}

impl std::fmt::Display for TutorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TutorMode {
    type Err = TutorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "scaffolding" => Ok(TutorMode::Scaffolding),
            "direct" => Ok(TutorMode::Direct),
            "explanation" => Ok(TutorMode::Explanation),
            _ => Err(TutorError::UnsupportedMode {
                mode: s.to_string(),
            }),
        }
    }
}

/// A parsed `<provider>-<mode>` service identifier, e.g. `gemini-scaffolding`
/// or `openai-direct`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceId {
    /// Backend vendor token.
    pub provider: ProviderKind,
    /// Tutoring mode token.
    pub mode: TutorMode,
}

impl ServiceId {
    /// Parse a service identifier.
    ///
    /// An unrecognized provider prefix (or a missing separator) silently
    /// falls back to the default gemini-direct service, matching the
    /// original deployment's behavior; an unrecognized mode token is a hard
    /// error since it indicates a configuration bug rather than a client
    /// typo.
    pub fn parse(service: &str) -> Result<ServiceId, TutorError> {
        let (provider_token, mode_token) = match service.split_once('-') {
            Some(parts) => parts,
            None => {
                warn!(service = %service, "Malformed service id, falling back to gemini-direct");
                return Ok(ServiceId::default());
            }
        };

        let provider = match provider_token.parse::<ProviderKind>() {
            Ok(p) => p,
            Err(_) => {
                warn!(service = %service, "Unknown provider prefix, falling back to gemini-direct");
                return Ok(ServiceId::default());
            }
        };

        let mode = mode_token.parse::<TutorMode>()?;

        Ok(ServiceId { provider, mode })
    }
}

impl Default for ServiceId {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Gemini,
            mode: TutorMode::Direct,
        }
    }
}

impl std::fmt::Display for ServiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.provider, self.mode)
    }
}

/// Format a service id for display in titles, e.g. `gemini-scaffolding`
/// becomes `Gemini Scaffolding`.
pub fn format_service_label(service: &str) -> String {
    service
        .split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order_and_indices() {
        assert_eq!(Stage::Sensemaking.index(), 0);
        assert_eq!(Stage::Reflection.index(), 5);
        for (i, stage) in Stage::ALL.iter().enumerate() {
            assert_eq!(stage.index() as usize, i);
        }
    }

    #[test]
    fn test_stage_next_advances_one_step() {
        assert_eq!(Stage::Sensemaking.next(), Some(Stage::Representation));
        assert_eq!(Stage::Monitoring.next(), Some(Stage::Reflection));
        assert_eq!(Stage::Reflection.next(), None);
    }

    #[test]
    fn test_stage_from_index_clamps() {
        assert_eq!(Stage::from_index(0), Stage::Sensemaking);
        assert_eq!(Stage::from_index(5), Stage::Reflection);
        // Out-of-range persisted values clamp instead of wrapping
        assert_eq!(Stage::from_index(99), Stage::Reflection);
    }

    #[test]
    fn test_stage_from_str() {
        assert_eq!("sensemaking".parse::<Stage>().unwrap(), Stage::Sensemaking);
        assert_eq!("Reflection".parse::<Stage>().unwrap(), Stage::Reflection);
        assert!("unknown".parse::<Stage>().is_err());
    }

    #[test]
    fn test_tutor_mode_from_str() {
        assert_eq!(
            "scaffolding".parse::<TutorMode>().unwrap(),
            TutorMode::Scaffolding
        );
        assert_eq!("direct".parse::<TutorMode>().unwrap(), TutorMode::Direct);
        assert_eq!(
            "explanation".parse::<TutorMode>().unwrap(),
            TutorMode::Explanation
        );
        assert!(matches!(
            "socratic".parse::<TutorMode>(),
            Err(TutorError::UnsupportedMode { .. })
        ));
    }

    #[test]
    fn test_service_id_parse() {
        let id = ServiceId::parse("gemini-scaffolding").unwrap();
        assert_eq!(id.provider, ProviderKind::Gemini);
        assert_eq!(id.mode, TutorMode::Scaffolding);

        let id = ServiceId::parse("openai-direct").unwrap();
        assert_eq!(id.provider, ProviderKind::OpenAi);
        assert_eq!(id.mode, TutorMode::Direct);
    }

    #[test]
    fn test_service_id_unknown_provider_falls_back() {
        // Policy preserved from the original deployment: unknown provider
        // prefixes degrade to the default service rather than erroring.
        let id = ServiceId::parse("claude-scaffolding").unwrap();
        assert_eq!(id, ServiceId::default());

        let id = ServiceId::parse("nodash").unwrap();
        assert_eq!(id, ServiceId::default());
    }

    #[test]
    fn test_service_id_unknown_mode_hard_fails() {
        let result = ServiceId::parse("gemini-socratic");
        assert!(matches!(result, Err(TutorError::UnsupportedMode { .. })));
    }

    #[test]
    fn test_service_id_display_round_trip() {
        let id = ServiceId::parse("openai-explanation").unwrap();
        assert_eq!(id.to_string(), "openai-explanation");
    }

    #[test]
    fn test_format_service_label() {
        assert_eq!(format_service_label("gemini-scaffolding"), "Gemini Scaffolding");
        assert_eq!(format_service_label("openai-direct"), "Openai Direct");
    }
}
