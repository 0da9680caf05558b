//! Input record produced by the external intent classifier.
//!
//! The planner only reads this. Labels the classifier may grow later land in
//! the catch-all variants instead of failing deserialization.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::types::{ModelTier, Parallelism};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentType {
    #[default]
    Implementation,
    Debugging,
    Refactoring,
    Research,
    Review,
    Planning,
    Maintenance,
    Conversation,
    #[serde(other)]
    Other,
}

impl IntentType {
    pub fn as_str(self) -> &'static str {
        match self {
            IntentType::Implementation => "implementation",
            IntentType::Debugging => "debugging",
            IntentType::Refactoring => "refactoring",
            IntentType::Research => "research",
            IntentType::Review => "review",
            IntentType::Planning => "planning",
            IntentType::Maintenance => "maintenance",
            IntentType::Conversation => "conversation",
            IntentType::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Trivial,
    #[default]
    Simple,
    Moderate,
    Complex,
    Architectural,
    #[serde(other)]
    Unknown,
}

impl Complexity {
    pub fn as_str(self) -> &'static str {
        match self {
            Complexity::Trivial => "trivial",
            Complexity::Simple => "simple",
            Complexity::Moderate => "moderate",
            Complexity::Complex => "complex",
            Complexity::Architectural => "architectural",
            Complexity::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Security,
    Testing,
    Frontend,
    Documentation,
    Backend,
    Database,
    Devops,
    General,
    #[serde(other)]
    Other,
}

impl Domain {
    pub fn as_str(self) -> &'static str {
        match self {
            Domain::Security => "security",
            Domain::Testing => "testing",
            Domain::Frontend => "frontend",
            Domain::Documentation => "documentation",
            Domain::Backend => "backend",
            Domain::Database => "database",
            Domain::Devops => "devops",
            Domain::General => "general",
            Domain::Other => "other",
        }
    }
}

/// Boolean hints extracted from the request text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Signals {
    pub wants_thorough: bool,
    pub wants_planning: bool,
    /// Signals this crate does not interpret.
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Recommendation {
    pub agents: Vec<String>,
    pub parallelism: Parallelism,
    pub model_tier: ModelTier,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Classification {
    #[serde(rename = "type")]
    pub intent: IntentType,
    pub complexity: Complexity,
    pub domains: Vec<Domain>,
    pub signals: Signals,
    pub recommendation: Recommendation,
    pub confidence: f64,
}

impl Classification {
    /// Parse a classification from JSON or YAML text (YAML is a superset).
    pub fn from_str_any(text: &str) -> Result<Self> {
        if let Ok(parsed) = serde_json::from_str::<Self>(text) {
            return Ok(parsed);
        }
        serde_yaml::from_str(text).context("parse classification as JSON or YAML")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read classification file '{}'", path.display()))?;
        Self::from_str_any(&text)
            .with_context(|| format!("parse classification file '{}'", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_with_unknown_labels() {
        let text = r#"{
            "type": "brainstorming",
            "complexity": "galactic",
            "domains": ["security", "quantum"],
            "signals": {"wantsThorough": true, "mentionsDeadline": true},
            "recommendation": {"agents": ["architect"], "parallelism": "hybrid", "modelTier": "opus"},
            "confidence": 0.8
        }"#;
        let c = Classification::from_str_any(text).unwrap();
        assert_eq!(c.intent, IntentType::Other);
        assert_eq!(c.complexity, Complexity::Unknown);
        assert_eq!(c.domains, vec![Domain::Security, Domain::Other]);
        assert!(c.signals.wants_thorough);
        assert!(!c.signals.wants_planning);
        assert!(c.signals.other.contains_key("mentionsDeadline"));
        assert_eq!(c.recommendation.model_tier, ModelTier::Opus);
    }

    #[test]
    fn parses_yaml_and_fills_defaults() {
        let text = "type: research\ncomplexity: moderate\ndomains: [backend, database]\n";
        let c = Classification::from_str_any(text).unwrap();
        assert_eq!(c.intent, IntentType::Research);
        assert_eq!(c.complexity, Complexity::Moderate);
        assert_eq!(c.domains.len(), 2);
        assert!(c.recommendation.agents.is_empty());
        assert_eq!(c.recommendation.model_tier, ModelTier::Sonnet);
    }
}
