// ============================================================
// Layer 3 — Risk Assessment
// ============================================================
// Maps a prediction to a coarse clinical triage level:
//
//   predicted class | confidence        | level
//   ----------------+-------------------+----------------
//   no_tumor        | any               | LOW RISK
//   other           | >= 0.85           | HIGH RISK
//   other           | [0.60, 0.85)      | MODERATE RISK
//   other           | < 0.60            | LOW CONFIDENCE
//
// Pure function of its inputs: no state, no failure modes.

use serde::Serialize;

use crate::domain::diagnosis::NO_TUMOR;

pub const HIGH_RISK_THRESHOLD:     f64 = 0.85;
pub const MODERATE_RISK_THRESHOLD: f64 = 0.60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskLevel {
    #[serde(rename = "LOW RISK")]
    Low,
    #[serde(rename = "MODERATE RISK")]
    Moderate,
    #[serde(rename = "HIGH RISK")]
    High,
    #[serde(rename = "LOW CONFIDENCE")]
    LowConfidence,
}

impl RiskLevel {
    pub fn label(self) -> &'static str {
        match self {
            RiskLevel::Low           => "LOW RISK",
            RiskLevel::Moderate      => "MODERATE RISK",
            RiskLevel::High          => "HIGH RISK",
            RiskLevel::LowConfidence => "LOW CONFIDENCE",
        }
    }

    /// Severity color tag rendered by clients.
    pub fn color(self) -> &'static str {
        match self {
            RiskLevel::Low           => "green",
            RiskLevel::Moderate      => "amber",
            RiskLevel::High          => "red",
            RiskLevel::LowConfidence => "yellow",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAssessment {
    pub level:       RiskLevel,
    pub color:       &'static str,
    pub description: String,
}

/// Derive the risk assessment for a predicted class and its confidence.
pub fn assess(predicted_class: &str, confidence: f64) -> RiskAssessment {
    let (level, description) = if predicted_class == NO_TUMOR {
        (
            RiskLevel::Low,
            "No tumor detected. Regular follow-up recommended.".to_string(),
        )
    } else if confidence >= HIGH_RISK_THRESHOLD {
        (
            RiskLevel::High,
            format!(
                "High confidence detection of {predicted_class}. \
                 Immediate specialist consultation recommended."
            ),
        )
    } else if confidence >= MODERATE_RISK_THRESHOLD {
        (
            RiskLevel::Moderate,
            format!(
                "Moderate confidence detection of {predicted_class}. \
                 Further diagnostic tests recommended."
            ),
        )
    } else {
        (
            RiskLevel::LowConfidence,
            "Low confidence result. Additional imaging and clinical evaluation needed."
                .to_string(),
        )
    };

    RiskAssessment { level, color: level.color(), description }
}
