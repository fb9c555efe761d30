// ============================================================
// Layer 3 — Diagnosis Domain Types
// ============================================================
// The classifier always predicts over the same four classes,
// in the same order as the model's output logits:
//
//   index 0 → glioma
//   index 1 → meningioma
//   index 2 → no_tumor
//   index 3 → pituitary
//
// Responses key probabilities and heatmaps by class name and
// must keep this order, so mappings are stored as ordered
// (name, value) pairs rather than a HashMap.

use anyhow::{ensure, Result};
use serde::{ser::SerializeMap, Serialize, Serializer};

use crate::domain::risk::RiskAssessment;

/// Output classes in logit order.
pub const CLASS_NAMES: [&str; 4] = ["glioma", "meningioma", "no_tumor", "pituitary"];

/// The one class that never maps to an elevated risk level.
pub const NO_TUMOR: &str = "no_tumor";

/// Tolerance allowed on the probability sum.
pub const PROBABILITY_TOLERANCE: f32 = 1e-4;

// ─── ClassMap ─────────────────────────────────────────────────────────────────
/// Insertion-ordered mapping from class name to a value.
/// Serialises as a JSON object whose keys keep insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassMap<V> {
    entries: Vec<(String, V)>,
}

impl<V> ClassMap<V> {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Insert or replace the value stored for `name`.
    /// A new name is appended at the end, an existing one keeps its slot.
    pub fn insert(&mut self, name: impl Into<String>, value: V) {
        let name = name.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None       => self.entries.push((name, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
impl<V> ClassMap<V> {
    pub fn get(&self, name: &str) -> Option<&V> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl<V> Default for ClassMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> FromIterator<(String, V)> for ClassMap<V> {
    fn from_iter<I: IntoIterator<Item = (String, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl<V: Serialize> Serialize for ClassMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

// ─── ClassProbabilities ───────────────────────────────────────────────────────
/// A softmax distribution over the class list.
///
/// Invariants checked at construction: one probability per class,
/// all finite and non-negative, summing to 1 within
/// [`PROBABILITY_TOLERANCE`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClassProbabilities {
    probs: ClassMap<f32>,
}

impl ClassProbabilities {
    pub fn new(classes: &[&str], probs: &[f32]) -> Result<Self> {
        ensure!(
            classes.len() == probs.len(),
            "expected {} probabilities, got {}", classes.len(), probs.len()
        );
        ensure!(!probs.is_empty(), "empty probability distribution");
        ensure!(
            probs.iter().all(|p| p.is_finite() && *p >= 0.0),
            "probabilities must be finite and non-negative"
        );
        let sum: f32 = probs.iter().sum();
        ensure!(
            (sum - 1.0).abs() <= PROBABILITY_TOLERANCE,
            "probabilities sum to {sum}, expected 1"
        );

        let probs = classes.iter()
            .zip(probs)
            .map(|(c, p)| (c.to_string(), *p))
            .collect();
        Ok(Self { probs })
    }

    /// The most probable class and its probability.
    /// Ties resolve to the earliest class, matching argmax.
    pub fn top(&self) -> (&str, f32) {
        let mut best: Option<(&str, f32)> = None;
        for (name, p) in self.probs.iter() {
            if best.map_or(true, |(_, bp)| *p > bp) {
                best = Some((name, *p));
            }
        }
        // Construction guarantees at least one entry.
        best.unwrap_or(("", 0.0))
    }

    /// Probabilities rounded for the JSON payload.
    pub fn rounded(&self, decimals: i32) -> ClassMap<f64> {
        self.probs.iter()
            .map(|(k, p)| (k.to_string(), round_to(*p as f64, decimals)))
            .collect()
    }
}

#[cfg(test)]
impl ClassProbabilities {
    pub fn get(&self, class: &str) -> Option<f32> {
        self.probs.get(class).copied()
    }

    pub fn sum(&self) -> f32 {
        self.probs.iter().map(|(_, p)| *p).sum()
    }

    pub fn len(&self) -> usize {
        self.probs.len()
    }
}

/// Round to a fixed number of decimal places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

// ─── DiagnosisReport ──────────────────────────────────────────────────────────
/// The structured diagnosis-support payload returned for one image.
/// Field names are the wire format of `POST /predict`.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosisReport {
    /// Name of the most probable class
    pub prediction: String,

    /// Probability of `prediction`, in [0, 1]
    pub confidence: f64,

    /// Full distribution in class order
    pub probabilities: ClassMap<f64>,

    /// Base64 PNG heatmap overlay per class (empty when disabled)
    pub gradcam_images: ClassMap<String>,

    pub risk_level: RiskAssessment,

    /// Reported held-out accuracy of the deployed checkpoint
    pub model_accuracy: f64,

    /// The uploaded image resized to the model resolution, base64 PNG
    pub uploaded_image: String,
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_map_keeps_insertion_order() {
        let mut m = ClassMap::new();
        m.insert("pituitary", 1);
        m.insert("glioma", 2);
        m.insert("pituitary", 3);
        assert_eq!(m.keys().collect::<Vec<_>>(), vec!["pituitary", "glioma"]);
        assert_eq!(m.get("pituitary"), Some(&3));
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn test_class_map_serialises_in_order() {
        let m: ClassMap<f64> = CLASS_NAMES.iter()
            .rev()
            .map(|c| (c.to_string(), 0.25))
            .collect();
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(
            json,
            r#"{"pituitary":0.25,"no_tumor":0.25,"meningioma":0.25,"glioma":0.25}"#
        );
    }

    #[test]
    fn test_probabilities_top_and_sum() {
        let p = ClassProbabilities::new(&CLASS_NAMES, &[0.1, 0.6, 0.2, 0.1]).unwrap();
        assert_eq!(p.top(), ("meningioma", 0.6));
        assert!((p.sum() - 1.0).abs() < 1e-6);
        assert_eq!(p.get("no_tumor"), Some(0.2));
    }

    #[test]
    fn test_probabilities_tie_picks_first_class() {
        let p = ClassProbabilities::new(&CLASS_NAMES, &[0.25; 4]).unwrap();
        assert_eq!(p.top().0, "glioma");
    }

    #[test]
    fn test_probabilities_reject_bad_input() {
        assert!(ClassProbabilities::new(&CLASS_NAMES, &[0.5, 0.5]).is_err());
        assert!(ClassProbabilities::new(&CLASS_NAMES, &[0.5, 0.5, 0.5, 0.5]).is_err());
        assert!(ClassProbabilities::new(&CLASS_NAMES, &[1.2, -0.2, 0.0, 0.0]).is_err());
    }

    #[test]
    fn test_rounded_probabilities() {
        let p = ClassProbabilities::new(&CLASS_NAMES, &[0.1234567, 0.2765433, 0.3, 0.3]).unwrap();
        let r = p.rounded(6);
        assert_eq!(r.get("glioma"), Some(&0.123457));
    }
}
