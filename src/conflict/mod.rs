//! Fact conflict detection and resolution.
//!
//! The resolver is a pure function over a fact set: group by normalized
//! entity, compare every attribute-matched pair, and classify disagreements
//! as contradictions, inconsistencies, temporal mismatches, or (in a second,
//! source-grouped pass) source disagreements. Malformed numeric or date
//! values degrade to textual comparison; detection never fails on bad input,
//! it only under-detects.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::facts::{Fact, FactConfidence, ValueType};

/// Classification of a detected conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    /// Values are semantically opposed (numeric divergence or crossed polarity).
    Contradiction,
    /// Values differ without being semantically opposed; the weakest signal.
    Inconsistency,
    /// Temporal values disagree beyond the date tolerance.
    TemporalMismatch,
    /// Two distinct sources assert different values for the same claim.
    SourceDisagreement,
}

impl std::fmt::Display for ConflictType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictType::Contradiction => write!(f, "contradiction"),
            ConflictType::Inconsistency => write!(f, "inconsistency"),
            ConflictType::TemporalMismatch => write!(f, "temporal_mismatch"),
            ConflictType::SourceDisagreement => write!(f, "source_disagreement"),
        }
    }
}

impl std::str::FromStr for ConflictType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "contradiction" => Ok(ConflictType::Contradiction),
            "inconsistency" => Ok(ConflictType::Inconsistency),
            "temporal_mismatch" => Ok(ConflictType::TemporalMismatch),
            "source_disagreement" => Ok(ConflictType::SourceDisagreement),
            _ => Err(format!("Unknown conflict type: {}", s)),
        }
    }
}

/// How serious a conflict is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSeverity {
    /// Minor divergence.
    Low,
    /// Meaningful divergence.
    Medium,
    /// Facts cannot both be true.
    High,
}

impl std::fmt::Display for ConflictSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictSeverity::Low => write!(f, "low"),
            ConflictSeverity::Medium => write!(f, "medium"),
            ConflictSeverity::High => write!(f, "high"),
        }
    }
}

/// Which fact a resolution prefers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreferredFact {
    /// Prefer fact A.
    A,
    /// Prefer fact B.
    B,
    /// No mechanical preference; manual review is the answer.
    Neither,
}

/// A suggested resolution for a conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    /// Resolution strategy name.
    pub strategy: String,
    /// Which fact to prefer.
    pub preferred_fact: PreferredFact,
    /// Why the preference was made.
    pub reasoning: String,
}

/// A detected disagreement between two facts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    /// Sequential identifier within one detection pass.
    pub id: String,
    /// First fact of the pair (canonically ordered).
    pub fact_a: Fact,
    /// Second fact of the pair.
    pub fact_b: Fact,
    /// Conflict classification.
    #[serde(rename = "conflict_type")]
    pub conflict_type: ConflictType,
    /// How serious the disagreement is.
    pub severity: ConflictSeverity,
    /// Detector certainty that this is a real conflict, not noise (0.0-1.0).
    pub confidence: f64,
    /// Human-readable description.
    pub description: String,
    /// Suggested resolution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
}

/// Tolerance settings for conflict detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictTolerance {
    /// Relative numeric difference allowed before a contradiction is raised
    /// (0.1 = 10%).
    pub numeric_percent: f64,
    /// Per-value-type overrides for the numeric tolerance. Different value
    /// kinds tolerate different spreads, so callers tune them here rather
    /// than the detector guessing.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub numeric_percent_by_type: BTreeMap<ValueType, f64>,
    /// Days of temporal disagreement allowed.
    pub date_days: i64,
    /// Skip pairs where both facts are low-confidence.
    pub ignore_low_confidence: bool,
}

impl Default for ConflictTolerance {
    fn default() -> Self {
        Self {
            numeric_percent: 0.10,
            numeric_percent_by_type: BTreeMap::new(),
            date_days: 30,
            ignore_low_confidence: true,
        }
    }
}

impl ConflictTolerance {
    /// Effective numeric tolerance for a pair of value types.
    ///
    /// The stricter (smaller) override wins when both types carry one.
    pub fn numeric_tolerance_for(&self, a: ValueType, b: ValueType) -> f64 {
        let overrides = [a, b]
            .iter()
            .filter_map(|vt| self.numeric_percent_by_type.get(vt).copied())
            .fold(None::<f64>, |acc, v| Some(acc.map_or(v, |a| a.min(v))));
        overrides.unwrap_or(self.numeric_percent)
    }

    /// Set a per-type override.
    pub fn with_type_tolerance(mut self, value_type: ValueType, percent: f64) -> Self {
        self.numeric_percent_by_type.insert(value_type, percent);
        self
    }
}

/// Detect conflicts among a set of facts.
///
/// Detection is symmetric: the same conflicts (same pairs, same types) come
/// back regardless of input order, because facts are canonically sorted
/// before pairing.
pub fn detect_conflicts(facts: &[Fact], tolerance: &ConflictTolerance) -> Vec<Conflict> {
    let mut conflicts = Vec::new();
    let mut next_id = 0usize;

    // Pass 1: group by normalized entity, compare attribute-matched pairs.
    let mut by_entity: BTreeMap<String, Vec<&Fact>> = BTreeMap::new();
    for fact in facts {
        by_entity.entry(fact.entity_key()).or_default().push(fact);
    }

    for group in by_entity.values_mut() {
        group.sort_by_key(|f| pair_key(f));
        for i in 0..group.len() {
            for j in (i + 1)..group.len() {
                let (fact_a, fact_b) = (group[i], group[j]);
                if fact_a.attribute_key() != fact_b.attribute_key() {
                    continue;
                }
                if skip_low_confidence(fact_a, fact_b, tolerance) {
                    continue;
                }
                if let Some(conflict) = detect_pair(fact_a, fact_b, tolerance, next_id) {
                    conflicts.push(conflict);
                    next_id += 1;
                }
            }
        }
    }

    // Pass 2: group by source and flag cross-source disagreement. This
    // catches disagreement the entity grouping can dilute across aliasing.
    conflicts.extend(detect_source_disagreements(facts, tolerance, &mut next_id));

    debug!(
        fact_count = facts.len(),
        conflict_count = conflicts.len(),
        "Conflict detection pass complete"
    );

    conflicts
}

/// Suggest a resolution for a conflicting pair.
///
/// Total by construction: higher source quality wins, then higher extractor
/// confidence, and an exact tie yields `manual_review` with no preference.
/// Manual review is a terminal answer, not a failure.
pub fn suggest_resolution(fact_a: &Fact, fact_b: &Fact) -> Resolution {
    let quality_a = fact_a.source.quality.weight();
    let quality_b = fact_b.source.quality.weight();

    if quality_a > quality_b {
        return Resolution {
            strategy: "prefer_higher_quality".to_string(),
            preferred_fact: PreferredFact::A,
            reasoning: "Fact A comes from a higher quality source".to_string(),
        };
    }
    if quality_b > quality_a {
        return Resolution {
            strategy: "prefer_higher_quality".to_string(),
            preferred_fact: PreferredFact::B,
            reasoning: "Fact B comes from a higher quality source".to_string(),
        };
    }

    if fact_a.confidence > fact_b.confidence {
        return Resolution {
            strategy: "prefer_higher_confidence".to_string(),
            preferred_fact: PreferredFact::A,
            reasoning: "Fact A has higher extraction confidence".to_string(),
        };
    }
    if fact_b.confidence > fact_a.confidence {
        return Resolution {
            strategy: "prefer_higher_confidence".to_string(),
            preferred_fact: PreferredFact::B,
            reasoning: "Fact B has higher extraction confidence".to_string(),
        };
    }

    Resolution {
        strategy: "manual_review".to_string(),
        preferred_fact: PreferredFact::Neither,
        reasoning: "Both facts have similar credibility, manual review recommended".to_string(),
    }
}

fn skip_low_confidence(a: &Fact, b: &Fact, tolerance: &ConflictTolerance) -> bool {
    tolerance.ignore_low_confidence
        && a.confidence == FactConfidence::Low
        && b.confidence == FactConfidence::Low
}

/// Canonical ordering key so detection is independent of input order.
fn pair_key(fact: &Fact) -> (String, String, String) {
    (
        fact.attribute_key(),
        fact.value.trim().to_lowercase(),
        fact.source.url.clone(),
    )
}

fn detect_pair(
    fact_a: &Fact,
    fact_b: &Fact,
    tolerance: &ConflictTolerance,
    id: usize,
) -> Option<Conflict> {
    let value_a = fact_a.value.trim();
    let value_b = fact_b.value.trim();

    if value_a.eq_ignore_ascii_case(value_b) {
        return None;
    }

    // Numeric comparison when either side claims a numeric type. Two
    // parsed magnitudes settle the pair either way: within tolerance means
    // no conflict at all. Only a value that fails to parse falls through to
    // the textual checks below.
    if fact_a.value_type.is_numeric() || fact_b.value_type.is_numeric() {
        if let (Some(num_a), Some(num_b)) =
            (extract_numeric(value_a), extract_numeric(value_b))
        {
            if num_a > 0.0 && num_b > 0.0 {
                return numeric_conflict(fact_a, fact_b, num_a, num_b, tolerance, id);
            }
        }
    }

    if fact_a.value_type == ValueType::Date || fact_b.value_type == ValueType::Date {
        if let (Some(year_a), Some(year_b)) = (extract_year(value_a), extract_year(value_b)) {
            return temporal_conflict(fact_a, fact_b, year_a, year_b, tolerance, id);
        }
    }

    if is_contradictory(value_a, value_b) {
        return Some(Conflict {
            id: id.to_string(),
            fact_a: fact_a.clone(),
            fact_b: fact_b.clone(),
            conflict_type: ConflictType::Contradiction,
            severity: polarity_severity(fact_a, fact_b),
            confidence: 0.7,
            description: "Facts have contradictory values for the same attribute".to_string(),
            resolution: Some(suggest_resolution(fact_a, fact_b)),
        });
    }

    // Different non-empty values for the same entity+attribute are still
    // worth reporting, just weakly.
    Some(Conflict {
        id: id.to_string(),
        fact_a: fact_a.clone(),
        fact_b: fact_b.clone(),
        conflict_type: ConflictType::Inconsistency,
        severity: ConflictSeverity::Low,
        confidence: 0.5,
        description: "Facts have different values for the same entity-attribute pair".to_string(),
        resolution: Some(suggest_resolution(fact_a, fact_b)),
    })
}

fn numeric_conflict(
    fact_a: &Fact,
    fact_b: &Fact,
    num_a: f64,
    num_b: f64,
    tolerance: &ConflictTolerance,
    id: usize,
) -> Option<Conflict> {
    let diff = (num_a - num_b).abs() / num_a.max(num_b);
    let allowed = tolerance.numeric_tolerance_for(fact_a.value_type, fact_b.value_type);
    if diff <= allowed {
        return None;
    }

    let severity = if diff > 0.5 {
        ConflictSeverity::High
    } else if diff > 0.2 {
        ConflictSeverity::Medium
    } else {
        ConflictSeverity::Low
    };

    Some(Conflict {
        id: id.to_string(),
        fact_a: fact_a.clone(),
        fact_b: fact_b.clone(),
        conflict_type: ConflictType::Contradiction,
        severity,
        confidence: 0.8,
        description: format!(
            "Numeric values differ by {:.0}% (tolerance {:.0}%)",
            diff * 100.0,
            allowed * 100.0
        ),
        resolution: Some(suggest_resolution(fact_a, fact_b)),
    })
}

fn temporal_conflict(
    fact_a: &Fact,
    fact_b: &Fact,
    year_a: i32,
    year_b: i32,
    tolerance: &ConflictTolerance,
    id: usize,
) -> Option<Conflict> {
    let gap_days = (year_a - year_b).abs() as i64 * 365;
    if gap_days <= tolerance.date_days {
        return None;
    }

    Some(Conflict {
        id: id.to_string(),
        fact_a: fact_a.clone(),
        fact_b: fact_b.clone(),
        conflict_type: ConflictType::TemporalMismatch,
        severity: ConflictSeverity::Medium,
        confidence: 0.7,
        description: format!(
            "Temporal values are {} days apart (tolerance {} days)",
            gap_days, tolerance.date_days
        ),
        resolution: Some(suggest_resolution(fact_a, fact_b)),
    })
}

fn detect_source_disagreements(
    facts: &[Fact],
    tolerance: &ConflictTolerance,
    next_id: &mut usize,
) -> Vec<Conflict> {
    let mut by_source: BTreeMap<&str, Vec<&Fact>> = BTreeMap::new();
    for fact in facts {
        if let Some(key) = fact.source_key() {
            by_source.entry(key).or_default().push(fact);
        }
    }

    let sources: Vec<&str> = by_source.keys().copied().collect();
    let mut conflicts = Vec::new();

    for i in 0..sources.len() {
        for j in (i + 1)..sources.len() {
            for fact_a in &by_source[sources[i]] {
                for fact_b in &by_source[sources[j]] {
                    if fact_a.entity_key() != fact_b.entity_key()
                        || fact_a.attribute_key() != fact_b.attribute_key()
                        || fact_a.value.trim().eq_ignore_ascii_case(fact_b.value.trim())
                    {
                        continue;
                    }
                    if skip_low_confidence(fact_a, fact_b, tolerance) {
                        continue;
                    }
                    conflicts.push(Conflict {
                        id: next_id.to_string(),
                        fact_a: (*fact_a).clone(),
                        fact_b: (*fact_b).clone(),
                        conflict_type: ConflictType::SourceDisagreement,
                        severity: ConflictSeverity::Medium,
                        confidence: 0.6,
                        description: "Different sources report conflicting information"
                            .to_string(),
                        resolution: Some(suggest_resolution(fact_a, fact_b)),
                    });
                    *next_id += 1;
                }
            }
        }
    }

    conflicts
}

/// Extract a numeric magnitude from a value string.
///
/// Strips `$`, `%`, and thousands separators, then applies a
/// billion/million/thousand multiplier when one trails the number. Returns
/// `None` (never errors) when no number is present.
pub fn extract_numeric(value: &str) -> Option<f64> {
    static NUMERIC_RE: OnceLock<Regex> = OnceLock::new();
    let re = NUMERIC_RE.get_or_init(|| {
        Regex::new(r"(\d+(?:\.\d+)?)\s*(billion|million|thousand|bn|b|mn|m|k)?")
            .expect("numeric pattern is valid")
    });

    // Commas are thousands separators and must vanish entirely; currency
    // and percent signs just become whitespace.
    let cleaned = value
        .to_lowercase()
        .replace(',', "")
        .replace(['$', '%'], " ")
        .trim()
        .to_string();

    let caps = re.captures(&cleaned)?;
    let magnitude: f64 = caps.get(1)?.as_str().parse().ok()?;
    let multiplier = match caps.get(2).map(|m| m.as_str()) {
        Some("billion") | Some("bn") | Some("b") => 1e9,
        Some("million") | Some("mn") | Some("m") => 1e6,
        Some("thousand") | Some("k") => 1e3,
        _ => 1.0,
    };

    Some(magnitude * multiplier)
}

/// Extract a 4-digit year (1900-2099) from a value string.
pub fn extract_year(value: &str) -> Option<i32> {
    static YEAR_RE: OnceLock<Regex> = OnceLock::new();
    let re = YEAR_RE
        .get_or_init(|| Regex::new(r"\b(19|20)\d{2}\b").expect("year pattern is valid"));
    re.find(value)?.as_str().parse().ok()
}

/// Antonym pairs indicating crossed polarity between two text values.
const ANTONYM_PAIRS: &[(&str, &str)] = &[
    ("increase", "decrease"),
    ("grow", "shrink"),
    ("rise", "fall"),
    ("up", "down"),
    ("positive", "negative"),
    ("yes", "no"),
    ("true", "false"),
    ("success", "failure"),
    ("win", "lose"),
    ("gain", "loss"),
];

fn is_contradictory(a: &str, b: &str) -> bool {
    let a_lower = a.to_lowercase();
    let b_lower = b.to_lowercase();

    ANTONYM_PAIRS.iter().any(|(left, right)| {
        (a_lower.contains(left) && b_lower.contains(right))
            || (a_lower.contains(right) && b_lower.contains(left))
    })
}

/// Severity of a polarity contradiction scales with how confident the
/// extractor was in both facts.
fn polarity_severity(fact_a: &Fact, fact_b: &Fact) -> ConflictSeverity {
    let avg = (fact_a.confidence.weight() + fact_b.confidence.weight()) / 2.0;
    if avg > 0.7 {
        ConflictSeverity::High
    } else if avg > 0.4 {
        ConflictSeverity::Medium
    } else {
        ConflictSeverity::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::{FactSource, SourceQuality};

    fn fact(entity: &str, attribute: &str, value: &str, value_type: ValueType) -> Fact {
        Fact::new(entity, attribute, value).with_value_type(value_type)
    }

    #[test]
    fn test_extract_numeric_currency() {
        assert_eq!(extract_numeric("$184B"), Some(184e9));
        assert_eq!(extract_numeric("$1.5 billion"), Some(1.5e9));
        assert_eq!(extract_numeric("42 million"), Some(42e6));
        assert_eq!(extract_numeric("12,500"), Some(12500.0));
        assert_eq!(extract_numeric("7.3%"), Some(7.3));
    }

    #[test]
    fn test_extract_numeric_malformed_returns_none() {
        assert_eq!(extract_numeric("roughly doubled"), None);
        assert_eq!(extract_numeric(""), None);
        assert_eq!(extract_numeric("$$$"), None);
    }

    #[test]
    fn test_extract_year() {
        assert_eq!(extract_year("founded in 1998"), Some(1998));
        assert_eq!(extract_year("Q3 2024 report"), Some(2024));
        assert_eq!(extract_year("300 employees"), None);
        assert_eq!(extract_year("year 20245 typo"), None);
    }

    #[test]
    fn test_identical_values_no_conflict() {
        let facts = vec![
            fact("AI Market", "size", "$184B", ValueType::Currency),
            fact("ai market", "Size", "$184b", ValueType::Currency),
        ];
        assert!(detect_conflicts(&facts, &ConflictTolerance::default()).is_empty());
    }

    #[test]
    fn test_numeric_severity_ladder() {
        let tolerance = ConflictTolerance::default();

        // ~12% difference: above the 10% tolerance, below the 20% medium bar.
        let facts = vec![
            fact("AI Market", "size", "$184B", ValueType::Currency),
            fact("AI Market", "size", "$210B", ValueType::Currency),
        ];
        let conflicts = detect_conflicts(&facts, &tolerance);
        let pair_conflict = conflicts
            .iter()
            .find(|c| c.conflict_type == ConflictType::Contradiction)
            .expect("expected a contradiction");
        assert_eq!(pair_conflict.severity, ConflictSeverity::Low);

        // ~33% difference: medium.
        let facts = vec![
            fact("AI Market", "size", "$100B", ValueType::Currency),
            fact("AI Market", "size", "$150B", ValueType::Currency),
        ];
        let conflicts = detect_conflicts(&facts, &tolerance);
        assert_eq!(conflicts[0].severity, ConflictSeverity::Medium);

        // 75% difference: high.
        let facts = vec![
            fact("AI Market", "size", "$50B", ValueType::Currency),
            fact("AI Market", "size", "$200B", ValueType::Currency),
        ];
        let conflicts = detect_conflicts(&facts, &tolerance);
        assert_eq!(conflicts[0].severity, ConflictSeverity::High);
    }

    #[test]
    fn test_per_type_tolerance_override() {
        // 15% apart: default 10% tolerance fires, a 25% currency override
        // does not.
        let facts = vec![
            fact("Acme", "revenue", "$100M", ValueType::Currency),
            fact("Acme", "revenue", "$115M", ValueType::Currency),
        ];

        let default_tol = ConflictTolerance::default();
        assert_eq!(detect_conflicts(&facts, &default_tol).len(), 1);

        let loose = ConflictTolerance::default().with_type_tolerance(ValueType::Currency, 0.25);
        assert!(detect_conflicts(&facts, &loose).is_empty());
    }

    #[test]
    fn test_temporal_mismatch() {
        let facts = vec![
            fact("Acme", "founded", "1998", ValueType::Date),
            fact("Acme", "founded", "2003", ValueType::Date),
        ];
        let conflicts = detect_conflicts(&facts, &ConflictTolerance::default());
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].conflict_type, ConflictType::TemporalMismatch);
        assert_eq!(conflicts[0].severity, ConflictSeverity::Medium);
    }

    #[test]
    fn test_same_year_within_tolerance() {
        let facts = vec![
            fact("Acme", "founded", "early 1998", ValueType::Date),
            fact("Acme", "founded", "late 1998", ValueType::Date),
        ];
        assert!(detect_conflicts(&facts, &ConflictTolerance::default()).is_empty());
    }

    #[test]
    fn test_antonym_contradiction() {
        let facts = vec![
            fact("Revenue", "trend", "expected to increase", ValueType::Text)
                .with_confidence(FactConfidence::High),
            fact("Revenue", "trend", "projected to decrease", ValueType::Text)
                .with_confidence(FactConfidence::High),
        ];
        let conflicts = detect_conflicts(&facts, &ConflictTolerance::default());
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].conflict_type, ConflictType::Contradiction);
        assert_eq!(conflicts[0].severity, ConflictSeverity::High);
    }

    #[test]
    fn test_plain_inconsistency_is_weak() {
        let facts = vec![
            fact("Acme", "ceo", "Jordan Lee", ValueType::Text),
            fact("Acme", "ceo", "Sam Reyes", ValueType::Text),
        ];
        let conflicts = detect_conflicts(&facts, &ConflictTolerance::default());
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].conflict_type, ConflictType::Inconsistency);
        assert_eq!(conflicts[0].severity, ConflictSeverity::Low);
        assert!(conflicts[0].confidence < 0.6);
    }

    #[test]
    fn test_malformed_numeric_degrades_to_inconsistency() {
        let facts = vec![
            fact("Acme", "revenue", "substantial", ValueType::Currency),
            fact("Acme", "revenue", "$50M", ValueType::Currency),
        ];
        let conflicts = detect_conflicts(&facts, &ConflictTolerance::default());
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].conflict_type, ConflictType::Inconsistency);
    }

    #[test]
    fn test_low_confidence_pairs_skipped() {
        let facts = vec![
            fact("Acme", "hq", "Berlin", ValueType::Text).with_confidence(FactConfidence::Low),
            fact("Acme", "hq", "Munich", ValueType::Text).with_confidence(FactConfidence::Low),
        ];
        assert!(detect_conflicts(&facts, &ConflictTolerance::default()).is_empty());

        let keep_noise = ConflictTolerance {
            ignore_low_confidence: false,
            ..Default::default()
        };
        assert_eq!(detect_conflicts(&facts, &keep_noise).len(), 1);
    }

    #[test]
    fn test_source_disagreement_pass() {
        let facts = vec![
            fact("Acme", "hq", "Berlin", ValueType::Text)
                .with_source(FactSource::new("https://a.example")),
            fact("Acme", "hq", "Munich", ValueType::Text)
                .with_source(FactSource::new("https://b.example")),
        ];
        let conflicts = detect_conflicts(&facts, &ConflictTolerance::default());
        assert!(conflicts
            .iter()
            .any(|c| c.conflict_type == ConflictType::SourceDisagreement));
    }

    #[test]
    fn test_detection_symmetry() {
        let forward = vec![
            fact("AI Market", "size", "$184B", ValueType::Currency)
                .with_source(FactSource::new("https://a.example").with_quality(SourceQuality::B)),
            fact("ai market", "Size", "$210B", ValueType::Currency)
                .with_source(FactSource::new("https://b.example").with_quality(SourceQuality::A)),
        ];
        let mut reversed = forward.clone();
        reversed.reverse();

        let tolerance = ConflictTolerance::default();
        let conflicts_fwd = detect_conflicts(&forward, &tolerance);
        let conflicts_rev = detect_conflicts(&reversed, &tolerance);

        assert_eq!(conflicts_fwd.len(), conflicts_rev.len());
        for (a, b) in conflicts_fwd.iter().zip(conflicts_rev.iter()) {
            assert_eq!(a.conflict_type, b.conflict_type);
            assert_eq!(a.fact_a, b.fact_a);
            assert_eq!(a.fact_b, b.fact_b);
        }
    }

    #[test]
    fn test_resolution_quality_ladder() {
        let fact_a = fact("AI Market", "size", "$184B", ValueType::Currency)
            .with_source(FactSource::new("https://a.example").with_quality(SourceQuality::B));
        let fact_b = fact("AI Market", "size", "$210B", ValueType::Currency)
            .with_source(FactSource::new("https://b.example").with_quality(SourceQuality::A));

        let resolution = suggest_resolution(&fact_a, &fact_b);
        assert_eq!(resolution.strategy, "prefer_higher_quality");
        assert_eq!(resolution.preferred_fact, PreferredFact::B);
    }

    #[test]
    fn test_resolution_confidence_ladder() {
        let fact_a = fact("x", "y", "1", ValueType::Number)
            .with_confidence(FactConfidence::High);
        let fact_b = fact("x", "y", "2", ValueType::Number)
            .with_confidence(FactConfidence::Medium);

        let resolution = suggest_resolution(&fact_a, &fact_b);
        assert_eq!(resolution.strategy, "prefer_higher_confidence");
        assert_eq!(resolution.preferred_fact, PreferredFact::A);
    }

    #[test]
    fn test_resolution_totality() {
        // Identical quality and confidence must still produce an answer.
        let fact_a = fact("x", "y", "1", ValueType::Number);
        let fact_b = fact("x", "y", "2", ValueType::Number);

        let resolution = suggest_resolution(&fact_a, &fact_b);
        assert_eq!(resolution.strategy, "manual_review");
        assert_eq!(resolution.preferred_fact, PreferredFact::Neither);
    }

    #[test]
    fn test_conflict_type_round_trip() {
        for ct in [
            ConflictType::Contradiction,
            ConflictType::Inconsistency,
            ConflictType::TemporalMismatch,
            ConflictType::SourceDisagreement,
        ] {
            assert_eq!(ct.to_string().parse::<ConflictType>().unwrap(), ct);
        }
    }
}
