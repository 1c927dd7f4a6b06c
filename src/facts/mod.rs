//! Atomic fact data model and the fact store.
//!
//! Facts are (entity, attribute, value) triples with provenance, produced by
//! an external extraction step and attached to research steps by reference.
//! They are never mutated, only superseded by new facts. The store itself is
//! a plain container: insert and query, nothing else.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An atomic (entity, attribute, value) claim with provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    /// The entity the claim is about (e.g., "AI Market").
    pub entity: String,
    /// The attribute being claimed (e.g., "size").
    pub attribute: String,
    /// The claimed value, as extracted (e.g., "$184B").
    pub value: String,
    /// The kind of value this is, guiding conflict detection.
    pub value_type: ValueType,
    /// Extractor confidence in the claim.
    pub confidence: FactConfidence,
    /// Where the claim came from.
    pub source: FactSource,
}

/// Provenance for a fact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactSource {
    /// Source URL, if any.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    /// Source title, if any.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    /// Author, if known.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author: String,
    /// Publication date as extracted; parsed only where needed.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub date: String,
    /// Ordinal trust rating assigned by the external source-quality rater.
    #[serde(default)]
    pub quality: SourceQuality,
}

/// The kind of value a fact carries.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// Plain numeric count or measure.
    Number,
    /// Monetary amount (may carry $ and billion/million suffixes).
    Currency,
    /// Calendar date or year.
    Date,
    /// Percentage value.
    Percentage,
    /// Free text; the weakest comparison signal.
    #[default]
    Text,
}

impl ValueType {
    /// Whether this type should be compared numerically.
    pub fn is_numeric(&self) -> bool {
        matches!(self, ValueType::Number | ValueType::Currency | ValueType::Percentage)
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueType::Number => write!(f, "number"),
            ValueType::Currency => write!(f, "currency"),
            ValueType::Date => write!(f, "date"),
            ValueType::Percentage => write!(f, "percentage"),
            ValueType::Text => write!(f, "text"),
        }
    }
}

impl std::str::FromStr for ValueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "number" => Ok(ValueType::Number),
            "currency" => Ok(ValueType::Currency),
            "date" => Ok(ValueType::Date),
            "percentage" => Ok(ValueType::Percentage),
            "text" => Ok(ValueType::Text),
            _ => Err(format!("Unknown value type: {}", s)),
        }
    }
}

/// Extractor confidence in a fact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FactConfidence {
    /// Weak or speculative extraction.
    Low,
    /// Reasonable but unverified extraction.
    #[default]
    Medium,
    /// Directly stated in the source.
    High,
}

impl FactConfidence {
    /// Numeric weight used for severity and resolution comparisons.
    pub fn weight(&self) -> f64 {
        match self {
            FactConfidence::High => 1.0,
            FactConfidence::Medium => 0.5,
            FactConfidence::Low => 0.2,
        }
    }
}

impl std::fmt::Display for FactConfidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FactConfidence::High => write!(f, "High"),
            FactConfidence::Medium => write!(f, "Medium"),
            FactConfidence::Low => write!(f, "Low"),
        }
    }
}

impl std::str::FromStr for FactConfidence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "high" => Ok(FactConfidence::High),
            "medium" => Ok(FactConfidence::Medium),
            "low" => Ok(FactConfidence::Low),
            _ => Err(format!("Unknown confidence level: {}", s)),
        }
    }
}

/// Ordinal source trust grade, A (best) through E (worst).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceQuality {
    /// Peer-reviewed, official, or primary source.
    A,
    /// Reputable secondary source.
    B,
    /// Ordinary editorial source.
    #[default]
    C,
    /// Weak or promotional source.
    D,
    /// Untrusted source.
    E,
}

impl SourceQuality {
    /// Numeric scale used by resolution and scoring (A highest).
    pub fn weight(&self) -> f64 {
        match self {
            SourceQuality::A => 1.0,
            SourceQuality::B => 0.8,
            SourceQuality::C => 0.6,
            SourceQuality::D => 0.4,
            SourceQuality::E => 0.2,
        }
    }
}

impl std::fmt::Display for SourceQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceQuality::A => write!(f, "A"),
            SourceQuality::B => write!(f, "B"),
            SourceQuality::C => write!(f, "C"),
            SourceQuality::D => write!(f, "D"),
            SourceQuality::E => write!(f, "E"),
        }
    }
}

impl std::str::FromStr for SourceQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "A" => Ok(SourceQuality::A),
            "B" => Ok(SourceQuality::B),
            "C" => Ok(SourceQuality::C),
            "D" => Ok(SourceQuality::D),
            "E" => Ok(SourceQuality::E),
            _ => Err(format!("Unknown source quality: {}", s)),
        }
    }
}

impl Fact {
    /// Create a new fact with default (text, medium-confidence) typing.
    pub fn new(
        entity: impl Into<String>,
        attribute: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            entity: entity.into(),
            attribute: attribute.into(),
            value: value.into(),
            value_type: ValueType::Text,
            confidence: FactConfidence::Medium,
            source: FactSource::default(),
        }
    }

    /// Set the value type.
    pub fn with_value_type(mut self, value_type: ValueType) -> Self {
        self.value_type = value_type;
        self
    }

    /// Set the extractor confidence.
    pub fn with_confidence(mut self, confidence: FactConfidence) -> Self {
        self.confidence = confidence;
        self
    }

    /// Set the provenance.
    pub fn with_source(mut self, source: FactSource) -> Self {
        self.source = source;
        self
    }

    /// Normalized entity key used for grouping (lowercase, trimmed).
    pub fn entity_key(&self) -> String {
        self.entity.trim().to_lowercase()
    }

    /// Normalized attribute key used for pairing (lowercase, trimmed).
    pub fn attribute_key(&self) -> String {
        self.attribute.trim().to_lowercase()
    }

    /// Source key for the source-disagreement pass: URL, falling back to title.
    pub fn source_key(&self) -> Option<&str> {
        if !self.source.url.is_empty() {
            Some(&self.source.url)
        } else if !self.source.title.is_empty() {
            Some(&self.source.title)
        } else {
            None
        }
    }
}

impl FactSource {
    /// Create a source with a URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the author.
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Set the publication date.
    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = date.into();
        self
    }

    /// Set the quality grade.
    pub fn with_quality(mut self, quality: SourceQuality) -> Self {
        self.quality = quality;
        self
    }
}

/// In-memory fact container keyed by normalized entity.
///
/// Pure data holder: insert and query, no detection logic. The conflict
/// resolver consumes slices of facts directly; this store exists so callers
/// accumulating facts across paths have somewhere uniform to put them.
#[derive(Debug, Clone, Default)]
pub struct FactStore {
    by_entity: HashMap<String, Vec<Fact>>,
    count: usize,
}

impl FactStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fact.
    pub fn insert(&mut self, fact: Fact) {
        self.by_entity.entry(fact.entity_key()).or_default().push(fact);
        self.count += 1;
    }

    /// Insert many facts.
    pub fn extend(&mut self, facts: impl IntoIterator<Item = Fact>) {
        for fact in facts {
            self.insert(fact);
        }
    }

    /// All facts recorded for an entity (case/whitespace-insensitive).
    pub fn by_entity(&self, entity: &str) -> &[Fact] {
        self.by_entity
            .get(&entity.trim().to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Facts for an entity filtered to one attribute.
    pub fn by_entity_attribute(&self, entity: &str, attribute: &str) -> Vec<&Fact> {
        let attr = attribute.trim().to_lowercase();
        self.by_entity(entity)
            .iter()
            .filter(|f| f.attribute_key() == attr)
            .collect()
    }

    /// Every fact in the store, in entity-grouped order.
    pub fn all(&self) -> Vec<Fact> {
        let mut out = Vec::with_capacity(self.count);
        let mut keys: Vec<_> = self.by_entity.keys().collect();
        keys.sort();
        for key in keys {
            out.extend(self.by_entity[key].iter().cloned());
        }
        out
    }

    /// Number of facts held.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_type_round_trip() {
        for vt in [
            ValueType::Number,
            ValueType::Currency,
            ValueType::Date,
            ValueType::Percentage,
            ValueType::Text,
        ] {
            assert_eq!(vt.to_string().parse::<ValueType>().unwrap(), vt);
        }
        assert!("scalar".parse::<ValueType>().is_err());
    }

    #[test]
    fn test_confidence_ordering() {
        assert!(FactConfidence::High > FactConfidence::Medium);
        assert!(FactConfidence::Medium > FactConfidence::Low);
        assert_eq!("HIGH".parse::<FactConfidence>().unwrap(), FactConfidence::High);
    }

    #[test]
    fn test_quality_weights_are_ordinal() {
        assert!(SourceQuality::A.weight() > SourceQuality::B.weight());
        assert!(SourceQuality::D.weight() > SourceQuality::E.weight());
        assert_eq!("b".parse::<SourceQuality>().unwrap(), SourceQuality::B);
    }

    #[test]
    fn test_entity_key_normalization() {
        let fact = Fact::new("  AI Market ", "Size", "$184B");
        assert_eq!(fact.entity_key(), "ai market");
        assert_eq!(fact.attribute_key(), "size");
    }

    #[test]
    fn test_store_groups_case_insensitively() {
        let mut store = FactStore::new();
        store.insert(Fact::new("AI Market", "size", "$184B"));
        store.insert(Fact::new("ai market", "Size", "$210B"));
        store.insert(Fact::new("Quantum", "qubits", "1000"));

        assert_eq!(store.len(), 3);
        assert_eq!(store.by_entity("AI MARKET").len(), 2);
        assert_eq!(store.by_entity_attribute("ai market", "SIZE").len(), 2);
        assert_eq!(store.by_entity("missing").len(), 0);
    }

    #[test]
    fn test_source_key_falls_back_to_title() {
        let fact = Fact::new("x", "y", "z")
            .with_source(FactSource::default().with_title("Annual Report"));
        assert_eq!(fact.source_key(), Some("Annual Report"));

        let fact = Fact::new("x", "y", "z").with_source(FactSource::new("https://a.example"));
        assert_eq!(fact.source_key(), Some("https://a.example"));

        let fact = Fact::new("x", "y", "z");
        assert_eq!(fact.source_key(), None);
    }
}
