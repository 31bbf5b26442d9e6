use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use uuid::Uuid;

pub const ATTR_NAME: &str = "name";
pub const ATTR_ADDRESS: &str = "address";
pub const ATTR_CHAIN: &str = "chain";
pub const ATTR_COUNTRY: &str = "country";
pub const ATTR_NATIONALITY: &str = "nationality";
pub const ATTR_DATE_OF_BIRTH: &str = "date_of_birth";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    Individual,
    Address,
}

impl SubjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectKind::Individual => "individual",
            SubjectKind::Address => "address",
        }
    }
}

/// Something to be screened: a person (by name) or an on-chain address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScreeningSubject {
    pub kind: SubjectKind,
    pub attributes: HashMap<String, String>,
}

impl ScreeningSubject {
    pub fn individual(name: impl Into<String>) -> Self {
        let mut attributes = HashMap::new();
        attributes.insert(ATTR_NAME.to_string(), name.into());
        Self {
            kind: SubjectKind::Individual,
            attributes,
        }
    }

    pub fn address(address: impl Into<String>, chain: impl Into<String>) -> Self {
        let mut attributes = HashMap::new();
        attributes.insert(ATTR_ADDRESS.to_string(), address.into());
        attributes.insert(ATTR_CHAIN.to_string(), chain.into());
        Self {
            kind: SubjectKind::Address,
            attributes,
        }
    }

    pub fn with_attribute(mut self, key: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    /// Attribute value, trimmed; `None` when absent or blank.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn name(&self) -> Option<&str> {
        self.attribute(ATTR_NAME)
    }

    pub fn address_value(&self) -> Option<&str> {
        self.attribute(ATTR_ADDRESS)
    }

    pub fn chain(&self) -> Option<&str> {
        self.attribute(ATTR_CHAIN)
    }

    /// The attribute a provider needs before it may be called.
    pub fn has_required_attributes(&self) -> bool {
        match self.kind {
            SubjectKind::Individual => self.name().is_some(),
            SubjectKind::Address => self.address_value().is_some() && self.chain().is_some(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScreeningMatch {
    pub provider: String,
    pub external_id: String,
    pub name: String,
    match_score: u8,
    pub subject_type: SubjectKind,
    pub program: String,
    pub description: String,
}

impl ScreeningMatch {
    /// Builds a match; `None` for an empty name. The score is clamped to 0-100.
    pub fn new(
        provider: &str,
        external_id: impl Into<String>,
        name: &str,
        match_score: f64,
        subject_type: SubjectKind,
        program: impl Into<String>,
        description: impl Into<String>,
    ) -> Option<Self> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let score = if match_score.is_finite() {
            match_score.round().clamp(0.0, 100.0) as u8
        } else {
            0
        };

        Some(Self {
            provider: provider.to_string(),
            external_id: external_id.into(),
            name: name.to_string(),
            match_score: score,
            subject_type,
            program: program.into(),
            description: description.into(),
        })
    }

    pub fn match_score(&self) -> u8 {
        self.match_score
    }

    pub fn category(&self) -> MatchCategory {
        MatchCategory::from_program(&self.program)
    }
}

/// What kind of list a match came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MatchCategory {
    Sanctions,
    Pep,
    AdverseMedia,
}

impl MatchCategory {
    pub fn from_program(program: &str) -> Self {
        let upper = program.to_uppercase();
        if upper.contains("PEP") || upper.contains("POLITICALLY") {
            MatchCategory::Pep
        } else if upper.contains("ADVERSE") || upper.contains("MEDIA") {
            MatchCategory::AdverseMedia
        } else {
            MatchCategory::Sanctions
        }
    }
}

/// Matches grouped by provider.
///
/// `total_matches` is maintained by every mutator so it always equals the
/// number of materialized matches, and every provider holding matches is
/// also listed as checked.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScreeningResult {
    matches_by_provider: BTreeMap<String, Vec<ScreeningMatch>>,
    providers_checked: BTreeSet<String>,
    total_matches: usize,
}

impl ScreeningResult {
    /// Nothing attempted, nothing found.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Provider was called (or tried to be) and contributes no matches.
    pub fn checked(provider: &str) -> Self {
        Self::from_matches(provider, Vec::new())
    }

    pub fn from_matches(provider: &str, matches: Vec<ScreeningMatch>) -> Self {
        let mut result = Self::default();
        result.providers_checked.insert(provider.to_string());
        result.total_matches = matches.len();
        result
            .matches_by_provider
            .insert(provider.to_string(), matches);
        result
    }

    pub fn merge(&mut self, other: ScreeningResult) {
        self.providers_checked.extend(other.providers_checked);
        for (provider, matches) in other.matches_by_provider {
            self.total_matches += matches.len();
            self.providers_checked.insert(provider.clone());
            self.matches_by_provider
                .entry(provider)
                .or_default()
                .extend(matches);
        }
    }

    pub fn matches_by_provider(&self) -> &BTreeMap<String, Vec<ScreeningMatch>> {
        &self.matches_by_provider
    }

    pub fn providers_checked(&self) -> &BTreeSet<String> {
        &self.providers_checked
    }

    pub fn total_matches(&self) -> usize {
        self.total_matches
    }

    pub fn is_clear(&self) -> bool {
        self.total_matches == 0
    }

    pub fn matches(&self) -> impl Iterator<Item = &ScreeningMatch> {
        self.matches_by_provider.values().flatten()
    }

    /// Matches of a category at or above `min_score`.
    pub fn matches_in(
        &self,
        category: MatchCategory,
        min_score: u8,
    ) -> impl Iterator<Item = &ScreeningMatch> {
        self.matches()
            .filter(move |m| m.category() == category && m.match_score >= min_score)
    }
}

/// A persisted screening run for one entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningRecord {
    pub screening_id: Uuid,
    pub entity_id: String,
    pub subject: ScreeningSubject,
    pub result: ScreeningResult,
    pub screened_at: DateTime<Utc>,
}

impl ScreeningRecord {
    pub fn new(entity_id: &str, subject: ScreeningSubject, result: ScreeningResult) -> Self {
        Self {
            screening_id: Uuid::new_v4(),
            entity_id: entity_id.to_string(),
            subject,
            result,
            screened_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(provider: &str, name: &str, score: f64) -> ScreeningMatch {
        ScreeningMatch::new(
            provider,
            "id-1",
            name,
            score,
            SubjectKind::Individual,
            "SDN",
            "",
        )
        .unwrap()
    }

    #[test]
    fn test_match_requires_name() {
        assert!(ScreeningMatch::new("p", "1", "   ", 90.0, SubjectKind::Individual, "SDN", "")
            .is_none());
    }

    #[test]
    fn test_match_score_clamped() {
        assert_eq!(hit("p", "A", 140.0).match_score(), 100);
        assert_eq!(hit("p", "A", -3.0).match_score(), 0);
        assert_eq!(hit("p", "A", f64::NAN).match_score(), 0);
        assert_eq!(hit("p", "A", 87.4).match_score(), 87);
    }

    #[test]
    fn test_merge_keeps_totals() {
        let mut result = ScreeningResult::empty();
        result.merge(ScreeningResult::from_matches(
            "alpha",
            vec![hit("alpha", "A", 90.0), hit("alpha", "B", 91.0)],
        ));
        result.merge(ScreeningResult::checked("beta"));
        result.merge(ScreeningResult::from_matches("gamma", vec![hit("gamma", "C", 99.0)]));

        assert_eq!(result.total_matches(), 3);
        assert_eq!(result.providers_checked().len(), 3);
        assert!(result.providers_checked().contains("beta"));
        assert_eq!(result.matches_by_provider()["alpha"].len(), 2);
    }

    #[test]
    fn test_subject_blank_name_missing() {
        let subject = ScreeningSubject::individual("  ");
        assert!(subject.name().is_none());
        assert!(!subject.has_required_attributes());

        let address = ScreeningSubject::address("0xabc", "");
        assert!(!address.has_required_attributes());
    }

    #[test]
    fn test_category_from_program() {
        assert_eq!(MatchCategory::from_program("PEP-Tier1"), MatchCategory::Pep);
        assert_eq!(MatchCategory::from_program("adverse_media"), MatchCategory::AdverseMedia);
        assert_eq!(MatchCategory::from_program("SDGT"), MatchCategory::Sanctions);
    }
}
