//! Taxonomic status vocabulary.

use serde::{Deserialize, Serialize};

/// How a name is used by the reference taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaxonomicStatus {
    Accepted,
    Synonym,
    HomotypicSynonym,
    HeterotypicSynonym,
    ProParteSynonym,
    /// A name used in the literature for a different taxon.
    Misapplied,
    /// Known not to belong to the region or dataset.
    Excluded,
    /// Accepted by default because nothing places it elsewhere.
    InferredUnplaced,
    #[default]
    Unknown,
}

impl TaxonomicStatus {
    /// Lenient parse: case, spaces, hyphens and underscores are ignored and
    /// unrecognised terms map to [`TaxonomicStatus::Unknown`].
    pub fn parse(term: &str) -> Self {
        let key: String = term
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "accepted" | "valid" => Self::Accepted,
            "synonym" => Self::Synonym,
            "homotypicsynonym" | "objectivesynonym" => Self::HomotypicSynonym,
            "heterotypicsynonym" | "subjectivesynonym" => Self::HeterotypicSynonym,
            "propartesynonym" => Self::ProParteSynonym,
            "misapplied" => Self::Misapplied,
            "excluded" => Self::Excluded,
            "inferredunplaced" | "unplaced" => Self::InferredUnplaced,
            _ => Self::Unknown,
        }
    }

    pub fn is_accepted(self) -> bool {
        self == Self::Accepted
    }

    /// Any of the synonym statuses.
    pub fn is_synonym(self) -> bool {
        matches!(
            self,
            Self::Synonym | Self::HomotypicSynonym | Self::HeterotypicSynonym | Self::ProParteSynonym
        )
    }

    pub fn is_misapplied(self) -> bool {
        self == Self::Misapplied
    }

    pub fn is_excluded(self) -> bool {
        self == Self::Excluded
    }

    /// Placed in the taxonomy: accepted, or a synonym of something accepted.
    pub fn is_placed(self) -> bool {
        self.is_accepted() || self.is_synonym()
    }

    /// Tie-break order when posteriors are close: lower is preferred.
    pub fn preference(self) -> u8 {
        match self {
            Self::Accepted => 0,
            Self::Synonym | Self::HomotypicSynonym | Self::HeterotypicSynonym => 1,
            Self::ProParteSynonym => 2,
            Self::InferredUnplaced | Self::Unknown => 3,
            Self::Misapplied => 4,
            Self::Excluded => 5,
        }
    }

    /// The vocabulary term.
    pub fn term(self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Synonym => "synonym",
            Self::HomotypicSynonym => "homotypicSynonym",
            Self::HeterotypicSynonym => "heterotypicSynonym",
            Self::ProParteSynonym => "proParteSynonym",
            Self::Misapplied => "misapplied",
            Self::Excluded => "excluded",
            Self::InferredUnplaced => "inferredUnplaced",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for TaxonomicStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.term())
    }
}
