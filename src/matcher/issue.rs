//! Diagnostic flags attached to matches.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A non-exclusive diagnostic flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Issue {
    /// The matched name is a misapplication.
    MisappliedName,
    /// The matched name is excluded from the taxonomy.
    ExcludedName,
    /// Another candidate with the same name is misapplied.
    PartiallyMisapplied,
    /// Another candidate with the same name is excluded.
    PartiallyExcluded,
    /// A synonym whose accepted taxon is a child of this one, under the same name.
    ParentChildSynonym,
    /// Accepted and synonym candidates for the same name were combined.
    AcceptedAndSynonym,
    /// The same name under different nomenclatural codes.
    UnresolvedHomonym,
    /// Several acceptable candidates agree closely enough to pick one.
    MultipleMatches,
    PossibleMisspelling,
    /// The result is a least common ancestor, not a single record.
    SyntheticMatch,
    /// Matched after winding the query back to a higher rank.
    HigherOrderMatch,
    /// Matched after dropping the authorship.
    RemovedAuthorship,
    /// A synonym whose accepted name cannot be resolved.
    MissingAccepted,
}

impl Issue {
    /// Structurally bad evidence: the match cannot be used.
    pub fn is_bad(self) -> bool {
        matches!(self, Self::MissingAccepted)
    }

    pub fn term(self) -> &'static str {
        match self {
            Self::MisappliedName => "misapplied-name",
            Self::ExcludedName => "excluded-name",
            Self::PartiallyMisapplied => "partially-misapplied",
            Self::PartiallyExcluded => "partially-excluded",
            Self::ParentChildSynonym => "parent-child-synonym",
            Self::AcceptedAndSynonym => "accepted-and-synonym",
            Self::UnresolvedHomonym => "unresolved-homonym",
            Self::MultipleMatches => "multiple-matches",
            Self::PossibleMisspelling => "possible-misspelling",
            Self::SyntheticMatch => "synthetic-match",
            Self::HigherOrderMatch => "higher-order-match",
            Self::RemovedAuthorship => "removed-authorship",
            Self::MissingAccepted => "missing-accepted",
        }
    }
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.term())
    }
}

/// An append-only set of issues.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Issues(BTreeSet<Issue>);

impl Issues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of(issue: Issue) -> Self {
        Self(BTreeSet::from([issue]))
    }

    pub fn add(&mut self, issue: Issue) {
        self.0.insert(issue);
    }

    /// Add every issue of `other`.
    pub fn merge(&mut self, other: &Issues) {
        self.0.extend(other.0.iter().copied());
    }

    pub fn with(mut self, issue: Issue) -> Self {
        self.add(issue);
        self
    }

    pub fn contains(&self, issue: Issue) -> bool {
        self.0.contains(&issue)
    }

    pub fn is_bad(&self) -> bool {
        self.0.iter().any(|i| i.is_bad())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Issue> + '_ {
        self.0.iter().copied()
    }
}

impl std::fmt::Display for Issues {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let terms: Vec<&str> = self.iter().map(Issue::term).collect();
        write!(f, "[{}]", terms.join(", "))
    }
}
