//! Observables: the typed attributes that make up a network.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::error::EvalResult;
use crate::expr::derivation::Derivation;
use crate::expr::phonetic::PhoneticEncoder;
use crate::value::{Value, ValueType};

static RE_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));

/// How many values an observable may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Multiplicity {
    #[default]
    Optional,
    Required,
    Many,
}

/// Presentation style applied to raw text before it is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    /// Trim and collapse whitespace only.
    #[default]
    Plain,
    /// Latin scientific names: strip diacritics, collapse whitespace,
    /// capitalise the first letter and lower-case the rest of the first word.
    Scientific,
    Lowercase,
    Uppercase,
    /// Identifiers are stored verbatim apart from trimming.
    Identifier,
}

impl Style {
    /// Normalise `raw` according to this style.
    pub fn apply(self, raw: &str) -> String {
        let trimmed = raw.trim();
        match self {
            Self::Identifier => trimmed.to_string(),
            Self::Plain => collapse(trimmed),
            Self::Lowercase => collapse(trimmed).to_lowercase(),
            Self::Uppercase => collapse(trimmed).to_uppercase(),
            Self::Scientific => {
                let folded = strip_diacritics(&collapse(trimmed));
                let mut words = folded.split(' ');
                let Some(first) = words.next() else {
                    return String::new();
                };
                let mut out = capitalise(first);
                for word in words {
                    out.push(' ');
                    out.push_str(word);
                }
                out
            }
        }
    }
}

fn collapse(s: &str) -> String {
    RE_WHITESPACE.replace_all(s, " ").into_owned()
}

/// Remove combining marks after canonical decomposition, and expand ligatures.
pub fn strip_diacritics(s: &str) -> String {
    s.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(|c| match c {
            'æ' => vec!['a', 'e'],
            'Æ' => vec!['A', 'e'],
            'œ' => vec!['o', 'e'],
            'Œ' => vec!['O', 'e'],
            'ß' => vec!['s', 's'],
            other => vec![other],
        })
        .collect()
}

fn capitalise(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// How two values of an observable are compared during matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Equivalence {
    #[default]
    Exact,
    CaseInsensitive,
    /// Values are equivalent when their phonetic codes agree.
    Phonetic,
}

impl Equivalence {
    /// Compare two single values.
    pub fn equivalent(self, a: &Value, b: &Value, phonetic: &PhoneticEncoder) -> EvalResult<bool> {
        match (self, a, b) {
            (Self::Exact, _, _) => Ok(a == b),
            (Self::CaseInsensitive, Value::Text(x), Value::Text(y)) => {
                Ok(x.to_lowercase() == y.to_lowercase())
            }
            (Self::Phonetic, Value::Text(x), Value::Text(y)) => {
                Ok(phonetic.encode(x)? == phonetic.encode(y)?)
            }
            _ => Ok(a == b),
        }
    }

    /// Compare two value lists: true when any pair is equivalent.
    pub fn any_equivalent(
        self,
        left: &[Value],
        right: &[Value],
        phonetic: &PhoneticEncoder,
    ) -> EvalResult<bool> {
        for a in left {
            for b in right {
                if self.equivalent(a, b, phonetic)? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

/// One attribute of a record.
///
/// Observables are immutable once a network is loaded and are compared by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observable {
    /// Stable identifier, unique within a network.
    pub id: String,
    /// Optional external vocabulary reference (e.g. a Darwin Core term URI).
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(rename = "type", default = "default_type")]
    pub value_type: ValueType,
    #[serde(default)]
    pub multiplicity: Multiplicity,
    /// Named vocabulary that orders this observable's terms.
    #[serde(default)]
    pub vocabulary: Option<String>,
    /// How the value is computed from other observables.
    #[serde(default)]
    pub derivation: Option<Derivation>,
    /// How a fallback value is computed when winding a record back.
    #[serde(default)]
    pub base: Option<Derivation>,
    #[serde(default)]
    pub equivalence: Equivalence,
    #[serde(default)]
    pub style: Style,
}

fn default_type() -> ValueType {
    ValueType::Text
}

impl Observable {
    pub fn new(id: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            id: id.into(),
            uri: None,
            value_type,
            multiplicity: Multiplicity::Optional,
            vocabulary: None,
            derivation: None,
            base: None,
            equivalence: Equivalence::Exact,
            style: Style::Plain,
        }
    }

    pub fn with_multiplicity(mut self, multiplicity: Multiplicity) -> Self {
        self.multiplicity = multiplicity;
        self
    }

    pub fn with_style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    pub fn with_derivation(mut self, derivation: Derivation) -> Self {
        self.derivation = Some(derivation);
        self
    }

    pub fn with_equivalence(mut self, equivalence: Equivalence) -> Self {
        self.equivalence = equivalence;
        self
    }

    pub fn is_required(&self) -> bool {
        self.multiplicity == Multiplicity::Required
    }

    pub fn is_many(&self) -> bool {
        self.multiplicity == Multiplicity::Many
    }

    /// Coerce a value to this observable's type and apply its style to text.
    pub fn normalise(&self, value: Value) -> EvalResult<Value> {
        match value.coerce(&self.id, self.value_type)? {
            Value::Text(s) => Ok(Value::Text(self.style.apply(&s))),
            other => Ok(other),
        }
    }
}

impl PartialEq for Observable {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Observable {}

impl std::hash::Hash for Observable {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Display for Observable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}
