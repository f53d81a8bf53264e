//! Derivations: rules that compute one observable from others.

use serde::{Deserialize, Serialize};

use crate::config::{MatchFlag, MatchOptions};
use crate::error::EvalResult;
use crate::network::Network;
use crate::record::Record;
use crate::value::Value;

use super::condition::Condition;

/// Everything a derivation may read besides the record itself.
pub struct DeriveContext<'a> {
    pub network: &'a Network,
    pub options: &'a MatchOptions,
    /// Ancestors of the record in the containment tree, nearest first.
    /// Only parent lookups read them.
    pub ancestors: &'a [&'a dyn Record],
}

impl<'a> DeriveContext<'a> {
    pub fn new(network: &'a Network, options: &'a MatchOptions) -> Self {
        Self {
            network,
            options,
            ancestors: &[],
        }
    }

    pub fn with_ancestors(mut self, ancestors: &'a [&'a dyn Record]) -> Self {
        self.ancestors = ancestors;
        self
    }
}

/// The value computation itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DerivationKind {
    /// Copy the values of another observable.
    Copy { source: String },
    /// A fresh identifier; takes no inputs.
    Generator {
        #[serde(default)]
        prefix: String,
    },
    /// Phonetic code of the source's primary value.
    Phonetic { source: String },
    /// Every prefix of the source text between `min` and `max` characters.
    Prefix {
        source: String,
        #[serde(default = "default_prefix_min")]
        min: usize,
        #[serde(default)]
        max: Option<usize>,
    },
    /// The primary values of several sources joined into one string.
    Join {
        sources: Vec<String>,
        #[serde(default = "default_separator")]
        separator: String,
    },
    /// The source value of the nearest ancestor accepted by `select`.
    Parent {
        source: String,
        #[serde(default)]
        select: Option<Condition>,
    },
    /// One whitespace-separated word of the source's primary value,
    /// counting from zero.
    Word {
        source: String,
        #[serde(default)]
        index: usize,
    },
    /// The first alternative that yields any values.
    FirstOf { alternatives: Vec<DerivationKind> },
}

impl DerivationKind {
    fn inputs(&self) -> Vec<String> {
        match self {
            Self::Copy { source }
            | Self::Phonetic { source }
            | Self::Prefix { source, .. }
            | Self::Word { source, .. } => vec![source.clone()],
            Self::Join { sources, .. } => sources.clone(),
            Self::FirstOf { alternatives } => alternatives.iter().flat_map(Self::inputs).collect(),
            Self::Generator { .. } | Self::Parent { .. } => Vec::new(),
        }
    }

    fn references(&self) -> Vec<String> {
        match self {
            Self::Parent { source, select } => {
                let mut refs = vec![source.clone()];
                if let Some(select) = select {
                    refs.extend(select.inputs());
                }
                refs
            }
            Self::FirstOf { alternatives } => {
                alternatives.iter().flat_map(Self::references).collect()
            }
            _ => self.inputs(),
        }
    }

    fn any(&self, test: &impl Fn(&Self) -> bool) -> bool {
        match self {
            Self::FirstOf { alternatives } => alternatives.iter().any(|a| a.any(test)),
            other => test(other),
        }
    }

    fn compute(&self, record: &dyn Record, ctx: &DeriveContext<'_>) -> EvalResult<Vec<Value>> {
        match self {
            Self::Copy { source } => Ok(record.values_of(source)),
            Self::Generator { prefix } => {
                Ok(vec![Value::Text(format!("{prefix}{}", uuid::Uuid::new_v4()))])
            }
            Self::Phonetic { source } => match record.text_of(source) {
                Some(text) => Ok(vec![Value::Text(ctx.network.phonetic().encode(&text)?)]),
                None => Ok(Vec::new()),
            },
            Self::Prefix { source, min, max } => {
                let Some(text) = record.text_of(source) else {
                    return Ok(Vec::new());
                };
                let chars: Vec<char> = text.chars().collect();
                let upper = max.unwrap_or(chars.len()).min(chars.len());
                Ok(((*min).max(1)..=upper)
                    .map(|n| Value::Text(chars[..n].iter().collect()))
                    .collect())
            }
            Self::Join { sources, separator } => {
                let parts: Vec<String> = sources.iter().filter_map(|s| record.text_of(s)).collect();
                if parts.is_empty() {
                    Ok(Vec::new())
                } else {
                    Ok(vec![Value::Text(parts.join(separator))])
                }
            }
            Self::Parent { source, select } => {
                for ancestor in ctx.ancestors {
                    let selected = match select {
                        Some(condition) => condition.permits(*ancestor, ctx.network),
                        None => true,
                    };
                    if selected {
                        let values = ancestor.values_of(source);
                        if !values.is_empty() {
                            return Ok(values);
                        }
                    }
                }
                Ok(Vec::new())
            }
            Self::Word { source, index } => Ok(record
                .text_of(source)
                .and_then(|text| text.split_whitespace().nth(*index).map(str::to_string))
                .map(Value::Text)
                .into_iter()
                .collect()),
            Self::FirstOf { alternatives } => {
                for alternative in alternatives {
                    let values = alternative.compute(record, ctx)?;
                    if !values.is_empty() {
                        return Ok(values);
                    }
                }
                Ok(Vec::new())
            }
        }
    }
}

fn default_prefix_min() -> usize {
    3
}

fn default_separator() -> String {
    " ".into()
}

/// A derivation with its optional gates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Derivation {
    #[serde(flatten)]
    pub kind: DerivationKind,
    /// Only derive when this condition does not fail.
    #[serde(default)]
    pub condition: Option<Condition>,
    /// Only derive when this match option is switched on.
    #[serde(default)]
    pub option: Option<MatchFlag>,
}

impl Derivation {
    pub fn new(kind: DerivationKind) -> Self {
        Self {
            kind,
            condition: None,
            option: None,
        }
    }

    pub fn copy(source: impl Into<String>) -> Self {
        Self::new(DerivationKind::Copy {
            source: source.into(),
        })
    }

    pub fn phonetic(source: impl Into<String>) -> Self {
        Self::new(DerivationKind::Phonetic {
            source: source.into(),
        })
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_option(mut self, option: MatchFlag) -> Self {
        self.option = Some(option);
        self
    }

    /// Observables of the same record this derivation reads.
    ///
    /// Parent lookups read ancestors, not the record, so they report none.
    pub fn inputs(&self) -> Vec<String> {
        let mut inputs = self.kind.inputs();
        inputs.sort();
        inputs.dedup();
        inputs
    }

    /// Every observable named anywhere in the derivation, for validation.
    pub fn references(&self) -> Vec<String> {
        let mut refs = self.kind.references();
        if let Some(condition) = &self.condition {
            refs.extend(condition.inputs());
        }
        refs.sort();
        refs.dedup();
        refs
    }

    pub fn is_multi_valued(&self) -> bool {
        self.kind.any(&|k| matches!(k, DerivationKind::Prefix { .. }))
    }

    /// Whether the derivation only runs under a match option.
    pub fn is_optional(&self) -> bool {
        self.option.is_some()
    }

    pub fn selection_condition(&self) -> Option<&Condition> {
        match &self.kind {
            DerivationKind::Parent { select, .. } => select.as_ref(),
            _ => None,
        }
    }

    /// Whether the derivation needs ancestor context.
    pub fn needs_context(&self) -> bool {
        self.kind.any(&|k| matches!(k, DerivationKind::Parent { .. }))
    }

    /// Check the option gate and condition.
    pub fn applies(&self, record: &dyn Record, ctx: &DeriveContext<'_>) -> bool {
        if !ctx.options.permits(self.option) {
            return false;
        }
        match &self.condition {
            Some(condition) => condition.permits(record, ctx.network),
            None => true,
        }
    }

    /// Compute the derived values. An empty result means "nothing to derive".
    pub fn compute(&self, record: &dyn Record, ctx: &DeriveContext<'_>) -> EvalResult<Vec<Value>> {
        self.kind.compute(record, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::observable::Observable;
    use crate::network::NetworkBuilder;
    use crate::record::Classifier;
    use crate::value::ValueType;

    fn network() -> Network {
        let mut rank = Observable::new("rank", ValueType::Term);
        rank.vocabulary = Some("rank".into());
        NetworkBuilder::new("test", "Taxon")
            .vocabulary("rank", ["kingdom", "family", "genus", "species"])
            .observable(Observable::new("name", ValueType::Text))
            .observable(Observable::new("author", ValueType::Text))
            .observable(rank)
            .build()
            .unwrap()
    }

    fn taxon(name: &str, rank: &str) -> Classifier {
        let mut c = Classifier::new("Taxon");
        c.add("name", Value::from(name));
        c.add("rank", Value::from(rank));
        c
    }

    #[test]
    fn join_skips_missing_sources() {
        let net = network();
        let options = MatchOptions::default();
        let ctx = DeriveContext::new(&net, &options);
        let d = Derivation::new(DerivationKind::Join {
            sources: vec!["name".into(), "author".into()],
            separator: " ".into(),
        });
        let rec = taxon("Acacia dealbata", "species");
        assert_eq!(d.compute(&rec, &ctx).unwrap(), vec![Value::from("Acacia dealbata")]);
    }

    #[test]
    fn prefixes_are_multi_valued() {
        let net = network();
        let options = MatchOptions::default();
        let ctx = DeriveContext::new(&net, &options);
        let d = Derivation::new(DerivationKind::Prefix {
            source: "name".into(),
            min: 3,
            max: Some(5),
        });
        assert!(d.is_multi_valued());
        let values = d.compute(&taxon("Acacia", "genus"), &ctx).unwrap();
        assert_eq!(
            values,
            vec![Value::from("Aca"), Value::from("Acac"), Value::from("Acaci")]
        );
    }

    #[test]
    fn parent_lookup_selects_matching_ancestor() {
        let net = network();
        let options = MatchOptions::default();
        let genus = taxon("Acacia", "genus");
        let family = taxon("Fabaceae", "family");
        let kingdom = taxon("Plantae", "kingdom");
        let ancestors: Vec<&dyn Record> = vec![&genus, &family, &kingdom];
        let ctx = DeriveContext::new(&net, &options).with_ancestors(&ancestors);

        let d = Derivation::new(DerivationKind::Parent {
            source: "name".into(),
            select: Some(Condition::equals("rank", "family")),
        });
        assert!(d.needs_context());
        assert!(d.inputs().is_empty());
        let values = d.compute(&taxon("Acacia dealbata", "species"), &ctx).unwrap();
        assert_eq!(values, vec![Value::from("Fabaceae")]);
    }

    #[test]
    fn optional_derivation_respects_options() {
        let net = network();
        let exact = MatchOptions::exact();
        let fuzzy = MatchOptions::default();
        let d = Derivation::phonetic("name").with_option(MatchFlag::FuzzyDerivations);
        let rec = taxon("Acacia", "genus");
        assert!(!d.applies(&rec, &DeriveContext::new(&net, &exact)));
        assert!(d.applies(&rec, &DeriveContext::new(&net, &fuzzy)));
    }

    #[test]
    fn generator_makes_fresh_identifiers() {
        let net = network();
        let options = MatchOptions::default();
        let ctx = DeriveContext::new(&net, &options);
        let d = Derivation::new(DerivationKind::Generator {
            prefix: "urn:test:".into(),
        });
        let rec = Classifier::new("Taxon");
        let a = d.compute(&rec, &ctx).unwrap();
        let b = d.compute(&rec, &ctx).unwrap();
        assert_ne!(a, b);
        assert!(a[0].as_str().unwrap().starts_with("urn:test:"));
    }

    #[test]
    fn word_picks_one_word_of_the_source() {
        let net = network();
        let options = MatchOptions::default();
        let ctx = DeriveContext::new(&net, &options);
        let rec = taxon("Acacia  dealbata", "species");
        let word = |index| Derivation::new(DerivationKind::Word {
            source: "name".into(),
            index,
        });
        assert_eq!(word(0).compute(&rec, &ctx).unwrap(), vec![Value::from("Acacia")]);
        assert_eq!(word(1).compute(&rec, &ctx).unwrap(), vec![Value::from("dealbata")]);
        assert!(word(2).compute(&rec, &ctx).unwrap().is_empty());
    }

    #[test]
    fn first_of_falls_through_empty_alternatives() {
        let net = network();
        let options = MatchOptions::default();
        let ctx = DeriveContext::new(&net, &options);
        let d: Derivation = toml::from_str(
            r#"
            type = "first-of"
            alternatives = [
                { type = "copy", source = "author" },
                { type = "word", source = "name", index = 0 },
            ]
            "#,
        )
        .unwrap();
        assert_eq!(d.inputs(), vec!["author".to_string(), "name".to_string()]);
        let rec = taxon("Acacia dealbata", "species");
        assert_eq!(d.compute(&rec, &ctx).unwrap(), vec![Value::from("Acacia")]);

        let mut authored = taxon("Acacia dealbata", "species");
        authored.add("author", Value::from("Link"));
        assert_eq!(d.compute(&authored, &ctx).unwrap(), vec![Value::from("Link")]);
    }

    #[test]
    fn derivations_parse_with_gates() {
        let d: Derivation = toml::from_str(
            r#"
            type = "phonetic"
            source = "name"
            option = "fuzzy-derivations"
            "#,
        )
        .unwrap();
        assert!(d.is_optional());
        assert_eq!(d.inputs(), vec!["name".to_string()]);
    }
}
