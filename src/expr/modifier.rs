//! Modifiers: transforms that produce an alternative version of a record.
//!
//! A modifier never touches its input. It returns `Ok(None)` when it does not
//! apply to the record, and `Ok(Some(copy))` with the modified copy otherwise.
//! Nulling an observable with `cascade` set also nulls every observable whose
//! derivation transitively reads it, so stale derived values never survive.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::config::MatchFlag;
use crate::error::EvalResult;
use crate::matcher::issue::Issue;
use crate::record::RecordMut;
use crate::value::Value;

use super::condition::Condition;
use super::derivation::DeriveContext;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Modifier {
    /// Wind the record back to a higher level: replace each observable with
    /// the value of its `base` derivation and null the `clear` list.
    Base {
        observables: Vec<String>,
        #[serde(default)]
        clear: Vec<String>,
        #[serde(default)]
        cascade: bool,
    },
    /// Join the primary values of `sources` into `target`.
    Join {
        sources: Vec<String>,
        target: String,
        #[serde(default = "default_separator")]
        separator: String,
    },
    Remove {
        observables: Vec<String>,
        #[serde(default)]
        cascade: bool,
    },
    /// Set an observable to a literal value.
    Set { observable: String, value: Value },
    /// Append a suffix to a text value, optionally nulling the values
    /// derived from it so they are derived afresh.
    Suffix {
        observable: String,
        suffix: String,
        #[serde(default)]
        propagate: bool,
    },
    /// All modifiers in order; if any does not apply, none do.
    Composite { modifiers: Vec<Modifier> },
}

fn default_separator() -> String {
    " ".into()
}

impl Modifier {
    /// Observables read to decide and compute the modification.
    pub fn reads(&self, ctx: &DeriveContext<'_>) -> BTreeSet<String> {
        match self {
            Self::Base { observables, .. } => observables
                .iter()
                .filter_map(|o| ctx.network.observable(o))
                .filter_map(|o| o.base.as_ref())
                .flat_map(|b| b.inputs())
                .collect(),
            Self::Join { sources, .. } => sources.iter().cloned().collect(),
            Self::Remove { .. } | Self::Set { .. } => BTreeSet::new(),
            Self::Suffix { observable, .. } => BTreeSet::from([observable.clone()]),
            Self::Composite { modifiers } => modifiers.iter().flat_map(|m| m.reads(ctx)).collect(),
        }
    }

    /// Observables directly written or nulled.
    pub fn writes(&self) -> BTreeSet<String> {
        match self {
            Self::Base {
                observables, clear, ..
            } => observables.iter().chain(clear).cloned().collect(),
            Self::Join { target, .. } => BTreeSet::from([target.clone()]),
            Self::Remove { observables, .. } => observables.iter().cloned().collect(),
            Self::Set { observable, .. } | Self::Suffix { observable, .. } => {
                BTreeSet::from([observable.clone()])
            }
            Self::Composite { modifiers } => modifiers.iter().flat_map(|m| m.writes()).collect(),
        }
    }

    /// Every observable named by the modifier, for validation.
    pub fn references(&self) -> BTreeSet<String> {
        let mut refs = self.writes();
        match self {
            Self::Join { sources, .. } => refs.extend(sources.iter().cloned()),
            Self::Composite { modifiers } => {
                for m in modifiers {
                    refs.extend(m.references());
                }
            }
            _ => {}
        }
        refs
    }

    /// Produce a modified copy of `record`, or `None` when not applicable.
    pub fn modify<R: RecordMut + Clone>(
        &self,
        record: &R,
        ctx: &DeriveContext<'_>,
    ) -> EvalResult<Option<R>> {
        let network = ctx.network;
        match self {
            Self::Base {
                observables,
                clear,
                cascade,
            } => {
                let mut out = record.clone();
                for id in observables {
                    let Some(base) = network.observable(id).and_then(|o| o.base.as_ref()) else {
                        return Ok(None);
                    };
                    let values = base.compute(record, ctx)?;
                    if values.is_empty() {
                        return Ok(None);
                    }
                    out.set_values(id, network.normalise_all(id, values)?)?;
                }
                for id in clear {
                    out.clear(id)?;
                }
                if *cascade {
                    let keep: BTreeSet<&String> = observables.iter().collect();
                    for id in observables.iter().chain(clear) {
                        cascade_clear(&mut out, id, &keep, ctx)?;
                    }
                }
                Ok(Some(out))
            }
            Self::Join {
                sources,
                target,
                separator,
            } => {
                let parts: Vec<String> = sources.iter().filter_map(|s| record.text_of(s)).collect();
                if parts.is_empty() {
                    return Ok(None);
                }
                let mut out = record.clone();
                let joined = network.normalise_all(target, vec![Value::Text(parts.join(separator))])?;
                out.set_values(target, joined)?;
                Ok(Some(out))
            }
            Self::Remove {
                observables,
                cascade,
            } => {
                if !observables.iter().any(|o| record.has(o)) {
                    return Ok(None);
                }
                let mut out = record.clone();
                for id in observables {
                    out.clear(id)?;
                }
                if *cascade {
                    for id in observables {
                        cascade_clear(&mut out, id, &BTreeSet::new(), ctx)?;
                    }
                }
                Ok(Some(out))
            }
            Self::Set { observable, value } => {
                let mut out = record.clone();
                out.set_values(observable, network.normalise_all(observable, vec![value.clone()])?)?;
                Ok(Some(out))
            }
            Self::Suffix {
                observable,
                suffix,
                propagate,
            } => {
                let Some(text) = record.text_of(observable) else {
                    return Ok(None);
                };
                let mut out = record.clone();
                let suffixed = network.normalise_all(observable, vec![Value::Text(format!("{text}{suffix}"))])?;
                out.set_values(observable, suffixed)?;
                if *propagate {
                    cascade_clear(&mut out, observable, &BTreeSet::new(), ctx)?;
                }
                Ok(Some(out))
            }
            Self::Composite { modifiers } => {
                let mut current = record.clone();
                for m in modifiers {
                    match m.modify(&current, ctx)? {
                        Some(next) => current = next,
                        None => return Ok(None),
                    }
                }
                Ok(Some(current))
            }
        }
    }
}

fn cascade_clear<R: RecordMut>(
    record: &mut R,
    id: &str,
    keep: &BTreeSet<&String>,
    ctx: &DeriveContext<'_>,
) -> EvalResult<()> {
    for dependent in ctx.network.derived_dependents(id) {
        if !keep.contains(&dependent) {
            record.clear(&dependent)?;
        }
    }
    Ok(())
}

/// A modifier declared in a network, with its gates and the issue it raises.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifierRule {
    pub id: String,
    #[serde(default)]
    pub condition: Option<Condition>,
    #[serde(default)]
    pub option: Option<MatchFlag>,
    /// Flag attached to a match found through this modification.
    #[serde(default)]
    pub issue: Option<Issue>,
    pub modifier: Modifier,
}

impl ModifierRule {
    /// Apply the rule if its option and condition allow it.
    pub fn apply<R: RecordMut + Clone>(
        &self,
        record: &R,
        ctx: &DeriveContext<'_>,
    ) -> EvalResult<Option<R>> {
        if !ctx.options.permits(self.option) {
            return Ok(None);
        }
        if let Some(condition) = &self.condition {
            if !condition.permits(record, ctx.network) {
                return Ok(None);
            }
        }
        self.modifier.modify(record, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchOptions;
    use crate::expr::derivation::Derivation;
    use crate::network::observable::{Observable, Style};
    use crate::network::{Network, NetworkBuilder};
    use crate::record::{Classifier, Record};
    use crate::value::ValueType;

    fn network() -> Network {
        let mut name = Observable::new("name", ValueType::Text).with_style(Style::Scientific);
        name.base = Some(Derivation::copy("genus"));
        NetworkBuilder::new("test", "Taxon")
            .observable(name)
            .observable(Observable::new("genus", ValueType::Text))
            .observable(Observable::new("author", ValueType::Text))
            .observable(Observable::new("rank", ValueType::Term))
            .observable(Observable::new("code", ValueType::Text).with_derivation(Derivation::phonetic("name")))
            .observable(
                Observable::new("loud", ValueType::Text).with_derivation(Derivation::copy("code")),
            )
            .build()
            .unwrap()
    }

    fn species() -> Classifier {
        let mut c = Classifier::new("Taxon");
        c.add("name", Value::from("Acacia dealbata"));
        c.add("genus", Value::from("Acacia"));
        c.add("author", Value::from("Link"));
        c.add("rank", Value::from("species"));
        c.add("code", Value::from("AC DLBT"));
        c.add("loud", Value::from("AC DLBT"));
        c
    }

    #[test]
    fn remove_with_cascade_nulls_transitive_dependents() {
        let net = network();
        let options = MatchOptions::default();
        let ctx = DeriveContext::new(&net, &options);
        let original = species();
        let modified = Modifier::Remove {
            observables: vec!["name".into()],
            cascade: true,
        }
        .modify(&original, &ctx)
        .unwrap()
        .unwrap();
        assert!(!modified.has("name"));
        assert!(!modified.has("code"));
        assert!(!modified.has("loud"));
        assert!(modified.has("author"));
        // The input is untouched.
        assert!(original.has("code"));
    }

    #[test]
    fn remove_without_cascade_keeps_derived_values() {
        let net = network();
        let options = MatchOptions::default();
        let ctx = DeriveContext::new(&net, &options);
        let modified = Modifier::Remove {
            observables: vec!["name".into()],
            cascade: false,
        }
        .modify(&species(), &ctx)
        .unwrap()
        .unwrap();
        assert!(modified.has("code"));
    }

    #[test]
    fn remove_of_absent_observable_does_not_apply() {
        let net = network();
        let options = MatchOptions::default();
        let ctx = DeriveContext::new(&net, &options);
        let mut c = species();
        c.clear("author").unwrap();
        let result = Modifier::Remove {
            observables: vec!["author".into()],
            cascade: false,
        }
        .modify(&c, &ctx)
        .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn base_winds_back_to_genus() {
        let net = network();
        let options = MatchOptions::default();
        let ctx = DeriveContext::new(&net, &options);
        let modifier = Modifier::Composite {
            modifiers: vec![
                Modifier::Base {
                    observables: vec!["name".into()],
                    clear: vec!["author".into()],
                    cascade: true,
                },
                Modifier::Set {
                    observable: "rank".into(),
                    value: Value::from("genus"),
                },
            ],
        };
        let modified = modifier.modify(&species(), &ctx).unwrap().unwrap();
        assert_eq!(modified.text_of("name").as_deref(), Some("Acacia"));
        assert_eq!(modified.text_of("rank").as_deref(), Some("genus"));
        assert!(!modified.has("author"));
        assert!(!modified.has("code"));
        assert!(modifier.writes().contains("rank"));
        assert!(modifier.reads(&ctx).contains("genus"));
    }

    #[test]
    fn composite_is_all_or_nothing() {
        let net = network();
        let options = MatchOptions::default();
        let ctx = DeriveContext::new(&net, &options);
        let mut c = species();
        c.clear("genus").unwrap();
        let modifier = Modifier::Composite {
            modifiers: vec![
                Modifier::Set {
                    observable: "rank".into(),
                    value: Value::from("genus"),
                },
                Modifier::Base {
                    observables: vec!["name".into()],
                    clear: vec![],
                    cascade: false,
                },
            ],
        };
        assert!(modifier.modify(&c, &ctx).unwrap().is_none());
    }

    #[test]
    fn join_and_suffix() {
        let net = network();
        let options = MatchOptions::default();
        let ctx = DeriveContext::new(&net, &options);
        let joined = Modifier::Join {
            sources: vec!["name".into(), "author".into()],
            target: "name".into(),
            separator: " ".into(),
        }
        .modify(&species(), &ctx)
        .unwrap()
        .unwrap();
        assert_eq!(joined.text_of("name").as_deref(), Some("Acacia dealbata Link"));

        let suffixed = Modifier::Suffix {
            observable: "genus".into(),
            suffix: " sp.".into(),
            propagate: false,
        }
        .modify(&species(), &ctx)
        .unwrap()
        .unwrap();
        assert_eq!(suffixed.text_of("genus").as_deref(), Some("Acacia sp."));
    }

    #[test]
    fn rule_gates_on_option() {
        let net = network();
        let exact = MatchOptions::exact();
        let ctx = DeriveContext::new(&net, &exact);
        let rule = ModifierRule {
            id: "misspelled".into(),
            condition: None,
            option: Some(MatchFlag::FuzzyDerivations),
            issue: Some(Issue::PossibleMisspelling),
            modifier: Modifier::Remove {
                observables: vec!["name".into()],
                cascade: false,
            },
        };
        assert!(rule.apply(&species(), &ctx).unwrap().is_none());
    }
}
