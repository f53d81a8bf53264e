//! End-to-end tests for taxomatch.
//!
//! These build a small index through the public API and run match requests
//! against it, covering the scoring, disambiguation and query retry paths.

use std::sync::Arc;

use taxomatch::analysis::{Fact, MAX_PROBABILITY, MIN_PROBABILITY, ParameterAnalyser};
use taxomatch::config::{MatchOptions, MatcherConfig};
use taxomatch::error::{MatchError, NetworkError, StoreError};
use taxomatch::expr::condition::Condition;
use taxomatch::index::{IndexBuilder, MemoryIndex};
use taxomatch::infer::CompiledNetwork;
use taxomatch::matcher::{ClassificationMatcher, Issue};
use taxomatch::network::Network;
use taxomatch::record::{
    Classification, Classifier, LinnaeanClassification, Record, TaxonomicStatus,
};
use taxomatch::value::Value;

type Matcher = ClassificationMatcher<LinnaeanClassification, MemoryIndex>;

fn compiled() -> Arc<CompiledNetwork> {
    Arc::new(CompiledNetwork::compile(Arc::new(Network::linnaean().unwrap())).unwrap())
}

fn index(compiled: &Arc<CompiledNetwork>, records: &[LinnaeanClassification]) -> MemoryIndex {
    let mut builder = IndexBuilder::new(Arc::clone(compiled));
    for record in records {
        builder.add_classification(record);
    }
    builder.build().unwrap()
}

fn matcher(records: &[LinnaeanClassification]) -> Matcher {
    let compiled = compiled();
    let index = index(&compiled, records);
    ClassificationMatcher::new(compiled, index, MatcherConfig::default()).unwrap()
}

fn accepted(id: &str, name: &str, rank: &str) -> LinnaeanClassification {
    LinnaeanClassification::named(name)
        .with_id(id)
        .with_rank(rank)
        .with_status(TaxonomicStatus::Accepted)
}

/// Plantae > Fabaceae > Acacia > two species, plus Banksia in Proteaceae.
fn plants() -> Vec<LinnaeanClassification> {
    vec![
        accepted("k1", "Plantae", "kingdom"),
        accepted("f1", "Fabaceae", "family").with_parent("k1"),
        accepted("g1", "Acacia", "genus").with_parent("f1"),
        accepted("s1", "Acacia dealbata", "species")
            .with_parent("g1")
            .with_authorship("Link"),
        accepted("s2", "Acacia mearnsii", "species").with_parent("g1"),
        accepted("f2", "Proteaceae", "family").with_parent("k1"),
        accepted("g2", "Banksia", "genus").with_parent("f2"),
        accepted("s3", "Banksia serrata", "species").with_parent("g2"),
    ]
}

fn name_of(result: &taxomatch::Match<LinnaeanClassification>) -> Option<String> {
    result.matched().and_then(Classification::scientific_name)
}

#[test]
fn horizon_of_scientific_name() {
    let network = Network::linnaean().unwrap();
    let horizon = network.horizon("scientificName").unwrap();
    assert!(horizon.horizon.contains("genus"));
    assert!(horizon.interior.contains("scientificNameAuthorship"));
    assert!(horizon.interior.contains("soundexScientificName"));
    assert!(!horizon.interior.contains("genus"));
}

#[test]
fn empty_composite_condition_is_undetermined() {
    let network = Network::linnaean().unwrap();
    let record = LinnaeanClassification::named("Acacia");
    assert_eq!(Condition::All { clauses: vec![] }.evaluate(&record, &network), None);
    assert_eq!(Condition::Any { clauses: vec![] }.evaluate(&record, &network), None);
}

#[test]
fn analyser_probabilities_are_clamped() {
    let compiled = compiled();
    let index = index(&compiled, &plants());
    let analyser = ParameterAnalyser::new(&index).unwrap();

    let absent = Fact::is("scientificName", vec![Value::from("Nothing here")]);
    let prior = analyser.compute_prior(&absent).unwrap();
    assert!(prior >= MIN_PROBABILITY && prior <= MAX_PROBABILITY);

    let rank = Fact::is("taxonRank", vec![Value::from("species")]);
    let conditional = analyser.compute_conditional(&absent, &[rank]).unwrap();
    assert!(conditional >= MIN_PROBABILITY && conditional <= MAX_PROBABILITY);
}

#[test]
fn identify_is_idempotent() {
    let mut classifier = Classifier::new("Taxon");
    let first = classifier.identify().to_string();
    let second = classifier.identify().to_string();
    assert_eq!(first, second);
    assert!(first.starts_with("urn:uuid:"));
}

#[test]
fn translate_then_populate_preserves_fields() {
    let original = accepted("s1", "Acacia dealbata", "species")
        .with_authorship("Link")
        .with_code("ICN")
        .with_parent("g1")
        .with_priority(3);
    let classifier = original.to_classifier();
    let mut copy = LinnaeanClassification::new();
    copy.populate(&classifier, true).unwrap();
    assert_eq!(copy, original);
}

#[test]
fn network_definition_loads_from_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("linnaean.toml");
    std::fs::write(&path, include_str!("../data/networks/linnaean.toml")).unwrap();

    let network = Network::load(&path).unwrap();
    assert_eq!(network.id(), "linnaean");
    assert!(network.observable("scientificName").is_some());
    assert_eq!(network.match_modifiers().len(), 3);
}

#[test]
fn cyclic_definition_is_rejected() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("cyclic.toml");
    std::fs::write(
        &path,
        r#"
[network]
id = "cyclic"
type = "T"

[[observables]]
id = "a"

[[observables]]
id = "b"

[[edges]]
from = "a"
to = "b"

[[edges]]
from = "b"
to = "a"
"#,
    )
    .unwrap();
    assert!(matches!(Network::load(&path), Err(NetworkError::Cyclic { .. })));
}

#[test]
fn exact_unique_name_matches() {
    let m = matcher(&plants());
    let result = m
        .find_match(&LinnaeanClassification::named("Acacia mearnsii"), &MatchOptions::default())
        .unwrap();
    assert!(result.is_valid());
    assert_eq!(name_of(&result).as_deref(), Some("Acacia mearnsii"));
    assert!(result.probability() > 0.9);
    assert!(result.issues().is_empty());
}

#[test]
fn accepted_and_synonym_fold_together() {
    let mut records = plants();
    records.push(
        LinnaeanClassification::named("Acacia dealbata")
            .with_id("x1")
            .with_rank("species")
            .with_status(TaxonomicStatus::Synonym)
            .with_accepted("s1"),
    );
    let m = matcher(&records);
    let result = m
        .find_match(&LinnaeanClassification::named("Acacia dealbata"), &MatchOptions::default())
        .unwrap();
    assert!(result.is_valid());
    assert!(result.issues().contains(Issue::AcceptedAndSynonym));
    let accepted = result.accepted().and_then(Classification::identifier);
    assert_eq!(accepted.as_deref(), Some("s1"));
}

#[test]
fn homonyms_need_a_code() {
    let records = vec![
        accepted("p1", "Morus", "genus").with_code("ICN"),
        accepted("a1", "Morus", "genus").with_code("ICZN"),
    ];
    let m = matcher(&records);

    let bare = m
        .find_match(&LinnaeanClassification::named("Morus"), &MatchOptions::default())
        .unwrap();
    assert!(!bare.is_valid());
    assert!(bare.issues().contains(Issue::UnresolvedHomonym));

    let coded = m
        .find_match(
            &LinnaeanClassification::named("Morus").with_code("ICN"),
            &MatchOptions::default(),
        )
        .unwrap();
    assert!(coded.is_valid());
    let id = coded.matched().and_then(Classification::identifier);
    assert_eq!(id.as_deref(), Some("p1"));
}

#[test]
fn misspelling_is_recovered_only_when_fuzzy() {
    let m = matcher(&plants());
    let query = LinnaeanClassification::named("Acacia delbata");

    let fuzzy = m.find_match(&query, &MatchOptions::default()).unwrap();
    assert!(fuzzy.is_valid());
    assert_eq!(name_of(&fuzzy).as_deref(), Some("Acacia dealbata"));
    assert!(fuzzy.issues().contains(Issue::PossibleMisspelling));

    let exact = m.find_match(&query, &MatchOptions::exact()).unwrap();
    assert!(!exact.is_valid());
    assert!(exact.matched().is_none());
}

#[test]
fn unknown_species_winds_back_to_genus() {
    let m = matcher(&plants());
    let query = LinnaeanClassification::named("Acacia imaginaria")
        .with_rank("species")
        .with_genus("Acacia");
    let result = m.find_match(&query, &MatchOptions::default()).unwrap();
    assert!(result.is_valid());
    assert_eq!(name_of(&result).as_deref(), Some("Acacia"));
    assert!(result.issues().contains(Issue::HigherOrderMatch));
}

#[test]
fn bare_binomial_winds_back_to_its_genus() {
    let m = matcher(&plants());
    let query = LinnaeanClassification::named("Acacia imaginaria");
    let result = m.find_match(&query, &MatchOptions::default()).unwrap();
    assert!(result.is_valid());
    assert_eq!(name_of(&result).as_deref(), Some("Acacia"));
    assert!(result.issues().contains(Issue::HigherOrderMatch));
    let accepted = result.accepted().and_then(Classification::identifier);
    assert_eq!(accepted.as_deref(), Some("g1"));
}

#[test]
fn uninomial_does_not_wind_back() {
    let m = matcher(&plants());
    let result = m
        .find_match(&LinnaeanClassification::named("Quercus"), &MatchOptions::default())
        .unwrap();
    assert!(!result.is_valid());
    assert!(!result.issues().contains(Issue::HigherOrderMatch));
}

#[test]
fn concurrent_matches_agree_with_sequential() {
    use rayon::prelude::*;

    let m = matcher(&plants());
    let options = MatchOptions::default();
    let names = [
        "Acacia dealbata",
        "Acacia mearnsii",
        "Acacia delbata",
        "Acacia imaginaria",
        "Banksia serrata",
        "Fabaceae",
        "Quercus robur",
    ];
    let query = |i: usize| LinnaeanClassification::named(names[i % names.len()]);
    let sequential: Vec<_> = (0..64)
        .map(|i| m.find_match(&query(i), &options).unwrap())
        .collect();
    let parallel: Vec<_> = (0..64)
        .into_par_iter()
        .map(|i| m.find_match(&query(i), &options).unwrap())
        .collect();
    assert_eq!(parallel, sequential);
    assert!(sequential[0].is_valid());
}

#[test]
fn unknown_name_is_no_match() {
    let m = matcher(&plants());
    let result = m
        .find_match(&LinnaeanClassification::named("Quercus robur"), &MatchOptions::default())
        .unwrap();
    assert!(!result.is_valid());
    assert!(result.matched().is_none());
}

#[test]
fn statistics_count_retries() {
    let m = matcher(&plants());
    let options = MatchOptions::default().with_statistics(true);
    let result = m
        .find_match(&LinnaeanClassification::named("Acacia delbata"), &options)
        .unwrap();
    let stats = result.measurement().unwrap();
    assert!(stats.modifications >= 1);
    assert!(stats.scored >= 2);
}

#[test]
fn unavailable_index_fails_the_request() {
    let m = matcher(&plants());
    m.searcher().set_available(false);
    let err = m
        .find_match(&LinnaeanClassification::named("Acacia dealbata"), &MatchOptions::default())
        .unwrap_err();
    assert!(matches!(err, MatchError::Store(StoreError::Unavailable { .. })));
}

#[test]
fn index_round_trips_through_json() {
    let compiled = compiled();
    let built = index(&compiled, &plants());
    let text = built.to_json().unwrap();
    let reloaded = MemoryIndex::from_json(compiled.shared_network(), &text).unwrap();
    assert_eq!(reloaded.len(), built.len());

    let m = ClassificationMatcher::new(compiled, reloaded, MatcherConfig::default()).unwrap();
    let result = m
        .find_match(&LinnaeanClassification::named("Banksia serrata"), &MatchOptions::default())
        .unwrap();
    assert!(result.is_valid());
    let candidate = result.candidate().unwrap();
    assert!(candidate.has("soundexScientificName"));
}
