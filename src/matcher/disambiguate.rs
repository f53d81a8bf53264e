//! Ranking and the choice of a single answer among usable matches.

use std::collections::BTreeSet;

use crate::config::MatcherConfig;
use crate::error::StoreResult;
use crate::index::Searcher;
use crate::infer::Inference;
use crate::network::Network;
use crate::record::linnaean::terms;
use crate::record::{Classification, Classifier, Record};

use super::issue::{Issue, Issues};
use super::result::Match;

/// Longest parent chain walked looking for a common ancestor.
const MAX_LUB_DEPTH: usize = 64;

fn status<C: Classification>(m: &Match<C>) -> crate::record::TaxonomicStatus {
    m.matched().map(Classification::taxonomic_status).unwrap_or_default()
}

fn name<C: Classification>(m: &Match<C>) -> Option<String> {
    m.matched().and_then(Classification::scientific_name)
}

fn accepted_name<C: Classification>(m: &Match<C>) -> Option<String> {
    m.accepted().and_then(Classification::scientific_name)
}

fn same_text(a: &Option<String>, b: &Option<String>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    }
}

fn is_same_record<C: Classification>(a: &Match<C>, b: &Match<C>) -> bool {
    let id = |m: &Match<C>| m.matched().and_then(Classification::identifier);
    id(a).is_some() && id(a) == id(b)
}

/// Order by posterior, best first. Posteriors within `tie_delta` of a
/// bucket's leader are ordered by status preference instead.
pub fn rank<C: Classification>(matches: &mut [Match<C>], tie_delta: f64) {
    matches.sort_by(|a, b| b.probability().total_cmp(&a.probability()));
    let mut start = 0;
    while start < matches.len() {
        let leader = matches[start].probability();
        let end = matches[start..]
            .iter()
            .position(|m| leader - m.probability() > tie_delta)
            .map_or(matches.len(), |offset| start + offset);
        matches[start..end].sort_by_key(|m| status(m).preference());
        start = end;
    }
}

/// The union of the matches' inferences.
fn combined<C: Classification>(matches: &[Match<C>]) -> Inference {
    let Some((best, rest)) = matches.split_first() else {
        return Inference::none();
    };
    rest.iter()
        .fold(*best.inference(), |acc, m| acc.or(m.inference()))
}

/// Combine matches that stand for the same taxon into the first one.
fn fold<C: Classification>(matches: Vec<Match<C>>, issue: Issue) -> Match<C> {
    let inference = combined(&matches);
    match matches.into_iter().next() {
        Some(best) => best.with_inference(inference).with_issue(issue),
        None => Match::none(),
    }
}

fn first<C: Classification>(matches: Vec<Match<C>>) -> Match<C> {
    matches.into_iter().next().unwrap_or_else(Match::none)
}

/// Whether `best` is accepted and every other match is it, or a synonym
/// with its name.
fn accepted_with_synonyms<C: Classification>(best: &Match<C>, others: &[Match<C>]) -> bool {
    status(best).is_accepted()
        && others.iter().all(|m| {
            is_same_record(best, m) || (status(m).is_synonym() && same_text(&name(best), &name(m)))
        })
}

/// Pick one answer from ranked, usable matches.
pub fn find_single<C, S>(
    usable: Vec<Match<C>>,
    config: &MatcherConfig,
    network: &Network,
    searcher: &S,
) -> StoreResult<Match<C>>
where
    C: Classification,
    S: Searcher<C> + ?Sized,
{
    if usable.len() <= 1 {
        return Ok(first(usable));
    }

    // Same accepted name under more than one code: refuse to guess.
    let shared_name = usable
        .iter()
        .all(|m| same_text(&accepted_name(&usable[0]), &accepted_name(m)));
    let codes: BTreeSet<String> = usable
        .iter()
        .filter_map(|m| {
            m.accepted()
                .and_then(Classification::nomenclatural_code)
                .or_else(|| m.matched().and_then(Classification::nomenclatural_code))
        })
        .map(|c| c.to_uppercase())
        .collect();
    if shared_name && codes.len() > 1 {
        return Ok(Match::invalid(Issues::of(Issue::UnresolvedHomonym)));
    }

    let best = &usable[0];
    if accepted_with_synonyms(best, &usable[1..]) {
        return Ok(fold(usable, Issue::AcceptedAndSynonym));
    }
    if status(best).is_misapplied()
        && usable[1..]
            .iter()
            .all(|m| status(m).is_misapplied() && same_text(&name(best), &name(m)))
    {
        return Ok(fold(usable, Issue::MisappliedName));
    }

    let acceptable: Vec<&Match<C>> = usable
        .iter()
        .filter(|m| {
            m.probability() >= config.acceptable_threshold
                && m.inference().evidence >= config.acceptable_evidence
        })
        .collect();
    if let Some(result) = choose_acceptable(&acceptable, network) {
        return Ok(result);
    }

    if usable.iter().all(|m| status(m).is_synonym()) {
        return least_upper_bound(usable, config, network, searcher);
    }

    Ok(Match::invalid(Issues::of(Issue::MultipleMatches)))
}

fn choose_acceptable<C: Classification>(acceptable: &[&Match<C>], network: &Network) -> Option<Match<C>> {
    let (best, others) = acceptable.split_first()?;
    let best = *best;
    if others.is_empty() {
        return Some(best.clone());
    }
    if status(best).is_placed() && others.iter().all(|m| !status(m).is_placed()) {
        return Some(best.clone());
    }
    if others.iter().all(|m| best.same_accepted(m)) {
        return Some(best.clone());
    }
    let owned: Vec<Match<C>> = others.iter().map(|m| (*m).clone()).collect();
    if accepted_with_synonyms(best, &owned) {
        let mut all = vec![best.clone()];
        all.extend(owned);
        return Some(fold(all, Issue::AcceptedAndSynonym));
    }

    let rank = |m: &Match<C>| m.accepted().and_then(Classification::taxon_rank);
    let same_rank = others.iter().all(|m| same_text(&rank(best), &rank(m)));
    if !same_rank {
        return None;
    }
    if others.iter().all(|m| same_text(&accepted_name(best), &accepted_name(m))) {
        return Some(best.clone().with_issue(Issue::MultipleMatches));
    }
    let phonetic = network.phonetic();
    let sound = |m: &Match<C>| accepted_name(m).and_then(|n| phonetic.encode(&n).ok());
    let best_sound = sound(best)?;
    if others.iter().all(|m| sound(m).as_ref() == Some(&best_sound)) {
        return Some(
            best.clone()
                .with_issue(Issue::MultipleMatches)
                .with_issue(Issue::PossibleMisspelling),
        );
    }
    None
}

/// Ancestors of a record, nearest first.
fn lineage<C, S>(searcher: &S, start: &Classifier) -> StoreResult<Vec<Classifier>>
where
    C: Classification,
    S: Searcher<C> + ?Sized,
{
    let mut chain: Vec<Classifier> = Vec::new();
    let mut seen = BTreeSet::new();
    let mut current = start.text_of(terms::PARENT_NAME_USAGE_ID);
    while let Some(id) = current {
        if chain.len() == MAX_LUB_DEPTH || !seen.insert(id.clone()) {
            break;
        }
        let Some(parent) = searcher.get(start.type_tag(), &id)? else {
            break;
        };
        current = parent.text_of(terms::PARENT_NAME_USAGE_ID);
        chain.push(parent);
    }
    Ok(chain)
}

fn covers(ancestor: &Classifier, member: &Classifier, member_lineage: &[Classifier]) -> bool {
    let id = ancestor.identifier();
    if id.is_some() && id == member.identifier() {
        return true;
    }
    if ancestor.contains(member) {
        return true;
    }
    member_lineage
        .iter()
        .any(|a| a.identifier().is_some() && a.identifier() == id)
}

/// The closest taxon containing every accepted taxon, if it is coarse enough.
fn least_upper_bound<C, S>(
    usable: Vec<Match<C>>,
    config: &MatcherConfig,
    network: &Network,
    searcher: &S,
) -> StoreResult<Match<C>>
where
    C: Classification,
    S: Searcher<C> + ?Sized,
{
    let mut accepted: Vec<&Classifier> = Vec::new();
    for m in &usable {
        if let Some(c) = m.accepted_candidate() {
            if !accepted.iter().any(|a| a.identifier() == c.identifier()) {
                accepted.push(c);
            }
        }
    }
    // A single accepted taxon is its own bound.
    let Some((head, rest)) = accepted.split_first() else {
        return Ok(Match::none());
    };

    let lineages: Vec<Vec<Classifier>> = rest
        .iter()
        .map(|c| lineage::<C, S>(searcher, c))
        .collect::<StoreResult<_>>()?;
    let mut chain = vec![(*head).clone()];
    chain.extend(lineage::<C, S>(searcher, head)?);
    let lub = chain.into_iter().find(|a| {
        rest.iter()
            .zip(&lineages)
            .all(|(member, line)| covers(a, member, line))
    });
    let Some(lub) = lub else {
        return Ok(Match::none());
    };

    let limit = network.term_order(terms::TAXON_RANK, &config.synthetic_limit_rank);
    let order = lub
        .text_of(terms::TAXON_RANK)
        .and_then(|r| network.term_order(terms::TAXON_RANK, &r));
    match (order, limit) {
        (Some(order), Some(limit)) if order < limit => {}
        _ => {
            tracing::debug!(lub = ?lub.identifier(), "common ancestor too fine for a synthetic match");
            return Ok(Match::none());
        }
    }

    let Ok(classification) = C::from_classifier(&lub) else {
        return Ok(Match::none());
    };
    let inference = combined(&usable);
    Ok(Match::new(
        classification.clone(),
        lub.clone(),
        classification,
        lub,
        inference,
    )
    .with_issue(Issue::SyntheticMatch))
}
