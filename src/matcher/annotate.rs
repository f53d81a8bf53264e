//! Issue detectors run over every possible match before disambiguation.
//!
//! Detectors run in a fixed order and only ever add flags.

use crate::record::Classification;

use super::issue::Issue;
use super::result::Match;

fn same_name<C: Classification>(a: &Match<C>, b: &Match<C>) -> bool {
    let name = |m: &Match<C>| m.matched().and_then(Classification::scientific_name);
    match (name(a), name(b)) {
        (Some(x), Some(y)) => x.eq_ignore_ascii_case(&y),
        _ => false,
    }
}

fn status<C: Classification>(m: &Match<C>) -> crate::record::TaxonomicStatus {
    m.matched().map(Classification::taxonomic_status).unwrap_or_default()
}

/// Flag every match in place.
pub fn annotate<C: Classification>(matches: &mut [Match<C>]) {
    let mut flags: Vec<Vec<Issue>> = vec![Vec::new(); matches.len()];
    for (i, m) in matches.iter().enumerate() {
        let own = status(m);
        if own.is_misapplied() {
            flags[i].push(Issue::MisappliedName);
        }
        if own.is_excluded() {
            flags[i].push(Issue::ExcludedName);
        }

        let others = matches
            .iter()
            .enumerate()
            .filter(|(j, o)| *j != i && same_name(m, o))
            .map(|(_, o)| o);
        for other in others {
            let theirs = status(other);
            if !own.is_misapplied() && theirs.is_misapplied() {
                flags[i].push(Issue::PartiallyMisapplied);
            }
            if !own.is_excluded() && theirs.is_excluded() {
                flags[i].push(Issue::PartiallyExcluded);
            }
            let own_id = m.matched().and_then(Classification::identifier);
            let their_parent = other.accepted().and_then(Classification::parent_id);
            if own_id.is_some() && own_id == their_parent {
                flags[i].push(Issue::ParentChildSynonym);
            }
        }
    }

    for (m, issues) in matches.iter_mut().zip(flags) {
        if issues.is_empty() {
            continue;
        }
        let taken = std::mem::replace(m, Match::none());
        *m = issues.into_iter().fold(taken, Match::with_issue);
    }
}
