// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # taxomatch
//!
//! Probabilistic matching of partial taxonomic names against a corpus of
//! classifications.
//!
//! ## Architecture
//!
//! - **Networks** (`network`): observables, their dependency DAG (petgraph),
//!   vocabularies and modifiers, loaded from declarative TOML definitions
//! - **Expressions** (`expr`): conditions, derivations and modifiers over records
//! - **Inference** (`infer`): compiled evaluation procedures per erasure signature
//! - **Analysis** (`analysis`): conditional probability estimation from a weighted corpus
//! - **Index** (`index`): the search interface plus an in-memory reference index
//! - **Matcher** (`matcher`): scoring, annotation and disambiguation of candidates
//!
//! ## Library usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use taxomatch::config::{MatchOptions, MatcherConfig};
//! use taxomatch::index::IndexBuilder;
//! use taxomatch::infer::CompiledNetwork;
//! use taxomatch::matcher::ClassificationMatcher;
//! use taxomatch::network::Network;
//! use taxomatch::record::LinnaeanClassification;
//!
//! let compiled = Arc::new(CompiledNetwork::compile(Arc::new(Network::linnaean().unwrap())).unwrap());
//! let mut builder = IndexBuilder::new(Arc::clone(&compiled));
//! builder.add_classification(&LinnaeanClassification::named("Acacia dealbata").with_id("t1"));
//! let index = builder.build().unwrap();
//!
//! let matcher = ClassificationMatcher::new(compiled, index, MatcherConfig::default()).unwrap();
//! let query = LinnaeanClassification::named("Acacia dealbata");
//! let result = matcher.find_match(&query, &MatchOptions::default()).unwrap();
//! println!("{result}");
//! ```

pub mod analysis;
pub mod config;
pub mod error;
pub mod expr;
pub mod index;
pub mod infer;
pub mod matcher;
pub mod network;
pub mod record;
pub mod value;

pub use config::{MatchOptions, MatcherConfig};
pub use error::{MatchError, MatchResult};
pub use matcher::{ClassificationMatcher, Issue, Issues, Match};
pub use network::Network;
pub use record::{Classification, Classifier, LinnaeanClassification};
