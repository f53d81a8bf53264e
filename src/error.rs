//! Rich diagnostic error types for the taxomatch matcher.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text. The split mirrors how failures are
//! handled: network errors are configuration problems found at load time,
//! store errors abort a single `find_match` call, and evaluation errors only
//! ever disqualify one candidate.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for taxomatch.
#[derive(Debug, Error, Diagnostic)]
pub enum MatchError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Network errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum NetworkError {
    #[error("failed to parse network definition: {message}")]
    #[diagnostic(
        code(taxomatch::network::parse),
        help("Check the definition syntax. Observables, edges and vocabularies are all top-level tables.")
    )]
    Parse { message: String },

    #[error("failed to read network definition: {path}")]
    #[diagnostic(code(taxomatch::network::io), help("Ensure the file exists and is readable."))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("observable declared twice: {id}")]
    #[diagnostic(
        code(taxomatch::network::duplicate_observable),
        help("Each observable id must be unique within a network definition.")
    )]
    DuplicateObservable { id: String },

    #[error("observable \"{id}\" is referenced by {context} but never declared")]
    #[diagnostic(
        code(taxomatch::network::undeclared_observable),
        help("Declare the observable in the `observables` list, or fix the reference.")
    )]
    UndeclaredObservable { id: String, context: String },

    #[error("required observable \"{id}\" is missing from the network")]
    #[diagnostic(
        code(taxomatch::network::missing_required),
        help("The classification type reads this observable; add it to the network definition.")
    )]
    MissingRequired { id: String },

    #[error("dependency graph contains a cycle through \"{id}\"")]
    #[diagnostic(
        code(taxomatch::network::cyclic),
        help("Dependency edges must form a directed acyclic graph. Remove one of the edges on the cycle.")
    )]
    Cyclic { id: String },

    #[error("dependency graph must have exactly one root vertex, found {count}")]
    #[diagnostic(
        code(taxomatch::network::root_count),
        help("The root is the identifier observable that stands for the match hypothesis. Every other vertex must descend from it.")
    )]
    RootCount { count: usize },

    #[error("vertex \"{id}\" has {count} parents; at most {max} are supported")]
    #[diagnostic(
        code(taxomatch::network::too_many_parents),
        help("Conditional tables grow as 2^parents. Split the dependency through an intermediate observable.")
    )]
    TooManyParents { id: String, count: usize, max: usize },

    #[error("network has {count} {what}; at most {max} are supported")]
    #[diagnostic(
        code(taxomatch::network::too_large),
        help("Inference enumerates hidden vertices and erasure signatures. Drop observables that carry no evidence from the dependency graph.")
    )]
    TooLarge {
        what: &'static str,
        count: usize,
        max: usize,
    },

    #[error("unknown vocabulary \"{name}\"")]
    #[diagnostic(
        code(taxomatch::network::unknown_vocabulary),
        help("Declare the vocabulary under `[vocabularies]` before referencing it.")
    )]
    UnknownVocabulary { name: String },

    #[error("no inference procedure compiled for erasure signature {signature}")]
    #[diagnostic(
        code(taxomatch::network::unbound_signature),
        help(
            "The evidence leaves out a group that contains a required observable. \
             Either supply that observable or relax its multiplicity in the network definition."
        )
    )]
    UnboundSignature { signature: String },
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("search index unavailable: {message}")]
    #[diagnostic(
        code(taxomatch::store::unavailable),
        help("The search collaborator could not be reached. Retry once the index is back.")
    )]
    Unavailable { message: String },

    #[error("classifier {id} carries no probability parameters")]
    #[diagnostic(
        code(taxomatch::store::missing_parameters),
        help("Rebuild the index with the parameter analyser enabled.")
    )]
    MissingParameters { id: String },

    #[error("corrupt probability parameters on classifier {id}: {message}")]
    #[diagnostic(
        code(taxomatch::store::corrupt_parameters),
        help("The packed parameter blob does not match the compiled network. Rebuild the index.")
    )]
    CorruptParameters { id: String, message: String },

    #[error("failed to read corpus: {message}")]
    #[diagnostic(
        code(taxomatch::store::corpus),
        help("Corpus files are JSON arrays of classifiers.")
    )]
    Corpus { message: String },
}

// ---------------------------------------------------------------------------
// Evaluation errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum EvalError {
    #[error("cannot compute a phonetic code for \"{text}\"")]
    #[diagnostic(
        code(taxomatch::eval::phonetic),
        help("Phonetic codes need at least one Latin letter.")
    )]
    Phonetic { text: String },

    #[error("value for \"{observable}\" has type {actual}, expected {expected}")]
    #[diagnostic(
        code(taxomatch::eval::type_mismatch),
        help("Stored values must match the declared observable type.")
    )]
    TypeMismatch {
        observable: String,
        expected: String,
        actual: String,
    },

    #[error("value \"{value}\" is not in vocabulary \"{vocabulary}\"")]
    #[diagnostic(
        code(taxomatch::eval::vocabulary),
        help("Add the term to the vocabulary or correct the stored value.")
    )]
    NotInVocabulary { vocabulary: String, value: String },

    #[error("candidate {id} lacks evidence for group {group}")]
    #[diagnostic(
        code(taxomatch::eval::missing_group),
        help("The stored record is missing a required observable.")
    )]
    MissingGroup { id: String, group: String },

    #[error("accepted name chain for {id} is broken: {message}")]
    #[diagnostic(
        code(taxomatch::eval::accepted_chain),
        help("The accepted identifier points at a record that is missing or loops back.")
    )]
    AcceptedChain { id: String, message: String },
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to parse matcher configuration: {message}")]
    #[diagnostic(
        code(taxomatch::config::parse),
        help("The configuration is a TOML table of thresholds and options.")
    )]
    Parse { message: String },

    #[error("invalid matcher configuration: {message}")]
    #[diagnostic(code(taxomatch::config::invalid), help("Check the configured values. {message}"))]
    Invalid { message: String },
}

/// Convenience alias for functions returning taxomatch results.
pub type MatchResult<T> = std::result::Result<T, MatchError>;

/// Result type for network loading and compilation.
pub type NetworkResult<T> = std::result::Result<T, NetworkError>;

/// Result type for per-candidate evaluation.
pub type EvalResult<T> = std::result::Result<T, EvalError>;

/// Result type for index and corpus access.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_error_converts_to_match_error() {
        let err = NetworkError::Cyclic { id: "genus".into() };
        let top: MatchError = err.into();
        assert!(matches!(top, MatchError::Network(NetworkError::Cyclic { .. })));
    }

    #[test]
    fn store_error_converts_to_match_error() {
        let err = StoreError::Unavailable {
            message: "connection refused".into(),
        };
        let top: MatchError = err.into();
        assert!(matches!(top, MatchError::Store(StoreError::Unavailable { .. })));
    }

    #[test]
    fn error_display_messages_are_descriptive() {
        let err = NetworkError::TooManyParents {
            id: "genus".into(),
            count: 9,
            max: 8,
        };
        let msg = format!("{err}");
        assert!(msg.contains("genus"));
        assert!(msg.contains('9'));
    }
}
