//! The search-index boundary and a reference in-memory index.
//!
//! The matcher only talks to an index through [`Searcher`]; the parameter
//! analyser only through [`WeightedCorpus`](crate::analysis::WeightedCorpus).
//! [`MemoryIndex`] implements both, and [`IndexBuilder`] turns raw records
//! into an index ready for matching.

pub mod builder;
pub mod memory;

pub use builder::IndexBuilder;
pub use memory::MemoryIndex;

use crate::error::StoreResult;
use crate::record::{Classification, Classifier};

/// Candidate lookup for match queries.
///
/// Implementations must be safe for concurrent reads. Failures to reach the
/// backing store are reported as [`StoreError::Unavailable`](crate::error::StoreError::Unavailable),
/// never by blocking forever.
pub trait Searcher<C: Classification>: Send + Sync {
    /// A bounded candidate list for a query, in index order.
    fn search(&self, query: &C) -> StoreResult<Vec<Classifier>>;

    /// Look a record up by type tag and identifier.
    fn get(&self, type_tag: &str, id: &str) -> StoreResult<Option<Classifier>>;

    /// Release the index. Later calls may fail.
    fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}
