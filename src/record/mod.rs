//! Records: stored classifiers and typed classifications.
//!
//! - [`Classifier`]: the multi-valued key/value record kept in the search index
//! - [`Classification`]: the typed query-side view that derivations run over
//! - [`LinnaeanClassification`]: the bundled taxonomic classification
//!
//! Conditions, derivations and modifiers only need the [`Record`] and
//! [`RecordMut`] traits, so they run unchanged over either representation.

pub mod classification;
pub mod classifier;
pub mod linnaean;
pub mod status;

pub use classification::Classification;
pub use classifier::Classifier;
pub use linnaean::LinnaeanClassification;
pub use status::TaxonomicStatus;

use crate::error::EvalResult;
use crate::value::Value;

/// Read access to observable values.
pub trait Record {
    /// All values stored for an observable, primary value first.
    fn values_of(&self, observable: &str) -> Vec<Value>;

    /// The primary value of an observable.
    fn value_of(&self, observable: &str) -> Option<Value> {
        self.values_of(observable).into_iter().next()
    }

    /// The primary value as text.
    fn text_of(&self, observable: &str) -> Option<String> {
        match self.value_of(observable)? {
            Value::Text(s) => Some(s),
            other => Some(other.to_string()),
        }
    }

    fn has(&self, observable: &str) -> bool {
        !self.values_of(observable).is_empty()
    }
}

/// Write access to observable values.
pub trait RecordMut: Record {
    /// Replace every value of an observable. An empty list clears it.
    fn set_values(&mut self, observable: &str, values: Vec<Value>) -> EvalResult<()>;

    fn clear(&mut self, observable: &str) -> EvalResult<()> {
        self.set_values(observable, Vec::new())
    }
}
