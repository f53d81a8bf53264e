//! The typed, query-side view of a record.

use crate::config::MatchOptions;
use crate::error::{EvalResult, NetworkResult};
use crate::network::Network;

use super::{Classifier, Record, RecordMut, TaxonomicStatus};

/// A strongly-fielded record used as a match query.
///
/// Implementors expose their fields by observable id through [`RecordMut`];
/// everything else here is built on that. A classification is created per
/// request, filled in by [`Classification::infer`], and read-only once
/// matching starts.
pub trait Classification: RecordMut + Clone + Default + Send + Sync + std::fmt::Debug {
    /// Record type tag shared with the classifiers of the same network.
    const TYPE: &'static str;

    /// Every observable this classification carries.
    const OBSERVABLES: &'static [&'static str];

    /// Observables the network must declare for the matcher to work.
    const REQUIRED: &'static [&'static str];

    /// Check that `network` can serve this classification type.
    fn check_network(network: &Network) -> NetworkResult<()> {
        network.require(Self::REQUIRED)
    }

    /// Write every set value into a classifier.
    fn translate(&self, classifier: &mut Classifier) {
        for &observable in Self::OBSERVABLES {
            for value in self.values_of(observable) {
                classifier.add(observable, value);
            }
        }
    }

    /// Read values from a classifier. Existing values are kept unless
    /// `overwrite` is set.
    fn populate(&mut self, classifier: &Classifier, overwrite: bool) -> EvalResult<()> {
        for &observable in Self::OBSERVABLES {
            if !overwrite && self.has(observable) {
                continue;
            }
            let values = classifier.values_of(observable);
            if !values.is_empty() {
                self.set_values(observable, values)?;
            }
        }
        Ok(())
    }

    /// Build a classification from a stored classifier.
    fn from_classifier(classifier: &Classifier) -> EvalResult<Self> {
        let mut classification = Self::default();
        classification.populate(classifier, true)?;
        Ok(classification)
    }

    /// Build a classifier carrying this classification's values.
    fn to_classifier(&self) -> Classifier {
        let mut classifier = Classifier::new(Self::TYPE);
        if let Some(id) = self.identifier() {
            classifier = classifier.with_identifier(id);
        }
        self.translate(&mut classifier);
        classifier
    }

    /// Normalise values and run the network's derivations.
    fn infer(&mut self, network: &Network, options: &MatchOptions) -> EvalResult<()> {
        network.infer(self, options, &[], false)
    }

    fn identifier(&self) -> Option<String>;
    fn scientific_name(&self) -> Option<String>;
    fn taxon_rank(&self) -> Option<String>;
    fn taxonomic_status(&self) -> TaxonomicStatus;
    fn accepted_id(&self) -> Option<String>;
    fn parent_id(&self) -> Option<String>;
    /// Naming authority code, if one is explicitly given.
    fn nomenclatural_code(&self) -> Option<String>;
    fn phonetic_name(&self) -> Option<String>;
}
