//! Per-candidate probability parameters and their packed form.
//!
//! Layout: the root prior, then for every non-root vertex in topological
//! order a table of `2^k` entries, `k` being its parent count. Entry `i`
//! holds P(vertex agrees | parents), where bit `j` of `i` is the state of
//! the `j`-th parent in topological order.

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Parameters {
    values: Vec<f64>,
}

impl Parameters {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// The prior of the root hypothesis.
    pub fn prior(&self) -> f64 {
        self.values.first().copied().unwrap_or_default()
    }

    /// One entry of a conditional table.
    pub fn entry(&self, offset: usize, index: usize) -> f64 {
        self.values.get(offset + index).copied().unwrap_or_default()
    }

    /// Pack for storage on a classifier.
    pub fn pack(&self, id: &str) -> StoreResult<Vec<u8>> {
        bincode::serialize(&self.values).map_err(|e| StoreError::CorruptParameters {
            id: id.to_string(),
            message: e.to_string(),
        })
    }

    /// Unpack a stored blob, checking it holds `expected` finite probabilities.
    pub fn unpack(id: &str, bytes: &[u8], expected: usize) -> StoreResult<Self> {
        let values: Vec<f64> =
            bincode::deserialize(bytes).map_err(|e| StoreError::CorruptParameters {
                id: id.to_string(),
                message: e.to_string(),
            })?;
        if values.len() != expected {
            return Err(StoreError::CorruptParameters {
                id: id.to_string(),
                message: format!("expected {expected} entries, found {}", values.len()),
            });
        }
        if let Some(bad) = values.iter().find(|p| !(0.0..=1.0).contains(*p)) {
            return Err(StoreError::CorruptParameters {
                id: id.to_string(),
                message: format!("{bad} is not a probability"),
            });
        }
        Ok(Self { values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_parameters_unpack() {
        let params = Parameters::new(vec![0.25, 0.5, 0.75]);
        let bytes = params.pack("t1").unwrap();
        let back = Parameters::unpack("t1", &bytes, 3).unwrap();
        assert_eq!(back, params);
        assert_eq!(back.prior(), 0.25);
        assert_eq!(back.entry(1, 1), 0.75);
    }

    #[test]
    fn wrong_length_is_corrupt() {
        let bytes = Parameters::new(vec![0.5; 4]).pack("t1").unwrap();
        let err = Parameters::unpack("t1", &bytes, 5).unwrap_err();
        assert!(matches!(err, StoreError::CorruptParameters { .. }));
    }

    #[test]
    fn garbage_is_corrupt() {
        let err = Parameters::unpack("t1", &[1, 2, 3], 1).unwrap_err();
        assert!(matches!(err, StoreError::CorruptParameters { .. }));
    }

    #[test]
    fn out_of_range_probability_is_corrupt() {
        let bytes = Parameters::new(vec![0.5, 1.5]).pack("t1").unwrap();
        assert!(Parameters::unpack("t1", &bytes, 2).is_err());
    }
}
