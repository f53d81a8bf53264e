//! The bundled Linnaean taxon classification.

use serde::{Deserialize, Serialize};

use crate::error::EvalResult;
use crate::value::{Value, ValueType};

use super::{Classification, Record, RecordMut, TaxonomicStatus};

/// Observable ids of the Linnaean network.
pub mod terms {
    pub const TAXON_ID: &str = "taxonId";
    pub const SCIENTIFIC_NAME: &str = "scientificName";
    pub const SCIENTIFIC_NAME_AUTHORSHIP: &str = "scientificNameAuthorship";
    pub const SOUNDEX_SCIENTIFIC_NAME: &str = "soundexScientificName";
    pub const NAME_COMPLETE: &str = "nameComplete";
    pub const NAME_PREFIX: &str = "namePrefix";
    pub const TAXON_RANK: &str = "taxonRank";
    pub const NOMENCLATURAL_CODE: &str = "nomenclaturalCode";
    pub const TAXONOMIC_STATUS: &str = "taxonomicStatus";
    pub const ACCEPTED_NAME_USAGE_ID: &str = "acceptedNameUsageId";
    pub const PARENT_NAME_USAGE_ID: &str = "parentNameUsageId";
    pub const KINGDOM: &str = "kingdom";
    pub const PHYLUM: &str = "phylum";
    pub const CLASS: &str = "class";
    pub const ORDER: &str = "order";
    pub const FAMILY: &str = "family";
    pub const GENUS: &str = "genus";
    pub const SPECIFIC_EPITHET: &str = "specificEpithet";
    pub const INFRASPECIFIC_EPITHET: &str = "infraspecificEpithet";
    pub const WEIGHT: &str = "weight";
    pub const PRIORITY: &str = "priority";
}

use terms::*;

/// A taxon name with its placement in the Linnaean hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LinnaeanClassification {
    pub taxon_id: Option<String>,
    pub scientific_name: Option<String>,
    pub scientific_name_authorship: Option<String>,
    pub soundex_scientific_name: Option<String>,
    pub name_complete: Option<String>,
    pub name_prefix: Vec<String>,
    pub taxon_rank: Option<String>,
    pub nomenclatural_code: Option<String>,
    pub taxonomic_status: Option<String>,
    pub accepted_name_usage_id: Option<String>,
    pub parent_name_usage_id: Option<String>,
    pub kingdom: Option<String>,
    pub phylum: Option<String>,
    pub class: Option<String>,
    pub order: Option<String>,
    pub family: Option<String>,
    pub genus: Option<String>,
    pub specific_epithet: Option<String>,
    pub infraspecific_epithet: Option<String>,
    pub weight: Option<f64>,
    pub priority: Option<i64>,
}

impl LinnaeanClassification {
    pub fn new() -> Self {
        Self::default()
    }

    /// A query for a bare scientific name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            scientific_name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.taxon_id = Some(id.into());
        self
    }

    pub fn with_authorship(mut self, authorship: impl Into<String>) -> Self {
        self.scientific_name_authorship = Some(authorship.into());
        self
    }

    pub fn with_rank(mut self, rank: impl Into<String>) -> Self {
        self.taxon_rank = Some(rank.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.nomenclatural_code = Some(code.into());
        self
    }

    pub fn with_status(mut self, status: TaxonomicStatus) -> Self {
        self.taxonomic_status = Some(status.term().to_string());
        self
    }

    pub fn with_accepted(mut self, id: impl Into<String>) -> Self {
        self.accepted_name_usage_id = Some(id.into());
        self
    }

    pub fn with_parent(mut self, id: impl Into<String>) -> Self {
        self.parent_name_usage_id = Some(id.into());
        self
    }

    pub fn with_genus(mut self, genus: impl Into<String>) -> Self {
        self.genus = Some(genus.into());
        self
    }

    pub fn with_family(mut self, family: impl Into<String>) -> Self {
        self.family = Some(family.into());
        self
    }

    pub fn with_kingdom(mut self, kingdom: impl Into<String>) -> Self {
        self.kingdom = Some(kingdom.into());
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }

    fn text_field(&self, observable: &str) -> Option<&Option<String>> {
        Some(match observable {
            TAXON_ID => &self.taxon_id,
            SCIENTIFIC_NAME => &self.scientific_name,
            SCIENTIFIC_NAME_AUTHORSHIP => &self.scientific_name_authorship,
            SOUNDEX_SCIENTIFIC_NAME => &self.soundex_scientific_name,
            NAME_COMPLETE => &self.name_complete,
            TAXON_RANK => &self.taxon_rank,
            NOMENCLATURAL_CODE => &self.nomenclatural_code,
            TAXONOMIC_STATUS => &self.taxonomic_status,
            ACCEPTED_NAME_USAGE_ID => &self.accepted_name_usage_id,
            PARENT_NAME_USAGE_ID => &self.parent_name_usage_id,
            KINGDOM => &self.kingdom,
            PHYLUM => &self.phylum,
            CLASS => &self.class,
            ORDER => &self.order,
            FAMILY => &self.family,
            GENUS => &self.genus,
            SPECIFIC_EPITHET => &self.specific_epithet,
            INFRASPECIFIC_EPITHET => &self.infraspecific_epithet,
            _ => return None,
        })
    }

    fn text_field_mut(&mut self, observable: &str) -> Option<&mut Option<String>> {
        Some(match observable {
            TAXON_ID => &mut self.taxon_id,
            SCIENTIFIC_NAME => &mut self.scientific_name,
            SCIENTIFIC_NAME_AUTHORSHIP => &mut self.scientific_name_authorship,
            SOUNDEX_SCIENTIFIC_NAME => &mut self.soundex_scientific_name,
            NAME_COMPLETE => &mut self.name_complete,
            TAXON_RANK => &mut self.taxon_rank,
            NOMENCLATURAL_CODE => &mut self.nomenclatural_code,
            TAXONOMIC_STATUS => &mut self.taxonomic_status,
            ACCEPTED_NAME_USAGE_ID => &mut self.accepted_name_usage_id,
            PARENT_NAME_USAGE_ID => &mut self.parent_name_usage_id,
            KINGDOM => &mut self.kingdom,
            PHYLUM => &mut self.phylum,
            CLASS => &mut self.class,
            ORDER => &mut self.order,
            FAMILY => &mut self.family,
            GENUS => &mut self.genus,
            SPECIFIC_EPITHET => &mut self.specific_epithet,
            INFRASPECIFIC_EPITHET => &mut self.infraspecific_epithet,
            _ => return None,
        })
    }
}

fn text(value: Value) -> String {
    match value {
        Value::Text(s) => s,
        other => other.to_string(),
    }
}

impl Record for LinnaeanClassification {
    fn values_of(&self, observable: &str) -> Vec<Value> {
        if let Some(field) = self.text_field(observable) {
            return field.iter().cloned().map(Value::Text).collect();
        }
        match observable {
            NAME_PREFIX => self.name_prefix.iter().cloned().map(Value::Text).collect(),
            WEIGHT => self.weight.into_iter().map(Value::Decimal).collect(),
            PRIORITY => self.priority.into_iter().map(Value::Integer).collect(),
            _ => Vec::new(),
        }
    }
}

impl RecordMut for LinnaeanClassification {
    /// Single-valued fields keep the primary value; unknown observables are
    /// ignored.
    fn set_values(&mut self, observable: &str, values: Vec<Value>) -> EvalResult<()> {
        if let Some(field) = self.text_field_mut(observable) {
            *field = values.into_iter().next().map(text);
            return Ok(());
        }
        match observable {
            NAME_PREFIX => self.name_prefix = values.into_iter().map(text).collect(),
            WEIGHT => {
                self.weight = values
                    .into_iter()
                    .next()
                    .map(|v| v.coerce(WEIGHT, ValueType::Decimal))
                    .transpose()?
                    .and_then(|v| v.as_f64());
            }
            PRIORITY => {
                self.priority = values
                    .into_iter()
                    .next()
                    .map(|v| v.coerce(PRIORITY, ValueType::Integer))
                    .transpose()?
                    .and_then(|v| v.as_i64());
            }
            _ => {}
        }
        Ok(())
    }
}

impl Classification for LinnaeanClassification {
    const TYPE: &'static str = "Taxon";

    const OBSERVABLES: &'static [&'static str] = &[
        TAXON_ID,
        SCIENTIFIC_NAME,
        SCIENTIFIC_NAME_AUTHORSHIP,
        SOUNDEX_SCIENTIFIC_NAME,
        NAME_COMPLETE,
        NAME_PREFIX,
        TAXON_RANK,
        NOMENCLATURAL_CODE,
        TAXONOMIC_STATUS,
        ACCEPTED_NAME_USAGE_ID,
        PARENT_NAME_USAGE_ID,
        KINGDOM,
        PHYLUM,
        CLASS,
        ORDER,
        FAMILY,
        GENUS,
        SPECIFIC_EPITHET,
        INFRASPECIFIC_EPITHET,
        WEIGHT,
        PRIORITY,
    ];

    const REQUIRED: &'static [&'static str] = &[
        TAXON_ID,
        SCIENTIFIC_NAME,
        TAXON_RANK,
        TAXONOMIC_STATUS,
        ACCEPTED_NAME_USAGE_ID,
        PARENT_NAME_USAGE_ID,
        NOMENCLATURAL_CODE,
    ];

    fn identifier(&self) -> Option<String> {
        self.taxon_id.clone()
    }

    fn scientific_name(&self) -> Option<String> {
        self.scientific_name.clone()
    }

    fn taxon_rank(&self) -> Option<String> {
        self.taxon_rank.clone()
    }

    fn taxonomic_status(&self) -> TaxonomicStatus {
        self.taxonomic_status
            .as_deref()
            .map(TaxonomicStatus::parse)
            .unwrap_or_default()
    }

    fn accepted_id(&self) -> Option<String> {
        self.accepted_name_usage_id.clone()
    }

    fn parent_id(&self) -> Option<String> {
        self.parent_name_usage_id.clone()
    }

    fn nomenclatural_code(&self) -> Option<String> {
        self.nomenclatural_code.clone()
    }

    fn phonetic_name(&self) -> Option<String> {
        self.soundex_scientific_name.clone()
    }
}
