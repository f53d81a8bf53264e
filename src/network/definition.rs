//! Declarative network definitions.
//!
//! A definition is a TOML (or JSON) document with a `[network]` header,
//! named vocabularies, the observable list, dependency edges and the match
//! and index modifier rules. [`NetworkDefinition::build`] validates it into
//! an immutable [`Network`].

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{NetworkError, NetworkResult};
use crate::expr::modifier::ModifierRule;

use super::observable::Observable;
use super::{Network, NetworkBuilder};

/// The bundled Linnaean taxon network.
const LINNAEAN_TOML: &str = include_str!("../../data/networks/linnaean.toml");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkHeader {
    pub id: String,
    /// Record type tag of the classifiers this network describes.
    #[serde(rename = "type")]
    pub type_tag: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDefinition {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkDefinition {
    pub network: NetworkHeader,
    #[serde(default)]
    pub vocabularies: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub observables: Vec<Observable>,
    #[serde(default)]
    pub edges: Vec<EdgeDefinition>,
    #[serde(default)]
    pub match_modifiers: Vec<ModifierRule>,
    #[serde(default)]
    pub index_modifiers: Vec<ModifierRule>,
}

impl NetworkDefinition {
    pub fn from_toml(text: &str) -> NetworkResult<Self> {
        toml::from_str(text).map_err(|e| NetworkError::Parse {
            message: e.to_string(),
        })
    }

    pub fn from_json(text: &str) -> NetworkResult<Self> {
        serde_json::from_str(text).map_err(|e| NetworkError::Parse {
            message: e.to_string(),
        })
    }

    /// Read a definition from disk. `.json` files are parsed as JSON,
    /// everything else as TOML.
    pub fn load(path: &Path) -> NetworkResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| NetworkError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json(&text)
        } else {
            Self::from_toml(&text)
        }
    }

    /// The bundled Linnaean definition.
    pub fn linnaean() -> NetworkResult<Self> {
        Self::from_toml(LINNAEAN_TOML)
    }

    /// Validate the definition and build the network.
    pub fn build(self) -> NetworkResult<Network> {
        let mut builder = NetworkBuilder::new(self.network.id, self.network.type_tag);
        if let Some(description) = self.network.description {
            builder = builder.description(description);
        }
        for (name, terms) in self.vocabularies {
            builder = builder.vocabulary(name, terms);
        }
        for observable in self.observables {
            builder = builder.observable(observable);
        }
        for edge in self.edges {
            builder = builder.edge(edge.from, edge.to);
        }
        for rule in self.match_modifiers {
            builder = builder.match_modifier(rule);
        }
        for rule in self.index_modifiers {
            builder = builder.index_modifier(rule);
        }
        builder.build()
    }
}

impl Network {
    /// Build the bundled Linnaean network.
    pub fn linnaean() -> NetworkResult<Self> {
        NetworkDefinition::linnaean()?.build()
    }

    /// Load and build a network definition file.
    pub fn load(path: &Path) -> NetworkResult<Self> {
        NetworkDefinition::load(path)?.build()
    }
}
