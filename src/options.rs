use serde::{Deserialize, Serialize};

use crate::engine::{SpatialReference, SpatialRelationship};
use crate::error::{GpxTableError, Result};
use crate::feature_class::ObjectId;
use crate::geometry::Envelope;

/// Options for opening a GPX document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadOptions {
    /// Build every row up front, or read rows from the document on demand
    /// (default: eager)
    #[serde(default)]
    pub materialization: Materialization,

    /// Namespace prefixes accepted without a declaration (default: `gpxx`)
    #[serde(default = "default_ignored_prefixes")]
    pub ignored_prefixes: Vec<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            materialization: Materialization::default(),
            ignored_prefixes: default_ignored_prefixes(),
        }
    }
}

impl LoadOptions {
    pub fn lazy() -> Self {
        Self {
            materialization: Materialization::Lazy,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Materialization {
    #[default]
    Eager,
    Lazy,
}

/// Which predicate a cursor evaluates first. Both orders select the same rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchOrder {
    #[default]
    Attribute,
    Spatial,
}

/// Row selection for a cursor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryFilter {
    /// Only rows with these object ids (empty: no id predicate)
    pub object_ids: Vec<ObjectId>,

    /// Spatial filter in WGS84. An empty or zero-area envelope is ignored.
    pub envelope: Option<Envelope>,

    pub spatial_relationship: SpatialRelationship,

    pub search_order: SearchOrder,

    /// Reproject yielded geometries (default: none, rows stay in WGS84)
    pub output_spatial_reference: Option<SpatialReference>,

    pub where_clause: Option<String>,
    pub prefix_clause: Option<String>,
    pub postfix_clause: Option<String>,
}

impl QueryFilter {
    pub fn with_object_ids(mut self, ids: impl IntoIterator<Item = ObjectId>) -> Self {
        self.object_ids = ids.into_iter().collect();
        self
    }

    pub fn with_envelope(mut self, envelope: Envelope) -> Self {
        self.envelope = Some(envelope);
        self
    }

    pub fn with_relationship(mut self, relationship: SpatialRelationship) -> Self {
        self.spatial_relationship = relationship;
        self
    }

    pub fn with_search_order(mut self, order: SearchOrder) -> Self {
        self.search_order = order;
        self
    }

    pub fn with_output_spatial_reference(mut self, sr: SpatialReference) -> Self {
        self.output_spatial_reference = Some(sr);
        self
    }

    /// Query-language clauses are not supported.
    pub fn validate(&self) -> Result<()> {
        let clauses = [
            ("where", &self.where_clause),
            ("prefix", &self.prefix_clause),
            ("postfix", &self.postfix_clause),
        ];
        for (name, clause) in clauses {
            if clause.as_deref().is_some_and(|c| !c.trim().is_empty()) {
                return Err(GpxTableError::Unsupported(format!("{name} clauses")));
            }
        }
        Ok(())
    }

    /// The envelope, when it is usable as a spatial filter.
    pub fn spatial_filter(&self) -> Option<&Envelope> {
        self.envelope.as_ref().filter(|env| !env.is_degenerate())
    }
}

fn default_ignored_prefixes() -> Vec<String> {
    vec!["gpxx".to_string()]
}
