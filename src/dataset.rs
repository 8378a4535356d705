//! Index-addressed view of a document, shaped like the class-index API a
//! host data-access framework drives a plug-in through.

use serde::Serialize;

use crate::cursor::Cursor;
use crate::document::GpxDocument;
use crate::error::{GpxTableError, Result};
use crate::feature_class::{FeatureClass, ObjectId};
use crate::geometry::Envelope;
use crate::gpx_types::{FeatureClassKind, GeometryShape};
use crate::options::QueryFilter;
use crate::schema::{Field, OID_FIELD_INDEX, SHAPE_FIELD_INDEX};

/// What a catalog lists for one feature class.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureClassSummary {
    pub name: &'static str,
    pub shape: GeometryShape,
    pub fields: Vec<Field>,
    pub extent: Option<Envelope>,
    pub row_count: usize,
}

impl From<&FeatureClass> for FeatureClassSummary {
    fn from(class: &FeatureClass) -> Self {
        Self {
            name: class.name(),
            shape: class.shape(),
            fields: class.fields().to_vec(),
            extent: class.extent(),
            row_count: class.row_count(),
        }
    }
}

pub struct GpxDataset<'a> {
    document: &'a GpxDocument,
    kinds: Vec<FeatureClassKind>,
}

impl<'a> GpxDataset<'a> {
    pub fn new(document: &'a GpxDocument) -> Self {
        Self {
            document,
            kinds: document.feature_classes().keys().copied().collect(),
        }
    }

    pub fn document(&self) -> &'a GpxDocument {
        self.document
    }

    pub fn class_count(&self) -> usize {
        self.kinds.len()
    }

    pub fn class_name(&self, index: usize) -> Result<&'static str> {
        self.class(index).map(FeatureClass::name)
    }

    pub fn class_index(&self, name: &str) -> Option<usize> {
        let kind = FeatureClassKind::from_name(name)?;
        self.kinds.iter().position(|k| *k == kind)
    }

    pub fn class(&self, index: usize) -> Result<&'a FeatureClass> {
        self.kinds
            .get(index)
            .and_then(|kind| self.document.feature_class(*kind))
            .ok_or_else(|| {
                GpxTableError::InvalidArgument(format!(
                    "class index {index} out of range (dataset has {} classes)",
                    self.kinds.len()
                ))
            })
    }

    pub fn oid_field_index(&self) -> usize {
        OID_FIELD_INDEX
    }

    pub fn shape_field_index(&self) -> usize {
        SHAPE_FIELD_INDEX
    }

    pub fn fields(&self, index: usize) -> Result<&'a [Field]> {
        self.class(index).map(FeatureClass::fields)
    }

    pub fn row_count(&self, index: usize) -> Result<usize> {
        self.class(index).map(FeatureClass::row_count)
    }

    pub fn bounds(&self) -> Option<Envelope> {
        self.document.bounds()
    }

    pub fn summaries(&self) -> Vec<FeatureClassSummary> {
        self.document
            .feature_classes()
            .values()
            .map(FeatureClassSummary::from)
            .collect()
    }

    pub fn fetch_all(&self, index: usize) -> Result<Cursor<'a>> {
        Cursor::all(self.class(index)?)
    }

    pub fn fetch_by_id(&self, index: usize, oid: ObjectId) -> Result<Cursor<'a>> {
        Cursor::by_id(self.class(index)?, oid)
    }

    pub fn fetch_by_envelope(&self, index: usize, envelope: Envelope) -> Result<Cursor<'a>> {
        Cursor::by_envelope(self.class(index)?, envelope)
    }

    /// Id and envelope are alternative selections; combining them is refused.
    pub fn fetch_by_id_and_envelope(
        &self,
        index: usize,
        _oid: ObjectId,
        _envelope: Envelope,
    ) -> Result<Cursor<'a>> {
        self.class(index)?;
        Err(GpxTableError::Unsupported(
            "fetching by object id and envelope together".to_string(),
        ))
    }

    pub fn search(&self, index: usize, filter: &QueryFilter) -> Result<Cursor<'a>> {
        Cursor::search(self.class(index)?, filter)
    }
}
