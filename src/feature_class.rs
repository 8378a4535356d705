//! Feature classes: one typed table per kind of GPX element present in a
//! document.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::trace;

use crate::document::LoadedDocument;
use crate::error::Result;
use crate::geometry::{self, Envelope, Geometry, parse_double};
use crate::gpx_types::{ElementKind, FeatureClassKind, GeometryShape};
use crate::options::Materialization;
use crate::parser::{NodeId, XmlTree};
use crate::schema::{self, Field, FieldType, SHAPE_FIELD_INDEX};

/// 1-based, assigned in document order.
pub type ObjectId = i64;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    ObjectId(ObjectId),
    Integer(i64),
    Double(f64),
    String(String),
    Date(DateTime<Utc>),
    Geometry(Geometry),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// Values aligned with the class's field list.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub values: Vec<Value>,
}

impl Row {
    pub fn object_id(&self) -> ObjectId {
        match self.values.first() {
            Some(Value::ObjectId(oid)) => *oid,
            _ => 0,
        }
    }

    pub fn geometry(&self) -> Option<&Geometry> {
        match self.values.get(SHAPE_FIELD_INDEX) {
            Some(Value::Geometry(g)) => Some(g),
            _ => None,
        }
    }

    pub(crate) fn geometry_mut(&mut self) -> Option<&mut Geometry> {
        match self.values.get_mut(SHAPE_FIELD_INDEX) {
            Some(Value::Geometry(g)) => Some(g),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct FeatureClass {
    kind: FeatureClassKind,
    fields: Vec<Field>,
    document: Arc<LoadedDocument>,
    /// Matching elements in document order; `elements[oid - 1]`.
    elements: Vec<NodeId>,
    /// Filled up front in eager mode, `None` in lazy mode.
    rows: Option<Vec<Row>>,
}

impl FeatureClass {
    pub(crate) fn new(
        kind: FeatureClassKind,
        document: Arc<LoadedDocument>,
        materialization: Materialization,
    ) -> Result<Self> {
        let tree = document.tree();
        let fields = schema::fields_for(kind, tree.version());
        let elements: Vec<NodeId> = tree.elements_of_kind(kind.element()).collect();
        let mut class = Self {
            kind,
            fields,
            document,
            elements,
            rows: None,
        };
        if materialization == Materialization::Eager {
            let rows = (0..class.elements.len())
                .map(|index| class.build_row(index))
                .collect::<Result<Vec<_>>>()?;
            class.rows = Some(rows);
        }
        Ok(class)
    }

    pub fn kind(&self) -> FeatureClassKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn shape(&self) -> GeometryShape {
        self.kind.shape()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Dataset-level extent, shared by every class of the document.
    pub fn extent(&self) -> Option<Envelope> {
        self.document.bounds()
    }

    pub fn row_count(&self) -> usize {
        self.elements.len()
    }

    pub fn materialization(&self) -> Materialization {
        if self.rows.is_some() {
            Materialization::Eager
        } else {
            Materialization::Lazy
        }
    }

    /// Row with object id `oid`, or `None` when out of range.
    pub fn row(&self, oid: ObjectId) -> Result<Option<Cow<'_, Row>>> {
        let Some(index) = self.index_of(oid) else {
            return Ok(None);
        };
        match &self.rows {
            Some(rows) => Ok(Some(Cow::Borrowed(&rows[index]))),
            None => self.build_row(index).map(|row| Some(Cow::Owned(row))),
        }
    }

    /// Geometry of the row with object id `oid`, without reading attributes.
    pub fn geometry(&self, oid: ObjectId) -> Result<Option<Cow<'_, Geometry>>> {
        let Some(index) = self.index_of(oid) else {
            return Ok(None);
        };
        if let Some(rows) = &self.rows {
            return Ok(rows[index].geometry().map(Cow::Borrowed));
        }
        geometry::build(self.document.tree(), self.elements[index], self.shape())
            .map(|g| Some(Cow::Owned(g)))
    }

    fn index_of(&self, oid: ObjectId) -> Option<usize> {
        let index = usize::try_from(oid).ok()?.checked_sub(1)?;
        (index < self.elements.len()).then_some(index)
    }

    fn build_row(&self, index: usize) -> Result<Row> {
        let tree = self.document.tree();
        let id = self.elements[index];
        let mut values = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let value = match field.field_type {
                FieldType::ObjectId => Value::ObjectId(index as ObjectId + 1),
                FieldType::Geometry => Value::Geometry(geometry::build(tree, id, self.shape())?),
                _ => attribute_value(tree, id, field),
            };
            values.push(value);
        }
        Ok(Row { values })
    }
}

/// One feature class per kind with at least one matching element.
pub(crate) fn materialize(
    document: &Arc<LoadedDocument>,
    materialization: Materialization,
) -> Result<BTreeMap<FeatureClassKind, FeatureClass>> {
    let mut classes = BTreeMap::new();
    for kind in FeatureClassKind::ALL {
        if document.tree().contains(kind.element()) {
            let class = FeatureClass::new(kind, Arc::clone(document), materialization)?;
            classes.insert(kind, class);
        }
    }
    Ok(classes)
}

/// Value of an attribute field for element `id`. Only the first matching
/// child is read; unparsable values are `Null`.
fn attribute_value(tree: &XmlTree, id: NodeId, field: &Field) -> Value {
    let Some(source) = field.source else {
        return Value::Null;
    };
    let Some(child) = tree.child(id, source) else {
        return Value::Null;
    };

    let value = match (source, field.field_type) {
        (ElementKind::Link, _) => tree
            .element(child)
            .attribute("href")
            .map(|href| Value::String(href.to_string())),
        (ElementKind::Extensions, _) => Some(Value::String(tree.to_xml(child))),
        (_, FieldType::String) => Some(Value::String(tree.text(child))),
        (_, FieldType::Integer) => tree.text(child).trim().parse::<i64>().ok().map(Value::Integer),
        (_, FieldType::Double) => parse_double(&tree.text(child)).map(Value::Double),
        (_, FieldType::Date) => parse_date(&tree.text(child)).map(Value::Date),
        (_, FieldType::ObjectId | FieldType::Geometry) => None,
    };

    match value {
        Some(Value::String(text)) => Value::String(truncate(text, field.length)),
        Some(value) => value,
        None => {
            trace!(field = field.name, node = id, "unreadable value");
            Value::Null
        }
    }
}

/// RFC 3339, or a timestamp without offset taken as UTC.
fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn truncate(text: String, length: Option<usize>) -> String {
    match length {
        Some(max) if text.chars().count() > max => text.chars().take(max).collect(),
        _ => text,
    }
}
