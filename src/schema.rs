//! Field schema of each feature class.
//!
//! The full GPX schema is always emitted, whether or not a file uses every
//! element, so a class has the same columns in every file of the same
//! version. Object id is column 0 and the shape is column 1.

use serde::Serialize;

use crate::gpx_types::{ElementKind, FeatureClassKind, GeometryShape, GpxVersion};

pub const OID_FIELD_INDEX: usize = 0;
pub const SHAPE_FIELD_INDEX: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    ObjectId,
    Geometry,
    Integer,
    Double,
    String,
    Date,
}

/// Geometry column properties. GPX is always WGS84; Z is enabled and M is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeometryDef {
    pub shape: GeometryShape,
    pub wkid: u32,
    pub has_z: bool,
    pub has_m: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub name: &'static str,
    pub alias: &'static str,
    pub field_type: FieldType,
    /// Fixed maximum length of string values.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<GeometryDef>,
    /// GPX element the value is read from.
    #[serde(skip)]
    pub source: Option<ElementKind>,
}

impl Field {
    fn attribute(source: ElementKind, alias: &'static str, field_type: FieldType) -> Self {
        Self {
            name: source.local_name(),
            alias,
            field_type,
            length: None,
            geometry: None,
            source: Some(source),
        }
    }

    fn with_length(mut self, length: usize) -> Self {
        self.length = Some(length);
        self
    }
}

/// Ordered field list for `kind` in a document of `version`.
///
/// GPX 1.0 documents additionally get the `url` and `urlname` columns.
pub fn fields_for(kind: FeatureClassKind, version: GpxVersion) -> Vec<Field> {
    use ElementKind as E;
    use FieldType as T;

    let mut fields = vec![
        Field {
            name: "ObjectID",
            alias: "Object ID",
            field_type: T::ObjectId,
            length: None,
            geometry: None,
            source: None,
        },
        Field {
            name: "SHAPE",
            alias: "Shape",
            field_type: T::Geometry,
            length: None,
            geometry: Some(GeometryDef {
                shape: kind.shape(),
                wkid: crate::engine::WGS84_WKID,
                has_z: true,
                has_m: false,
            }),
            source: None,
        },
        Field::attribute(E::Name, "Name", T::String),
        Field::attribute(E::Cmt, "Comment", T::String),
        Field::attribute(E::Desc, "Description", T::String),
        Field::attribute(E::Src, "Source", T::String),
        Field::attribute(E::Link, "Hyperlink", T::String),
    ];

    if version == GpxVersion::V1_0 {
        fields.push(Field::attribute(E::Url, "Url link", T::String));
        fields.push(Field::attribute(E::Urlname, "Url Name", T::String));
    }

    fields.push(Field::attribute(E::Type, "Type", T::String));
    fields.push(Field::attribute(E::Extensions, "XML Extensions", T::String));

    match kind.element() {
        E::Rte => fields.push(Field::attribute(E::Number, "Route Number", T::Integer)),
        E::Trk => fields.push(Field::attribute(E::Number, "Track Number", T::Integer)),
        _ => {}
    }

    if kind.element().is_point() {
        fields.extend([
            Field::attribute(E::Ele, "Elevation", T::Double),
            Field::attribute(E::Time, "Time (UTC)", T::Date),
            Field::attribute(E::Magvar, "Magnetic Variation", T::Double),
            Field::attribute(E::Geoidheight, "GeoID Height", T::Double),
            Field::attribute(E::Sym, "Symbol", T::String),
            Field::attribute(E::Fix, "GpsFix", T::String).with_length(4),
            Field::attribute(E::Sat, "Satellites", T::Integer),
            Field::attribute(E::Hdop, "HDOP", T::Double),
            Field::attribute(E::Vdop, "VDOP", T::Double),
            Field::attribute(E::Pdop, "PDOP", T::Double),
            Field::attribute(E::Ageofdgpsdata, "Age of DGPS Data", T::Double),
            Field::attribute(E::Dgpsid, "DGPS ID", T::Integer),
        ]);
    }

    fields
}

/// Position of the field named `name`, if any.
pub fn find_field(fields: &[Field], name: &str) -> Option<usize> {
    fields.iter().position(|f| f.name == name)
}
