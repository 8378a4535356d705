use chrono::SecondsFormat;
use geojson::feature::Id;
use geojson::{Feature, FeatureCollection, Geometry as GeoJsonGeometry, Value as GeoJsonValue};
use serde_json::{Map, Number, Value as JsonValue};

use crate::cursor::Cursor;
use crate::engine::{GeometryEngine, SpatialReference};
use crate::error::Result;
use crate::feature_class::{Row, Value};
use crate::geometry::{Geometry, Vertex};
use crate::schema::Field;

/// Drain a cursor into a GeoJSON FeatureCollection.
///
/// The collection bbox is the dataset extent, left out when the cursor
/// reprojects its output.
pub fn to_feature_collection<E: GeometryEngine>(cursor: Cursor<'_, E>) -> Result<FeatureCollection> {
    let class = cursor.class();
    let bbox = match cursor.output_spatial_reference() {
        SpatialReference::Wgs84 => class.extent().map(|env| env.to_vec()),
        _ => None,
    };
    let features = cursor
        .map(|row| row.map(|row| row_to_feature(class.fields(), &row)))
        .collect::<Result<Vec<_>>>()?;

    Ok(FeatureCollection {
        bbox,
        features,
        foreign_members: None,
    })
}

/// One Feature per row: id is the object id, properties are the non-null
/// attribute values.
pub fn row_to_feature(fields: &[Field], row: &Row) -> Feature {
    let mut props = Map::new();
    for (field, value) in fields.iter().zip(&row.values) {
        if let Some(json) = value_to_json(value) {
            props.insert(field.name.to_string(), json);
        }
    }

    Feature {
        bbox: None,
        geometry: row.geometry().and_then(to_geojson_geometry),
        id: Some(Id::Number(row.object_id().into())),
        properties: Some(props),
        foreign_members: None,
    }
}

fn value_to_json(value: &Value) -> Option<JsonValue> {
    match value {
        Value::Null | Value::ObjectId(_) | Value::Geometry(_) => None,
        Value::Integer(n) => Some(JsonValue::Number((*n).into())),
        Value::Double(d) => Number::from_f64(*d).map(JsonValue::Number),
        Value::String(s) => Some(JsonValue::String(s.clone())),
        Value::Date(t) => Some(JsonValue::String(t.to_rfc3339_opts(SecondsFormat::AutoSi, true))),
    }
}

/// Positions a LineString needs.
const MIN_LINE_POSITIONS: usize = 2;
/// Positions a closed linear ring needs.
const MIN_RING_POSITIONS: usize = 4;

/// Point, LineString / MultiLineString, or Polygon / MultiPolygon with one
/// polygon per ring. Parts too short for their GeoJSON type are dropped; a
/// line or polygon left with no part is written as a Point at its first
/// vertex. `None` for empty geometries.
pub fn to_geojson_geometry(geometry: &Geometry) -> Option<GeoJsonGeometry> {
    let min_positions = match geometry {
        Geometry::Point(vertex) => {
            return Some(GeoJsonGeometry::new(GeoJsonValue::Point(point_coords(vertex.as_ref()?))));
        }
        Geometry::Polyline(_) => MIN_LINE_POSITIONS,
        Geometry::Polygon(_) => MIN_RING_POSITIONS,
    };
    let mut parts: Vec<Vec<Vec<f64>>> = geometry
        .parts()
        .iter()
        .filter(|part| part.len() >= min_positions)
        .map(|part| part.iter().map(point_coords).collect())
        .collect();

    let value = match (geometry, parts.len()) {
        (_, 0) => GeoJsonValue::Point(point_coords(geometry.vertices().next()?)),
        (Geometry::Polyline(_), 1) => GeoJsonValue::LineString(parts.remove(0)),
        (Geometry::Polyline(_), _) => GeoJsonValue::MultiLineString(parts),
        (_, 1) => GeoJsonValue::Polygon(parts),
        _ => GeoJsonValue::MultiPolygon(parts.into_iter().map(|ring| vec![ring]).collect()),
    };
    Some(GeoJsonGeometry::new(value))
}

/// Build [lon, lat] or [lon, lat, ele] coordinate array.
fn point_coords(v: &Vertex) -> Vec<f64> {
    match v.z {
        Some(z) => vec![v.x, v.y, z],
        None => vec![v.x, v.y],
    }
}
