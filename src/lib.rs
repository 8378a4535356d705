pub mod bounds;
pub mod converter;
pub mod cursor;
pub mod dataset;
pub mod document;
pub mod engine;
pub mod error;
pub mod feature_class;
pub mod geometry;
pub mod gpx_types;
pub mod options;
pub mod parser;
pub mod schema;
pub mod source;

use wasm_bindgen::prelude::*;

pub use crate::cursor::Cursor;
pub use crate::dataset::{FeatureClassSummary, GpxDataset};
pub use crate::document::GpxDocument;
pub use crate::engine::{GeometryEngine, PlanarEngine, SpatialReference, SpatialRelationship};
pub use crate::error::{GpxTableError, LoadError, Result};
pub use crate::feature_class::{FeatureClass, ObjectId, Row, Value};
pub use crate::geometry::{Envelope, Geometry, Vertex};
pub use crate::gpx_types::{FeatureClassKind, GeometryShape, GpxVersion};
pub use crate::options::{LoadOptions, Materialization, QueryFilter, SearchOrder};
pub use crate::schema::{Field, FieldType};
pub use crate::source::{GpxSource, has_gpx_extension};

/// Summaries (name, shape, fields, extent, row count) of the feature classes
/// in a GPX document, returned as a JS array. A file that is not GPX yields
/// an empty array.
#[wasm_bindgen(js_name = gpxFeatureClasses)]
pub fn gpx_feature_classes(gpx_bytes: &[u8], options: JsValue) -> std::result::Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let opts: LoadOptions = parse_js(options)?;
    let document = GpxDocument::from_bytes(gpx_bytes, opts);
    let summaries = GpxDataset::new(&document).summaries();
    serde_wasm_bindgen::to_value(&summaries).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Rows of one feature class selected by `query`, as a GeoJSON
/// FeatureCollection object.
#[wasm_bindgen(js_name = gpxFeatureClassToGeoJson)]
pub fn gpx_feature_class_to_geojson(
    gpx_bytes: &[u8],
    class_name: &str,
    query: JsValue,
) -> std::result::Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let filter: QueryFilter = parse_js(query)?;
    let document = GpxDocument::from_bytes(gpx_bytes, LoadOptions::default());
    let dataset = GpxDataset::new(&document);
    let index = dataset.class_index(class_name).ok_or_else(|| {
        GpxTableError::InvalidArgument(format!("no feature class named '{class_name}'"))
    })?;
    let fc = converter::to_feature_collection(dataset.search(index, &filter)?)?;
    let serializer = serde_wasm_bindgen::Serializer::json_compatible();
    serde::Serialize::serialize(&fc, &serializer).map_err(|e| JsValue::from_str(&e.to_string()))
}

fn parse_js<T: serde::de::DeserializeOwned + Default>(value: JsValue) -> std::result::Result<T, JsValue> {
    if value.is_undefined() || value.is_null() {
        Ok(T::default())
    } else {
        serde_wasm_bindgen::from_value(value).map_err(|e| JsValue::from_str(&e.to_string()))
    }
}
