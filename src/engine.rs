//! Spatial predicates and reprojection used by the cursor.
//!
//! The cursor talks to a [`GeometryEngine`] so a host can plug in its own
//! geometry library. [`PlanarEngine`] is the built-in one, backed by `geo`.

use geo::Relate;
use serde::{Deserialize, Serialize};

use crate::error::{GpxTableError, Result};
use crate::geometry::{Envelope, Geometry, Vertex};

pub const WGS84_WKID: u32 = 4326;
pub const WEB_MERCATOR_WKID: u32 = 3857;

const EARTH_MERCATOR_MAX: f64 = 20037508.34;
const MAX_MERCATOR_LATITUDE: f64 = 85.05112878;

/// Coordinate system identified by its well-known id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub enum SpatialReference {
    Wgs84,
    WebMercator,
    Other(u32),
}

impl SpatialReference {
    pub fn wkid(self) -> u32 {
        match self {
            Self::Wgs84 => WGS84_WKID,
            Self::WebMercator => WEB_MERCATOR_WKID,
            Self::Other(wkid) => wkid,
        }
    }
}

impl From<u32> for SpatialReference {
    fn from(wkid: u32) -> Self {
        match wkid {
            WGS84_WKID => Self::Wgs84,
            // 102100 is the legacy Esri id of the same projection.
            WEB_MERCATOR_WKID | 102100 | 900913 => Self::WebMercator,
            other => Self::Other(other),
        }
    }
}

impl From<SpatialReference> for u32 {
    fn from(sr: SpatialReference) -> Self {
        sr.wkid()
    }
}

impl std::fmt::Display for SpatialReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EPSG:{}", self.wkid())
    }
}

/// How the filter envelope must relate to a row's geometry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SpatialRelationship {
    #[default]
    Intersects,
    /// Compares the two extents only.
    EnvelopeIntersects,
    /// No spatial index exists, so this behaves as `Intersects`.
    IndexIntersects,
    Contains,
    Crosses,
    Overlaps,
    Touches,
    Within,
}

pub trait GeometryEngine {
    /// True when `relation(filter, geometry)` holds. Empty geometries never
    /// relate to anything.
    fn relates(&self, filter: &Envelope, geometry: &Geometry, relation: SpatialRelationship) -> bool;

    /// A copy of `geometry` (WGS84) in `target`.
    fn project(&self, geometry: &Geometry, target: SpatialReference) -> Result<Geometry>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlanarEngine;

impl GeometryEngine for PlanarEngine {
    fn relates(&self, filter: &Envelope, geometry: &Geometry, relation: SpatialRelationship) -> bool {
        if relation == SpatialRelationship::EnvelopeIntersects {
            return geometry
                .envelope()
                .is_some_and(|extent| filter.intersects(&extent));
        }
        let Some(shape) = geometry.to_geo() else {
            return false;
        };
        if filter.is_empty() {
            return false;
        }
        let matrix = filter.to_geo().relate(&shape);
        match relation {
            SpatialRelationship::Intersects
            | SpatialRelationship::IndexIntersects
            | SpatialRelationship::EnvelopeIntersects => matrix.is_intersects(),
            SpatialRelationship::Contains => matrix.is_contains(),
            SpatialRelationship::Crosses => matrix.is_crosses(),
            SpatialRelationship::Overlaps => matrix.is_overlaps(),
            SpatialRelationship::Touches => matrix.is_touches(),
            SpatialRelationship::Within => matrix.is_within(),
        }
    }

    fn project(&self, geometry: &Geometry, target: SpatialReference) -> Result<Geometry> {
        match target {
            SpatialReference::Wgs84 => Ok(geometry.clone()),
            SpatialReference::WebMercator => Ok(geometry.map_vertices(wgs84_to_mercator)),
            SpatialReference::Other(_) => Err(GpxTableError::Projection {
                target: target.to_string(),
                reason: "no transformation from EPSG:4326 is available".to_string(),
            }),
        }
    }
}

/// Spherical Web Mercator. Latitude is clamped to the projection's limit;
/// elevation is carried through unchanged.
pub fn wgs84_to_mercator(v: &Vertex) -> Vertex {
    let lat = v.y.clamp(-MAX_MERCATOR_LATITUDE, MAX_MERCATOR_LATITUDE);
    let lat_rad = lat.to_radians();
    let x = v.x * EARTH_MERCATOR_MAX / 180.0;
    let y = (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() * EARTH_MERCATOR_MAX / std::f64::consts::PI;
    Vertex { x, y, z: v.z }
}
