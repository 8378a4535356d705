//! Geometry model and construction of geometries from GPX elements.
//!
//! A [`Geometry`] is a closed sum of the three shapes a feature class can
//! carry. Polylines keep one part per route or track segment; polygons keep
//! one ring per part, each closed by repeating its first vertex.

use serde::{Deserialize, Serialize};

use crate::error::{GpxTableError, Result};
use crate::gpx_types::{ElementKind, GeometryShape};
use crate::parser::{NodeId, XmlTree};

/// A coordinate in WGS84 degrees with optional elevation in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Vertex {
    pub x: f64,
    pub y: f64,
    pub z: Option<f64>,
}

impl Vertex {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: None }
    }

    pub fn with_z(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z: Some(z) }
    }

    fn same_position(&self, other: &Vertex) -> bool {
        self.x == other.x && self.y == other.y && self.z == other.z
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    /// `None` is the empty point, produced when coordinates are unusable.
    Point(Option<Vertex>),
    /// One path per part.
    Polyline(Vec<Vec<Vertex>>),
    /// One closed ring per part.
    Polygon(Vec<Vec<Vertex>>),
}

impl Geometry {
    pub fn shape(&self) -> GeometryShape {
        match self {
            Self::Point(_) => GeometryShape::Point,
            Self::Polyline(_) => GeometryShape::Polyline,
            Self::Polygon(_) => GeometryShape::Polygon,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Point(p) => p.is_none(),
            Self::Polyline(parts) | Self::Polygon(parts) => parts.iter().all(Vec::is_empty),
        }
    }

    /// Paths of a polyline or rings of a polygon. Empty for points.
    pub fn parts(&self) -> &[Vec<Vertex>] {
        match self {
            Self::Point(_) => &[],
            Self::Polyline(parts) | Self::Polygon(parts) => parts,
        }
    }

    pub fn vertices(&self) -> Box<dyn Iterator<Item = &Vertex> + '_> {
        match self {
            Self::Point(p) => Box::new(p.iter()),
            Self::Polyline(parts) | Self::Polygon(parts) => Box::new(parts.iter().flatten()),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices().count()
    }

    /// Z-aware when any vertex carries an elevation.
    pub fn has_z(&self) -> bool {
        self.vertices().any(|v| v.z.is_some())
    }

    pub fn envelope(&self) -> Option<Envelope> {
        let mut vertices = self.vertices();
        let first = vertices.next()?;
        let mut env = Envelope::new(first.x, first.y, first.x, first.y);
        for v in vertices {
            env.expand_to(v.x, v.y);
        }
        Some(env)
    }

    /// Apply `f` to every vertex, keeping the shape and part structure.
    pub fn map_vertices(&self, mut f: impl FnMut(&Vertex) -> Vertex) -> Geometry {
        match self {
            Self::Point(p) => Self::Point(p.as_ref().map(f)),
            Self::Polyline(parts) => Self::Polyline(
                parts.iter().map(|p| p.iter().map(&mut f).collect()).collect(),
            ),
            Self::Polygon(rings) => Self::Polygon(
                rings.iter().map(|r| r.iter().map(&mut f).collect()).collect(),
            ),
        }
    }

    /// 2D view for spatial predicates. `None` for empty geometries.
    pub fn to_geo(&self) -> Option<geo::Geometry<f64>> {
        if self.is_empty() {
            return None;
        }
        let coord = |v: &Vertex| geo::Coord { x: v.x, y: v.y };
        let line = |part: &Vec<Vertex>| geo::LineString::new(part.iter().map(coord).collect());
        match self {
            Self::Point(p) => p.as_ref().map(|v| geo::Geometry::Point(geo::Point(coord(v)))),
            Self::Polyline(parts) => Some(geo::Geometry::MultiLineString(
                geo::MultiLineString::new(parts.iter().filter(|p| !p.is_empty()).map(line).collect()),
            )),
            Self::Polygon(rings) => {
                // Rings too short to enclose an area are related as lines.
                let (areal, linear): (Vec<_>, Vec<_>) = rings
                    .iter()
                    .filter(|r| !r.is_empty())
                    .partition(|r| r.len() >= 4);
                let polygons: Vec<_> = areal
                    .into_iter()
                    .map(|r| geo::Polygon::new(line(r), Vec::new()))
                    .collect();
                if linear.is_empty() {
                    return Some(geo::Geometry::MultiPolygon(geo::MultiPolygon::new(polygons)));
                }
                let mut members: Vec<geo::Geometry<f64>> =
                    polygons.into_iter().map(geo::Geometry::Polygon).collect();
                members.extend(linear.into_iter().map(|r| geo::Geometry::LineString(line(r))));
                Some(geo::Geometry::GeometryCollection(geo::GeometryCollection(members)))
            }
        }
    }
}

/// Axis-aligned rectangle in the coordinates of its geometry (WGS84 degrees
/// for everything read from GPX).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl Envelope {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Empty when a coordinate is not finite or min exceeds max.
    pub fn is_empty(&self) -> bool {
        let finite = [self.xmin, self.ymin, self.xmax, self.ymax]
            .iter()
            .all(|c| c.is_finite());
        !finite || self.xmin > self.xmax || self.ymin > self.ymax
    }

    /// Empty, or collapsed to a line or a point.
    pub fn is_degenerate(&self) -> bool {
        self.is_empty() || self.xmin == self.xmax || self.ymin == self.ymax
    }

    /// Longitudes within ±180, latitudes within ±90, min ≤ max.
    pub fn is_valid_geographic(&self) -> bool {
        !self.is_empty()
            && (-180.0..=180.0).contains(&self.xmin)
            && (-180.0..=180.0).contains(&self.xmax)
            && (-90.0..=90.0).contains(&self.ymin)
            && (-90.0..=90.0).contains(&self.ymax)
    }

    pub fn expand_to(&mut self, x: f64, y: f64) {
        self.xmin = self.xmin.min(x);
        self.ymin = self.ymin.min(y);
        self.xmax = self.xmax.max(x);
        self.ymax = self.ymax.max(y);
    }

    /// Closed-interval overlap test.
    pub fn intersects(&self, other: &Envelope) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.xmin <= other.xmax
            && other.xmin <= self.xmax
            && self.ymin <= other.ymax
            && other.ymin <= self.ymax
    }

    pub fn to_geo(&self) -> geo::Geometry<f64> {
        geo::Geometry::Rect(geo::Rect::new(
            geo::Coord {
                x: self.xmin,
                y: self.ymin,
            },
            geo::Coord {
                x: self.xmax,
                y: self.ymax,
            },
        ))
    }

    pub fn to_vec(&self) -> Vec<f64> {
        vec![self.xmin, self.ymin, self.xmax, self.ymax]
    }
}

/// Parse a coordinate or measurement. Blank, unparsable and non-finite text
/// yields `None`.
pub(crate) fn parse_double(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// `lon`/`lat` attributes and the `ele` child of a point element.
pub(crate) fn read_vertex(tree: &XmlTree, id: NodeId) -> Option<Vertex> {
    let element = tree.element(id);
    let x = element.attribute("lon").and_then(parse_double)?;
    let y = element.attribute("lat").and_then(parse_double)?;
    let z = tree
        .child(id, ElementKind::Ele)
        .and_then(|ele| parse_double(&tree.text(ele)));
    Some(Vertex { x, y, z })
}

/// Point geometry of a `wpt`, `rtept` or `trkpt` element.
pub fn build_point(tree: &XmlTree, id: NodeId) -> Geometry {
    Geometry::Point(read_vertex(tree, id))
}

/// Geometry of `shape` for the element `id`.
///
/// Points come from `wpt`/`rtept`/`trkpt`; polylines and polygons from
/// `rte` (one part of `rtept`s) or `trk` (one part per `trkseg`). Any other
/// combination is a contract violation.
pub fn build(tree: &XmlTree, id: NodeId, shape: GeometryShape) -> Result<Geometry> {
    let element = tree.element(id);
    match (shape, element.kind) {
        (GeometryShape::Point, Some(kind)) if kind.is_point() => Ok(build_point(tree, id)),
        (GeometryShape::Polyline, Some(ElementKind::Rte | ElementKind::Trk)) => {
            Ok(Geometry::Polyline(build_parts(tree, id)))
        }
        (GeometryShape::Polygon, Some(ElementKind::Rte | ElementKind::Trk)) => {
            let mut rings = build_parts(tree, id);
            rings.iter_mut().for_each(close_ring);
            Ok(Geometry::Polygon(rings))
        }
        _ => Err(GpxTableError::InvalidArgument(format!(
            "cannot build a {shape:?} from <{}>",
            element.name
        ))),
    }
}

fn build_parts(tree: &XmlTree, id: NodeId) -> Vec<Vec<Vertex>> {
    match tree.element(id).kind {
        Some(ElementKind::Rte) => {
            let path = build_path(tree, id, ElementKind::Rtept);
            if path.is_empty() { Vec::new() } else { vec![path] }
        }
        Some(ElementKind::Trk) => tree
            .children(id, ElementKind::Trkseg)
            .map(|seg| build_path(tree, seg, ElementKind::Trkpt))
            .filter(|path| !path.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// Vertices of the `point_kind` children of `id`. Points without usable
/// coordinates are left out of the path.
fn build_path(tree: &XmlTree, id: NodeId, point_kind: ElementKind) -> Vec<Vertex> {
    tree.children(id, point_kind)
        .filter_map(|pt| read_vertex(tree, pt))
        .collect()
}

/// Repeat the first vertex at the end unless the ring is already closed.
fn close_ring(ring: &mut Vec<Vertex>) {
    if let (Some(first), Some(last)) = (ring.first().copied(), ring.last()) {
        if ring.len() == 1 || !first.same_position(last) {
            ring.push(first);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_document;

    fn tree(body: &str) -> XmlTree {
        let xml = format!(r#"<gpx xmlns="http://www.topografix.com/GPX/1/1">{body}</gpx>"#);
        parse_document(xml.as_bytes(), &[]).unwrap()
    }

    fn first(tree: &XmlTree, kind: ElementKind) -> NodeId {
        tree.elements_of_kind(kind).next().unwrap()
    }

    #[test]
    fn test_point_with_elevation() {
        let t = tree(r#"<wpt lat="64.8" lon="-147.5"><ele>132.5</ele></wpt>"#);
        let g = build_point(&t, first(&t, ElementKind::Wpt));
        assert_eq!(g, Geometry::Point(Some(Vertex::with_z(-147.5, 64.8, 132.5))));
        assert!(g.has_z());
    }

    #[test]
    fn test_point_without_elevation_is_not_z_aware() {
        let t = tree(r#"<wpt lat="64.8" lon="-147.5"><ele>high</ele></wpt>"#);
        let g = build_point(&t, first(&t, ElementKind::Wpt));
        assert_eq!(g, Geometry::Point(Some(Vertex::new(-147.5, 64.8))));
        assert!(!g.has_z());
    }

    #[test]
    fn test_unparsable_coordinates_give_empty_point() {
        let t = tree(r#"<wpt lat="north" lon="-147.5"/><wpt lon="1"/>"#);
        for id in t.elements_of_kind(ElementKind::Wpt).collect::<Vec<_>>() {
            let g = build_point(&t, id);
            assert!(g.is_empty());
            assert_eq!(g.envelope(), None);
        }
    }

    #[test]
    fn test_route_polyline() {
        let t = tree(
            r#"<rte><rtept lat="1" lon="10"/><rtept lat="2" lon="20"/><rtept lat="3" lon="30"/></rte>"#,
        );
        let g = build(&t, first(&t, ElementKind::Rte), GeometryShape::Polyline).unwrap();
        assert_eq!(g.parts().len(), 1);
        let xs: Vec<f64> = g.parts()[0].iter().map(|v| v.x).collect();
        assert_eq!(xs, vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_closed_route_has_closing_vertex() {
        let t = tree(
            r#"<rte><rtept lat="1" lon="10"/><rtept lat="2" lon="20"/><rtept lat="3" lon="10"/></rte>"#,
        );
        let g = build(&t, first(&t, ElementKind::Rte), GeometryShape::Polygon).unwrap();
        assert_eq!(g.shape(), GeometryShape::Polygon);
        let ring = &g.parts()[0];
        assert_eq!(ring.len(), 4);
        assert_eq!(ring[0], ring[3]);
    }

    #[test]
    fn test_already_closed_ring_is_kept() {
        let t = tree(
            r#"<rte><rtept lat="1" lon="10"/><rtept lat="2" lon="20"/><rtept lat="3" lon="10"/><rtept lat="1" lon="10"/></rte>"#,
        );
        let g = build(&t, first(&t, ElementKind::Rte), GeometryShape::Polygon).unwrap();
        assert_eq!(g.parts()[0].len(), 4);
    }

    #[test]
    fn test_track_segments_stay_separate_parts() {
        let t = tree(
            r#"<trk>
  <trkseg><trkpt lat="1" lon="1"/><trkpt lat="2" lon="2"/></trkseg>
  <trkseg><trkpt lat="5" lon="5"/><trkpt lat="6" lon="6"/><trkpt lat="7" lon="5"/></trkseg>
</trk>"#,
        );
        let trk = first(&t, ElementKind::Trk);
        let line = build(&t, trk, GeometryShape::Polyline).unwrap();
        assert_eq!(line.parts().len(), 2);
        assert_eq!(line.parts()[0].len(), 2);
        assert_eq!(line.parts()[1].len(), 3);

        let polygon = build(&t, trk, GeometryShape::Polygon).unwrap();
        assert_eq!(polygon.parts().len(), 2);
        for ring in polygon.parts() {
            assert_eq!(ring.first(), ring.last());
        }
        assert_eq!(polygon.parts()[1].len(), 4);
    }

    #[test]
    fn test_invalid_vertices_and_empty_segments_skipped() {
        let t = tree(
            r#"<trk>
  <trkseg></trkseg>
  <trkseg><trkpt lat="x" lon="1"/><trkpt lat="2" lon="2"/><trkpt lat="3" lon="3"/></trkseg>
</trk>"#,
        );
        let g = build(&t, first(&t, ElementKind::Trk), GeometryShape::Polyline).unwrap();
        assert_eq!(g.parts().len(), 1);
        assert_eq!(g.vertex_count(), 2);
    }

    #[test]
    fn test_unsupported_combinations_fail() {
        let t = tree(r#"<wpt lat="1" lon="1"/><rte><rtept lat="1" lon="1"/></rte>"#);
        let wpt = first(&t, ElementKind::Wpt);
        let rte = first(&t, ElementKind::Rte);
        assert!(matches!(
            build(&t, wpt, GeometryShape::Polyline),
            Err(GpxTableError::InvalidArgument(_))
        ));
        assert!(matches!(
            build(&t, rte, GeometryShape::Point),
            Err(GpxTableError::InvalidArgument(_))
        ));
        assert!(matches!(
            build(&t, t.root(), GeometryShape::Polygon),
            Err(GpxTableError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_envelope_of_polyline() {
        let t = tree(r#"<rte><rtept lat="-5" lon="10"/><rtept lat="7" lon="-20"/></rte>"#);
        let g = build(&t, first(&t, ElementKind::Rte), GeometryShape::Polyline).unwrap();
        assert_eq!(g.envelope(), Some(Envelope::new(-20.0, -5.0, 10.0, 7.0)));
    }

    #[test]
    fn test_envelope_predicates() {
        assert!(Envelope::new(f64::NAN, 0.0, 1.0, 1.0).is_empty());
        assert!(Envelope::new(2.0, 0.0, 1.0, 1.0).is_empty());
        assert!(Envelope::new(1.0, 1.0, 1.0, 1.0).is_degenerate());
        assert!(!Envelope::new(0.0, 0.0, 1.0, 1.0).is_degenerate());
        assert!(!Envelope::new(-181.0, 0.0, 1.0, 1.0).is_valid_geographic());
        assert!(Envelope::new(0.0, 0.0, 1.0, 1.0).intersects(&Envelope::new(1.0, 1.0, 2.0, 2.0)));
        assert!(!Envelope::new(0.0, 0.0, 1.0, 1.0).intersects(&Envelope::new(1.5, 1.5, 2.0, 2.0)));
    }
}
