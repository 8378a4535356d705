//! Dataset extent: declared `<bounds>` when usable, otherwise a scan of
//! every waypoint, route point and track point.

use tracing::{debug, trace};

use crate::geometry::{Envelope, parse_double};
use crate::gpx_types::{ElementKind, GpxVersion};
use crate::parser::{NodeId, XmlTree};

const POINT_KINDS: [ElementKind; 3] = [ElementKind::Wpt, ElementKind::Trkpt, ElementKind::Rtept];

/// Envelope of the document, or `None` when it holds no valid coordinate.
pub fn bounds(tree: &XmlTree) -> Option<Envelope> {
    if let Some(declared) = declared_bounds(tree) {
        return Some(declared);
    }
    scan_points(tree)
}

/// `<bounds>` at the top level (GPX 1.0) or under `<metadata>` (GPX 1.1).
fn bounds_element(tree: &XmlTree) -> Option<NodeId> {
    let root = tree.root();
    match tree.version() {
        GpxVersion::V1_0 => tree.child(root, ElementKind::Bounds),
        GpxVersion::V1_1 => tree
            .child(root, ElementKind::Metadata)
            .and_then(|metadata| tree.child(metadata, ElementKind::Bounds)),
    }
}

fn declared_bounds(tree: &XmlTree) -> Option<Envelope> {
    let id = bounds_element(tree)?;
    let element = tree.element(id);
    let read = |name: &str| element.attribute(name).and_then(parse_double);

    let envelope = match (read("minlon"), read("minlat"), read("maxlon"), read("maxlat")) {
        (Some(xmin), Some(ymin), Some(xmax), Some(ymax)) => Envelope::new(xmin, ymin, xmax, ymax),
        _ => {
            debug!("declared bounds incomplete, scanning points");
            return None;
        }
    };
    if !envelope.is_valid_geographic() {
        debug!(?envelope, "declared bounds out of range, scanning points");
        return None;
    }
    Some(envelope)
}

fn scan_points(tree: &XmlTree) -> Option<Envelope> {
    let mut extent: Option<Envelope> = None;
    for id in tree.elements_of_kinds(&POINT_KINDS) {
        let Some((lon, lat)) = coordinate_pair(tree, id) else {
            trace!(node = id, "skipping point without a valid coordinate pair");
            continue;
        };
        match extent.as_mut() {
            Some(env) => env.expand_to(lon, lat),
            None => extent = Some(Envelope::new(lon, lat, lon, lat)),
        }
    }
    extent
}

/// Both values or neither: an invalid half discards the whole pair.
fn coordinate_pair(tree: &XmlTree, id: NodeId) -> Option<(f64, f64)> {
    let element = tree.element(id);
    let lon = element.attribute("lon").and_then(parse_double)?;
    let lat = element.attribute("lat").and_then(parse_double)?;
    ((-180.0..=180.0).contains(&lon) && (-90.0..=90.0).contains(&lat)).then_some((lon, lat))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_document;

    fn gpx11(body: &str) -> XmlTree {
        let xml = format!(r#"<gpx xmlns="http://www.topografix.com/GPX/1/1">{body}</gpx>"#);
        parse_document(xml.as_bytes(), &[]).unwrap()
    }

    #[test]
    fn test_single_waypoint() {
        let t = gpx11(r#"<wpt lat="64.8" lon="-147.5"/>"#);
        assert_eq!(bounds(&t), Some(Envelope::new(-147.5, 64.8, -147.5, 64.8)));
    }

    #[test]
    fn test_declared_bounds_win() {
        let t = gpx11(
            r#"<metadata><bounds minlat="10" minlon="20" maxlat="11" maxlon="21"/></metadata>
<wpt lat="0" lon="0"/>"#,
        );
        assert_eq!(bounds(&t), Some(Envelope::new(20.0, 10.0, 21.0, 11.0)));
    }

    #[test]
    fn test_reversed_declared_bounds_fall_back_to_scan() {
        let t = gpx11(
            r#"<metadata><bounds minlat="10" minlon="30" maxlat="11" maxlon="21"/></metadata>
<wpt lat="1" lon="2"/><wpt lat="3" lon="4"/>"#,
        );
        assert_eq!(bounds(&t), Some(Envelope::new(2.0, 1.0, 4.0, 3.0)));
    }

    #[test]
    fn test_incomplete_declared_bounds_fall_back_to_scan() {
        let t = gpx11(
            r#"<metadata><bounds minlat="10" minlon="20" maxlat="eleven" maxlon="21"/></metadata>
<wpt lat="1" lon="2"/>"#,
        );
        assert_eq!(bounds(&t), Some(Envelope::new(2.0, 1.0, 2.0, 1.0)));
    }

    #[test]
    fn test_top_level_bounds_ignored_in_gpx11() {
        let t = gpx11(r#"<bounds minlat="10" minlon="20" maxlat="11" maxlon="21"/><wpt lat="1" lon="2"/>"#);
        assert_eq!(bounds(&t), Some(Envelope::new(2.0, 1.0, 2.0, 1.0)));
    }

    #[test]
    fn test_gpx10_top_level_bounds() {
        let xml = r#"<gpx xmlns="http://www.topografix.com/GPX/1/0">
<bounds minlat="-1" minlon="-2" maxlat="1" maxlon="2"/><wpt lat="50" lon="50"/></gpx>"#;
        let t = parse_document(xml.as_bytes(), &[]).unwrap();
        assert_eq!(bounds(&t), Some(Envelope::new(-2.0, -1.0, 2.0, 1.0)));
    }

    #[test]
    fn test_out_of_range_pair_dropped_entirely() {
        let t = gpx11(
            r#"<trk><trkseg><trkpt lat="10" lon="200"/><trkpt lat="5" lon="6"/><trkpt lat="7" lon="8"/></trkseg></trk>"#,
        );
        assert_eq!(bounds(&t), Some(Envelope::new(6.0, 5.0, 8.0, 7.0)));
    }

    #[test]
    fn test_scan_covers_every_point_kind() {
        let t = gpx11(
            r#"<wpt lat="1" lon="1"/>
<rte><rtept lat="-4" lon="9"/></rte>
<trk><trkseg><trkpt lat="6" lon="-3"/></trkseg></trk>"#,
        );
        assert_eq!(bounds(&t), Some(Envelope::new(-3.0, -4.0, 9.0, 6.0)));
    }

    #[test]
    fn test_no_valid_points() {
        let t = gpx11(r#"<wpt lat="x" lon="1"/><rte/>"#);
        assert_eq!(bounds(&t), None);
    }
}
