//! Forward-only cursor over the rows of one feature class.
//!
//! A cursor is positioned on its first matching row when created. Every
//! call to [`Cursor::advance`] made while no further row exists fails with
//! [`GpxTableError::EndOfCursor`]; poll [`Cursor::is_finished`] to stop.

use std::borrow::Cow;
use std::collections::BTreeSet;

use crate::engine::{GeometryEngine, PlanarEngine, SpatialReference, SpatialRelationship};
use crate::error::{GpxTableError, Result};
use crate::feature_class::{FeatureClass, ObjectId, Row, Value};
use crate::geometry::{Envelope, Geometry};
use crate::options::{QueryFilter, SearchOrder};
use crate::schema::{OID_FIELD_INDEX, SHAPE_FIELD_INDEX};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ready,
    Exhausted,
}

/// Object ids a cursor visits.
#[derive(Debug)]
enum Candidates {
    /// Every row in object-id order.
    All,
    /// The single row of a fetch by id.
    One(ObjectId),
}

pub struct Cursor<'a, E: GeometryEngine = PlanarEngine> {
    class: &'a FeatureClass,
    engine: E,
    candidates: Candidates,
    ids: Option<BTreeSet<ObjectId>>,
    spatial: Option<(Envelope, SpatialRelationship)>,
    order: SearchOrder,
    output: Option<SpatialReference>,
    /// Object id the next search starts from.
    next: ObjectId,
    current: Option<Cow<'a, Row>>,
    /// Advance failure held back until the row before it has been yielded.
    pending: Option<GpxTableError>,
    state: State,
}

impl<'a> Cursor<'a> {
    /// Every row of `class`.
    pub fn all(class: &'a FeatureClass) -> Result<Self> {
        Self::with_engine(class, &QueryFilter::default(), PlanarEngine)
    }

    /// The row with object id `oid`, or nothing.
    pub fn by_id(class: &'a FeatureClass, oid: ObjectId) -> Result<Self> {
        Self::start(class, Candidates::One(oid), &QueryFilter::default(), PlanarEngine)
    }

    /// Rows not disjoint from `envelope`. A degenerate envelope selects all rows.
    pub fn by_envelope(class: &'a FeatureClass, envelope: Envelope) -> Result<Self> {
        Self::with_engine(class, &QueryFilter::default().with_envelope(envelope), PlanarEngine)
    }

    pub fn search(class: &'a FeatureClass, filter: &QueryFilter) -> Result<Self> {
        Self::with_engine(class, filter, PlanarEngine)
    }
}

impl<'a, E: GeometryEngine> Cursor<'a, E> {
    pub fn with_engine(class: &'a FeatureClass, filter: &QueryFilter, engine: E) -> Result<Self> {
        Self::start(class, Candidates::All, filter, engine)
    }

    fn start(
        class: &'a FeatureClass,
        candidates: Candidates,
        filter: &QueryFilter,
        engine: E,
    ) -> Result<Self> {
        filter.validate()?;
        let ids = (!filter.object_ids.is_empty())
            .then(|| filter.object_ids.iter().copied().collect::<BTreeSet<_>>());
        let first = match candidates {
            Candidates::All => ids.as_ref().and_then(|ids| ids.first().copied()).unwrap_or(1),
            Candidates::One(oid) => oid,
        };
        let mut cursor = Self {
            class,
            engine,
            candidates,
            ids,
            spatial: filter
                .spatial_filter()
                .map(|env| (*env, filter.spatial_relationship)),
            order: filter.search_order,
            output: filter
                .output_spatial_reference
                .filter(|sr| *sr != SpatialReference::Wgs84),
            next: first.max(1),
            current: None,
            pending: None,
            state: State::Ready,
        };
        cursor.seek()?;
        Ok(cursor)
    }

    pub fn class(&self) -> &'a FeatureClass {
        self.class
    }

    /// Coordinate system of the yielded geometries.
    pub fn output_spatial_reference(&self) -> SpatialReference {
        self.output.unwrap_or(SpatialReference::Wgs84)
    }

    pub fn is_finished(&self) -> bool {
        self.state == State::Exhausted
    }

    /// Move to the next matching row.
    pub fn advance(&mut self) -> Result<()> {
        if self.state == State::Exhausted {
            return Err(GpxTableError::EndOfCursor);
        }
        self.seek()?;
        if self.state == State::Exhausted {
            return Err(GpxTableError::EndOfCursor);
        }
        Ok(())
    }

    pub fn current_row(&self) -> Option<&Row> {
        self.current.as_deref()
    }

    pub fn current_geometry(&self) -> Result<&Geometry> {
        self.current
            .as_deref()
            .and_then(Row::geometry)
            .ok_or(GpxTableError::EndOfCursor)
    }

    /// Copy the current row's attribute values into `buffer` for every field
    /// whose `field_map` entry is not -1. Object id and shape are never
    /// copied; the object id is returned instead.
    pub fn current_values(&self, field_map: &[i32], buffer: &mut [Value]) -> Result<ObjectId> {
        let row = self.current.as_deref().ok_or(GpxTableError::EndOfCursor)?;
        if field_map.len() > row.values.len() || buffer.len() < field_map.len() {
            return Err(GpxTableError::InvalidArgument(format!(
                "field map of {} entries for a row of {} values into a buffer of {}",
                field_map.len(),
                row.values.len(),
                buffer.len()
            )));
        }
        for (i, &mapped) in field_map.iter().enumerate() {
            if mapped == -1 || i == OID_FIELD_INDEX || i == SHAPE_FIELD_INDEX {
                continue;
            }
            buffer[i] = row.values[i].clone();
        }
        Ok(row.object_id())
    }

    /// Position on the first matching row at or after `self.next`.
    fn seek(&mut self) -> Result<()> {
        self.current = None;
        let last = match self.candidates {
            Candidates::All => self.class.row_count() as ObjectId,
            Candidates::One(oid) => oid.min(self.class.row_count() as ObjectId),
        };
        while self.next <= last {
            let oid = self.next;
            self.next += 1;
            if self.matches(oid)? {
                let mut row = self.class.row(oid)?.ok_or_else(|| {
                    GpxTableError::InvalidArgument(format!("object id {oid} out of range"))
                })?;
                if let Some(target) = self.output {
                    let row = row.to_mut();
                    if let Some(geometry) = row.geometry_mut() {
                        *geometry = self.engine.project(geometry, target)?;
                    }
                }
                self.current = Some(row);
                if matches!(self.candidates, Candidates::One(_)) {
                    self.next = ObjectId::MAX;
                }
                return Ok(());
            }
        }
        self.state = State::Exhausted;
        Ok(())
    }

    fn matches(&self, oid: ObjectId) -> Result<bool> {
        Ok(match self.order {
            SearchOrder::Attribute => self.id_matches(oid) && self.spatial_matches(oid)?,
            SearchOrder::Spatial => self.spatial_matches(oid)? && self.id_matches(oid),
        })
    }

    fn id_matches(&self, oid: ObjectId) -> bool {
        self.ids.as_ref().is_none_or(|ids| ids.contains(&oid))
    }

    fn spatial_matches(&self, oid: ObjectId) -> Result<bool> {
        let Some((envelope, relation)) = &self.spatial else {
            return Ok(true);
        };
        Ok(self
            .class
            .geometry(oid)?
            .is_some_and(|g| self.engine.relates(envelope, &g, *relation)))
    }
}

impl<E: GeometryEngine> Iterator for Cursor<'_, E> {
    type Item = Result<Row>;

    /// Yields the current row, then advances. A failed advance is reported
    /// by the following call.
    fn next(&mut self) -> Option<Self::Item> {
        if let Some(e) = self.pending.take() {
            return Some(Err(e));
        }
        let row = self.current.take()?.into_owned();
        match self.advance() {
            Ok(()) | Err(GpxTableError::EndOfCursor) => {}
            Err(e) => {
                self.current = None;
                self.state = State::Exhausted;
                self.pending = Some(e);
            }
        }
        Some(Ok(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::GpxDocument;
    use crate::gpx_types::FeatureClassKind;
    use crate::options::LoadOptions;

    const FIVE_WAYPOINTS: &str = r#"<gpx xmlns="http://www.topografix.com/GPX/1/1">
  <wpt lat="0" lon="0"><name>a</name></wpt>
  <wpt lat="1" lon="1"><name>b</name></wpt>
  <wpt lat="2" lon="2"><name>c</name></wpt>
  <wpt lat="3" lon="3"><name>d</name></wpt>
  <wpt lat="4" lon="4"><name>e</name></wpt>
</gpx>"#;

    fn document(options: LoadOptions) -> GpxDocument {
        GpxDocument::from_bytes(FIVE_WAYPOINTS, options)
    }

    fn oids<E: GeometryEngine>(cursor: Cursor<'_, E>) -> Vec<ObjectId> {
        cursor.map(|row| row.unwrap().object_id()).collect()
    }

    #[test]
    fn test_fetch_all_in_oid_order() {
        let doc = document(LoadOptions::default());
        let class = doc.feature_class(FeatureClassKind::Waypoints).unwrap();
        assert_eq!(oids(Cursor::all(class).unwrap()), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_fetch_by_id_yields_one_record() {
        let doc = document(LoadOptions::default());
        let class = doc.feature_class(FeatureClassKind::Waypoints).unwrap();
        let mut cursor = Cursor::by_id(class, 2).unwrap();
        assert!(!cursor.is_finished());
        assert_eq!(cursor.current_row().unwrap().object_id(), 2);
        assert!(matches!(cursor.advance(), Err(GpxTableError::EndOfCursor)));
        assert!(cursor.is_finished());
    }

    #[test]
    fn test_fetch_by_missing_id_is_exhausted() {
        let doc = document(LoadOptions::default());
        let class = doc.feature_class(FeatureClassKind::Waypoints).unwrap();
        for oid in [0, 6, -3] {
            let cursor = Cursor::by_id(class, oid).unwrap();
            assert!(cursor.is_finished());
            assert!(cursor.current_row().is_none());
        }
    }

    #[test]
    fn test_end_of_cursor_every_time() {
        let doc = document(LoadOptions::default());
        let class = doc.feature_class(FeatureClassKind::Waypoints).unwrap();
        let mut cursor = Cursor::by_id(class, 5).unwrap();
        for _ in 0..3 {
            assert!(matches!(cursor.advance(), Err(GpxTableError::EndOfCursor)));
        }
        assert!(matches!(cursor.current_geometry(), Err(GpxTableError::EndOfCursor)));
    }

    #[test]
    fn test_fetch_by_envelope() {
        let doc = document(LoadOptions::default());
        let class = doc.feature_class(FeatureClassKind::Waypoints).unwrap();
        let cursor = Cursor::by_envelope(class, Envelope::new(0.5, 0.5, 3.0, 3.0)).unwrap();
        assert_eq!(oids(cursor), vec![2, 3, 4]);
    }

    #[test]
    fn test_degenerate_envelope_fetches_all() {
        let doc = document(LoadOptions::default());
        let class = doc.feature_class(FeatureClassKind::Waypoints).unwrap();
        let cursor = Cursor::by_envelope(class, Envelope::new(10.0, 10.0, 10.0, 10.0)).unwrap();
        assert_eq!(oids(cursor), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_search_order_does_not_change_results() {
        for options in [LoadOptions::default(), LoadOptions::lazy()] {
            let doc = document(options);
            let class = doc.feature_class(FeatureClassKind::Waypoints).unwrap();
            let filter = QueryFilter::default()
                .with_object_ids([5, 1, 3, 4])
                .with_envelope(Envelope::new(-1.0, -1.0, 2.5, 2.5));
            let attribute_first =
                oids(Cursor::search(class, &filter.clone().with_search_order(SearchOrder::Attribute)).unwrap());
            let spatial_first =
                oids(Cursor::search(class, &filter.with_search_order(SearchOrder::Spatial)).unwrap());
            assert_eq!(attribute_first, vec![1, 3]);
            assert_eq!(attribute_first, spatial_first);
        }
    }

    #[test]
    fn test_current_values_respects_field_map() {
        let doc = document(LoadOptions::default());
        let class = doc.feature_class(FeatureClassKind::Waypoints).unwrap();
        let cursor = Cursor::by_id(class, 3).unwrap();
        let width = class.fields().len();
        let mut field_map = vec![-1; width];
        field_map[0] = 0;
        field_map[1] = 1;
        field_map[2] = 2;
        let mut buffer = vec![Value::Null; width];

        let oid = cursor.current_values(&field_map, &mut buffer).unwrap();
        assert_eq!(oid, 3);
        assert_eq!(buffer[0], Value::Null);
        assert_eq!(buffer[1], Value::Null);
        assert_eq!(buffer[2], Value::String("c".into()));
        assert!(buffer[3..].iter().all(Value::is_null));

        let mut short = vec![Value::Null; 1];
        assert!(matches!(
            cursor.current_values(&field_map, &mut short),
            Err(GpxTableError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_projection_leaves_source_rows_untouched() {
        let doc = document(LoadOptions::default());
        let class = doc.feature_class(FeatureClassKind::Waypoints).unwrap();
        let filter = QueryFilter::default()
            .with_object_ids([5])
            .with_output_spatial_reference(SpatialReference::WebMercator);
        let cursor = Cursor::search(class, &filter).unwrap();
        let projected = cursor.current_geometry().unwrap().envelope().unwrap();
        assert!(projected.xmin > 400_000.0);

        let original = class.row(5).unwrap().unwrap();
        assert_eq!(original.geometry().unwrap().envelope(), Some(Envelope::new(4.0, 4.0, 4.0, 4.0)));
    }

    #[test]
    fn test_unsupported_projection_fails() {
        let doc = document(LoadOptions::default());
        let class = doc.feature_class(FeatureClassKind::Waypoints).unwrap();
        let filter = QueryFilter::default().with_output_spatial_reference(SpatialReference::Other(2193));
        assert!(matches!(
            Cursor::search(class, &filter),
            Err(GpxTableError::Projection { .. })
        ));
    }

    /// Projects rows west of `limit` and fails on the rest.
    struct WestOnlyEngine {
        limit: f64,
    }

    impl GeometryEngine for WestOnlyEngine {
        fn relates(&self, filter: &Envelope, geometry: &Geometry, relation: SpatialRelationship) -> bool {
            PlanarEngine.relates(filter, geometry, relation)
        }

        fn project(&self, geometry: &Geometry, target: SpatialReference) -> Result<Geometry> {
            match geometry.envelope() {
                Some(env) if env.xmin < self.limit => Ok(geometry.clone()),
                _ => Err(GpxTableError::Projection {
                    target: target.to_string(),
                    reason: "east of limit".into(),
                }),
            }
        }
    }

    #[test]
    fn test_failed_advance_still_yields_current_row() {
        let doc = document(LoadOptions::default());
        let class = doc.feature_class(FeatureClassKind::Waypoints).unwrap();
        let filter = QueryFilter::default().with_output_spatial_reference(SpatialReference::WebMercator);
        let mut cursor = Cursor::with_engine(class, &filter, WestOnlyEngine { limit: 2.0 }).unwrap();

        assert_eq!(cursor.next().unwrap().unwrap().object_id(), 1);
        assert_eq!(cursor.next().unwrap().unwrap().object_id(), 2);
        assert!(matches!(cursor.next(), Some(Err(GpxTableError::Projection { .. }))));
        assert!(cursor.next().is_none());
        assert!(cursor.is_finished());
    }

    #[test]
    fn test_where_clause_is_unsupported() {
        let doc = document(LoadOptions::default());
        let class = doc.feature_class(FeatureClassKind::Waypoints).unwrap();
        let filter = QueryFilter {
            where_clause: Some("name = 'a'".into()),
            ..QueryFilter::default()
        };
        assert!(matches!(Cursor::search(class, &filter), Err(GpxTableError::Unsupported(_))));
    }
}
