//! A GPX file opened as a dataset of feature classes.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use tracing::{info, warn};

use crate::bounds;
use crate::error::LoadError;
use crate::feature_class::{self, FeatureClass};
use crate::geometry::Envelope;
use crate::gpx_types::{FeatureClassKind, GpxVersion};
use crate::options::LoadOptions;
use crate::parser::{self, XmlTree};
use crate::source::GpxSource;

/// The parsed tree of a successfully loaded document, shared read-only by
/// its feature classes.
#[derive(Debug)]
pub(crate) struct LoadedDocument {
    tree: XmlTree,
    bounds: OnceLock<Option<Envelope>>,
}

impl LoadedDocument {
    pub(crate) fn parse(bytes: &[u8], ignored_prefixes: &[String]) -> Result<Self, LoadError> {
        Ok(Self {
            tree: parser::parse_document(bytes, ignored_prefixes)?,
            bounds: OnceLock::new(),
        })
    }

    pub(crate) fn tree(&self) -> &XmlTree {
        &self.tree
    }

    /// Computed on first use.
    pub(crate) fn bounds(&self) -> Option<Envelope> {
        *self.bounds.get_or_init(|| bounds::bounds(&self.tree))
    }
}

#[derive(Debug)]
enum LoadState {
    Loaded(Arc<LoadedDocument>),
    Failed(LoadError),
}

/// A GPX source presented as a set of feature classes.
///
/// Nothing is read until the first call that needs the document. The load
/// happens once; a source that cannot be read or is not GPX behaves as a
/// dataset with no feature classes. Open a new `GpxDocument` to pick up
/// changes to the file.
#[derive(Debug)]
pub struct GpxDocument {
    source: GpxSource,
    options: LoadOptions,
    state: OnceLock<LoadState>,
    classes: OnceLock<BTreeMap<FeatureClassKind, FeatureClass>>,
}

impl GpxDocument {
    pub fn new(source: impl Into<GpxSource>, options: LoadOptions) -> Self {
        Self {
            source: source.into(),
            options,
            state: OnceLock::new(),
            classes: OnceLock::new(),
        }
    }

    /// Open a path or URI with default options.
    pub fn open(location: &str) -> Self {
        Self::new(GpxSource::parse(location), LoadOptions::default())
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>, options: LoadOptions) -> Self {
        Self::new(GpxSource::Bytes(bytes.into()), options)
    }

    pub fn source(&self) -> &GpxSource {
        &self.source
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// File stem of the source.
    pub fn name(&self) -> String {
        self.source.name()
    }

    fn state(&self) -> &LoadState {
        self.state.get_or_init(|| {
            let loaded = self
                .source
                .read()
                .and_then(|bytes| LoadedDocument::parse(&bytes, &self.options.ignored_prefixes));
            match loaded {
                Ok(doc) => {
                    info!(source = %self.source, version = ?doc.tree.version(), "loaded GPX document");
                    LoadState::Loaded(Arc::new(doc))
                }
                Err(e) => {
                    warn!(source = %self.source, error = %e, "not a readable GPX document, presenting it as empty");
                    LoadState::Failed(e)
                }
            }
        })
    }

    fn loaded(&self) -> Option<&Arc<LoadedDocument>> {
        match self.state() {
            LoadState::Loaded(doc) => Some(doc),
            LoadState::Failed(_) => None,
        }
    }

    /// True when the source was read and validated as GPX.
    pub fn is_valid(&self) -> bool {
        self.loaded().is_some()
    }

    /// Why the document is empty, if it failed to load.
    pub fn load_error(&self) -> Option<&LoadError> {
        match self.state() {
            LoadState::Failed(e) => Some(e),
            LoadState::Loaded(_) => None,
        }
    }

    pub fn version(&self) -> Option<GpxVersion> {
        self.loaded().map(|doc| doc.tree.version())
    }

    /// Feature classes present in the document, keyed and ordered by kind.
    pub fn feature_classes(&self) -> &BTreeMap<FeatureClassKind, FeatureClass> {
        self.classes.get_or_init(|| {
            let Some(doc) = self.loaded() else {
                return BTreeMap::new();
            };
            match feature_class::materialize(doc, self.options.materialization) {
                Ok(classes) => classes,
                Err(e) => {
                    warn!(source = %self.source, error = %e, "feature classes could not be built");
                    BTreeMap::new()
                }
            }
        })
    }

    pub fn feature_class(&self, kind: FeatureClassKind) -> Option<&FeatureClass> {
        self.feature_classes().get(&kind)
    }

    /// Extent of every coordinate in the document. `None` when the document
    /// failed to load or has no valid coordinate.
    pub fn bounds(&self) -> Option<Envelope> {
        self.loaded().and_then(|doc| doc.bounds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE_WAYPOINT: &str = r#"<?xml version="1.0"?>
<gpx xmlns="http://www.topografix.com/GPX/1/1" version="1.1" creator="test">
  <wpt lat="64.8" lon="-147.5"><name>Fairbanks</name></wpt>
</gpx>"#;

    #[test]
    fn test_single_waypoint_document() {
        let doc = GpxDocument::from_bytes(ONE_WAYPOINT, LoadOptions::default());
        assert!(doc.is_valid());
        assert_eq!(doc.version(), Some(GpxVersion::V1_1));
        let kinds: Vec<_> = doc.feature_classes().keys().copied().collect();
        assert_eq!(kinds, vec![FeatureClassKind::Waypoints]);
        assert_eq!(doc.bounds(), Some(Envelope::new(-147.5, 64.8, -147.5, 64.8)));
    }

    #[test]
    fn test_missing_namespace_is_empty_dataset() {
        let doc = GpxDocument::from_bytes(r#"<gpx><wpt lat="1" lon="1"/></gpx>"#, LoadOptions::default());
        assert!(doc.feature_classes().is_empty());
        assert_eq!(doc.bounds(), None);
        assert_eq!(doc.version(), None);
        assert!(matches!(doc.load_error(), Some(LoadError::UnsupportedNamespace(_))));
    }

    #[test]
    fn test_malformed_xml_is_empty_dataset() {
        let doc = GpxDocument::from_bytes(
            r#"<gpx xmlns="http://www.topografix.com/GPX/1/1"><wpt lat="1" lon="1">"#,
            LoadOptions::default(),
        );
        assert!(!doc.is_valid());
        assert!(doc.feature_classes().is_empty());
        assert!(doc.load_error().is_some());
    }

    #[test]
    fn test_missing_file_is_empty_dataset() {
        let doc = GpxDocument::open("/no/such/dir/track.gpx");
        assert_eq!(doc.name(), "track");
        assert!(doc.feature_classes().is_empty());
        assert!(matches!(doc.load_error(), Some(LoadError::Io { .. })));
    }

    #[test]
    fn test_bounds_and_classes_are_memoized() {
        let doc = GpxDocument::from_bytes(ONE_WAYPOINT, LoadOptions::default());
        let first = doc.feature_classes() as *const _;
        let second = doc.feature_classes() as *const _;
        assert_eq!(first, second);

        // Bounds are filled in on first request and the same cell is read after.
        let loaded = doc.loaded().unwrap();
        assert!(loaded.bounds.get().is_none());
        let bounds = doc.bounds();
        let cell: *const Option<Envelope> = loaded.bounds.get().unwrap();
        assert_eq!(doc.bounds(), bounds);
        assert!(std::ptr::eq(loaded.bounds.get().unwrap(), cell));

        let class = doc.feature_class(FeatureClassKind::Waypoints).unwrap();
        assert_eq!(class.extent(), bounds);
        assert!(std::ptr::eq(loaded.bounds.get().unwrap(), cell));
    }

    #[test]
    fn test_lazy_documents_expose_same_classes() {
        let doc = GpxDocument::from_bytes(ONE_WAYPOINT, LoadOptions::lazy());
        let class = doc.feature_class(FeatureClassKind::Waypoints).unwrap();
        assert_eq!(class.row_count(), 1);
        assert_eq!(class.row(1).unwrap().unwrap().object_id(), 1);
    }
}
