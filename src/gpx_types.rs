use serde::{Deserialize, Serialize};

pub const GPX10_NAMESPACE: &str = "http://www.topografix.com/GPX/1/0";
pub const GPX11_NAMESPACE: &str = "http://www.topografix.com/GPX/1/1";

/// GPX schema version, derived from the root element's default namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GpxVersion {
    #[serde(rename = "1.0")]
    V1_0,
    #[serde(rename = "1.1")]
    V1_1,
}

impl GpxVersion {
    pub fn from_namespace(uri: &str) -> Option<Self> {
        match uri {
            GPX10_NAMESPACE => Some(Self::V1_0),
            GPX11_NAMESPACE => Some(Self::V1_1),
            _ => None,
        }
    }

    pub fn namespace(self) -> &'static str {
        match self {
            Self::V1_0 => GPX10_NAMESPACE,
            Self::V1_1 => GPX11_NAMESPACE,
        }
    }
}

impl std::fmt::Display for GpxVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::V1_0 => f.write_str("1.0"),
            Self::V1_1 => f.write_str("1.1"),
        }
    }
}

/// GPX elements the engine looks up. Only elements in the document's GPX
/// namespace are tagged with a kind; anything else (vendor extensions,
/// unknown tags) stays untyped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Gpx,
    Metadata,
    Bounds,
    Wpt,
    Rte,
    Rtept,
    Trk,
    Trkseg,
    Trkpt,
    Name,
    Cmt,
    Desc,
    Src,
    Link,
    Url,
    Urlname,
    Type,
    Extensions,
    Number,
    Ele,
    Time,
    Magvar,
    Geoidheight,
    Sym,
    Fix,
    Sat,
    Hdop,
    Vdop,
    Pdop,
    Ageofdgpsdata,
    Dgpsid,
}

impl ElementKind {
    const ALL: [ElementKind; 31] = [
        Self::Gpx,
        Self::Metadata,
        Self::Bounds,
        Self::Wpt,
        Self::Rte,
        Self::Rtept,
        Self::Trk,
        Self::Trkseg,
        Self::Trkpt,
        Self::Name,
        Self::Cmt,
        Self::Desc,
        Self::Src,
        Self::Link,
        Self::Url,
        Self::Urlname,
        Self::Type,
        Self::Extensions,
        Self::Number,
        Self::Ele,
        Self::Time,
        Self::Magvar,
        Self::Geoidheight,
        Self::Sym,
        Self::Fix,
        Self::Sat,
        Self::Hdop,
        Self::Vdop,
        Self::Pdop,
        Self::Ageofdgpsdata,
        Self::Dgpsid,
    ];

    pub fn local_name(self) -> &'static str {
        match self {
            Self::Gpx => "gpx",
            Self::Metadata => "metadata",
            Self::Bounds => "bounds",
            Self::Wpt => "wpt",
            Self::Rte => "rte",
            Self::Rtept => "rtept",
            Self::Trk => "trk",
            Self::Trkseg => "trkseg",
            Self::Trkpt => "trkpt",
            Self::Name => "name",
            Self::Cmt => "cmt",
            Self::Desc => "desc",
            Self::Src => "src",
            Self::Link => "link",
            Self::Url => "url",
            Self::Urlname => "urlname",
            Self::Type => "type",
            Self::Extensions => "extensions",
            Self::Number => "number",
            Self::Ele => "ele",
            Self::Time => "time",
            Self::Magvar => "magvar",
            Self::Geoidheight => "geoidheight",
            Self::Sym => "sym",
            Self::Fix => "fix",
            Self::Sat => "sat",
            Self::Hdop => "hdop",
            Self::Vdop => "vdop",
            Self::Pdop => "pdop",
            Self::Ageofdgpsdata => "ageofdgpsdata",
            Self::Dgpsid => "dgpsid",
        }
    }

    pub fn from_local_name(name: &[u8]) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.local_name().as_bytes() == name)
    }

    /// `wpt`, `rtept` and `trkpt` all share the waypoint schema.
    pub fn is_point(self) -> bool {
        matches!(self, Self::Wpt | Self::Rtept | Self::Trkpt)
    }
}

/// Shape of the geometry column of a feature class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryShape {
    Point,
    Polyline,
    Polygon,
}

/// The seven feature classes a GPX file can expose.
///
/// Declaration order is the order classes are reported in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum FeatureClassKind {
    Waypoints,
    RoutePoints,
    TrackPoints,
    Routes,
    Tracks,
    ClosedRoutes,
    ClosedTracks,
}

impl FeatureClassKind {
    pub const ALL: [FeatureClassKind; 7] = [
        Self::Waypoints,
        Self::RoutePoints,
        Self::TrackPoints,
        Self::Routes,
        Self::Tracks,
        Self::ClosedRoutes,
        Self::ClosedTracks,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Waypoints => "Waypoints",
            Self::RoutePoints => "RoutePoints",
            Self::TrackPoints => "TrackPoints",
            Self::Routes => "Routes",
            Self::Tracks => "Tracks",
            Self::ClosedRoutes => "ClosedRoutes",
            Self::ClosedTracks => "ClosedTracks",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// The element each record of this class is read from.
    pub fn element(self) -> ElementKind {
        match self {
            Self::Waypoints => ElementKind::Wpt,
            Self::RoutePoints => ElementKind::Rtept,
            Self::TrackPoints => ElementKind::Trkpt,
            Self::Routes | Self::ClosedRoutes => ElementKind::Rte,
            Self::Tracks | Self::ClosedTracks => ElementKind::Trk,
        }
    }

    pub fn shape(self) -> GeometryShape {
        match self {
            Self::Waypoints | Self::RoutePoints | Self::TrackPoints => GeometryShape::Point,
            Self::Routes | Self::Tracks => GeometryShape::Polyline,
            Self::ClosedRoutes | Self::ClosedTracks => GeometryShape::Polygon,
        }
    }
}

impl std::fmt::Display for FeatureClassKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
