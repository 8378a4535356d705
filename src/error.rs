use thiserror::Error;
use wasm_bindgen::JsValue;

/// Why a GPX source could not be presented as a dataset.
///
/// These never reach callers of [`crate::GpxDocument`]: a failed load turns
/// the document into an empty dataset. They are kept for diagnostics.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported URI scheme '{scheme}' in {uri}")]
    UnsupportedScheme { scheme: String, uri: String },
    #[error("remote fetch of {uri} failed: {message}")]
    Remote { uri: String, message: String },
    #[error("document is not valid UTF-8")]
    Encoding(#[from] std::str::Utf8Error),
    #[error("XML parse error: {0}")]
    XmlParse(#[from] quick_xml::Error),
    #[error("XML attribute error: {0}")]
    XmlAttribute(#[from] quick_xml::events::attributes::AttrError),
    #[error("undeclared namespace prefix '{0}'")]
    UndeclaredPrefix(String),
    #[error("element <{0}> is never closed")]
    UnclosedElement(String),
    #[error("document has more than one root element")]
    MultipleRoots,
    #[error("document has no root element")]
    NoRoot,
    #[error("root element is <{0}>, expected <gpx>")]
    NotGpx(String),
    #[error("unsupported GPX namespace '{0}'")]
    UnsupportedNamespace(String),
}

/// Errors surfaced to callers of the feature-table API.
#[derive(Debug, Error)]
pub enum GpxTableError {
    /// A programming contract was violated (bad class index, shape/element
    /// combination that cannot exist).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The cursor has no current record. Raised on every advance past the end.
    #[error("end of cursor")]
    EndOfCursor,
    /// A request the provider deliberately does not implement.
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("cannot project to {target}: {reason}")]
    Projection { target: String, reason: String },
}

pub type Result<T> = std::result::Result<T, GpxTableError>;

impl From<GpxTableError> for JsValue {
    fn from(e: GpxTableError) -> Self {
        JsValue::from_str(&e.to_string())
    }
}
