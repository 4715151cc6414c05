use thiserror::Error;

/// Failure converting between `GeoJSON`, planar shapes and WKB.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GeoError {
    #[error("invalid GeoJSON geometry: {0}")]
    InvalidGeometry(String),

    #[error("invalid WKB: {0}")]
    Wkb(String),
}

/// A mapping that cannot describe a `MapFish` resource.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MappingError {
    #[error("mapping `{class}` has {count} primary key columns, expected exactly one")]
    PrimaryKey { class: String, count: usize },

    #[error("mapping `{class}` has more than one geometry column: `{first}` and `{second}`")]
    MultipleGeometry {
        class: String,
        first: String,
        second: String,
    },

    #[error("mapping `{class}` declares property `{name}` twice")]
    DuplicateProperty { class: String, name: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        expected: &'static str,
        got: &'static str,
    },

    #[error("`{value}` is not a valid {expected}")]
    Parse {
        expected: &'static str,
        value: String,
    },

    #[error("`{0}` is not one of the allowed values")]
    NotInEnum(String),

    #[error("null is not allowed")]
    NullNotAllowed,

    #[error(transparent)]
    Geo(#[from] GeoError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("property `{property}`: {source}")]
    Property {
        property: String,
        #[source]
        source: ValueError,
    },

    #[error("feature id: {0}")]
    Id(#[source] ValueError),

    #[error(transparent)]
    Geo(#[from] GeoError),
}
