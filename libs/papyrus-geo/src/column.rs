//! Entity-independent column metadata.

use std::collections::BTreeMap;
use std::fmt;

/// Geometry subtype declared for a geometry column.
///
/// `Geometry` is the untyped column; it stores any shape but has no GML
/// property type of its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GeometryType {
    Geometry,
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    GeometryCollection,
    Curve,
}

impl GeometryType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            GeometryType::Geometry => "Geometry",
            GeometryType::Point => "Point",
            GeometryType::LineString => "LineString",
            GeometryType::Polygon => "Polygon",
            GeometryType::MultiPoint => "MultiPoint",
            GeometryType::MultiLineString => "MultiLineString",
            GeometryType::MultiPolygon => "MultiPolygon",
            GeometryType::GeometryCollection => "GeometryCollection",
            GeometryType::Curve => "Curve",
        }
    }
}

impl fmt::Display for GeometryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical column types.
///
/// Drives JSON coercion on writes, query-string coercion in filters and the
/// XSD element type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    SmallInt,
    Int,
    BigInt,
    Float,
    Double,
    Decimal {
        precision: Option<u32>,
        scale: Option<u32>,
    },
    String {
        max_len: Option<u32>,
    },
    Bool,
    Date,
    Time,
    DateTime,
    DateTimeUtc,
    Interval,
    Binary,
    Uuid,
    Json,
    Enum(Vec<String>),
    Geometry {
        geometry_type: GeometryType,
        srid: i32,
    },
}

impl ColumnKind {
    #[must_use]
    pub fn geometry(geometry_type: GeometryType, srid: i32) -> Self {
        ColumnKind::Geometry {
            geometry_type,
            srid,
        }
    }

    #[must_use]
    pub fn is_geometry(&self) -> bool {
        matches!(self, ColumnKind::Geometry { .. })
    }

    #[must_use]
    pub fn srid(&self) -> Option<i32> {
        match self {
            ColumnKind::Geometry { srid, .. } => Some(*srid),
            _ => None,
        }
    }

    /// Short name used in error messages.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ColumnKind::SmallInt | ColumnKind::Int | ColumnKind::BigInt => "integer",
            ColumnKind::Float | ColumnKind::Double => "float",
            ColumnKind::Decimal { .. } => "decimal",
            ColumnKind::String { .. } => "string",
            ColumnKind::Bool => "boolean",
            ColumnKind::Date => "date",
            ColumnKind::Time => "time",
            ColumnKind::DateTime | ColumnKind::DateTimeUtc => "datetime",
            ColumnKind::Interval => "interval",
            ColumnKind::Binary => "base64 binary",
            ColumnKind::Uuid => "uuid",
            ColumnKind::Json => "json",
            ColumnKind::Enum(_) => "enum",
            ColumnKind::Geometry { .. } => "geometry",
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Column metadata as seen by the record, the filters and the XSD generator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Property name in features; also the key in query parameters.
    pub name: String,
    pub kind: ColumnKind,
    pub nullable: bool,
    pub primary_key: bool,
    pub foreign_key: bool,
    /// Free-form annotations, e.g. `readonly=true`, read by XSD callbacks.
    pub info: BTreeMap<String, String>,
}

impl ColumnInfo {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: false,
            primary_key: false,
            foreign_key: false,
            info: BTreeMap::new(),
        }
    }
}
