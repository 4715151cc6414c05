//! XML schema (XSD) of a mapped resource, as consumed by `MapFish` clients to
//! build edit forms.

use std::sync::Arc;

use bytes::Bytes;
use papyrus_geo::{ColumnInfo, ColumnKind, GeometryType, MappingSchema};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use thiserror::Error;

use crate::Rendered;

pub const APPLICATION_XML: &str = "application/xml";

const GML_NS: &str = "http://www.opengis.net/gml";
const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum XsdError {
    #[error("column `{column}` of type `{kind}` has no XSD equivalent")]
    UnsupportedColumnType { column: String, kind: String },

    #[error("cannot write XSD: {0}")]
    Write(String),
}

/// Adds elements after the mapped columns, e.g. for virtual properties.
pub type SequenceCallback =
    Arc<dyn Fn(&mut XsdWriter, &MappingSchema) -> Result<(), XsdError> + Send + Sync>;

/// Adds children to a column's `xsd:element`, e.g. an annotation.
pub type ElementCallback =
    Arc<dyn Fn(&mut XsdWriter, &ColumnInfo) -> Result<(), XsdError> + Send + Sync>;

/// Thin element writer handed to the callbacks.
pub struct XsdWriter {
    inner: Writer<Vec<u8>>,
}

impl XsdWriter {
    fn new() -> Self {
        Self {
            inner: Writer::new(Vec::new()),
        }
    }

    fn write(&mut self, event: Event<'_>) -> Result<(), XsdError> {
        self.inner
            .write_event(event)
            .map_err(|e| XsdError::Write(e.to_string()))
    }

    /// # Errors
    /// `XsdError::Write` when the event cannot be written.
    pub fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), XsdError> {
        let tag = BytesStart::new(name).with_attributes(attrs.iter().copied());
        self.write(Event::Start(tag))
    }

    /// # Errors
    /// `XsdError::Write` when the event cannot be written.
    pub fn end(&mut self, name: &str) -> Result<(), XsdError> {
        self.write(Event::End(BytesEnd::new(name)))
    }

    /// Write a childless element.
    ///
    /// # Errors
    /// `XsdError::Write` when the event cannot be written.
    pub fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), XsdError> {
        let tag = BytesStart::new(name).with_attributes(attrs.iter().copied());
        self.write(Event::Empty(tag))
    }

    /// Write `name` around whatever `body` writes.
    ///
    /// # Errors
    /// `XsdError::Write`, or the error returned by `body`.
    pub fn tag<F>(&mut self, name: &str, attrs: &[(&str, &str)], body: F) -> Result<(), XsdError>
    where
        F: FnOnce(&mut Self) -> Result<(), XsdError>,
    {
        self.start(name, attrs)?;
        body(self)?;
        self.end(name)
    }

    fn into_inner(self) -> Vec<u8> {
        self.inner.into_inner()
    }
}

/// How a column is typed in the schema.
enum XsdType {
    Named(&'static str),
    /// `xsd:simpleType/xsd:restriction` with one facet element per entry.
    Restriction {
        base: &'static str,
        facets: Vec<(&'static str, String)>,
    },
}

fn gml_type(geometry_type: GeometryType) -> Option<&'static str> {
    Some(match geometry_type {
        GeometryType::Point => "gml:PointPropertyType",
        GeometryType::LineString => "gml:LineStringPropertyType",
        GeometryType::Polygon => "gml:PolygonPropertyType",
        GeometryType::MultiPoint => "gml:MultiPointPropertyType",
        GeometryType::MultiLineString => "gml:MultiLineStringPropertyType",
        GeometryType::MultiPolygon => "gml:MultiPolygonPropertyType",
        GeometryType::GeometryCollection => "gml:GeometryCollectionPropertyType",
        GeometryType::Curve => "gml:CurvePropertyType",
        GeometryType::Geometry => return None,
    })
}

fn xsd_type(kind: &ColumnKind) -> Option<XsdType> {
    let named = |t: &'static str| Some(XsdType::Named(t));
    match kind {
        ColumnKind::SmallInt | ColumnKind::Int | ColumnKind::BigInt => named("xsd:integer"),
        ColumnKind::Float | ColumnKind::Double => named("xsd:double"),
        ColumnKind::Bool => named("xsd:boolean"),
        ColumnKind::Date => named("xsd:date"),
        ColumnKind::Time => named("xsd:time"),
        ColumnKind::DateTime | ColumnKind::DateTimeUtc => named("xsd:dateTime"),
        ColumnKind::Interval => named("xsd:duration"),
        ColumnKind::Binary => named("xsd:base64Binary"),
        ColumnKind::Geometry { geometry_type, .. } => gml_type(*geometry_type).and_then(named),
        ColumnKind::Enum(choices) => Some(XsdType::Restriction {
            base: "xsd:string",
            facets: choices
                .iter()
                .map(|c| ("xsd:enumeration", c.clone()))
                .collect(),
        }),
        ColumnKind::Decimal {
            precision: None,
            scale: None,
        } => named("xsd:decimal"),
        ColumnKind::Decimal { precision, scale } => {
            let mut facets = Vec::new();
            if let Some(scale) = scale {
                facets.push(("xsd:fractionDigits", scale.to_string()));
            }
            if let Some(precision) = precision {
                facets.push(("xsd:totalDigits", precision.to_string()));
            }
            Some(XsdType::Restriction {
                base: "xsd:decimal",
                facets,
            })
        }
        ColumnKind::String { max_len: None } => named("xsd:string"),
        ColumnKind::String {
            max_len: Some(len),
        } => Some(XsdType::Restriction {
            base: "xsd:string",
            facets: vec![("xsd:maxLength", len.to_string())],
        }),
        ColumnKind::Uuid | ColumnKind::Json => None,
    }
}

/// Builds the XSD of a [`MappingSchema`].
///
/// Primary and foreign key columns are left out unless asked for.
#[derive(Clone, Default)]
pub struct XsdGenerator {
    include_primary_keys: bool,
    include_foreign_keys: bool,
    sequence_callback: Option<SequenceCallback>,
    element_callback: Option<ElementCallback>,
}

impl XsdGenerator {
    #[must_use]
    pub fn include_primary_keys(mut self, yes: bool) -> Self {
        self.include_primary_keys = yes;
        self
    }

    #[must_use]
    pub fn include_foreign_keys(mut self, yes: bool) -> Self {
        self.include_foreign_keys = yes;
        self
    }

    #[must_use]
    pub fn with_sequence_callback(mut self, cb: SequenceCallback) -> Self {
        self.sequence_callback = Some(cb);
        self
    }

    #[must_use]
    pub fn with_element_callback(mut self, cb: ElementCallback) -> Self {
        self.element_callback = Some(cb);
        self
    }

    fn column_xsd(&self, w: &mut XsdWriter, column: &ColumnInfo) -> Result<(), XsdError> {
        let xsd = xsd_type(&column.kind).ok_or_else(|| XsdError::UnsupportedColumnType {
            column: column.name.clone(),
            kind: column.kind.to_string(),
        })?;

        let mut attrs = vec![("name", column.name.as_str())];
        if column.nullable {
            attrs.push(("minOccurs", "0"));
            attrs.push(("nillable", "true"));
        }

        match &xsd {
            XsdType::Named(t) => {
                attrs.push(("type", *t));
                match &self.element_callback {
                    None => w.empty("xsd:element", &attrs),
                    Some(cb) => w.tag("xsd:element", &attrs, |w| cb(w, column)),
                }
            }
            XsdType::Restriction { base, facets } => w.tag("xsd:element", &attrs, |w| {
                w.tag("xsd:simpleType", &[], |w| {
                    w.tag("xsd:restriction", &[("base", *base)], |w| {
                        facets
                            .iter()
                            .try_for_each(|(facet, value)| w.empty(facet, &[("value", value.as_str())]))
                    })
                })?;
                match &self.element_callback {
                    Some(cb) => cb(w, column),
                    None => Ok(()),
                }
            }),
        }
    }

    fn includes(&self, column: &ColumnInfo) -> bool {
        (self.include_primary_keys || !column.primary_key)
            && (self.include_foreign_keys || !column.foreign_key)
    }

    /// The schema document for `schema`, UTF-8 encoded.
    ///
    /// # Errors
    /// `XsdError::UnsupportedColumnType` for a column kind with no XSD
    /// counterpart (UUID, JSON, untyped geometry), or a callback error.
    pub fn get_class_xsd(&self, schema: &MappingSchema) -> Result<Vec<u8>, XsdError> {
        let mut w = XsdWriter::new();
        w.write(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        w.tag(
            "xsd:schema",
            &[("xmlns:gml", GML_NS), ("xmlns:xsd", XSD_NS)],
            |w| {
                w.tag("xsd:complexType", &[("name", schema.class_name.as_str())], |w| {
                    w.tag("xsd:complexContent", &[], |w| {
                        w.tag(
                            "xsd:extension",
                            &[("base", "gml:AbstractFeatureType")],
                            |w| {
                                w.tag("xsd:sequence", &[], |w| {
                                    for column in schema.columns.iter().filter(|c| self.includes(c))
                                    {
                                        self.column_xsd(w, column)?;
                                    }
                                    match &self.sequence_callback {
                                        Some(cb) => cb(w, schema),
                                        None => Ok(()),
                                    }
                                })
                            },
                        )
                    })
                })
            },
        )?;
        tracing::debug!(class = %schema.class_name, "rendered XSD");
        Ok(w.into_inner())
    }

    /// # Errors
    /// See [`XsdGenerator::get_class_xsd`].
    pub fn render(&self, schema: &MappingSchema) -> Result<Rendered, XsdError> {
        Ok(Rendered {
            content_type: APPLICATION_XML.to_owned(),
            body: Bytes::from(self.get_class_xsd(schema)?),
        })
    }
}
