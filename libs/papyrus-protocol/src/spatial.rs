//! "Within distance" predicates, one per spatial SQL dialect.
//!
//! Every dialect expresses `distance(column, geometry) <= tolerance` in the
//! form its spatial functions understand. The input geometry is bound as WKB
//! together with its EPSG code. Geometry columns hold plain WKB, so the
//! column is decoded with the column's SRID before any spatial function sees
//! it. Oracle is the exception: its operators need a native `SDO_GEOMETRY`
//! column.

use papyrus_geo::Shape;
use papyrus_geo::adapter::{envelope, expanded_envelope, to_wkb};
use sea_orm::DbBackend;
use sea_orm::Value;
use sea_orm::sea_query::{Alias, Expr, Func, Query, SimpleExpr};
use serde::{Deserialize, Serialize};

use crate::error::FilterError;

/// Extra arguments for Oracle's distance operators.
///
/// `tol` or `dim1`/`dim2` are only consulted when the column is reprojected,
/// as `SDO_GEOM.WITHIN_DISTANCE` cannot use the spatial index.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleParams {
    /// Appended to the distance parameter string, e.g. `unit=km`.
    pub params: String,
    pub tol: Option<f64>,
    /// DIMINFO SQL of the reprojected column.
    pub dim1: Option<String>,
    /// DIMINFO SQL of the request geometry.
    pub dim2: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SpatialDialect {
    PostGis,
    MySql,
    Spatialite {
        /// The column has an R*Tree index named `idx_<table>_<column>`.
        #[serde(default)]
        spatial_index: bool,
    },
    Oracle(OracleParams),
}

/// The geometry column a predicate applies to.
#[derive(Clone, Copy, Debug)]
pub struct SpatialTarget<'a> {
    pub table: &'a str,
    pub column: &'a str,
    pub srid: i32,
}

/// `MySQL` reads geographic WKB as latitude first unless told otherwise.
const MYSQL_AXIS_ORDER: &str = "axis-order=long-lat";

fn val<V: Into<Value>>(v: V) -> SimpleExpr {
    SimpleExpr::Value(v.into())
}

fn call<I: IntoIterator<Item = SimpleExpr>>(name: &str, args: I) -> SimpleExpr {
    let mut func = Func::cust(Alias::new(name));
    for arg in args {
        func = func.arg(arg);
    }
    SimpleExpr::FunctionCall(func)
}

fn wkb(shape: &Shape) -> Result<SimpleExpr, FilterError> {
    to_wkb(shape)
        .map(val)
        .map_err(|e| FilterError::InvalidParam {
            param: "geometry",
            reason: e.to_string(),
        })
}

fn empty_geometry() -> FilterError {
    FilterError::InvalidParam {
        param: "geometry",
        reason: "geometry is empty".to_owned(),
    }
}

impl SpatialDialect {
    /// Default dialect of a connection backend. Spatialite is assumed to
    /// have no spatial index.
    #[must_use]
    pub fn for_backend(backend: DbBackend) -> Self {
        match backend {
            DbBackend::Postgres => SpatialDialect::PostGis,
            DbBackend::MySql => SpatialDialect::MySql,
            DbBackend::Sqlite => SpatialDialect::Spatialite {
                spatial_index: false,
            },
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            SpatialDialect::PostGis => "postgis",
            SpatialDialect::MySql => "mysql",
            SpatialDialect::Spatialite { .. } => "spatialite",
            SpatialDialect::Oracle(_) => "oracle",
        }
    }

    /// The column of `target` as a geometry in the column's SRID.
    fn stored_geometry(&self, target: SpatialTarget<'_>) -> SimpleExpr {
        let column: SimpleExpr =
            Expr::col((Alias::new(target.table), Alias::new(target.column))).into();
        match self {
            SpatialDialect::PostGis => call("ST_GeomFromWKB", [column, val(target.srid)]),
            SpatialDialect::MySql => call(
                "ST_GeomFromWKB",
                [column, val(target.srid), val(MYSQL_AXIS_ORDER)],
            ),
            SpatialDialect::Spatialite { .. } => call("GeomFromWKB", [column, val(target.srid)]),
            SpatialDialect::Oracle(_) => column,
        }
    }

    /// Predicate "`target` lies within `tolerance` of `shape`".
    ///
    /// `epsg` is the SRID of `shape`; when it differs from the column's SRID
    /// the column is transformed first.
    ///
    /// # Errors
    /// - `FilterError::InvalidParam` when `shape` is empty or cannot be
    ///   encoded
    /// - `FilterError::OracleParamsMissing` for a reprojected Oracle column
    ///   without `tol` or `dim1`/`dim2`
    pub fn within_distance(
        &self,
        target: SpatialTarget<'_>,
        shape: &Shape,
        tolerance: f64,
        epsg: i32,
    ) -> Result<SimpleExpr, FilterError> {
        let reproject = epsg != target.srid;
        let column = self.stored_geometry(target);

        let predicate = match self {
            SpatialDialect::PostGis => {
                let column = if reproject {
                    call("ST_Transform", [column, val(epsg)])
                } else {
                    column
                };
                call(
                    "ST_DWithin",
                    [
                        column,
                        call("ST_GeomFromWKB", [wkb(shape)?, val(epsg)]),
                        val(tolerance),
                    ],
                )
            }
            SpatialDialect::MySql => {
                let column = if reproject {
                    call("ST_Transform", [column, val(epsg)])
                } else {
                    column
                };
                let grown = expanded_envelope(shape, tolerance).ok_or_else(empty_geometry)?;
                let grown = Shape::Polygon(grown.to_polygon());
                call(
                    "MBRIntersects",
                    [
                        column,
                        call(
                            "ST_GeomFromWKB",
                            [wkb(&grown)?, val(epsg), val(MYSQL_AXIS_ORDER)],
                        ),
                    ],
                )
            }
            SpatialDialect::Spatialite { spatial_index } => {
                let transformed = if reproject {
                    call("Transform", [column, val(epsg)])
                } else {
                    column
                };
                let distance = Expr::expr(call(
                    "Distance",
                    [transformed, call("GeomFromWKB", [wkb(shape)?, val(epsg)])],
                ))
                .lte(tolerance);
                if *spatial_index && !reproject {
                    distance.and(rtree_overlap(target, shape, tolerance)?)
                } else {
                    distance
                }
            }
            SpatialDialect::Oracle(params) => {
                let geometry = call("SDO_GEOMETRY", [wkb(shape)?, val(epsg)]);
                let within = if reproject {
                    let column = call("SDO_CS.TRANSFORM", [column, val(epsg)]);
                    match (&params.dim1, &params.dim2, params.tol) {
                        (Some(dim1), Some(dim2), _) => call(
                            "SDO_GEOM.WITHIN_DISTANCE",
                            [
                                column,
                                SimpleExpr::Custom(dim1.clone()),
                                val(tolerance),
                                geometry,
                                SimpleExpr::Custom(dim2.clone()),
                                val(params.params.clone()),
                            ],
                        ),
                        (_, _, Some(tol)) => call(
                            "SDO_GEOM.WITHIN_DISTANCE",
                            [
                                column,
                                val(tolerance),
                                geometry,
                                val(tol),
                                val(params.params.clone()),
                            ],
                        ),
                        _ => return Err(FilterError::OracleParamsMissing),
                    }
                } else {
                    call(
                        "SDO_WITHIN_DISTANCE",
                        [
                            column,
                            geometry,
                            val(format!("distance={tolerance} {}", params.params)),
                        ],
                    )
                };
                Expr::expr(within).eq("TRUE")
            }
        };

        tracing::debug!(
            dialect = self.name(),
            table = target.table,
            column = target.column,
            reproject,
            tolerance,
            epsg,
            "within-distance predicate built"
        );
        Ok(predicate)
    }
}

/// `"table".rowid IN (SELECT pkid FROM idx_<table>_<column> WHERE ...)`
/// restricted to index boxes overlapping the shape's envelope grown by
/// `tolerance`.
fn rtree_overlap(
    target: SpatialTarget<'_>,
    shape: &Shape,
    tolerance: f64,
) -> Result<SimpleExpr, FilterError> {
    let env = envelope(shape).ok_or_else(empty_geometry)?;
    let index = format!("idx_{}_{}", target.table, target.column);
    let boxes = Query::select()
        .column(Alias::new("pkid"))
        .from(Alias::new(index))
        .and_where(Expr::col(Alias::new("xmax")).gte(env.min().x - tolerance))
        .and_where(Expr::col(Alias::new("xmin")).lte(env.max().x + tolerance))
        .and_where(Expr::col(Alias::new("ymax")).gte(env.min().y - tolerance))
        .and_where(Expr::col(Alias::new("ymin")).lte(env.max().y + tolerance))
        .to_owned();
    Ok(Expr::col((Alias::new(target.table), Alias::new("rowid"))).in_subquery(boxes))
}
