//! `MapFish` query-string filters.
//!
//! The attribute filter turns `<field>__<op>=<value>` parameters into column
//! comparisons, restricted to the `queryable` allow-list. The geometry filter
//! turns `bbox`, `lon`/`lat` or `geometry` into a within-distance predicate.

use papyrus_geo::adapter::{bbox_polygon, parse_geometry, point};
use papyrus_geo::value::parse_text;
use papyrus_geo::{GeoMapping, Shape};
use sea_orm::sea_query::{Expr, Func, SimpleExpr};
use sea_orm::{ColumnTrait, Condition, EntityTrait, IdenStatic};

use crate::error::FilterError;
use crate::params::Params;
use crate::spatial::{SpatialDialect, SpatialTarget};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Compare {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AttrOp {
    Compare(Compare),
    Like,
    Ilike,
}

impl AttrOp {
    fn parse(op: &str) -> Option<Self> {
        Some(match op {
            "eq" => AttrOp::Compare(Compare::Eq),
            "ne" => AttrOp::Compare(Compare::Ne),
            "lt" => AttrOp::Compare(Compare::Lt),
            "lte" => AttrOp::Compare(Compare::Lte),
            "gt" => AttrOp::Compare(Compare::Gt),
            "gte" => AttrOp::Compare(Compare::Gte),
            "like" => AttrOp::Like,
            "ilike" => AttrOp::Ilike,
            _ => return None,
        })
    }
}

/// Conjunction of the attribute comparisons in `params`.
///
/// Parameters with an empty value, without `__`, on a field outside
/// `queryable` or with an unknown operator are ignored. Returns `None` when
/// `queryable` is absent or nothing matched.
///
/// # Errors
/// - `FilterError::UnknownField` for a queryable field the mapping lacks
/// - `FilterError::InvalidValue` when a value does not fit the column type
pub fn create_attr_filter<E>(
    params: &Params,
    mapping: &GeoMapping<E>,
) -> Result<Option<Condition>, FilterError>
where
    E: EntityTrait,
    E::Column: ColumnTrait + Copy,
{
    let Some(queryable) = params.list("queryable") else {
        return Ok(None);
    };

    let mut cond = Condition::all();
    let mut matched = 0usize;
    for (key, value) in params.latest() {
        if value.is_empty() {
            continue;
        }
        let Some((field, op)) = key.split_once("__") else {
            continue;
        };
        if !queryable.contains(&field) {
            continue;
        }
        let Some(op) = AttrOp::parse(op) else {
            continue;
        };
        let def = mapping
            .get(field)
            .ok_or_else(|| FilterError::UnknownField(field.to_owned()))?;
        let col = def.col;

        let expr: SimpleExpr = match op {
            AttrOp::Like => Expr::col(col).like(value),
            AttrOp::Ilike => Expr::expr(Func::lower(Expr::col(col))).like(value.to_lowercase()),
            AttrOp::Compare(cmp) => {
                let v = parse_text(def.kind(), value).map_err(|source| {
                    FilterError::InvalidValue {
                        param: key.to_owned(),
                        source,
                    }
                })?;
                match cmp {
                    Compare::Eq => Expr::col(col).eq(v),
                    Compare::Ne => Expr::col(col).ne(v),
                    Compare::Lt => Expr::col(col).lt(v),
                    Compare::Lte => Expr::col(col).lte(v),
                    Compare::Gt => Expr::col(col).gt(v),
                    Compare::Gte => Expr::col(col).gte(v),
                }
            }
        };
        cond = cond.add(expr);
        matched += 1;
    }

    tracing::debug!(matched, "attribute filter built");
    Ok((matched > 0).then_some(cond))
}

fn invalid(param: &'static str, reason: impl Into<String>) -> FilterError {
    FilterError::InvalidParam {
        param,
        reason: reason.into(),
    }
}

fn parse_float(param: &'static str, text: &str) -> Result<f64, FilterError> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .ok_or_else(|| invalid(param, format!("`{text}` is not a number")))
}

fn parse_bbox(text: &str) -> Result<Shape, FilterError> {
    let coords = text
        .split(',')
        .map(|c| parse_float("bbox", c))
        .collect::<Result<Vec<_>, _>>()?;
    let &[minx, miny, maxx, maxy] = coords.as_slice() else {
        return Err(invalid(
            "bbox",
            format!("expected minx,miny,maxx,maxy, got {} values", coords.len()),
        ));
    };
    Ok(bbox_polygon(minx, miny, maxx, maxy))
}

/// Within-distance predicate from `bbox`, `lon`/`lat` or `geometry`, first
/// match wins, refined by `tolerance` (default 0) and `epsg` (default the
/// column's SRID). Returns `None` when no spatial parameter is present.
///
/// # Errors
/// - `FilterError::InvalidParam` for a malformed spatial parameter
/// - `FilterError::NoGeometryColumn` when the mapping has no geometry
/// - any dialect error of [`SpatialDialect::within_distance`]
pub fn create_geom_filter<E>(
    params: &Params,
    mapping: &GeoMapping<E>,
    dialect: &SpatialDialect,
) -> Result<Option<Condition>, FilterError>
where
    E: EntityTrait,
    E::Column: ColumnTrait + Copy,
{
    let tolerance = params
        .get("tolerance")
        .map(|t| parse_float("tolerance", t))
        .transpose()?
        .unwrap_or(0.0);
    let epsg = params
        .get("epsg")
        .map(|e| {
            e.trim()
                .parse::<i32>()
                .map_err(|_| invalid("epsg", format!("`{e}` is not an EPSG code")))
        })
        .transpose()?;

    let shape = if let Some(bbox) = params.get("bbox") {
        parse_bbox(bbox)?
    } else if let (Some(lon), Some(lat)) = (params.get("lon"), params.get("lat")) {
        point(parse_float("lon", lon)?, parse_float("lat", lat)?)
    } else if let Some(geometry) = params.get("geometry") {
        parse_geometry(geometry).map_err(|e| invalid("geometry", e.to_string()))?
    } else {
        return Ok(None);
    };

    let geom = mapping
        .geometry()
        .ok_or_else(|| FilterError::NoGeometryColumn(mapping.class_name().to_owned()))?;
    let srid = geom.kind().srid().unwrap_or_default();
    let table = mapping.table_name();
    let target = SpatialTarget {
        table: &table,
        column: geom.col.as_str(),
        srid,
    };
    let predicate = dialect.within_distance(target, &shape, tolerance, epsg.unwrap_or(srid))?;
    Ok(Some(Condition::all().add(predicate)))
}

/// Spatial AND attribute filter, whichever is present, or `None`.
///
/// # Errors
/// Errors of [`create_attr_filter`] and [`create_geom_filter`].
pub fn create_filter<E>(
    params: &Params,
    mapping: &GeoMapping<E>,
    dialect: &SpatialDialect,
) -> Result<Option<Condition>, FilterError>
where
    E: EntityTrait,
    E::Column: ColumnTrait + Copy,
{
    let attr = create_attr_filter(params, mapping)?;
    let geom = create_geom_filter(params, mapping, dialect)?;
    Ok(match (geom, attr) {
        (Some(geom), Some(attr)) => Some(Condition::all().add(geom).add(attr)),
        (geom, attr) => geom.or(attr),
    })
}
