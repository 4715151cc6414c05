use papyrus_geo::{ColumnDef, ColumnKind, GeoMapping, GeometryType, MappingError};

use crate::infra::entity::{Column, Entity};

pub const CLASS_NAME: &str = "Spot";

/// Property ↔ column table of the `spots` table.
///
/// # Errors
/// Only if the table below is inconsistent.
pub fn spot_mapping() -> Result<GeoMapping<Entity>, MappingError> {
    GeoMapping::builder(CLASS_NAME)
        .column(ColumnDef::new("id", Column::Id, ColumnKind::Int).primary_key())
        .column(ColumnDef::new(
            "name",
            Column::Name,
            ColumnKind::String { max_len: Some(120) },
        ))
        .column(ColumnDef::new("height", Column::Height, ColumnKind::Double).nullable())
        .column(ColumnDef::new("visited_on", Column::VisitedOn, ColumnKind::Date).nullable())
        .column(
            ColumnDef::new("updated_at", Column::UpdatedAt, ColumnKind::DateTimeUtc)
                .nullable()
                .with_info("readonly", "true"),
        )
        .column(
            ColumnDef::new(
                "entry_fee",
                Column::EntryFee,
                ColumnKind::Decimal {
                    precision: Some(8),
                    scale: Some(2),
                },
            )
            .nullable(),
        )
        .column(
            ColumnDef::new(
                "geom",
                Column::Geom,
                ColumnKind::geometry(GeometryType::Point, 4326),
            )
            .nullable(),
        )
        .build()
}
