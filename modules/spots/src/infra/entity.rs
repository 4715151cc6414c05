use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "spots")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub height: Option<f64>,
    pub visited_on: Option<Date>,
    pub updated_at: Option<DateTimeUtc>,
    #[sea_orm(column_type = "Decimal(Some((8, 2)))")]
    pub entry_fee: Option<Decimal>,
    /// Point geometry, WKB.
    pub geom: Option<Vec<u8>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
