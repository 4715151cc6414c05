use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Spots::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Spots::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Spots::Name).string_len(120).not_null())
                    .col(ColumnDef::new(Spots::Height).double())
                    .col(ColumnDef::new(Spots::VisitedOn).date())
                    .col(ColumnDef::new(Spots::UpdatedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Spots::Geom).blob())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Spots::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Spots {
    Table,
    Id,
    Name,
    Height,
    VisitedOn,
    UpdatedAt,
    Geom,
}
