use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(Spots::Table)
                    .add_column(ColumnDef::new(Spots::EntryFee).decimal_len(8, 2))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(Spots::Table)
                    .drop_column(Spots::EntryFee)
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum Spots {
    Table,
    EntryFee,
}
