use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TestRequests::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TestRequests::Id)
                            .uuid()
                            .not_null()
                            .primary_key()
                            .default(Expr::cust("gen_random_uuid()")),
                    )
                    .col(ColumnDef::new(TestRequests::Name).string().not_null())
                    .col(
                        ColumnDef::new(TestRequests::CurrentFunding)
                            .big_integer() // minor currency units
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(TestRequests::TestCost).big_integer().not_null())
                    .col(
                        ColumnDef::new(TestRequests::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(TestRequests::ExpirationDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TestRequests::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // The sweep scans by status and deadline
        manager
            .create_index(
                Index::create()
                    .name("idx_test_requests_status_expiration")
                    .table(TestRequests::Table)
                    .col(TestRequests::Status)
                    .col(TestRequests::ExpirationDate)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TestRequests::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum TestRequests {
    Table,
    Id,
    Name,
    CurrentFunding,
    TestCost,
    Status,
    ExpirationDate,
    CreatedAt,
}
