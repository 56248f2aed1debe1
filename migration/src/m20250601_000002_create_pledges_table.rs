use sea_orm_migration::prelude::*;

use super::m20250601_000001_create_test_requests_table::TestRequests;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Pledges::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Pledges::Id)
                            .uuid()
                            .not_null()
                            .primary_key()
                            .default(Expr::cust("gen_random_uuid()")),
                    )
                    .col(ColumnDef::new(Pledges::TestRequestId).uuid().not_null())
                    .col(ColumnDef::new(Pledges::UserId).uuid().null())
                    .col(ColumnDef::new(Pledges::Amount).big_integer().not_null())
                    .col(ColumnDef::new(Pledges::PaymentMethodId).string().null())
                    .col(ColumnDef::new(Pledges::CustomerId).string().null())
                    .col(
                        ColumnDef::new(Pledges::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(Pledges::ChargedAt).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(Pledges::PaymentIntentId).string().null())
                    .col(
                        ColumnDef::new(Pledges::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_pledges_test_request")
                            .from(Pledges::Table, Pledges::TestRequestId)
                            .to(TestRequests::Table, TestRequests::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_pledges_test_request_status")
                    .table(Pledges::Table)
                    .col(Pledges::TestRequestId)
                    .col(Pledges::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Pledges::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Pledges {
    Table,
    Id,
    TestRequestId,
    UserId,
    Amount,
    PaymentMethodId,
    CustomerId,
    Status,
    ChargedAt,
    PaymentIntentId,
    CreatedAt,
}
