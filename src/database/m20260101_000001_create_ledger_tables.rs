//! Ledger tables migration.
//!
//! Creates:
//! - user_quota: plan and ad counters per user
//! - payment_orders: checkout orders, pending until confirmed

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UserQuota::Table)
                    .if_not_exists()
                    .col(big_integer(UserQuota::UserId).primary_key())
                    .col(string_len(UserQuota::Plan, 20).default("free"))
                    .col(integer(UserQuota::AdViewsUsed).default(0))
                    .col(integer(UserQuota::AdUnlocksRemaining).default(0))
                    .col(
                        timestamp_with_time_zone(UserQuota::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PaymentOrders::Table)
                    .if_not_exists()
                    .col(pk_auto(PaymentOrders::Id))
                    .col(string_len(PaymentOrders::OrderId, 64).unique_key())
                    .col(big_integer(PaymentOrders::UserId))
                    .col(string_len(PaymentOrders::Plan, 20))
                    .col(string_len(PaymentOrders::PaymentMethod, 20))
                    .col(big_integer(PaymentOrders::AmountVnd).default(0))
                    .col(string_len(PaymentOrders::Status, 20).default("pending"))
                    .col(
                        timestamp_with_time_zone(PaymentOrders::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(timestamp_with_time_zone_null(PaymentOrders::ConfirmedAt))
                    .to_owned(),
            )
            .await?;

        // Note: order_id already has an index from unique_key()

        manager
            .create_index(
                Index::create()
                    .name("idx_payment_orders_user_id")
                    .table(PaymentOrders::Table)
                    .col(PaymentOrders::UserId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PaymentOrders::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UserQuota::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum UserQuota {
    Table,
    UserId,
    Plan,
    AdViewsUsed,
    AdUnlocksRemaining,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum PaymentOrders {
    Table,
    Id,
    OrderId,
    UserId,
    Plan,
    PaymentMethod,
    AmountVnd,
    Status,
    CreatedAt,
    ConfirmedAt,
}
