//! SeaORM-backed ledger storage.
//!
//! Every guarded mutation is one conditional `UPDATE` whose affected-row count
//! tells whether the predicate held.
//!
//! # Example
//!
//! ```rust,ignore
//! use dogai_billing::billing::{QuotaLedger, OrderManager, SeaOrmLedgerStore};
//!
//! let store = SeaOrmLedgerStore::new(db.clone());
//! let ledger = QuotaLedger::new(store.clone());
//! let orders = OrderManager::new(store);
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    entity::prelude::DateTimeWithTimeZone,
    sea_query::{Expr, OnConflict},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};

use super::error::BillingError;
use super::plans::Plan;
use super::storage::{
    NewPaymentOrder, OrderStatus, OrderStore, PaymentOrder, QuotaRecord, QuotaStore,
};
use crate::error::{LedgerError, Result};

// =============================================================================
// SeaORM Entities
// =============================================================================

mod entity {
    pub mod user_quota {
        use sea_orm::entity::prelude::*;

        #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
        #[sea_orm(table_name = "user_quota")]
        pub struct Model {
            #[sea_orm(primary_key, auto_increment = false)]
            pub user_id: i64,
            pub plan: String,
            pub ad_views_used: i32,
            pub ad_unlocks_remaining: i32,
            pub updated_at: DateTimeWithTimeZone,
        }

        #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
        pub enum Relation {}

        impl ActiveModelBehavior for ActiveModel {}
    }

    pub mod payment_order {
        use sea_orm::entity::prelude::*;

        #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
        #[sea_orm(table_name = "payment_orders")]
        pub struct Model {
            #[sea_orm(primary_key)]
            pub id: i32,
            #[sea_orm(unique)]
            pub order_id: String,
            pub user_id: i64,
            pub plan: String,
            pub payment_method: String,
            pub amount_vnd: i64,
            pub status: String,
            pub created_at: DateTimeWithTimeZone,
            pub confirmed_at: Option<DateTimeWithTimeZone>,
        }

        #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
        pub enum Relation {}

        impl ActiveModelBehavior for ActiveModel {}
    }
}

use entity::{payment_order, user_quota};

// =============================================================================
// Helper Functions
// =============================================================================

/// Convert i32 to u32 safely (negative values become 0).
#[inline]
fn i32_to_u32(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

/// Convert u32 to i32 safely (values > i32::MAX become i32::MAX).
#[inline]
fn u32_to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Convert i64 to u64 safely (negative values become 0).
#[inline]
fn i64_to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

/// Convert u64 to i64 safely (values > i64::MAX become i64::MAX).
#[inline]
fn u64_to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn now() -> DateTimeWithTimeZone {
    Utc::now().fixed_offset()
}

fn to_utc(value: DateTimeWithTimeZone) -> DateTime<Utc> {
    value.with_timezone(&Utc)
}

fn corrupt_row(field: &str, value: &str) -> LedgerError {
    LedgerError::internal(format!("stored {} '{}' is not recognised", field, value))
}

fn model_to_quota_record(model: user_quota::Model) -> Result<QuotaRecord> {
    let plan: Plan = model
        .plan
        .parse()
        .map_err(|_| corrupt_row("plan", &model.plan))?;
    Ok(QuotaRecord {
        user_id: model.user_id,
        plan,
        ad_views_used: i32_to_u32(model.ad_views_used),
        ad_unlocks_remaining: i32_to_u32(model.ad_unlocks_remaining),
        updated_at: to_utc(model.updated_at),
    })
}

fn model_to_payment_order(model: payment_order::Model) -> Result<PaymentOrder> {
    Ok(PaymentOrder {
        plan: model
            .plan
            .parse()
            .map_err(|_| corrupt_row("plan", &model.plan))?,
        payment_method: model
            .payment_method
            .parse()
            .map_err(|_| corrupt_row("payment method", &model.payment_method))?,
        status: model
            .status
            .parse::<OrderStatus>()
            .map_err(|_| corrupt_row("order status", &model.status))?,
        order_id: model.order_id,
        user_id: model.user_id,
        amount_vnd: i64_to_u64(model.amount_vnd),
        created_at: to_utc(model.created_at),
        confirmed_at: model.confirmed_at.map(to_utc),
    })
}

fn default_quota_model(user_id: i64, plan: Plan) -> user_quota::ActiveModel {
    user_quota::ActiveModel {
        user_id: Set(user_id),
        plan: Set(plan.as_str().to_string()),
        ad_views_used: Set(0),
        ad_unlocks_remaining: Set(0),
        updated_at: Set(now()),
    }
}

// =============================================================================
// Store
// =============================================================================

/// SeaORM implementation of [`QuotaStore`] and [`OrderStore`].
#[derive(Clone)]
pub struct SeaOrmLedgerStore {
    db: DatabaseConnection,
}

impl SeaOrmLedgerStore {
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    #[must_use]
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    async fn find_quota<C: ConnectionTrait>(db: &C, user_id: i64) -> Result<Option<QuotaRecord>> {
        user_quota::Entity::find_by_id(user_id)
            .one(db)
            .await?
            .map(model_to_quota_record)
            .transpose()
    }
}

#[async_trait]
impl QuotaStore for SeaOrmLedgerStore {
    async fn get_or_create_quota(&self, user_id: i64) -> Result<QuotaRecord> {
        user_quota::Entity::insert(default_quota_model(user_id, Plan::Free))
            .on_conflict(
                OnConflict::column(user_quota::Column::UserId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        Self::find_quota(&self.db, user_id)
            .await?
            .ok_or_else(|| BillingError::QuotaRecordMissing { user_id }.into())
    }

    async fn get_quota(&self, user_id: i64) -> Result<Option<QuotaRecord>> {
        tracing::debug!(user_id, "fetching quota record");
        Self::find_quota(&self.db, user_id).await
    }

    async fn set_plan(&self, user_id: i64, plan: Plan) -> Result<()> {
        tracing::debug!(user_id, plan = %plan, "upserting plan");

        // Use upsert (INSERT ... ON CONFLICT UPDATE) so counters survive
        user_quota::Entity::insert(default_quota_model(user_id, plan))
            .on_conflict(
                OnConflict::column(user_quota::Column::UserId)
                    .update_columns([user_quota::Column::Plan, user_quota::Column::UpdatedAt])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        Ok(())
    }

    async fn increment_ad_views(
        &self,
        user_id: i64,
        max_views: u32,
        unlocks_per_view: u32,
    ) -> Result<Option<QuotaRecord>> {
        let txn = self.db.begin().await?;

        let result = user_quota::Entity::update_many()
            .col_expr(
                user_quota::Column::AdViewsUsed,
                Expr::col(user_quota::Column::AdViewsUsed).add(1),
            )
            .col_expr(
                user_quota::Column::AdUnlocksRemaining,
                Expr::col(user_quota::Column::AdUnlocksRemaining)
                    .add(u32_to_i32(unlocks_per_view)),
            )
            .col_expr(user_quota::Column::UpdatedAt, Expr::value(now()))
            .filter(user_quota::Column::UserId.eq(user_id))
            .filter(user_quota::Column::AdViewsUsed.lt(u32_to_i32(max_views)))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            txn.rollback().await?;
            tracing::debug!(user_id, "ad view not credited");
            return Ok(None);
        }

        // The updated row stays locked until commit, so this reads our write
        let record = Self::find_quota(&txn, user_id).await?;
        txn.commit().await?;
        Ok(record)
    }

    async fn try_consume_unlock(&self, user_id: i64) -> Result<bool> {
        let result = user_quota::Entity::update_many()
            .col_expr(
                user_quota::Column::AdUnlocksRemaining,
                Expr::col(user_quota::Column::AdUnlocksRemaining).sub(1),
            )
            .col_expr(user_quota::Column::UpdatedAt, Expr::value(now()))
            .filter(user_quota::Column::UserId.eq(user_id))
            .filter(user_quota::Column::AdUnlocksRemaining.gt(0))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn refund_unlock(&self, user_id: i64) -> Result<bool> {
        let result = user_quota::Entity::update_many()
            .col_expr(
                user_quota::Column::AdUnlocksRemaining,
                Expr::col(user_quota::Column::AdUnlocksRemaining).add(1),
            )
            .col_expr(user_quota::Column::UpdatedAt, Expr::value(now()))
            .filter(user_quota::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected > 0)
    }
}

#[async_trait]
impl OrderStore for SeaOrmLedgerStore {
    async fn insert_order(&self, order: &NewPaymentOrder) -> Result<PaymentOrder> {
        tracing::debug!(order_id = %order.order_id, user_id = order.user_id, "inserting order");

        let model = payment_order::ActiveModel {
            order_id: Set(order.order_id.clone()),
            user_id: Set(order.user_id),
            plan: Set(order.plan.as_str().to_string()),
            payment_method: Set(order.payment_method.as_str().to_string()),
            amount_vnd: Set(u64_to_i64(order.amount_vnd)),
            status: Set(OrderStatus::Pending.as_str().to_string()),
            created_at: Set(now()),
            confirmed_at: Set(None),
            ..Default::default()
        };

        match model.insert(&self.db).await {
            Ok(inserted) => model_to_payment_order(inserted),
            Err(err) => match err.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => Err(BillingError::DuplicateOrder {
                    order_id: order.order_id.clone(),
                }
                .into()),
                _ => Err(err.into()),
            },
        }
    }

    async fn get_order(&self, order_id: &str) -> Result<Option<PaymentOrder>> {
        payment_order::Entity::find()
            .filter(payment_order::Column::OrderId.eq(order_id))
            .one(&self.db)
            .await?
            .map(model_to_payment_order)
            .transpose()
    }

    async fn mark_order_paid(&self, order_id: &str) -> Result<bool> {
        let result = payment_order::Entity::update_many()
            .col_expr(
                payment_order::Column::Status,
                Expr::value(OrderStatus::Paid.as_str()),
            )
            .col_expr(payment_order::Column::ConfirmedAt, Expr::value(Some(now())))
            .filter(payment_order::Column::OrderId.eq(order_id))
            .filter(payment_order::Column::Status.ne(OrderStatus::Paid.as_str()))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn list_orders_by_user(&self, user_id: i64, limit: u64) -> Result<Vec<PaymentOrder>> {
        payment_order::Entity::find()
            .filter(payment_order::Column::UserId.eq(user_id))
            .order_by_desc(payment_order::Column::CreatedAt)
            .order_by_desc(payment_order::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await?
            .into_iter()
            .map(model_to_payment_order)
            .collect()
    }

    async fn list_orders(&self, limit: u64) -> Result<Vec<PaymentOrder>> {
        payment_order::Entity::find()
            .order_by_desc(payment_order::Column::CreatedAt)
            .order_by_desc(payment_order::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await?
            .into_iter()
            .map(model_to_payment_order)
            .collect()
    }
}
