use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, SqlErr,
};
use tracing::{error, instrument};
use uuid::Uuid;

use crate::{
    entities::inventory_level::{self, Entity as InventoryLevelEntity},
    errors::ServiceError,
};

/// Stock ledger service. All stock accumulation in the replenishment core
/// flows through [`InventoryService::accumulate`], the additive-upsert
/// primitive for the `(organization, location, product)` row.
#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DatabaseConnection>,
}

impl InventoryService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Adds `delta` to the ledger row for the key, creating the row on first
    /// receipt. Returns the quantity after the change.
    ///
    /// The increment is issued as a SQL-level delta (`quantity = quantity +
    /// ?`), never as a read-modify-write in application memory, so
    /// concurrent receipts against the same key both land. The
    /// insert-vs-update race on a brand-new key is settled by the unique
    /// index on the key columns: the losing insert retries as an update.
    ///
    /// Callers pass the surrounding transaction so the ledger change commits
    /// or rolls back with the rest of the receive batch.
    #[instrument(skip(self, conn))]
    pub async fn accumulate<C: ConnectionTrait>(
        &self,
        conn: &C,
        organization_id: Uuid,
        location_id: Uuid,
        product_id: Uuid,
        delta: Decimal,
    ) -> Result<Decimal, ServiceError> {
        if delta <= Decimal::ZERO {
            return Err(ServiceError::InvalidInput(format!(
                "ledger delta must be positive, got {}",
                delta
            )));
        }

        let updated = Self::apply_delta(conn, organization_id, location_id, product_id, delta).await?;

        if updated == 0 {
            let row = inventory_level::ActiveModel {
                id: Set(Uuid::new_v4()),
                organization_id: Set(organization_id),
                location_id: Set(location_id),
                product_id: Set(product_id),
                quantity: Set(delta),
                created_at: Set(Utc::now()),
                updated_at: Set(Utc::now()),
            };

            match InventoryLevelEntity::insert(row).exec(conn).await {
                Ok(_) => {}
                Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                    // Lost the first-receipt race; the row exists now.
                    let retried =
                        Self::apply_delta(conn, organization_id, location_id, product_id, delta)
                            .await?;
                    if retried == 0 {
                        return Err(ServiceError::InternalError(format!(
                            "inventory upsert failed for product {} at location {}",
                            product_id, location_id
                        )));
                    }
                }
                Err(e) => {
                    error!("Failed to insert inventory level: {}", e);
                    return Err(ServiceError::DatabaseError(e));
                }
            }
        }

        let level = self
            .find_level(conn, organization_id, location_id, product_id)
            .await?
            .ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "inventory level missing after upsert for product {}",
                    product_id
                ))
            })?;

        Ok(level.quantity)
    }

    async fn apply_delta<C: ConnectionTrait>(
        conn: &C,
        organization_id: Uuid,
        location_id: Uuid,
        product_id: Uuid,
        delta: Decimal,
    ) -> Result<u64, ServiceError> {
        let result = InventoryLevelEntity::update_many()
            .col_expr(
                inventory_level::Column::Quantity,
                Expr::col(inventory_level::Column::Quantity).add(delta),
            )
            .col_expr(
                inventory_level::Column::UpdatedAt,
                Expr::value(Utc::now()),
            )
            .filter(inventory_level::Column::OrganizationId.eq(organization_id))
            .filter(inventory_level::Column::LocationId.eq(location_id))
            .filter(inventory_level::Column::ProductId.eq(product_id))
            .exec(conn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(result.rows_affected)
    }

    async fn find_level<C: ConnectionTrait>(
        &self,
        conn: &C,
        organization_id: Uuid,
        location_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<inventory_level::Model>, ServiceError> {
        InventoryLevelEntity::find()
            .filter(inventory_level::Column::OrganizationId.eq(organization_id))
            .filter(inventory_level::Column::LocationId.eq(location_id))
            .filter(inventory_level::Column::ProductId.eq(product_id))
            .one(conn)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Current ledger row for a key, if any receipt has created it.
    #[instrument(skip(self))]
    pub async fn get_level(
        &self,
        organization_id: Uuid,
        location_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<inventory_level::Model>, ServiceError> {
        self.find_level(&*self.db, organization_id, location_id, product_id)
            .await
    }

    /// All ledger rows for a location.
    #[instrument(skip(self))]
    pub async fn get_levels_for_location(
        &self,
        organization_id: Uuid,
        location_id: Uuid,
    ) -> Result<Vec<inventory_level::Model>, ServiceError> {
        InventoryLevelEntity::find()
            .filter(inventory_level::Column::OrganizationId.eq(organization_id))
            .filter(inventory_level::Column::LocationId.eq(location_id))
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }
}
