use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use prometheus::IntCounter;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, JoinType,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    entities::{
        product::Entity as ProductEntity,
        purchase_order::{self, PurchaseOrderStatus},
        purchase_order_line::{self, Entity as PurchaseOrderLineEntity},
        sales_order::{self, Entity as SalesOrderEntity},
        sales_order_line::{self, Entity as SalesOrderLineEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

lazy_static! {
    static ref BACKFILL_RUNS: IntCounter = IntCounter::new(
        "cost_backfill_runs_total",
        "Total number of cost backfill runs"
    )
    .expect("metric can be created");
}

const DEFAULT_PAGE_SIZE: u64 = 500;

/// Scope of a backfill or COGS recompute run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackfillScope {
    pub organization_id: Option<Uuid>,
    pub page_size: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackfillSummary {
    pub items_processed: u64,
    pub items_updated: u64,
    pub items_without_resolved_cost: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CogsSummary {
    pub orders_processed: u64,
    pub orders_updated: u64,
}

/// The cost sources tried for an unresolved sold item, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CostTier {
    /// Latest received PO line for the product updated at or before the
    /// sale; the best approximation of the cost in effect when it sold.
    ReceivedBeforeSale,
    /// The product's master cost, when positive.
    ProductMaster,
    /// Any received PO line for the product, ignoring dates. A last-resort
    /// estimate, explicitly weaker than the tiers above.
    AnyReceived,
}

const COST_TIERS: [CostTier; 3] = [
    CostTier::ReceivedBeforeSale,
    CostTier::ProductMaster,
    CostTier::AnyReceived,
];

/// Repairs historical unit cost on sold line items and keeps order-level
/// COGS aggregates consistent.
///
/// Both passes are safe to rerun indefinitely: the item pass only writes
/// where `cost_per_unit` is still null, and the aggregate pass derives
/// purely from current item state.
#[derive(Clone)]
pub struct CostResolutionService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    default_page_size: u64,
}

impl CostResolutionService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self {
            db,
            event_sender,
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.default_page_size = page_size.max(1);
        self
    }

    /// Backfills `cost_per_unit` for sold items missing one, then recomputes
    /// the aggregates of every order it touched.
    ///
    /// Items are walked in bounded pages by id cursor, so the unresolved set
    /// is never held in memory at once. Items no tier can resolve keep their
    /// null cost and are counted, never defaulted to zero.
    #[instrument(skip(self))]
    pub async fn run_backfill(&self, scope: BackfillScope) -> Result<BackfillSummary, ServiceError> {
        let page_size = scope.page_size.unwrap_or(self.default_page_size).max(1);
        let mut summary = BackfillSummary::default();
        let mut last_id: Option<Uuid> = None;
        let mut order_created: HashMap<Uuid, DateTime<Utc>> = HashMap::new();
        let mut affected_orders: HashSet<Uuid> = HashSet::new();

        loop {
            let page = self
                .fetch_unresolved_page(&scope, last_id, page_size)
                .await?;
            if page.is_empty() {
                break;
            }
            last_id = page.last().map(|line| line.id);

            for line in &page {
                summary.items_processed += 1;

                let sold_at = match order_created.get(&line.sales_order_id) {
                    Some(ts) => *ts,
                    None => {
                        let order = SalesOrderEntity::find_by_id(line.sales_order_id)
                            .one(&*self.db)
                            .await
                            .map_err(ServiceError::DatabaseError)?
                            .ok_or_else(|| {
                                ServiceError::NotFound(format!(
                                    "sales order {} not found for line {}",
                                    line.sales_order_id, line.id
                                ))
                            })?;
                        order_created.insert(order.id, order.created_at);
                        order.created_at
                    }
                };

                match self.resolve_cost(line, sold_at).await? {
                    Some(cost) => {
                        if self.write_resolved_cost(line, cost).await? {
                            summary.items_updated += 1;
                            affected_orders.insert(line.sales_order_id);
                        }
                    }
                    None => summary.items_without_resolved_cost += 1,
                }
            }

            if (page.len() as u64) < page_size {
                break;
            }
        }

        for order_id in &affected_orders {
            self.recompute_order(*order_id).await?;
        }

        BACKFILL_RUNS.inc();
        info!(
            items_processed = summary.items_processed,
            items_updated = summary.items_updated,
            items_without_resolved_cost = summary.items_without_resolved_cost,
            orders_recomputed = affected_orders.len(),
            "cost backfill completed"
        );
        self.event_sender
            .send_or_log(Event::CostBackfillCompleted {
                items_processed: summary.items_processed,
                items_updated: summary.items_updated,
                items_without_resolved_cost: summary.items_without_resolved_cost,
            })
            .await;

        Ok(summary)
    }

    async fn fetch_unresolved_page(
        &self,
        scope: &BackfillScope,
        after: Option<Uuid>,
        page_size: u64,
    ) -> Result<Vec<sales_order_line::Model>, ServiceError> {
        let mut query =
            SalesOrderLineEntity::find().filter(sales_order_line::Column::CostPerUnit.is_null());
        if let Some(org) = scope.organization_id {
            query = query
                .join(
                    JoinType::InnerJoin,
                    sales_order_line::Relation::SalesOrder.def(),
                )
                .filter(sales_order::Column::OrganizationId.eq(org));
        }

        let mut cursor = query.cursor_by(sales_order_line::Column::Id);
        if let Some(id) = after {
            cursor.after(id);
        }
        cursor
            .first(page_size)
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Tries each cost source in priority order; first hit wins.
    async fn resolve_cost(
        &self,
        line: &sales_order_line::Model,
        sold_at: DateTime<Utc>,
    ) -> Result<Option<Decimal>, ServiceError> {
        for tier in COST_TIERS {
            if let Some(cost) = self.try_tier(tier, line.product_id, sold_at).await? {
                return Ok(Some(cost));
            }
        }
        Ok(None)
    }

    async fn try_tier(
        &self,
        tier: CostTier,
        product_id: Uuid,
        sold_at: DateTime<Utc>,
    ) -> Result<Option<Decimal>, ServiceError> {
        match tier {
            CostTier::ReceivedBeforeSale => self
                .latest_received_line(product_id, Some(sold_at))
                .await
                .map(|line| line.map(|l| l.unit_price)),
            CostTier::ProductMaster => {
                let product = ProductEntity::find_by_id(product_id)
                    .one(&*self.db)
                    .await
                    .map_err(ServiceError::DatabaseError)?;
                Ok(product
                    .and_then(|p| p.cost_price)
                    .filter(|cost| *cost > Decimal::ZERO))
            }
            CostTier::AnyReceived => self
                .latest_received_line(product_id, None)
                .await
                .map(|line| line.map(|l| l.unit_price)),
        }
    }

    /// Most recently updated line of a received (at least partially) PO for
    /// the product, optionally bounded to POs updated at or before the sale.
    async fn latest_received_line(
        &self,
        product_id: Uuid,
        updated_before: Option<DateTime<Utc>>,
    ) -> Result<Option<purchase_order_line::Model>, ServiceError> {
        let mut query = PurchaseOrderLineEntity::find()
            .filter(purchase_order_line::Column::ProductId.eq(product_id))
            .join(
                JoinType::InnerJoin,
                purchase_order_line::Relation::PurchaseOrder.def(),
            )
            .filter(purchase_order::Column::Status.is_in([
                PurchaseOrderStatus::Received,
                PurchaseOrderStatus::PartiallyReceived,
            ]))
            .filter(purchase_order_line::Column::ReceivedQuantity.gt(Decimal::ZERO));
        if let Some(bound) = updated_before {
            query = query.filter(purchase_order::Column::UpdatedAt.lte(bound));
        }
        query
            .order_by_desc(purchase_order::Column::UpdatedAt)
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Writes cost, profit and margin, but only if the row is still
    /// unresolved at write time, which is what makes reruns safe.
    async fn write_resolved_cost(
        &self,
        line: &sales_order_line::Model,
        cost: Decimal,
    ) -> Result<bool, ServiceError> {
        let (profit, margin) = profit_and_margin(line.unit_price, cost);

        let result = SalesOrderLineEntity::update_many()
            .col_expr(
                sales_order_line::Column::CostPerUnit,
                Expr::value(Some(cost)),
            )
            .col_expr(
                sales_order_line::Column::ProfitPerUnit,
                Expr::value(Some(profit)),
            )
            .col_expr(
                sales_order_line::Column::MarginPercentage,
                Expr::value(Some(margin)),
            )
            .col_expr(
                sales_order_line::Column::UpdatedAt,
                Expr::value(Utc::now()),
            )
            .filter(sales_order_line::Column::Id.eq(line.id))
            .filter(sales_order_line::Column::CostPerUnit.is_null())
            .exec(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(result.rows_affected > 0)
    }

    /// Recomputes COGS aggregates for every order in scope. A pure
    /// derivation from current line state; identical inputs produce
    /// identical results, so reruns are free.
    #[instrument(skip(self))]
    pub async fn recalculate_order_cogs(
        &self,
        scope: BackfillScope,
    ) -> Result<CogsSummary, ServiceError> {
        let page_size = scope.page_size.unwrap_or(self.default_page_size).max(1);
        let mut summary = CogsSummary::default();
        let mut last_id: Option<Uuid> = None;

        loop {
            let mut query = SalesOrderEntity::find();
            if let Some(org) = scope.organization_id {
                query = query.filter(sales_order::Column::OrganizationId.eq(org));
            }
            let mut cursor = query.cursor_by(sales_order::Column::Id);
            if let Some(id) = last_id {
                cursor.after(id);
            }
            let page = cursor
                .first(page_size)
                .all(&*self.db)
                .await
                .map_err(ServiceError::DatabaseError)?;
            if page.is_empty() {
                break;
            }
            last_id = page.last().map(|order| order.id);

            for order in &page {
                summary.orders_processed += 1;
                if self.recompute_order(order.id).await? {
                    summary.orders_updated += 1;
                }
            }

            if (page.len() as u64) < page_size {
                break;
            }
        }

        info!(
            orders_processed = summary.orders_processed,
            orders_updated = summary.orders_updated,
            "order COGS recompute completed"
        );
        Ok(summary)
    }

    /// Derives and stores `total_cogs` and `gross_margin` for one order.
    /// Returns whether the stored values changed.
    async fn recompute_order(&self, order_id: Uuid) -> Result<bool, ServiceError> {
        let order = SalesOrderEntity::find_by_id(order_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("sales order {} not found", order_id)))?;

        let lines = SalesOrderLineEntity::find()
            .filter(sales_order_line::Column::SalesOrderId.eq(order_id))
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let total_cogs: Decimal = lines
            .iter()
            .filter_map(|l| l.cost_per_unit.map(|cost| cost * l.quantity))
            .sum();
        let revenue: Decimal = lines.iter().map(|l| l.unit_price * l.quantity).sum();
        let gross_margin = revenue - total_cogs;

        if order.total_cogs == Some(total_cogs) && order.gross_margin == Some(gross_margin) {
            return Ok(false);
        }

        let mut active = order.into_active_model();
        active.total_cogs = Set(Some(total_cogs));
        active.gross_margin = Set(Some(gross_margin));
        active.updated_at = Set(Utc::now());
        active
            .update(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        Ok(true)
    }
}

/// Profit per unit and margin percentage for a resolved cost. A zero sale
/// price yields a zero margin rather than a division error.
fn profit_and_margin(unit_price: Decimal, cost: Decimal) -> (Decimal, Decimal) {
    let profit = unit_price - cost;
    let margin = if unit_price > Decimal::ZERO {
        profit / unit_price * Decimal::ONE_HUNDRED
    } else {
        Decimal::ZERO
    };
    (profit, margin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn margin_from_the_worked_example() {
        let (profit, margin) = profit_and_margin(dec!(8.00), dec!(5.00));
        assert_eq!(profit, dec!(3.00));
        assert_eq!(margin, dec!(37.5));
    }

    #[test]
    fn zero_price_yields_zero_margin() {
        let (profit, margin) = profit_and_margin(dec!(0), dec!(5.00));
        assert_eq!(profit, dec!(-5.00));
        assert_eq!(margin, Decimal::ZERO);
    }

    #[test]
    fn negative_margin_when_sold_below_cost() {
        let (profit, margin) = profit_and_margin(dec!(4.00), dec!(5.00));
        assert_eq!(profit, dec!(-1.00));
        assert_eq!(margin, dec!(-25));
    }
}
