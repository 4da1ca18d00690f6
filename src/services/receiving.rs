use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use lazy_static::lazy_static;
use prometheus::IntCounter;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    QueryFilter, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    entities::{
        purchase_order::{self, Entity as PurchaseOrderEntity, PurchaseOrderStatus},
        purchase_order_line::{self, Entity as PurchaseOrderLineEntity},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::inventory::InventoryService,
};

lazy_static! {
    static ref PO_RECEIPT_BATCHES: IntCounter = IntCounter::new(
        "purchase_order_receipt_batches_total",
        "Total number of receive batches applied"
    )
    .expect("metric can be created");
}

/// Condition assigned to received units. Only `Good` stock enters the
/// sellable inventory ledger; the other conditions are recorded on the line
/// and go no further.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ItemCondition {
    Good,
    Damaged,
    Expired,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiveItemInput {
    pub line_id: Uuid,
    pub quantity: Decimal,
    pub condition: ItemCondition,
    pub quality_notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiveResult {
    pub items_processed: usize,
    pub new_status: PurchaseOrderStatus,
}

/// Receiving engine: drives the purchase order status state machine and
/// accumulates the stock ledger for good-condition receipts.
#[derive(Clone)]
pub struct ReceivingService {
    db: Arc<DatabaseConnection>,
    inventory: InventoryService,
    event_sender: EventSender,
}

impl ReceivingService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        inventory: InventoryService,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db,
            inventory,
            event_sender,
        }
    }

    /// `Draft -> Pending`. No side effects beyond the status change.
    #[instrument(skip(self))]
    pub async fn submit_purchase_order(&self, po_id: Uuid) -> Result<(), ServiceError> {
        let po = self.load_po(po_id).await?;
        if po.status != PurchaseOrderStatus::Draft {
            return Err(ServiceError::InvalidStatus(format!(
                "purchase order {} is {}; only Draft orders can be submitted",
                po_id, po.status
            )));
        }
        self.set_status(po, PurchaseOrderStatus::Pending).await?;
        self.event_sender
            .send_or_log(Event::PurchaseOrderSubmitted(po_id))
            .await;
        Ok(())
    }

    /// `Pending -> Approved`.
    #[instrument(skip(self))]
    pub async fn approve_purchase_order(&self, po_id: Uuid) -> Result<(), ServiceError> {
        let po = self.load_po(po_id).await?;
        if po.status != PurchaseOrderStatus::Pending {
            return Err(ServiceError::InvalidStatus(format!(
                "purchase order {} is {}; only Pending orders can be approved",
                po_id, po.status
            )));
        }
        self.set_status(po, PurchaseOrderStatus::Approved).await?;
        self.event_sender
            .send_or_log(Event::PurchaseOrderApproved(po_id))
            .await;
        Ok(())
    }

    /// `Approved -> Ordered`, recording that the order went out to the
    /// supplier.
    #[instrument(skip(self))]
    pub async fn mark_ordered(&self, po_id: Uuid) -> Result<(), ServiceError> {
        let po = self.load_po(po_id).await?;
        if po.status != PurchaseOrderStatus::Approved {
            return Err(ServiceError::InvalidStatus(format!(
                "purchase order {} is {}; only Approved orders can be marked ordered",
                po_id, po.status
            )));
        }
        self.set_status(po, PurchaseOrderStatus::Ordered).await
    }

    /// Cancels a purchase order. Legal only before any receiving has begun;
    /// lines and the inventory ledger are untouched.
    #[instrument(skip(self))]
    pub async fn cancel_purchase_order(&self, po_id: Uuid) -> Result<(), ServiceError> {
        let po = self.load_po(po_id).await?;
        if !po.status.is_cancellable() {
            return Err(ServiceError::InvalidStatus(format!(
                "purchase order {} is {}; cancellation is only legal from Draft, Pending, Ordered or Approved",
                po_id, po.status
            )));
        }
        self.set_status(po, PurchaseOrderStatus::Cancelled).await?;
        self.event_sender
            .send_or_log(Event::PurchaseOrderCancelled(po_id))
            .await;
        Ok(())
    }

    /// Applies a batch of condition-tagged receipts against a purchase
    /// order, all within one transaction.
    ///
    /// Each entry adds to its line's `received_quantity` (repeated partial
    /// receipts accumulate) and overwrites condition and quality notes.
    /// Good-condition quantities are added to the inventory ledger for the
    /// destination location; damaged, expired and rejected units never reach
    /// sellable stock. After the batch the order's status is recomputed from
    /// the stored totals across all lines.
    ///
    /// This call is NOT idempotent: resubmitting the same batch double
    /// counts stock. Each physical receiving event must be submitted exactly
    /// once; that contract is the caller's to keep.
    #[instrument(skip(self, items), fields(items = items.len()))]
    pub async fn receive_items(
        &self,
        po_id: Uuid,
        location_id: Uuid,
        items: Vec<ReceiveItemInput>,
        received_by: Option<Uuid>,
    ) -> Result<ReceiveResult, ServiceError> {
        if items.is_empty() {
            return Err(ServiceError::ValidationError(
                "receive batch must contain at least one item".to_string(),
            ));
        }
        for item in &items {
            if item.quantity <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(format!(
                    "received quantity must be positive for line {}",
                    item.line_id
                )));
            }
        }

        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;

        // The PO row lock serializes concurrent batches against the same
        // order, so the over-receipt cap and the status recompute below see
        // every committed increment. SQLite ignores the clause; its single
        // writer gives the same guarantee.
        let po = PurchaseOrderEntity::find_by_id(po_id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("purchase order {} not found", po_id)))?;

        if !po.status.is_receivable() {
            return Err(ServiceError::InvalidStatus(format!(
                "purchase order {} is {}; receiving requires Pending, Approved, Ordered, Receiving or PartiallyReceived",
                po_id, po.status
            )));
        }

        let lines = PurchaseOrderLineEntity::find()
            .filter(purchase_order_line::Column::PurchaseOrderId.eq(po_id))
            .lock_exclusive()
            .all(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;
        let lines_by_id: HashMap<Uuid, &purchase_order_line::Model> =
            lines.iter().map(|l| (l.id, l)).collect();

        // Deltas already applied earlier in this batch, so a batch touching
        // the same line twice is bounded correctly.
        let mut applied: HashMap<Uuid, Decimal> = HashMap::new();
        let mut ledger_events = Vec::new();

        for item in &items {
            let line = lines_by_id.get(&item.line_id).ok_or_else(|| {
                ServiceError::InvalidInput(format!(
                    "line {} does not belong to purchase order {}",
                    item.line_id, po_id
                ))
            })?;

            let prior = line.received_quantity + *applied.get(&item.line_id).unwrap_or(&Decimal::ZERO);
            if prior + item.quantity > line.quantity {
                return Err(ServiceError::InvalidOperation(format!(
                    "cannot receive more than ordered on line {}: ordered {}, already received {}, receiving {}",
                    line.id, line.quantity, prior, item.quantity
                )));
            }

            self.apply_line_receipt(&txn, item).await?;
            *applied.entry(item.line_id).or_insert(Decimal::ZERO) += item.quantity;

            if item.condition == ItemCondition::Good {
                let new_quantity = self
                    .inventory
                    .accumulate(
                        &txn,
                        po.organization_id,
                        location_id,
                        line.product_id,
                        item.quantity,
                    )
                    .await?;
                ledger_events.push(Event::InventoryAccumulated {
                    organization_id: po.organization_id,
                    location_id,
                    product_id: line.product_id,
                    delta: item.quantity,
                    new_quantity,
                });
            }
        }

        // Status derives from the stored totals across all lines, not just
        // this batch.
        let refreshed = PurchaseOrderLineEntity::find()
            .filter(purchase_order_line::Column::PurchaseOrderId.eq(po_id))
            .all(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;
        let total_ordered: Decimal = refreshed.iter().map(|l| l.quantity).sum();
        let total_received: Decimal = refreshed.iter().map(|l| l.received_quantity).sum();
        let new_status = derive_receipt_status(total_ordered, total_received);

        PurchaseOrderEntity::update_many()
            .col_expr(
                purchase_order::Column::Status,
                Expr::value(new_status.clone()),
            )
            .col_expr(purchase_order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(purchase_order::Column::Id.eq(po_id))
            .exec(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        if new_status == PurchaseOrderStatus::Received {
            // First transition into Received stamps the receipt metadata;
            // later calls must not overwrite the receiver of record.
            PurchaseOrderEntity::update_many()
                .col_expr(
                    purchase_order::Column::ReceivedDate,
                    Expr::value(Some(Utc::now())),
                )
                .filter(purchase_order::Column::Id.eq(po_id))
                .filter(purchase_order::Column::ReceivedDate.is_null())
                .exec(&txn)
                .await
                .map_err(ServiceError::DatabaseError)?;

            if let Some(receiver) = received_by {
                PurchaseOrderEntity::update_many()
                    .col_expr(
                        purchase_order::Column::ReceivedBy,
                        Expr::value(Some(receiver)),
                    )
                    .filter(purchase_order::Column::Id.eq(po_id))
                    .filter(purchase_order::Column::ReceivedBy.is_null())
                    .exec(&txn)
                    .await
                    .map_err(ServiceError::DatabaseError)?;
            }
        }

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        PO_RECEIPT_BATCHES.inc();
        info!(
            purchase_order_id = %po_id,
            items = items.len(),
            new_status = %new_status,
            "receive batch applied"
        );

        for event in ledger_events {
            self.event_sender.send_or_log(event).await;
        }
        self.event_sender
            .send_or_log(Event::PurchaseOrderReceived {
                purchase_order_id: po_id,
                new_status: new_status.to_string(),
                items_processed: items.len(),
            })
            .await;

        Ok(ReceiveResult {
            items_processed: items.len(),
            new_status,
        })
    }

    /// Atomic per-line receipt: `received_quantity += qty`, condition and
    /// notes last-write-wins.
    async fn apply_line_receipt<C: ConnectionTrait>(
        &self,
        conn: &C,
        item: &ReceiveItemInput,
    ) -> Result<(), ServiceError> {
        PurchaseOrderLineEntity::update_many()
            .col_expr(
                purchase_order_line::Column::ReceivedQuantity,
                Expr::col(purchase_order_line::Column::ReceivedQuantity).add(item.quantity),
            )
            .col_expr(
                purchase_order_line::Column::Condition,
                Expr::value(Some(item.condition.to_string())),
            )
            .col_expr(
                purchase_order_line::Column::QualityNotes,
                Expr::value(item.quality_notes.clone()),
            )
            .col_expr(
                purchase_order_line::Column::UpdatedAt,
                Expr::value(Utc::now()),
            )
            .filter(purchase_order_line::Column::Id.eq(item.line_id))
            .exec(conn)
            .await
            .map_err(ServiceError::DatabaseError)?;
        Ok(())
    }

    async fn load_po(&self, po_id: Uuid) -> Result<purchase_order::Model, ServiceError> {
        PurchaseOrderEntity::find_by_id(po_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("purchase order {} not found", po_id)))
    }

    async fn set_status(
        &self,
        po: purchase_order::Model,
        status: PurchaseOrderStatus,
    ) -> Result<(), ServiceError> {
        let mut active = po.into_active_model();
        active.status = Set(status);
        active.updated_at = Set(Utc::now());
        active
            .update(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        Ok(())
    }
}

/// Status after a receive batch, derived from totals over all lines.
fn derive_receipt_status(total_ordered: Decimal, total_received: Decimal) -> PurchaseOrderStatus {
    if total_received >= total_ordered && total_ordered > Decimal::ZERO {
        PurchaseOrderStatus::Received
    } else if total_received > Decimal::ZERO {
        PurchaseOrderStatus::PartiallyReceived
    } else {
        PurchaseOrderStatus::Receiving
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::str::FromStr;

    #[test]
    fn full_receipt_is_received() {
        assert_eq!(
            derive_receipt_status(dec!(10), dec!(10)),
            PurchaseOrderStatus::Received
        );
    }

    #[test]
    fn partial_receipt_is_partially_received() {
        assert_eq!(
            derive_receipt_status(dec!(10), dec!(6)),
            PurchaseOrderStatus::PartiallyReceived
        );
    }

    #[test]
    fn nothing_received_is_receiving() {
        assert_eq!(
            derive_receipt_status(dec!(10), dec!(0)),
            PurchaseOrderStatus::Receiving
        );
    }

    #[test]
    fn condition_round_trips_through_strings() {
        for (cond, text) in [
            (ItemCondition::Good, "good"),
            (ItemCondition::Damaged, "damaged"),
            (ItemCondition::Expired, "expired"),
            (ItemCondition::Rejected, "rejected"),
        ] {
            assert_eq!(cond.to_string(), text);
            assert_eq!(ItemCondition::from_str(text).unwrap(), cond);
        }
    }
}
