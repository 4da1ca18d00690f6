use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use lazy_static::lazy_static;
use prometheus::IntCounter;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set, SqlErr, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{
        product::Entity as ProductEntity,
        purchase_order::{self, Entity as PurchaseOrderEntity, PurchaseOrderStatus, PurchaseOrderType},
        purchase_order_line::{self, Entity as PurchaseOrderLineEntity},
        supplier::Entity as SupplierEntity,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

lazy_static! {
    static ref PO_CREATIONS: IntCounter = IntCounter::new(
        "purchase_order_creations_total",
        "Total number of purchase orders created"
    )
    .expect("metric can be created");
    static ref PO_CREATION_FAILURES: IntCounter = IntCounter::new(
        "purchase_order_creation_failures_total",
        "Total number of failed purchase order creations"
    )
    .expect("metric can be created");
}

const PO_NUMBER_INSERT_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreatePurchaseOrderInput {
    pub organization_id: Uuid,
    pub supplier_id: Uuid,
    pub po_type: PurchaseOrderType,
    /// Destination location for received stock.
    pub location_id: Uuid,
    #[validate(length(min = 1, message = "At least one item is required"))]
    pub items: Vec<PurchaseOrderItemInput>,
    pub tax_amount: Option<Decimal>,
    pub shipping_cost: Option<Decimal>,
    pub discount: Option<Decimal>,
    /// At-most-once token; a retried request with the same key returns the
    /// originally created purchase order.
    pub idempotency_key: Option<String>,
    pub created_by: Option<Uuid>,
    pub expected_delivery_date: Option<NaiveDate>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrderItemInput {
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePurchaseOrderResult {
    pub po_id: Uuid,
    pub po_number: String,
    pub status: PurchaseOrderStatus,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub shipping_cost: Decimal,
    pub discount: Decimal,
    pub total_amount: Decimal,
    pub lines_created: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Totals {
    subtotal: Decimal,
    total_amount: Decimal,
}

/// Purchase order creation and read paths.
#[derive(Clone)]
pub struct PurchaseOrderService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl PurchaseOrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Creates a purchase order in `Draft` with one line per input item.
    ///
    /// Totals are computed here, once; they are never re-derived from line
    /// edits later. Header and lines are inserted in a single transaction.
    /// When an idempotency key is supplied the operation has at-most-once
    /// effect: a key collision (prior request or concurrent winner) returns
    /// the existing purchase order in the same result shape.
    #[instrument(skip(self, input), fields(organization_id = %input.organization_id, supplier_id = %input.supplier_id))]
    pub async fn create_purchase_order(
        &self,
        input: CreatePurchaseOrderInput,
    ) -> Result<CreatePurchaseOrderResult, ServiceError> {
        input.validate().map_err(|e| {
            PO_CREATION_FAILURES.inc();
            ServiceError::ValidationError(format!("Invalid input: {}", e))
        })?;
        Self::validate_amounts(&input).map_err(|e| {
            PO_CREATION_FAILURES.inc();
            e
        })?;

        // Key lookup comes before reference checks: a retried request must
        // return the original purchase order even if its supplier has been
        // deactivated since. The unique index still settles concurrent
        // creations with the same key.
        if let Some(key) = &input.idempotency_key {
            if let Some(existing) = self.find_by_idempotency_key(key).await? {
                info!(po_id = %existing.id, "idempotency key matched existing purchase order");
                return self.result_for_existing(existing).await;
            }
        }

        self.validate_references(&input).await?;

        let totals = Self::compute_totals(&input);
        let tax = input.tax_amount.unwrap_or(Decimal::ZERO);
        let shipping = input.shipping_cost.unwrap_or(Decimal::ZERO);
        let discount = input.discount.unwrap_or(Decimal::ZERO);

        for attempt in 0..PO_NUMBER_INSERT_ATTEMPTS {
            let po_number = self.next_po_number(&input, attempt as u64).await?;

            match self.insert_po(&input, &po_number, totals).await {
                Ok(saved) => {
                    PO_CREATIONS.inc();
                    info!(
                        po_id = %saved.id,
                        po_number = %saved.po_number,
                        items = input.items.len(),
                        total_amount = %saved.total_amount,
                        "purchase order created"
                    );
                    self.event_sender
                        .send_or_log(Event::PurchaseOrderCreated(saved.id))
                        .await;
                    return Ok(CreatePurchaseOrderResult {
                        po_id: saved.id,
                        po_number: saved.po_number,
                        status: saved.status,
                        subtotal: totals.subtotal,
                        tax_amount: tax,
                        shipping_cost: shipping,
                        discount,
                        total_amount: totals.total_amount,
                        lines_created: input.items.len() as u64,
                    });
                }
                Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                    // Either the idempotency key or the po_number collided.
                    // A key hit means a concurrent request won: return its
                    // purchase order. Otherwise regenerate the number.
                    if let Some(key) = &input.idempotency_key {
                        if let Some(existing) = self.find_by_idempotency_key(key).await? {
                            info!(po_id = %existing.id, "lost idempotent creation race, returning winner");
                            return self.result_for_existing(existing).await;
                        }
                    }
                    info!(po_number = %po_number, attempt, "po_number collision, regenerating");
                }
                Err(e) => {
                    PO_CREATION_FAILURES.inc();
                    error!("Failed to create purchase order: {}", e);
                    return Err(ServiceError::DatabaseError(e));
                }
            }
        }

        PO_CREATION_FAILURES.inc();
        Err(ServiceError::Conflict(
            "could not allocate a unique purchase order number".to_string(),
        ))
    }

    fn validate_amounts(input: &CreatePurchaseOrderInput) -> Result<(), ServiceError> {
        for item in &input.items {
            if item.quantity <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(format!(
                    "quantity must be positive for product {}",
                    item.product_id
                )));
            }
            if item.unit_price < Decimal::ZERO {
                return Err(ServiceError::ValidationError(format!(
                    "unit_price must not be negative for product {}",
                    item.product_id
                )));
            }
        }
        for (name, value) in [
            ("tax_amount", input.tax_amount),
            ("shipping_cost", input.shipping_cost),
            ("discount", input.discount),
        ] {
            if value.unwrap_or(Decimal::ZERO) < Decimal::ZERO {
                return Err(ServiceError::ValidationError(format!(
                    "{} must not be negative",
                    name
                )));
            }
        }

        let totals = Self::compute_totals(input);
        if totals.total_amount < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "discount exceeds order value".to_string(),
            ));
        }
        Ok(())
    }

    fn compute_totals(input: &CreatePurchaseOrderInput) -> Totals {
        let subtotal: Decimal = input
            .items
            .iter()
            .map(|item| item.quantity * item.unit_price)
            .sum();
        let total_amount = subtotal
            + input.tax_amount.unwrap_or(Decimal::ZERO)
            + input.shipping_cost.unwrap_or(Decimal::ZERO)
            - input.discount.unwrap_or(Decimal::ZERO);
        Totals {
            subtotal,
            total_amount,
        }
    }

    async fn validate_references(
        &self,
        input: &CreatePurchaseOrderInput,
    ) -> Result<(), ServiceError> {
        let db = &*self.db;

        let supplier = SupplierEntity::find_by_id(input.supplier_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::ValidationError(format!("unknown supplier {}", input.supplier_id))
            })?;
        if !supplier.active {
            return Err(ServiceError::ValidationError(format!(
                "supplier {} is inactive",
                supplier.id
            )));
        }

        for item in &input.items {
            let exists = ProductEntity::find_by_id(item.product_id)
                .one(db)
                .await
                .map_err(ServiceError::DatabaseError)?
                .is_some();
            if !exists {
                return Err(ServiceError::ValidationError(format!(
                    "unknown product {}",
                    item.product_id
                )));
            }
        }
        Ok(())
    }

    /// Next number in the (organization, supplier, type) sequence, e.g.
    /// `PO-IN-A1B2C3-00042`. Uniqueness is enforced by the per-organization
    /// index; collisions under concurrency bump the sequence and retry.
    async fn next_po_number(
        &self,
        input: &CreatePurchaseOrderInput,
        bump: u64,
    ) -> Result<String, ServiceError> {
        let count = PurchaseOrderEntity::find()
            .filter(purchase_order::Column::OrganizationId.eq(input.organization_id))
            .filter(purchase_order::Column::SupplierId.eq(input.supplier_id))
            .filter(purchase_order::Column::PoType.eq(input.po_type.clone()))
            .count(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(Self::format_po_number(
            &input.po_type,
            input.supplier_id,
            count + 1 + bump,
        ))
    }

    fn format_po_number(po_type: &PurchaseOrderType, supplier_id: Uuid, seq: u64) -> String {
        let supplier_tag: String = supplier_id
            .simple()
            .to_string()
            .chars()
            .take(6)
            .collect::<String>()
            .to_uppercase();
        format!("PO-{}-{}-{:05}", po_type.code(), supplier_tag, seq)
    }

    async fn insert_po(
        &self,
        input: &CreatePurchaseOrderInput,
        po_number: &str,
        totals: Totals,
    ) -> Result<purchase_order::Model, sea_orm::DbErr> {
        let txn = self.db.begin().await?;
        let now = Utc::now();

        let header = purchase_order::ActiveModel {
            id: Set(Uuid::new_v4()),
            po_number: Set(po_number.to_string()),
            po_type: Set(input.po_type.clone()),
            organization_id: Set(input.organization_id),
            supplier_id: Set(input.supplier_id),
            location_id: Set(input.location_id),
            subtotal: Set(totals.subtotal),
            tax_amount: Set(input.tax_amount.unwrap_or(Decimal::ZERO)),
            shipping_cost: Set(input.shipping_cost.unwrap_or(Decimal::ZERO)),
            discount: Set(input.discount.unwrap_or(Decimal::ZERO)),
            total_amount: Set(totals.total_amount),
            status: Set(PurchaseOrderStatus::Draft),
            idempotency_key: Set(input.idempotency_key.clone()),
            created_by: Set(input.created_by),
            received_by: Set(None),
            expected_delivery_date: Set(input.expected_delivery_date),
            received_date: Set(None),
            notes: Set(input.notes.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let saved = header.insert(&txn).await?;

        for item in &input.items {
            let line = purchase_order_line::ActiveModel {
                id: Set(Uuid::new_v4()),
                purchase_order_id: Set(saved.id),
                product_id: Set(item.product_id),
                quantity: Set(item.quantity),
                unit_price: Set(item.unit_price),
                subtotal: Set(item.quantity * item.unit_price),
                received_quantity: Set(Decimal::ZERO),
                condition: Set(None),
                quality_notes: Set(None),
                created_at: Set(now),
                updated_at: Set(now),
            };
            line.insert(&txn).await?;
        }

        txn.commit().await?;
        Ok(saved)
    }

    async fn find_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<purchase_order::Model>, ServiceError> {
        PurchaseOrderEntity::find()
            .filter(purchase_order::Column::IdempotencyKey.eq(key))
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    async fn result_for_existing(
        &self,
        po: purchase_order::Model,
    ) -> Result<CreatePurchaseOrderResult, ServiceError> {
        let lines = PurchaseOrderLineEntity::find()
            .filter(purchase_order_line::Column::PurchaseOrderId.eq(po.id))
            .count(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(CreatePurchaseOrderResult {
            po_id: po.id,
            po_number: po.po_number,
            status: po.status,
            subtotal: po.subtotal,
            tax_amount: po.tax_amount,
            shipping_cost: po.shipping_cost,
            discount: po.discount,
            total_amount: po.total_amount,
            lines_created: lines,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_purchase_order(
        &self,
        po_id: Uuid,
    ) -> Result<Option<purchase_order::Model>, ServiceError> {
        PurchaseOrderEntity::find_by_id(po_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    #[instrument(skip(self))]
    pub async fn get_purchase_order_lines(
        &self,
        po_id: Uuid,
    ) -> Result<Vec<purchase_order_line::Model>, ServiceError> {
        PurchaseOrderLineEntity::find()
            .filter(purchase_order_line::Column::PurchaseOrderId.eq(po_id))
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn input_with(
        items: Vec<PurchaseOrderItemInput>,
        tax: Option<Decimal>,
        shipping: Option<Decimal>,
        discount: Option<Decimal>,
    ) -> CreatePurchaseOrderInput {
        CreatePurchaseOrderInput {
            organization_id: Uuid::new_v4(),
            supplier_id: Uuid::new_v4(),
            po_type: PurchaseOrderType::Inbound,
            location_id: Uuid::new_v4(),
            items,
            tax_amount: tax,
            shipping_cost: shipping,
            discount,
            idempotency_key: None,
            created_by: None,
            expected_delivery_date: None,
            notes: None,
        }
    }

    #[test]
    fn totals_follow_the_formula() {
        let input = input_with(
            vec![
                PurchaseOrderItemInput {
                    product_id: Uuid::new_v4(),
                    quantity: dec!(10),
                    unit_price: dec!(5.00),
                },
                PurchaseOrderItemInput {
                    product_id: Uuid::new_v4(),
                    quantity: dec!(3),
                    unit_price: dec!(2.50),
                },
            ],
            Some(dec!(4.25)),
            Some(dec!(10.00)),
            Some(dec!(1.75)),
        );

        let totals = PurchaseOrderService::compute_totals(&input);
        assert_eq!(totals.subtotal, dec!(57.50));
        assert_eq!(totals.total_amount, dec!(70.00));
    }

    #[test]
    fn totals_with_zero_extras_equal_subtotal() {
        let input = input_with(
            vec![PurchaseOrderItemInput {
                product_id: Uuid::new_v4(),
                quantity: dec!(10),
                unit_price: dec!(5.00),
            }],
            None,
            None,
            None,
        );

        let totals = PurchaseOrderService::compute_totals(&input);
        assert_eq!(totals.subtotal, dec!(50.00));
        assert_eq!(totals.total_amount, dec!(50.00));
    }

    #[test]
    fn negative_quantity_is_rejected() {
        let input = input_with(
            vec![PurchaseOrderItemInput {
                product_id: Uuid::new_v4(),
                quantity: dec!(-1),
                unit_price: dec!(5.00),
            }],
            None,
            None,
            None,
        );
        assert!(matches!(
            PurchaseOrderService::validate_amounts(&input),
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn oversized_discount_is_rejected() {
        let input = input_with(
            vec![PurchaseOrderItemInput {
                product_id: Uuid::new_v4(),
                quantity: dec!(1),
                unit_price: dec!(5.00),
            }],
            None,
            None,
            Some(dec!(100.00)),
        );
        assert!(matches!(
            PurchaseOrderService::validate_amounts(&input),
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn po_number_carries_type_and_sequence() {
        let supplier = Uuid::new_v4();
        let number =
            PurchaseOrderService::format_po_number(&PurchaseOrderType::Inbound, supplier, 42);
        assert!(number.starts_with("PO-IN-"));
        assert!(number.ends_with("-00042"));
    }
}
