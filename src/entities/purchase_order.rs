use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Purchase order lifecycle status.
///
/// `Received` and `Cancelled` are terminal. Receiving is legal from
/// `Pending`, `Approved`, `Ordered`, `Receiving` and `PartiallyReceived`;
/// cancellation only from the pre-receiving states.
#[derive(Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum PurchaseOrderStatus {
    #[sea_orm(string_value = "Draft")]
    Draft,
    #[sea_orm(string_value = "Pending")]
    Pending,
    #[sea_orm(string_value = "Approved")]
    Approved,
    #[sea_orm(string_value = "Ordered")]
    Ordered,
    #[sea_orm(string_value = "Receiving")]
    Receiving,
    #[sea_orm(string_value = "PartiallyReceived")]
    PartiallyReceived,
    #[sea_orm(string_value = "Received")]
    Received,
    #[sea_orm(string_value = "Cancelled")]
    Cancelled,
}

impl PurchaseOrderStatus {
    /// States from which a receive batch may be applied.
    pub fn is_receivable(&self) -> bool {
        matches!(
            self,
            Self::Pending | Self::Approved | Self::Ordered | Self::Receiving | Self::PartiallyReceived
        )
    }

    /// States from which cancellation is legal.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, Self::Draft | Self::Pending | Self::Ordered | Self::Approved)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Ordered => "Ordered",
            Self::Receiving => "Receiving",
            Self::PartiallyReceived => "PartiallyReceived",
            Self::Received => "Received",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for PurchaseOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum PurchaseOrderType {
    #[sea_orm(string_value = "Inbound")]
    Inbound,
    #[sea_orm(string_value = "Transfer")]
    Transfer,
    #[sea_orm(string_value = "Return")]
    Return,
}

impl PurchaseOrderType {
    /// Short code used in generated PO numbers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Inbound => "IN",
            Self::Transfer => "TR",
            Self::Return => "RT",
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "purchase_orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Human-readable number, unique per organization.
    pub po_number: String,
    pub po_type: PurchaseOrderType,
    pub organization_id: Uuid,
    pub supplier_id: Uuid,
    /// Destination location for received stock.
    pub location_id: Uuid,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub shipping_cost: Decimal,
    pub discount: Decimal,
    /// `subtotal + tax_amount + shipping_cost - discount`, fixed at creation.
    pub total_amount: Decimal,
    pub status: PurchaseOrderStatus,
    /// Caller-supplied at-most-once token; unique when present.
    pub idempotency_key: Option<String>,
    pub created_by: Option<Uuid>,
    pub received_by: Option<Uuid>,
    pub expected_delivery_date: Option<chrono::NaiveDate>,
    pub received_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::purchase_order_line::Entity")]
    PurchaseOrderLines,
    #[sea_orm(
        belongs_to = "super::supplier::Entity",
        from = "Column::SupplierId",
        to = "super::supplier::Column::Id"
    )]
    Supplier,
}

impl Related<super::purchase_order_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PurchaseOrderLines.def()
    }
}

impl Related<super::supplier::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Supplier.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
