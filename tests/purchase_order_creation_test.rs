mod common;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, EntityTrait, IntoActiveModel, PaginatorTrait, Set};
use uuid::Uuid;

use replenish_api::{
    entities::{
        purchase_order::{self, PurchaseOrderStatus, PurchaseOrderType},
        supplier,
    },
    errors::ServiceError,
    services::purchase_orders::{CreatePurchaseOrderInput, PurchaseOrderItemInput},
};

use common::TestApp;

fn base_input(
    supplier_id: Uuid,
    items: Vec<PurchaseOrderItemInput>,
) -> CreatePurchaseOrderInput {
    CreatePurchaseOrderInput {
        organization_id: Uuid::new_v4(),
        supplier_id,
        po_type: PurchaseOrderType::Inbound,
        location_id: Uuid::new_v4(),
        items,
        tax_amount: None,
        shipping_cost: None,
        discount: None,
        idempotency_key: None,
        created_by: None,
        expected_delivery_date: None,
        notes: None,
    }
}

#[tokio::test]
async fn creation_computes_totals_and_persists_lines() {
    let app = TestApp::new().await;
    let supplier = app.seed_supplier(true).await;
    let product = app.seed_product(None).await;

    let input = base_input(
        supplier,
        vec![PurchaseOrderItemInput {
            product_id: product,
            quantity: dec!(10),
            unit_price: dec!(5.00),
        }],
    );

    let result = app
        .state
        .services
        .purchase_orders
        .create_purchase_order(input)
        .await
        .expect("create po");

    assert_eq!(result.status, PurchaseOrderStatus::Draft);
    assert_eq!(result.subtotal, dec!(50.00));
    assert_eq!(result.total_amount, dec!(50.00));
    assert_eq!(result.lines_created, 1);
    assert!(result.po_number.starts_with("PO-IN-"));

    let stored = app
        .state
        .services
        .purchase_orders
        .get_purchase_order(result.po_id)
        .await
        .expect("fetch")
        .expect("exists");
    assert_eq!(stored.total_amount, dec!(50.00));
    assert_eq!(stored.status, PurchaseOrderStatus::Draft);

    let lines = app
        .state
        .services
        .purchase_orders
        .get_purchase_order_lines(result.po_id)
        .await
        .expect("lines");
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].quantity, dec!(10));
    assert_eq!(lines[0].received_quantity, Decimal::ZERO);
    assert_eq!(lines[0].subtotal, dec!(50.00));
}

#[tokio::test]
async fn total_follows_the_formula_with_tax_shipping_and_discount() {
    let app = TestApp::new().await;
    let supplier = app.seed_supplier(true).await;
    let product = app.seed_product(None).await;

    let mut input = base_input(
        supplier,
        vec![PurchaseOrderItemInput {
            product_id: product,
            quantity: dec!(4),
            unit_price: dec!(12.50),
        }],
    );
    input.tax_amount = Some(dec!(5.00));
    input.shipping_cost = Some(dec!(7.25));
    input.discount = Some(dec!(2.25));

    let result = app
        .state
        .services
        .purchase_orders
        .create_purchase_order(input)
        .await
        .expect("create po");

    assert_eq!(result.subtotal, dec!(50.00));
    // subtotal + tax + shipping - discount
    assert_eq!(result.total_amount, dec!(60.00));
}

#[tokio::test]
async fn same_idempotency_key_returns_same_po_and_single_row() {
    let app = TestApp::new().await;
    let supplier = app.seed_supplier(true).await;
    let product = app.seed_product(None).await;

    let mut input = base_input(
        supplier,
        vec![PurchaseOrderItemInput {
            product_id: product,
            quantity: dec!(3),
            unit_price: dec!(9.99),
        }],
    );
    input.idempotency_key = Some("po-idem-key-1".to_string());

    let first = app
        .state
        .services
        .purchase_orders
        .create_purchase_order(input.clone())
        .await
        .expect("first create");
    let second = app
        .state
        .services
        .purchase_orders
        .create_purchase_order(input)
        .await
        .expect("replayed create");

    assert_eq!(first.po_id, second.po_id);
    assert_eq!(first.po_number, second.po_number);
    assert_eq!(first.total_amount, second.total_amount);
    assert_eq!(second.lines_created, 1);

    let count = purchase_order::Entity::find()
        .count(&*app.state.db)
        .await
        .expect("count purchase orders");
    assert_eq!(count, 1, "expected a single purchase order record");
}

#[tokio::test]
async fn replayed_key_returns_the_original_po_despite_supplier_deactivation() {
    let app = TestApp::new().await;
    let supplier_id = app.seed_supplier(true).await;
    let product = app.seed_product(None).await;

    let mut input = base_input(
        supplier_id,
        vec![PurchaseOrderItemInput {
            product_id: product,
            quantity: dec!(2),
            unit_price: dec!(4.00),
        }],
    );
    input.idempotency_key = Some("po-idem-key-2".to_string());

    let first = app
        .state
        .services
        .purchase_orders
        .create_purchase_order(input.clone())
        .await
        .expect("first create");

    let mut active = supplier::Entity::find_by_id(supplier_id)
        .one(&*app.state.db)
        .await
        .expect("query supplier")
        .expect("supplier exists")
        .into_active_model();
    active.active = Set(false);
    active.update(&*app.state.db).await.expect("deactivate supplier");

    let replayed = app
        .state
        .services
        .purchase_orders
        .create_purchase_order(input)
        .await
        .expect("replay must still return the original order");
    assert_eq!(replayed.po_id, first.po_id);
    assert_eq!(replayed.po_number, first.po_number);
}

#[tokio::test]
async fn empty_item_list_is_rejected() {
    let app = TestApp::new().await;
    let supplier = app.seed_supplier(true).await;

    let err = app
        .state
        .services
        .purchase_orders
        .create_purchase_order(base_input(supplier, vec![]))
        .await
        .expect_err("empty items must fail");
    assert!(matches!(err, ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn non_positive_quantity_and_negative_price_are_rejected() {
    let app = TestApp::new().await;
    let supplier = app.seed_supplier(true).await;
    let product = app.seed_product(None).await;

    let zero_qty = base_input(
        supplier,
        vec![PurchaseOrderItemInput {
            product_id: product,
            quantity: dec!(0),
            unit_price: dec!(1.00),
        }],
    );
    assert!(matches!(
        app.state
            .services
            .purchase_orders
            .create_purchase_order(zero_qty)
            .await,
        Err(ServiceError::ValidationError(_))
    ));

    let negative_price = base_input(
        supplier,
        vec![PurchaseOrderItemInput {
            product_id: product,
            quantity: dec!(1),
            unit_price: dec!(-0.01),
        }],
    );
    assert!(matches!(
        app.state
            .services
            .purchase_orders
            .create_purchase_order(negative_price)
            .await,
        Err(ServiceError::ValidationError(_))
    ));
}

#[tokio::test]
async fn unknown_supplier_and_product_are_validation_errors() {
    let app = TestApp::new().await;
    let product = app.seed_product(None).await;

    let unknown_supplier = base_input(
        Uuid::new_v4(),
        vec![PurchaseOrderItemInput {
            product_id: product,
            quantity: dec!(1),
            unit_price: dec!(1.00),
        }],
    );
    assert!(matches!(
        app.state
            .services
            .purchase_orders
            .create_purchase_order(unknown_supplier)
            .await,
        Err(ServiceError::ValidationError(_))
    ));

    let supplier = app.seed_supplier(true).await;
    let unknown_product = base_input(
        supplier,
        vec![PurchaseOrderItemInput {
            product_id: Uuid::new_v4(),
            quantity: dec!(1),
            unit_price: dec!(1.00),
        }],
    );
    assert!(matches!(
        app.state
            .services
            .purchase_orders
            .create_purchase_order(unknown_product)
            .await,
        Err(ServiceError::ValidationError(_))
    ));
}

#[tokio::test]
async fn inactive_supplier_is_rejected() {
    let app = TestApp::new().await;
    let supplier = app.seed_supplier(false).await;
    let product = app.seed_product(None).await;

    let input = base_input(
        supplier,
        vec![PurchaseOrderItemInput {
            product_id: product,
            quantity: dec!(1),
            unit_price: dec!(1.00),
        }],
    );
    assert!(matches!(
        app.state
            .services
            .purchase_orders
            .create_purchase_order(input)
            .await,
        Err(ServiceError::ValidationError(_))
    ));
}
