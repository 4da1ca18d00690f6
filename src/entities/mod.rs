pub mod inventory_level;
pub mod product;
pub mod purchase_order;
pub mod purchase_order_line;
pub mod sales_order;
pub mod sales_order_line;
pub mod supplier;
