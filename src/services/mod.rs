pub mod cost_resolution;
pub mod inventory;
pub mod purchase_orders;
pub mod receiving;
