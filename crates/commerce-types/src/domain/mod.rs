pub mod checkout;
pub mod discount;
pub mod order;
pub mod order_status;
pub mod principal;
pub mod product;
