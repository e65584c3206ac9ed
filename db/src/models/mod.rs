pub mod application_user;
pub mod category;
pub mod company;
pub mod order_detail;
pub mod order_header;
pub mod product;
pub mod shopping_cart;
