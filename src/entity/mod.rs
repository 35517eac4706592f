pub mod coupons;
pub mod order_items;
pub mod orders;
pub mod product_variants;
pub mod products;

pub use coupons::Entity as Coupons;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use product_variants::Entity as ProductVariants;
pub use products::Entity as Products;
