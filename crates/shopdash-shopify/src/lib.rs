pub mod client;
pub mod error;
pub mod normalize;
pub mod pagination;
pub mod types;

pub use client::{shop_origin, Page, ShopifyClient, MAX_PAGE_SIZE};
pub use error::{MappingError, SourceError};
pub use normalize::{
    normalize_customer, normalize_order, normalize_product, parse_amount, source_id,
};
pub use types::{ShopInfo, ShopifyCheckout};
