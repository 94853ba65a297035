//! Wire shapes of the Admin REST resources we read.
//!
//! Every field except the envelope arrays is optional: stores omit fields,
//! send `null`, and older API versions encode amounts as numbers instead of
//! decimal strings. Mapping into store records happens in
//! [`crate::normalize`], which applies the defaults.

use serde::Deserialize;

/// Shopify ids are 64-bit integers, but some payloads (GraphQL-backed
/// endpoints, fixtures) use strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SourceId {
    Number(i64),
    Text(String),
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceId::Number(n) => write!(f, "{n}"),
            SourceId::Text(s) => f.write_str(s),
        }
    }
}

/// A money amount as sent by Shopify: usually `"12.50"`, occasionally `12.5`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Amount {
    Text(String),
    Number(serde_json::Number),
}

#[derive(Debug, Deserialize)]
pub struct ShopifyCustomer {
    #[serde(default)]
    pub id: Option<SourceId>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub total_spent: Option<Amount>,
    #[serde(default)]
    pub orders_count: Option<i64>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ShopifyProduct {
    #[serde(default)]
    pub id: Option<SourceId>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub product_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub variants: Vec<ShopifyVariant>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ShopifyVariant {
    #[serde(default)]
    pub price: Option<Amount>,
    /// Can be negative when a store allows overselling.
    #[serde(default)]
    pub inventory_quantity: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ShopifyOrder {
    #[serde(default)]
    pub id: Option<SourceId>,
    /// Embedded customer summary; `null` for guest checkouts.
    #[serde(default)]
    pub customer: Option<ShopifyCustomerRef>,
    #[serde(default)]
    pub total_price: Option<Amount>,
    #[serde(default)]
    pub total_discounts: Option<Amount>,
    #[serde(default)]
    pub financial_status: Option<String>,
    /// `null` means unfulfilled.
    #[serde(default)]
    pub fulfillment_status: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ShopifyCustomerRef {
    #[serde(default)]
    pub id: Option<SourceId>,
}

/// Entry of `checkouts.json?status=abandoned`.
#[derive(Debug, Clone, Deserialize)]
pub struct ShopifyCheckout {
    #[serde(default)]
    pub id: Option<SourceId>,
    #[serde(default)]
    pub total_price: Option<Amount>,
}

/// Response of `GET shop.json`.
#[derive(Debug, Deserialize)]
pub(crate) struct ShopEnvelope {
    pub shop: ShopInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, serde::Serialize)]
pub struct ShopInfo {
    pub name: String,
    pub domain: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Response of the `*/count.json` endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct CountResponse {
    pub count: u64,
}
