//! Store-shaped records produced by mapping raw Shopify payloads.
//!
//! Source identifiers are kept as strings to avoid precision loss on
//! Shopify's 64-bit ids. Money is fixed-point [`Decimal`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Product status used when the payload omits one.
pub const DEFAULT_PRODUCT_STATUS: &str = "active";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedCustomer {
    pub source_customer_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Lifetime spend snapshot reported by Shopify, not computed locally.
    pub total_spent: Decimal,
    pub orders_count: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedProduct {
    pub source_product_id: String,
    pub title: String,
    pub vendor: String,
    pub product_type: String,
    /// Price of the first variant.
    pub price: Decimal,
    /// Sum of `inventory_quantity` across variants.
    pub inventory: i32,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedOrder {
    pub source_order_id: String,
    /// Shopify id of the purchasing customer, used to link the local
    /// customer row at sync time.
    pub source_customer_id: Option<String>,
    pub total_price: Decimal,
    pub total_discounts: Decimal,
    pub financial_status: FinancialStatus,
    pub fulfillment_status: String,
    pub created_at: DateTime<Utc>,
}

/// Payment state of an order. Anything Shopify sends outside the known set,
/// including a missing value, is stored as [`FinancialStatus::Unknown`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinancialStatus {
    Pending,
    Authorized,
    PartiallyPaid,
    Paid,
    PartiallyRefunded,
    Refunded,
    Voided,
    #[default]
    Unknown,
}

impl FinancialStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FinancialStatus::Pending => "pending",
            FinancialStatus::Authorized => "authorized",
            FinancialStatus::PartiallyPaid => "partially_paid",
            FinancialStatus::Paid => "paid",
            FinancialStatus::PartiallyRefunded => "partially_refunded",
            FinancialStatus::Refunded => "refunded",
            FinancialStatus::Voided => "voided",
            FinancialStatus::Unknown => "unknown",
        }
    }

    /// Lenient conversion from the raw `financial_status` field.
    #[must_use]
    pub fn from_source(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("pending") => FinancialStatus::Pending,
            Some("authorized") => FinancialStatus::Authorized,
            Some("partially_paid") => FinancialStatus::PartiallyPaid,
            Some("paid") => FinancialStatus::Paid,
            Some("partially_refunded") => FinancialStatus::PartiallyRefunded,
            Some("refunded") => FinancialStatus::Refunded,
            Some("voided") => FinancialStatus::Voided,
            _ => FinancialStatus::Unknown,
        }
    }
}

impl std::fmt::Display for FinancialStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
