//! Mapping from raw Admin API records to store records.
//!
//! Defaults: absent amounts become zero, absent strings become empty,
//! absent product status becomes `"active"`, absent or unknown financial
//! status becomes `unknown`. A record without a usable `id` or `created_at`
//! is rejected, as is any amount that does not parse.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::Value;
use shopdash_core::{
    FinancialStatus, NormalizedCustomer, NormalizedOrder, NormalizedProduct, ResourceKind,
    DEFAULT_PRODUCT_STATUS,
};

use crate::error::MappingError;
use crate::types::{Amount, ShopifyCustomer, ShopifyOrder, ShopifyProduct, SourceId};

/// Best-effort extraction of a record's `id`, for error reporting on records
/// that fail to map.
#[must_use]
pub fn source_id(raw: &Value) -> Option<String> {
    match raw.get("id")? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Maps one entry of `customers.json`.
///
/// # Errors
///
/// Returns [`MappingError`] when the payload is structurally invalid, lacks
/// `id`/`created_at`, or carries an unparseable or negative `total_spent`.
pub fn normalize_customer(raw: &Value) -> Result<NormalizedCustomer, MappingError> {
    let customer: ShopifyCustomer = decode(ResourceKind::Customers, raw)?;

    let orders_count = customer.orders_count.unwrap_or(0);
    let orders_count = i32::try_from(orders_count)
        .ok()
        .filter(|n| *n >= 0)
        .ok_or(MappingError::OutOfRange {
            field: "orders_count",
            value: orders_count,
        })?;

    Ok(NormalizedCustomer {
        source_customer_id: require_id(customer.id)?,
        email: customer.email.unwrap_or_default(),
        first_name: customer.first_name.unwrap_or_default(),
        last_name: customer.last_name.unwrap_or_default(),
        total_spent: non_negative("total_spent", customer.total_spent.as_ref())?,
        orders_count,
        created_at: parse_timestamp("created_at", customer.created_at.as_deref())?,
    })
}

/// Maps one entry of `products.json`.
///
/// The stored price is the first variant's price; inventory is the sum of
/// every variant's `inventory_quantity`, saturated to the `i32` range.
///
/// # Errors
///
/// Returns [`MappingError`] when the payload is structurally invalid, lacks
/// `id`/`created_at`, or the first variant's price does not parse.
pub fn normalize_product(raw: &Value) -> Result<NormalizedProduct, MappingError> {
    let product: ShopifyProduct = decode(ResourceKind::Products, raw)?;

    let price = parse_amount(
        "variants[0].price",
        product.variants.first().and_then(|v| v.price.as_ref()),
    )?;

    let inventory: i64 = product
        .variants
        .iter()
        .filter_map(|v| v.inventory_quantity)
        .fold(0i64, i64::saturating_add);
    let inventory = i32::try_from(inventory)
        .unwrap_or(if inventory.is_negative() { i32::MIN } else { i32::MAX });

    let status = product
        .status
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_PRODUCT_STATUS.to_string());

    Ok(NormalizedProduct {
        source_product_id: require_id(product.id)?,
        title: product.title.unwrap_or_default(),
        vendor: product.vendor.unwrap_or_default(),
        product_type: product.product_type.unwrap_or_default(),
        price,
        inventory,
        status,
        created_at: parse_timestamp("created_at", product.created_at.as_deref())?,
    })
}

/// Maps one entry of `orders.json`.
///
/// # Errors
///
/// Returns [`MappingError`] when the payload is structurally invalid, lacks
/// `id`/`created_at`, or carries an unparseable or negative amount.
pub fn normalize_order(raw: &Value) -> Result<NormalizedOrder, MappingError> {
    let order: ShopifyOrder = decode(ResourceKind::Orders, raw)?;

    let source_customer_id = order
        .customer
        .and_then(|c| c.id)
        .map(|id| id.to_string());

    Ok(NormalizedOrder {
        source_order_id: require_id(order.id)?,
        source_customer_id,
        total_price: non_negative("total_price", order.total_price.as_ref())?,
        total_discounts: non_negative("total_discounts", order.total_discounts.as_ref())?,
        financial_status: FinancialStatus::from_source(order.financial_status.as_deref()),
        fulfillment_status: order.fulfillment_status.unwrap_or_default(),
        created_at: parse_timestamp("created_at", order.created_at.as_deref())?,
    })
}

/// Parses a Shopify money amount. `None` is zero.
///
/// # Errors
///
/// Returns [`MappingError::InvalidAmount`] if the value is not a decimal.
pub fn parse_amount(field: &'static str, amount: Option<&Amount>) -> Result<Decimal, MappingError> {
    let text = match amount {
        None => return Ok(Decimal::ZERO),
        Some(Amount::Text(s)) if s.trim().is_empty() => return Ok(Decimal::ZERO),
        Some(Amount::Text(s)) => s.trim().to_string(),
        Some(Amount::Number(n)) => n.to_string(),
    };

    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| MappingError::InvalidAmount { field, value: text })
}

fn non_negative(field: &'static str, amount: Option<&Amount>) -> Result<Decimal, MappingError> {
    let value = parse_amount(field, amount)?;
    if value.is_sign_negative() && !value.is_zero() {
        return Err(MappingError::NegativeAmount { field, value });
    }
    Ok(value)
}

fn decode<T: DeserializeOwned>(kind: ResourceKind, raw: &Value) -> Result<T, MappingError> {
    T::deserialize(raw).map_err(|source| MappingError::Malformed { kind, source })
}

fn require_id(id: Option<SourceId>) -> Result<String, MappingError> {
    id.map(|id| id.to_string())
        .filter(|id| !id.trim().is_empty())
        .ok_or(MappingError::MissingField { field: "id" })
}

fn parse_timestamp(field: &'static str, raw: Option<&str>) -> Result<DateTime<Utc>, MappingError> {
    let raw = raw
        .filter(|s| !s.trim().is_empty())
        .ok_or(MappingError::MissingField { field })?;
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| MappingError::InvalidTimestamp {
            field,
            value: raw.to_string(),
        })
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
