//! The three Shopify collections mirrored into the local store.

use serde::{Deserialize, Serialize};

use crate::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Customers,
    Products,
    Orders,
}

impl ResourceKind {
    /// All kinds, in the order a full sync reports them.
    pub const ALL: [ResourceKind; 3] = [
        ResourceKind::Customers,
        ResourceKind::Products,
        ResourceKind::Orders,
    ];

    /// Path segment and JSON envelope key used by the Admin REST API.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Customers => "customers",
            ResourceKind::Products => "products",
            ResourceKind::Orders => "orders",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "customers" => Ok(Self::Customers),
            "products" => Ok(Self::Products),
            "orders" => Ok(Self::Orders),
            other => Err(CoreError::UnknownResourceKind(other.to_string())),
        }
    }
}
