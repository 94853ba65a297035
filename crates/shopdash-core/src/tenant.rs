use serde::Serialize;

/// Connection settings for one onboarded store.
///
/// Always read fresh from the tenant registry; nothing in the workspace keeps
/// a long-lived copy, so credential updates apply on the next resolve.
#[derive(Clone, PartialEq, Serialize)]
pub struct TenantConfig {
    pub id: String,
    /// `*.myshopify.com` host. May carry an explicit `http(s)://` scheme,
    /// which is honoured as-is.
    pub shop_domain: String,
    #[serde(skip_serializing)]
    pub access_token: String,
    pub is_active: bool,
    pub settings: serde_json::Value,
}

impl TenantConfig {
    /// A freshly registered tenant: active, no credentials, empty settings.
    #[must_use]
    pub fn unconfigured(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            shop_domain: String::new(),
            access_token: String::new(),
            is_active: true,
            settings: serde_json::json!({}),
        }
    }

    #[must_use]
    pub fn has_credentials(&self) -> bool {
        !self.shop_domain.trim().is_empty() && !self.access_token.trim().is_empty()
    }
}

impl std::fmt::Debug for TenantConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantConfig")
            .field("id", &self.id)
            .field("shop_domain", &self.shop_domain)
            .field(
                "access_token",
                &(!self.access_token.is_empty()).then_some("[redacted]"),
            )
            .field("is_active", &self.is_active)
            .field("settings", &self.settings)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_tenant_has_no_credentials() {
        let tenant = TenantConfig::unconfigured("7");
        assert!(tenant.is_active);
        assert!(!tenant.has_credentials());
        assert_eq!(tenant.settings, serde_json::json!({}));
    }

    #[test]
    fn debug_redacts_access_token() {
        let tenant = TenantConfig {
            access_token: "shpat_secret".to_string(),
            shop_domain: "demo.myshopify.com".to_string(),
            ..TenantConfig::unconfigured("1")
        };
        let debug = format!("{tenant:?}");
        assert!(!debug.contains("shpat_secret"));
        assert!(debug.contains("[redacted]"));
    }

    #[test]
    fn serialization_omits_access_token() {
        let tenant = TenantConfig {
            access_token: "shpat_secret".to_string(),
            ..TenantConfig::unconfigured("1")
        };
        let json = serde_json::to_string(&tenant).expect("serialize");
        assert!(!json.contains("access_token"));
    }
}
