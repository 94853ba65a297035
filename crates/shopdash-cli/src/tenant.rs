//! Tenant management command handlers.

use clap::Subcommand;
use shopdash_core::TenantConfig;
use shopdash_engine::TenantRegistry;

use crate::Services;

/// Sub-commands available under `tenant`.
#[derive(Debug, Subcommand)]
pub enum TenantCommands {
    /// Register a tenant if it does not exist yet
    Ensure { id: String },
    /// Set the shop domain and Admin API access token
    SetCredentials {
        id: String,
        /// e.g. acme.myshopify.com
        #[arg(long)]
        shop_domain: String,
        #[arg(long, env = "SHOPDASH_ACCESS_TOKEN", hide_env_values = true)]
        access_token: String,
    },
    /// Allow syncs and reports for a tenant
    Activate { id: String },
    /// Block syncs and reports for a tenant
    Deactivate { id: String },
    /// List active tenants
    List,
    /// Call the shop endpoint with the tenant's credentials
    Check { id: String },
}

pub(crate) async fn run(services: &Services, command: TenantCommands) -> anyhow::Result<()> {
    let registry = services.store.as_ref();

    match command {
        TenantCommands::Ensure { id } => {
            let tenant = registry.ensure(&id).await?;
            print_tenant(&tenant);
        }
        TenantCommands::SetCredentials {
            id,
            shop_domain,
            access_token,
        } => {
            let shop_domain = shop_domain.trim();
            if shop_domain.is_empty() || access_token.trim().is_empty() {
                anyhow::bail!("shop domain and access token must both be non-empty");
            }
            shopdash_shopify::shop_origin(shop_domain)?;
            let tenant = registry
                .update_credentials(&id, shop_domain, access_token.trim())
                .await?;
            print_tenant(&tenant);
        }
        TenantCommands::Activate { id } => {
            print_tenant(&registry.set_active(&id, true).await?);
        }
        TenantCommands::Deactivate { id } => {
            print_tenant(&registry.set_active(&id, false).await?);
        }
        TenantCommands::List => {
            let tenants = registry.list_active().await?;
            if tenants.is_empty() {
                println!("no active tenants");
            }
            for tenant in &tenants {
                print_tenant(tenant);
            }
        }
        TenantCommands::Check { id } => {
            let tenant = registry.resolve(&id).await?;
            if !tenant.has_credentials() {
                anyhow::bail!("tenant {id} has no shop domain or access token configured");
            }
            let shop = services.client.shop(&tenant).await?;
            println!("{}", serde_json::to_string_pretty(&shop)?);
        }
    }

    Ok(())
}

fn print_tenant(tenant: &TenantConfig) {
    let shop = if tenant.shop_domain.is_empty() {
        "<unset>"
    } else {
        tenant.shop_domain.as_str()
    };
    println!(
        "tenant {} shop={} active={} credentials={}",
        tenant.id,
        shop,
        tenant.is_active,
        if tenant.has_credentials() { "set" } else { "missing" }
    );
}
