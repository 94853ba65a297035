use std::net::IpAddr;
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use reqwest::header::{HeaderMap, LINK, RETRY_AFTER};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use shopdash_core::{AppConfig, ResourceKind, TenantConfig};

use crate::error::SourceError;
use crate::pagination::next_page_info;
use crate::types::{CountResponse, ShopEnvelope, ShopInfo, ShopifyCheckout};

/// Largest `limit` the Admin REST API accepts on list endpoints.
pub const MAX_PAGE_SIZE: u32 = 250;

const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

/// Used when a 429 arrives without a parseable `Retry-After`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 2;

/// One page of a list endpoint: the raw records plus the cursor for the next
/// page, if the `Link` header advertised one.
#[derive(Debug, Clone)]
pub struct Page {
    pub records: Vec<Value>,
    pub next_page_info: Option<String>,
}

/// Paginated list endpoints the client knows how to walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Listing {
    Collection(ResourceKind),
    AbandonedCheckouts,
}

impl Listing {
    pub(crate) fn path(self) -> &'static str {
        match self {
            Listing::Collection(ResourceKind::Customers) => "customers.json",
            Listing::Collection(ResourceKind::Products) => "products.json",
            Listing::Collection(ResourceKind::Orders) => "orders.json",
            Listing::AbandonedCheckouts => "checkouts.json",
        }
    }

    /// Key of the array in the response body.
    pub(crate) fn envelope_key(self) -> &'static str {
        match self {
            Listing::Collection(kind) => kind.as_str(),
            Listing::AbandonedCheckouts => "checkouts",
        }
    }

    /// Filters sent on the first request only. Shopify rejects any parameter
    /// other than `limit` alongside `page_info`, and the cursor already
    /// encodes the original filters.
    pub(crate) fn first_page_filters(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Listing::Collection(ResourceKind::Orders) => &[("status", "any")],
            Listing::AbandonedCheckouts => &[("status", "abandoned")],
            Listing::Collection(_) => &[],
        }
    }
}

enum Cursor {
    Start,
    Next { page_info: String, fetched: usize },
    Done,
}

/// Client for the Shopify Admin REST API, shared by every tenant.
///
/// Each call takes the [`TenantConfig`] whose shop domain and access token
/// it should use. Nothing is retried: a failed page surfaces immediately as a
/// [`SourceError`] and the caller decides what to do with what it already
/// received.
#[derive(Debug, Clone)]
pub struct ShopifyClient {
    client: Client,
    api_version: String,
    max_pages: usize,
}

impl ShopifyClient {
    /// Creates a client with the given request timeout and `User-Agent`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Unavailable`] if the underlying
    /// `reqwest::Client` cannot be constructed.
    pub fn new(
        timeout_secs: u64,
        user_agent: &str,
        api_version: &str,
        max_pages: usize,
    ) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.min(10)))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            api_version: api_version.to_owned(),
            max_pages,
        })
    }

    /// # Errors
    ///
    /// See [`Self::new`].
    pub fn from_app_config(config: &AppConfig) -> Result<Self, SourceError> {
        Self::new(
            config.shopify_request_timeout_secs,
            &config.shopify_user_agent,
            &config.shopify_api_version,
            config.shopify_max_pages,
        )
    }

    #[must_use]
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Fetches a single page of `kind`. Pass the `page_info` cursor from the
    /// previous [`Page`] to continue; `None` starts from the beginning.
    ///
    /// # Errors
    ///
    /// Any [`SourceError`] from the request or from decoding the body.
    pub async fn fetch_page(
        &self,
        tenant: &TenantConfig,
        kind: ResourceKind,
        page_size: u32,
        page_info: Option<&str>,
    ) -> Result<Page, SourceError> {
        self.fetch_listing_page(tenant, Listing::Collection(kind), page_size, page_info)
            .await
    }

    /// Streams every record of `kind`, following `Link` cursors until the
    /// last page. Records arrive in source order.
    ///
    /// The stream yields an error and ends if any page fails or if more than
    /// `max_pages` pages would be needed. Records yielded before the error
    /// remain valid.
    pub fn fetch_collection<'a>(
        &'a self,
        tenant: &'a TenantConfig,
        kind: ResourceKind,
        page_size: u32,
    ) -> BoxStream<'a, Result<Value, SourceError>> {
        self.paginate(tenant, Listing::Collection(kind), page_size)
    }

    /// Every abandoned checkout of the shop. Entries that do not decode are
    /// skipped with a warning.
    ///
    /// # Errors
    ///
    /// Any [`SourceError`] from fetching a page.
    pub async fn abandoned_checkouts(
        &self,
        tenant: &TenantConfig,
    ) -> Result<Vec<ShopifyCheckout>, SourceError> {
        let raw: Vec<Value> = self
            .paginate(tenant, Listing::AbandonedCheckouts, MAX_PAGE_SIZE)
            .try_collect()
            .await?;

        let checkouts = raw
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<ShopifyCheckout>(value) {
                Ok(checkout) => Some(checkout),
                Err(e) => {
                    tracing::warn!(
                        tenant_id = %tenant.id,
                        error = %e,
                        "skipping malformed abandoned checkout"
                    );
                    None
                }
            })
            .collect();
        Ok(checkouts)
    }

    /// Number of orders in any status.
    ///
    /// # Errors
    ///
    /// Any [`SourceError`] from the request or from decoding the body.
    pub async fn count_orders(&self, tenant: &TenantConfig) -> Result<u64, SourceError> {
        let mut url = self.endpoint(tenant, "orders/count.json")?;
        url.query_pairs_mut().append_pair("status", "any");
        let response: CountResponse = self.get_typed(tenant, url, "order count").await?;
        Ok(response.count)
    }

    /// Shop metadata. Used to verify a tenant's credentials.
    ///
    /// # Errors
    ///
    /// Any [`SourceError`] from the request or from decoding the body.
    pub async fn shop(&self, tenant: &TenantConfig) -> Result<ShopInfo, SourceError> {
        let url = self.endpoint(tenant, "shop.json")?;
        let envelope: ShopEnvelope = self.get_typed(tenant, url, "shop").await?;
        Ok(envelope.shop)
    }

    fn paginate<'a>(
        &'a self,
        tenant: &'a TenantConfig,
        listing: Listing,
        page_size: u32,
    ) -> BoxStream<'a, Result<Value, SourceError>> {
        let limit = page_size.clamp(1, MAX_PAGE_SIZE);

        stream::try_unfold(Cursor::Start, move |cursor| async move {
            let (page_info, fetched) = match cursor {
                Cursor::Done => return Ok(None),
                Cursor::Start => (None, 0),
                Cursor::Next { page_info, fetched } => (Some(page_info), fetched),
            };

            if fetched >= self.max_pages {
                return Err(SourceError::PaginationLimit {
                    shop_domain: tenant.shop_domain.clone(),
                    max_pages: self.max_pages,
                });
            }

            let page = self
                .fetch_listing_page(tenant, listing, limit, page_info.as_deref())
                .await?;
            let next = match page.next_page_info {
                Some(page_info) => Cursor::Next {
                    page_info,
                    fetched: fetched + 1,
                },
                None => Cursor::Done,
            };
            Ok(Some((page.records, next)))
        })
        .map_ok(|records| stream::iter(records.into_iter().map(Ok)))
        .try_flatten()
        .boxed()
    }

    async fn fetch_listing_page(
        &self,
        tenant: &TenantConfig,
        listing: Listing,
        page_size: u32,
        page_info: Option<&str>,
    ) -> Result<Page, SourceError> {
        let mut url = self.endpoint(tenant, listing.path())?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &page_size.clamp(1, MAX_PAGE_SIZE).to_string());
            match page_info {
                Some(cursor) => {
                    query.append_pair("page_info", cursor);
                }
                None => {
                    for (key, value) in listing.first_page_filters() {
                        query.append_pair(key, value);
                    }
                }
            }
        }

        tracing::debug!(
            tenant_id = %tenant.id,
            listing = listing.envelope_key(),
            cursor = page_info.unwrap_or("<start>"),
            "fetching page"
        );

        let (body, link) = self.get_json(tenant, url.clone()).await?;
        let records = match body {
            Value::Object(mut map) => match map.remove(listing.envelope_key()) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            },
            _ => None,
        }
        .ok_or_else(|| SourceError::MissingEnvelope {
            url: url.to_string(),
            key: listing.envelope_key(),
        })?;

        Ok(Page {
            records,
            next_page_info: next_page_info(link.as_deref()),
        })
    }

    async fn get_typed<T: DeserializeOwned>(
        &self,
        tenant: &TenantConfig,
        url: Url,
        context: &str,
    ) -> Result<T, SourceError> {
        let (body, _) = self.get_json(tenant, url).await?;
        serde_json::from_value(body).map_err(|source| SourceError::Deserialize {
            context: format!("{context} for {}", tenant.shop_domain),
            source,
        })
    }

    /// Issues the GET and returns the parsed body with the raw `Link` header.
    async fn get_json(
        &self,
        tenant: &TenantConfig,
        url: Url,
    ) -> Result<(Value, Option<String>), SourceError> {
        let response = self
            .client
            .get(url.clone())
            .header(ACCESS_TOKEN_HEADER, &tenant.access_token)
            .send()
            .await?;

        check_status(response.status(), response.headers(), tenant, &url)?;

        // Read the Link header before consuming the response body.
        let link = response
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let text = response.text().await?;
        let body = serde_json::from_str::<Value>(&text).map_err(|source| {
            SourceError::Deserialize {
                context: format!("response from {url}"),
                source,
            }
        })?;
        Ok((body, link))
    }

    fn endpoint(&self, tenant: &TenantConfig, path: &str) -> Result<Url, SourceError> {
        let mut url = shop_origin(&tenant.shop_domain)?;
        url.set_path(&format!("/admin/api/{}/{path}", self.api_version));
        url.set_query(None);
        Ok(url)
    }
}

fn check_status(
    status: StatusCode,
    headers: &HeaderMap,
    tenant: &TenantConfig,
    url: &Url,
) -> Result<(), SourceError> {
    if status.is_success() {
        return Ok(());
    }

    let err = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SourceError::Auth {
            shop_domain: tenant.shop_domain.clone(),
            status: status.as_u16(),
        },
        StatusCode::TOO_MANY_REQUESTS => SourceError::RateLimited {
            shop_domain: tenant.shop_domain.clone(),
            retry_after_secs: headers
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after)
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS),
        },
        StatusCode::NOT_FOUND => SourceError::NotFound {
            url: url.to_string(),
        },
        s if s.is_server_error() => SourceError::ServerError {
            status: s.as_u16(),
            url: url.to_string(),
        },
        s => SourceError::UnexpectedStatus {
            status: s.as_u16(),
            url: url.to_string(),
        },
    };
    Err(err)
}

/// Shopify sends `Retry-After: 2.0`; fractional seconds round up.
pub(crate) fn parse_retry_after(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    let (whole, fraction) = raw.split_once('.').unwrap_or((raw, ""));
    if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let secs = whole.parse::<u64>().ok()?;
    if fraction.bytes().any(|b| b != b'0') {
        Some(secs.saturating_add(1))
    } else {
        Some(secs)
    }
}

/// Resolves a tenant's shop domain to the origin requests are sent to.
///
/// A bare domain (`acme.myshopify.com`) is served over HTTPS. An explicit
/// `https://` prefix is kept as given. Plain `http://` is accepted only for
/// loopback hosts.
///
/// # Errors
///
/// Returns [`SourceError::InvalidShopDomain`] if the domain is blank, does
/// not parse as a URL, or asks for plain HTTP to a non-loopback host.
pub fn shop_origin(shop_domain: &str) -> Result<Url, SourceError> {
    let trimmed = shop_domain.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(SourceError::InvalidShopDomain {
            shop_domain: shop_domain.to_owned(),
            reason: "empty".to_owned(),
        });
    }

    let candidate = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_owned()
    } else {
        format!("https://{trimmed}")
    };

    let url = Url::parse(&candidate).map_err(|e| SourceError::InvalidShopDomain {
        shop_domain: shop_domain.to_owned(),
        reason: e.to_string(),
    })?;
    if url.host_str().is_none_or(str::is_empty) {
        return Err(SourceError::InvalidShopDomain {
            shop_domain: shop_domain.to_owned(),
            reason: "no host".to_owned(),
        });
    }
    if url.scheme() == "http" && !is_loopback(&url) {
        return Err(SourceError::InvalidShopDomain {
            shop_domain: shop_domain.to_owned(),
            reason: "http is only allowed for loopback hosts".to_owned(),
        });
    }
    Ok(url)
}

fn is_loopback(url: &Url) -> bool {
    match url.host_str() {
        Some("localhost") => true,
        Some(host) => host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<IpAddr>()
            .is_ok_and(|ip| ip.is_loopback()),
        None => false,
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
