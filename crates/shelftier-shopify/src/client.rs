use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use shelftier_core::{AccountingPolicy, OrderRecord, ShopifySettings};
use shelftier_engine::SalesWindow;

use crate::error::ShopifyError;
use crate::normalize::normalize_order;
use crate::query::{search_query, ORDERS_QUERY, PAGE_SIZE};
use crate::retry::retry_with_backoff;
use crate::types::{GraphQlResponse, OrdersData};

/// Upper bound on order pages per window. Guards against cursors that cycle.
const MAX_PAGES: usize = 500;

const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

/// Client for the Shopify Admin GraphQL API, scoped to a single store.
///
/// Every request is retried on throttling (HTTP 429 or a `THROTTLED` GraphQL
/// error), network failures and 5xx responses, up to `max_attempts` calls in
/// total.
pub struct ShopifyOrdersClient {
    client: Client,
    endpoint: String,
    access_token: String,
    max_attempts: u32,
    backoff_base_ms: u64,
    inter_delay_ms: u64,
}

impl std::fmt::Debug for ShopifyOrdersClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifyOrdersClient")
            .field("endpoint", &self.endpoint)
            .field("access_token", &"[redacted]")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl ShopifyOrdersClient {
    /// Builds a client for the store described by `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`ShopifyError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(settings: &ShopifySettings) -> Result<Self, ShopifyError> {
        Self::with_endpoint(settings, settings.graphql_url())
    }

    /// Like [`Self::new`] but posting to `endpoint` instead of the store's
    /// Admin API URL.
    ///
    /// # Errors
    ///
    /// Returns [`ShopifyError::Http`] if the `reqwest::Client` cannot be built.
    pub fn with_endpoint(
        settings: &ShopifySettings,
        endpoint: impl Into<String>,
    ) -> Result<Self, ShopifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            access_token: settings.admin_token.clone(),
            max_attempts: settings.retry_max.max(1),
            backoff_base_ms: settings.min_delay_ms,
            inter_delay_ms: settings.inter_delay_ms,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post_once<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: &Value,
    ) -> Result<T, ShopifyError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(ACCESS_TOKEN_HEADER, &self.access_token)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ShopifyError::Throttled);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ShopifyError::UnexpectedStatus {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        let body = response.text().await?;
        let parsed: GraphQlResponse<T> =
            serde_json::from_str(&body).map_err(|e| ShopifyError::Deserialize {
                context: "GraphQL response".to_string(),
                source: e,
            })?;

        if parsed.errors.iter().any(|e| e.is_throttled()) {
            return Err(ShopifyError::Throttled);
        }
        if !parsed.errors.is_empty() {
            let message = parsed
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ShopifyError::GraphQl(message));
        }
        parsed
            .data
            .ok_or_else(|| ShopifyError::GraphQl("response carried no data".to_string()))
    }

    /// Posts a GraphQL document and decodes its `data` payload.
    ///
    /// # Errors
    ///
    /// - [`ShopifyError::Throttled`] when throttling persists past the last attempt.
    /// - [`ShopifyError::GraphQl`] for non-throttling GraphQL errors (not retried).
    /// - [`ShopifyError::UnexpectedStatus`] for other non-2xx responses.
    /// - [`ShopifyError::Deserialize`] when the body does not match `T`.
    pub async fn graphql<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
    ) -> Result<T, ShopifyError> {
        let data = retry_with_backoff(self.max_attempts, self.backoff_base_ms, || {
            self.post_once::<T>(query, &variables)
        })
        .await?;
        if self.inter_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.inter_delay_ms)).await;
        }
        Ok(data)
    }

    /// Fetches every order selected by `window` on the policy's time field,
    /// following `pageInfo.hasNextPage` until exhausted.
    ///
    /// # Errors
    ///
    /// Propagates any error from [`Self::graphql`]. Returns
    /// [`ShopifyError::PaginationLimit`] past [`MAX_PAGES`] pages.
    pub async fn fetch_orders(
        &self,
        window: &SalesWindow,
        policy: &AccountingPolicy,
    ) -> Result<Vec<OrderRecord>, ShopifyError> {
        let search = search_query(policy.time_field, window, &policy.extra_query);
        let mut orders = Vec::new();
        let mut after: Option<String> = None;
        let mut page_count = 0usize;

        loop {
            page_count += 1;
            if page_count > MAX_PAGES {
                return Err(ShopifyError::PaginationLimit {
                    max_pages: MAX_PAGES,
                });
            }

            let data: OrdersData = self
                .graphql(
                    ORDERS_QUERY,
                    json!({ "first": PAGE_SIZE, "after": after, "query": search }),
                )
                .await?;

            let has_next = data.orders.page_info.has_next_page;
            let last_cursor = data.orders.edges.last().and_then(|e| e.cursor.clone());
            orders.extend(data.orders.edges.into_iter().map(|e| normalize_order(e.node)));

            tracing::debug!(
                page = page_count,
                fetched = orders.len(),
                has_next,
                "fetched orders page"
            );

            match (has_next, last_cursor) {
                (true, Some(cursor)) => after = Some(cursor),
                _ => break,
            }
        }

        tracing::info!(
            orders = orders.len(),
            pages = page_count,
            from = %window.from,
            to = %window.to,
            "fetched Shopify orders"
        );
        Ok(orders)
    }
}
