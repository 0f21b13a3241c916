//! Sales data sources behind the HTTP handlers.

use std::sync::Arc;

use shelftier_core::{AccountingPolicy, AppConfig, Channel, SalesSource};
use shelftier_db::DbError;
use shelftier_engine::{summarize_sku, Aggregator, SalesInput, SalesWindow, SkuSummary};
use shelftier_shopify::{ShopifyError, ShopifyOrdersClient};
use sqlx::PgPool;
use thiserror::Error;

#[cfg(test)]
use shelftier_core::OrderRecord;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Shopify(#[from] ShopifyError),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("{0} source is not configured")]
    NotConfigured(&'static str),
}

#[derive(Clone)]
pub enum SalesProvider {
    /// Orders fetched per window from the Admin GraphQL API.
    Shopify(Arc<ShopifyOrdersClient>),
    /// Pre-aggregated tiering tables; the window is not applied.
    Postgres(PgPool),
    /// Fixed orders filtered locally on the policy time field.
    #[cfg(test)]
    Memory(Arc<Vec<OrderRecord>>),
}

impl std::fmt::Debug for SalesProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl SalesProvider {
    /// Builds the provider selected by `SHELFTIER_SOURCE`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the selected source lacks settings or
    /// its client cannot be constructed.
    pub fn from_config(config: &AppConfig) -> Result<Self, ProviderError> {
        match config.source {
            SalesSource::Shopify => {
                let settings = config
                    .shopify
                    .as_ref()
                    .ok_or(ProviderError::NotConfigured("shopify"))?;
                let client = ShopifyOrdersClient::new(settings)?;
                tracing::info!(endpoint = client.endpoint(), "using Shopify sales source");
                Ok(Self::Shopify(Arc::new(client)))
            }
            SalesSource::Postgres => {
                let pool = shelftier_db::connect_pool_from_config(config)?;
                tracing::info!("using Postgres tiering tables as sales source");
                Ok(Self::Postgres(pool))
            }
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Shopify(_) => "shopify",
            Self::Postgres(_) => "postgres",
            #[cfg(test)]
            Self::Memory(_) => "memory",
        }
    }

    /// One [`SalesInput`] per requested channel for `window`.
    ///
    /// Orders are fetched once and shared across channels; the aggregator
    /// applies the channel filter.
    ///
    /// # Errors
    ///
    /// Propagates transport failures from the underlying source.
    pub async fn sales(
        &self,
        channels: &[Channel],
        window: &SalesWindow,
        policy: &AccountingPolicy,
    ) -> Result<Vec<SalesInput>, ProviderError> {
        match self {
            Self::Shopify(client) => {
                let orders = client.fetch_orders(window, policy).await?;
                Ok(channels
                    .iter()
                    .map(|_| SalesInput::Orders(orders.clone()))
                    .collect())
            }
            Self::Postgres(pool) => {
                let mut inputs = Vec::with_capacity(channels.len());
                for &channel in channels {
                    let rows =
                        shelftier_db::fetch_tiering_rows(pool, channel, &policy.sku_prefix).await?;
                    inputs.push(SalesInput::Aggregated(rows));
                }
                Ok(inputs)
            }
            #[cfg(test)]
            Self::Memory(orders) => {
                let selected = window.select(orders, policy.time_field);
                Ok(channels
                    .iter()
                    .map(|_| SalesInput::Orders(selected.clone()))
                    .collect())
            }
        }
    }

    /// Exact-SKU totals for `window`.
    ///
    /// # Errors
    ///
    /// Propagates transport failures from the underlying source.
    pub async fn sku_summary(
        &self,
        aggregator: &Aggregator,
        sku: &str,
        channel: Channel,
        window: &SalesWindow,
        policy: &AccountingPolicy,
    ) -> Result<SkuSummary, ProviderError> {
        match self {
            Self::Shopify(client) => {
                let orders = client.fetch_orders(window, policy).await?;
                Ok(summarize_sku(aggregator, &orders, sku, channel))
            }
            Self::Postgres(pool) => Ok(shelftier_db::fetch_sku_totals(pool, channel, sku).await?),
            #[cfg(test)]
            Self::Memory(orders) => {
                let selected = window.select(orders, policy.time_field);
                Ok(summarize_sku(aggregator, &selected, sku, channel))
            }
        }
    }

    /// # Errors
    ///
    /// Returns [`ProviderError::Db`] when the database cannot be reached.
    pub async fn health(&self) -> Result<(), ProviderError> {
        if let Self::Postgres(pool) = self {
            shelftier_db::health_check(pool).await?;
        }
        Ok(())
    }
}
