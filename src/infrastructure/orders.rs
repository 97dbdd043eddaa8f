//! Client for the store's order-status REST API.

use crate::infrastructure::config::{AppConfig, OrdersConfig};
use async_trait::async_trait;
use di::{Ref, inject, injectable};
use log::warn;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrderLookupError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("order API answered with status {0}")]
    Status(u16),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatus {
    pub id: serde_json::Value,
    #[serde(default)]
    pub number: Option<String>,
    pub status: String,
    #[serde(default)]
    pub total: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub date_created: Option<String>,
    #[serde(default)]
    pub tracking_number: Option<String>,
}

#[async_trait]
pub trait OrderStatusApi: Send + Sync {
    /// Looks an order up by id. `Ok(None)` when the store does not know it.
    async fn fetch_order(&self, order_id: &str) -> Result<Option<OrderStatus>, OrderLookupError>;
}

pub struct HttpOrderStatusApi {
    client: reqwest::Client,
    config: OrdersConfig,
}

#[injectable(OrderStatusApi)]
impl HttpOrderStatusApi {
    #[inject]
    pub fn create(config: Ref<AppConfig>) -> HttpOrderStatusApi {
        HttpOrderStatusApi::new(config.orders.clone())
    }
}

impl HttpOrderStatusApi {
    pub fn new(config: OrdersConfig) -> HttpOrderStatusApi {
        HttpOrderStatusApi {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl OrderStatusApi for HttpOrderStatusApi {
    async fn fetch_order(&self, order_id: &str) -> Result<Option<OrderStatus>, OrderLookupError> {
        let url = format!(
            "{}/orders/{}",
            self.config.api_base.trim_end_matches('/'),
            order_id
        );

        let response = self
            .client
            .get(url)
            .basic_auth(&self.config.api_key, Some(&self.config.api_secret))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json().await?)),
            status => {
                warn!("order API answered {status} for order {order_id}");
                Err(OrderLookupError::Status(status.as_u16()))
            }
        }
    }
}
