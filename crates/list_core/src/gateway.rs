//! Typed access to the remote item service.

use std::{collections::BTreeSet, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use shared::{
    domain::{Item, ItemId},
    protocol::{
        Envelope, ItemsPage, ListItemsQuery, SaveOrderRequest, SaveSelectedRequest, StatePayload,
    },
};
use tracing::{debug, warn};
use url::Url;

use crate::error::GatewayError;

pub type SelectionSet = BTreeSet<ItemId>;

/// One fetched page, consumed by the store and then dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub items: Vec<Item>,
    pub total: u64,
    pub page_number: u32,
}

/// Canonical order and selection as held by the service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteState {
    pub order: Vec<ItemId>,
    pub selection: SelectionSet,
}

impl From<ItemsPage> for Page {
    fn from(value: ItemsPage) -> Self {
        Self {
            items: value.items,
            total: value.total,
            page_number: value.page,
        }
    }
}

impl From<StatePayload> for RemoteState {
    fn from(value: StatePayload) -> Self {
        Self {
            order: value.order,
            selection: value.selected.into_iter().collect(),
        }
    }
}

/// The four remote operations the list depends on. Implementations must not
/// retry; retry policy belongs to the caller.
#[async_trait]
pub trait StateGateway: Send + Sync {
    async fn fetch_page(&self, page: u32, limit: u32, term: &str) -> Result<Page, GatewayError>;
    async fn fetch_state(&self) -> Result<RemoteState, GatewayError>;
    async fn save_order(&self, order: &[ItemId]) -> Result<RemoteState, GatewayError>;
    async fn save_selection(&self, selected: &[ItemId]) -> Result<RemoteState, GatewayError>;
}

pub struct HttpStateGateway {
    http: Client,
    base: Url,
    timeout: Duration,
}

impl HttpStateGateway {
    pub fn new(server_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Network(format!("failed to build http client: {e}")))?;
        Ok(Self {
            http,
            base: base_url(server_url)?,
            timeout,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        self.base
            .join(path)
            .map_err(|e| GatewayError::Malformed(format!("invalid endpoint '{path}': {e}")))
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T, GatewayError> {
        let response = request.send().await.map_err(|e| self.transport(e))?;
        let status = response.status();
        let body = response.bytes().await.map_err(|e| self.transport(e))?;

        let envelope: Envelope<T> = match serde_json::from_slice(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                warn!(operation, status = status.as_u16(), "service answered without envelope");
                return Err(GatewayError::Service {
                    status_code: status.as_u16(),
                    message: status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string(),
                });
            }
            Err(e) => return Err(GatewayError::Malformed(format!("{operation}: {e}"))),
        };

        envelope.into_result().map_err(|e| {
            warn!(operation, status = e.status_code, error = %e.message, "service rejected request");
            GatewayError::from(e)
        })
    }

    fn transport(&self, error: reqwest::Error) -> GatewayError {
        if error.is_timeout() {
            GatewayError::Timeout(self.timeout)
        } else {
            GatewayError::from(error)
        }
    }
}

#[async_trait]
impl StateGateway for HttpStateGateway {
    async fn fetch_page(&self, page: u32, limit: u32, term: &str) -> Result<Page, GatewayError> {
        debug!(page, limit, term, "fetching item page");
        let request = self.http.get(self.endpoint("items")?).query(&ListItemsQuery {
            page,
            limit,
            search: term.to_string(),
        });
        let payload: ItemsPage = self.send("list_page", request).await?;
        Ok(payload.into())
    }

    async fn fetch_state(&self) -> Result<RemoteState, GatewayError> {
        debug!("fetching list state");
        let request = self.http.get(self.endpoint("items/state")?);
        let payload: StatePayload = self.send("get_state", request).await?;
        Ok(payload.into())
    }

    async fn save_order(&self, order: &[ItemId]) -> Result<RemoteState, GatewayError> {
        debug!(len = order.len(), "saving item order");
        let request = self
            .http
            .post(self.endpoint("items/order")?)
            .json(&SaveOrderRequest {
                order: order.to_vec(),
            });
        let payload: StatePayload = self.send("save_order", request).await?;
        Ok(payload.into())
    }

    async fn save_selection(&self, selected: &[ItemId]) -> Result<RemoteState, GatewayError> {
        debug!(len = selected.len(), "saving selection");
        let request = self
            .http
            .post(self.endpoint("items/selected")?)
            .json(&SaveSelectedRequest {
                selected: selected.to_vec(),
            });
        let payload: StatePayload = self.send("save_selection", request).await?;
        Ok(payload.into())
    }
}

/// Parses the service root. A trailing slash is appended so endpoint joins
/// keep any path prefix (`http://host/api` → `http://host/api/items`).
pub fn base_url(server_url: &str) -> Result<Url, GatewayError> {
    let trimmed = server_url.trim();
    let normalized = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    let url = Url::parse(&normalized)
        .map_err(|e| GatewayError::Malformed(format!("invalid server url '{trimmed}': {e}")))?;
    if url.cannot_be_a_base() {
        return Err(GatewayError::Malformed(format!(
            "server url '{trimmed}' cannot serve as a base"
        )));
    }
    Ok(url)
}

#[cfg(test)]
#[path = "tests/gateway_tests.rs"]
mod tests;
