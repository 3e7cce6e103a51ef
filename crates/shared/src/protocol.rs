use serde::{Deserialize, Serialize};

use crate::{
    domain::{Item, ItemId},
    error::EnvelopeError,
};

/// Wrapper every endpoint of the item service answers with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub status_code: u16,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status_code: 200,
            message: "OK".to_string(),
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(status_code: u16, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            status_code,
            message: error.clone(),
            data: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && (200..300).contains(&self.status_code)
    }

    /// Unwraps the payload. A non-null `error`, a non-2xx `statusCode` or a
    /// missing `data` field on an otherwise successful answer are all failures.
    pub fn into_result(self) -> Result<T, EnvelopeError> {
        if !self.is_success() {
            let message = self
                .error
                .filter(|error| !error.is_empty())
                .unwrap_or(self.message);
            return Err(EnvelopeError::new(self.status_code, message));
        }
        self.data
            .ok_or_else(|| EnvelopeError::new(self.status_code, "response carried no data"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListItemsQuery {
    pub page: u32,
    pub limit: u32,
    #[serde(default)]
    pub search: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemsPage {
    pub items: Vec<Item>,
    pub total: u64,
    pub page: u32,
    #[serde(default)]
    pub total_pages: u32,
}

/// Canonical order and selection. Returned by get-state and by both save calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatePayload {
    #[serde(default)]
    pub order: Vec<ItemId>,
    #[serde(default)]
    pub selected: Vec<ItemId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveOrderRequest {
    pub order: Vec<ItemId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveSelectedRequest {
    pub selected: Vec<ItemId>,
}
