//! Named-resource load/save on top of a [`Transport`].
//!
//! Knows the `/api/setting/<name>` url convention and nothing about what a
//! resource contains.

use crate::{
    error::{ClientError, ClientResult},
    http_client::{Payload, Transport},
};
use log::{debug, error, warn};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;

/// A resource-scoped configuration document (JSON object)
pub type Document = Map<String, Value>;

pub struct SettingsClient<T> {
    transport: Arc<T>,
}

impl<T> Clone for SettingsClient<T> {
    fn clone(&self) -> Self {
        SettingsClient {
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: Transport> SettingsClient<T> {
    pub const SETTING_ENDPOINT: &str = "/api/setting";

    pub fn new(transport: T) -> Self {
        Self::from_shared(Arc::new(transport))
    }

    pub fn from_shared(transport: Arc<T>) -> Self {
        SettingsClient { transport }
    }

    pub fn setting_path(resource: &str) -> String {
        format!("{}/{resource}", Self::SETTING_ENDPOINT)
    }

    /// Load the current document of `resource`
    pub async fn load(&self, resource: &str) -> ClientResult<Document> {
        self.load_json(&Self::setting_path(resource)).await
    }

    /// GET `path` and parse the body as `D`
    pub async fn load_json<D: DeserializeOwned>(&self, path: &str) -> ClientResult<D> {
        let body = self
            .transport
            .get(path)
            .await
            .inspect_err(|e| error!("load {path} failed: {e}"))?;

        serde_json::from_str(&body)
            .map_err(|e| ClientError::parse(format!("GET {path}"), e))
            .inspect_err(|e| error!("{e}"))
    }

    /// Save `document` as the new state of `resource`; true only on a 200 OK response
    pub async fn save(&self, resource: &str, document: &Document) -> bool {
        let body = match serde_json::to_string(document) {
            Ok(body) => body,
            Err(e) => {
                warn!("failed to serialize {resource} document: {e}");
                return false;
            }
        };

        self.post(&Self::setting_path(resource), Payload::Json(body))
            .await
    }

    /// POST a pre-serialized (possibly non-JSON) body to an action endpoint.
    /// An empty `text` sends a request without body.
    pub async fn save_plain(&self, path: &str, text: &str) -> bool {
        let payload = if text.is_empty() {
            Payload::Empty
        } else {
            Payload::Text(text.to_string())
        };

        self.post(path, payload).await
    }

    async fn post(&self, path: &str, payload: Payload) -> bool {
        match self.transport.post(path, payload).await {
            Ok(()) => {
                debug!("POST {path} succeeded");
                true
            }
            Err(e) => {
                warn!("{e}");
                false
            }
        }
    }
}
