//! Cached settings documents with merge-on-save.
//!
//! A page edits a subset of a document's fields. The edits are applied on top
//! of the last loaded document so that fields the page does not know about are
//! sent back unchanged.

use crate::{
    error::{ClientError, ClientResult},
    http_client::Transport,
    request_lock::RequestLocks,
    settings_client::{Document, SettingsClient},
};
use log::{error, info, warn};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Field overrides addressed by dot-separated paths (`"serial.device"`).
///
/// An object value is merged into an existing object instead of replacing it.
/// Arrays and scalars replace whatever is stored at their path.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldEdits {
    edits: Vec<(String, Value)>,
}

impl FieldEdits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, path: &str, value: impl Into<Value>) -> Self {
        self.insert(path, value);
        self
    }

    pub fn insert(&mut self, path: &str, value: impl Into<Value>) {
        self.edits.push((path.to_string(), value.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    /// Apply all edits in insertion order onto `document`
    pub fn apply_to(&self, document: &mut Document) {
        for (path, value) in &self.edits {
            apply_edit(document, path, value.clone());
        }
    }
}

fn apply_edit(document: &mut Document, path: &str, value: Value) {
    let mut segments: Vec<&str> = path.split('.').collect();
    let Some(key) = segments.pop() else {
        return;
    };

    let mut current = document;
    for segment in segments {
        let slot = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));

        // a scalar in the way of a nested edit is replaced by an object
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }

        let Some(next) = slot.as_object_mut() else {
            return;
        };
        current = next;
    }

    merge_value(current, key, value);
}

fn merge_value(target: &mut Document, key: &str, value: Value) {
    if let Value::Object(overrides) = value {
        if let Some(Value::Object(existing)) = target.get_mut(key) {
            for (nested_key, nested_value) in overrides {
                merge_value(existing, &nested_key, nested_value);
            }
            return;
        }

        target.insert(key.to_string(), Value::Object(overrides));
        return;
    }

    target.insert(key.to_string(), value);
}

/// Last loaded document per resource plus the save path merging edits into it
pub struct ConfigStore<T> {
    client: SettingsClient<T>,
    documents: HashMap<String, Document>,
    locks: RequestLocks,
}

impl<T: Transport> ConfigStore<T> {
    pub fn new(client: SettingsClient<T>) -> Self {
        Self::with_locks(client, RequestLocks::new())
    }

    pub fn with_locks(client: SettingsClient<T>, locks: RequestLocks) -> Self {
        ConfigStore {
            client,
            documents: HashMap::new(),
            locks,
        }
    }

    pub fn client(&self) -> &SettingsClient<T> {
        &self.client
    }

    pub fn locks(&self) -> RequestLocks {
        self.locks.clone()
    }

    /// The authoritative document of `resource`, if one is loaded
    pub fn cached(&self, resource: &str) -> Option<&Document> {
        self.documents.get(resource)
    }

    /// Drop the cached document of `resource`, returning its page to the loading state
    pub fn forget(&mut self, resource: &str) {
        if self.documents.remove(resource).is_some() {
            warn!("discarded cached {resource} settings");
        }
    }

    /// Load `resource` and make it the base of subsequent commits
    pub async fn start_editing(&mut self, resource: &str) -> ClientResult<&Document> {
        let _guard = self
            .locks
            .try_acquire(resource)
            .ok_or_else(|| ClientError::Busy(resource.to_string()))?;

        self.reload(resource).await
    }

    /// Merge `edits` into the cached document of `resource` and save it.
    ///
    /// Resolves to whether the controller accepted the save. In both cases the
    /// document is reloaded afterwards so the cache reflects the controller's
    /// state rather than the local copy.
    pub async fn commit_edit(&mut self, resource: &str, edits: &FieldEdits) -> ClientResult<bool> {
        let _guard = self
            .locks
            .try_acquire(resource)
            .ok_or_else(|| ClientError::Busy(resource.to_string()))?;

        let Some(document) = self.documents.get_mut(resource) else {
            warn!("refusing to save {resource}: no document loaded");
            return Err(ClientError::NotLoaded(resource.to_string()));
        };

        edits.apply_to(document);
        let saved = self.client.save(resource, document).await;

        if saved {
            info!("saved {resource} settings ({} edits)", edits.len());
        } else {
            warn!("saving {resource} settings failed");
        }

        if let Err(e) = self.reload(resource).await {
            error!("reloading {resource} after save failed: {e}");
        }

        Ok(saved)
    }

    async fn reload(&mut self, resource: &str) -> ClientResult<&Document> {
        match self.client.load(resource).await {
            Ok(document) => {
                info!("loaded {resource} settings");
                let slot = self.documents.entry(resource.to_string()).or_default();
                *slot = document;
                Ok(&*slot)
            }
            Err(e) => {
                // a page without a confirmed document stays in its loading state
                self.documents.remove(resource);
                Err(e)
            }
        }
    }
}
