//! Typed settings pages on top of the [`ConfigStore`].
//!
//! A page loads its resource, projects the cached document into its typed
//! settings, and turns the fields the user touched into [`FieldEdits`].
//! Whatever the page does not model is carried through by the store.

pub mod gateway;
pub mod mailbox;
pub mod status;
pub mod tcontrole;

use crate::{
    config_store::{ConfigStore, FieldEdits},
    error::{ClientError, ClientResult},
    http_client::Transport,
    settings_client::Document,
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

/// Transient outcome of a save or action (the ok/error toast)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Feedback {
    Success,
    Failure,
}

impl Feedback {
    pub fn from_success(success: bool) -> Self {
        if success {
            Feedback::Success
        } else {
            Feedback::Failure
        }
    }
}

/// State of a page's save button
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum TriggerState {
    /// Nothing loaded yet, disabled
    Loading,
    Ready,
    /// Save outstanding, disabled
    Saving,
}

impl TriggerState {
    pub fn label(self) -> &'static str {
        match self {
            TriggerState::Loading | TriggerState::Ready => "Save Changes",
            TriggerState::Saving => "Saving Changes...",
        }
    }

    pub fn is_enabled(self) -> bool {
        self == TriggerState::Ready
    }
}

/// A named settings resource with its typed projection
pub trait SettingsResource: DeserializeOwned {
    const NAME: &'static str;

    /// Fields the user may touch; unset fields are left alone
    type Edit;

    fn edits(edit: &Self::Edit) -> FieldEdits;
}

/// Load `R` and project it
pub async fn open<R: SettingsResource, T: Transport>(store: &mut ConfigStore<T>) -> ClientResult<R> {
    let projected = project(store.start_editing(R::NAME).await?);

    // a document the page cannot show must not become the base of a save
    if projected.is_err() {
        store.forget(R::NAME);
    }
    projected
}

pub fn project<R: SettingsResource>(document: &Document) -> ClientResult<R> {
    serde_json::from_value(Value::Object(document.clone()))
        .map_err(|e| ClientError::parse(format!("project {}", R::NAME), e))
}

/// Save `edit` on top of the loaded `R`; the store reloads afterwards
pub async fn submit<R: SettingsResource, T: Transport>(
    store: &mut ConfigStore<T>,
    edit: &R::Edit,
) -> ClientResult<Feedback> {
    let saved = store.commit_edit(R::NAME, &R::edits(edit)).await?;
    Ok(Feedback::from_success(saved))
}

pub fn trigger_state<R: SettingsResource, T: Transport>(store: &ConfigStore<T>) -> TriggerState {
    if store.locks().is_locked(R::NAME) {
        TriggerState::Saving
    } else if store.cached(R::NAME).is_none() {
        TriggerState::Loading
    } else {
        TriggerState::Ready
    }
}
