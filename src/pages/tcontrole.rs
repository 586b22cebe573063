//! Thermal control settings.
//!
//! The serial device list must be fetched before the settings document, the
//! page is composed from both in [`open`].

use super::{Feedback, SettingsResource};
use crate::{
    config_store::{ConfigStore, FieldEdits},
    error::ClientResult,
    http_client::Transport,
    pages,
};
use log::{info, warn};
use serde::Deserialize;

pub const SERIAL_LIST_ENDPOINT: &str = "/api/serial/list";

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct DeviceList {
    pub devices: Vec<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct SerialSettings {
    pub device: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct TControleSettings {
    pub serial: SerialSettings,
    #[serde(rename = "cooloff-time")]
    pub cooloff_time: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TControleEdit {
    /// `None` or empty keeps the configured device
    pub device: Option<String>,
    pub cooloff_time: Option<u32>,
}

impl SettingsResource for TControleSettings {
    const NAME: &'static str = "tcontrole";
    type Edit = TControleEdit;

    fn edits(edit: &TControleEdit) -> FieldEdits {
        let mut edits = FieldEdits::new();
        if let Some(device) = edit.device.as_deref().filter(|device| !device.is_empty()) {
            edits.insert("serial.device", device);
        }
        if let Some(cooloff_time) = edit.cooloff_time {
            edits.insert("cooloff-time", cooloff_time);
        }
        edits
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceSelection {
    pub options: Vec<String>,
    /// Device the controller is configured with
    pub current: String,
    /// `current`, if it is one of the discovered options
    pub selected: Option<String>,
}

impl DeviceSelection {
    pub fn new(devices: &DeviceList, current: &str) -> Self {
        let selected = devices
            .devices
            .iter()
            .find(|device| *device == current)
            .cloned();

        DeviceSelection {
            options: devices.devices.clone(),
            current: current.to_string(),
            selected,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TControlePage {
    pub devices: DeviceList,
    pub settings: TControleSettings,
    pub selection: DeviceSelection,
}

impl TControlePage {
    pub fn new(devices: DeviceList, settings: TControleSettings) -> Self {
        let selection = DeviceSelection::new(&devices, &settings.serial.device);
        TControlePage {
            devices,
            settings,
            selection,
        }
    }
}

/// Load the device list, then the settings it is presented against
pub async fn open<T: Transport>(store: &mut ConfigStore<T>) -> ClientResult<TControlePage> {
    let devices: DeviceList = store.client().load_json(SERIAL_LIST_ENDPOINT).await?;
    info!("discovered {} serial devices", devices.devices.len());

    let settings = pages::open::<TControleSettings, _>(store).await?;
    Ok(TControlePage::new(devices, settings))
}

/// Save `edit` and refresh `page` from the reloaded document.
///
/// The device list is not fetched again.
pub async fn submit<T: Transport>(
    store: &mut ConfigStore<T>,
    page: &mut TControlePage,
    edit: &TControleEdit,
) -> ClientResult<Feedback> {
    let feedback = pages::submit::<TControleSettings, _>(store, edit).await?;

    match store.cached(TControleSettings::NAME).map(pages::project::<TControleSettings>) {
        Some(Ok(settings)) => *page = TControlePage::new(page.devices.clone(), settings),
        Some(Err(e)) => {
            warn!("keeping previous tcontrole view: {e}");
            store.forget(TControleSettings::NAME);
        }
        None => warn!("keeping previous tcontrole view: reload failed"),
    }

    Ok(feedback)
}
