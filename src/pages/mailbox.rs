use super::SettingsResource;
use crate::config_store::FieldEdits;
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct BrokerSettings {
    pub address: String,
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// MQTT publishing of telemetry
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct MailboxSettings {
    pub broker: BrokerSettings,
    pub basetopic: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MailboxEdit {
    pub address: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub basetopic: Option<String>,
}

impl SettingsResource for MailboxSettings {
    const NAME: &'static str = "mailbox";
    type Edit = MailboxEdit;

    fn edits(edit: &MailboxEdit) -> FieldEdits {
        let mut edits = FieldEdits::new();
        if let Some(address) = &edit.address {
            edits.insert("broker.address", address.as_str());
        }
        if let Some(port) = edit.port {
            edits.insert("broker.port", port);
        }
        if let Some(username) = &edit.username {
            edits.insert("broker.username", username.as_str());
        }
        if let Some(password) = &edit.password {
            edits.insert("broker.password", password.as_str());
        }
        if let Some(basetopic) = &edit.basetopic {
            edits.insert("basetopic", basetopic.as_str());
        }
        edits
    }
}
