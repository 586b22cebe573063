use super::SettingsResource;
use crate::config_store::FieldEdits;
use serde::Deserialize;

/// Modbus connection to the inverter
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct GatewaySettings {
    pub address: String,
    pub port: u16,
    pub node: u16,
    pub pollrate: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GatewayEdit {
    pub address: Option<String>,
    pub port: Option<u16>,
    pub node: Option<u16>,
    pub pollrate: Option<u32>,
}

impl SettingsResource for GatewaySettings {
    const NAME: &'static str = "gateway";
    type Edit = GatewayEdit;

    fn edits(edit: &GatewayEdit) -> FieldEdits {
        let mut edits = FieldEdits::new();
        if let Some(address) = &edit.address {
            edits.insert("address", address.as_str());
        }
        if let Some(port) = edit.port {
            edits.insert("port", port);
        }
        if let Some(node) = edit.node {
            edits.insert("node", node);
        }
        if let Some(pollrate) = edit.pollrate {
            edits.insert("pollrate", pollrate);
        }
        edits
    }
}
