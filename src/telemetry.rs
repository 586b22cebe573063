//! Telemetry snapshots and the presentation state derived from them.
//!
//! Every poll replaces the whole snapshot; derived state is recomputed from
//! scratch and never patched.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::fmt::{self, Debug, Display};

/// A snapshot type that can be polled and rendered
pub trait Telemetry: DeserializeOwned {
    type View: Clone + Debug + PartialEq;

    fn derive_view(&self) -> Self::View;
}

/// Numeric reading the controller sends either as JSON number or as numeric string
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reading {
    Number(f64),
    Text(String),
}

impl Reading {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Reading::Number(value) => Some(*value),
            Reading::Text(text) => text.trim().parse().ok(),
        }
    }
}

impl Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::Number(value) => write!(f, "{value}"),
            Reading::Text(text) => f.write_str(text),
        }
    }
}

fn show(reading: Option<&Reading>) -> String {
    reading.map(ToString::to_string).unwrap_or_default()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum OperatingMode {
    Charging,
    Discharging,
    Idle,
}

impl OperatingMode {
    /// A positive setpoint drains the battery, a negative one charges it
    pub fn from_setpoint(setpoint: f64) -> Self {
        if setpoint > 0.0 {
            OperatingMode::Discharging
        } else if setpoint < 0.0 {
            OperatingMode::Charging
        } else {
            OperatingMode::Idle
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OperatingMode::Charging => "Charging",
            OperatingMode::Discharging => "Discharging",
            OperatingMode::Idle => "Idle",
        }
    }
}

impl Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct BatteryReadings {
    pub charge: Reading,
    #[serde(default)]
    pub capacity: Option<Reading>,
    #[serde(default)]
    pub current: Option<Reading>,
    #[serde(default)]
    pub status: Option<Reading>,
    #[serde(default)]
    pub temperature: Option<Reading>,
    #[serde(default)]
    pub voltage: Option<Reading>,
    #[serde(default, rename = "remaining-charging-time")]
    pub remaining_charging_time: Option<Reading>,
    #[serde(default, rename = "remaining-discharging-time")]
    pub remaining_discharging_time: Option<Reading>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct InverterReadings {
    pub setpoint: Reading,
    #[serde(default)]
    pub power: Option<Reading>,
    #[serde(default)]
    pub status: Option<Reading>,
    #[serde(default)]
    pub opstatus: Option<Reading>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct GridReadings {
    #[serde(default)]
    pub voltage: Option<Reading>,
    // the controller spells the key "freqency"
    #[serde(default, rename = "freqency", alias = "frequency")]
    pub frequency: Option<Reading>,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub struct RelayStates {
    pub relay1: bool,
    pub relay2: bool,
    pub relay3: bool,
    pub relay4: bool,
}

impl RelayStates {
    pub fn as_array(self) -> [bool; 4] {
        [self.relay1, self.relay2, self.relay3, self.relay4]
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ThermalControl {
    pub mode: String,
}

/// Live dashboard document
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct DashboardTelemetry {
    pub battery: BatteryReadings,
    pub inverter: InverterReadings,
    #[serde(default)]
    pub grid: GridReadings,
    pub relays: RelayStates,
    pub tcontrol: ThermalControl,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DashboardView {
    /// `None` when the controller sent a non-numeric charge
    pub charge_percent: Option<i64>,
    pub mode: OperatingMode,
    /// Time to full (charging) or to empty (discharging)
    pub remaining_time: Option<String>,
    pub animated: bool,
    pub relays: [bool; 4],
    pub cooloff_pending: bool,
    pub tcontrol_mode: String,
    pub battery_status: String,
    pub battery_voltage: String,
    pub battery_current: String,
    pub battery_temperature: String,
    pub inverter_status: String,
    pub inverter_power: String,
    pub inverter_setpoint: String,
    pub grid_voltage: String,
    pub grid_frequency: String,
}

impl DashboardTelemetry {
    pub fn operating_mode(&self) -> OperatingMode {
        OperatingMode::from_setpoint(self.inverter.setpoint.as_f64().unwrap_or(0.0))
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn charge_percent(&self) -> Option<i64> {
        self.battery
            .charge
            .as_f64()
            .filter(|charge| charge.is_finite())
            .map(|charge| (charge * 100.0).ceil() as i64)
    }

    /// Fan cool-off runs while relay 2 is still on after thermal control stopped cooling
    pub fn cooloff_pending(&self) -> bool {
        matches!(self.tcontrol.mode.as_str(), "Off" | "Cooling") && self.relays.relay2
    }
}

impl Telemetry for DashboardTelemetry {
    type View = DashboardView;

    fn derive_view(&self) -> DashboardView {
        let mode = self.operating_mode();
        let remaining_time = match mode {
            OperatingMode::Charging => self.battery.remaining_charging_time.as_ref(),
            OperatingMode::Discharging => self.battery.remaining_discharging_time.as_ref(),
            OperatingMode::Idle => None,
        }
        .map(ToString::to_string);

        DashboardView {
            charge_percent: self.charge_percent(),
            mode,
            remaining_time,
            animated: mode != OperatingMode::Idle,
            relays: self.relays.as_array(),
            cooloff_pending: self.cooloff_pending(),
            tcontrol_mode: self.tcontrol.mode.clone(),
            battery_status: show(self.battery.status.as_ref()),
            battery_voltage: show(self.battery.voltage.as_ref()),
            battery_current: show(self.battery.current.as_ref()),
            battery_temperature: show(self.battery.temperature.as_ref()),
            inverter_status: show(self.inverter.status.as_ref()),
            inverter_power: show(self.inverter.power.as_ref()),
            inverter_setpoint: self.inverter.setpoint.to_string(),
            grid_voltage: show(self.grid.voltage.as_ref()),
            grid_frequency: show(self.grid.frequency.as_ref()),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub struct ThreadInfo {
    pub tid: i64,
    pub running: bool,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub struct ThreadTable {
    pub gateway: ThreadInfo,
    pub mailbox: ThreadInfo,
    pub tcontrol: ThreadInfo,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GatewayLink {
    pub connection: String,
    pub inverter_connected: bool,
    pub inverter_updated: bool,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct MailboxLink {
    pub connection: String,
    pub connected: bool,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TControlLink {
    pub device: String,
    pub device_available: bool,
    pub last_cmd_ok: bool,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct SubsystemTable {
    pub gateway: GatewayLink,
    pub mailbox: MailboxLink,
    pub tcontrol: TControlLink,
}

/// Diagnostics document of the status page
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct SystemStatus {
    pub threads: ThreadTable,
    pub system: SubsystemTable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ThreadBadge {
    Running,
    Terminated,
}

impl From<bool> for ThreadBadge {
    fn from(running: bool) -> Self {
        if running {
            ThreadBadge::Running
        } else {
            ThreadBadge::Terminated
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct StatusFlag {
    pub name: &'static str,
    pub value: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SubsystemView {
    pub tid: i64,
    pub badge: ThreadBadge,
    /// Connection string, or the serial device for thermal control
    pub endpoint: String,
    pub flags: Vec<StatusFlag>,
}

impl SubsystemView {
    pub fn flag(&self, name: &str) -> Option<bool> {
        self.flags
            .iter()
            .find(|flag| flag.name == name)
            .map(|flag| flag.value)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StatusView {
    pub gateway: SubsystemView,
    pub mailbox: SubsystemView,
    pub tcontrol: SubsystemView,
}

impl Telemetry for SystemStatus {
    type View = StatusView;

    fn derive_view(&self) -> StatusView {
        let threads = &self.threads;
        let system = &self.system;

        StatusView {
            gateway: SubsystemView {
                tid: threads.gateway.tid,
                badge: threads.gateway.running.into(),
                endpoint: system.gateway.connection.clone(),
                flags: vec![
                    StatusFlag {
                        name: "inverterConnected",
                        value: system.gateway.inverter_connected,
                    },
                    StatusFlag {
                        name: "inverterUpdated",
                        value: system.gateway.inverter_updated,
                    },
                ],
            },
            mailbox: SubsystemView {
                tid: threads.mailbox.tid,
                badge: threads.mailbox.running.into(),
                endpoint: system.mailbox.connection.clone(),
                flags: vec![StatusFlag {
                    name: "connected",
                    value: system.mailbox.connected,
                }],
            },
            tcontrol: SubsystemView {
                tid: threads.tcontrol.tid,
                badge: threads.tcontrol.running.into(),
                endpoint: system.tcontrol.device.clone(),
                flags: vec![
                    StatusFlag {
                        name: "deviceAvailable",
                        value: system.tcontrol.device_available,
                    },
                    StatusFlag {
                        name: "lastCmdOk",
                        value: system.tcontrol.last_cmd_ok,
                    },
                ],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dashboard(setpoint: serde_json::Value, tcontrol_mode: &str, relay2: bool) -> DashboardTelemetry {
        serde_json::from_value(json!({
            "battery": {
                "capacity": "100",
                "charge": "0.853",
                "current": "-12.5",
                "status": "Ok",
                "temperature": "21.4",
                "voltage": "52.1",
                "remaining-charging-time": "01:10",
                "remaining-discharging-time": "05:45"
            },
            "grid": {"voltage": "230.1", "freqency": "50.01"},
            "inverter": {"opstatus": "Run", "power": "1500", "status": "Ok", "setpoint": setpoint},
            "relays": {"relay1": true, "relay2": relay2, "relay3": false, "relay4": false},
            "tcontrol": {"mode": tcontrol_mode}
        }))
        .unwrap()
    }

    mod operating_mode {
        use super::*;

        #[test]
        fn sign_of_setpoint_decides_mode() {
            assert_eq!(OperatingMode::from_setpoint(150.0), OperatingMode::Discharging);
            assert_eq!(OperatingMode::from_setpoint(0.001), OperatingMode::Discharging);
            assert_eq!(OperatingMode::from_setpoint(-150.0), OperatingMode::Charging);
            assert_eq!(OperatingMode::from_setpoint(-0.001), OperatingMode::Charging);
            assert_eq!(OperatingMode::from_setpoint(0.0), OperatingMode::Idle);
            assert_eq!(OperatingMode::from_setpoint(-0.0), OperatingMode::Idle);
        }

        #[test]
        fn string_and_number_setpoints_agree() {
            assert_eq!(dashboard(json!("-150"), "Off", false).operating_mode(), OperatingMode::Charging);
            assert_eq!(dashboard(json!(-150), "Off", false).operating_mode(), OperatingMode::Charging);
            assert_eq!(dashboard(json!("0"), "Off", false).operating_mode(), OperatingMode::Idle);
            assert_eq!(dashboard(json!(250.5), "Off", false).operating_mode(), OperatingMode::Discharging);
        }

        #[test]
        fn unparsable_setpoint_is_idle() {
            assert_eq!(dashboard(json!("n/a"), "Off", false).operating_mode(), OperatingMode::Idle);
        }
    }

    mod dashboard_view {
        use super::*;

        #[test]
        fn charging_shows_time_to_full() {
            let view = dashboard(json!("-150"), "Heating", false).derive_view();

            assert_eq!(view.mode, OperatingMode::Charging);
            assert_eq!(view.remaining_time.as_deref(), Some("01:10"));
            assert!(view.animated);
        }

        #[test]
        fn discharging_shows_time_to_empty() {
            let view = dashboard(json!("300"), "Heating", false).derive_view();

            assert_eq!(view.mode, OperatingMode::Discharging);
            assert_eq!(view.remaining_time.as_deref(), Some("05:45"));
        }

        #[test]
        fn idle_has_no_remaining_time_and_no_animation() {
            let view = dashboard(json!("0"), "Heating", false).derive_view();

            assert_eq!(view.mode, OperatingMode::Idle);
            assert_eq!(view.remaining_time, None);
            assert!(!view.animated);
        }

        #[test]
        fn charge_is_rounded_up_to_whole_percent() {
            let view = dashboard(json!("0"), "Off", false).derive_view();
            assert_eq!(view.charge_percent, Some(86));
        }

        #[test]
        fn readings_are_passed_through() {
            let view = dashboard(json!("-150"), "Off", false).derive_view();

            assert_eq!(view.relays, [true, false, false, false]);
            assert_eq!(view.battery_voltage, "52.1");
            assert_eq!(view.inverter_setpoint, "-150");
            assert_eq!(view.grid_frequency, "50.01");
            assert_eq!(view.tcontrol_mode, "Off");
        }

        #[test]
        fn cooloff_pending_needs_relay2_and_non_heating_mode() {
            assert!(dashboard(json!(0), "Off", true).derive_view().cooloff_pending);
            assert!(dashboard(json!(0), "Cooling", true).derive_view().cooloff_pending);
            assert!(!dashboard(json!(0), "Cooling", false).derive_view().cooloff_pending);
            assert!(!dashboard(json!(0), "Heating", true).derive_view().cooloff_pending);
        }

        #[test]
        fn missing_relay_section_is_rejected() {
            let result = serde_json::from_value::<DashboardTelemetry>(json!({
                "battery": {"charge": "0.5"},
                "inverter": {"setpoint": "0"},
                "tcontrol": {"mode": "Off"}
            }));
            assert!(result.is_err());
        }
    }

    mod status_view {
        use super::*;

        fn status(gateway_running: bool) -> SystemStatus {
            serde_json::from_value(json!({
                "threads": {
                    "gateway": {"tid": 101, "running": gateway_running},
                    "mailbox": {"tid": 102, "running": true},
                    "tcontrol": {"tid": 103, "running": true}
                },
                "system": {
                    "gateway": {"connection": "10.0.0.5:502", "inverterConnected": true, "inverterUpdated": false},
                    "mailbox": {"connection": "mqtt://localhost:1883", "connected": true},
                    "tcontrol": {"device": "/dev/ttyUSB0", "deviceAvailable": true, "lastCmdOk": false}
                }
            }))
            .unwrap()
        }

        #[test]
        fn thread_badges_follow_running_flag() {
            assert_eq!(status(true).derive_view().gateway.badge, ThreadBadge::Running);
            assert_eq!(status(false).derive_view().gateway.badge, ThreadBadge::Terminated);
        }

        #[test]
        fn connectivity_flags_are_derived_per_subsystem() {
            let view = status(true).derive_view();

            assert_eq!(view.gateway.tid, 101);
            assert_eq!(view.gateway.endpoint, "10.0.0.5:502");
            assert_eq!(view.gateway.flag("inverterConnected"), Some(true));
            assert_eq!(view.gateway.flag("inverterUpdated"), Some(false));
            assert_eq!(view.mailbox.flag("connected"), Some(true));
            assert_eq!(view.tcontrol.endpoint, "/dev/ttyUSB0");
            assert_eq!(view.tcontrol.flag("deviceAvailable"), Some(true));
            assert_eq!(view.tcontrol.flag("lastCmdOk"), Some(false));
            assert_eq!(view.tcontrol.flag("connected"), None);
        }
    }
}
