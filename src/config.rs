use anyhow::{Context, Result, ensure};
use std::{env, time::Duration};

/// Application configuration loaded and validated at startup
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Controller connection
    pub controller: ControllerConfig,

    /// Live dashboard telemetry polling
    pub dashboard: PollConfig,

    /// System status polling
    pub status: PollConfig,

    /// Account page configuration
    pub accounts: AccountsConfig,
}

#[derive(Clone, Debug)]
pub struct ControllerConfig {
    pub base_url: String,
}

#[derive(Clone, Debug)]
pub struct PollConfig {
    pub path: String,
    pub interval: Duration,
}

#[derive(Clone, Debug)]
pub struct AccountsConfig {
    /// Account that can never be deactivated
    pub elevated_account: String,
}

impl AppConfig {
    /// Load the configuration from the process environment
    pub fn load() -> Result<Self> {
        Self::load_from(|key| env::var(key).ok())
    }

    /// Load the configuration resolving variables through `lookup`
    pub fn load_from(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let controller = ControllerConfig::load(&lookup)?;
        let dashboard = PollConfig::load_dashboard(&lookup)?;
        let status = PollConfig::load_status(&lookup)?;
        let accounts = AccountsConfig::load(&lookup)?;

        Ok(Self {
            controller,
            dashboard,
            status,
            accounts,
        })
    }
}

impl ControllerConfig {
    fn load(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let base_url =
            lookup("SCIBAT_HOST").unwrap_or_else(|| "http://127.0.0.1:8080".to_string());

        ensure!(
            !base_url.trim().is_empty(),
            "failed to load SCIBAT_HOST: empty value"
        );

        Ok(Self { base_url })
    }
}

impl PollConfig {
    fn load_dashboard(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let path = lookup("SCIBAT_DASHBOARD_PATH").unwrap_or_else(|| "/api/status".to_string());
        let interval = interval(lookup, "SCIBAT_DASHBOARD_INTERVAL_MS", 2500)?;

        Ok(Self { path, interval })
    }

    fn load_status(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let interval = interval(lookup, "SCIBAT_STATUS_INTERVAL_MS", 5000)?;

        Ok(Self {
            path: crate::poller::STATUS_ENDPOINT.to_string(),
            interval,
        })
    }
}

impl AccountsConfig {
    fn load(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let elevated_account =
            lookup("SCIBAT_ELEVATED_ACCOUNT").unwrap_or_else(|| "superadmin".to_string());

        Ok(Self { elevated_account })
    }
}

fn interval(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default_ms: u64,
) -> Result<Duration> {
    let millis = match lookup(key) {
        Some(value) => value
            .trim()
            .parse::<u64>()
            .with_context(|| format!("failed to parse {key}: invalid format"))?,
        None => default_ms,
    };

    ensure!(millis > 0, "failed to load {key}: interval must not be zero");

    Ok(Duration::from_millis(millis))
}
