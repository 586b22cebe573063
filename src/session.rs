//! Everything one connected client holds, passed explicitly instead of living
//! in globals.

use crate::{
    accounts::AccountSession,
    config::AppConfig,
    config_store::ConfigStore,
    error::ClientResult,
    http_client::{HttpTransport, Transport},
    pages::{Feedback, status},
    poller::{DashboardPoller, StatusPoller},
    request_lock::RequestLocks,
    settings_client::SettingsClient,
};
use anyhow::{Context, Result};
use log::info;

pub struct ClientSession<T> {
    pub client: SettingsClient<T>,
    pub store: ConfigStore<T>,
    pub accounts: AccountSession<T>,
    pub dashboard: DashboardPoller<T>,
    pub status: StatusPoller<T>,
    pub locks: RequestLocks,
}

impl ClientSession<HttpTransport> {
    /// Session talking HTTP to the configured controller
    pub fn connect(config: &AppConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config.controller.base_url)
            .context("failed to create controller transport")?;

        info!("using controller at {}", transport.base_url());

        Ok(Self::with_transport(transport, config))
    }
}

impl<T: Transport> ClientSession<T> {
    pub fn with_transport(transport: T, config: &AppConfig) -> Self {
        let client = SettingsClient::new(transport);
        let locks = RequestLocks::new();

        ClientSession {
            store: ConfigStore::with_locks(client.clone(), locks.clone()),
            accounts: AccountSession::new(client.clone(), &config.accounts.elevated_account),
            dashboard: DashboardPoller::new(
                client.clone(),
                &config.dashboard.path,
                config.dashboard.interval,
            ),
            status: StatusPoller::new(client.clone(), &config.status.path, config.status.interval),
            client,
            locks,
        }
    }

    pub async fn restart_service(&self) -> ClientResult<Feedback> {
        status::restart_service(&self.client, &self.locks).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::MockTransport;

    #[test]
    fn components_share_locks() {
        let config = AppConfig::load_from(|_| None).unwrap();
        let session = ClientSession::with_transport(MockTransport::new(), &config);

        let _saving = session.locks.try_acquire("gateway").unwrap();

        assert!(session.store.locks().is_locked("gateway"));
        assert_eq!(session.dashboard.path(), "/api/status");
        assert_eq!(session.status.path(), "/api/sysstatus");
    }

    #[test]
    fn connect_rejects_url_without_scheme() {
        let config = AppConfig::load_from(|key| {
            (key == "SCIBAT_HOST").then(|| "bat.local:8080".to_string())
        })
        .unwrap();

        assert!(ClientSession::connect(&config).is_err());
    }
}
