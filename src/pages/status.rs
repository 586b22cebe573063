use super::Feedback;
use crate::{
    error::{ClientError, ClientResult},
    http_client::Transport,
    request_lock::RequestLocks,
    settings_client::SettingsClient,
};
use log::info;

pub const RESTART_ENDPOINT: &str = "/api/sysctrl/restart";
pub const RESTART_LOCK: &str = "restart";

/// Ask the controller to restart its service.
///
/// Rejected with [`ClientError::Busy`] while a restart is outstanding.
pub async fn restart_service<T: Transport>(
    client: &SettingsClient<T>,
    locks: &RequestLocks,
) -> ClientResult<Feedback> {
    let _guard = locks
        .try_acquire(RESTART_LOCK)
        .ok_or_else(|| ClientError::Busy(RESTART_LOCK.to_string()))?;

    info!("requesting service restart");
    let restarted = client.save_plain(RESTART_ENDPOINT, "").await;

    Ok(Feedback::from_success(restarted))
}
