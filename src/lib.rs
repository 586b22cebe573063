pub mod accounts;
pub mod config;
pub mod config_store;
pub mod error;
pub mod http_client;
pub mod pages;
pub mod poller;
pub mod request_lock;
pub mod session;
pub mod settings_client;
pub mod telemetry;

pub use error::{ClientError, ClientResult};
pub use session::ClientSession;
