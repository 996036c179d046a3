use once_cell::sync::Lazy;
use reqwest::Client;
use std::time::Duration;

use crate::config::SyncConfig;
use crate::error::NetworkError;

/// Global HTTP client with connection pooling and keep-alive.
static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    let defaults = SyncConfig::default();
    build_client(&defaults).unwrap_or_else(|_| Client::new())
});

/// Get the global HTTP client (default timeouts).
pub fn client() -> &'static Client {
    &HTTP_CLIENT
}

/// Build a client with the timeouts and user agent from the sync config.
pub fn build_client(config: &SyncConfig) -> Result<Client, NetworkError> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(30))
        .user_agent(config.user_agent.clone())
        .build()?)
}
