use std::sync::OnceLock;
use std::time::Duration;

use reqwest::Client;
use tracing::debug;

/// User agent sent with every outbound request.
pub const USER_AGENT: &str = concat!("modwatch/", env!("CARGO_PKG_VERSION"));

/// Install the process-wide rustls crypto provider exactly once.
pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Safe to ignore: can happen if another crate installed it first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Build the shared HTTP client.
///
/// A zero `timeout` leaves requests unbounded.
pub fn build_client(timeout: Duration) -> crate::Result<Client> {
    install_rustls_provider();

    let mut builder = Client::builder().user_agent(USER_AGENT);
    if !timeout.is_zero() {
        builder = builder.timeout(timeout);
    }

    builder
        .build()
        .map_err(|e| crate::Error::Other(format!("Failed to build HTTP client: {}", e)))
}
