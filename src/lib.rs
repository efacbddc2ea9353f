pub mod api;
pub mod batch;
pub mod config;
pub mod models;
pub mod pipeline;
pub mod presenter;

use tracing_subscriber::EnvFilter;

/// Initialize tracing for binaries and integration harnesses embedding the
/// engine. Library callers that manage their own subscriber skip this.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("Claimlens engine v{}", config::APP_VERSION);
}
