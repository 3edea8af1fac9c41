//! Startup helpers for the RAG server.

use std::process::ExitCode;
use std::sync::Arc;

use crate::rag::core::config::RagConfig;
use crate::rag::core::errors::RagResult;
use crate::server::{self, AppState};

/// Run the server until Ctrl-C (used by the `halldyll-rag-server` binary).
///
/// # Returns
/// `ExitCode::SUCCESS` on graceful shutdown, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting Halldyll RAG v{}", env!("CARGO_PKG_VERSION"));

    let config = match RagConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {e}");
            return ExitCode::from(1);
        }
    };
    let port = get_port(&config);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    let state = match initialize(config) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("Failed to create state: {e}");
            return ExitCode::from(1);
        }
    };

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {e}");
        }
        tracing::info!("Shutting down");
    };

    let served = rt.block_on(async move {
        let listener = server::bind(port).await?;
        server::serve(listener, state, shutdown).await
    });
    if let Err(e) = served {
        tracing::error!("Server error: {e}");
        return ExitCode::from(1);
    }

    ExitCode::SUCCESS
}

/// Build application state without starting the server.
///
/// # Errors
/// Returns an error if the corpus or any client cannot be initialized.
pub fn initialize(config: RagConfig) -> RagResult<Arc<AppState>> {
    if let Some(endpoint) = &config.vector_store.endpoint {
        tracing::info!("Vector store endpoint: {endpoint}");
    }
    AppState::from_config(config)
}

/// Configured server port.
#[must_use]
pub const fn get_port(config: &RagConfig) -> u16 {
    config.server.port
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_port_uses_config() {
        let mut config = RagConfig::default();
        assert_eq!(get_port(&config), server::DEFAULT_PORT);
        config.server.port = 8505;
        assert_eq!(get_port(&config), 8505);
    }

    #[test]
    fn test_initialize_requires_corpus() {
        assert!(initialize(RagConfig::default()).is_err());
    }
}
