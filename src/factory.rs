//! Assembly of wired registry/issuer pairs from configuration.

use crate::rotator::Rotator;
use crate::sweeper::Sweeper;
use crate::{Config, Issuer, KeysweepError, Registry, Result};
use std::sync::Arc;

/// A wired registry/issuer pair for one backend.
pub struct Clients {
    /// Record store.
    pub registry: Arc<dyn Registry>,
    /// Credential service.
    pub issuer: Arc<dyn Issuer>,
}

/// Builds the registry and issuer for the configured backend.
///
/// # Errors
///
/// Returns an error if the backend's feature flag is not enabled.
///
/// # Example
///
/// ```
/// use keysweep::{BackendType, Config, factory};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> keysweep::Result<()> {
/// let config = Config::new(BackendType::Mock);
/// let clients = factory::clients(&config).await?;
/// assert_eq!(clients.registry.name(), "mock");
/// # Ok(())
/// # }
/// ```
pub async fn clients(config: &Config) -> Result<Clients> {
    match config.backend {
        #[cfg(feature = "mock")]
        crate::BackendType::Mock => Ok(Clients {
            registry: Arc::new(crate::backends::mock::MockRegistry::new()),
            issuer: Arc::new(crate::backends::mock::MockIssuer::new()),
        }),

        #[cfg(feature = "aws")]
        crate::BackendType::Aws => Ok(Clients {
            registry: Arc::new(crate::backends::aws::DynamoRegistry::new(config).await),
            issuer: Arc::new(crate::backends::aws::ApiGatewayIssuer::new(config).await),
        }),

        #[allow(unreachable_patterns)]
        other => Err(KeysweepError::Other(anyhow::anyhow!(
            "unknown backend: {} (did you enable the '{}' feature flag?)",
            other,
            other
        ))),
    }
}

/// Builds a fully wired sweeper: clients, rotator with the configured retry
/// policy, and the configured sweep concurrency.
///
/// This is the one-call assembly a trigger binding uses.
pub async fn sweeper(config: &Config) -> Result<Sweeper> {
    let Clients { registry, issuer } = clients(config).await?;
    let rotator = Rotator::new(registry.clone(), issuer).with_retry_policy(config.retry.clone());
    Ok(Sweeper::new(registry, rotator).with_concurrency(config.sweep_concurrency))
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;
    use crate::BackendType;

    #[tokio::test]
    async fn test_mock_clients() {
        let config = Config::new(BackendType::Mock);
        let clients = clients(&config).await.unwrap();

        assert_eq!(clients.registry.name(), "mock");
        assert_eq!(clients.issuer.name(), "mock");
    }

    #[tokio::test]
    #[cfg(not(feature = "aws"))]
    async fn test_unknown_backend_error() {
        let config = Config::new(BackendType::Aws);
        let result = clients(&config).await;

        assert!(result.is_err());
        if let Err(e) = result {
            let err_msg = e.to_string();
            assert!(err_msg.contains("unknown backend"));
            assert!(err_msg.contains("feature flag"));
        }
    }

    #[tokio::test]
    async fn test_sweeper_assembly() {
        let config = Config::new(BackendType::Mock).with_sweep_concurrency(2);
        let sweeper = sweeper(&config).await.unwrap();

        let report = sweeper.sweep(config.stale_threshold).await.unwrap();
        assert_eq!(report.scanned, 0);
    }
}
