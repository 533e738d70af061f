use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::connection::ValidConnection;
use crate::error::CoreError;
use crate::sync::operation::OperationBatch;
use crate::types::Provider;

/// One custodian's reconciliation strategy.
///
/// `requested_accounts` holds provider external account ids. An empty slice
/// asks for the provider's full remote catalog.
#[async_trait]
pub trait ReconciliationAdapter: Send + Sync {
    fn provider(&self) -> Provider;

    async fn reconcile(
        &self,
        connection: &ValidConnection,
        requested_accounts: &[String],
    ) -> Result<OperationBatch, CoreError>;
}

/// Adapters keyed by provider, assembled once at startup.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<Provider, Arc<dyn ReconciliationAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `adapter` under its own provider, replacing any previous one.
    pub fn with(mut self, adapter: Arc<dyn ReconciliationAdapter>) -> Self {
        self.adapters.insert(adapter.provider(), adapter);
        self
    }

    pub fn get(&self, provider: Provider) -> Result<Arc<dyn ReconciliationAdapter>, CoreError> {
        self.adapters
            .get(&provider)
            .cloned()
            .ok_or(CoreError::UnsupportedProvider(provider))
    }

    pub fn providers(&self) -> Vec<Provider> {
        let mut providers: Vec<Provider> = self.adapters.keys().copied().collect();
        providers.sort();
        providers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop(Provider);

    #[async_trait]
    impl ReconciliationAdapter for Noop {
        fn provider(&self) -> Provider {
            self.0
        }

        async fn reconcile(
            &self,
            _connection: &ValidConnection,
            _requested_accounts: &[String],
        ) -> Result<OperationBatch, CoreError> {
            Ok(OperationBatch::default())
        }
    }

    #[test]
    fn lookup_by_provider() {
        let registry = AdapterRegistry::new().with(Arc::new(Noop(Provider::Anchorage)));
        assert_eq!(
            registry.get(Provider::Anchorage).map(|a| a.provider()).ok(),
            Some(Provider::Anchorage)
        );
        assert!(matches!(
            registry.get(Provider::Fireblocks),
            Err(CoreError::UnsupportedProvider(Provider::Fireblocks))
        ));
        assert_eq!(registry.providers(), vec![Provider::Anchorage]);
    }
}
