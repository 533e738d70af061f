use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::dispatch::{BrokerEvent, EventHandler};
use crate::error::CoreError;

use super::engine::ScopedSyncEngine;

/// Background consumer of [`BrokerEvent::ScopedSyncStarted`].
///
/// Loads the run and its connection and hands both to
/// [`ScopedSyncEngine::run`]. A run whose connection has disappeared is
/// marked failed rather than left in `processing`.
pub struct ScopedSyncHandler {
    engine: Arc<ScopedSyncEngine>,
}

impl ScopedSyncHandler {
    pub fn new(engine: Arc<ScopedSyncEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl EventHandler for ScopedSyncHandler {
    async fn handle(&self, event: &BrokerEvent) -> Result<(), CoreError> {
        let BrokerEvent::ScopedSyncStarted {
            run_id,
            client_id,
            connection_id,
        } = event;

        let run = self.engine.find_by_id(client_id, run_id).await?;
        let connection = match self.engine.find_connection(client_id, connection_id).await {
            Ok(connection) => connection,
            Err(err @ CoreError::NotFound { .. }) => {
                self.engine.fail(run, &err).await?;
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        let done = self.engine.run(run, &connection).await?;
        debug!(run.id = %done.id, status = %done.status, "scoped sync handled");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "scoped_sync"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::EventBus;
    use crate::store::{MemoryStore, Repositories};
    use crate::sync::adapter::AdapterRegistry;
    use crate::sync::run::SyncStatus;
    use crate::test_util::*;
    use crate::types::Provider;

    #[tokio::test]
    async fn missing_connection_fails_the_run() {
        let store = Arc::new(MemoryStore::new());
        let engine = Arc::new(ScopedSyncEngine::new(
            AdapterRegistry::new(),
            Repositories::from_memory(store),
            EventBus::new(),
        ));
        let started = engine
            .start(&[active_connection(Provider::Anchorage)], Vec::new())
            .await
            .unwrap();
        let run = &started.runs[0];

        let handler = ScopedSyncHandler::new(engine.clone());
        let err = handler
            .handle(&BrokerEvent::ScopedSyncStarted {
                run_id: run.id.clone(),
                client_id: run.client_id.clone(),
                connection_id: run.connection_id.clone(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound { kind: "connection", .. }));

        let stored = engine.find_by_id(CLIENT_ID, &run.id).await.unwrap();
        assert_eq!(stored.status, SyncStatus::Failed);
    }
}
