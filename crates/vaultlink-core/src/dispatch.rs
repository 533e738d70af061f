//! In-process publish/subscribe.
//!
//! Publishers never wait for handlers: [`EventBus::publish`] only enqueues.
//! Each subscription runs a receive loop on its own task and spawns every
//! delivery separately, so one slow run does not hold up events for other
//! connections. Delivery is at-least-once from the handler's point of
//! view; there is no ordering guarantee across connections.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::error::CoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BrokerEvent {
    ScopedSyncStarted {
        run_id: String,
        client_id: String,
        connection_id: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ScopedSyncStarted,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScopedSyncStarted => "scoped_sync.started",
        }
    }
}

impl BrokerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::ScopedSyncStarted { .. } => EventKind::ScopedSyncStarted,
        }
    }
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &BrokerEvent) -> Result<(), CoreError>;

    fn name(&self) -> &'static str;
}

type Subscribers = HashMap<EventKind, Vec<mpsc::UnboundedSender<BrokerEvent>>>;

#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<RwLock<Subscribers>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `handler` to `kind`. Must be called inside a Tokio runtime.
    ///
    /// The returned task ends once every clone of the bus is dropped.
    pub fn subscribe(&self, kind: EventKind, handler: Arc<dyn EventHandler>) -> JoinHandle<()> {
        let (tx, mut rx) = mpsc::unbounded_channel::<BrokerEvent>();
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .push(tx);
        debug!(event = kind.as_str(), handler = handler.name(), "handler subscribed");

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let handler = handler.clone();
                tokio::spawn(async move {
                    if let Err(e) = handler.handle(&event).await {
                        error!(
                            event = event.kind().as_str(),
                            handler = handler.name(),
                            error = %e,
                            "event handler failed"
                        );
                    }
                });
            }
        })
    }

    /// Enqueue `event` for every live subscriber of its kind and return how
    /// many received it.
    pub fn publish(&self, event: BrokerEvent) -> usize {
        let kind = event.kind();
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(senders) = subscribers.get_mut(&kind) else {
            warn!(event = kind.as_str(), "event published with no subscribers");
            return 0;
        };

        senders.retain(|tx| tx.send(event.clone()).is_ok());
        debug!(event = kind.as_str(), delivered = senders.len(), "event published");
        senders.len()
    }
}
