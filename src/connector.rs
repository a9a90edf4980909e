//! Bus observation surface
//!
//! A bus exposes its traffic points through typed connector traits. Each
//! connection returns an `ObserverHandle` that removes the observer again.
//! `ObserverSet` is a reusable registry a bus can build its connectors on.

use crate::types::MessageContext;
use async_trait::async_trait;
use std::sync::{Arc, RwLock, Weak};

/// Observes messages leaving the process (send and publish)
///
/// Hooks are awaited by the bus. They return nothing, so an observer can
/// never change the outcome of the operation it observes.
#[async_trait]
pub trait OutboundObserver: Send + Sync {
    /// Called before the message is handed to the transport
    async fn pre_dispatch(&self, ctx: &MessageContext);

    /// Called after the message was handed to the transport
    async fn post_dispatch(&self, _ctx: &MessageContext) {}

    /// Called when dispatching failed
    async fn dispatch_fault(&self, _ctx: &MessageContext, _reason: &str) {}
}

/// Observes messages arriving at a consumer
#[async_trait]
pub trait InboundObserver: Send + Sync {
    /// Called before the consumer handler is invoked
    async fn pre_consume(&self, ctx: &MessageContext);

    /// Called after the handler completed successfully
    async fn post_consume(&self, _ctx: &MessageContext) {}

    /// Called when the handler failed
    async fn consume_fault(&self, _ctx: &MessageContext, _reason: &str) {}
}

/// Bus capability: observe point-to-point sends
pub trait SendObserverConnector {
    fn connect_send_observer(&self, observer: Arc<dyn OutboundObserver>) -> ObserverHandle;
}

/// Bus capability: observe publishes
pub trait PublishObserverConnector {
    fn connect_publish_observer(&self, observer: Arc<dyn OutboundObserver>) -> ObserverHandle;
}

/// Bus capability: observe consumption
pub trait ConsumeObserverConnector {
    fn connect_consume_observer(&self, observer: Arc<dyn InboundObserver>) -> ObserverHandle;
}

/// Token for a connected observer
///
/// Dropping the handle leaves the observer connected; call
/// [`ObserverHandle::disconnect`] to remove it.
pub struct ObserverHandle {
    id: u64,
    disconnect: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl ObserverHandle {
    pub fn new(id: u64, disconnect: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            id,
            disconnect: Some(Box::new(disconnect)),
        }
    }

    /// Registration id, unique within the registry that issued it
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remove the observer from the bus
    pub fn disconnect(mut self) {
        if let Some(disconnect) = self.disconnect.take() {
            disconnect();
        }
    }
}

impl std::fmt::Debug for ObserverHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverHandle").field("id", &self.id).finish()
    }
}

struct Registry<T: ?Sized> {
    next_id: u64,
    observers: Vec<(u64, Arc<T>)>,
}

/// Registry of connected observers of one kind
pub struct ObserverSet<T: ?Sized> {
    inner: Arc<RwLock<Registry<T>>>,
}

impl<T: ?Sized + Send + Sync + 'static> ObserverSet<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Registry {
                next_id: 1,
                observers: Vec::new(),
            })),
        }
    }

    /// Add an observer; the handle removes it again
    pub fn connect(&self, observer: Arc<T>) -> ObserverHandle {
        let id = {
            let mut registry = self.inner.write().unwrap_or_else(|e| e.into_inner());
            let id = registry.next_id;
            registry.next_id += 1;
            registry.observers.push((id, observer));
            id
        };

        let weak: Weak<RwLock<Registry<T>>> = Arc::downgrade(&self.inner);
        ObserverHandle::new(id, move || {
            if let Some(inner) = weak.upgrade() {
                let mut registry = inner.write().unwrap_or_else(|e| e.into_inner());
                registry.observers.retain(|(oid, _)| *oid != id);
                tracing::info!(observer_id = id, "Observer disconnected");
            }
        })
    }

    /// Observers connected right now, in connection order
    ///
    /// Callers iterate the snapshot, so no lock is held while hooks run.
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        let registry = self.inner.read().unwrap_or_else(|e| e.into_inner());
        registry.observers.iter().map(|(_, o)| o.clone()).collect()
    }

    pub fn len(&self) -> usize {
        let registry = self.inner.read().unwrap_or_else(|e| e.into_inner());
        registry.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: ?Sized + Send + Sync + 'static> Default for ObserverSet<T> {
    fn default() -> Self {
        Self::new()
    }
}
