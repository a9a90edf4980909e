//! In-process message bus
//!
//! `MemoryBus` is a small loopback bus with observable send, publish and
//! consume points. Delivery is inline: `send` and `publish` return after
//! every handler ran, and a failing handler fails the call. Observers are
//! awaited at each hook, in the order the hooks are documented on
//! `OutboundObserver` and `InboundObserver`.

use crate::connector::{
    ConsumeObserverConnector, InboundObserver, ObserverHandle, ObserverSet, OutboundObserver,
    PublishObserverConnector, SendObserverConnector,
};
use crate::error::{AuditError, Result};
use crate::types::{Message, MessageContext};
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Consumer of delivered messages
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, ctx: &MessageContext) -> Result<()>;
}

/// Adapts an async closure into a `MessageHandler`
pub struct HandlerFn<F>(F);

#[async_trait]
impl<F, Fut> MessageHandler for HandlerFn<F>
where
    F: Fn(MessageContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn handle(&self, ctx: &MessageContext) -> Result<()> {
        (self.0)(ctx.clone()).await
    }
}

/// Wrap an async closure as a shareable handler
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn MessageHandler>
where
    F: Fn(MessageContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(HandlerFn(f))
}

#[derive(Clone)]
struct Binding {
    endpoint: String,
    handler: Arc<dyn MessageHandler>,
}

/// Loopback bus for a single process
pub struct MemoryBus {
    /// Address stamped as source on outgoing messages
    address: String,

    /// Receive endpoints (address → handlers)
    endpoints: RwLock<HashMap<String, Vec<Binding>>>,

    /// Publish subscriptions (message type → bindings)
    subscriptions: RwLock<HashMap<String, Vec<Binding>>>,

    send_observers: ObserverSet<dyn OutboundObserver>,
    publish_observers: ObserverSet<dyn OutboundObserver>,
    consume_observers: ObserverSet<dyn InboundObserver>,
}

impl MemoryBus {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            endpoints: RwLock::new(HashMap::new()),
            subscriptions: RwLock::new(HashMap::new()),
            send_observers: ObserverSet::new(),
            publish_observers: ObserverSet::new(),
            consume_observers: ObserverSet::new(),
        }
    }

    /// Bus source address
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Attach a handler to a receive endpoint for point-to-point sends
    pub async fn receive_endpoint(&self, address: impl Into<String>, handler: Arc<dyn MessageHandler>) {
        let address = address.into();
        let mut endpoints = self.endpoints.write().await;
        endpoints.entry(address.clone()).or_default().push(Binding {
            endpoint: address.clone(),
            handler,
        });

        tracing::info!(endpoint = %address, "Receive endpoint bound");
    }

    /// Subscribe a handler on `endpoint` to published messages of type `M`
    pub async fn subscribe<M: Message>(&self, endpoint: impl Into<String>, handler: Arc<dyn MessageHandler>) {
        self.subscribe_type(M::MESSAGE_TYPE, endpoint, handler).await;
    }

    /// Subscribe a handler to published messages with the given type name
    pub async fn subscribe_type(
        &self,
        message_type: impl Into<String>,
        endpoint: impl Into<String>,
        handler: Arc<dyn MessageHandler>,
    ) {
        let message_type = message_type.into();
        let endpoint = endpoint.into();
        let mut subs = self.subscriptions.write().await;
        subs.entry(message_type.clone()).or_default().push(Binding {
            endpoint: endpoint.clone(),
            handler,
        });

        tracing::info!(
            message_type = %message_type,
            endpoint = %endpoint,
            "Subscription added"
        );
    }

    /// Send a typed message to one endpoint, returning its message id
    pub async fn send<M: Message>(&self, destination: &str, message: &M) -> Result<String> {
        self.send_context(destination, MessageContext::new(message)?).await
    }

    /// Send a prepared context to one endpoint
    pub async fn send_context(&self, destination: &str, mut ctx: MessageContext) -> Result<String> {
        self.stamp_source(&mut ctx);
        ctx.destination_address = Some(destination.to_string());

        let observers = self.send_observers.snapshot();
        join_all(observers.iter().map(|o| o.pre_dispatch(&ctx))).await;

        let bindings = {
            let endpoints = self.endpoints.read().await;
            endpoints.get(destination).cloned()
        };

        let result = match bindings {
            Some(bindings) => self.deliver(&ctx, &bindings).await,
            None => Err(AuditError::NoEndpoint(destination.to_string())),
        };

        self.complete_dispatch(&observers, &ctx, &result).await;

        tracing::debug!(
            message_id = %ctx.message_id,
            message_type = %ctx.message_type,
            destination = %destination,
            ok = result.is_ok(),
            "Message sent"
        );

        result.map(|_| ctx.message_id)
    }

    /// Publish a typed message to every subscriber of its type
    pub async fn publish<M: Message>(&self, message: &M) -> Result<String> {
        self.publish_context(MessageContext::new(message)?).await
    }

    /// Publish a prepared context
    ///
    /// Publishing with no subscribers succeeds.
    pub async fn publish_context(&self, mut ctx: MessageContext) -> Result<String> {
        self.stamp_source(&mut ctx);
        if ctx.destination_address.is_none() {
            ctx.destination_address = Some(format!("topic:{}", ctx.message_type));
        }

        let observers = self.publish_observers.snapshot();
        join_all(observers.iter().map(|o| o.pre_dispatch(&ctx))).await;

        let bindings = {
            let subs = self.subscriptions.read().await;
            subs.get(&ctx.message_type).cloned().unwrap_or_default()
        };

        let result = self.deliver(&ctx, &bindings).await;
        self.complete_dispatch(&observers, &ctx, &result).await;

        tracing::debug!(
            message_id = %ctx.message_id,
            message_type = %ctx.message_type,
            subscribers = bindings.len(),
            ok = result.is_ok(),
            "Message published"
        );

        result.map(|_| ctx.message_id)
    }

    fn stamp_source(&self, ctx: &mut MessageContext) {
        if ctx.source_address.is_none() {
            ctx.source_address = Some(self.address.clone());
        }
    }

    async fn complete_dispatch(
        &self,
        observers: &[Arc<dyn OutboundObserver>],
        ctx: &MessageContext,
        result: &Result<()>,
    ) {
        match result {
            Ok(()) => {
                join_all(observers.iter().map(|o| o.post_dispatch(ctx))).await;
            }
            Err(e) => {
                let reason = e.to_string();
                join_all(observers.iter().map(|o| o.dispatch_fault(ctx, &reason))).await;
            }
        }
    }

    /// Run every binding; all handlers run, the first failure is returned
    async fn deliver(&self, ctx: &MessageContext, bindings: &[Binding]) -> Result<()> {
        let mut first_error = None;

        for binding in bindings {
            if let Err(e) = self.consume(ctx, binding).await {
                tracing::warn!(
                    message_id = %ctx.message_id,
                    endpoint = %binding.endpoint,
                    error = %e,
                    "Handler failed"
                );
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn consume(&self, ctx: &MessageContext, binding: &Binding) -> Result<()> {
        let mut inbound = ctx.clone();
        inbound.input_address = Some(binding.endpoint.clone());

        let observers = self.consume_observers.snapshot();
        join_all(observers.iter().map(|o| o.pre_consume(&inbound))).await;

        match binding.handler.handle(&inbound).await {
            Ok(()) => {
                join_all(observers.iter().map(|o| o.post_consume(&inbound))).await;
                Ok(())
            }
            Err(e) => {
                let reason = e.to_string();
                join_all(observers.iter().map(|o| o.consume_fault(&inbound, &reason))).await;
                Err(AuditError::Handler {
                    address: binding.endpoint.clone(),
                    reason,
                })
            }
        }
    }
}

impl SendObserverConnector for MemoryBus {
    fn connect_send_observer(&self, observer: Arc<dyn OutboundObserver>) -> ObserverHandle {
        self.send_observers.connect(observer)
    }
}

impl PublishObserverConnector for MemoryBus {
    fn connect_publish_observer(&self, observer: Arc<dyn OutboundObserver>) -> ObserverHandle {
        self.publish_observers.connect(observer)
    }
}

impl ConsumeObserverConnector for MemoryBus {
    fn connect_consume_observer(&self, observer: Arc<dyn InboundObserver>) -> ObserverHandle {
        self.consume_observers.connect(observer)
    }
}
