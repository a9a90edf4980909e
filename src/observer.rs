//! Audit observers for the send, publish and consume traffic points
//!
//! Each observer checks its filter, builds metadata for matching messages
//! and awaits the store write. Store failures go to the failure reporter;
//! the hook itself always completes normally.

use crate::connector::{InboundObserver, OutboundObserver};
use crate::filter::MessageFilter;
use crate::metadata::{InboundMetadataFactory, OutboundMetadataFactory};
use crate::report::{AuditFailure, AuditFailureReporter, TracingFailureReporter};
use crate::store::MessageAuditStore;
use crate::types::{AuditDirection, AuditMetadata, AuditRecord, MessageContext};
use async_trait::async_trait;
use std::sync::Arc;

/// Store plus failure reporting, shared by every observer kind
#[derive(Clone)]
struct AuditSink {
    store: Arc<dyn MessageAuditStore>,
    reporter: Arc<dyn AuditFailureReporter>,
}

impl AuditSink {
    async fn write(&self, ctx: &MessageContext, metadata: AuditMetadata) {
        let direction = metadata.direction;
        let record = AuditRecord::new(ctx.payload.clone(), metadata);

        match self.store.record(record).await {
            Ok(()) => {
                tracing::debug!(
                    message_id = %ctx.message_id,
                    message_type = %ctx.message_type,
                    direction = %direction,
                    store = self.store.name(),
                    "Message audited"
                );
            }
            Err(error) => self.reporter.report(AuditFailure {
                direction,
                message_id: ctx.message_id.clone(),
                message_type: ctx.message_type.clone(),
                store: self.store.name().to_string(),
                error,
            }),
        }
    }
}

struct OutboundAudit {
    sink: AuditSink,
    factory: Arc<dyn OutboundMetadataFactory>,
    filter: MessageFilter,
}

impl OutboundAudit {
    async fn observe(&self, ctx: &MessageContext, direction: AuditDirection) {
        if !self.filter.matches(ctx) {
            return;
        }
        let metadata = self.factory.create(ctx, direction);
        self.sink.write(ctx, metadata).await;
    }
}

/// Audits messages before they are sent; metadata direction is `Sent`
pub struct AuditSendObserver {
    inner: OutboundAudit,
}

impl AuditSendObserver {
    pub fn new(
        store: Arc<dyn MessageAuditStore>,
        factory: Arc<dyn OutboundMetadataFactory>,
        filter: MessageFilter,
    ) -> Self {
        Self {
            inner: OutboundAudit {
                sink: AuditSink {
                    store,
                    reporter: Arc::new(TracingFailureReporter),
                },
                factory,
                filter,
            },
        }
    }

    /// Replace the default tracing reporter
    pub fn with_reporter(mut self, reporter: Arc<dyn AuditFailureReporter>) -> Self {
        self.inner.sink.reporter = reporter;
        self
    }
}

#[async_trait]
impl OutboundObserver for AuditSendObserver {
    async fn pre_dispatch(&self, ctx: &MessageContext) {
        self.inner.observe(ctx, AuditDirection::Sent).await;
    }
}

/// Audits messages before they are published; metadata direction is `Published`
pub struct AuditPublishObserver {
    inner: OutboundAudit,
}

impl AuditPublishObserver {
    pub fn new(
        store: Arc<dyn MessageAuditStore>,
        factory: Arc<dyn OutboundMetadataFactory>,
        filter: MessageFilter,
    ) -> Self {
        Self {
            inner: OutboundAudit {
                sink: AuditSink {
                    store,
                    reporter: Arc::new(TracingFailureReporter),
                },
                factory,
                filter,
            },
        }
    }

    /// Replace the default tracing reporter
    pub fn with_reporter(mut self, reporter: Arc<dyn AuditFailureReporter>) -> Self {
        self.inner.sink.reporter = reporter;
        self
    }
}

#[async_trait]
impl OutboundObserver for AuditPublishObserver {
    async fn pre_dispatch(&self, ctx: &MessageContext) {
        self.inner.observe(ctx, AuditDirection::Published).await;
    }
}

/// Audits messages before the consumer handler runs; direction is `Consumed`
pub struct AuditConsumeObserver {
    sink: AuditSink,
    factory: Arc<dyn InboundMetadataFactory>,
    filter: MessageFilter,
}

impl AuditConsumeObserver {
    pub fn new(
        store: Arc<dyn MessageAuditStore>,
        factory: Arc<dyn InboundMetadataFactory>,
        filter: MessageFilter,
    ) -> Self {
        Self {
            sink: AuditSink {
                store,
                reporter: Arc::new(TracingFailureReporter),
            },
            factory,
            filter,
        }
    }

    /// Replace the default tracing reporter
    pub fn with_reporter(mut self, reporter: Arc<dyn AuditFailureReporter>) -> Self {
        self.sink.reporter = reporter;
        self
    }
}

#[async_trait]
impl InboundObserver for AuditConsumeObserver {
    async fn pre_consume(&self, ctx: &MessageContext) {
        if !self.filter.matches(ctx) {
            return;
        }
        let metadata = self.factory.create(ctx);
        self.sink.write(ctx, metadata).await;
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::FailingStore;
    use super::*;
    use crate::metadata::{DefaultInboundMetadataFactory, DefaultOutboundMetadataFactory};
    use crate::report::AuditFailure;
    use crate::store::memory::MemoryAuditStore;
    use crate::types::fixtures::{order_placed, OrderPlaced, OrderShipped};
    use std::sync::Mutex;

    fn outbound_factory() -> Arc<dyn OutboundMetadataFactory> {
        Arc::new(DefaultOutboundMetadataFactory::new())
    }

    fn placed() -> MessageContext {
        MessageContext::new(&order_placed())
            .unwrap()
            .with_correlation_id("corr-1")
    }

    fn only_placed() -> MessageFilter {
        MessageFilter::configure(|f| {
            f.include::<OrderPlaced>();
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_send_observer_records_match() {
        let store = Arc::new(MemoryAuditStore::default());
        let observer = AuditSendObserver::new(store.clone(), outbound_factory(), MessageFilter::all());

        let ctx = placed();
        observer.pre_dispatch(&ctx).await;

        let records = store.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].metadata.direction, AuditDirection::Sent);
        assert_eq!(records[0].metadata.message_id, ctx.message_id);
        assert_eq!(records[0].message, ctx.payload);
    }

    #[tokio::test]
    async fn test_publish_observer_direction() {
        let store = Arc::new(MemoryAuditStore::default());
        let observer =
            AuditPublishObserver::new(store.clone(), outbound_factory(), MessageFilter::all());

        observer.pre_dispatch(&placed()).await;

        let records = store.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].metadata.direction, AuditDirection::Published);
    }

    #[tokio::test]
    async fn test_consume_observer_direction() {
        let store = Arc::new(MemoryAuditStore::default());
        let observer = AuditConsumeObserver::new(
            store.clone(),
            Arc::new(DefaultInboundMetadataFactory::new()),
            MessageFilter::all(),
        );

        observer.pre_consume(&placed()).await;

        let records = store.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].metadata.direction, AuditDirection::Consumed);
    }

    #[tokio::test]
    async fn test_filtered_message_never_reaches_store() {
        let store = Arc::new(MemoryAuditStore::default());
        let observer = AuditSendObserver::new(store.clone(), outbound_factory(), only_placed());

        let shipped = MessageContext::new(&OrderShipped {
            order_id: "ord-1".to_string(),
        })
        .unwrap();
        observer.pre_dispatch(&shipped).await;
        assert_eq!(store.total_recorded().await, 0);

        observer.pre_dispatch(&placed()).await;
        assert_eq!(store.total_recorded().await, 1);
    }

    #[tokio::test]
    async fn test_filtered_publish_never_reaches_store() {
        let store = Arc::new(MemoryAuditStore::default());
        let observer = AuditPublishObserver::new(store.clone(), outbound_factory(), only_placed());

        let shipped = MessageContext::new(&OrderShipped {
            order_id: "ord-2".to_string(),
        })
        .unwrap();
        observer.pre_dispatch(&shipped).await;
        assert_eq!(store.total_recorded().await, 0);

        observer.pre_dispatch(&placed()).await;
        let records = store.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].metadata.direction, AuditDirection::Published);
    }

    #[tokio::test]
    async fn test_post_and_fault_hooks_do_not_record() {
        let store = Arc::new(MemoryAuditStore::default());
        let observer = AuditSendObserver::new(store.clone(), outbound_factory(), MessageFilter::all());

        let ctx = placed();
        observer.post_dispatch(&ctx).await;
        observer.dispatch_fault(&ctx, "broker down").await;
        assert_eq!(store.total_recorded().await, 0);
    }

    #[tokio::test]
    async fn test_store_failure_is_reported_not_raised() {
        let failures: Arc<Mutex<Vec<AuditFailure>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = failures.clone();
        let reporter = move |f: AuditFailure| sink.lock().unwrap().push(f);

        let observer = AuditConsumeObserver::new(
            Arc::new(FailingStore),
            Arc::new(DefaultInboundMetadataFactory::new()),
            MessageFilter::all(),
        )
        .with_reporter(Arc::new(reporter));

        let ctx = placed();
        observer.pre_consume(&ctx).await;

        let failures = failures.lock().unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].direction, AuditDirection::Consumed);
        assert_eq!(failures[0].message_id, ctx.message_id);
        assert_eq!(failures[0].store, "failing");
    }

    #[tokio::test]
    async fn test_custom_factory_is_used() {
        struct Tagging;
        impl OutboundMetadataFactory for Tagging {
            fn create(&self, ctx: &MessageContext, direction: AuditDirection) -> AuditMetadata {
                let mut metadata = DefaultOutboundMetadataFactory::new().create(ctx, direction);
                metadata.custom.insert("tag".to_string(), "custom".to_string());
                metadata
            }
        }

        let store = Arc::new(MemoryAuditStore::default());
        let observer = AuditSendObserver::new(store.clone(), Arc::new(Tagging), MessageFilter::all());
        observer.pre_dispatch(&placed()).await;

        let records = store.records().await;
        assert_eq!(records[0].metadata.custom["tag"], "custom");
    }

    #[tokio::test]
    async fn test_concurrent_observations() {
        let store = Arc::new(MemoryAuditStore::default());
        let observer = Arc::new(AuditPublishObserver::new(
            store.clone(),
            outbound_factory(),
            MessageFilter::all(),
        ));

        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let observer = observer.clone();
                tokio::spawn(async move { observer.pre_dispatch(&placed()).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(store.total_recorded().await, 50);
    }
}
