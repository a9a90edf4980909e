//! # a3s-audit
//!
//! Message auditing for publish/subscribe buses in the A3S ecosystem.
//!
//! ## Overview
//!
//! `a3s-audit` attaches observers to a bus's send, publish and consume
//! points. Each observed message is checked against a filter; matching
//! messages get an `AuditMetadata` record and are written, together with
//! their payload, to a pluggable `MessageAuditStore`. Auditing never changes
//! whether a send, publish or consume succeeds.
//!
//! ## Quick Start
//!
//! ```rust
//! use a3s_audit::{
//!     connect_consume_audit_observer, connect_send_audit_observers, handler_fn,
//!     ConsumeAuditOptions, MemoryAuditStore, MemoryBus, MessageContext, SendAuditOptions,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> a3s_audit::Result<()> {
//! let bus = MemoryBus::new("loopback://local/checkout");
//! let store = Arc::new(MemoryAuditStore::default());
//!
//! connect_send_audit_observers(
//!     &bus,
//!     SendAuditOptions::builder().store(store.clone()).build()?,
//! );
//! connect_consume_audit_observer(
//!     &bus,
//!     ConsumeAuditOptions::builder().store(store.clone()).build()?,
//! );
//!
//! bus.receive_endpoint("loopback://local/orders", handler_fn(|_ctx| async { Ok(()) }))
//!     .await;
//!
//! let ctx = MessageContext::from_json("OrderPlaced", serde_json::json!({"orderId": "o-1"}));
//! bus.send_context("loopback://local/orders", ctx).await?;
//!
//! // One record for the send, one for the consume
//! assert_eq!(store.count().await, 2);
//! # Ok(())
//! # }
//! ```
//!
//! ## Stores
//!
//! - **memory**: bounded in-memory store for testing and single-process use
//! - **file**: JSON-lines file
//! - **nats**: NATS JetStream stream
//!
//! ## Architecture
//!
//! - **FilterSpecification**: configuration-time predicate builder
//! - **OutboundMetadataFactory / InboundMetadataFactory**: metadata construction
//! - **AuditSendObserver / AuditPublishObserver / AuditConsumeObserver**: the hooks
//! - **MessageAuditStore** trait: the only persistence dependency
//! - **Send/Publish/ConsumeObserverConnector**: the bus-side registration surface

pub mod bus;
pub mod config;
pub mod connector;
pub mod error;
pub mod filter;
pub mod metadata;
pub mod observer;
pub mod report;
pub mod store;
pub mod types;

// Re-export core types
pub use config::{
    connect_consume_audit_observer, connect_send_audit_observers, AuditOptions,
    AuditOptionsBuilder, AuditSettings, ConsumeAuditOptions, DefaultMetadataFactory,
    FilterSettings, SendAuditHandles, SendAuditOptions,
};
pub use connector::{
    ConsumeObserverConnector, InboundObserver, ObserverHandle, ObserverSet, OutboundObserver,
    PublishObserverConnector, SendObserverConnector,
};
pub use error::{AuditError, Result};
pub use filter::{FilterPredicate, FilterSpecification, MessageFilter};
pub use metadata::{
    DefaultInboundMetadataFactory, DefaultOutboundMetadataFactory, InboundMetadataFactory,
    OutboundMetadataFactory,
};
pub use observer::{AuditConsumeObserver, AuditPublishObserver, AuditSendObserver};
pub use report::{AuditFailure, AuditFailureReporter, TracingFailureReporter};
pub use store::MessageAuditStore;
pub use types::{AuditDirection, AuditMetadata, AuditRecord, Message, MessageContext};

// Re-export the bus and stores for convenience
pub use bus::{handler_fn, HandlerFn, MemoryBus, MessageHandler};
pub use store::file::FileAuditStore;
pub use store::memory::MemoryAuditStore;
pub use store::nats::{NatsAuditConfig, NatsAuditStore, StorageType};
