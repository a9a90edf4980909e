//! Audit configuration and observer registration
//!
//! `AuditOptions` is built once, before any observer exists, and moved
//! into the entry point that connects the observers:
//!
//! ```rust
//! use a3s_audit::{connect_send_audit_observers, MemoryAuditStore, MemoryBus, SendAuditOptions};
//! use std::sync::Arc;
//!
//! # fn example() -> a3s_audit::Result<()> {
//! let bus = MemoryBus::new("loopback://local/app");
//! let store = Arc::new(MemoryAuditStore::default());
//!
//! let options = SendAuditOptions::builder()
//!     .store(store)
//!     .filter(|f| {
//!         f.include_type("OrderPlaced");
//!     })
//!     .build()?;
//!
//! let handles = connect_send_audit_observers(&bus, options);
//! # handles.disconnect();
//! # Ok(())
//! # }
//! ```

use crate::connector::{
    ConsumeObserverConnector, ObserverHandle, PublishObserverConnector, SendObserverConnector,
};
use crate::error::{AuditError, Result};
use crate::filter::{FilterSpecification, MessageFilter};
use crate::metadata::{
    DefaultInboundMetadataFactory, DefaultOutboundMetadataFactory, InboundMetadataFactory,
    OutboundMetadataFactory,
};
use crate::observer::{AuditConsumeObserver, AuditPublishObserver, AuditSendObserver};
use crate::report::{AuditFailureReporter, TracingFailureReporter};
use crate::store::MessageAuditStore;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Declarative filter configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterSettings {
    /// Only audit these message types (empty = no type restriction)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub include_types: Vec<String>,

    /// Never audit these message types
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclude_types: Vec<String>,
}

impl FilterSettings {
    /// Register these settings on a filter specification
    pub fn apply(&self, spec: &mut FilterSpecification) {
        if !self.include_types.is_empty() {
            spec.include_types(self.include_types.iter().cloned());
        }
        for message_type in &self.exclude_types {
            spec.exclude_type(message_type.clone());
        }
    }
}

/// Audit settings loadable from a JSON file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuditSettings {
    pub filter: FilterSettings,

    /// Payload fields the default metadata factory copies into `custom`
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub payload_fields: Vec<String>,
}

impl AuditSettings {
    /// Load settings from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            AuditError::Config(format!(
                "Failed to read audit settings {}: {}",
                path.display(),
                e
            ))
        })?;

        serde_json::from_str(&json).map_err(|e| {
            AuditError::Config(format!(
                "Failed to parse audit settings {}: {}",
                path.display(),
                e
            ))
        })
    }
}

/// Metadata factory kinds that have a built-in default
pub trait DefaultMetadataFactory {
    fn default_factory(payload_fields: &[String]) -> Arc<Self>;
}

impl DefaultMetadataFactory for dyn OutboundMetadataFactory {
    fn default_factory(payload_fields: &[String]) -> Arc<Self> {
        Arc::new(
            DefaultOutboundMetadataFactory::new().with_payload_fields(payload_fields.iter().cloned()),
        )
    }
}

impl DefaultMetadataFactory for dyn InboundMetadataFactory {
    fn default_factory(payload_fields: &[String]) -> Arc<Self> {
        Arc::new(
            DefaultInboundMetadataFactory::new().with_payload_fields(payload_fields.iter().cloned()),
        )
    }
}

/// Everything an audit observer needs, fixed at configuration time
pub struct AuditOptions<F: ?Sized> {
    store: Arc<dyn MessageAuditStore>,
    filter: MessageFilter,
    metadata_factory: Arc<F>,
    reporter: Arc<dyn AuditFailureReporter>,
}

/// Options for the send and publish observers
pub type SendAuditOptions = AuditOptions<dyn OutboundMetadataFactory>;

/// Options for the consume observer
pub type ConsumeAuditOptions = AuditOptions<dyn InboundMetadataFactory>;

impl<F: ?Sized + DefaultMetadataFactory> AuditOptions<F> {
    pub fn builder() -> AuditOptionsBuilder<F> {
        AuditOptionsBuilder {
            store: None,
            filters: Vec::new(),
            metadata_factory: None,
            payload_fields: Vec::new(),
            reporter: None,
        }
    }
}

impl<F: ?Sized> AuditOptions<F> {
    pub fn store(&self) -> &Arc<dyn MessageAuditStore> {
        &self.store
    }

    pub fn filter(&self) -> &MessageFilter {
        &self.filter
    }

    pub fn metadata_factory(&self) -> &Arc<F> {
        &self.metadata_factory
    }
}

type FilterCallback = Box<dyn FnOnce(&mut FilterSpecification)>;

/// Builder for `AuditOptions`
///
/// Defaults: match-all filter, the built-in metadata factory, and
/// `TracingFailureReporter`. The store has no default.
pub struct AuditOptionsBuilder<F: ?Sized> {
    store: Option<Arc<dyn MessageAuditStore>>,
    filters: Vec<FilterCallback>,
    metadata_factory: Option<Arc<F>>,
    payload_fields: Vec<String>,
    reporter: Option<Arc<dyn AuditFailureReporter>>,
}

impl<F: ?Sized + DefaultMetadataFactory> AuditOptionsBuilder<F> {
    /// Audit store (required)
    pub fn store(mut self, store: Arc<dyn MessageAuditStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Filter configuration callback, run once by `build()`
    ///
    /// May be called more than once; all registrations apply.
    pub fn filter(mut self, configure: impl FnOnce(&mut FilterSpecification) + 'static) -> Self {
        self.filters.push(Box::new(configure));
        self
    }

    /// Override the built-in metadata factory
    pub fn metadata_factory(mut self, factory: Arc<F>) -> Self {
        self.metadata_factory = Some(factory);
        self
    }

    /// Destination for store failures
    pub fn reporter(mut self, reporter: Arc<dyn AuditFailureReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Apply file-based settings: filter rules and default factory payload fields
    pub fn settings(mut self, settings: &AuditSettings) -> Self {
        let filter = settings.filter.clone();
        self.filters.push(Box::new(move |spec: &mut FilterSpecification| {
            filter.apply(spec)
        }));
        self.payload_fields = settings.payload_fields.clone();
        self
    }

    /// Validate and freeze the configuration
    pub fn build(self) -> Result<AuditOptions<F>> {
        let store = self
            .store
            .ok_or_else(|| AuditError::Config("An audit store is required".to_string()))?;

        let mut spec = FilterSpecification::new();
        for configure in self.filters {
            configure(&mut spec);
        }
        let filter = spec.build()?;

        let metadata_factory = self
            .metadata_factory
            .unwrap_or_else(|| F::default_factory(&self.payload_fields));

        let reporter: Arc<dyn AuditFailureReporter> = match self.reporter {
            Some(reporter) => reporter,
            None => Arc::new(TracingFailureReporter),
        };

        Ok(AuditOptions {
            store,
            filter,
            metadata_factory,
            reporter,
        })
    }
}

/// Handles for the send/publish observer pair
#[derive(Debug)]
pub struct SendAuditHandles {
    pub send: ObserverHandle,
    pub publish: ObserverHandle,
}

impl SendAuditHandles {
    pub fn disconnect(self) {
        self.send.disconnect();
        self.publish.disconnect();
    }
}

/// Audit everything the connector sends and publishes
///
/// Connects an `AuditSendObserver` and an `AuditPublishObserver` sharing the
/// same store, filter and metadata factory. Records are written before the
/// message is handed to the transport.
pub fn connect_send_audit_observers<C>(connector: &C, options: SendAuditOptions) -> SendAuditHandles
where
    C: SendObserverConnector + PublishObserverConnector + ?Sized,
{
    let store_name = options.store.name().to_string();

    let send = AuditSendObserver::new(
        options.store.clone(),
        options.metadata_factory.clone(),
        options.filter.clone(),
    )
    .with_reporter(options.reporter.clone());

    let publish = AuditPublishObserver::new(options.store, options.metadata_factory, options.filter)
        .with_reporter(options.reporter);

    let handles = SendAuditHandles {
        send: connector.connect_send_observer(Arc::new(send)),
        publish: connector.connect_publish_observer(Arc::new(publish)),
    };

    tracing::info!(
        store = %store_name,
        send_observer = handles.send.id(),
        publish_observer = handles.publish.id(),
        "Send/publish audit observers connected"
    );

    handles
}

/// Audit everything the connector consumes, before the handler runs
pub fn connect_consume_audit_observer<C>(connector: &C, options: ConsumeAuditOptions) -> ObserverHandle
where
    C: ConsumeObserverConnector + ?Sized,
{
    let store_name = options.store.name().to_string();

    let observer = AuditConsumeObserver::new(options.store, options.metadata_factory, options.filter)
        .with_reporter(options.reporter);
    let handle = connector.connect_consume_observer(Arc::new(observer));

    tracing::info!(
        store = %store_name,
        consume_observer = handle.id(),
        "Consume audit observer connected"
    );

    handle
}
