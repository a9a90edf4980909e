//! Core message and audit types for the a3s-audit system
//!
//! All types use camelCase JSON serialization for wire compatibility.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::error::Result;

/// A typed bus message
///
/// `MESSAGE_TYPE` is the identity filters and metadata refer to
/// (e.g., `"OrderPlaced"`). It must be non-empty.
pub trait Message: Serialize {
    /// Message type identity
    const MESSAGE_TYPE: &'static str;
}

/// An in-flight message plus its envelope
///
/// Owned by the bus. Observers and metadata factories only ever see
/// `&MessageContext`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageContext {
    /// Unique message identifier (msg-<uuid>)
    pub message_id: String,

    /// Message type identity
    pub message_type: String,

    /// Address of the endpoint that produced the message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_address: Option<String>,

    /// Address the message is being sent to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_address: Option<String>,

    /// Address responses should be sent to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_address: Option<String>,

    /// Address faults should be sent to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault_address: Option<String>,

    /// Endpoint the message arrived on (inbound only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,

    /// Id of the message that caused this one to be produced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiator_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    /// When the message was produced
    pub sent_time: DateTime<Utc>,

    /// Transport headers
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Message body as JSON
    pub payload: serde_json::Value,
}

impl MessageContext {
    /// Build a context from a typed message
    pub fn new<M: Message>(message: &M) -> Result<Self> {
        let payload = serde_json::to_value(message)?;
        Ok(Self::from_json(M::MESSAGE_TYPE, payload))
    }

    /// Build a context from an already-serialized payload
    pub fn from_json(message_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            message_id: format!("msg-{}", uuid::Uuid::new_v4()),
            message_type: message_type.into(),
            source_address: None,
            destination_address: None,
            response_address: None,
            fault_address: None,
            input_address: None,
            correlation_id: None,
            conversation_id: Some(uuid::Uuid::new_v4().to_string()),
            initiator_id: None,
            request_id: None,
            sent_time: Utc::now(),
            headers: HashMap::new(),
            payload,
        }
    }

    pub fn with_source(mut self, address: impl Into<String>) -> Self {
        self.source_address = Some(address.into());
        self
    }

    pub fn with_destination(mut self, address: impl Into<String>) -> Self {
        self.destination_address = Some(address.into());
        self
    }

    pub fn with_response_address(mut self, address: impl Into<String>) -> Self {
        self.response_address = Some(address.into());
        self
    }

    pub fn with_fault_address(mut self, address: impl Into<String>) -> Self {
        self.fault_address = Some(address.into());
        self
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_conversation_id(mut self, id: impl Into<String>) -> Self {
        self.conversation_id = Some(id.into());
        self
    }

    pub fn with_initiator_id(mut self, id: impl Into<String>) -> Self {
        self.initiator_id = Some(id.into());
        self
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    /// Add a header entry
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Whether this context carries a message of type `M`
    pub fn is<M: Message>(&self) -> bool {
        self.message_type == M::MESSAGE_TYPE
    }
}

/// Traffic direction an audit record was captured on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuditDirection {
    /// Sent to a specific endpoint
    Sent,
    /// Published to all subscribers of the message type
    Published,
    /// Delivered to a consumer, before the handler ran
    Consumed,
}

impl AuditDirection {
    /// Lowercase name, used in subjects and log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditDirection::Sent => "sent",
            AuditDirection::Published => "published",
            AuditDirection::Consumed => "consumed",
        }
    }

    /// The bus context this direction is observed on ("Send", "Publish", "Consume")
    pub fn context_type(&self) -> &'static str {
        match self {
            AuditDirection::Sent => "Send",
            AuditDirection::Published => "Publish",
            AuditDirection::Consumed => "Consume",
        }
    }

    pub fn is_outbound(&self) -> bool {
        !matches!(self, AuditDirection::Consumed)
    }
}

impl std::fmt::Display for AuditDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata describing one observed message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditMetadata {
    pub direction: AuditDirection,

    pub message_id: String,

    pub message_type: String,

    /// "Send", "Publish" or "Consume"
    pub context_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault_address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiator_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    pub sent_time: DateTime<Utc>,

    /// When the audit layer observed the message
    pub captured_at: DateTime<Utc>,

    /// Transport headers, ordered by key
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// Payload-derived fields
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom: BTreeMap<String, String>,
}

/// A message paired with its audit metadata, as handed to the store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub message: serde_json::Value,
    pub metadata: AuditMetadata,
}

impl AuditRecord {
    pub fn new(message: serde_json::Value, metadata: AuditMetadata) -> Self {
        Self { message, metadata }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_context_from_typed_message() {
        let ctx = MessageContext::new(&order_placed()).unwrap();

        assert!(ctx.message_id.starts_with("msg-"));
        assert_eq!(ctx.message_type, "OrderPlaced");
        assert_eq!(ctx.payload["order_id"], "ord-1");
        assert_eq!(ctx.payload["amount"], 250);
        assert!(ctx.conversation_id.is_some());
        assert!(ctx.correlation_id.is_none());
        assert!(ctx.headers.is_empty());
        assert!(ctx.is::<OrderPlaced>());
        assert!(!ctx.is::<OrderShipped>());
    }

    #[test]
    fn test_context_builders() {
        let ctx = MessageContext::from_json("Ping", serde_json::json!({}))
            .with_source("loopback://app/publisher")
            .with_destination("loopback://app/orders")
            .with_correlation_id("corr-1")
            .with_request_id("req-9")
            .with_header("tenant", "acme");

        assert_eq!(ctx.source_address.as_deref(), Some("loopback://app/publisher"));
        assert_eq!(ctx.destination_address.as_deref(), Some("loopback://app/orders"));
        assert_eq!(ctx.correlation_id.as_deref(), Some("corr-1"));
        assert_eq!(ctx.request_id.as_deref(), Some("req-9"));
        assert_eq!(ctx.headers["tenant"], "acme");
    }

    #[test]
    fn test_context_serialization_skips_empty_addresses() {
        let ctx = MessageContext::from_json("Ping", serde_json::json!({"n": 1}));
        let json = serde_json::to_string(&ctx).unwrap();

        assert!(json.contains("\"messageType\":\"Ping\""));
        assert!(!json.contains("sourceAddress"));
        assert!(!json.contains("correlationId"));
    }

    #[test]
    fn test_direction_names() {
        assert_eq!(AuditDirection::Sent.as_str(), "sent");
        assert_eq!(AuditDirection::Published.context_type(), "Publish");
        assert_eq!(AuditDirection::Consumed.to_string(), "consumed");
        assert!(AuditDirection::Sent.is_outbound());
        assert!(AuditDirection::Published.is_outbound());
        assert!(!AuditDirection::Consumed.is_outbound());

        let json = serde_json::to_string(&AuditDirection::Published).unwrap();
        assert_eq!(json, "\"published\"");
    }
}
