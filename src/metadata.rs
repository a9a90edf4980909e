//! Audit metadata factories
//!
//! A factory turns a `MessageContext` into an `AuditMetadata` record. It is
//! called synchronously from an observer hook and must not have side
//! effects. Outbound factories serve both the send and publish observers;
//! inbound factories serve the consume observer.

use crate::types::{AuditDirection, AuditMetadata, MessageContext};
use chrono::Utc;
use std::collections::BTreeMap;

/// Builds metadata for messages leaving the process (send, publish)
pub trait OutboundMetadataFactory: Send + Sync {
    /// `direction` is `Sent` or `Published`
    fn create(&self, ctx: &MessageContext, direction: AuditDirection) -> AuditMetadata;
}

/// Builds metadata for messages arriving at a consumer, before the handler runs
pub trait InboundMetadataFactory: Send + Sync {
    fn create(&self, ctx: &MessageContext) -> AuditMetadata;
}

/// Default outbound factory
///
/// Copies the envelope fields and stamps the capture time. Optionally
/// copies selected top-level payload fields into `custom`.
#[derive(Debug, Clone, Default)]
pub struct DefaultOutboundMetadataFactory {
    payload_fields: Vec<String>,
}

impl DefaultOutboundMetadataFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy these top-level payload fields into `AuditMetadata::custom`
    pub fn with_payload_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.payload_fields = fields.into_iter().map(Into::into).collect();
        self
    }
}

impl OutboundMetadataFactory for DefaultOutboundMetadataFactory {
    fn create(&self, ctx: &MessageContext, direction: AuditDirection) -> AuditMetadata {
        let mut metadata = envelope_metadata(ctx, direction, &self.payload_fields);
        // Outbound messages have not arrived anywhere yet
        metadata.input_address = None;
        metadata
    }
}

/// Default inbound factory
#[derive(Debug, Clone, Default)]
pub struct DefaultInboundMetadataFactory {
    payload_fields: Vec<String>,
}

impl DefaultInboundMetadataFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy these top-level payload fields into `AuditMetadata::custom`
    pub fn with_payload_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.payload_fields = fields.into_iter().map(Into::into).collect();
        self
    }
}

impl InboundMetadataFactory for DefaultInboundMetadataFactory {
    fn create(&self, ctx: &MessageContext) -> AuditMetadata {
        envelope_metadata(ctx, AuditDirection::Consumed, &self.payload_fields)
    }
}

fn envelope_metadata(
    ctx: &MessageContext,
    direction: AuditDirection,
    payload_fields: &[String],
) -> AuditMetadata {
    AuditMetadata {
        direction,
        message_id: ctx.message_id.clone(),
        message_type: ctx.message_type.clone(),
        context_type: direction.context_type().to_string(),
        source_address: ctx.source_address.clone(),
        destination_address: ctx.destination_address.clone(),
        input_address: ctx.input_address.clone(),
        response_address: ctx.response_address.clone(),
        fault_address: ctx.fault_address.clone(),
        correlation_id: ctx.correlation_id.clone(),
        conversation_id: ctx.conversation_id.clone(),
        initiator_id: ctx.initiator_id.clone(),
        request_id: ctx.request_id.clone(),
        sent_time: ctx.sent_time,
        captured_at: Utc::now(),
        headers: ctx.headers.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        custom: payload_custom_fields(&ctx.payload, payload_fields),
    }
}

/// Stringify the requested top-level payload fields; missing fields are skipped
fn payload_custom_fields(payload: &serde_json::Value, fields: &[String]) -> BTreeMap<String, String> {
    fields
        .iter()
        .filter_map(|field| {
            let value = payload.get(field)?;
            let text = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some((field.clone(), text))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::order_placed;

    fn context() -> MessageContext {
        MessageContext::new(&order_placed())
            .unwrap()
            .with_source("loopback://app/checkout")
            .with_destination("loopback://app/orders")
            .with_correlation_id("corr-42")
    }

    #[test]
    fn test_default_outbound_populates_envelope() {
        let ctx = context();
        let metadata = DefaultOutboundMetadataFactory::new().create(&ctx, AuditDirection::Sent);

        assert_eq!(metadata.direction, AuditDirection::Sent);
        assert_eq!(metadata.context_type, "Send");
        assert_eq!(metadata.message_id, ctx.message_id);
        assert_eq!(metadata.message_type, "OrderPlaced");
        assert_eq!(metadata.source_address.as_deref(), Some("loopback://app/checkout"));
        assert_eq!(metadata.destination_address.as_deref(), Some("loopback://app/orders"));
        assert_eq!(metadata.correlation_id.as_deref(), Some("corr-42"));
        assert_eq!(metadata.conversation_id, ctx.conversation_id);
        assert_eq!(metadata.sent_time, ctx.sent_time);
        assert!(metadata.captured_at >= ctx.sent_time);
        assert!(metadata.custom.is_empty());
    }

    #[test]
    fn test_default_outbound_publish_direction() {
        let metadata =
            DefaultOutboundMetadataFactory::new().create(&context(), AuditDirection::Published);
        assert_eq!(metadata.direction, AuditDirection::Published);
        assert_eq!(metadata.context_type, "Publish");
    }

    #[test]
    fn test_outbound_ignores_input_address() {
        let mut ctx = context();
        ctx.input_address = Some("loopback://app/orders".to_string());
        let metadata = DefaultOutboundMetadataFactory::new().create(&ctx, AuditDirection::Sent);
        assert!(metadata.input_address.is_none());
    }

    #[test]
    fn test_default_inbound_records_input_address() {
        let mut ctx = context();
        ctx.input_address = Some("loopback://app/orders".to_string());

        let metadata = DefaultInboundMetadataFactory::new().create(&ctx);
        assert_eq!(metadata.direction, AuditDirection::Consumed);
        assert_eq!(metadata.context_type, "Consume");
        assert_eq!(metadata.input_address.as_deref(), Some("loopback://app/orders"));
    }

    #[test]
    fn test_payload_fields_copied_to_custom() {
        let factory = DefaultInboundMetadataFactory::new()
            .with_payload_fields(["order_id", "amount", "missing"]);
        let metadata = factory.create(&context());

        assert_eq!(metadata.custom.len(), 2);
        assert_eq!(metadata.custom["order_id"], "ord-1");
        assert_eq!(metadata.custom["amount"], "250");
    }

    #[test]
    fn test_factory_does_not_touch_context() {
        let ctx = context();
        let before = serde_json::to_value(&ctx).unwrap();
        let _ = DefaultOutboundMetadataFactory::new()
            .with_payload_fields(["order_id"])
            .create(&ctx, AuditDirection::Sent);
        assert_eq!(serde_json::to_value(&ctx).unwrap(), before);
    }

    #[test]
    fn test_metadata_serialization() {
        let metadata = DefaultOutboundMetadataFactory::new().create(&context(), AuditDirection::Sent);
        let json = serde_json::to_string(&metadata).unwrap();

        assert!(json.contains("\"direction\":\"sent\""));
        assert!(json.contains("\"messageType\":\"OrderPlaced\""));
        assert!(json.contains("\"correlationId\":\"corr-42\""));
        assert!(!json.contains("inputAddress"));
        assert!(!json.contains("custom"));

        let parsed: AuditMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, metadata);
    }

    #[test]
    fn test_headers_serialize_in_key_order() {
        let ctx = context()
            .with_header("zone", "eu-1")
            .with_header("attempt", "1")
            .with_header("tenant", "acme");

        let json = serde_json::to_string(
            &DefaultInboundMetadataFactory::new().create(&ctx).headers,
        )
        .unwrap();
        assert_eq!(json, r#"{"attempt":"1","tenant":"acme","zone":"eu-1"}"#);
    }
}
