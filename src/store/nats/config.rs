//! NATS audit store configuration

use crate::types::AuditDirection;
use serde::{Deserialize, Serialize};

/// JetStream storage backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StorageType {
    #[default]
    File,
    Memory,
}

/// Configuration for `NatsAuditStore`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NatsAuditConfig {
    /// NATS server URL
    pub url: String,

    /// JetStream stream holding audit records
    pub stream_name: String,

    /// Subject prefix; records go to `<prefix>.<direction>.<message_type>`
    pub subject_prefix: String,

    pub storage: StorageType,

    /// Maximum records retained by the stream (-1 = unlimited)
    pub max_records: i64,

    /// Maximum bytes retained by the stream (-1 = unlimited)
    pub max_bytes: i64,

    /// Maximum record age in seconds (0 = unlimited)
    pub max_age_secs: u64,

    pub connect_timeout_secs: u64,

    pub request_timeout_secs: u64,

    /// How long to wait for the JetStream publish ack
    pub ack_timeout_secs: u64,

    /// Optional auth token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Default for NatsAuditConfig {
    fn default() -> Self {
        Self {
            url: "nats://127.0.0.1:4222".to_string(),
            stream_name: "A3S_AUDIT".to_string(),
            subject_prefix: "audit".to_string(),
            storage: StorageType::File,
            max_records: 1_000_000,
            max_bytes: -1,
            max_age_secs: 30 * 24 * 3600,
            connect_timeout_secs: 5,
            request_timeout_secs: 10,
            ack_timeout_secs: 5,
            token: None,
        }
    }
}

impl NatsAuditConfig {
    /// Subject a record is published to
    ///
    /// Message type names are sanitized so they form a single subject token.
    pub fn record_subject(&self, direction: AuditDirection, message_type: &str) -> String {
        let token: String = message_type
            .chars()
            .map(|c| match c {
                '.' | '*' | '>' | ' ' | '\t' => '_',
                other => other,
            })
            .collect();
        let token = if token.is_empty() { "unknown".to_string() } else { token };
        format!("{}.{}.{}", self.subject_prefix, direction.as_str(), token)
    }

    /// Subjects the stream captures
    pub fn stream_subjects(&self) -> Vec<String> {
        vec![format!("{}.>", self.subject_prefix)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NatsAuditConfig::default();
        assert_eq!(config.url, "nats://127.0.0.1:4222");
        assert_eq!(config.stream_name, "A3S_AUDIT");
        assert_eq!(config.storage, StorageType::File);
        assert!(config.token.is_none());
        assert_eq!(config.stream_subjects(), vec!["audit.>"]);
    }

    #[test]
    fn test_record_subject() {
        let config = NatsAuditConfig::default();
        assert_eq!(
            config.record_subject(AuditDirection::Sent, "OrderPlaced"),
            "audit.sent.OrderPlaced"
        );
        assert_eq!(
            config.record_subject(AuditDirection::Consumed, "orders.v1.Placed"),
            "audit.consumed.orders_v1_Placed"
        );
        assert_eq!(
            config.record_subject(AuditDirection::Published, ""),
            "audit.published.unknown"
        );
    }

    #[test]
    fn test_config_partial_deserialization() {
        let config: NatsAuditConfig = serde_json::from_str(
            r#"{"url": "nats://bus:4222", "subjectPrefix": "ops.audit", "storage": "memory"}"#,
        )
        .unwrap();

        assert_eq!(config.url, "nats://bus:4222");
        assert_eq!(config.subject_prefix, "ops.audit");
        assert_eq!(config.storage, StorageType::Memory);
        assert_eq!(config.stream_name, "A3S_AUDIT");
        assert_eq!(config.ack_timeout_secs, 5);
    }
}
