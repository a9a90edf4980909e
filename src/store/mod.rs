//! Audit store trait: the persistence capability observers write to
//!
//! The audit layer only depends on `MessageAuditStore`. Reference
//! implementations are provided for in-memory, JSON-lines file, and
//! NATS JetStream storage.

use crate::error::Result;
use crate::types::AuditRecord;
use async_trait::async_trait;

pub mod file;
pub mod memory;
pub mod nats;

/// Durable recording of audited messages
///
/// `record` may be called concurrently for independent messages. No
/// ordering across messages is expected. Implementations provide their
/// own internal serialization.
#[async_trait]
pub trait MessageAuditStore: Send + Sync {
    /// Record a message and its metadata
    ///
    /// An `Err` is an audit-local failure; it never affects delivery of
    /// the message being audited.
    async fn record(&self, record: AuditRecord) -> Result<()>;

    /// Store name (e.g., "memory", "file", "nats")
    fn name(&self) -> &str;
}
