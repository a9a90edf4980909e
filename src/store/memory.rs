//! In-memory audit store for development and testing

use super::MessageAuditStore;
use crate::error::Result;
use crate::types::{AuditDirection, AuditRecord};
use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::sync::RwLock;

/// Bounded in-memory audit store
///
/// Keeps the most recent `capacity` records; older ones are evicted.
/// A capacity of 0 means unbounded.
pub struct MemoryAuditStore {
    inner: RwLock<Inner>,
    capacity: usize,
}

struct Inner {
    records: VecDeque<AuditRecord>,
    total: u64,
}

impl MemoryAuditStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Inner {
                records: VecDeque::new(),
                total: 0,
            }),
            capacity,
        }
    }

    /// Number of records currently retained
    pub async fn count(&self) -> usize {
        self.inner.read().await.records.len()
    }

    /// Total records accepted, including evicted ones
    pub async fn total_recorded(&self) -> u64 {
        self.inner.read().await.total
    }

    /// Most recent records first
    pub async fn recent(&self, limit: usize) -> Vec<AuditRecord> {
        let inner = self.inner.read().await;
        inner.records.iter().rev().take(limit).cloned().collect()
    }

    /// All retained records, oldest first
    pub async fn records(&self) -> Vec<AuditRecord> {
        self.inner.read().await.records.iter().cloned().collect()
    }

    pub async fn by_direction(&self, direction: AuditDirection) -> Vec<AuditRecord> {
        let inner = self.inner.read().await;
        inner
            .records
            .iter()
            .filter(|r| r.metadata.direction == direction)
            .cloned()
            .collect()
    }

    pub async fn by_message_type(&self, message_type: &str) -> Vec<AuditRecord> {
        let inner = self.inner.read().await;
        inner
            .records
            .iter()
            .filter(|r| r.metadata.message_type == message_type)
            .cloned()
            .collect()
    }

    pub async fn clear(&self) {
        self.inner.write().await.records.clear();
    }
}

impl Default for MemoryAuditStore {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl MessageAuditStore for MemoryAuditStore {
    async fn record(&self, record: AuditRecord) -> Result<()> {
        tracing::debug!(
            message_id = %record.metadata.message_id,
            message_type = %record.metadata.message_type,
            direction = %record.metadata.direction,
            "Audit record stored in memory"
        );

        let mut inner = self.inner.write().await;
        inner.records.push_back(record);
        inner.total += 1;

        if self.capacity > 0 && inner.records.len() > self.capacity {
            let drain_count = inner.records.len() - self.capacity;
            inner.records.drain(..drain_count);
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
