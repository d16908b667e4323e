//! In-process store backed by a sharded concurrent map.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::Arc;

use super::OtpStore;
use crate::error::AppError;
use crate::otp::{OtpRecord, RecordVersion};

/// Records live in a `DashMap`; shard locks give per-identity atomicity.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<DashMap<String, OtpRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl OtpStore for MemoryStore {
    async fn get(&self, identity: &str) -> Result<Option<OtpRecord>, AppError> {
        Ok(self.records.get(identity).map(|r| r.value().clone()))
    }

    async fn put(&self, record: OtpRecord) -> Result<(), AppError> {
        self.records.insert(record.identity.clone(), record);
        Ok(())
    }

    async fn delete(&self, identity: &str) -> Result<bool, AppError> {
        Ok(self.records.remove(identity).is_some())
    }

    async fn compare_and_swap(
        &self,
        identity: &str,
        expected: Option<RecordVersion>,
        new: Option<OtpRecord>,
    ) -> Result<bool, AppError> {
        let applied = match (expected, new) {
            (None, Some(record)) => match self.records.entry(identity.to_string()) {
                Entry::Vacant(slot) => {
                    slot.insert(record);
                    true
                },
                Entry::Occupied(_) => false,
            },
            (None, None) => !self.records.contains_key(identity),
            (Some(version), Some(record)) => match self.records.get_mut(identity) {
                Some(mut current) if current.version() == version => {
                    *current = record;
                    true
                },
                _ => false,
            },
            (Some(version), None) => self
                .records
                .remove_if(identity, |_, current| current.version() == version)
                .is_some(),
        };
        Ok(applied)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, AppError> {
        let mut removed = 0;
        self.records.retain(|_, record| {
            let keep = !record.is_expired(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }
}
