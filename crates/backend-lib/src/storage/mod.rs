// ============================
// crates/backend-lib/src/storage/mod.rs
// ============================
//! Storage abstraction for OTP records, with in-memory and flat-file backends.
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::otp::{OtpRecord, RecordVersion};

mod flat_file;
mod memory;

pub use flat_file::FlatFileStore;
pub use memory::MemoryStore;

/// Keyed persistence for [`OtpRecord`]s.
///
/// Every method is atomic per identity. Operations on different identities
/// never wait on each other.
#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Load the record for an identity
    async fn get(&self, identity: &str) -> Result<Option<OtpRecord>, AppError>;

    /// Store a record, replacing whatever the identity had
    async fn put(&self, record: OtpRecord) -> Result<(), AppError>;

    /// Remove the record for an identity; returns whether one existed
    async fn delete(&self, identity: &str) -> Result<bool, AppError>;

    /// Atomic conditional update.
    ///
    /// Applies `new` (a record to write, or `None` to delete) only if the
    /// stored version equals `expected` (`None` meaning "no record").
    /// Returns whether the update was applied.
    async fn compare_and_swap(
        &self,
        identity: &str,
        expected: Option<RecordVersion>,
        new: Option<OtpRecord>,
    ) -> Result<bool, AppError>;

    /// Delete every record that is dead at `now`; returns how many were removed
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, AppError>;
}
