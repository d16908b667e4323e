// ============================
// crates/backend-lib/src/storage/flat_file.rs
// ============================
//! Flat-file store: one JSON document per identity.
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{fs as tokio_fs, sync::Mutex};

use super::OtpStore;
use crate::error::AppError;
use crate::otp::{OtpRecord, RecordVersion};

const RECORD_EXT: &str = "json";

/// Records under `<root>/records/<base64url(sha256(identity))>.json`.
///
/// File names have a fixed length whatever the address length; the identity
/// itself is read back from the record.
///
/// Each identity has its own async mutex, held for one store call. Writes
/// go to a temp file that is renamed over the record.
#[derive(Clone)]
pub struct FlatFileStore {
    root: PathBuf,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl FlatFileStore {
    pub fn new<P: AsRef<Path>>(root: P) -> anyhow::Result<Self> {
        let root = root.as_ref().join("records");
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            locks: Arc::new(DashMap::new()),
        })
    }

    fn path_for(&self, identity: &str) -> PathBuf {
        self.root.join(file_name(identity))
    }

    fn lock_for(&self, identity: &str) -> Arc<Mutex<()>> {
        Arc::clone(&self.locks.entry(identity.to_string()).or_default())
    }

    async fn read_record(&self, identity: &str) -> Result<Option<OtpRecord>, AppError> {
        match tokio_fs::read(self.path_for(identity)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_record(&self, record: &OtpRecord) -> Result<(), AppError> {
        let path = self.path_for(&record.identity);
        let tmp = path.with_extension("tmp");
        let json = serde_json::to_vec_pretty(record)?;
        tokio_fs::write(&tmp, json).await?;
        tokio_fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove_record(&self, identity: &str) -> Result<bool, AppError> {
        match tokio_fs::remove_file(self.path_for(identity)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Identities that currently have a record file
    async fn identities(&self) -> Result<Vec<String>, AppError> {
        let mut identities = Vec::new();
        let mut entries = tokio_fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXT) {
                continue;
            }
            let bytes = match tokio_fs::read(&path).await {
                Ok(bytes) => bytes,
                // removed since the listing
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            match serde_json::from_slice::<OtpRecord>(&bytes) {
                Ok(record) => identities.push(record.identity),
                Err(e) => {
                    tracing::warn!(path = %path.display(), "skipping unreadable record file: {e}")
                },
            }
        }
        Ok(identities)
    }
}

fn file_name(identity: &str) -> String {
    let digest = Sha256::digest(identity.as_bytes());
    format!("{}.{RECORD_EXT}", URL_SAFE_NO_PAD.encode(digest))
}

#[async_trait]
impl OtpStore for FlatFileStore {
    async fn get(&self, identity: &str) -> Result<Option<OtpRecord>, AppError> {
        let lock = self.lock_for(identity);
        let _guard = lock.lock().await;
        self.read_record(identity).await
    }

    async fn put(&self, record: OtpRecord) -> Result<(), AppError> {
        let lock = self.lock_for(&record.identity);
        let _guard = lock.lock().await;
        self.write_record(&record).await
    }

    async fn delete(&self, identity: &str) -> Result<bool, AppError> {
        let lock = self.lock_for(identity);
        let _guard = lock.lock().await;
        self.remove_record(identity).await
    }

    async fn compare_and_swap(
        &self,
        identity: &str,
        expected: Option<RecordVersion>,
        new: Option<OtpRecord>,
    ) -> Result<bool, AppError> {
        let lock = self.lock_for(identity);
        let _guard = lock.lock().await;

        let current = self.read_record(identity).await?.map(|r| r.version());
        if current != expected {
            return Ok(false);
        }

        match new {
            Some(record) => self.write_record(&record).await?,
            None => {
                self.remove_record(identity).await?;
            },
        }
        Ok(true)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, AppError> {
        let mut removed = 0;
        for identity in self.identities().await? {
            let lock = self.lock_for(&identity);
            let _guard = lock.lock().await;
            if let Some(record) = self.read_record(&identity).await? {
                if record.is_expired(now) && self.remove_record(&identity).await? {
                    removed += 1;
                }
            }
        }

        // drop lock entries nobody is holding
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);

        Ok(removed)
    }
}
