//! Registered-account lookup consumed by the issuer.
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;

use crate::error::AppError;
use crate::validation::normalize_identity;

/// Answers whether an identity belongs to a registered account
#[async_trait]
pub trait Directory: Send + Sync {
    async fn exists(&self, identity: &str) -> Result<bool, AppError>;
}

/// Fixed set of registered emails, normalized on load
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    identities: HashSet<String>,
}

impl StaticDirectory {
    pub fn new<I, S>(identities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let identities = identities
            .into_iter()
            .filter_map(|raw| match normalize_identity(raw.as_ref()) {
                Ok(identity) => Some(identity),
                Err(e) => {
                    tracing::warn!("ignoring directory entry: {e}");
                    None
                },
            })
            .collect();
        Self { identities }
    }

    /// Load a JSON array of email addresses. A missing file yields an empty directory.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::warn!(path = %path.display(), "directory file not found, no identities registered");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let entries: Vec<String> = serde_json::from_str(&content)?;
        let directory = Self::new(entries);
        tracing::info!(count = directory.len(), "loaded account directory");
        Ok(directory)
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}

#[async_trait]
impl Directory for StaticDirectory {
    async fn exists(&self, identity: &str) -> Result<bool, AppError> {
        Ok(self.identities.contains(identity))
    }
}
