//! Per-(screen, language) dropdown datasets behind a TTL cache with
//! single-flight upstream fetches.

mod cache;
mod content;
mod domain;

pub use cache::{CacheStats, DropdownCache, MAX_DEGRADED_ENTRIES};
pub use content::{ContentOption, DropdownConfig, DropdownContent, StaticDropdownSource};
pub use domain::{
    CacheEntry, CacheKey, DropdownDataset, DropdownDescriptor, DropdownOption, DropdownResponse,
    OptionsEntry,
};

use async_trait::async_trait;
use std::sync::Arc;

/// Failure reported by a dropdown content backend.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("dropdown content at {target} is unavailable: {reason}")]
    Unavailable { target: String, reason: String },
    #[error("dropdown content is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Cache-level failure. Cloned to every coalesced waiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("dropdown fetch for {screen_location}/{language_code} failed: {message}")]
    UpstreamFetch {
        screen_location: String,
        language_code: String,
        message: String,
    },
    #[error("timed out after {waited_ms} ms waiting for {screen_location}/{language_code}")]
    Timeout {
        screen_location: String,
        language_code: String,
        waited_ms: u64,
    },
}

impl CacheError {
    pub(crate) fn upstream(key: &CacheKey, message: impl Into<String>) -> Self {
        Self::UpstreamFetch {
            screen_location: key.screen_location.clone(),
            language_code: key.language_code.clone(),
            message: message.into(),
        }
    }
}

/// Bulk loader for one screen's dropdowns in one language.
#[async_trait]
pub trait DropdownSource: Send + Sync + 'static {
    fn describe(&self) -> String;

    async fn fetch_bulk(
        &self,
        screen_location: &str,
        language_code: &str,
    ) -> Result<DropdownDataset, SourceError>;
}

#[async_trait]
impl<S> DropdownSource for Arc<S>
where
    S: DropdownSource + ?Sized,
{
    fn describe(&self) -> String {
        (**self).describe()
    }

    async fn fetch_bulk(
        &self,
        screen_location: &str,
        language_code: &str,
    ) -> Result<DropdownDataset, SourceError> {
        (**self).fetch_bulk(screen_location, language_code).await
    }
}
