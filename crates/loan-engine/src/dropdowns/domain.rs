use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;

/// (screen, language) pair identifying one bulk dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub screen_location: String,
    pub language_code: String,
}

impl CacheKey {
    pub fn new(screen_location: impl Into<String>, language_code: impl Into<String>) -> Self {
        Self {
            screen_location: screen_location.into(),
            language_code: language_code.into(),
        }
    }

    /// `None` on either side matches every value of that dimension.
    pub fn matches(&self, screen_location: Option<&str>, language_code: Option<&str>) -> bool {
        screen_location.map_or(true, |screen| screen == self.screen_location)
            && language_code.map_or(true, |language| language == self.language_code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropdownOption {
    pub value: String,
    pub label: String,
}

/// Every dropdown of one screen in one language, produced by a single
/// upstream fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropdownDataset {
    pub screen_location: String,
    pub language_code: String,
    pub dropdown_keys: Vec<String>,
    pub options: BTreeMap<String, Vec<DropdownOption>>,
    pub placeholders: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
}

impl DropdownDataset {
    pub fn empty(screen_location: impl Into<String>, language_code: impl Into<String>) -> Self {
        Self {
            screen_location: screen_location.into(),
            language_code: language_code.into(),
            dropdown_keys: Vec::new(),
            options: BTreeMap::new(),
            placeholders: BTreeMap::new(),
            labels: BTreeMap::new(),
        }
    }

    /// A screen with no dropdowns; callers render an empty state.
    pub fn is_degraded(&self) -> bool {
        self.dropdown_keys.is_empty()
    }

    pub fn key(&self) -> CacheKey {
        CacheKey::new(&self.screen_location, &self.language_code)
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub created_at: Instant,
    pub ttl: Duration,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            created_at: Instant::now(),
            ttl,
        }
    }

    pub fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) < self.ttl
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DropdownDescriptor {
    pub key: String,
    pub label: String,
}

/// Values of the `options` object: the option list under the dropdown key,
/// plus one `{key}_option_{value}` text entry per option for older screens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OptionsEntry {
    List(Vec<DropdownOption>),
    Text(String),
}

/// Wire body of `GET /api/dropdowns/{screen}/{language}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DropdownResponse {
    pub status: &'static str,
    pub screen_location: String,
    pub language_code: String,
    pub dropdowns: Vec<DropdownDescriptor>,
    pub options: BTreeMap<String, OptionsEntry>,
    pub placeholders: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DropdownResponse {
    pub fn from_dataset(dataset: &DropdownDataset) -> Self {
        let dropdowns = dataset
            .dropdown_keys
            .iter()
            .map(|key| DropdownDescriptor {
                key: key.clone(),
                label: dataset.labels.get(key).cloned().unwrap_or_default(),
            })
            .collect();

        let mut options = BTreeMap::new();
        for (key, list) in &dataset.options {
            for option in list {
                options.insert(
                    format!("{key}_option_{}", option.value),
                    OptionsEntry::Text(option.label.clone()),
                );
            }
            options.insert(key.clone(), OptionsEntry::List(list.clone()));
        }

        Self {
            status: "success",
            screen_location: dataset.screen_location.clone(),
            language_code: dataset.language_code.clone(),
            dropdowns,
            options,
            placeholders: dataset.placeholders.clone(),
            labels: dataset.labels.clone(),
            degraded: dataset.is_degraded(),
            error: None,
        }
    }

    /// Empty structure returned alongside an error status so pages keep
    /// rendering.
    pub fn unavailable(
        screen_location: impl Into<String>,
        language_code: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            status: "error",
            screen_location: screen_location.into(),
            language_code: language_code.into(),
            dropdowns: Vec::new(),
            options: BTreeMap::new(),
            placeholders: BTreeMap::new(),
            labels: BTreeMap::new(),
            degraded: true,
            error: Some(error.into()),
        }
    }
}
