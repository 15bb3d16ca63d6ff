use super::domain::{DropdownDataset, DropdownOption};
use super::{DropdownSource, SourceError};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

const FALLBACK_LANGUAGE: &str = "en";

const BUILT_IN_CONTENT: &str = include_str!("../../content/dropdowns.json");

/// Copies the frontend still reads under older key names.
/// `(screen, source suffix, alias suffix, both directions)`
const KEY_ALIASES: &[(&str, &str, &str, bool)] = &[
    ("mortgage_step1", "when", "when_needed", true),
    ("mortgage_step1", "first", "first_home", true),
    ("mortgage_step2", "citizenship", "citizenship_countries", false),
];

/// One dropdown as stored, with text per language code.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DropdownConfig {
    pub screen_location: String,
    pub dropdown_key: String,
    pub field_name: String,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
    #[serde(default)]
    pub label: BTreeMap<String, String>,
    #[serde(default)]
    pub placeholder: BTreeMap<String, String>,
    #[serde(default)]
    pub options: Vec<ContentOption>,
}

fn active_by_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ContentOption {
    pub value: String,
    #[serde(default)]
    pub text: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DropdownContent {
    pub dropdowns: Vec<DropdownConfig>,
}

/// Serves datasets from an in-memory content store, one pass per screen.
#[derive(Debug, Clone, Default)]
pub struct StaticDropdownSource {
    content: DropdownContent,
}

impl StaticDropdownSource {
    pub fn new(content: DropdownContent) -> Self {
        Self { content }
    }

    pub fn from_json(raw: &str) -> Result<Self, SourceError> {
        let content: DropdownContent = serde_json::from_str(raw)?;
        Ok(Self::new(content))
    }

    pub fn from_path(path: &Path) -> Result<Self, SourceError> {
        let raw = std::fs::read_to_string(path).map_err(|source| SourceError::Unavailable {
            target: path.display().to_string(),
            reason: source.to_string(),
        })?;
        Self::from_json(&raw)
    }

    /// Content shipped with the crate.
    pub fn standard() -> Result<Self, SourceError> {
        Self::from_json(BUILT_IN_CONTENT)
    }

    pub fn screens(&self) -> Vec<&str> {
        let mut screens: Vec<&str> = self
            .content
            .dropdowns
            .iter()
            .map(|config| config.screen_location.as_str())
            .collect();
        screens.sort_unstable();
        screens.dedup();
        screens
    }

    pub fn assemble(&self, screen_location: &str, language_code: &str) -> DropdownDataset {
        let mut configs: Vec<&DropdownConfig> = self
            .content
            .dropdowns
            .iter()
            .filter(|config| config.is_active && config.screen_location == screen_location)
            .collect();
        configs.sort_by(|a, b| a.dropdown_key.cmp(&b.dropdown_key));

        let mut dataset = DropdownDataset::empty(screen_location, language_code);
        for config in configs {
            let key = config.dropdown_key.clone();
            let label = match localized(&config.label, language_code) {
                label if label.is_empty() => config.field_name.replace('_', " "),
                label => label,
            };
            let options: Vec<DropdownOption> = config
                .options
                .iter()
                .map(|option| DropdownOption {
                    value: option.value.clone(),
                    label: localized(&option.text, language_code),
                })
                .collect();

            dataset.labels.insert(key.clone(), label);
            dataset
                .placeholders
                .insert(key.clone(), localized(&config.placeholder, language_code));
            if !options.is_empty() {
                dataset.options.insert(key.clone(), options);
            }
            dataset.dropdown_keys.push(key);
        }

        apply_aliases(&mut dataset);
        dataset
    }
}

#[async_trait]
impl DropdownSource for StaticDropdownSource {
    fn describe(&self) -> String {
        format!("static content ({} dropdowns)", self.content.dropdowns.len())
    }

    async fn fetch_bulk(
        &self,
        screen_location: &str,
        language_code: &str,
    ) -> Result<DropdownDataset, SourceError> {
        Ok(self.assemble(screen_location, language_code))
    }
}

/// Requested language, then English, then empty.
fn localized(texts: &BTreeMap<String, String>, language_code: &str) -> String {
    texts
        .get(language_code)
        .filter(|text| !text.is_empty())
        .or_else(|| texts.get(FALLBACK_LANGUAGE))
        .cloned()
        .unwrap_or_default()
}

fn apply_aliases(dataset: &mut DropdownDataset) {
    for &(screen, source, alias, both_ways) in KEY_ALIASES {
        if dataset.screen_location != screen {
            continue;
        }
        let source_key = format!("{screen}_{source}");
        let alias_key = format!("{screen}_{alias}");
        copy_dropdown(dataset, &source_key, &alias_key, alias);
        if both_ways {
            copy_dropdown(dataset, &alias_key, &source_key, source);
        }
    }
}

fn copy_dropdown(dataset: &mut DropdownDataset, from: &str, to: &str, fallback_label: &str) {
    let Some(options) = dataset.options.get(from).cloned() else {
        return;
    };
    if dataset.options.contains_key(to) {
        return;
    }

    dataset.options.insert(to.to_string(), options);
    let label = dataset
        .labels
        .get(from)
        .filter(|label| !label.is_empty())
        .cloned()
        .unwrap_or_else(|| fallback_label.replace('_', " "));
    dataset.labels.insert(to.to_string(), label);
    if let Some(placeholder) = dataset.placeholders.get(from).cloned() {
        dataset.placeholders.insert(to.to_string(), placeholder);
    }
    dataset.dropdown_keys.push(to.to_string());
}
