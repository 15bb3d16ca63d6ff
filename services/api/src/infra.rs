use loan_engine::config::EngineConfig;
use loan_engine::dropdowns::{SourceError, StaticDropdownSource};
use loan_engine::rules::{
    CsvRuleSource, PropertyOwnershipState, RuleSource, RuleTableStore, StandardRuleSource,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) store: Arc<RuleTableStore>,
    pub(crate) rules: Arc<dyn RuleSource>,
}

/// CSV tables when a path is configured, otherwise the built-in policy.
pub(crate) fn rule_source(config: &EngineConfig) -> Arc<dyn RuleSource> {
    match &config.rule_table_path {
        Some(path) => Arc::new(CsvRuleSource::new(
            path.clone(),
            config.standards_path.clone(),
        )),
        None => Arc::new(StandardRuleSource),
    }
}

pub(crate) fn dropdown_source(config: &EngineConfig) -> Result<StaticDropdownSource, SourceError> {
    match &config.dropdown_content_path {
        Some(path) => StaticDropdownSource::from_path(path),
        None => StaticDropdownSource::standard(),
    }
}

pub(crate) fn parse_ownership(raw: &str) -> Result<PropertyOwnershipState, String> {
    raw.parse::<PropertyOwnershipState>()
        .map_err(|err| err.to_string())
}
