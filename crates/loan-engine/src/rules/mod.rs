//! Versioned LTV/DTI rule tables and per-path lending standards.
//!
//! The store hands out `Arc` snapshots; a reload builds a complete new
//! snapshot off to the side and swaps the pointer, so readers only ever see
//! a whole table.

pub mod domain;
pub mod source;

pub use domain::{
    BusinessPath, EligibilityRule, LendingStandards, PropertyOwnershipState, RuleDocument,
    RuleKey, UnknownVariant,
};
pub use source::{
    parse_rules, parse_standards, standard_lending_standards, standard_rules, CsvRuleSource,
    LoadError, RuleSource, StandardRuleSource,
};

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;

/// Lookup failure against the active snapshot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleLookupError {
    #[error("no eligibility rule for {business_path} ({})", ownership_label(.ownership_state))]
    RuleNotFound {
        business_path: BusinessPath,
        ownership_state: Option<PropertyOwnershipState>,
    },
    #[error("no lending standards for {0}")]
    StandardsNotFound(BusinessPath),
}

fn ownership_label(state: &Option<PropertyOwnershipState>) -> &'static str {
    state.map(PropertyOwnershipState::as_str).unwrap_or("any ownership")
}

/// Immutable, validated rule table.
#[derive(Debug, Clone)]
pub struct RuleTableSnapshot {
    version: u64,
    loaded_at: DateTime<Utc>,
    source: String,
    rules: BTreeMap<RuleKey, EligibilityRule>,
    standards: BTreeMap<BusinessPath, LendingStandards>,
}

impl RuleTableSnapshot {
    /// Validate raw rows into a snapshot.
    pub fn build(document: RuleDocument, source: impl Into<String>) -> Result<Self, LoadError> {
        let mut rules = BTreeMap::new();
        for rule in document.rules {
            validate_rule(&rule)?;
            let key = rule.key();
            if rules.insert(key, rule).is_some() {
                return Err(LoadError::Invalid(format!(
                    "duplicate rule for {} ({})",
                    key.0,
                    ownership_label(&key.1)
                )));
            }
        }

        let mut standards = BTreeMap::new();
        for entry in document.standards {
            validate_standards(&entry)?;
            let path = entry.business_path;
            if standards.insert(path, entry).is_some() {
                return Err(LoadError::Invalid(format!(
                    "duplicate lending standards for {path}"
                )));
            }
        }

        if rules.is_empty() {
            return Err(LoadError::Invalid("rule table is empty".to_string()));
        }
        for (path, _) in rules.keys() {
            if !standards.contains_key(path) {
                return Err(LoadError::Invalid(format!(
                    "rules reference {path} but no lending standards were provided"
                )));
            }
        }

        let snapshot = Self {
            version: 1,
            loaded_at: Utc::now(),
            source: source.into(),
            rules,
            standards,
        };
        snapshot.check_owner_down_payment()?;
        Ok(snapshot)
    }

    /// Owners of a property put down at least half on every property-backed
    /// path, including when their lookup falls back to a path-wide rule.
    fn check_owner_down_payment(&self) -> Result<(), LoadError> {
        let paths: BTreeSet<BusinessPath> = self
            .rules
            .keys()
            .map(|(path, _)| *path)
            .filter(|path| path.is_property_backed())
            .collect();
        for path in paths {
            let Ok(rule) = self.rule(path, Some(PropertyOwnershipState::HasProperty)) else {
                continue;
            };
            if rule.min_down_payment_percent < 50.0 {
                return Err(LoadError::Invalid(format!(
                    "{path}: borrowers who already own property would put down {}%, below 50%",
                    rule.min_down_payment_percent
                )));
            }
        }
        Ok(())
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn rules(&self) -> impl Iterator<Item = &EligibilityRule> {
        self.rules.values()
    }

    pub fn rules_for(&self, business_path: BusinessPath) -> Vec<&EligibilityRule> {
        self.rules
            .values()
            .filter(|rule| rule.business_path == business_path)
            .collect()
    }

    /// Exact (path, state) match first, then the path-wide rule.
    pub fn rule(
        &self,
        business_path: BusinessPath,
        ownership_state: Option<PropertyOwnershipState>,
    ) -> Result<&EligibilityRule, RuleLookupError> {
        self.rules
            .get(&(business_path, ownership_state))
            .or_else(|| self.rules.get(&(business_path, None)))
            .ok_or(RuleLookupError::RuleNotFound {
                business_path,
                ownership_state,
            })
    }

    pub fn standards(
        &self,
        business_path: BusinessPath,
    ) -> Result<&LendingStandards, RuleLookupError> {
        self.standards
            .get(&business_path)
            .ok_or(RuleLookupError::StandardsNotFound(business_path))
    }
}

fn validate_rule(rule: &EligibilityRule) -> Result<(), LoadError> {
    let label = format!("{} ({})", rule.business_path, ownership_label(&rule.ownership_state));

    for (name, value) in [
        ("max_ltv_percent", rule.max_ltv_percent),
        ("min_down_payment_percent", rule.min_down_payment_percent),
        ("max_dti_percent", rule.max_dti_percent),
    ] {
        if !is_percentage(value) {
            return Err(LoadError::Invalid(format!(
                "{label}: {name} must be within [0, 100], got {value}"
            )));
        }
    }

    if !is_amount(rule.min_monthly_income) {
        return Err(LoadError::Invalid(format!(
            "{label}: min_monthly_income must be a non-negative number"
        )));
    }

    if rule.ownership_state.is_some() && !rule.business_path.is_property_backed() {
        return Err(LoadError::Invalid(format!(
            "{label}: ownership state only applies to mortgage paths"
        )));
    }

    if rule.ownership_state == Some(PropertyOwnershipState::HasProperty)
        && rule.min_down_payment_percent < 50.0
    {
        return Err(LoadError::Invalid(format!(
            "{label}: borrowers who already own property must put down at least 50%"
        )));
    }

    Ok(())
}

fn validate_standards(standards: &LendingStandards) -> Result<(), LoadError> {
    let path = standards.business_path;
    for (name, value) in [
        ("interest_rate_percent", standards.interest_rate_percent),
        ("stress_rate_percent", standards.stress_rate_percent),
        ("minimum_savings_percent", standards.minimum_savings_percent),
        ("cash_out_max_ltv_percent", standards.cash_out_max_ltv_percent),
    ] {
        if !is_percentage(value) {
            return Err(LoadError::Invalid(format!(
                "{path}: {name} must be within [0, 100], got {value}"
            )));
        }
    }
    if standards.term_months == 0 {
        return Err(LoadError::Invalid(format!(
            "{path}: term_months must be positive"
        )));
    }
    Ok(())
}

pub(crate) fn is_percentage(value: f64) -> bool {
    value.is_finite() && (0.0..=100.0).contains(&value)
}

pub(crate) fn is_amount(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

/// Shared holder of the active snapshot.
#[derive(Debug)]
pub struct RuleTableStore {
    active: RwLock<Arc<RuleTableSnapshot>>,
}

impl RuleTableStore {
    pub fn new(snapshot: RuleTableSnapshot) -> Self {
        Self {
            active: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Fetch and validate a table without installing it.
    pub fn load(source: &dyn RuleSource) -> Result<RuleTableSnapshot, LoadError> {
        let document = source.fetch()?;
        RuleTableSnapshot::build(document, source.describe())
    }

    pub fn from_source(source: &dyn RuleSource) -> Result<Self, LoadError> {
        let snapshot = Self::load(source)?;
        info!(
            source = %snapshot.source(),
            rules = snapshot.rules.len(),
            "rule table loaded"
        );
        Ok(Self::new(snapshot))
    }

    /// Store seeded with the built-in policy table.
    pub fn standard() -> Result<Self, LoadError> {
        Self::from_source(&StandardRuleSource)
    }

    pub fn snapshot(&self) -> Arc<RuleTableSnapshot> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get(
        &self,
        business_path: BusinessPath,
        ownership_state: Option<PropertyOwnershipState>,
    ) -> Result<EligibilityRule, RuleLookupError> {
        self.snapshot()
            .rule(business_path, ownership_state)
            .cloned()
    }

    /// Replace the active table. On failure the previous table stays active.
    pub fn reload(&self, source: &dyn RuleSource) -> Result<u64, LoadError> {
        let mut snapshot = Self::load(source)?;
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        snapshot.version = active.version + 1;
        let version = snapshot.version;
        let rules = snapshot.rules.len();
        *active = Arc::new(snapshot);
        drop(active);

        info!(version, rules, source = %source.describe(), "rule table reloaded");
        Ok(version)
    }
}

#[cfg(test)]
mod tests;
