use super::domain::{
    BusinessPath, EligibilityRule, LendingStandards, PropertyOwnershipState, RuleDocument,
};
use serde::{Deserialize, Deserializer};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Error raised when a rule source cannot produce a usable table.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("rule source {path} unreachable: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed rule table: {0}")]
    Malformed(#[from] csv::Error),
    #[error("invalid rule table: {0}")]
    Invalid(String),
}

/// Anything able to produce the raw rule and standards rows.
pub trait RuleSource: Send + Sync {
    fn describe(&self) -> String;
    fn fetch(&self) -> Result<RuleDocument, LoadError>;
}

/// Policy table shipped with the service.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardRuleSource;

impl RuleSource for StandardRuleSource {
    fn describe(&self) -> String {
        "built-in policy".to_string()
    }

    fn fetch(&self) -> Result<RuleDocument, LoadError> {
        Ok(RuleDocument {
            rules: standard_rules(),
            standards: standard_lending_standards(),
        })
    }
}

fn mortgage_rule(
    business_path: BusinessPath,
    state: PropertyOwnershipState,
    max_ltv_percent: f64,
    min_down_payment_percent: f64,
) -> EligibilityRule {
    EligibilityRule {
        business_path,
        ownership_state: Some(state),
        max_ltv_percent,
        min_down_payment_percent,
        max_dti_percent: 42.0,
        min_monthly_income: 5_000.0,
    }
}

pub fn standard_rules() -> Vec<EligibilityRule> {
    vec![
        mortgage_rule(BusinessPath::Mortgage, PropertyOwnershipState::NoProperty, 75.0, 25.0),
        mortgage_rule(BusinessPath::Mortgage, PropertyOwnershipState::HasProperty, 50.0, 50.0),
        mortgage_rule(BusinessPath::Mortgage, PropertyOwnershipState::SellingProperty, 70.0, 30.0),
        mortgage_rule(BusinessPath::MortgageRefinance, PropertyOwnershipState::NoProperty, 80.0, 20.0),
        mortgage_rule(BusinessPath::MortgageRefinance, PropertyOwnershipState::HasProperty, 50.0, 50.0),
        mortgage_rule(
            BusinessPath::MortgageRefinance,
            PropertyOwnershipState::SellingProperty,
            70.0,
            30.0,
        ),
        EligibilityRule {
            business_path: BusinessPath::Credit,
            ownership_state: None,
            max_ltv_percent: 100.0,
            min_down_payment_percent: 0.0,
            max_dti_percent: 42.0,
            min_monthly_income: 3_000.0,
        },
        EligibilityRule {
            business_path: BusinessPath::CreditRefinance,
            ownership_state: None,
            max_ltv_percent: 100.0,
            min_down_payment_percent: 0.0,
            max_dti_percent: 50.0,
            min_monthly_income: 3_000.0,
        },
    ]
}

pub fn standard_lending_standards() -> Vec<LendingStandards> {
    BusinessPath::ordered()
        .into_iter()
        .map(|business_path| {
            let (interest_rate_percent, term_months, stress_rate_percent) = match business_path {
                BusinessPath::Mortgage | BusinessPath::MortgageRefinance => (5.0, 360, 6.5),
                BusinessPath::Credit | BusinessPath::CreditRefinance => (8.5, 84, 10.5),
            };
            LendingStandards {
                business_path,
                interest_rate_percent,
                term_months,
                stress_rate_percent,
                minimum_savings_percent: 2.0,
                cash_out_max_ltv_percent: 80.0,
                max_break_even_months: 36,
            }
        })
        .collect()
}

/// Rule table exported as CSV, with an optional standards CSV alongside.
///
/// Rules columns: `business_path,ownership_state,max_ltv_percent,
/// min_down_payment_percent,max_dti_percent,min_monthly_income` (empty
/// `ownership_state` means the rule covers the whole path). When no standards
/// file is configured the built-in standards apply.
#[derive(Debug, Clone)]
pub struct CsvRuleSource {
    rules_path: PathBuf,
    standards_path: Option<PathBuf>,
}

impl CsvRuleSource {
    pub fn new(rules_path: impl Into<PathBuf>, standards_path: Option<PathBuf>) -> Self {
        Self {
            rules_path: rules_path.into(),
            standards_path,
        }
    }
}

impl RuleSource for CsvRuleSource {
    fn describe(&self) -> String {
        match &self.standards_path {
            Some(standards) => format!(
                "{} + {}",
                self.rules_path.display(),
                standards.display()
            ),
            None => self.rules_path.display().to_string(),
        }
    }

    fn fetch(&self) -> Result<RuleDocument, LoadError> {
        let rules = parse_rules(open(&self.rules_path)?)?;
        let standards = match &self.standards_path {
            Some(path) => parse_standards(open(path)?)?,
            None => standard_lending_standards(),
        };
        Ok(RuleDocument { rules, standards })
    }
}

fn open(path: &Path) -> Result<std::fs::File, LoadError> {
    std::fs::File::open(path).map_err(|source| LoadError::Unavailable {
        path: path.to_path_buf(),
        source,
    })
}

pub fn parse_rules<R: Read>(reader: R) -> Result<Vec<EligibilityRule>, LoadError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut rules = Vec::new();

    for row in csv_reader.deserialize::<RuleRow>() {
        let row = row?;
        rules.push(EligibilityRule {
            business_path: row.business_path,
            ownership_state: row.ownership_state,
            max_ltv_percent: row.max_ltv_percent,
            min_down_payment_percent: row.min_down_payment_percent,
            max_dti_percent: row.max_dti_percent,
            min_monthly_income: row.min_monthly_income,
        });
    }

    Ok(rules)
}

pub fn parse_standards<R: Read>(reader: R) -> Result<Vec<LendingStandards>, LoadError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut standards = Vec::new();

    for row in csv_reader.deserialize::<LendingStandards>() {
        standards.push(row?);
    }

    Ok(standards)
}

#[derive(Debug, Deserialize)]
struct RuleRow {
    business_path: BusinessPath,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    ownership_state: Option<PropertyOwnershipState>,
    max_ltv_percent: f64,
    min_down_payment_percent: f64,
    max_dti_percent: f64,
    min_monthly_income: f64,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<PropertyOwnershipState>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(serde::de::Error::custom),
    }
}
