use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Product category selecting the rule table and dropdown screen-set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusinessPath {
    Mortgage,
    Credit,
    MortgageRefinance,
    CreditRefinance,
}

impl BusinessPath {
    pub const fn ordered() -> [Self; 4] {
        [
            Self::Mortgage,
            Self::Credit,
            Self::MortgageRefinance,
            Self::CreditRefinance,
        ]
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mortgage => "mortgage",
            Self::Credit => "credit",
            Self::MortgageRefinance => "mortgage_refinance",
            Self::CreditRefinance => "credit_refinance",
        }
    }

    /// Paths secured by real estate, where ownership state drives LTV.
    pub const fn is_property_backed(self) -> bool {
        matches!(self, Self::Mortgage | Self::MortgageRefinance)
    }

    pub const fn is_refinance(self) -> bool {
        matches!(self, Self::MortgageRefinance | Self::CreditRefinance)
    }
}

impl fmt::Display for BusinessPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BusinessPath {
    type Err = UnknownVariant;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");
        Self::ordered()
            .into_iter()
            .find(|path| path.as_str() == normalized)
            .ok_or_else(|| UnknownVariant {
                kind: "business_path",
                value: raw.to_string(),
            })
    }
}

/// Borrower's current relationship to real estate; drives LTV and
/// down-payment minimums on mortgage paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyOwnershipState {
    NoProperty,
    HasProperty,
    SellingProperty,
}

impl PropertyOwnershipState {
    pub const fn ordered() -> [Self; 3] {
        [Self::NoProperty, Self::HasProperty, Self::SellingProperty]
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoProperty => "no_property",
            Self::HasProperty => "has_property",
            Self::SellingProperty => "selling_property",
        }
    }
}

impl fmt::Display for PropertyOwnershipState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PropertyOwnershipState {
    type Err = UnknownVariant;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");
        Self::ordered()
            .into_iter()
            .find(|state| state.as_str() == normalized)
            .ok_or_else(|| UnknownVariant {
                kind: "ownership_state",
                value: raw.to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

pub type RuleKey = (BusinessPath, Option<PropertyOwnershipState>);

/// LTV/DTI limits for one (business path, ownership state) combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityRule {
    pub business_path: BusinessPath,
    #[serde(default)]
    pub ownership_state: Option<PropertyOwnershipState>,
    pub max_ltv_percent: f64,
    pub min_down_payment_percent: f64,
    pub max_dti_percent: f64,
    pub min_monthly_income: f64,
}

impl EligibilityRule {
    pub fn key(&self) -> RuleKey {
        (self.business_path, self.ownership_state)
    }
}

/// Per-path pricing and refinance policy values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LendingStandards {
    pub business_path: BusinessPath,
    pub interest_rate_percent: f64,
    pub term_months: u32,
    pub stress_rate_percent: f64,
    pub minimum_savings_percent: f64,
    pub cash_out_max_ltv_percent: f64,
    pub max_break_even_months: u32,
}

/// Raw rows produced by a [`super::RuleSource`] before validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleDocument {
    pub rules: Vec<EligibilityRule>,
    pub standards: Vec<LendingStandards>,
}
