//! Current-versus-candidate loan comparison for refinance flows.

use crate::finance::{checked_payment, round_currency, round_percent, MAX_TERM_MONTHS};
use crate::rules::{is_amount, is_percentage, BusinessPath, LendingStandards, RuleLookupError, RuleTableStore};
use crate::validation::{FieldChecks, ValidationError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

fn default_refinance_path() -> BusinessPath {
    BusinessPath::MortgageRefinance
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinanceScenario {
    #[serde(default = "default_refinance_path")]
    pub business_path: BusinessPath,
    pub current_balance: f64,
    pub current_rate: f64,
    pub current_remaining_term_months: u32,
    /// Amortized from balance, rate and remaining term when absent.
    #[serde(default)]
    pub current_monthly_payment: Option<f64>,
    pub new_rate: f64,
    pub new_term_months: u32,
    pub closing_costs: f64,
    #[serde(default)]
    pub cash_out_amount: Option<f64>,
    #[serde(default)]
    pub property_value: Option<f64>,
}

/// Wire shape of `POST /api/v1/refinance/compare`. Terms are signed so a
/// negative term reaches the scenario check instead of failing to parse.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RefinancePayload {
    pub business_path: Option<BusinessPath>,
    pub current_balance: Option<f64>,
    pub current_rate: Option<f64>,
    pub current_remaining_term_months: Option<i64>,
    pub current_monthly_payment: Option<f64>,
    pub new_rate: Option<f64>,
    pub new_term_months: Option<i64>,
    pub closing_costs: Option<f64>,
    pub cash_out_amount: Option<f64>,
    pub property_value: Option<f64>,
}

impl RefinancePayload {
    pub fn into_scenario(self) -> Result<RefinanceScenario, RefinanceError> {
        let mut checks = FieldChecks::new();
        let current_balance = checks.required("current_balance", self.current_balance);
        let current_rate = checks.required("current_rate", self.current_rate);
        let remaining = checks.required(
            "current_remaining_term_months",
            self.current_remaining_term_months,
        );
        let new_rate = checks.required("new_rate", self.new_rate);
        let new_term = checks.required("new_term_months", self.new_term_months);
        let closing_costs = checks.required("closing_costs", self.closing_costs);
        if self.cash_out_amount.is_some_and(|amount| amount > 0.0) && self.property_value.is_none() {
            checks.push("property_value", "is required when cash_out_amount is set");
        }
        checks.finish()?;

        let (
            Some(current_balance),
            Some(current_rate),
            Some(remaining),
            Some(new_rate),
            Some(new_term),
            Some(closing_costs),
        ) = (current_balance, current_rate, remaining, new_rate, new_term, closing_costs)
        else {
            return Err(ValidationError::single("scenario", "is incomplete").into());
        };

        let scenario = RefinanceScenario {
            business_path: self.business_path.unwrap_or_else(default_refinance_path),
            current_balance,
            current_rate,
            current_remaining_term_months: term_months("current_remaining_term_months", remaining)?,
            current_monthly_payment: self.current_monthly_payment,
            new_rate,
            new_term_months: term_months("new_term_months", new_term)?,
            closing_costs,
            cash_out_amount: self.cash_out_amount,
            property_value: self.property_value,
        };
        scenario.validate()?;
        Ok(scenario)
    }
}

fn term_months(field: &str, raw: i64) -> Result<u32, RefinanceError> {
    u32::try_from(raw)
        .ok()
        .filter(|months| *months <= MAX_TERM_MONTHS)
        .ok_or_else(|| {
            RefinanceError::InvalidScenario(format!(
                "{field} must be between 0 and {MAX_TERM_MONTHS}"
            ))
        })
}

impl RefinanceScenario {
    pub fn new_loan_amount(&self) -> f64 {
        self.current_balance + self.cash_out_amount.unwrap_or(0.0)
    }

    pub fn validate(&self) -> Result<(), RefinanceError> {
        let mut problems = Vec::new();

        for (name, value) in [
            ("current_balance", Some(self.current_balance)),
            ("closing_costs", Some(self.closing_costs)),
            ("current_monthly_payment", self.current_monthly_payment),
            ("cash_out_amount", self.cash_out_amount),
            ("property_value", self.property_value),
        ] {
            if value.is_some_and(|value| !is_amount(value)) {
                problems.push(format!("{name} must be a non-negative number"));
            }
        }
        for (name, value) in [
            ("current_rate", self.current_rate),
            ("new_rate", self.new_rate),
        ] {
            if !is_percentage(value) {
                problems.push(format!("{name} must be a percentage within [0, 100]"));
            }
        }
        if self.new_term_months == 0 {
            problems.push("new_term_months must be positive".to_string());
        }
        for (name, months) in [
            ("new_term_months", self.new_term_months),
            ("current_remaining_term_months", self.current_remaining_term_months),
        ] {
            if months > MAX_TERM_MONTHS {
                problems.push(format!("{name} must not exceed {MAX_TERM_MONTHS} months"));
            }
        }
        if self.current_monthly_payment.is_none() && self.current_remaining_term_months == 0 {
            problems.push(
                "current_remaining_term_months must be positive when no current payment is given"
                    .to_string(),
            );
        }
        if !self.business_path.is_refinance() {
            problems.push(format!("{} is not a refinance path", self.business_path));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(RefinanceError::InvalidScenario(problems.join("; ")))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinanceResult {
    pub business_path: BusinessPath,
    pub current_payment: f64,
    pub new_payment: f64,
    pub new_loan_amount: f64,
    pub monthly_savings: f64,
    pub savings_percent: f64,
    /// Remaining cost of the current loan minus lifetime cost of the new one
    /// and closing costs. `None` when the remaining term is unknown.
    pub total_savings: Option<f64>,
    /// `None` whenever the new payment is not lower.
    pub break_even_months: Option<f64>,
    pub break_even_within_policy: bool,
    pub max_break_even_months: u32,
    /// Advisory; never blocks the flow.
    pub meets_minimum_savings: bool,
    pub minimum_savings_percent: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum RefinanceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("invalid refinance scenario: {0}")]
    InvalidScenario(String),
    #[error(transparent)]
    Rule(#[from] RuleLookupError),
}

#[derive(Debug, Clone)]
pub struct RefinanceComparator {
    store: Arc<RuleTableStore>,
}

impl RefinanceComparator {
    pub fn new(store: Arc<RuleTableStore>) -> Self {
        Self { store }
    }

    pub fn compare(&self, scenario: &RefinanceScenario) -> Result<RefinanceResult, RefinanceError> {
        scenario.validate()?;
        let snapshot = self.store.snapshot();
        let standards = snapshot.standards(scenario.business_path)?;
        let result = compare_with(scenario, standards)?;
        debug!(
            business_path = %scenario.business_path,
            monthly_savings = result.monthly_savings,
            break_even_months = ?result.break_even_months,
            "refinance compared"
        );
        Ok(result)
    }
}

/// Comparison against explicit policy values. Expects a validated scenario;
/// amounts too large to amortize are still refused.
pub fn compare_with(
    scenario: &RefinanceScenario,
    standards: &LendingStandards,
) -> Result<RefinanceResult, RefinanceError> {
    let current_payment = match scenario.current_monthly_payment {
        Some(payment) => Some(payment),
        None => checked_payment(
            scenario.current_balance,
            scenario.current_rate,
            scenario.current_remaining_term_months,
        ),
    };
    let new_loan_amount = scenario.new_loan_amount();
    let new_payment = checked_payment(new_loan_amount, scenario.new_rate, scenario.new_term_months);
    let (Some(current_payment), Some(new_payment)) = (current_payment, new_payment) else {
        return Err(RefinanceError::InvalidScenario(
            "loan amounts yield a payment that cannot be computed".to_string(),
        ));
    };
    let monthly_savings = current_payment - new_payment;
    if !monthly_savings.is_finite() {
        return Err(RefinanceError::InvalidScenario(
            "payments are too large to compare".to_string(),
        ));
    }

    let break_even_months = (monthly_savings > 0.0)
        .then(|| round_percent(scenario.closing_costs / monthly_savings));
    let break_even_within_policy = break_even_months
        .is_some_and(|months| months <= f64::from(standards.max_break_even_months));

    let savings_percent = if current_payment > 0.0 {
        monthly_savings / current_payment * 100.0
    } else {
        0.0
    };

    let total_savings = (scenario.current_remaining_term_months > 0).then(|| {
        let remaining_cost = current_payment * f64::from(scenario.current_remaining_term_months);
        let new_cost = new_payment * f64::from(scenario.new_term_months);
        round_currency(remaining_cost - new_cost - scenario.closing_costs)
    });

    Ok(RefinanceResult {
        business_path: scenario.business_path,
        current_payment: round_currency(current_payment),
        new_payment: round_currency(new_payment),
        new_loan_amount: round_currency(new_loan_amount),
        monthly_savings: round_currency(monthly_savings),
        savings_percent: round_percent(savings_percent),
        total_savings,
        break_even_months,
        break_even_within_policy,
        max_break_even_months: standards.max_break_even_months,
        meets_minimum_savings: current_payment > 0.0
            && savings_percent >= standards.minimum_savings_percent,
        minimum_savings_percent: standards.minimum_savings_percent,
    })
}
