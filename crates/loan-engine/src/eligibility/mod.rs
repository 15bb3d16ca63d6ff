mod policy;

pub use policy::{ConstraintFailure, EligibilityConstraint};

use crate::finance::{checked_payment, round_currency, round_percent};
use crate::rules::{
    BusinessPath, PropertyOwnershipState, RuleLookupError, RuleTableSnapshot, RuleTableStore,
};
use crate::validation::{FieldChecks, ValidationError};
use policy::{failed_constraints, EligibilitySignals};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

/// Validated eligibility inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityRequest {
    pub business_path: BusinessPath,
    pub ownership_state: Option<PropertyOwnershipState>,
    pub property_value: f64,
    pub requested_amount: f64,
    pub monthly_income: f64,
    pub monthly_obligations: f64,
    /// Overrides the path's standard term for the payment estimate.
    #[serde(default)]
    pub term_months: Option<u32>,
}

/// Wire shape of `POST /api/v1/eligibility`; every numeric field is optional
/// here so absence can be reported instead of read as zero.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EligibilityPayload {
    pub business_path: Option<BusinessPath>,
    pub ownership_state: Option<PropertyOwnershipState>,
    pub property_value: Option<f64>,
    pub requested_amount: Option<f64>,
    pub monthly_income: Option<f64>,
    pub monthly_obligations: Option<f64>,
    #[serde(default)]
    pub term_months: Option<u32>,
}

impl EligibilityPayload {
    pub fn into_request(self) -> Result<EligibilityRequest, ValidationError> {
        let mut checks = FieldChecks::new();
        let business_path = checks.required("business_path", self.business_path);
        let property_value = checks.amount("property_value", self.property_value);
        let requested_amount = checks.amount("requested_amount", self.requested_amount);
        let monthly_income = checks.amount("monthly_income", self.monthly_income);
        let monthly_obligations = checks.amount("monthly_obligations", self.monthly_obligations);
        if let Some(term_months) = self.term_months {
            checks.term_months("term_months", term_months);
        }
        checks.finish()?;

        let Some(business_path) = business_path else {
            return Err(ValidationError::single("business_path", "is required"));
        };

        let request = EligibilityRequest {
            business_path,
            ownership_state: self.ownership_state,
            property_value,
            requested_amount,
            monthly_income,
            monthly_obligations,
            term_months: self.term_months,
        };
        request.validate()?;
        Ok(request)
    }
}

impl EligibilityRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut checks = FieldChecks::new();
        checks.non_negative("property_value", self.property_value);
        checks.non_negative("requested_amount", self.requested_amount);
        checks.non_negative("monthly_income", self.monthly_income);
        checks.non_negative("monthly_obligations", self.monthly_obligations);
        if self.business_path.is_property_backed() && self.ownership_state.is_none() {
            checks.push("ownership_state", "is required for mortgage paths");
        }
        if let Some(term_months) = self.term_months {
            checks.term_months("term_months", term_months);
        }
        checks.finish()
    }
}

/// Outcome of an eligibility check, with every failed constraint named.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityResult {
    pub business_path: BusinessPath,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ownership_state: Option<PropertyOwnershipState>,
    pub eligible: bool,
    pub max_loan: f64,
    pub min_down_payment: f64,
    pub max_ltv_percent: f64,
    /// `None` when the property value is zero.
    pub requested_ltv_percent: Option<f64>,
    pub dti: f64,
    pub max_dti_percent: f64,
    pub stress_test_dti: f64,
    pub estimated_monthly_payment: f64,
    pub failed_constraints: Vec<EligibilityConstraint>,
    pub rejection_reasons: Vec<String>,
    pub rule_version: u64,
}

/// Minimum own funds for a property purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownPaymentRequirement {
    pub min_down_payment_percent: f64,
    pub min_down_payment: f64,
    pub max_loan: f64,
}

/// Cash-out refinance LTV against the refinance ceiling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashOutCheck {
    pub new_loan_amount: f64,
    pub ltv_percent: f64,
    pub max_ltv_percent: f64,
    pub within_limit: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum EligibilityError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Rule(#[from] RuleLookupError),
    #[error("monthly income must be greater than zero to compute a debt-to-income ratio")]
    InsufficientIncome,
}

/// Pure functions over the active rule table.
#[derive(Debug, Clone)]
pub struct EligibilityResolver {
    store: Arc<RuleTableStore>,
}

impl EligibilityResolver {
    pub fn new(store: Arc<RuleTableStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<RuleTableStore> {
        &self.store
    }

    pub fn resolve(
        &self,
        request: &EligibilityRequest,
    ) -> Result<EligibilityResult, EligibilityError> {
        request.validate()?;

        let snapshot = self.store.snapshot();
        let rule = lookup(&snapshot, request.business_path, request.ownership_state)?;
        let standards = snapshot
            .standards(request.business_path)
            .map_err(log_lookup_failure)?;

        if request.monthly_income <= 0.0 {
            return Err(EligibilityError::InsufficientIncome);
        }

        let max_loan = request.property_value * rule.max_ltv_percent / 100.0;
        let min_down_payment = request.property_value * rule.min_down_payment_percent / 100.0;

        let term_months = request.term_months.unwrap_or(standards.term_months);
        let payment = checked_payment(
            request.requested_amount,
            standards.interest_rate_percent,
            term_months,
        );
        let stress_payment = checked_payment(
            request.requested_amount,
            standards.stress_rate_percent,
            term_months,
        );
        let (Some(payment), Some(stress_payment)) = (payment, stress_payment) else {
            return Err(ValidationError::single(
                "requested_amount",
                "yields a monthly payment that cannot be computed",
            )
            .into());
        };
        let dti = debt_to_income(request.monthly_obligations + payment, request.monthly_income)?;
        let stress_test_dti =
            debt_to_income(request.monthly_obligations + stress_payment, request.monthly_income)?;

        let signals = EligibilitySignals {
            requested_amount: request.requested_amount,
            max_loan: round_currency(max_loan),
            dti,
            monthly_income: request.monthly_income,
        };
        let failures = failed_constraints(&signals, rule);

        let requested_ltv_percent = (request.property_value > 0.0)
            .then(|| round_percent(request.requested_amount / request.property_value * 100.0));

        Ok(EligibilityResult {
            business_path: request.business_path,
            ownership_state: request.ownership_state,
            eligible: failures.is_empty(),
            max_loan: round_currency(max_loan),
            min_down_payment: round_currency(min_down_payment),
            max_ltv_percent: rule.max_ltv_percent,
            requested_ltv_percent,
            dti,
            max_dti_percent: rule.max_dti_percent,
            stress_test_dti,
            estimated_monthly_payment: round_currency(payment),
            failed_constraints: failures.iter().map(ConstraintFailure::constraint).collect(),
            rejection_reasons: failures.iter().map(ConstraintFailure::summary).collect(),
            rule_version: snapshot.version(),
        })
    }

    pub fn down_payment_requirement(
        &self,
        business_path: BusinessPath,
        ownership_state: Option<PropertyOwnershipState>,
        property_value: f64,
    ) -> Result<DownPaymentRequirement, EligibilityError> {
        let mut checks = FieldChecks::new();
        checks.non_negative("property_value", property_value);
        checks.finish()?;

        let snapshot = self.store.snapshot();
        let rule = lookup(&snapshot, business_path, ownership_state)?;

        Ok(DownPaymentRequirement {
            min_down_payment_percent: rule.min_down_payment_percent,
            min_down_payment: round_currency(
                property_value * rule.min_down_payment_percent / 100.0,
            ),
            max_loan: round_currency(property_value * rule.max_ltv_percent / 100.0),
        })
    }

    /// `(current_balance + cash_out_amount) / property_value` against the
    /// path's cash-out ceiling.
    pub fn check_cash_out(
        &self,
        business_path: BusinessPath,
        current_balance: f64,
        cash_out_amount: f64,
        property_value: f64,
    ) -> Result<CashOutCheck, EligibilityError> {
        let mut checks = FieldChecks::new();
        checks.non_negative("current_balance", current_balance);
        checks.non_negative("cash_out_amount", cash_out_amount);
        checks.non_negative("property_value", property_value);
        if property_value == 0.0 {
            checks.push("property_value", "must be greater than zero for cash-out");
        }
        checks.finish()?;

        let snapshot = self.store.snapshot();
        let standards = snapshot
            .standards(business_path)
            .map_err(log_lookup_failure)?;

        let new_loan_amount = current_balance + cash_out_amount;
        let ltv = new_loan_amount / property_value * 100.0;

        Ok(CashOutCheck {
            new_loan_amount: round_currency(new_loan_amount),
            ltv_percent: round_percent(ltv),
            max_ltv_percent: standards.cash_out_max_ltv_percent,
            within_limit: ltv <= standards.cash_out_max_ltv_percent,
        })
    }
}

/// Rounded DTI; a ratio that overflows is an input problem, never a pass.
fn debt_to_income(monthly_debt: f64, monthly_income: f64) -> Result<f64, ValidationError> {
    let ratio = monthly_debt / monthly_income * 100.0;
    if ratio.is_finite() {
        Ok(round_percent(ratio))
    } else {
        Err(ValidationError::single(
            "monthly_obligations",
            "yields a debt-to-income ratio that cannot be computed",
        ))
    }
}

fn lookup(
    snapshot: &RuleTableSnapshot,
    business_path: BusinessPath,
    ownership_state: Option<PropertyOwnershipState>,
) -> Result<&crate::rules::EligibilityRule, RuleLookupError> {
    snapshot
        .rule(business_path, ownership_state)
        .map_err(log_lookup_failure)
}

fn log_lookup_failure(err: RuleLookupError) -> RuleLookupError {
    error!(error = %err, "rule table is missing an entry");
    err
}

#[cfg(test)]
mod tests;
