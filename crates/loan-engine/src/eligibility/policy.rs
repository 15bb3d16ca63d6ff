use crate::rules::EligibilityRule;
use serde::{Deserialize, Serialize};

/// Named eligibility constraints so the UI can explain a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityConstraint {
    LoanToValue,
    DebtToIncome,
    MinimumIncome,
}

/// A failed constraint together with the numbers that failed it.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstraintFailure {
    LoanToValue { requested: f64, max_loan: f64 },
    DebtToIncome { dti: f64, max_dti: f64 },
    MinimumIncome { income: f64, required: f64 },
}

impl ConstraintFailure {
    pub fn constraint(&self) -> EligibilityConstraint {
        match self {
            ConstraintFailure::LoanToValue { .. } => EligibilityConstraint::LoanToValue,
            ConstraintFailure::DebtToIncome { .. } => EligibilityConstraint::DebtToIncome,
            ConstraintFailure::MinimumIncome { .. } => EligibilityConstraint::MinimumIncome,
        }
    }

    pub fn summary(&self) -> String {
        match self {
            ConstraintFailure::LoanToValue {
                requested,
                max_loan,
            } => format!(
                "requested amount {:.0} exceeds maximum loan {:.0}",
                requested, max_loan
            ),
            ConstraintFailure::DebtToIncome { dti, max_dti } => {
                format!("DTI ratio {:.2}% exceeds maximum {:.2}%", dti, max_dti)
            }
            ConstraintFailure::MinimumIncome { income, required } => format!(
                "monthly income {:.0} below required minimum {:.0}",
                income, required
            ),
        }
    }
}

pub(crate) struct EligibilitySignals {
    pub requested_amount: f64,
    /// The same whole-unit figure the result reports.
    pub max_loan: f64,
    /// Already rounded to two decimals.
    pub dti: f64,
    pub monthly_income: f64,
}

/// Every boundary is inclusive.
pub(crate) fn failed_constraints(
    signals: &EligibilitySignals,
    rule: &EligibilityRule,
) -> Vec<ConstraintFailure> {
    let mut failures = Vec::new();

    if signals.requested_amount > signals.max_loan {
        failures.push(ConstraintFailure::LoanToValue {
            requested: signals.requested_amount,
            max_loan: signals.max_loan,
        });
    }

    if signals.dti > rule.max_dti_percent {
        failures.push(ConstraintFailure::DebtToIncome {
            dti: signals.dti,
            max_dti: rule.max_dti_percent,
        });
    }

    if signals.monthly_income < rule.min_monthly_income {
        failures.push(ConstraintFailure::MinimumIncome {
            income: signals.monthly_income,
            required: rule.min_monthly_income,
        });
    }

    failures
}
