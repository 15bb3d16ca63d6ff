use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::dropdowns::{CacheError, CacheStats, DropdownCache, DropdownDataset, DropdownSource};
use crate::eligibility::{
    CashOutCheck, DownPaymentRequirement, EligibilityError, EligibilityRequest, EligibilityResolver,
    EligibilityResult,
};
use crate::refinance::{RefinanceComparator, RefinanceError, RefinanceResult, RefinanceScenario};
use crate::rules::{
    BusinessPath, EligibilityRule, LoadError, PropertyOwnershipState, RuleLookupError, RuleSource,
    RuleTableSnapshot, RuleTableStore,
};
use crate::validation::ValidationError;
use crate::wizard::{StepValidation, WizardBlueprint, WizardError, WizardStepState};

/// Facade composing the rule store, resolver, dropdown cache, comparator,
/// and wizard blueprint behind one handle for the HTTP layer.
pub struct LoanEngineService<S> {
    store: Arc<RuleTableStore>,
    resolver: EligibilityResolver,
    comparator: RefinanceComparator,
    dropdowns: DropdownCache<S>,
    blueprint: Arc<WizardBlueprint>,
    dropdown_wait: Duration,
}

impl<S> LoanEngineService<S>
where
    S: DropdownSource,
{
    pub fn new(store: Arc<RuleTableStore>, source: S, config: &EngineConfig) -> Self {
        Self {
            resolver: EligibilityResolver::new(Arc::clone(&store)),
            comparator: RefinanceComparator::new(Arc::clone(&store)),
            dropdowns: DropdownCache::from_config(source, config),
            blueprint: Arc::new(WizardBlueprint::standard()),
            dropdown_wait: config.dropdown_wait,
            store,
        }
    }

    pub fn store(&self) -> &Arc<RuleTableStore> {
        &self.store
    }

    pub fn dropdown_cache(&self) -> &DropdownCache<S> {
        &self.dropdowns
    }

    pub fn blueprint(&self) -> &WizardBlueprint {
        &self.blueprint
    }

    pub fn calculation_parameters(
        &self,
        business_path: BusinessPath,
    ) -> Result<CalculationParameters, ServiceError> {
        let snapshot = self.store.snapshot();
        let standards = snapshot.standards(business_path)?;
        let reference = reference_rule(&snapshot, business_path)?;

        let mut property_ownership_ltvs = BTreeMap::new();
        if business_path.is_property_backed() {
            for state in PropertyOwnershipState::ordered() {
                let rule = snapshot.rule(business_path, Some(state))?;
                property_ownership_ltvs.insert(
                    state,
                    OwnershipLtv {
                        ltv: rule.max_ltv_percent,
                        min_down_payment: rule.min_down_payment_percent,
                    },
                );
            }
        }

        Ok(CalculationParameters {
            business_path,
            current_interest_rate: standards.interest_rate_percent,
            term_months: standards.term_months,
            property_ownership_ltvs,
            standards: ParameterStandards {
                dti: DtiStandards {
                    max_dti_percent: reference.max_dti_percent,
                    stress_rate_percent: standards.stress_rate_percent,
                },
                income: IncomeStandards {
                    min_monthly_income: reference.min_monthly_income,
                },
                refinance: RefinanceStandards {
                    minimum_savings_percent: standards.minimum_savings_percent,
                    cash_out_max_ltv_percent: standards.cash_out_max_ltv_percent,
                    max_break_even_months: standards.max_break_even_months,
                },
            },
            rule_version: snapshot.version(),
            last_updated: snapshot.loaded_at(),
        })
    }

    pub fn eligibility(
        &self,
        request: &EligibilityRequest,
    ) -> Result<EligibilityResult, ServiceError> {
        Ok(self.resolver.resolve(request)?)
    }

    /// Comparator output plus the cash-out LTV check when cash is taken out.
    pub fn refinance(&self, scenario: &RefinanceScenario) -> Result<RefinanceReport, ServiceError> {
        let comparison = self.comparator.compare(scenario)?;
        let cash_out = match (scenario.cash_out_amount, scenario.property_value) {
            (Some(amount), Some(property_value)) if amount > 0.0 => Some(self.resolver.check_cash_out(
                scenario.business_path,
                scenario.current_balance,
                amount,
                property_value,
            )?),
            _ => None,
        };
        Ok(RefinanceReport {
            comparison,
            cash_out,
        })
    }

    pub async fn dropdowns(
        &self,
        screen_location: &str,
        language_code: &str,
    ) -> Result<Arc<DropdownDataset>, ServiceError> {
        Ok(self
            .dropdowns
            .get_bulk_with_timeout(screen_location, language_code, self.dropdown_wait)
            .await?)
    }

    pub fn dropdown_stats(&self) -> CacheStats {
        self.dropdowns.stats()
    }

    pub fn invalidate_dropdowns(
        &self,
        screen_location: Option<&str>,
        language_code: Option<&str>,
    ) -> usize {
        self.dropdowns.invalidate(screen_location, language_code)
    }

    pub fn reload_rules(&self, source: &dyn RuleSource) -> Result<u64, LoadError> {
        self.store.reload(source).map_err(|err| {
            warn!(error = %err, source = %source.describe(), "rule reload rejected, keeping active table");
            err
        })
    }

    /// Blueprint readiness plus the policy gates for the opening step of the
    /// mortgage and refinance flows.
    pub fn validate_step(
        &self,
        business_path: BusinessPath,
        state: &WizardStepState,
    ) -> Result<WizardReport, ServiceError> {
        let mut validation = self.blueprint.evaluate(business_path, state)?;
        let mut down_payment = None;
        let mut refinance = None;

        if state.step_number == 1 {
            match business_path {
                BusinessPath::Mortgage => {
                    down_payment = self.gate_down_payment(state, &mut validation)?;
                }
                BusinessPath::MortgageRefinance | BusinessPath::CreditRefinance
                    if validation.is_ready() =>
                {
                    refinance = self.gate_refinance(business_path, state, &mut validation)?;
                }
                _ => {}
            }
        }

        info!(
            business_path = %business_path,
            step = state.step_number,
            status = validation.status.label(),
            missing = validation.missing_fields.len(),
            "wizard step evaluated"
        );
        Ok(WizardReport {
            validation,
            down_payment,
            refinance,
        })
    }

    fn gate_down_payment(
        &self,
        state: &WizardStepState,
        validation: &mut StepValidation,
    ) -> Result<Option<DownPaymentRequirement>, ServiceError> {
        let ownership = state
            .text("property_ownership")
            .and_then(|raw| raw.parse::<PropertyOwnershipState>().ok());
        let (Some(price), Some(ownership)) = (state.amount("price_of_estate"), ownership) else {
            return Ok(None);
        };
        if !price.is_finite() || price < 0.0 {
            return Ok(None);
        }

        let requirement =
            self.resolver
                .down_payment_requirement(BusinessPath::Mortgage, Some(ownership), price)?;
        if let Some(initial_fee) = state.amount("initial_fee") {
            if initial_fee < requirement.min_down_payment {
                validation.reject(
                    "initial_fee",
                    format!(
                        "must be at least {:.0} ({}% of the property value for {})",
                        requirement.min_down_payment,
                        requirement.min_down_payment_percent,
                        ownership
                    ),
                );
            }
        }
        Ok(Some(requirement))
    }

    fn gate_refinance(
        &self,
        business_path: BusinessPath,
        state: &WizardStepState,
        validation: &mut StepValidation,
    ) -> Result<Option<RefinanceReport>, ServiceError> {
        let balance_field = match business_path {
            BusinessPath::MortgageRefinance => "mortgage_balance",
            _ => "credit_balance",
        };
        let mut whole_months = |field: &str| match state.amount(field) {
            Some(months) if months.fract() == 0.0 && months <= f64::from(u32::MAX) => {
                Some(months as u32)
            }
            _ => {
                validation.reject(field, "must be a whole number of months");
                None
            }
        };
        let remaining = whole_months("remaining_term_months");
        let desired = whole_months("desired_term_months");
        let (Some(current_remaining_term_months), Some(new_term_months)) = (remaining, desired)
        else {
            return Ok(None);
        };

        let snapshot = self.store.snapshot();
        let standards = snapshot.standards(business_path)?;
        let scenario = RefinanceScenario {
            business_path,
            current_balance: state.amount(balance_field).unwrap_or_default(),
            current_rate: state.amount("current_rate").unwrap_or_default(),
            current_remaining_term_months,
            current_monthly_payment: state.amount("current_monthly_payment"),
            new_rate: standards.interest_rate_percent,
            new_term_months,
            closing_costs: state.amount("closing_costs").unwrap_or_default(),
            cash_out_amount: state.amount("cash_out_amount"),
            property_value: state.amount("property_value"),
        };

        let report = match self.refinance(&scenario) {
            Ok(report) => report,
            Err(ServiceError::InvalidScenario(message)) => {
                validation.reject("scenario", message);
                return Ok(None);
            }
            Err(other) => return Err(other),
        };
        if let Some(check) = report.cash_out.as_ref().filter(|check| !check.within_limit) {
            validation.reject(
                "cash_out_amount",
                format!(
                    "raises the loan to {:.2}% of the property value, above the {:.0}% ceiling",
                    check.ltv_percent, check.max_ltv_percent
                ),
            );
        }
        Ok(Some(report))
    }
}

/// Path-level DTI and income figures: the path-wide rule, or the first-time
/// buyer rule for mortgage paths keyed by ownership.
fn reference_rule(
    snapshot: &RuleTableSnapshot,
    business_path: BusinessPath,
) -> Result<&EligibilityRule, RuleLookupError> {
    let state = business_path
        .is_property_backed()
        .then_some(PropertyOwnershipState::NoProperty);
    snapshot.rule(business_path, state)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OwnershipLtv {
    pub ltv: f64,
    pub min_down_payment: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DtiStandards {
    pub max_dti_percent: f64,
    pub stress_rate_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncomeStandards {
    pub min_monthly_income: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefinanceStandards {
    pub minimum_savings_percent: f64,
    pub cash_out_max_ltv_percent: f64,
    pub max_break_even_months: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterStandards {
    pub dti: DtiStandards,
    pub income: IncomeStandards,
    pub refinance: RefinanceStandards,
}

/// Body of `data` in `GET /api/v1/calculation-parameters`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalculationParameters {
    pub business_path: BusinessPath,
    pub current_interest_rate: f64,
    pub term_months: u32,
    pub property_ownership_ltvs: BTreeMap<PropertyOwnershipState, OwnershipLtv>,
    pub standards: ParameterStandards,
    pub rule_version: u64,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefinanceReport {
    #[serde(flatten)]
    pub comparison: RefinanceResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cash_out: Option<CashOutCheck>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WizardReport {
    #[serde(flatten)]
    pub validation: StepValidation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub down_payment: Option<DownPaymentRequirement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refinance: Option<RefinanceReport>,
}

/// Error raised by the engine service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Rule(#[from] RuleLookupError),
    #[error("monthly income must be greater than zero to compute a debt-to-income ratio")]
    InsufficientIncome,
    #[error("invalid refinance scenario: {0}")]
    InvalidScenario(String),
    #[error(transparent)]
    Upstream(#[from] CacheError),
    #[error(transparent)]
    Wizard(#[from] WizardError),
}

impl From<EligibilityError> for ServiceError {
    fn from(err: EligibilityError) -> Self {
        match err {
            EligibilityError::Validation(err) => Self::Validation(err),
            EligibilityError::Rule(err) => Self::Rule(err),
            EligibilityError::InsufficientIncome => Self::InsufficientIncome,
        }
    }
}

impl From<RefinanceError> for ServiceError {
    fn from(err: RefinanceError) -> Self {
        match err {
            RefinanceError::Validation(err) => Self::Validation(err),
            RefinanceError::InvalidScenario(message) => Self::InvalidScenario(message),
            RefinanceError::Rule(err) => Self::Rule(err),
        }
    }
}
