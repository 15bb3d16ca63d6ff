use crate::rules::BusinessPath;
use serde::Serialize;
use std::collections::BTreeMap;

const TIMEFRAMES: &[&str] = &[
    "within_3_months",
    "within_3_to_6_months",
    "within_6_to_12_months",
    "over_12_months",
];
const OWNERSHIP: &[&str] = &["no_property", "has_property", "selling_property"];
const PROPERTY_TYPES: &[&str] = &["apartment", "private_house", "garden_apartment", "penthouse"];
const FIRST_HOME: &[&str] = &["yes_first_home", "no_additional_property", "investment"];
const EDUCATION: &[&str] = &[
    "no_high_school_certificate",
    "full_high_school_certificate",
    "bachelors",
    "masters",
    "doctorate",
];
const CITIZENSHIP: &[&str] = &["israel", "united_states", "russia", "other"];
const FAMILY_STATUS: &[&str] = &["single", "married", "divorced", "widowed"];
const INCOME_SOURCES: &[&str] = &["employee", "selfemployed", "pension", "unemployed", "other"];
const ADDITIONAL_INCOME: &[&str] = &["none", "additional_salary", "investment", "other"];
const OBLIGATIONS: &[&str] = &[
    "no_obligations",
    "bank_loan",
    "consumer_credit",
    "credit_card",
    "other",
];
const LOAN_PURPOSES: &[&str] = &["vehicle", "renovation", "wedding", "other"];
const CREDIT_TIMEFRAMES: &[&str] = &["immediately", "within_month", "within_3_months"];
const MORTGAGE_REFINANCE_REASONS: &[&str] = &[
    "lower_interest_rate",
    "reduce_monthly_payment",
    "shorten_term",
    "cash_out",
];
const CREDIT_REFINANCE_REASONS: &[&str] =
    &["improve_interest_rate", "reduce_credit_amount", "increase_term"];

const EMPLOYMENT_DETAILS: &[&str] = &[
    "monthly_income",
    "start_date",
    "field_of_activity",
    "profession",
    "company_name",
];
const OBLIGATION_DETAILS: &[&str] = &["bank", "monthly_payment_for_another_bank", "end_date"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "allowed")]
pub enum FieldKind {
    Text,
    /// Non-negative finite number.
    Amount,
    Choice(&'static [&'static str]),
    Flag,
}

impl FieldKind {
    pub const fn label(self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Amount => "amount",
            FieldKind::Choice(_) => "choice",
            FieldKind::Flag => "flag",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    Required,
    Optional,
    /// Required only once an earlier answer reveals it.
    Conditional,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    pub key: &'static str,
    pub kind: FieldKind,
    pub presence: Presence,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepDefinition {
    pub business_path: BusinessPath,
    pub step_number: u8,
    pub title: &'static str,
    pub fields: Vec<FieldSpec>,
}

impl StepDefinition {
    pub fn field(&self, key: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.key == key)
    }

    pub fn base_required(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields
            .iter()
            .filter(|field| field.presence == Presence::Required)
            .map(|field| field.key)
    }
}

pub type ConditionKey = (u8, &'static str, &'static str);

/// Step layout for every business path plus the conditional-reveal table.
#[derive(Debug)]
pub struct WizardBlueprint {
    steps: Vec<StepDefinition>,
    conditions: BTreeMap<ConditionKey, &'static [&'static str]>,
}

impl WizardBlueprint {
    pub fn standard() -> Self {
        let mut steps = Vec::new();
        for path in BusinessPath::ordered() {
            steps.push(opening_step(path));
            steps.push(personal_step(path));
            steps.push(income_step(path));
        }

        Self {
            steps,
            conditions: standard_conditions(),
        }
    }

    pub fn step(&self, business_path: BusinessPath, step_number: u8) -> Option<&StepDefinition> {
        self.steps
            .iter()
            .find(|step| step.business_path == business_path && step.step_number == step_number)
    }

    pub fn steps_for(&self, business_path: BusinessPath) -> Vec<&StepDefinition> {
        self.steps
            .iter()
            .filter(|step| step.business_path == business_path)
            .collect()
    }

    /// Fields revealed by answering `field_key` with `selected_value` on a step.
    pub fn revealed_by(
        &self,
        step_number: u8,
        field_key: &str,
        selected_value: &str,
    ) -> &'static [&'static str] {
        let conditions: &BTreeMap<(u8, &str, &str), &'static [&'static str]> = &self.conditions;
        conditions
            .get(&(step_number, field_key, selected_value))
            .copied()
            .unwrap_or(&[])
    }
}

fn required(key: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        key,
        kind,
        presence: Presence::Required,
    }
}

fn optional(key: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        key,
        kind,
        presence: Presence::Optional,
    }
}

fn conditional(key: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        key,
        kind,
        presence: Presence::Conditional,
    }
}

fn opening_step(business_path: BusinessPath) -> StepDefinition {
    let (title, fields) = match business_path {
        BusinessPath::Mortgage => (
            "Mortgage calculator",
            vec![
                required("price_of_estate", FieldKind::Amount),
                required("city_where_you_buy", FieldKind::Text),
                required("when_needed", FieldKind::Choice(TIMEFRAMES)),
                required("type", FieldKind::Choice(PROPERTY_TYPES)),
                required("first_home", FieldKind::Choice(FIRST_HOME)),
                required("property_ownership", FieldKind::Choice(OWNERSHIP)),
                required("initial_fee", FieldKind::Amount),
                required("period", FieldKind::Amount),
                optional("monthly_payment", FieldKind::Amount),
            ],
        ),
        BusinessPath::Credit => (
            "Credit calculator",
            vec![
                required("purpose_of_loan", FieldKind::Choice(LOAN_PURPOSES)),
                conditional("purpose_description", FieldKind::Text),
                required("loan_amount", FieldKind::Amount),
                required("when_needed", FieldKind::Choice(CREDIT_TIMEFRAMES)),
                required("loan_period", FieldKind::Amount),
            ],
        ),
        BusinessPath::MortgageRefinance => (
            "Mortgage refinance",
            vec![
                required("why_refinancing", FieldKind::Choice(MORTGAGE_REFINANCE_REASONS)),
                required("property_type", FieldKind::Choice(PROPERTY_TYPES)),
                required("property_value", FieldKind::Amount),
                required("mortgage_balance", FieldKind::Amount),
                required("current_rate", FieldKind::Amount),
                required("remaining_term_months", FieldKind::Amount),
                optional("current_monthly_payment", FieldKind::Amount),
                required("desired_term_months", FieldKind::Amount),
                required("closing_costs", FieldKind::Amount),
                conditional("cash_out_amount", FieldKind::Amount),
            ],
        ),
        BusinessPath::CreditRefinance => (
            "Credit refinance",
            vec![
                required("refinance_reason", FieldKind::Choice(CREDIT_REFINANCE_REASONS)),
                required("credit_balance", FieldKind::Amount),
                required("current_rate", FieldKind::Amount),
                required("remaining_term_months", FieldKind::Amount),
                optional("current_monthly_payment", FieldKind::Amount),
                required("desired_term_months", FieldKind::Amount),
                required("closing_costs", FieldKind::Amount),
            ],
        ),
    };

    StepDefinition {
        business_path,
        step_number: 1,
        title,
        fields,
    }
}

fn personal_step(business_path: BusinessPath) -> StepDefinition {
    StepDefinition {
        business_path,
        step_number: 2,
        title: "Personal details",
        fields: vec![
            required("name_surname", FieldKind::Text),
            required("birthday", FieldKind::Text),
            required("education", FieldKind::Choice(EDUCATION)),
            required("citizenship", FieldKind::Choice(CITIZENSHIP)),
            conditional("citizenship_countries", FieldKind::Text),
            required("is_public_person", FieldKind::Flag),
            required("family_status", FieldKind::Choice(FAMILY_STATUS)),
            conditional("partner_pay_mortgage", FieldKind::Flag),
        ],
    }
}

fn income_step(business_path: BusinessPath) -> StepDefinition {
    StepDefinition {
        business_path,
        step_number: 3,
        title: "Income and obligations",
        fields: vec![
            required("main_source_of_income", FieldKind::Choice(INCOME_SOURCES)),
            conditional("monthly_income", FieldKind::Amount),
            conditional("start_date", FieldKind::Text),
            conditional("field_of_activity", FieldKind::Text),
            conditional("profession", FieldKind::Text),
            conditional("company_name", FieldKind::Text),
            required("additional_income", FieldKind::Choice(ADDITIONAL_INCOME)),
            conditional("additional_income_amount", FieldKind::Amount),
            required("obligation", FieldKind::Choice(OBLIGATIONS)),
            conditional("bank", FieldKind::Text),
            conditional("monthly_payment_for_another_bank", FieldKind::Amount),
            conditional("end_date", FieldKind::Text),
        ],
    }
}

fn standard_conditions() -> BTreeMap<ConditionKey, &'static [&'static str]> {
    let mut conditions: BTreeMap<ConditionKey, &'static [&'static str]> = BTreeMap::new();

    conditions.insert((1, "purpose_of_loan", "other"), &["purpose_description"]);
    conditions.insert((1, "why_refinancing", "cash_out"), &["cash_out_amount"]);

    conditions.insert((2, "citizenship", "other"), &["citizenship_countries"]);
    conditions.insert((2, "family_status", "married"), &["partner_pay_mortgage"]);

    conditions.insert((3, "main_source_of_income", "employee"), EMPLOYMENT_DETAILS);
    conditions.insert((3, "main_source_of_income", "selfemployed"), EMPLOYMENT_DETAILS);
    conditions.insert((3, "main_source_of_income", "pension"), &["monthly_income"]);
    conditions.insert((3, "main_source_of_income", "other"), &["monthly_income"]);
    for source in ["additional_salary", "investment", "other"] {
        conditions.insert((3, "additional_income", source), &["additional_income_amount"]);
    }
    for obligation in ["bank_loan", "consumer_credit", "credit_card", "other"] {
        conditions.insert((3, "obligation", obligation), OBLIGATION_DETAILS);
    }

    conditions
}
