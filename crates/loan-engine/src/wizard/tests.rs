use super::*;
use serde_json::json;

fn state(step_number: u8, values: serde_json::Value) -> WizardStepState {
    WizardStepState {
        step_number,
        field_values: serde_json::from_value(values).expect("field values parse"),
        revealed_conditional_fields: BTreeSet::new(),
    }
}

fn mortgage_step_one() -> WizardStepState {
    state(
        1,
        json!({
            "price_of_estate": 1_000_000,
            "city_where_you_buy": "Tel Aviv",
            "when_needed": "within_3_months",
            "type": "apartment",
            "first_home": "yes_first_home",
            "property_ownership": "no_property",
            "initial_fee": "250000",
            "period": 300
        }),
    )
}

fn income_step(main_source: &str, additional: &str, obligation: &str) -> WizardStepState {
    state(
        3,
        json!({
            "main_source_of_income": main_source,
            "additional_income": additional,
            "obligation": obligation
        }),
    )
}

#[test]
fn complete_step_is_ready() {
    let blueprint = WizardBlueprint::standard();

    let validation = blueprint
        .evaluate(BusinessPath::Mortgage, &mortgage_step_one())
        .expect("known step");

    assert_eq!(validation.status, StepStatus::Ready);
    assert!(validation.missing_fields.is_empty());
    assert!(!validation
        .required_fields
        .contains(&"monthly_payment".to_string()));
}

#[test]
fn missing_and_blank_fields_keep_step_incomplete() {
    let blueprint = WizardBlueprint::standard();
    let mut snapshot = mortgage_step_one();
    snapshot.field_values.remove("period");
    snapshot
        .field_values
        .insert("city_where_you_buy".to_string(), FieldValue::Text("  ".to_string()));

    let validation = blueprint
        .evaluate(BusinessPath::Mortgage, &snapshot)
        .expect("known step");

    assert_eq!(validation.status, StepStatus::Incomplete);
    assert_eq!(
        validation.missing_fields,
        vec!["city_where_you_buy".to_string(), "period".to_string()]
    );
}

#[test]
fn wrong_kinds_are_reported_per_field() {
    let blueprint = WizardBlueprint::standard();
    let mut snapshot = mortgage_step_one();
    snapshot
        .field_values
        .insert("property_ownership".to_string(), FieldValue::Text("renting".to_string()));
    snapshot
        .field_values
        .insert("initial_fee".to_string(), FieldValue::Number(-5.0));

    let validation = blueprint
        .evaluate(BusinessPath::Mortgage, &snapshot)
        .expect("known step");

    let fields: Vec<&str> = validation
        .invalid_fields
        .iter()
        .map(|issue| issue.field.as_str())
        .collect();
    assert_eq!(fields, vec!["property_ownership", "initial_fee"]);
    assert_eq!(validation.status, StepStatus::Incomplete);
}

#[test]
fn employment_answer_reveals_employment_details() {
    let blueprint = WizardBlueprint::standard();
    let snapshot = income_step("employee", "none", "no_obligations");

    let validation = blueprint
        .evaluate(BusinessPath::Mortgage, &snapshot)
        .expect("known step");

    assert_eq!(
        validation.newly_required,
        vec![
            "company_name",
            "field_of_activity",
            "monthly_income",
            "profession",
            "start_date"
        ]
    );
    assert_eq!(validation.missing_fields.len(), 5);
    assert!(!validation
        .required_fields
        .contains(&"additional_income_amount".to_string()));
}

#[test]
fn revealed_fields_that_are_filled_make_the_step_ready() {
    let blueprint = WizardBlueprint::standard();
    let mut snapshot = state(
        3,
        json!({
            "main_source_of_income": "pension",
            "monthly_income": 7_500,
            "additional_income": "investment",
            "additional_income_amount": "1200.50",
            "obligation": "bank_loan",
            "bank": "Bank Leumi",
            "monthly_payment_for_another_bank": 900,
            "end_date": "2029-04"
        }),
    );
    snapshot.revealed_conditional_fields = [
        "monthly_income",
        "additional_income_amount",
        "bank",
        "monthly_payment_for_another_bank",
        "end_date",
    ]
    .into_iter()
    .map(String::from)
    .collect();

    let validation = blueprint
        .evaluate(BusinessPath::Credit, &snapshot)
        .expect("known step");

    assert_eq!(validation.status, StepStatus::Ready);
    assert!(validation.newly_required.is_empty());
    assert!(validation.stale_fields.is_empty());
}

#[test]
fn changed_answer_marks_previously_revealed_fields_stale() {
    let blueprint = WizardBlueprint::standard();
    let mut snapshot = income_step("pension", "none", "no_obligations");
    snapshot
        .field_values
        .insert("monthly_income".to_string(), FieldValue::Number(6_000.0));
    snapshot.revealed_conditional_fields = ["monthly_income", "start_date", "company_name"]
        .into_iter()
        .map(String::from)
        .collect();

    let validation = blueprint
        .evaluate(BusinessPath::Mortgage, &snapshot)
        .expect("known step");

    assert_eq!(
        validation.stale_fields,
        vec!["company_name".to_string(), "start_date".to_string()]
    );
    assert_eq!(validation.status, StepStatus::Ready);
}

#[test]
fn answers_outside_the_step_reveal_nothing() {
    let blueprint = WizardBlueprint::standard();
    let mut snapshot = mortgage_step_one();
    snapshot
        .field_values
        .insert("purpose_of_loan".to_string(), FieldValue::Text("other".to_string()));

    let validation = blueprint
        .evaluate(BusinessPath::Mortgage, &snapshot)
        .expect("known step");

    assert!(!validation
        .required_fields
        .contains(&"purpose_description".to_string()));
    assert!(validation.is_ready());
}

#[test]
fn evaluation_is_idempotent() {
    let blueprint = WizardBlueprint::standard();
    let snapshot = income_step("selfemployed", "other", "credit_card");

    let first = blueprint
        .evaluate(BusinessPath::CreditRefinance, &snapshot)
        .expect("known step");
    let second = blueprint
        .evaluate(BusinessPath::CreditRefinance, &snapshot)
        .expect("known step");

    assert_eq!(first, second);
}

#[test]
fn unknown_step_is_an_error() {
    let blueprint = WizardBlueprint::standard();

    let err = blueprint
        .evaluate(BusinessPath::Credit, &state(9, json!({})))
        .expect_err("no such step");

    assert_eq!(
        err,
        WizardError::UnknownStep {
            business_path: BusinessPath::Credit,
            step_number: 9
        }
    );
}

#[test]
fn attempt_moves_from_incomplete_to_submitted() {
    let blueprint = WizardBlueprint::standard();
    let mut attempt = StepAttempt::new(BusinessPath::Mortgage, 1);
    let mut snapshot = mortgage_step_one();
    snapshot.field_values.remove("type");

    let err = attempt
        .submit(&blueprint, &snapshot)
        .expect_err("type missing");
    assert!(matches!(err, WizardError::NotReady { ref missing, .. } if missing == &vec!["type".to_string()]));
    assert_eq!(attempt.status(), StepStatus::Incomplete);

    let complete = mortgage_step_one();
    attempt.validate(&blueprint, &complete).expect("ready");
    assert_eq!(attempt.status(), StepStatus::Ready);

    let submitted = attempt.submit(&blueprint, &complete).expect("submits");
    assert_eq!(submitted.status, StepStatus::Submitted);
    assert_eq!(
        attempt.validate(&blueprint, &complete),
        Err(WizardError::AlreadySubmitted(1))
    );

    let retry = StepAttempt::new(BusinessPath::Mortgage, 1);
    assert_eq!(retry.status(), StepStatus::Incomplete);
}

#[test]
fn attempt_rejects_snapshots_for_other_steps() {
    let blueprint = WizardBlueprint::standard();
    let mut attempt = StepAttempt::new(BusinessPath::Mortgage, 2);

    let err = attempt
        .validate(&blueprint, &mortgage_step_one())
        .expect_err("wrong step");

    assert_eq!(
        err,
        WizardError::StepMismatch {
            expected: 2,
            actual: 1
        }
    );
}

#[test]
fn every_path_has_three_steps_with_known_conditional_targets() {
    let blueprint = WizardBlueprint::standard();
    for path in BusinessPath::ordered() {
        let steps = blueprint.steps_for(path);
        assert_eq!(steps.len(), 3, "{path}");
        for step in steps {
            for field in &step.fields {
                if let FieldKind::Choice(allowed) = field.kind {
                    for value in allowed {
                        for revealed in blueprint.revealed_by(step.step_number, field.key, value) {
                            let target = step.field(revealed).expect("revealed field is defined");
                            assert_eq!(target.presence, Presence::Conditional, "{revealed}");
                        }
                    }
                }
            }
        }
    }
}

#[test]
fn reveals_are_looked_up_with_request_owned_strings() {
    let blueprint = WizardBlueprint::standard();
    let field = String::from("why_refinancing");
    let value = String::from("cash_out");

    assert_eq!(blueprint.revealed_by(1, &field, &value), &["cash_out_amount"]);
    assert!(blueprint.revealed_by(2, &field, &value).is_empty());
    assert!(blueprint.revealed_by(1, &field, "lower_rate").is_empty());
}
