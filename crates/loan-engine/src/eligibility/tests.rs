use super::*;
use crate::rules::{RuleTableStore, StandardRuleSource};

fn resolver() -> EligibilityResolver {
    let store = RuleTableStore::from_source(&StandardRuleSource).expect("built-in table loads");
    EligibilityResolver::new(Arc::new(store))
}

fn mortgage_request(
    ownership_state: PropertyOwnershipState,
    property_value: f64,
    requested_amount: f64,
) -> EligibilityRequest {
    EligibilityRequest {
        business_path: BusinessPath::Mortgage,
        ownership_state: Some(ownership_state),
        property_value,
        requested_amount,
        monthly_income: 60_000.0,
        monthly_obligations: 0.0,
        term_months: None,
    }
}

#[test]
fn no_property_million_yields_seventy_five_percent_loan() {
    let result = resolver()
        .resolve(&mortgage_request(
            PropertyOwnershipState::NoProperty,
            1_000_000.0,
            600_000.0,
        ))
        .expect("resolves");

    assert_eq!(result.max_loan, 750_000.0);
    assert_eq!(result.min_down_payment, 250_000.0);
    assert_eq!(result.max_ltv_percent, 75.0);
    assert!(result.eligible);
    assert!(result.failed_constraints.is_empty());
}

#[test]
fn has_property_million_yields_half_loan() {
    let result = resolver()
        .resolve(&mortgage_request(
            PropertyOwnershipState::HasProperty,
            1_000_000.0,
            400_000.0,
        ))
        .expect("resolves");

    assert_eq!(result.max_loan, 500_000.0);
    assert_eq!(result.min_down_payment, 500_000.0);
}

#[test]
fn max_loan_is_share_of_property_value() {
    let resolver = resolver();
    for property_value in [0.0, 1.0, 250_000.0, 1_234_000.0, 3_500_000.0] {
        for state in PropertyOwnershipState::ordered() {
            let rule = resolver
                .store()
                .get(BusinessPath::Mortgage, Some(state))
                .expect("rule present");
            let result = resolver
                .resolve(&mortgage_request(state, property_value, 0.0))
                .expect("resolves");
            assert_eq!(
                result.max_loan,
                crate::finance::round_currency(property_value * rule.max_ltv_percent / 100.0),
                "{state} at {property_value}"
            );
        }
    }
}

#[test]
fn ltv_boundary_is_inclusive() {
    let resolver = resolver();

    let at_limit = resolver
        .resolve(&mortgage_request(
            PropertyOwnershipState::NoProperty,
            1_000_000.0,
            750_000.0,
        ))
        .expect("resolves");
    assert!(!at_limit
        .failed_constraints
        .contains(&EligibilityConstraint::LoanToValue));
    assert!(at_limit.eligible);

    let over_limit = resolver
        .resolve(&mortgage_request(
            PropertyOwnershipState::NoProperty,
            1_000_000.0,
            750_001.0,
        ))
        .expect("resolves");
    assert!(!over_limit.eligible);
    assert_eq!(
        over_limit.failed_constraints,
        vec![EligibilityConstraint::LoanToValue]
    );
    assert!(over_limit.rejection_reasons[0].contains("exceeds maximum loan"));
}

#[test]
fn dti_boundary_is_inclusive() {
    // Zero-rate credit over 100 months makes the payment exactly 1% of principal.
    let resolver = resolver();
    let mut document = crate::rules::RuleDocument {
        rules: crate::rules::standard_rules(),
        standards: crate::rules::standard_lending_standards(),
    };
    for entry in &mut document.standards {
        entry.interest_rate_percent = 0.0;
        entry.term_months = 100;
    }
    let source = Fixture(document);
    resolver.store().reload(&source).expect("reload succeeds");

    let request = EligibilityRequest {
        business_path: BusinessPath::Credit,
        ownership_state: None,
        property_value: 500_000.0,
        requested_amount: 100_000.0,
        monthly_income: 5_000.0,
        monthly_obligations: 1_100.0,
        term_months: None,
    };
    let at_limit = resolver.resolve(&request).expect("resolves");
    assert_eq!(at_limit.dti, 42.0);
    assert!(at_limit.eligible);

    let over = resolver
        .resolve(&EligibilityRequest {
            monthly_obligations: 1_101.0,
            ..request
        })
        .expect("resolves");
    assert!(!over.eligible);
    assert_eq!(
        over.failed_constraints,
        vec![EligibilityConstraint::DebtToIncome]
    );
}

struct Fixture(crate::rules::RuleDocument);

impl crate::rules::RuleSource for Fixture {
    fn describe(&self) -> String {
        "fixture".to_string()
    }

    fn fetch(&self) -> Result<crate::rules::RuleDocument, crate::rules::LoadError> {
        Ok(self.0.clone())
    }
}

#[test]
fn reports_every_failing_constraint() {
    let result = resolver()
        .resolve(&EligibilityRequest {
            business_path: BusinessPath::Mortgage,
            ownership_state: Some(PropertyOwnershipState::SellingProperty),
            property_value: 1_000_000.0,
            requested_amount: 900_000.0,
            monthly_income: 4_000.0,
            monthly_obligations: 2_000.0,
            term_months: None,
        })
        .expect("resolves");

    assert!(!result.eligible);
    assert_eq!(
        result.failed_constraints,
        vec![
            EligibilityConstraint::LoanToValue,
            EligibilityConstraint::DebtToIncome,
            EligibilityConstraint::MinimumIncome,
        ]
    );
    assert_eq!(result.rejection_reasons.len(), 3);
    assert!(result.stress_test_dti > result.dti);
}

#[test]
fn zero_income_is_insufficient() {
    let mut request = mortgage_request(PropertyOwnershipState::NoProperty, 1_000_000.0, 1.0);
    request.monthly_income = 0.0;

    let err = resolver().resolve(&request).expect_err("no income");
    assert!(matches!(err, EligibilityError::InsufficientIncome));
}

#[test]
fn mortgage_without_ownership_is_a_validation_error() {
    let mut request = mortgage_request(PropertyOwnershipState::NoProperty, 1_000_000.0, 1.0);
    request.ownership_state = None;

    match resolver().resolve(&request) {
        Err(EligibilityError::Validation(err)) => {
            assert_eq!(err.issues[0].field, "ownership_state");
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn missing_rule_surfaces_rule_not_found() {
    let document = crate::rules::RuleDocument {
        rules: crate::rules::standard_rules()
            .into_iter()
            .filter(|rule| rule.business_path != BusinessPath::CreditRefinance)
            .collect(),
        standards: crate::rules::standard_lending_standards(),
    };
    let resolver = resolver();
    resolver
        .store()
        .reload(&Fixture(document))
        .expect("reload succeeds");

    let err = resolver
        .resolve(&EligibilityRequest {
            business_path: BusinessPath::CreditRefinance,
            ownership_state: None,
            property_value: 100_000.0,
            requested_amount: 10_000.0,
            monthly_income: 10_000.0,
            monthly_obligations: 0.0,
            term_months: None,
        })
        .expect_err("rule missing");
    assert!(matches!(
        err,
        EligibilityError::Rule(RuleLookupError::RuleNotFound { .. })
    ));
}

#[test]
fn payload_reports_missing_numbers_instead_of_zero_filling() {
    let payload = EligibilityPayload {
        business_path: Some(BusinessPath::Credit),
        property_value: Some(100_000.0),
        requested_amount: Some(20_000.0),
        monthly_income: None,
        monthly_obligations: Some(-5.0),
        ..EligibilityPayload::default()
    };

    let err = payload.into_request().expect_err("income missing");
    let fields: Vec<&str> = err.issues.iter().map(|issue| issue.field.as_str()).collect();
    assert_eq!(fields, vec!["monthly_income", "monthly_obligations"]);
}

#[test]
fn down_payment_requirement_follows_ownership_policy() {
    let resolver = resolver();
    let requirement = |state| {
        resolver
            .down_payment_requirement(BusinessPath::Mortgage, Some(state), 2_000_000.0)
            .expect("requirement resolves")
    };

    assert_eq!(
        requirement(PropertyOwnershipState::NoProperty).min_down_payment,
        500_000.0
    );
    assert_eq!(
        requirement(PropertyOwnershipState::SellingProperty).min_down_payment,
        600_000.0
    );
    assert_eq!(
        requirement(PropertyOwnershipState::HasProperty).min_down_payment,
        1_000_000.0
    );
}

#[test]
fn cash_out_is_checked_against_refinance_ceiling() {
    let resolver = resolver();

    let within = resolver
        .check_cash_out(BusinessPath::MortgageRefinance, 600_000.0, 200_000.0, 1_000_000.0)
        .expect("check runs");
    assert_eq!(within.ltv_percent, 80.0);
    assert!(within.within_limit);

    let over = resolver
        .check_cash_out(BusinessPath::MortgageRefinance, 600_000.0, 250_000.0, 1_000_000.0)
        .expect("check runs");
    assert_eq!(over.new_loan_amount, 850_000.0);
    assert!(!over.within_limit);
}

#[test]
fn fractional_max_loan_accepts_the_reported_figure() {
    let resolver = resolver();
    let request = |requested_amount| {
        resolver
            .resolve(&mortgage_request(
                PropertyOwnershipState::NoProperty,
                1_000_001.0,
                requested_amount,
            ))
            .expect("resolves")
    };

    let at_limit = request(750_001.0);
    assert_eq!(at_limit.max_loan, 750_001.0);
    assert!(at_limit.eligible, "{:?}", at_limit.rejection_reasons);

    let over = request(750_002.0);
    assert_eq!(over.failed_constraints, vec![EligibilityConstraint::LoanToValue]);
    assert_eq!(
        over.rejection_reasons,
        vec!["requested amount 750002 exceeds maximum loan 750001".to_string()]
    );
}

#[test]
fn oversized_term_is_rejected_before_the_dti_check() {
    let request = EligibilityRequest {
        monthly_income: 6_000.0,
        monthly_obligations: 5_900.0,
        term_months: Some(1_000_000),
        ..mortgage_request(PropertyOwnershipState::NoProperty, 1_000_000.0, 700_000.0)
    };

    match resolver().resolve(&request) {
        Err(EligibilityError::Validation(err)) => {
            assert_eq!(err.issues[0].field, "term_months");
        }
        other => panic!("expected validation error, got {other:?}"),
    }

    let longest = resolver()
        .resolve(&EligibilityRequest {
            term_months: Some(crate::finance::MAX_TERM_MONTHS),
            ..request
        })
        .expect("600 months is allowed");
    assert!(longest.dti.is_finite());
    assert!(!longest.eligible);
    assert!(longest
        .failed_constraints
        .contains(&EligibilityConstraint::DebtToIncome));
}

#[test]
fn payload_term_above_cap_is_a_field_error() {
    let payload = EligibilityPayload {
        business_path: Some(BusinessPath::Credit),
        property_value: Some(0.0),
        requested_amount: Some(20_000.0),
        monthly_income: Some(8_000.0),
        monthly_obligations: Some(0.0),
        term_months: Some(601),
        ..EligibilityPayload::default()
    };

    let err = payload.into_request().expect_err("term too long");
    assert_eq!(err.issues.len(), 1);
    assert_eq!(err.issues[0].field, "term_months");
}

#[test]
fn refinancing_owners_keep_the_half_down_payment_floor() {
    let requirement = resolver()
        .down_payment_requirement(
            BusinessPath::MortgageRefinance,
            Some(PropertyOwnershipState::HasProperty),
            1_000_000.0,
        )
        .expect("requirement resolves");

    assert!(requirement.min_down_payment_percent >= 50.0);
    assert_eq!(requirement.max_loan, 500_000.0);
}

#[test]
fn cash_out_ceiling_ignores_display_rounding() {
    let check = resolver()
        .check_cash_out(BusinessPath::MortgageRefinance, 600_000.0, 200_040.0, 1_000_000.0)
        .expect("check runs");

    assert_eq!(check.ltv_percent, 80.0);
    assert!(!check.within_limit);
}
