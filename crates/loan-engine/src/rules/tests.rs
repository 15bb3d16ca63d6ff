use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};

fn standard_document() -> RuleDocument {
    RuleDocument {
        rules: standard_rules(),
        standards: standard_lending_standards(),
    }
}

struct FixtureSource {
    document: RuleDocument,
    fetches: AtomicUsize,
}

impl FixtureSource {
    fn new(document: RuleDocument) -> Self {
        Self {
            document,
            fetches: AtomicUsize::new(0),
        }
    }
}

impl RuleSource for FixtureSource {
    fn describe(&self) -> String {
        "fixture".to_string()
    }

    fn fetch(&self) -> Result<RuleDocument, LoadError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.document.clone())
    }
}

#[test]
fn standard_store_resolves_every_mortgage_ownership_state() {
    let store = RuleTableStore::standard().expect("built-in table loads");

    for state in PropertyOwnershipState::ordered() {
        let rule = store
            .get(BusinessPath::Mortgage, Some(state))
            .expect("mortgage rule present");
        assert_eq!(rule.ownership_state, Some(state));
        assert!((rule.max_ltv_percent + rule.min_down_payment_percent - 100.0).abs() < 1e-9);
    }
}

#[test]
fn credit_lookup_falls_back_to_path_wide_rule() {
    let store = RuleTableStore::standard().expect("built-in table loads");

    let rule = store
        .get(BusinessPath::Credit, Some(PropertyOwnershipState::HasProperty))
        .expect("path-wide rule applies");

    assert_eq!(rule.business_path, BusinessPath::Credit);
    assert!(rule.ownership_state.is_none());
}

#[test]
fn mortgage_without_ownership_state_is_not_found() {
    let store = RuleTableStore::standard().expect("built-in table loads");

    let err = store
        .get(BusinessPath::Mortgage, None)
        .expect_err("mortgage rules are ownership specific");

    assert_eq!(
        err,
        RuleLookupError::RuleNotFound {
            business_path: BusinessPath::Mortgage,
            ownership_state: None,
        }
    );
    assert!(err.to_string().contains("mortgage"));
}

#[test]
fn rejects_has_property_rule_below_half_down_payment() {
    let mut document = standard_document();
    for rule in &mut document.rules {
        if rule.ownership_state == Some(PropertyOwnershipState::HasProperty) {
            rule.min_down_payment_percent = 40.0;
        }
    }

    let err = RuleTableSnapshot::build(document, "fixture").expect_err("policy violation");
    assert!(err.to_string().contains("at least 50%"));
}

#[test]
fn owner_floor_applies_through_path_wide_fallback() {
    let mut document = standard_document();
    document
        .rules
        .retain(|rule| rule.business_path != BusinessPath::MortgageRefinance);
    document.rules.push(EligibilityRule {
        business_path: BusinessPath::MortgageRefinance,
        ownership_state: None,
        max_ltv_percent: 80.0,
        min_down_payment_percent: 20.0,
        max_dti_percent: 42.0,
        min_monthly_income: 5_000.0,
    });

    let err = RuleTableSnapshot::build(document.clone(), "fixture")
        .expect_err("owners would fall back to 20% down");
    assert!(err.to_string().contains("mortgage_refinance"), "{err}");

    document.rules.push(EligibilityRule {
        business_path: BusinessPath::MortgageRefinance,
        ownership_state: Some(PropertyOwnershipState::HasProperty),
        max_ltv_percent: 50.0,
        min_down_payment_percent: 50.0,
        max_dti_percent: 42.0,
        min_monthly_income: 5_000.0,
    });
    let snapshot = RuleTableSnapshot::build(document, "fixture").expect("owner rule overrides");
    let owner = snapshot
        .rule(
            BusinessPath::MortgageRefinance,
            Some(PropertyOwnershipState::HasProperty),
        )
        .expect("owner rule");
    assert_eq!(owner.min_down_payment_percent, 50.0);
    let buyer = snapshot
        .rule(
            BusinessPath::MortgageRefinance,
            Some(PropertyOwnershipState::NoProperty),
        )
        .expect("path-wide rule");
    assert_eq!(buyer.min_down_payment_percent, 20.0);
}

#[test]
fn standard_refinance_rules_are_keyed_by_ownership() {
    let store = RuleTableStore::standard().expect("built-in table loads");

    for state in PropertyOwnershipState::ordered() {
        let rule = store
            .get(BusinessPath::MortgageRefinance, Some(state))
            .expect("refinance rule present");
        assert_eq!(rule.ownership_state, Some(state));
    }
}

#[test]
fn rejects_out_of_range_percentages_and_duplicates() {
    let mut document = standard_document();
    document.rules[0].max_dti_percent = 120.0;
    assert!(matches!(
        RuleTableSnapshot::build(document, "fixture"),
        Err(LoadError::Invalid(_))
    ));

    let mut document = standard_document();
    let duplicate = document.rules[0].clone();
    document.rules.push(duplicate);
    let err = RuleTableSnapshot::build(document, "fixture").expect_err("duplicate rule");
    assert!(err.to_string().contains("duplicate"));
}

#[test]
fn rejects_ownership_state_on_credit_rules() {
    let mut document = standard_document();
    document.rules.push(EligibilityRule {
        business_path: BusinessPath::Credit,
        ownership_state: Some(PropertyOwnershipState::NoProperty),
        max_ltv_percent: 90.0,
        min_down_payment_percent: 10.0,
        max_dti_percent: 40.0,
        min_monthly_income: 0.0,
    });

    let err = RuleTableSnapshot::build(document, "fixture").expect_err("credit is path-wide");
    assert!(err.to_string().contains("mortgage paths"));
}

#[test]
fn rejects_rules_without_standards() {
    let mut document = standard_document();
    document
        .standards
        .retain(|entry| entry.business_path != BusinessPath::CreditRefinance);

    let err = RuleTableSnapshot::build(document, "fixture").expect_err("standards missing");
    assert!(err.to_string().contains("credit_refinance"));
}

#[test]
fn reload_swaps_snapshot_and_bumps_version() {
    let store = RuleTableStore::standard().expect("built-in table loads");
    let before = store.snapshot();

    let mut document = standard_document();
    for rule in &mut document.rules {
        if rule.business_path == BusinessPath::Credit {
            rule.max_dti_percent = 38.0;
        }
    }
    let source = FixtureSource::new(document);

    let version = store.reload(&source).expect("reload succeeds");

    assert_eq!(version, before.version() + 1);
    assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    let credit = store
        .get(BusinessPath::Credit, None)
        .expect("credit rule present");
    assert_eq!(credit.max_dti_percent, 38.0);

    // Readers holding the old snapshot keep a consistent view.
    let old_credit = before
        .rule(BusinessPath::Credit, None)
        .expect("old credit rule");
    assert_eq!(old_credit.max_dti_percent, 42.0);
}

#[test]
fn failed_reload_keeps_previous_snapshot() {
    let store = RuleTableStore::standard().expect("built-in table loads");
    let source = FixtureSource::new(RuleDocument::default());

    let err = store.reload(&source).expect_err("empty table rejected");

    assert!(matches!(err, LoadError::Invalid(_)));
    assert_eq!(store.snapshot().version(), 1);
    assert!(store
        .get(BusinessPath::Mortgage, Some(PropertyOwnershipState::NoProperty))
        .is_ok());
}

#[test]
fn concurrent_readers_never_observe_partial_tables() {
    let store = std::sync::Arc::new(RuleTableStore::standard().expect("built-in table loads"));
    let mut handles = Vec::new();

    for worker in 0..4 {
        let store = store.clone();
        handles.push(std::thread::spawn(move || {
            for iteration in 0..200 {
                if worker == 0 && iteration % 20 == 0 {
                    let source = FixtureSource::new(standard_document());
                    store.reload(&source).expect("reload succeeds");
                }
                let snapshot = store.snapshot();
                assert_eq!(snapshot.rules().count(), standard_rules().len());
            }
        }));
    }

    for handle in handles {
        handle.join().expect("reader thread completes");
    }
    assert_eq!(store.snapshot().version(), 11);
}
