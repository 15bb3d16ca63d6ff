use clap::Args;
use loan_engine::eligibility::{EligibilityRequest, EligibilityResolver};
use loan_engine::error::AppError;
use loan_engine::refinance::{RefinanceComparator, RefinanceScenario};
use loan_engine::rules::{BusinessPath, PropertyOwnershipState, RuleTableStore};
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Property value used for the purchase example
    #[arg(long, default_value_t = 1_500_000.0)]
    pub(crate) property_value: f64,
    /// Ownership state for the purchase example
    #[arg(long, value_parser = crate::infra::parse_ownership, default_value = "no_property")]
    pub(crate) ownership: PropertyOwnershipState,
    /// Borrower's net monthly income
    #[arg(long, default_value_t = 32_000.0)]
    pub(crate) monthly_income: f64,
    /// Skip the refinance comparison portion of the demo
    #[arg(long)]
    pub(crate) skip_refinance: bool,
}

impl Default for DemoArgs {
    fn default() -> Self {
        Self {
            property_value: 1_500_000.0,
            ownership: PropertyOwnershipState::NoProperty,
            monthly_income: 32_000.0,
            skip_refinance: false,
        }
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        property_value,
        ownership,
        monthly_income,
        skip_refinance,
    } = args;

    let store = Arc::new(RuleTableStore::standard()?);
    let resolver = EligibilityResolver::new(Arc::clone(&store));

    println!("Loan engine demo (built-in policy v{})", store.snapshot().version());
    println!("\nPurchase limits for {ownership} at {property_value:.0}");
    for state in PropertyOwnershipState::ordered() {
        match resolver.down_payment_requirement(BusinessPath::Mortgage, Some(state), property_value)
        {
            Ok(requirement) => println!(
                "- {}: max loan {:.0} | min down payment {:.0} ({}%)",
                state,
                requirement.max_loan,
                requirement.min_down_payment,
                requirement.min_down_payment_percent
            ),
            Err(err) => println!("- {}: {}", state, err),
        }
    }

    for share in [0.6, 0.8] {
        let request = EligibilityRequest {
            business_path: BusinessPath::Mortgage,
            ownership_state: Some(ownership),
            property_value,
            requested_amount: property_value * share,
            monthly_income,
            monthly_obligations: 2_500.0,
            term_months: None,
        };
        println!("\nRequesting {:.0} ({:.0}% of value)", request.requested_amount, share * 100.0);
        match resolver.resolve(&request) {
            Ok(result) => {
                println!(
                    "  Eligible: {} | DTI {:.2}% (stress {:.2}%) | payment {:.2}",
                    if result.eligible { "yes" } else { "no" },
                    result.dti,
                    result.stress_test_dti,
                    result.estimated_monthly_payment
                );
                for reason in &result.rejection_reasons {
                    println!("  - {}", reason);
                }
            }
            Err(err) => println!("  Eligibility unavailable: {}", err),
        }
    }

    if skip_refinance {
        return Ok(());
    }

    println!("\nRefinance comparison");
    let comparator = RefinanceComparator::new(store);
    let scenario = RefinanceScenario {
        business_path: BusinessPath::MortgageRefinance,
        current_balance: 800_000.0,
        current_rate: 6.5,
        current_remaining_term_months: 300,
        current_monthly_payment: None,
        new_rate: 4.5,
        new_term_months: 300,
        closing_costs: 15_000.0,
        cash_out_amount: None,
        property_value: None,
    };
    match comparator.compare(&scenario) {
        Ok(result) => {
            println!(
                "- payment {:.2} -> {:.2} | saves {:.2}/month ({:.2}%)",
                result.current_payment,
                result.new_payment,
                result.monthly_savings,
                result.savings_percent
            );
            match result.break_even_months {
                Some(months) => println!(
                    "- closing costs recovered after {:.1} months (policy: {} months, {})",
                    months,
                    result.max_break_even_months,
                    if result.break_even_within_policy {
                        "within"
                    } else {
                        "outside"
                    }
                ),
                None => println!("- the new loan never recovers its closing costs"),
            }
            if let Some(total) = result.total_savings {
                println!("- lifetime savings net of closing costs: {:.2}", total);
            }
        }
        Err(err) => println!("  Comparison unavailable: {}", err),
    }

    Ok(())
}
