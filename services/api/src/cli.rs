use crate::demo::{run_demo, DemoArgs};
use crate::infra::rule_source;
use crate::server;
use clap::{Args, Parser, Subcommand};
use loan_engine::config::{AppConfig, EngineConfig};
use loan_engine::error::AppError;
use loan_engine::rules::{CsvRuleSource, RuleSource, RuleTableSnapshot, RuleTableStore};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(
    name = "Loan Engine",
    about = "Serve and inspect the loan parameter and eligibility engine",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Inspect or validate an eligibility rule table
    Rules {
        #[command(subcommand)]
        command: RulesCommand,
    },
    /// Print sample eligibility and refinance answers against the active policy
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum RulesCommand {
    /// Print every rule and the per-path lending standards
    Show(RulesArgs),
    /// Load a table and report whether it would be accepted
    Validate(RulesArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct RulesArgs {
    /// Rules CSV; falls back to APP_RULE_TABLE_PATH, then the built-in policy
    #[arg(long)]
    pub(crate) rules: Option<PathBuf>,
    /// Lending standards CSV paired with --rules
    #[arg(long)]
    pub(crate) standards: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Rules {
            command: RulesCommand::Show(args),
        } => show_rules(args),
        Command::Rules {
            command: RulesCommand::Validate(args),
        } => validate_rules(args),
        Command::Demo(args) => run_demo(args),
    }
}

fn selected_source(args: RulesArgs) -> Result<Arc<dyn RuleSource>, AppError> {
    match args.rules {
        Some(rules) => Ok(Arc::new(CsvRuleSource::new(rules, args.standards))),
        None => {
            let engine: EngineConfig = AppConfig::load()?.engine;
            Ok(rule_source(&engine))
        }
    }
}

fn show_rules(args: RulesArgs) -> Result<(), AppError> {
    let source = selected_source(args)?;
    let snapshot = RuleTableStore::load(source.as_ref())?;
    render_snapshot(&snapshot);
    Ok(())
}

fn validate_rules(args: RulesArgs) -> Result<(), AppError> {
    let source = selected_source(args)?;
    let snapshot = RuleTableStore::load(source.as_ref())?;
    println!(
        "OK {}: {} rules accepted",
        snapshot.source(),
        snapshot.rules().count()
    );
    Ok(())
}

fn render_snapshot(snapshot: &RuleTableSnapshot) {
    println!("Rule table from {}", snapshot.source());
    println!(
        "{:<20} {:<18} {:>8} {:>10} {:>8} {:>12}",
        "business_path", "ownership", "max_ltv", "min_down", "max_dti", "min_income"
    );
    for rule in snapshot.rules() {
        println!(
            "{:<20} {:<18} {:>7.1}% {:>9.1}% {:>7.1}% {:>12.0}",
            rule.business_path.as_str(),
            rule.ownership_state.map(|state| state.as_str()).unwrap_or("-"),
            rule.max_ltv_percent,
            rule.min_down_payment_percent,
            rule.max_dti_percent,
            rule.min_monthly_income
        );
    }

    println!("\nLending standards");
    for path in loan_engine::rules::BusinessPath::ordered() {
        match snapshot.standards(path) {
            Ok(standards) => println!(
                "- {}: {:.2}% over {} months | stress {:.2}% | savings >= {:.1}% | cash-out LTV <= {:.0}% | break-even <= {} months",
                path,
                standards.interest_rate_percent,
                standards.term_months,
                standards.stress_rate_percent,
                standards.minimum_savings_percent,
                standards.cash_out_max_ltv_percent,
                standards.max_break_even_months
            ),
            Err(err) => println!("- {}: {}", path, err),
        }
    }
}
