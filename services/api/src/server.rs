use crate::cli::ServeArgs;
use crate::infra::{dropdown_source, rule_source, AppState};
use crate::routes::with_operational_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use loan_engine::config::AppConfig;
use loan_engine::error::AppError;
use loan_engine::rules::RuleTableStore;
use loan_engine::telemetry;
use loan_engine::LoanEngineService;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let rules = rule_source(&config.engine);
    let store = Arc::new(RuleTableStore::from_source(rules.as_ref())?);
    let content = dropdown_source(&config.engine)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        store: Arc::clone(&store),
        rules,
    };

    let service = Arc::new(LoanEngineService::new(store, content, &config.engine));

    let app = with_operational_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "loan engine ready");

    axum::serve(listener, app).await?;
    Ok(())
}
