pub mod config;
pub mod dropdowns;
pub mod eligibility;
pub mod error;
pub mod finance;
pub mod refinance;
pub mod router;
pub mod rules;
pub mod service;
pub mod telemetry;
pub mod validation;
pub mod wizard;

pub use router::engine_router;
pub use service::{LoanEngineService, ServiceError};
