//! FILENAME: app/service/src/lib.rs
//! PURPOSE: Service layer entry point for the form logic engine.
//! CONTEXT: Holds the shared state the commands run against, the service
//! configuration, and the re-exports embedding callers need.

use std::path::{Path, PathBuf};

use engine::{EvalLimits, FormLogicProcessor};
use log::LevelFilter;
use serde::{Deserialize, Serialize};

pub mod api_types;
pub mod commands;
pub mod error;
pub mod logging;
pub mod store;

pub use api_types::{
    CalculateRequest, CalculateResponse, EvaluateFormRequest, ValidateExpressionRequest,
    ValidateExpressionResponse, ValidateSkipLogicRequest, ValidateSkipLogicResponse,
};
pub use commands::{
    analyze_form, calculate, evaluate_form, list_functions, list_operators, validate_expression,
    validate_skip_logic,
};
pub use error::ServiceError;
pub use logging::{init_log_file, init_logging, next_seq, write_log};
pub use store::{FormStore, InMemoryFormStore};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Service configuration. Every field is optional in JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub limits: EvalLimits,
    /// Unified log file. Console only when absent.
    pub log_file: Option<PathBuf>,
    /// `off`, `error`, `warn`, `info`, `debug` or `trace`.
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            limits: EvalLimits::default(),
            log_file: None,
            log_level: "info".to_string(),
        }
    }
}

impl ServiceConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ServiceError> {
        serde_json::from_str(json).map_err(|e| ServiceError::Config(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self, ServiceError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// The configured level. Unrecognized names fall back to `info`.
    pub fn level_filter(&self) -> LevelFilter {
        self.log_level.parse().unwrap_or(LevelFilter::Info)
    }
}

// ============================================================================
// STATE
// ============================================================================

/// State shared by every command. Immutable once built, so one instance can
/// serve concurrent requests.
#[derive(Debug, Clone, Default)]
pub struct ServiceState {
    pub limits: EvalLimits,
    pub processor: FormLogicProcessor,
}

pub fn create_service_state(config: &ServiceConfig) -> ServiceState {
    log_info!(
        "SYS",
        "Creating ServiceState max_expression_len={} max_depth={}",
        config.limits.max_expression_len,
        config.limits.max_depth
    );
    ServiceState {
        limits: config.limits.clone(),
        processor: FormLogicProcessor::with_limits(config.limits.clone()),
    }
}

/// Install logging from the configuration, then build the state.
/// A log file that cannot be opened is reported and logging stays console only.
pub fn start_service(config: &ServiceConfig) -> ServiceState {
    logging::init_logging(config.level_filter());

    if let Some(path) = &config.log_file {
        match logging::init_log_file(path) {
            Ok(path) => log_info!("SYS", "Logging to {:?}", path),
            Err(e) => log_warn!("SYS", "{}", e),
        }
    }

    create_service_state(config)
}
