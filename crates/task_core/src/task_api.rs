use crate::batch::{BatchEngine, BatchRequest, Mutation, TargetSpec};
use crate::config::{self, ConfigOverrides};
use crate::error::AppError;
use crate::filter;
use crate::model::{FilterCriteria, Task};
use crate::report::BatchReport;
use crate::storage::{self, TaskGateway};
use tracing::{debug, info, warn};

/// Opens the gateway named by the config file, with `overrides` applied on
/// top. An unreadable config file falls back to defaults.
pub fn open_configured_gateway(
    overrides: &ConfigOverrides,
) -> Result<Box<dyn TaskGateway>, AppError> {
    let loaded = config::load_config_with_fallback();
    if let Some(err) = loaded.error.as_ref() {
        warn!(error = %err, "config not loaded, using defaults");
    }

    let config = config::merge_overrides(&loaded.config, overrides);
    debug!(?config, "opening task store");
    storage::open_gateway(&config)
}

/// Validates `request`, opens the configured store and runs the batch.
/// A malformed request fails before the store is touched.
pub fn run_batch(
    request: &BatchRequest,
    overrides: &ConfigOverrides,
) -> Result<BatchReport, AppError> {
    let (mutation, target) = request.clone().into_parts()?;
    let gateway = open_configured_gateway(overrides)?;
    execute(gateway.as_ref(), &mutation, &target)
}

pub fn list_matching(
    criteria: &FilterCriteria,
    overrides: &ConfigOverrides,
) -> Result<Vec<Task>, AppError> {
    let gateway = open_configured_gateway(overrides)?;
    list_matching_with_gateway(gateway.as_ref(), criteria)
}

pub fn purge_deleted(overrides: &ConfigOverrides) -> Result<usize, AppError> {
    let gateway = open_configured_gateway(overrides)?;
    purge_deleted_with_gateway(gateway.as_ref())
}

pub fn run_batch_with_gateway(
    gateway: &dyn TaskGateway,
    request: &BatchRequest,
) -> Result<BatchReport, AppError> {
    let (mutation, target) = request.clone().into_parts()?;
    execute(gateway, &mutation, &target)
}

fn execute(
    gateway: &dyn TaskGateway,
    mutation: &Mutation,
    target: &TargetSpec,
) -> Result<BatchReport, AppError> {
    let ledger = BatchEngine::new(gateway).execute_batch(mutation, target)?;
    Ok(BatchReport::from_ledger(&ledger))
}

/// Tasks a filter would target, without mutating anything.
pub fn list_matching_with_gateway(
    gateway: &dyn TaskGateway,
    criteria: &FilterCriteria,
) -> Result<Vec<Task>, AppError> {
    let candidates = gateway.get_all(criteria.status_scope())?;
    Ok(filter::select(candidates, criteria))
}

pub fn purge_deleted_with_gateway(gateway: &dyn TaskGateway) -> Result<usize, AppError> {
    let purged = gateway.purge()?;
    info!(purged, "deleted tasks purged");
    Ok(purged)
}
