use std::sync::Arc;

use emissions_schema::ScenarioRequest;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::{
    context::{ScenarioContext, ScenarioInputs},
    engine::{ProjectionEngine, ScenarioKind},
    engine_config::{load_engine_config_from_env, EngineConfig},
    error::EmissionsError,
    reference::{load_reference_data_from_env, ReferenceData},
    results::ProjectionResult,
};

/// Shared reference snapshot plus model constants.
///
/// Cheap to clone; every run builds its own context and branches, so one
/// model serves any number of concurrent scenarios.
#[derive(Debug, Clone)]
pub struct EmissionsModel {
    reference: Arc<ReferenceData>,
    config: Arc<EngineConfig>,
}

impl EmissionsModel {
    pub fn new(reference: Arc<ReferenceData>, config: Arc<EngineConfig>) -> Self {
        Self { reference, config }
    }

    pub fn builtin() -> Self {
        Self::new(ReferenceData::builtin(), EngineConfig::builtin())
    }

    /// Honours `EMISSIONS_REFERENCE_DATA_PATH` and `EMISSIONS_ENGINE_CONFIG_PATH`.
    pub fn from_env() -> Self {
        let (reference, _) = load_reference_data_from_env();
        let (config, _) = load_engine_config_from_env();
        Self::new(reference, config)
    }

    pub fn reference(&self) -> &Arc<ReferenceData> {
        &self.reference
    }

    pub fn config(&self) -> &Arc<EngineConfig> {
        &self.config
    }

    pub fn context(&self, inputs: ScenarioInputs) -> Result<ScenarioContext, EmissionsError> {
        ScenarioContext::new(Arc::clone(&self.reference), Arc::clone(&self.config), inputs)
    }

    pub fn calculate(
        &self,
        inputs: ScenarioInputs,
        kind: ScenarioKind,
    ) -> Result<ProjectionResult, EmissionsError> {
        let context = self.context(inputs)?;
        ProjectionEngine::new(&context, kind)?.run()
    }

    pub fn run(&self, request: &ScenarioRequest) -> Result<ProjectionResult, EmissionsError> {
        request
            .validate()
            .map_err(|err| EmissionsError::configuration(err.to_string()))?;
        self.calculate(
            ScenarioInputs::from(request),
            ScenarioKind::from_spec(&request.scenario),
        )
    }

    /// Runs independent requests in parallel; results keep input order.
    pub fn run_batch(
        &self,
        requests: &[ScenarioRequest],
    ) -> Vec<Result<ProjectionResult, EmissionsError>> {
        info!(
            target: "emissions::batch",
            requests = requests.len(),
            threads = rayon::current_num_threads(),
            "batch.started"
        );
        let results: Vec<_> = requests
            .par_iter()
            .map(|request| self.run(request))
            .collect();
        let failed = results.iter().filter(|result| result.is_err()).count();
        debug!(
            target: "emissions::batch",
            requests = requests.len(),
            failed,
            "batch.finished"
        );
        results
    }
}

impl Default for EmissionsModel {
    fn default() -> Self {
        Self::builtin()
    }
}
