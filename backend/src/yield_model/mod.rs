pub mod features;
pub mod model;

use serde_json::{Map, Value};
use std::sync::Arc;

use crate::config::ModelConfig;
use features::{encode_record, FeatureError, FeatureSchema};
use model::{ModelError, RegressionModel, Regressor};

#[derive(Debug, thiserror::Error)]
pub enum PredictionError {
    #[error(transparent)]
    Feature(#[from] FeatureError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("Model expects {model} features but schema lists {schema}")]
    SchemaMismatch { model: usize, schema: usize },
}

/// Loaded once at startup and shared read-only between workers.
#[derive(Clone)]
pub struct YieldPredictor {
    schema: Arc<FeatureSchema>,
    regressor: Arc<dyn Regressor>,
}

impl YieldPredictor {
    pub fn new(
        schema: FeatureSchema,
        regressor: Arc<dyn Regressor>,
    ) -> Result<Self, PredictionError> {
        if regressor.n_features() != schema.len() {
            return Err(PredictionError::SchemaMismatch {
                model: regressor.n_features(),
                schema: schema.len(),
            });
        }
        Ok(Self {
            schema: Arc::new(schema),
            regressor,
        })
    }

    pub fn load(config: &ModelConfig) -> Result<Self, PredictionError> {
        let schema = FeatureSchema::load(&config.features_path)?;
        log::info!(
            "Loaded feature schema with {} columns from {}",
            schema.len(),
            config.features_path.display()
        );
        let model = RegressionModel::load(&config.model_path)?;
        Self::new(schema, Arc::new(model))
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn predict(&self, record: &Map<String, Value>) -> Result<f64, PredictionError> {
        let encoded = encode_record(record)?;
        let row = self.schema.align(&encoded);
        let prediction = self.regressor.predict(row.values().view())?;
        Ok(prediction)
    }
}
