use crate::dataset::DatasetConfig;
use crate::error::Result;
use crate::model::ModelConfig;
use crate::train::TrainConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Everything a training run needs. Missing sections and fields take the
/// defaults of the reference experiment: dates from 1950 to 2049, 25%
/// training and 15% validation, two epochs of batches of 128.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub dataset: DatasetConfig,
    pub train: TrainConfig,
    pub model: ModelConfig,
}

impl Config {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.dataset.validate()?;
        config.model.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}
