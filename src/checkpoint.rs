//! Saving and restoring trained models.
//!
//! A checkpoint is a directory holding the `VarStore` weights next to the
//! `ModelConfig` needed to rebuild the graph they belong to.

use crate::error::Result;
use crate::model::{build, DateTranslator, ModelConfig};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tch::{nn, Device};
use tracing::info;

pub const WEIGHTS_FILE: &str = "weights.ot";
pub const CONFIG_FILE: &str = "model.json";

pub fn save(dir: &Path, vs: &nn::VarStore, config: &ModelConfig) -> Result<()> {
    fs::create_dir_all(dir)?;
    vs.save(dir.join(WEIGHTS_FILE))?;
    let file = File::create(dir.join(CONFIG_FILE))?;
    serde_json::to_writer_pretty(BufWriter::new(file), config)?;
    info!("Saved model to {}", dir.display());
    Ok(())
}

#[derive(Debug)]
pub struct Checkpoint {
    pub vs: nn::VarStore,
    pub model: Box<dyn DateTranslator>,
    pub config: ModelConfig,
}

pub fn load(dir: &Path, device: Device) -> Result<Checkpoint> {
    let file = File::open(dir.join(CONFIG_FILE))?;
    let config: ModelConfig = serde_json::from_reader(BufReader::new(file))?;
    config.validate()?;

    let mut vs = nn::VarStore::new(device);
    let model = build(&vs.root(), &config);
    vs.load(dir.join(WEIGHTS_FILE))?;
    info!("Loaded {} model from {}", config.kind, dir.display());

    Ok(Checkpoint { vs, model, config })
}
