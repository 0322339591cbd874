use crate::dataset::{Batch, DataSet};
use crate::error::{Error, Result};
use crate::model::DateTranslator;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tch::nn::{self, OptimizerConfig};
use tch::{Kind, Tensor};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrainConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Seeds both the weight initialisation and the batch shuffling.
    pub seed: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 2,
            batch_size: 128,
            learning_rate: 1e-3,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EpochStats {
    pub epoch: usize,
    pub train_loss: f64,
    pub val_loss: Option<f64>,
    /// Fraction of output characters predicted correctly under teacher forcing.
    pub val_accuracy: Option<f64>,
}

/// Categorical cross-entropy of the logits against the target indices.
pub fn loss(model: &dyn DateTranslator, batch: &Batch) -> Tensor {
    let logits = model
        .forward(&batch.encoder_input, &batch.decoder_input)
        .logits;
    let vocab = logits.size()[2];
    logits
        .reshape([-1, vocab])
        .cross_entropy_for_logits(&batch.decoder_target.reshape([-1]))
}

fn accuracy(model: &dyn DateTranslator, batch: &Batch) -> Tensor {
    model
        .forward(&batch.encoder_input, &batch.decoder_input)
        .logits
        .argmax(-1, false)
        .eq_tensor(&batch.decoder_target)
        .to_kind(Kind::Float)
        .mean(Kind::Float)
}

/// Mean loss and per-character accuracy over `batch`, in chunks of
/// `batch_size` rows. `None` for an empty batch.
pub fn validate(
    model: &dyn DateTranslator,
    batch: &Batch,
    batch_size: usize,
) -> Option<(f64, f64)> {
    if batch.is_empty() {
        return None;
    }
    let rows = batch.len();
    let step = batch_size.max(1);
    let (mut loss_sum, mut accuracy_sum) = (0.0, 0.0);

    tch::no_grad(|| {
        for start in (0..rows).step_by(step) {
            let len = step.min(rows - start);
            let chunk = batch.narrow(start, len);
            loss_sum += loss(model, &chunk).double_value(&[]) * len as f64;
            accuracy_sum += accuracy(model, &chunk).double_value(&[]) * len as f64;
        }
    });

    Some((loss_sum / rows as f64, accuracy_sum / rows as f64))
}

/// Adam over shuffled mini-batches, validating after every epoch.
pub fn fit(
    vs: &nn::VarStore,
    model: &dyn DateTranslator,
    data: &DataSet,
    config: &TrainConfig,
) -> Result<Vec<EpochStats>> {
    if data.train.is_empty() {
        return Err(Error::EmptyDataset);
    }

    let mut optimizer = nn::Adam::default().build(vs, config.learning_rate)?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut history = Vec::with_capacity(config.epochs);

    info!(
        rows = data.train.len(),
        epochs = config.epochs,
        batch_size = config.batch_size,
        "training {}",
        model.kind()
    );

    for epoch in 1..=config.epochs {
        let mut loss_sum = 0.0;
        for (step, batch) in data
            .train
            .shuffled_chunks(config.batch_size, &mut rng)
            .into_iter()
            .enumerate()
        {
            let batch_loss = loss(model, &batch);
            optimizer.backward_step(&batch_loss);
            let value = batch_loss.double_value(&[]);
            loss_sum += value * batch.len() as f64;
            debug!(epoch, step, loss = value);
        }

        let train_loss = loss_sum / data.train.len() as f64;
        let validation = validate(model, &data.validation, config.batch_size);
        let stats = EpochStats {
            epoch,
            train_loss,
            val_loss: validation.map(|(l, _)| l),
            val_accuracy: validation.map(|(_, a)| a),
        };
        info!(
            epoch,
            train_loss,
            val_loss = ?stats.val_loss,
            val_accuracy = ?stats.val_accuracy,
            "epoch finished"
        );
        history.push(stats);
    }

    Ok(history)
}
