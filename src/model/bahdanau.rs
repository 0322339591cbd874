use super::{embedding, initial_state, DateTranslator, Encoder, ModelConfig, ModelKind, Output};
use crate::attention::{encoder_mask, BahdanauAttention};
use tch::{nn, nn::RNN, Device, Tensor};

/// Decoder unrolled one step at a time: the previous hidden state queries
/// the encoder, and the resulting context is fed into the next LSTM step
/// together with the embedded previous character.
#[derive(Debug)]
pub struct BahdanauModel {
    encoder: Encoder,
    embedding: nn::Embedding,
    attention: BahdanauAttention,
    cell: nn::LSTM,
    generator: nn::Linear,
    device: Device,
}

impl BahdanauModel {
    pub fn new(p: &nn::Path, config: &ModelConfig) -> Self {
        let units = config.lstm_units;
        Self {
            encoder: Encoder::new(&(p / "encoder"), config),
            embedding: embedding(
                p / "decoder_embedding",
                config.output_vocab_size,
                config.embedding_dims,
            ),
            attention: BahdanauAttention::new(&(p / "attention"), units, units, units),
            cell: nn::lstm(
                p / "decoder_cell",
                units + config.embedding_dims,
                units,
                Default::default(),
            ),
            generator: nn::linear(
                p / "generator",
                2 * units,
                config.output_vocab_size,
                Default::default(),
            ),
            device: p.device(),
        }
    }
}

impl DateTranslator for BahdanauModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Bahdanau
    }

    fn device(&self) -> Device {
        self.device
    }

    fn forward(&self, encoder_input: &Tensor, decoder_input: &Tensor) -> Output {
        let (encoder_outputs, summary) = self.encoder.forward(encoder_input);
        let mask = encoder_mask(encoder_input);
        let embedded = decoder_input.apply(&self.embedding);

        let steps = decoder_input.size()[1];
        let mut state = initial_state(&summary);
        let mut per_step_outputs = Vec::with_capacity(steps as usize);
        let mut per_step_weights = Vec::with_capacity(steps as usize);

        for t in 0..steps {
            let query = state.h().squeeze_dim(0);
            let (context, weights) = self.attention.forward(&query, &encoder_outputs, &mask);

            let step_input = Tensor::cat(&[&context, &embedded.select(1, t)], -1);
            state = self.cell.step(&step_input, &state);

            per_step_outputs.push(Tensor::cat(&[state.h().squeeze_dim(0), context], -1));
            per_step_weights.push(weights);
        }

        Output {
            logits: Tensor::stack(&per_step_outputs, 1).apply(&self.generator),
            attention: Some(Tensor::stack(&per_step_weights, 1)),
        }
    }
}
