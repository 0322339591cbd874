use super::{embedding, initial_state, DateTranslator, Encoder, ModelConfig, ModelKind, Output};
use crate::attention::{encoder_mask, LuongAttention};
use tch::{nn, nn::RNN, Device, Tensor};

/// The decoder LSTM runs over the whole teacher-forced sequence first;
/// attention is then computed for all output positions at once.
#[derive(Debug)]
pub struct LuongModel {
    encoder: Encoder,
    embedding: nn::Embedding,
    lstm: nn::LSTM,
    attention: LuongAttention,
    combine: nn::Linear,
    generator: nn::Linear,
    device: Device,
}

impl LuongModel {
    pub fn new(p: &nn::Path, config: &ModelConfig) -> Self {
        let units = config.lstm_units;
        Self {
            encoder: Encoder::new(&(p / "encoder"), config),
            embedding: embedding(
                p / "decoder_embedding",
                config.output_vocab_size,
                config.embedding_dims,
            ),
            lstm: nn::lstm(
                p / "decoder_lstm",
                config.embedding_dims,
                units,
                Default::default(),
            ),
            attention: LuongAttention::new(&(p / "attention"), config.alignment, units),
            combine: nn::linear(p / "combine", 2 * units, units, Default::default()),
            generator: nn::linear(
                p / "generator",
                units,
                config.output_vocab_size,
                Default::default(),
            ),
            device: p.device(),
        }
    }
}

impl DateTranslator for LuongModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Luong
    }

    fn device(&self) -> Device {
        self.device
    }

    fn forward(&self, encoder_input: &Tensor, decoder_input: &Tensor) -> Output {
        let (encoder_outputs, summary) = self.encoder.forward(encoder_input);
        let embedded = decoder_input.apply(&self.embedding);
        let (decoder_outputs, _) = self.lstm.seq_init(&embedded, &initial_state(&summary));

        let mask = encoder_mask(encoder_input);
        let (context, weights) = self.attention.forward(&decoder_outputs, &encoder_outputs, &mask);

        // [b, T_out, 2H] -> tanh dense [b, T_out, H] -> [b, T_out, vocab]
        let logits = Tensor::cat(&[context, decoder_outputs], -1)
            .apply(&self.combine)
            .tanh()
            .apply(&self.generator);

        Output {
            logits,
            attention: Some(weights),
        }
    }
}
