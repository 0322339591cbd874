use super::{embedding, initial_state, DateTranslator, Encoder, ModelConfig, ModelKind, Output};
use tch::{nn, nn::RNN, Device, Tensor};

#[derive(Debug)]
pub struct Seq2SeqModel {
    encoder: Encoder,
    embedding: nn::Embedding,
    lstm: nn::LSTM,
    generator: nn::Linear,
    device: Device,
}

impl Seq2SeqModel {
    pub fn new(p: &nn::Path, config: &ModelConfig) -> Self {
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
                config.lstm_units,
                Default::default(),
            ),
            generator: nn::linear(
                p / "generator",
                config.lstm_units,
                config.output_vocab_size,
                Default::default(),
            ),
            device: p.device(),
        }
    }
}

impl DateTranslator for Seq2SeqModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Seq2Seq
    }

    fn device(&self) -> Device {
        self.device
    }

    fn forward(&self, encoder_input: &Tensor, decoder_input: &Tensor) -> Output {
        let (_, summary) = self.encoder.forward(encoder_input);
        let embedded = decoder_input.apply(&self.embedding);
        let (decoded, _) = self.lstm.seq_init(&embedded, &initial_state(&summary));
        Output {
            logits: decoded.apply(&self.generator),
            attention: None,
        }
    }
}
