//! Encoder/decoder models translating date strings to ISO dates.
//!
//! Every model takes two `Int64` inputs, encoder indices `[b, INPUT_LENGTH]`
//! and teacher-forced decoder indices `[b, OUTPUT_LENGTH]`, and returns
//! logits over the output vocabulary for each output position.

mod bahdanau;
mod luong;
mod seq2seq;

pub use bahdanau::BahdanauModel;
pub use luong::LuongModel;
pub use seq2seq::Seq2SeqModel;

use crate::attention::Alignment;
use crate::error::Error;
use crate::vocab::{self, PAD_CODE};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tch::{nn, nn::RNN, Device, Kind, Tensor};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum ModelKind {
    /// Plain LSTM encoder/decoder
    #[value(name = "seq2seq")]
    Seq2Seq,
    /// Luong (multiplicative) attention
    #[default]
    Luong,
    /// Bahdanau (additive) attention with a step-unrolled decoder
    Bahdanau,
}

impl FromStr for ModelKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "seq2seq" => Ok(Self::Seq2Seq),
            "luong" => Ok(Self::Luong),
            "bahdanau" => Ok(Self::Bahdanau),
            _ => Err(Error::UnknownModel(s.to_string())),
        }
    }
}

impl TryFrom<String> for ModelKind {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Seq2Seq => "seq2seq",
            Self::Luong => "luong",
            Self::Bahdanau => "bahdanau",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModelConfig {
    pub kind: ModelKind,
    /// Only read by the Luong model.
    pub alignment: Alignment,
    pub embedding_dims: i64,
    pub lstm_units: i64,
    pub input_vocab_size: i64,
    pub output_vocab_size: i64,
    pub input_length: i64,
    pub output_length: i64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            kind: ModelKind::default(),
            alignment: Alignment::default(),
            embedding_dims: 64,
            lstm_units: 64,
            input_vocab_size: vocab::input_vocab_size() as i64,
            output_vocab_size: vocab::output_vocab_size() as i64,
            input_length: vocab::INPUT_LENGTH as i64,
            output_length: vocab::OUTPUT_LENGTH as i64,
        }
    }
}

impl ModelConfig {
    /// Vocabulary sizes and sequence lengths must match the `vocab` module,
    /// layer sizes must be positive.
    pub fn validate(&self) -> crate::Result<()> {
        let fixed = [
            ("inputVocabSize", self.input_vocab_size, vocab::input_vocab_size()),
            ("outputVocabSize", self.output_vocab_size, vocab::output_vocab_size()),
            ("inputLength", self.input_length, vocab::INPUT_LENGTH),
            ("outputLength", self.output_length, vocab::OUTPUT_LENGTH),
        ];
        for (field, value, expected) in fixed {
            let expected = expected as i64;
            if value != expected {
                return Err(Error::ModelFieldMismatch {
                    field,
                    value,
                    expected,
                });
            }
        }
        for (field, value) in [
            ("embeddingDims", self.embedding_dims),
            ("lstmUnits", self.lstm_units),
        ] {
            if value <= 0 {
                return Err(Error::NonPositiveDim { field, value });
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct Output {
    /// `[b, output_length, output_vocab_size]`
    pub logits: Tensor,
    /// `[b, output_length, input_length]`, absent for models without attention
    pub attention: Option<Tensor>,
}

pub trait DateTranslator: fmt::Debug {
    fn kind(&self) -> ModelKind;

    fn device(&self) -> Device;

    fn forward(&self, encoder_input: &Tensor, decoder_input: &Tensor) -> Output;

    /// Per-position probability distribution over the output vocabulary.
    fn predict(&self, encoder_input: &Tensor, decoder_input: &Tensor) -> Tensor {
        self.forward(encoder_input, decoder_input)
            .logits
            .softmax(-1, Kind::Float)
    }
}

/// Builds the model described by `config` under `p`.
pub fn build(p: &nn::Path, config: &ModelConfig) -> Box<dyn DateTranslator> {
    info!(kind = %config.kind, alignment = %config.alignment, "Loaded model builder");
    match config.kind {
        ModelKind::Seq2Seq => Box::new(Seq2SeqModel::new(p, config)),
        ModelKind::Luong => Box::new(LuongModel::new(p, config)),
        ModelKind::Bahdanau => Box::new(BahdanauModel::new(p, config)),
    }
}

fn embedding(p: nn::Path, vocab_size: i64, dims: i64) -> nn::Embedding {
    let config = nn::EmbeddingConfig {
        padding_idx: PAD_CODE,
        ..Default::default()
    };
    nn::embedding(p, vocab_size, dims, config)
}

/// Gathers the output at the last non-padding position of each row.
/// Inputs are padded at the end, so that is the state an LSTM skipping the
/// padding would have finished in. All-padding rows fall back to position 0.
pub fn last_valid_timestep(outputs: &Tensor, encoder_input: &Tensor) -> Tensor {
    let lengths = encoder_input
        .ne(PAD_CODE)
        .sum_dim_intlist(-1, false, Kind::Int64);
    let last = (lengths - 1).clamp_min(0);
    let hidden = outputs.size()[2];
    let index = last.view([-1, 1, 1]).expand([-1, 1, hidden], false);
    outputs.gather(1, &index, false).squeeze_dim(1)
}

/// Embedding followed by a single LSTM layer over the padded input.
#[derive(Debug)]
pub struct Encoder {
    embedding: nn::Embedding,
    lstm: nn::LSTM,
}

impl Encoder {
    pub fn new(p: &nn::Path, config: &ModelConfig) -> Self {
        Self {
            embedding: embedding(p / "embedding", config.input_vocab_size, config.embedding_dims),
            lstm: nn::lstm(
                p / "lstm",
                config.embedding_dims,
                config.lstm_units,
                Default::default(),
            ),
        }
    }

    /// Returns every encoder output `[b, T_in, H]` and the last valid one
    /// `[b, H]`.
    pub fn forward(&self, encoder_input: &Tensor) -> (Tensor, Tensor) {
        let embedded = encoder_input.apply(&self.embedding);
        let (outputs, _) = self.lstm.seq(&embedded);
        let last = last_valid_timestep(&outputs, encoder_input);
        (outputs, last)
    }
}

/// Decoder initial state: the encoder summary as both `h0` and `c0`.
fn initial_state(summary: &Tensor) -> nn::LSTMState {
    let h = summary.unsqueeze(0);
    nn::LSTMState((h.shallow_clone(), h))
}
