//! Attention scoring over encoder states.
//!
//! Luong: https://arxiv.org/abs/1508.04025
//! Bahdanau: https://arxiv.org/abs/1409.0473

use crate::vocab::PAD_CODE;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tch::{nn, Kind, Tensor};

/// Luong alignment score function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Alignment {
    /// `h_t . h_s`
    #[default]
    Dot,
    /// `h_t . W_a h_s`
    General,
    /// `v_a . tanh(W_a [h_t; h_s])`
    Concat,
}

impl FromStr for Alignment {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dot" => Ok(Self::Dot),
            "general" => Ok(Self::General),
            "concat" => Ok(Self::Concat),
            _ => Err(crate::Error::UnknownAlignment(s.to_string())),
        }
    }
}

impl TryFrom<String> for Alignment {
    type Error = crate::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Dot => "dot",
            Self::General => "general",
            Self::Concat => "concat",
        })
    }
}

/// `true` where the encoder input holds a real character, `[b, T_in]`.
/// A row with no characters at all keeps position 0 visible, matching
/// the summary fallback of `last_valid_timestep`.
pub fn encoder_mask(encoder_input: &Tensor) -> Tensor {
    let mask = encoder_input.ne(PAD_CODE);
    let empty = mask.sum_dim_intlist(-1, true, Kind::Int64).eq(0);
    let steps = encoder_input.size()[1];
    let first = Tensor::arange(steps, (Kind::Int64, encoder_input.device())).eq(0);
    mask.logical_or(&empty.logical_and(&first))
}

/// Softmax over the last axis. Positions where `mask` is false get zero
/// weight; `mask` must broadcast against `scores`.
pub fn masked_softmax(scores: &Tensor, mask: &Tensor) -> Tensor {
    scores
        .masked_fill(&mask.logical_not(), f64::NEG_INFINITY)
        .softmax(-1, Kind::Float)
}

#[derive(Debug)]
enum LuongScore {
    Dot,
    General {
        w_a: nn::Linear,
    },
    Concat {
        w_target: nn::Linear,
        w_source: nn::Linear,
        v_a: nn::Linear,
    },
}

/// Multiplicative attention applied to a whole decoder output sequence.
#[derive(Debug)]
pub struct LuongAttention {
    score: LuongScore,
}

impl LuongAttention {
    pub fn new(p: &nn::Path, alignment: Alignment, units: i64) -> Self {
        let score = match alignment {
            Alignment::Dot => LuongScore::Dot,
            Alignment::General => LuongScore::General {
                w_a: nn::linear(p / "w_a", units, units, Default::default()),
            },
            Alignment::Concat => LuongScore::Concat {
                w_target: nn::linear(p / "w_target", units, units, Default::default()),
                w_source: nn::linear(
                    p / "w_source",
                    units,
                    units,
                    nn::LinearConfig {
                        bias: false,
                        ..Default::default()
                    },
                ),
                v_a: nn::linear(
                    p / "v_a",
                    units,
                    1,
                    nn::LinearConfig {
                        bias: false,
                        ..Default::default()
                    },
                ),
            },
        };
        Self { score }
    }

    /// Raw alignment scores, `[b, T_out, T_in]`.
    pub fn scores(&self, decoder_outputs: &Tensor, encoder_outputs: &Tensor) -> Tensor {
        match &self.score {
            LuongScore::Dot => decoder_outputs.matmul(&encoder_outputs.transpose(1, 2)),
            LuongScore::General { w_a } => {
                decoder_outputs.matmul(&encoder_outputs.apply(w_a).transpose(1, 2))
            }
            LuongScore::Concat {
                w_target,
                w_source,
                v_a,
            } => {
                let target = decoder_outputs.apply(w_target).unsqueeze(2);
                let source = encoder_outputs.apply(w_source).unsqueeze(1);
                (target + source).tanh().apply(v_a).squeeze_dim(-1)
            }
        }
    }

    /// Returns the context vectors `[b, T_out, H]` and the attention weights
    /// `[b, T_out, T_in]`. `mask` is the `[b, T_in]` encoder mask.
    pub fn forward(
        &self,
        decoder_outputs: &Tensor,
        encoder_outputs: &Tensor,
        mask: &Tensor,
    ) -> (Tensor, Tensor) {
        let scores = self.scores(decoder_outputs, encoder_outputs);
        let weights = masked_softmax(&scores, &mask.unsqueeze(1));
        let context = weights.bmm(encoder_outputs);
        (context, weights)
    }
}

/// Additive attention queried by one decoder state at a time.
#[derive(Debug)]
pub struct BahdanauAttention {
    w1: nn::Linear,
    w2: nn::Linear,
    v: nn::Linear,
}

impl BahdanauAttention {
    pub fn new(p: &nn::Path, query_dim: i64, value_dim: i64, units: i64) -> Self {
        Self {
            w1: nn::linear(p / "w1", value_dim, units, Default::default()),
            w2: nn::linear(p / "w2", query_dim, units, Default::default()),
            v: nn::linear(p / "v", units, 1, Default::default()),
        }
    }

    /// `query` is `[b, Hq]`, `values` `[b, T_in, Hv]`, `mask` `[b, T_in]`.
    /// Returns the context vector `[b, Hv]` and the weights `[b, T_in]`.
    pub fn forward(&self, query: &Tensor, values: &Tensor, mask: &Tensor) -> (Tensor, Tensor) {
        let hidden_with_time_axis = query.apply(&self.w2).unsqueeze(1);
        let score = (values.apply(&self.w1) + hidden_with_time_axis)
            .tanh()
            .apply(&self.v)
            .squeeze_dim(-1);
        let weights = masked_softmax(&score, mask);
        let context = weights.unsqueeze(1).bmm(values).squeeze_dim(1);
        (context, weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::Device;

    fn mask_for(rows: &[&[i64]]) -> Tensor {
        let flat: Vec<i64> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        let input = Tensor::from_slice(&flat).view([rows.len() as i64, -1]);
        encoder_mask(&input)
    }

    #[test]
    fn test_masked_softmax_zeroes_padding() {
        let scores = Tensor::from_slice(&[1.0f32, 2.0, 3.0, 4.0]).view([1, 4]);
        let mask = mask_for(&[&[5, 6, 0, 0]]);
        let weights = masked_softmax(&scores, &mask);

        assert_eq!(weights.double_value(&[0, 2]), 0.0);
        assert_eq!(weights.double_value(&[0, 3]), 0.0);
        let total = weights.sum(Kind::Float).double_value(&[]);
        assert!((total - 1.0).abs() < 1e-6);
        assert!(weights.double_value(&[0, 1]) > weights.double_value(&[0, 0]));
    }

    #[test]
    fn test_all_padding_row_attends_to_first_position() {
        let scores = Tensor::from_slice(&[1.0f32, 2.0, 3.0, 4.0, 1.0, 2.0, 3.0, 4.0]).view([2, 4]);
        let short: &[i64] = &[5, 6, 0, 0];
        let blank: &[i64] = &[0, 0, 0, 0];
        let mask = mask_for(&[short, blank]);
        let visible = mask.to_kind(Kind::Int64);
        assert_eq!(visible.int64_value(&[1, 0]), 1);
        assert_eq!(visible.int64_value(&[1, 1]), 0);
        // rows with characters are untouched
        assert_eq!(visible.int64_value(&[0, 2]), 0);

        let weights = masked_softmax(&scores, &mask);
        assert_eq!(weights.isnan().sum(Kind::Int64).int64_value(&[]), 0);
        assert!((weights.double_value(&[1, 0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_alignment_parse() {
        assert_eq!("DOT".parse::<Alignment>().unwrap(), Alignment::Dot);
        assert_eq!("general".parse::<Alignment>().unwrap(), Alignment::General);
        assert!("bilinear".parse::<Alignment>().is_err());
        assert_eq!(Alignment::Concat.to_string(), "concat");
    }

    #[test]
    fn test_luong_shapes_for_every_alignment() {
        let vs = nn::VarStore::new(Device::Cpu);
        let decoder = Tensor::randn([2, 10, 8], (Kind::Float, Device::Cpu));
        let encoder = Tensor::randn([2, 12, 8], (Kind::Float, Device::Cpu));
        let full: &[i64] = &[3; 12];
        let mask = mask_for(&[full, &[3, 3, 3, 3, 3, 0, 0, 0, 0, 0, 0, 0]]);

        for (i, alignment) in [Alignment::Dot, Alignment::General, Alignment::Concat]
            .into_iter()
            .enumerate()
        {
            let attention = LuongAttention::new(&(vs.root() / i), alignment, 8);
            let (context, weights) = attention.forward(&decoder, &encoder, &mask);
            assert_eq!(context.size(), [2, 10, 8]);
            assert_eq!(weights.size(), [2, 10, 12]);

            let row_sums = weights.sum_dim_intlist(-1, false, Kind::Float);
            let max_err = (row_sums - 1.0).abs().max().double_value(&[]);
            assert!(max_err < 1e-5, "{alignment}: {max_err}");
            assert_eq!(weights.double_value(&[1, 4, 7]), 0.0);
        }
    }

    #[test]
    fn test_dot_scores_match_manual_product() {
        let vs = nn::VarStore::new(Device::Cpu);
        let attention = LuongAttention::new(&vs.root(), Alignment::Dot, 2);
        let decoder = Tensor::from_slice(&[1.0f32, 2.0]).view([1, 1, 2]);
        let encoder = Tensor::from_slice(&[3.0f32, 4.0, -1.0, 0.5]).view([1, 2, 2]);
        let scores = attention.scores(&decoder, &encoder);
        assert_eq!(scores.size(), [1, 1, 2]);
        assert!((scores.double_value(&[0, 0, 0]) - 11.0).abs() < 1e-6);
        assert!(scores.double_value(&[0, 0, 1]).abs() < 1e-6);
    }

    #[test]
    fn test_bahdanau_shapes() {
        let vs = nn::VarStore::new(Device::Cpu);
        let attention = BahdanauAttention::new(&vs.root(), 16, 8, 10);
        let query = Tensor::randn([3, 16], (Kind::Float, Device::Cpu));
        let values = Tensor::randn([3, 12, 8], (Kind::Float, Device::Cpu));
        let full: &[i64] = &[1; 12];
        let mask = mask_for(&[full, full, &[1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]]);

        let (context, weights) = attention.forward(&query, &values, &mask);
        assert_eq!(context.size(), [3, 8]);
        assert_eq!(weights.size(), [3, 12]);
        assert_eq!(weights.double_value(&[2, 2]), 0.0);

        // a single visible position gets all the weight
        let first_only: &[i64] = &[1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        let mask = mask_for(&[first_only, first_only, first_only]);
        let (context, weights) = attention.forward(&query, &values, &mask);
        assert!((weights.double_value(&[0, 0]) - 1.0).abs() < 1e-6);
        let first = values.select(1, 0);
        let diff = (context - first).abs().max().double_value(&[]);
        assert!(diff < 1e-5);
    }
}
