//! Greedy decoding with a trained model.

use crate::date::DateTuple;
use crate::error::{Error, Result};
use crate::formats::{to_iso, DateFormat, INPUT_FORMATS};
use crate::model::DateTranslator;
use crate::vocab::{self, OUTPUT_LENGTH, PAD_CODE, START_CODE};
use serde::Serialize;
use tch::Tensor;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Translation {
    pub output: String,
    /// `OUTPUT_LENGTH x INPUT_LENGTH` weights from the final decoding pass.
    pub attention: Option<Vec<Vec<f32>>>,
}

struct Decoded {
    codes: Vec<Vec<i64>>,
    attention: Option<Tensor>,
}

/// Feeds the model its own argmax predictions one position at a time.
///
/// Position 0 of the decoder input is `START_CODE`. At step `i` the model
/// runs on the partial input and the prediction for position `i - 1` is
/// written to position `i`. A final pass yields the last character.
fn greedy_decode<S: AsRef<str>>(model: &dyn DateTranslator, inputs: &[S]) -> Result<Decoded> {
    let device = model.device();
    let encoder_input = vocab::encode_input_batch(inputs, device)?;
    let rows = inputs.len();

    tch::no_grad(|| {
        let mut decoder = vec![vec![PAD_CODE; OUTPUT_LENGTH]; rows];
        for row in &mut decoder {
            row[0] = START_CODE;
        }

        let to_tensor = |decoder: &[Vec<i64>]| {
            let flat: Vec<i64> = decoder.concat();
            Tensor::from_slice(&flat)
                .view([rows as i64, OUTPUT_LENGTH as i64])
                .to_device(device)
        };

        for i in 1..OUTPUT_LENGTH {
            let predicted = model
                .forward(&encoder_input, &to_tensor(&decoder))
                .logits
                .argmax(2, false);
            for (r, row) in decoder.iter_mut().enumerate() {
                row[i] = predicted.int64_value(&[r as i64, i as i64 - 1]);
            }
        }

        let last = model.forward(&encoder_input, &to_tensor(&decoder));
        let predicted = last.logits.argmax(2, false);
        let codes = decoder
            .iter()
            .enumerate()
            .map(|(r, row)| {
                let mut codes = row[1..].to_vec();
                codes.push(predicted.int64_value(&[r as i64, OUTPUT_LENGTH as i64 - 1]));
                codes
            })
            .collect();

        Ok(Decoded {
            codes,
            attention: last.attention,
        })
    })
}

fn codes_to_string(codes: &[i64]) -> Result<String> {
    codes.iter().map(|&code| vocab::output_char(code)).collect()
}

fn attention_rows(attention: &Tensor, row: i64) -> Vec<Vec<f32>> {
    let size = attention.size();
    (0..size[1])
        .map(|t| {
            (0..size[2])
                .map(|s| attention.double_value(&[row, t, s]) as f32)
                .collect()
        })
        .collect()
}

/// Translates one date string. The output always has `OUTPUT_LENGTH`
/// characters, padding and start markers included if the model emits them.
pub fn translate(
    model: &dyn DateTranslator,
    input: &str,
    with_attention: bool,
) -> Result<Translation> {
    let decoded = greedy_decode(model, &[input])?;
    let output = codes_to_string(&decoded.codes[0])?;
    let attention = match (with_attention, decoded.attention) {
        (true, Some(attention)) => Some(attention_rows(&attention, 0)),
        _ => None,
    };
    debug!(input, output = %output, "translated");
    Ok(Translation { output, attention })
}

pub fn translate_batch<S: AsRef<str>>(
    model: &dyn DateTranslator,
    inputs: &[S],
) -> Result<Vec<String>> {
    if inputs.is_empty() {
        return Ok(Vec::new());
    }
    greedy_decode(model, inputs)?
        .codes
        .iter()
        .map(|codes| codes_to_string(codes))
        .collect()
}

/// Exact-match accuracy of the greedy translations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Accuracy {
    pub per_format: Vec<(DateFormat, f64)>,
    pub overall: f64,
}

/// Translates every date in every input format and compares against the
/// ISO rendering.
pub fn evaluate(model: &dyn DateTranslator, dates: &[DateTuple]) -> Result<Accuracy> {
    if dates.is_empty() {
        return Err(Error::EmptyDataset);
    }
    let expected: Vec<String> = dates.iter().map(|&date| to_iso(date)).collect();

    let mut per_format = Vec::with_capacity(INPUT_FORMATS.len());
    let mut correct_total = 0usize;
    for format in INPUT_FORMATS {
        let inputs: Vec<String> = dates.iter().map(|&date| format.render(date)).collect();
        let outputs = translate_batch(model, &inputs)?;
        let correct = outputs
            .iter()
            .zip(&expected)
            .filter(|(got, want)| got == want)
            .count();
        correct_total += correct;
        per_format.push((format, correct as f64 / dates.len() as f64));
    }

    Ok(Accuracy {
        per_format,
        overall: correct_total as f64 / (dates.len() * INPUT_FORMATS.len()) as f64,
    })
}
