//! Character vocabularies and the index encodings fed to the models.
//!
//! Padding is `'\n'` at index 0 in both vocabularies so an embedding with
//! `padding_idx = 0` ignores it. The output vocabulary also carries the
//! start-of-sequence marker `'\t'` at index 1.

use crate::error::{Error, Result};
use tch::{Device, Kind, Tensor};

/// Maximum length of every input format.
pub const INPUT_LENGTH: usize = 12;
/// Length of `YYYY-MM-DD`.
pub const OUTPUT_LENGTH: usize = 10;

/// Digits, punctuation, then the distinct letters of `JAN`..`DEC` in order
/// of first appearance.
pub const INPUT_VOCAB: &str = "\n0123456789/-., JANFEBMRPYULGSOCTVD";
pub const OUTPUT_VOCAB: &str = "\n\t0123456789-";

pub const PAD_CODE: i64 = 0;
pub const START_CODE: i64 = 1;

pub fn input_vocab_size() -> usize {
    INPUT_VOCAB.chars().count()
}

pub fn output_vocab_size() -> usize {
    OUTPUT_VOCAB.chars().count()
}

fn index_of(vocab: &str, ch: char, position: usize) -> Result<i64> {
    vocab
        .chars()
        .position(|c| c == ch)
        .map(|i| i as i64)
        .ok_or(Error::UnknownChar { ch, position })
}

fn char_at(vocab: &str, index: i64) -> Result<char> {
    usize::try_from(index)
        .ok()
        .and_then(|i| vocab.chars().nth(i))
        .ok_or(Error::UnknownIndex(index))
}

/// Encodes an input date string, zero padded at the end.
///
/// # Errors
/// `EmptyInput`, `InputTooLong` or `UnknownChar`.
pub fn encode_input(input: &str) -> Result<[i64; INPUT_LENGTH]> {
    if input.is_empty() {
        return Err(Error::EmptyInput);
    }
    if input.chars().count() > INPUT_LENGTH {
        return Err(Error::InputTooLong {
            input: input.to_string(),
            max: INPUT_LENGTH,
        });
    }

    let mut codes = [PAD_CODE; INPUT_LENGTH];
    for (position, ch) in input.chars().enumerate() {
        codes[position] = index_of(INPUT_VOCAB, ch, position)?;
    }
    Ok(codes)
}

/// Encodes an ISO date string.
///
/// # Errors
/// `NotIsoFormat` unless the string has exactly ten characters, then
/// `UnknownChar`.
pub fn encode_output(output: &str) -> Result<[i64; OUTPUT_LENGTH]> {
    if output.chars().count() != OUTPUT_LENGTH {
        return Err(Error::NotIsoFormat(output.to_string()));
    }

    let mut codes = [PAD_CODE; OUTPUT_LENGTH];
    for (position, ch) in output.chars().enumerate() {
        codes[position] = index_of(OUTPUT_VOCAB, ch, position)?;
    }
    Ok(codes)
}

fn decode(vocab: &str, codes: &[i64]) -> Result<String> {
    codes
        .iter()
        .filter(|&&code| code != PAD_CODE)
        .map(|&code| char_at(vocab, code))
        .collect()
}

pub fn decode_input(codes: &[i64]) -> Result<String> {
    decode(INPUT_VOCAB, codes)
}

/// Decodes output indices. Padding is dropped; the start marker is kept as
/// `'\t'` so an untrained model still yields one char per position.
pub fn decode_output(codes: &[i64]) -> Result<String> {
    decode(OUTPUT_VOCAB, codes)
}

/// Maps a single output index to its character, padding included.
pub fn output_char(code: i64) -> Result<char> {
    char_at(OUTPUT_VOCAB, code)
}

/// `[n, INPUT_LENGTH]` tensor of input indices.
pub fn encode_input_batch<S: AsRef<str>>(inputs: &[S], device: Device) -> Result<Tensor> {
    let mut flat = Vec::with_capacity(inputs.len() * INPUT_LENGTH);
    for input in inputs {
        flat.extend_from_slice(&encode_input(input.as_ref())?);
    }
    Ok(Tensor::from_slice(&flat)
        .view([inputs.len() as i64, INPUT_LENGTH as i64])
        .to_device(device))
}

/// `[n, OUTPUT_LENGTH]` tensor of output indices.
pub fn encode_output_batch<S: AsRef<str>>(outputs: &[S], device: Device) -> Result<Tensor> {
    let mut flat = Vec::with_capacity(outputs.len() * OUTPUT_LENGTH);
    for output in outputs {
        flat.extend_from_slice(&encode_output(output.as_ref())?);
    }
    Ok(Tensor::from_slice(&flat)
        .view([outputs.len() as i64, OUTPUT_LENGTH as i64])
        .to_device(device))
}

/// Teacher forcing input: `START_CODE` followed by the target minus its last
/// column.
pub fn shift_right(targets: &Tensor) -> Tensor {
    let rows = targets.size()[0];
    let start = Tensor::full([rows, 1], START_CODE, (Kind::Int64, targets.device()));
    Tensor::cat(&[start, targets.narrow(1, 0, OUTPUT_LENGTH as i64 - 1)], 1)
}

fn printable(ch: char) -> String {
    match ch {
        '\n' => "\\n".to_string(),
        '\t' => "\\t".to_string(),
        other => other.to_string(),
    }
}

/// `(index, symbol)` pairs with control characters escaped.
pub fn vocabulary_table(vocab: &str) -> Vec<(usize, String)> {
    vocab.chars().map(printable).enumerate().collect()
}
