//! Training data: every date rendered in all input formats.

use crate::date::{ordered_dates, DateTuple};
use crate::error::{Error, Result};
use crate::formats::{to_iso, DateFormat, INPUT_FORMATS};
use crate::vocab;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tch::{Device, Kind, Tensor};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DatasetConfig {
    pub min_year: u16,
    pub max_year: u16,
    /// Fraction of dates used for training.
    pub train_split: f64,
    /// Fraction of dates used for validation.
    pub val_split: f64,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            min_year: 1950,
            max_year: 2050,
            train_split: 0.25,
            val_split: 0.15,
        }
    }
}

impl DatasetConfig {
    pub fn validate(&self) -> Result<()> {
        let in_unit = |x: f64| (0.0..=1.0).contains(&x);
        if !in_unit(self.train_split)
            || !in_unit(self.val_split)
            || self.train_split + self.val_split > 1.0
        {
            return Err(Error::InvalidSplit {
                train: self.train_split,
                validation: self.val_split,
            });
        }
        if self.min_year >= self.max_year {
            return Err(Error::InvalidYearRange {
                min_year: self.min_year,
                max_year: self.max_year,
            });
        }
        Ok(())
    }
}

/// Model inputs and targets for a set of rows.
#[derive(Debug)]
pub struct Batch {
    /// `[rows, INPUT_LENGTH]`
    pub encoder_input: Tensor,
    /// `[rows, OUTPUT_LENGTH]`, the target shifted right behind `START_CODE`
    pub decoder_input: Tensor,
    /// `[rows, OUTPUT_LENGTH]` class indices
    pub decoder_target: Tensor,
}

impl Batch {
    /// Renders each date in every input format. Rows are format-major: all
    /// dates in the first format, then all dates in the second, and so on.
    pub fn from_dates(dates: &[DateTuple], device: Device) -> Result<Self> {
        let inputs: Vec<String> = INPUT_FORMATS
            .iter()
            .flat_map(|format| dates.iter().map(move |&date| format.render(date)))
            .collect();
        let targets: Vec<String> = dates.iter().map(|&date| to_iso(date)).collect();

        let encoder_input = vocab::encode_input_batch(&inputs, device)?;
        let target = vocab::encode_output_batch(&targets, device)?;
        let copies = INPUT_FORMATS.len() as i64;

        Ok(Self {
            encoder_input,
            decoder_input: vocab::shift_right(&target).repeat([copies, 1]),
            decoder_target: target.repeat([copies, 1]),
        })
    }

    pub fn len(&self) -> usize {
        self.encoder_input.size()[0] as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn device(&self) -> Device {
        self.encoder_input.device()
    }

    /// Selects the given rows.
    pub fn select(&self, rows: &Tensor) -> Self {
        Self {
            encoder_input: self.encoder_input.index_select(0, rows),
            decoder_input: self.decoder_input.index_select(0, rows),
            decoder_target: self.decoder_target.index_select(0, rows),
        }
    }

    /// `len` consecutive rows starting at `start`.
    pub fn narrow(&self, start: usize, len: usize) -> Self {
        let (start, len) = (start as i64, len as i64);
        Self {
            encoder_input: self.encoder_input.narrow(0, start, len),
            decoder_input: self.decoder_input.narrow(0, start, len),
            decoder_target: self.decoder_target.narrow(0, start, len),
        }
    }

    /// Mini-batches of at most `batch_size` rows in a random order.
    pub fn shuffled_chunks<R: Rng + ?Sized>(&self, batch_size: usize, rng: &mut R) -> Vec<Self> {
        let mut order: Vec<i64> = (0..self.len() as i64).collect();
        order.shuffle(rng);
        order
            .chunks(batch_size.max(1))
            .map(|rows| self.select(&Tensor::from_slice(rows).to_device(self.device())))
            .collect()
    }
}

#[derive(Debug)]
pub struct DataSet {
    pub train: Batch,
    pub validation: Batch,
    pub test_dates: Vec<DateTuple>,
}

/// Shuffles the dates of the configured years and splits them.
pub fn generate<R: Rng + ?Sized>(
    config: &DatasetConfig,
    rng: &mut R,
    device: Device,
) -> Result<DataSet> {
    config.validate()?;
    let mut dates = ordered_dates(config.min_year, config.max_year)?;
    dates.shuffle(rng);

    let num_train = (dates.len() as f64 * config.train_split).floor() as usize;
    let num_validation = (dates.len() as f64 * config.val_split).floor() as usize;
    info!("Number of dates used for training: {num_train}");
    info!("Number of dates used for validation: {num_validation}");
    info!(
        "Number of dates used for testing: {}",
        dates.len() - num_train - num_validation
    );

    let test_dates = dates.split_off(num_train + num_validation);
    let validation_dates = dates.split_off(num_train);

    Ok(DataSet {
        train: Batch::from_dates(&dates, device)?,
        validation: Batch::from_dates(&validation_dates, device)?,
        test_dates,
    })
}

/// One input/target example.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pair {
    pub input: String,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatPairs {
    pub format: String,
    pub pairs: Vec<Pair>,
}

/// Every date in every format next to its ISO target, grouped by format.
pub fn export_pairs(dates: &[DateTuple]) -> Vec<FormatPairs> {
    INPUT_FORMATS
        .iter()
        .map(|&format: &DateFormat| FormatPairs {
            format: format.pattern().to_string(),
            pairs: dates
                .iter()
                .map(|&date| Pair {
                    input: format.render(date),
                    output: to_iso(date),
                })
                .collect(),
        })
        .collect()
}

pub fn write_pairs(path: &Path, dates: &[DateTuple]) -> Result<()> {
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), &export_pairs(dates))?;
    info!("Wrote {} dates to {}", dates.len(), path.display());
    Ok(())
}

/// One-hot view of class indices, `[rows, OUTPUT_LENGTH, vocab]`.
pub fn one_hot_targets(targets: &Tensor) -> Tensor {
    targets
        .one_hot(vocab::output_vocab_size() as i64)
        .to_kind(Kind::Float)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab::{INPUT_LENGTH, OUTPUT_LENGTH, START_CODE};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn small_config() -> DatasetConfig {
        DatasetConfig {
            min_year: 2049,
            max_year: 2050,
            train_split: 0.25,
            val_split: 0.15,
        }
    }

    #[test]
    fn test_generate_shapes() {
        let mut rng = StdRng::seed_from_u64(1);
        let data = generate(&small_config(), &mut rng, Device::Cpu).unwrap();

        // 365 dates: 91 train, 54 validation, 220 test
        assert_eq!(data.train.len(), 91 * 20);
        assert_eq!(data.validation.len(), 54 * 20);
        assert_eq!(data.test_dates.len(), 220);

        assert_eq!(data.train.encoder_input.size(), [1820, INPUT_LENGTH as i64]);
        assert_eq!(data.train.decoder_input.size(), [1820, OUTPUT_LENGTH as i64]);
        assert_eq!(data.train.decoder_target.size(), [1820, OUTPUT_LENGTH as i64]);
    }

    #[test]
    fn test_rows_are_format_major() {
        let dates = [
            DateTuple::new(2019, 1, 20).unwrap(),
            DateTuple::new(2020, 2, 29).unwrap(),
        ];
        let batch = Batch::from_dates(&dates, Device::Cpu).unwrap();
        assert_eq!(batch.len(), 40);

        let row = |t: &Tensor, r: i64, n: i64| -> Vec<i64> {
            (0..n).map(|j| t.int64_value(&[r, j])).collect()
        };
        let input_of = |r| vocab::decode_input(&row(&batch.encoder_input, r, 12)).unwrap();
        let target_of = |r| vocab::decode_output(&row(&batch.decoder_target, r, 10)).unwrap();

        assert_eq!(input_of(0), "20JAN2019");
        assert_eq!(input_of(1), "29FEB2020");
        assert_eq!(input_of(2), "012019");
        assert_eq!(target_of(0), "2019-01-20");
        assert_eq!(target_of(1), "2020-02-29");
        assert_eq!(target_of(39), "2020-02-29");
        assert_eq!(batch.decoder_input.int64_value(&[5, 0]), START_CODE);
        assert_eq!(
            batch.decoder_input.int64_value(&[5, 1]),
            batch.decoder_target.int64_value(&[5, 0])
        );
    }

    #[test]
    fn test_splits_are_disjoint() {
        let mut rng = StdRng::seed_from_u64(3);
        let config = DatasetConfig {
            train_split: 0.5,
            val_split: 0.5,
            ..small_config()
        };
        let data = generate(&config, &mut rng, Device::Cpu).unwrap();
        assert_eq!(data.train.len() + data.validation.len(), 364 * 20);
        assert_eq!(data.test_dates.len(), 1);
    }

    #[test]
    fn test_invalid_config() {
        let mut rng = StdRng::seed_from_u64(0);
        let config = DatasetConfig {
            train_split: 0.8,
            val_split: 0.3,
            ..small_config()
        };
        assert!(matches!(
            generate(&config, &mut rng, Device::Cpu),
            Err(Error::InvalidSplit { .. })
        ));

        let config = DatasetConfig {
            min_year: 2050,
            max_year: 2049,
            ..small_config()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidYearRange { .. })
        ));
    }

    #[test]
    fn test_shuffled_chunks_cover_all_rows() {
        let dates = [DateTuple::new(2019, 1, 20).unwrap()];
        let batch = Batch::from_dates(&dates, Device::Cpu).unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        let chunks = batch.shuffled_chunks(8, &mut rng);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.iter().map(Batch::len).sum::<usize>(), 20);
        assert_eq!(chunks[2].len(), 4);
    }

    #[test]
    fn test_export_pairs() {
        let dates = [DateTuple::new(2019, 10, 1).unwrap()];
        let groups = export_pairs(&dates);
        assert_eq!(groups.len(), 20);
        assert_eq!(groups[3].format, "MM/DD/YYYY");
        assert_eq!(
            groups[3].pairs[0],
            Pair {
                input: "10/01/2019".to_string(),
                output: "2019-10-01".to_string(),
            }
        );
    }

    #[test]
    fn test_write_pairs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let dates = [DateTuple::new(2019, 10, 1).unwrap()];
        write_pairs(&path, &dates).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let back: Vec<FormatPairs> = serde_json::from_str(&text).unwrap();
        assert_eq!(back, export_pairs(&dates));
    }

    #[test]
    fn test_one_hot_targets() {
        let batch = Batch::from_dates(&[DateTuple::new(2019, 1, 20).unwrap()], Device::Cpu).unwrap();
        let one_hot = one_hot_targets(&batch.decoder_target);
        assert_eq!(one_hot.size(), [20, 10, 13]);
        assert_eq!(one_hot.sum(Kind::Float).double_value(&[]), 200.0);
    }

    #[test]
    fn test_config_serde_uses_camel_case() {
        let config: DatasetConfig =
            serde_json::from_str(r#"{"minYear": 2000, "maxYear": 2010}"#).unwrap();
        assert_eq!(config.min_year, 2000);
        assert_eq!(config.train_split, 0.25);
    }
}
