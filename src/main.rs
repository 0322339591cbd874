use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use date_seq2seq::{
    checkpoint, dataset, date, inference, model, train, vocab, Alignment, Config, DateTuple,
    ModelKind, INPUT_FORMATS,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use tch::{nn, Device};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Translate arbitrarily formatted dates to YYYY-MM-DD with attention models
#[derive(Parser)]
#[command(name = "date-seq2seq")]
#[command(version, about)]
struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the dataset, train a model and save it
    Train(TrainArgs),
    /// Translate date strings with a saved model
    Translate {
        #[arg(long, default_value = "./out/model")]
        model_path: PathBuf,
        /// Print the attention matrix of each translation
        #[arg(long)]
        attention: bool,
        #[arg(required = true)]
        inputs: Vec<String>,
    },
    /// Show every supported input format for a date (YYYY-MM-DD, random if omitted)
    Formats { date: Option<String> },
    /// Print the input and output vocabularies
    Vocab,
    /// Write every date in every format to a JSON file
    ExportDataset {
        #[arg(long, default_value_t = 1950)]
        min_year: u16,
        #[arg(long, default_value_t = 2050)]
        max_year: u16,
        #[arg(long, default_value = "./out.json")]
        output: PathBuf,
    },
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// JSON file with `dataset`, `train` and `model` sections
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, value_enum, ignore_case = true)]
    model: Option<ModelKind>,
    #[arg(long, value_enum, ignore_case = true)]
    alignment: Option<Alignment>,
    #[arg(long)]
    epochs: Option<usize>,
    #[arg(long)]
    batch_size: Option<usize>,
    #[arg(long)]
    learning_rate: Option<f64>,
    #[arg(long, default_value = "./out/model")]
    save_path: PathBuf,
    /// Test dates to translate after training
    #[arg(long, default_value_t = 10)]
    num_tests: usize,
}

impl TrainArgs {
    /// The config file (or the defaults) with every flag given on the
    /// command line applied on top.
    fn resolve_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)
                .with_context(|| format!("reading config {}", path.display()))?,
            None => Config::default(),
        };
        if let Some(kind) = self.model {
            config.model.kind = kind;
        }
        if let Some(alignment) = self.alignment {
            config.model.alignment = alignment;
        }
        if let Some(epochs) = self.epochs {
            config.train.epochs = epochs;
        }
        if let Some(batch_size) = self.batch_size {
            config.train.batch_size = batch_size;
        }
        if let Some(learning_rate) = self.learning_rate {
            config.train.learning_rate = learning_rate;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt().with_env_filter(filter).with_target(false).init();

    match cli.command {
        Commands::Train(args) => {
            let config = args.resolve_config()?;
            run_train(&config, args.save_path, args.num_tests)
        }
        Commands::Translate {
            model_path,
            attention,
            inputs,
        } => run_translate(model_path, attention, &inputs),
        Commands::Formats { date } => {
            let date = match date {
                Some(text) => text.parse::<DateTuple>()?,
                None => DateTuple::random(&mut rand::thread_rng(), 1950, 2050)?,
            };
            println!("{} supported formats for {date}:", INPUT_FORMATS.len());
            for format in INPUT_FORMATS {
                println!("  {:<14} {}", format.pattern(), format.render(date));
            }
            Ok(())
        }
        Commands::Vocab => {
            for (title, table) in [
                ("INPUT", vocab::vocabulary_table(vocab::INPUT_VOCAB)),
                ("OUTPUT", vocab::vocabulary_table(vocab::OUTPUT_VOCAB)),
            ] {
                println!("{title} VOCABULARY ({} symbols)", table.len());
                for (index, symbol) in table {
                    println!("  {index:>2}  {symbol:?}");
                }
            }
            Ok(())
        }
        Commands::ExportDataset {
            min_year,
            max_year,
            output,
        } => {
            let dates = date::ordered_dates(min_year, max_year)?;
            dataset::write_pairs(&output, &dates)
                .with_context(|| format!("writing {}", output.display()))?;
            Ok(())
        }
    }
}

fn run_train(config: &Config, save_path: PathBuf, num_tests: usize) -> Result<()> {
    let device = Device::cuda_if_available();
    tch::manual_seed(config.train.seed as i64);
    let mut rng = StdRng::seed_from_u64(config.train.seed);

    let data = dataset::generate(&config.dataset, &mut rng, device)?;

    let vs = nn::VarStore::new(device);
    let model = model::build(&vs.root(), &config.model);
    train::fit(&vs, model.as_ref(), &data, &config.train)?;

    checkpoint::save(&save_path, &vs, &config.model)
        .with_context(|| format!("saving model to {}", save_path.display()))?;

    let tests = &data.test_dates[..num_tests.min(data.test_dates.len())];
    for &date in tests {
        let correct = date.to_string();
        for format in INPUT_FORMATS {
            let input = format.render(date);
            let translation = inference::translate(model.as_ref(), &input, false)?;
            if translation.output == correct {
                info!("{input:>12} -> {} (OK)", translation.output);
            } else {
                warn!("{input:>12} -> {} (WRONG, expected {correct})", translation.output);
            }
        }
    }

    if !tests.is_empty() {
        let accuracy = inference::evaluate(model.as_ref(), tests)?;
        info!("exact-match accuracy on {} test dates: {:.3}", tests.len(), accuracy.overall);
    }
    Ok(())
}

fn run_translate(model_path: PathBuf, with_attention: bool, inputs: &[String]) -> Result<()> {
    let restored = checkpoint::load(&model_path, Device::cuda_if_available())
        .with_context(|| format!("loading model from {}", model_path.display()))?;

    for input in inputs {
        let translation = inference::translate(restored.model.as_ref(), input, with_attention)?;
        println!("{input} -> {}", translation.output);
        if let Some(rows) = translation.attention {
            for (output_char, row) in translation.output.chars().zip(rows) {
                let weights: Vec<String> = row.iter().map(|w| format!("{w:.2}")).collect();
                println!("  {output_char:?} {}", weights.join(" "));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn train_args(args: &[&str]) -> TrainArgs {
        let argv = ["date-seq2seq", "train"].into_iter().chain(args.iter().copied());
        let cli = Cli::try_parse_from(argv).expect("arguments should parse");
        match cli.command {
            Commands::Train(args) => args,
            _ => panic!("expected the train subcommand"),
        }
    }

    #[test]
    fn test_model_names_ignore_case() {
        let args = train_args(&["--model", "Bahdanau", "--alignment", "CONCAT"]);
        assert_eq!(args.model, Some(ModelKind::Bahdanau));
        assert_eq!(args.alignment, Some(Alignment::Concat));

        let args = train_args(&["--model", "seq2seq"]);
        assert_eq!(args.model, Some(ModelKind::Seq2Seq));

        let result = Cli::try_parse_from(["date-seq2seq", "train", "--model", "gru"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_defaults_without_flags() {
        let args = train_args(&[]);
        assert_eq!(args.resolve_config().unwrap(), Config::default());
        assert_eq!(args.save_path, PathBuf::from("./out/model"));
        assert_eq!(args.num_tests, 10);
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "train": { "epochs": 7, "batchSize": 32, "seed": 5 }, "model": { "lstmUnits": 48 } }"#,
        )
        .unwrap();

        let args = train_args(&[
            "--config",
            path.to_str().unwrap(),
            "--model",
            "luong",
            "--alignment",
            "general",
            "--epochs",
            "3",
            "--learning-rate",
            "0.01",
        ]);
        let config = args.resolve_config().unwrap();
        assert_eq!(config.model.kind, ModelKind::Luong);
        assert_eq!(config.model.alignment, Alignment::General);
        assert_eq!(config.train.epochs, 3);
        assert_eq!(config.train.learning_rate, 0.01);
        // untouched fields keep the file's values
        assert_eq!(config.train.batch_size, 32);
        assert_eq!(config.train.seed, 5);
        assert_eq!(config.model.lstm_units, 48);
    }

    #[test]
    fn test_unreadable_config_reports_path() {
        let args = train_args(&["--config", "/nonexistent/config.json"]);
        let err = args.resolve_config().unwrap_err();
        assert!(err.to_string().contains("/nonexistent/config.json"));
    }
}
