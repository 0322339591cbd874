//! Sequence-to-sequence models that read dates written in twenty different
//! layouts (`01/20/2019`, `JAN 20, 2019`, ...) and emit the ISO form
//! `2019-01-20`, one character at a time.
//!
//! Tensors, autograd and optimisation come from `tch`.

pub mod attention;
pub mod checkpoint;
pub mod config;
pub mod dataset;
pub mod date;
pub mod error;
pub mod formats;
pub mod inference;
pub mod model;
pub mod train;
pub mod vocab;

pub use attention::Alignment;
pub use config::Config;
pub use date::DateTuple;
pub use error::{Error, Result};
pub use formats::{DateFormat, INPUT_FORMATS};
pub use inference::{translate, translate_batch, Translation};
pub use model::{build, DateTranslator, ModelConfig, ModelKind};
