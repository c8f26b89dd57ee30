use std::path::PathBuf;

use thiserror::Error;


/// Failures at the crate boundary.
///
/// Shape mismatches inside tensor arithmetic remain panics. Everything that
/// depends on user input, files or training dynamics is reported here.

#[derive(Debug, Error)]
pub enum VaeError {
  #[error("invalid configuration: {0}")]
  InvalidConfig(String),

  #[error("unknown optimizer `{0}` (expected one of rmsprop, sgd, momentum, nesterov, adam)")]
  UnknownOptimizer(String),

  #[error("could not access checkpoint {path}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("could not encode or decode checkpoint")]
  Codec(#[from] postcard::Error),

  #[error("checkpoint holds {found} tensors, model expects {expected}")]
  TensorCount { expected: usize, found: usize },

  #[error("checkpoint tensor {index} has shape {found:?}, model expects {expected:?}")]
  ShapeMismatch { index: usize, expected: Vec<usize>, found: Vec<usize> },

  #[error("conditional model requires {0} label columns but none were given")]
  MissingLabels(usize),

  #[error("labels have {found} columns, model expects {expected}")]
  LabelWidth { expected: usize, found: usize },

  #[error("inputs have {found} columns, model expects {expected}")]
  InputWidth { expected: usize, found: usize },

  #[error("batch has no rows")]
  EmptyBatch,

  #[error("model is not conditional but labels were given")]
  UnexpectedLabels,

  #[error("batch of {batch} inputs came with {labels} label rows")]
  BatchMismatch { batch: usize, labels: usize },

  #[error("loss became non-finite in epoch {epoch}")]
  NonFiniteLoss { epoch: usize },
}


pub type Result<T, E = VaeError> = std::result::Result<T, E>;
