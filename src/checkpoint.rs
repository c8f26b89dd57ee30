//! Weight persistence.
//!
//! A checkpoint is nothing more than a postcard-encoded list of contiguous
//! tensors, in the order a model reports its state. Loading restores values
//! in place, so every graph holding the same storage sees the new weights.

use std::fs;
use std::path::Path;

use serde::{ Serialize, Deserialize, de::DeserializeOwned };

use crate::{
  scalar::Real,
  tensor::Tensor,
  error::{ Result, VaeError },
};


#[derive(Serialize, Deserialize)]
struct Checkpoint<T: Real> {
  tensors: Vec<Tensor<T>>,
}


/// Write a detached copy of `tensors` to `path`.

pub fn save<T: Real>(path: impl AsRef<Path>, tensors: &[Tensor<T>]) -> Result<()> {
  let path = path.as_ref();
  let dump = Checkpoint {
    tensors: tensors.iter().map(|tensor| tensor.detach() ).collect(),
  };
  let bytes = postcard::to_allocvec(&dump)?;
  fs::write(path, bytes).map_err(|source| VaeError::Io { path: path.to_path_buf(), source })?;
  tracing::debug!(path = %path.display(), tensors = tensors.len(), "saved checkpoint");
  Ok(())
}


/// Read the tensor list stored at `path`.

pub fn load<T: Real + DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<Tensor<T>>> {
  let path = path.as_ref();
  let bytes = fs::read(path).map_err(|source| VaeError::Io { path: path.to_path_buf(), source })?;
  let dump: Checkpoint<T> = postcard::from_bytes(&bytes)?;
  Ok(dump.tensors)
}


/// Copy `loaded` into `targets` after checking that both lists line up.
///
/// Nothing is written unless every shape matches.

pub fn restore<T: Real>(targets: &[Tensor<T>], loaded: &[Tensor<T>]) -> Result<()> {
  if targets.len() != loaded.len() {
    return Err(VaeError::TensorCount { expected: targets.len(), found: loaded.len() })
  }
  for (index, (target, value)) in targets.iter().zip(loaded).enumerate() {
    if target.dims() != value.dims() {
      return Err(VaeError::ShapeMismatch {
        index,
        expected: target.dims().to_vec(),
        found: value.dims().to_vec(),
      })
    }
  }
  for (target, value) in targets.iter().zip(loaded) {
    target.assign(value);
  }
  Ok(())
}
