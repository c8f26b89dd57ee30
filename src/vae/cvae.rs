//! Conditional VAE builder.
//!
//! Inputs and labels are concatenated before encoding, latents and labels
//! before decoding. Reconstruction is scored with mean squared error and the
//! KL term is not annealed.

use std::path::Path;

use rand::Rng;
use serde::{ Serialize, Deserialize, de::DeserializeOwned };

use crate::{
  scalar::Real,
  optimize::{ Strategy, StrategyKind },
  train::{ Trainer, TrainingConfig },
  error::{ Result, VaeError },
};

use super::{ Vae, Architecture, ReconstructionKind, KlAnnealing };


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CvaeConfig {
  pub input_size: usize,
  pub label_size: usize,
  pub latent_size: usize,
  pub layer_sizes: Vec<usize>,
  /// Optimizer name, see [StrategyKind].
  pub optimizer: String,
  /// Defaults to the optimizer's conventional rate.
  pub learning_rate: Option<f64>,
  /// Report reconstruction and KL terms during training.
  pub show_metrics: bool,
  pub batch_norm: bool,
  pub log_var_limit: f64,
}

impl Default for CvaeConfig {
  fn default() -> Self {
    Self {
      input_size: 784,
      label_size: 10,
      latent_size: 2,
      layer_sizes: vec![128, 64],
      optimizer: "rmsprop".to_string(),
      learning_rate: None,
      show_metrics: false,
      batch_norm: true,
      log_var_limit: 20.0,
    }
  }
}

impl CvaeConfig {
  pub fn new(input_size: usize, label_size: usize, latent_size: usize, layer_sizes: &[usize]) -> Self {
    Self {
      input_size,
      label_size,
      latent_size,
      layer_sizes: layer_sizes.to_vec(),
      ..Self::default()
    }
  }

  pub fn strategy(&self) -> Result<StrategyKind> {
    self.optimizer.parse()
  }

  pub fn architecture(&self) -> Architecture {
    Architecture {
      input_size: self.input_size,
      label_size: self.label_size,
      latent_size: self.latent_size,
      layer_sizes: self.layer_sizes.clone(),
      batch_norm: self.batch_norm,
      normalize_inputs: false,
      reconstruction: ReconstructionKind::Point,
      log_var_limit: self.log_var_limit,
    }
  }

  pub fn validate(&self) -> Result<()> {
    self.strategy()?;
    if let Some(rate) = self.learning_rate {
      if !(rate.is_finite() && rate > 0.0) {
        return Err(VaeError::InvalidConfig(format!("learning rate {rate} must be positive")))
      }
    }
    self.architecture().validate()
  }

  pub fn build<T: Real>(&self, rng: &mut impl Rng) -> Result<Cvae<T>> {
    self.validate()?;
    let strategy = self.strategy()?;
    let learning_rate = match self.learning_rate {
      Some(rate) => T::from(rate).unwrap(),
      None => strategy.default_learning_rate(),
    };
    tracing::info!(%strategy, %learning_rate, labels = self.label_size, "building conditional VAE");
    Ok(Cvae {
      model: Vae::new(self.architecture(), rng)?,
      strategy,
      learning_rate,
      show_metrics: self.show_metrics,
    })
  }
}


/// A conditional VAE together with its training setup.

#[derive(Debug)]
pub struct Cvae<T: Real> {
  pub model: Vae<T>,
  pub strategy: StrategyKind,
  pub learning_rate: T,
  pub show_metrics: bool,
}

impl<T: Real> Cvae<T> {
  /// Trainer for this model using its configured optimizer.

  pub fn compile(&self, batch_size: usize, epochs: usize, seed: u64) -> Result<Trainer<T, Box<dyn Strategy<T>>>> {
    let config = TrainingConfig {
      batch_size,
      epochs,
      seed,
      annealing: KlAnnealing::Off,
      report_components: self.show_metrics,
      ..TrainingConfig::default()
    };
    Trainer::new(self.strategy.optimizer(self.learning_rate), config)
  }

  /// Restore weights saved from a model with the same configuration.

  pub fn load_weights(&self, path: impl AsRef<Path>) -> Result<()> where T: DeserializeOwned {
    self.model.load_weights(path)
  }
}
