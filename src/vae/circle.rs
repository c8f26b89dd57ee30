//! Unconditional VAE on points of the unit circle.
//!
//! Batch-normalized 2D input, one hidden layer, a Gaussian reconstruction with
//! per-coordinate mean and log-variance, and a linearly annealed KL term.

use rand::Rng;
use serde::{ Serialize, Deserialize };

use crate::{
  scalar::Real,
  tensor::Tensor,
  optimize::{ Optimizer, RmsProp },
  train::{ Dataset, Trainer, TrainingConfig },
  error::{ Result, VaeError },
};

use super::{ Vae, Architecture, ReconstructionKind, KlAnnealing };


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircleConfig {
  pub batch_size: usize,
  pub latent_size: usize,
  pub epochs: usize,
  pub hidden_units: usize,
  pub samples: usize,
  pub learning_rate: f64,
  /// Epochs until the KL term reaches full weight.
  pub annealing_horizon: usize,
  /// Leading share of the samples held out for evaluation.
  pub test_fraction: f64,
  pub log_var_limit: f64,
  pub seed: u64,
}

impl Default for CircleConfig {
  fn default() -> Self {
    Self {
      batch_size: 100,
      latent_size: 2,
      epochs: 150,
      hidden_units: 256,
      samples: 5000,
      learning_rate: 0.0002,
      annealing_horizon: 800,
      test_fraction: 0.1,
      log_var_limit: 20.0,
      seed: 0,
    }
  }
}

impl CircleConfig {
  pub fn architecture(&self) -> Architecture {
    Architecture {
      input_size: 2,
      label_size: 0,
      latent_size: self.latent_size,
      layer_sizes: vec![self.hidden_units],
      batch_norm: true,
      normalize_inputs: true,
      reconstruction: ReconstructionKind::Gaussian,
      log_var_limit: self.log_var_limit,
    }
  }

  pub fn training(&self) -> TrainingConfig {
    TrainingConfig {
      batch_size: self.batch_size,
      epochs: self.epochs,
      shuffle: true,
      seed: self.seed,
      annealing: KlAnnealing::Linear { horizon: self.annealing_horizon },
      report_components: true,
    }
  }

  pub fn validate(&self) -> Result<()> {
    if self.samples == 0 {
      return Err(VaeError::InvalidConfig("need at least one sample".into()))
    }
    if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
      return Err(VaeError::InvalidConfig(format!("learning rate {} must be positive", self.learning_rate)))
    }
    self.training().validate()?;
    self.architecture().validate()
  }

  pub fn build<T: Real>(&self, rng: &mut impl Rng) -> Result<Vae<T>> {
    self.validate()?;
    Vae::new(self.architecture(), rng)
  }

  /// RMSprop trainer with the annealing schedule of this configuration.

  pub fn trainer<T: Real>(&self) -> Result<Trainer<T, RmsProp<T>>> {
    self.validate()?;
    let optimizer = Optimizer::new(T::from(self.learning_rate).unwrap(), RmsProp::default());
    Trainer::new(optimizer, self.training())
  }

  /// Sample the data set and split it into `(train, test)`.

  pub fn dataset<T: Real>(&self, rng: &mut impl Rng) -> Result<(Dataset<T>, Dataset<T>)> {
    let (_, points) = circle_samples(self.samples, rng);
    Dataset::unlabeled(points)?.split(self.test_fraction)
  }
}


/// `n` points `(cos θ, sin θ)` for angles θ drawn uniformly from `[-π, π)`.
///
/// Returns the angles alongside the `[n, 2]` point matrix.

pub fn circle_samples<T: Real>(n: usize, rng: &mut impl Rng) -> (Vec<T>, Tensor<T>) {
  let pi = T::from(std::f64::consts::PI).unwrap();
  let angles: Vec<T> = (0..n).map(|_| rng.gen_range(-pi, pi) ).collect();
  let points = angles.iter()
    .flat_map(|&angle| [angle.cos(), angle.sin()] )
    .collect();
  (angles, Tensor::new(&[n, 2], points))
}


#[cfg(test)]
mod tests {
  use super::*;
  use approx::assert_abs_diff_eq;
  use rand::{ SeedableRng, rngs::StdRng };
  use crate::vae::Reconstruction;

  #[test]
  fn defaults() {
    let config = CircleConfig::default();
    assert_eq!(config.batch_size, 100);
    assert_eq!(config.latent_size, 2);
    assert_eq!(config.epochs, 150);
    assert_eq!(config.hidden_units, 256);
    assert_eq!(config.samples, 5000);
    assert_eq!(config.learning_rate, 0.0002);
    assert_eq!(config.annealing_horizon, 800);
    assert!(config.validate().is_ok());
  }

  #[test]
  fn samples_lie_on_circle() {
    let mut rng = StdRng::seed_from_u64(5);
    let (angles, points) = circle_samples::<f64>(64, &mut rng);
    assert_eq!(points.dims(), &[64, 2]);
    for (i, angle) in angles.iter().enumerate() {
      let row = points.row(i).to_vec();
      assert!((-std::f64::consts::PI..std::f64::consts::PI).contains(angle));
      assert_abs_diff_eq!(row[0] * row[0] + row[1] * row[1], 1.0, epsilon = 1e-12);
      assert_abs_diff_eq!(row[1].atan2(row[0]), *angle, epsilon = 1e-9);
    }
  }

  #[test]
  fn split_sizes() {
    let mut rng = StdRng::seed_from_u64(5);
    let (train, test) = CircleConfig::default().dataset::<f32>(&mut rng).unwrap();
    assert_eq!(train.len(), 4500);
    assert_eq!(test.len(), 500);
  }

  #[test]
  fn model_shapes() {
    let mut rng = StdRng::seed_from_u64(5);
    let config = CircleConfig { hidden_units: 16, ..CircleConfig::default() };
    let vae = config.build::<f32>(&mut rng).unwrap();
    let (_, points) = circle_samples(7, &mut rng);
    assert_eq!(vae.encode(&points, None).unwrap().dims(), &[7, 2]);
    match vae.generate(7, None, &mut rng).unwrap() {
      Reconstruction::Gaussian { mean, log_var } => {
        assert_eq!(mean.dims(), &[7, 2]);
        assert_eq!(log_var.dims(), &[7, 2]);
      },
      Reconstruction::Point(_) => panic!("circle model reconstructs a Gaussian"),
    }
  }
}
