use rand::Rng;

use crate::{ ops::*, scalar::Real, Variable, Tensor };


/// A parameter-owning building block.
///
/// Layers hold their weights as trainable [Variable]s. Running the same
/// layer from several places wires all of them to the same storage, so an
/// optimizer step taken through one graph is seen by every other.

pub trait Layer<T: Real> {
  /// Apply the layer. `train` selects batch statistics over running ones
  /// where that makes a difference.
  fn run(&self, input: &Variable<T>, train: bool) -> Variable<T>;

  /// Trainable parameters, in a stable order.
  fn parameters(&self) -> Vec<Variable<T>>;

  /// Everything that has to be persisted to restore this layer,
  /// including non-trainable statistics.
  fn state(&self) -> Vec<Tensor<T>> {
    self.parameters().iter().map(|param| param.tensor().clone() ).collect()
  }
}


/// Fully connected layer computing `input · weights + bias`.

#[derive(Debug)]
pub struct Dense<T: Real> {
  weights: Variable<T>,
  bias: Variable<T>,
}

impl<T: Real> Dense<T> {
  pub fn new(inputs: usize, outputs: usize, rng: &mut impl Rng) -> Self {
    Self {
      weights: Tensor::glorot_uniform(&[inputs, outputs], rng).trained(),
      bias: Tensor::zeros(&[outputs]).trained(),
    }
  }

  pub fn input_size(&self) -> usize {
    self.weights.dim(0)
  }

  pub fn output_size(&self) -> usize {
    self.weights.dim(1)
  }
}

impl<T: Real> Layer<T> for Dense<T> {
  fn run(&self, input: &Variable<T>, _train: bool) -> Variable<T> {
    input.mm(&self.weights) + &self.bias
  }

  fn parameters(&self) -> Vec<Variable<T>> {
    vec![self.weights.clone(), self.bias.clone()]
  }
}


/// Batch normalization over the leading (batch) dimension.
///
/// Training runs normalize with the statistics of the current batch and fold
/// them into exponential moving averages, which inference runs use instead.

#[derive(Debug)]
pub struct BatchNorm<T: Real> {
  gamma: Variable<T>,
  beta: Variable<T>,
  moving_mean: Tensor<T>,
  moving_variance: Tensor<T>,
  pub momentum: T,
  pub epsilon: T,
}

impl<T: Real> BatchNorm<T> {
  pub fn new(features: usize) -> Self {
    Self {
      gamma: Tensor::ones(&[features]).trained(),
      beta: Tensor::zeros(&[features]).trained(),
      moving_mean: Tensor::zeros(&[features]),
      moving_variance: Tensor::ones(&[features]),
      momentum: T::from(0.99).unwrap(),
      epsilon: T::from(1e-3).unwrap(),
    }
  }

  pub fn features(&self) -> usize {
    self.gamma.dim(0)
  }

  pub fn moving_mean(&self) -> &Tensor<T> {
    &self.moving_mean
  }

  pub fn moving_variance(&self) -> &Tensor<T> {
    &self.moving_variance
  }

  fn track(moving: &Tensor<T>, batch: &Tensor<T>, momentum: T) {
    let batch = batch.reshape(moving.dims());
    moving.assign(&(moving * momentum + batch * (T::one() - momentum)));
  }
}

impl<T: Real> Layer<T> for BatchNorm<T> {
  fn run(&self, input: &Variable<T>, train: bool) -> Variable<T> {
    let normalized = if train {
      let mean = input.mean_over(0);
      let centered = input - &mean;
      let variance = centered.sqr().mean_over(0);
      Self::track(&self.moving_mean, mean.tensor(), self.momentum);
      Self::track(&self.moving_variance, variance.tensor(), self.momentum);
      centered / (variance + self.epsilon).sqrt()
    } else {
      let deviation = (&self.moving_variance + self.epsilon).sqrt();
      (input - &self.moving_mean.tracked()) / deviation.tracked()
    };
    normalized * &self.gamma + &self.beta
  }

  fn parameters(&self) -> Vec<Variable<T>> {
    vec![self.gamma.clone(), self.beta.clone()]
  }

  fn state(&self) -> Vec<Tensor<T>> {
    vec![
      self.gamma.tensor().clone(),
      self.beta.tensor().clone(),
      self.moving_mean.clone(),
      self.moving_variance.clone(),
    ]
  }
}
