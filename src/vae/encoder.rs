use rand::Rng;

use crate::{
  ops::*,
  scalar::Real,
  tensor::Tensor,
  variable::{ Variable, Layer, Dense, BatchNorm },
};

use super::{ block::Block, Architecture };


/// Recognition network `q(z | x[, label])`.
///
/// Produces the mean and log-variance of a diagonal Gaussian over the
/// latent space.

#[derive(Debug)]
pub struct Encoder<T: Real> {
  input_norm: Option<BatchNorm<T>>,
  hidden: Vec<Block<T>>,
  mu: Dense<T>,
  log_sigma: Dense<T>,
  log_var_limit: T,
}

impl<T: Real> Encoder<T> {
  pub fn new(arch: &Architecture, rng: &mut impl Rng) -> Self {
    let hidden = Block::stack(arch.input_size + arch.label_size, &arch.layer_sizes, arch.batch_norm, rng);
    let width = hidden.last().map_or(arch.input_size + arch.label_size, |block| block.output_size() );
    Self {
      input_norm: arch.normalize_inputs.then(|| BatchNorm::new(arch.input_size) ),
      hidden,
      mu: Dense::new(width, arch.latent_size, rng),
      log_sigma: Dense::new(width, arch.latent_size, rng),
      log_var_limit: T::from(arch.log_var_limit).unwrap(),
    }
  }

  pub fn latent_size(&self) -> usize {
    self.mu.output_size()
  }

  /// Returns `(mu, log_sigma)`, each `[batch, latent]`.

  pub fn run(&self, input: &Variable<T>, labels: Option<&Variable<T>>, train: bool) -> (Variable<T>, Variable<T>) {
    let mut x = match &self.input_norm {
      Some(norm) => norm.run(input, train),
      None => input.clone(),
    };
    if let Some(labels) = labels {
      x = x.concat(labels, -1);
    }
    for block in &self.hidden {
      x = block.run(&x, train);
    }
    let mu = self.mu.run(&x, train);
    let log_sigma = self.log_sigma.run(&x, train).clamp(-self.log_var_limit, self.log_var_limit);
    (mu, log_sigma)
  }

  pub fn parameters(&self) -> Vec<Variable<T>> {
    self.layers().flat_map(|layer| layer.parameters() ).collect()
  }

  pub fn state(&self) -> Vec<Tensor<T>> {
    self.layers().flat_map(|layer| layer.state() ).collect()
  }

  fn layers(&self) -> impl Iterator<Item = &dyn Layer<T>> {
    self.input_norm.iter().map(|norm| norm as &dyn Layer<T> )
      .chain(self.hidden.iter().map(|block| block as &dyn Layer<T> ))
      .chain([&self.mu as &dyn Layer<T>, &self.log_sigma])
  }
}
