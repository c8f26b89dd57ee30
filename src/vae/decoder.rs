use rand::Rng;
use serde::{ Serialize, Deserialize };

use crate::{
  ops::*,
  scalar::Real,
  tensor::Tensor,
  variable::{ Variable, Layer, Dense, BatchNorm },
};

use super::{ block::Block, Architecture };


/// Shape of the decoder's output distribution.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconstructionKind {
  /// A single point estimate, scored with mean squared error.
  #[default]
  Point,
  /// Per-feature mean and log-variance, scored with the Gaussian likelihood.
  Gaussian,
}


/// Decoder output, either as graph nodes or as plain tensors.

#[derive(Debug, Clone, PartialEq)]
pub enum Reconstruction<V> {
  Point(V),
  Gaussian { mean: V, log_var: V },
}

impl<V> Reconstruction<V> {
  /// The point estimate, which is the mean for Gaussian outputs.

  pub fn mean(&self) -> &V {
    match self {
      Self::Point(point) => point,
      Self::Gaussian { mean, .. } => mean,
    }
  }

  pub fn kind(&self) -> ReconstructionKind {
    match self {
      Self::Point(_) => ReconstructionKind::Point,
      Self::Gaussian { .. } => ReconstructionKind::Gaussian,
    }
  }
}

impl<T: Real> Reconstruction<Variable<T>> {
  /// Copy the values out of the graph.

  pub fn detach(&self) -> Reconstruction<Tensor<T>> {
    match self {
      Self::Point(point) => Reconstruction::Point(point.tensor().detach()),
      Self::Gaussian { mean, log_var } => Reconstruction::Gaussian {
        mean: mean.tensor().detach(),
        log_var: log_var.tensor().detach(),
      },
    }
  }
}

impl<T: Real> Reconstruction<Tensor<T>> {
  /// Draw from the output distribution. Point outputs are returned as is.

  pub fn sample(&self, rng: &mut impl Rng) -> Tensor<T> {
    match self {
      Self::Point(point) => point.clone(),
      Self::Gaussian { mean, log_var } => {
        let noise = Tensor::randn(mean.dims(), rng);
        mean + (log_var * T::from(0.5).unwrap()).exp() * noise
      },
    }
  }
}


#[derive(Debug)]
enum Head<T: Real> {
  Point(Dense<T>),
  Gaussian { mean: Dense<T>, log_var: Dense<T> },
}


/// Generative network `p(x | z[, label])`.
///
/// There is exactly one set of decoder weights. The full model runs it through
/// [training_forward](Self::training_forward) while generation uses
/// [generation_forward](Self::generation_forward), so both paths always agree
/// on the current parameters.

#[derive(Debug)]
pub struct Decoder<T: Real> {
  latent_norm: Option<BatchNorm<T>>,
  hidden: Vec<Block<T>>,
  head: Head<T>,
  log_var_limit: T,
  latent_size: usize,
}

impl<T: Real> Decoder<T> {
  pub fn new(arch: &Architecture, rng: &mut impl Rng) -> Self {
    let widths: Vec<usize> = arch.layer_sizes.iter().rev().copied().collect();
    let hidden = Block::stack(arch.latent_size + arch.label_size, &widths, arch.batch_norm, rng);
    let width = hidden.last().map_or(arch.latent_size + arch.label_size, |block| block.output_size() );
    let head = match arch.reconstruction {
      ReconstructionKind::Point => Head::Point(Dense::new(width, arch.input_size, rng)),
      ReconstructionKind::Gaussian => Head::Gaussian {
        mean: Dense::new(width, arch.input_size, rng),
        log_var: Dense::new(width, arch.input_size, rng),
      },
    };
    Self {
      latent_norm: arch.normalize_inputs.then(|| BatchNorm::new(arch.latent_size) ),
      hidden,
      head,
      log_var_limit: T::from(arch.log_var_limit).unwrap(),
      latent_size: arch.latent_size,
    }
  }

  pub fn latent_size(&self) -> usize {
    self.latent_size
  }

  pub fn kind(&self) -> ReconstructionKind {
    match self.head {
      Head::Point(_) => ReconstructionKind::Point,
      Head::Gaussian { .. } => ReconstructionKind::Gaussian,
    }
  }

  /// Differentiable pass. With `train` set, batch normalization uses batch
  /// statistics and updates its running averages, otherwise it reads them.

  pub fn forward(&self, latent: &Variable<T>, labels: Option<&Variable<T>>, train: bool) -> Reconstruction<Variable<T>> {
    let mut x = match &self.latent_norm {
      Some(norm) => norm.run(latent, train),
      None => latent.clone(),
    };
    if let Some(labels) = labels {
      x = x.concat(labels, -1);
    }
    for block in &self.hidden {
      x = block.run(&x, train);
    }
    match &self.head {
      Head::Point(out) => Reconstruction::Point(out.run(&x, train)),
      Head::Gaussian { mean, log_var } => Reconstruction::Gaussian {
        mean: mean.run(&x, train),
        log_var: log_var.run(&x, train).clamp(-self.log_var_limit, self.log_var_limit),
      },
    }
  }

  /// Training mode [forward](Self::forward).

  pub fn training_forward(&self, latent: &Variable<T>, labels: Option<&Variable<T>>) -> Reconstruction<Variable<T>> {
    self.forward(latent, labels, true)
  }

  /// Inference pass using running statistics. Leaves all state untouched.

  pub fn generation_forward(&self, latent: &Tensor<T>, labels: Option<&Tensor<T>>) -> Reconstruction<Tensor<T>> {
    let labels = labels.map(|labels| labels.tracked() );
    self.forward(&latent.tracked(), labels.as_ref(), false).detach()
  }

  pub fn parameters(&self) -> Vec<Variable<T>> {
    self.layers().flat_map(|layer| layer.parameters() ).collect()
  }

  pub fn state(&self) -> Vec<Tensor<T>> {
    self.layers().flat_map(|layer| layer.state() ).collect()
  }

  fn layers(&self) -> impl Iterator<Item = &dyn Layer<T>> {
    let head: Vec<&dyn Layer<T>> = match &self.head {
      Head::Point(out) => vec![out as &dyn Layer<T>],
      Head::Gaussian { mean, log_var } => vec![mean as &dyn Layer<T>, log_var],
    };
    self.latent_norm.iter().map(|norm| norm as &dyn Layer<T> )
      .chain(self.hidden.iter().map(|block| block as &dyn Layer<T> ))
      .chain(head)
  }
}
