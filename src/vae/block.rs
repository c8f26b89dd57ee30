use rand::Rng;

use crate::{
  ops::*,
  scalar::Real,
  tensor::Tensor,
  variable::{ Variable, Layer, Dense, BatchNorm },
};


/// Hidden stage shared by encoder and decoder: dense, ReLU and an optional
/// batch normalization of the activations.

#[derive(Debug)]
pub struct Block<T: Real> {
  dense: Dense<T>,
  norm: Option<BatchNorm<T>>,
}

impl<T: Real> Block<T> {
  pub fn new(inputs: usize, outputs: usize, batch_norm: bool, rng: &mut impl Rng) -> Self {
    Self {
      dense: Dense::new(inputs, outputs, rng),
      norm: batch_norm.then(|| BatchNorm::new(outputs) ),
    }
  }

  pub fn output_size(&self) -> usize {
    self.dense.output_size()
  }

  /// Chain blocks of the given widths, starting from `inputs` features.

  pub fn stack(inputs: usize, widths: &[usize], batch_norm: bool, rng: &mut impl Rng) -> Vec<Self> {
    let mut size = inputs;
    widths.iter().map(|&width| {
      let block = Self::new(size, width, batch_norm, rng);
      size = width;
      block
    }).collect()
  }
}

impl<T: Real> Layer<T> for Block<T> {
  fn run(&self, input: &Variable<T>, train: bool) -> Variable<T> {
    let activation = self.dense.run(input, train).relu();
    match &self.norm {
      Some(norm) => norm.run(&activation, train),
      None => activation,
    }
  }

  fn parameters(&self) -> Vec<Variable<T>> {
    let mut params = self.dense.parameters();
    if let Some(norm) = &self.norm { params.extend(norm.parameters()) }
    params
  }

  fn state(&self) -> Vec<Tensor<T>> {
    let mut state = self.dense.state();
    if let Some(norm) = &self.norm { state.extend(norm.state()) }
    state
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use rand::{ SeedableRng, rngs::StdRng };

  #[test]
  fn stack_widths() {
    let mut rng = StdRng::seed_from_u64(3);
    let blocks = Block::<f32>::stack(6, &[8, 4], true, &mut rng);
    assert_eq!(blocks.iter().map(|b| b.output_size() ).collect::<Vec<_>>(), vec![8, 4]);
    assert_eq!(blocks[0].parameters().len(), 4);
    assert_eq!(blocks[0].state().len(), 6);
  }

  #[test]
  fn activations_are_rectified() {
    let mut rng = StdRng::seed_from_u64(3);
    let block = Block::<f64>::new(3, 5, false, &mut rng);
    let out = block.run(&Tensor::randn(&[7, 3], &mut rng).tracked(), true);
    assert_eq!(out.dims(), &[7, 5]);
    assert!(out.param_iter().all(|a| a >= 0.0 ));
  }
}
