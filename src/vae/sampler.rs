use rand::{ SeedableRng, rngs::StdRng };

use crate::{
  ops::*,
  scalar::Real,
  tensor::Tensor,
  variable::Variable,
};


/// Reparameterization trick: `mu + exp(log_sigma / 2) * epsilon`.
///
/// Differentiable with respect to `mu` and `log_sigma`. `epsilon` enters the
/// graph as a constant.

pub fn reparameterize<T: Real>(mu: &Variable<T>, log_sigma: &Variable<T>, epsilon: &Tensor<T>) -> Variable<T> {
  let half = T::from(0.5).unwrap();
  mu + log_sigma.scale(half).exp() * epsilon.tracked()
}


/// Source of the standard normal noise used by [reparameterize].

#[derive(Debug, Clone)]
pub struct Sampler {
  rng: StdRng,
}

impl Sampler {
  pub fn new(rng: StdRng) -> Self {
    Self { rng }
  }

  pub fn seeded(seed: u64) -> Self {
    Self::new(StdRng::seed_from_u64(seed))
  }

  /// Fresh noise shaped like `like`, whatever its batch size.

  pub fn epsilon<T: Real>(&mut self, like: &Tensor<T>) -> Tensor<T> {
    Tensor::randn(like.dims(), &mut self.rng)
  }

  pub fn sample<T: Real>(&mut self, mu: &Variable<T>, log_sigma: &Variable<T>) -> Variable<T> {
    let epsilon = self.epsilon(mu.tensor());
    reparameterize(mu, log_sigma, &epsilon)
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use approx::assert_abs_diff_eq;

  #[test]
  fn zero_noise_returns_mean() {
    let mu = Tensor::new(&[2,2], vec![0.5, -1.0, 2.0, 3.0]).tracked();
    let log_sigma = Tensor::new(&[2,2], vec![4.0, -4.0, 0.0, 1.0]).tracked();
    let z = reparameterize(&mu, &log_sigma, &Tensor::zeros(&[2,2]));
    assert_eq!(z.tensor(), mu.tensor());
  }

  #[test]
  fn zero_batch_matches_closed_form() {
    let mu = Tensor::<f64>::zeros(&[3,2]).tracked();
    let log_sigma = Tensor::zeros(&[3,2]).tracked();
    let epsilon = Tensor::new(&[3,2], vec![0.1, -0.2, 0.3, -0.4, 0.5, -0.6]);
    let z = reparameterize(&mu, &log_sigma, &epsilon);
    for (a, b) in z.param_iter().zip(epsilon.param_iter()) {
      assert_abs_diff_eq!(a, b, epsilon = 1e-6);
    }
  }

  #[test]
  fn noise_follows_batch() {
    let mut sampler = Sampler::seeded(1);
    for batch in [1, 7, 100] {
      let mu = Tensor::<f32>::zeros(&[batch, 2]).trained();
      let log_sigma = Tensor::zeros(&[batch, 2]).trained();
      assert_eq!(sampler.sample(&mu, &log_sigma).dims(), &[batch, 2]);
    }
  }

  #[test]
  fn gradient_flows_to_both_heads() {
    let mu = Tensor::vec(&[1.0, 2.0]).trained();
    let log_sigma = Tensor::vec(&[0.0, 2.0]).trained();
    let epsilon = Tensor::vec(&[1.0, -1.0]);
    reparameterize(&mu, &log_sigma, &epsilon).sum(0).backward();
    assert_eq!(mu.grad(), Some(&Tensor::vec(&[1.0, 1.0])));
    // d/ds exp(s/2) * e = 0.5 * exp(s/2) * e
    let expected = Tensor::vec(&[0.5, -0.5 * 1.0f64.exp()]);
    assert!(log_sigma.grad().unwrap().max_difference(&expected) < 1e-12);
  }
}
