use serde::{ Serialize, Deserialize };

use crate::{
  ops::*,
  scalar::Real,
  variable::Variable,
};

use super::Reconstruction;


/// KL divergence of `N(mu, exp(log_sigma))` from the standard normal prior,
/// one value per example.

pub fn kl_divergence<T: Real>(mu: &Variable<T>, log_sigma: &Variable<T>) -> Variable<T> {
  (log_sigma.exp() + mu.sqr() - T::one() - log_sigma)
    .sum(-1)
    .scale(T::from(0.5).unwrap())
}


/// Mean over features of the squared reconstruction error, one value per example.

pub fn mse<T: Real>(target: &Variable<T>, reconstruction: &Variable<T>) -> Variable<T> {
  (target - reconstruction).sqr().mean(-1)
}


/// Negated diagonal Gaussian log-likelihood, one value per example:
/// `log(2π) + 0.5 * Σ(log_var + (x - mean)² / exp(log_var))`.

pub fn gaussian_nll<T: Real>(target: &Variable<T>, mean: &Variable<T>, log_var: &Variable<T>) -> Variable<T> {
  let log_two_pi = T::from(2.0 * std::f64::consts::PI).unwrap().ln();
  (log_var + (target - mean).sqr() / log_var.exp())
    .sum(-1)
    .scale(T::from(0.5).unwrap())
    + log_two_pi
}


/// Per-example reconstruction term matching the decoder's output type.

pub fn reconstruction_loss<T: Real>(target: &Variable<T>, reconstruction: &Reconstruction<Variable<T>>) -> Variable<T> {
  match reconstruction {
    Reconstruction::Point(point) => mse(target, point),
    Reconstruction::Gaussian { mean, log_var } => gaussian_nll(target, mean, log_var),
  }
}


/// Batch means of the objective and its two terms.
///
/// `kl` is reported before annealing, so it stays comparable across epochs.

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LossComponents<T: Real> {
  pub total: T,
  pub reconstruction: T,
  pub kl: T,
}

impl<T: Real> LossComponents<T> {
  pub fn zero() -> Self {
    Self { total: T::zero(), reconstruction: T::zero(), kl: T::zero() }
  }

  pub fn is_finite(&self) -> bool {
    self.total.is_finite() && self.reconstruction.is_finite() && self.kl.is_finite()
  }

  pub fn scale(&self, factor: T) -> Self {
    Self {
      total: self.total * factor,
      reconstruction: self.reconstruction * factor,
      kl: self.kl * factor,
    }
  }
}

impl<T: Real> std::ops::Add for LossComponents<T> {
  type Output = Self;

  fn add(self, rhs: Self) -> Self {
    Self {
      total: self.total + rhs.total,
      reconstruction: self.reconstruction + rhs.reconstruction,
      kl: self.kl + rhs.kl,
    }
  }
}


/// `mean_batch(reconstruction + alpha * kl)` as a differentiable scalar,
/// together with its components.

pub fn objective<T: Real>(
  target: &Variable<T>,
  reconstruction: &Reconstruction<Variable<T>>,
  mu: &Variable<T>,
  log_sigma: &Variable<T>,
  alpha: T,
) -> (Variable<T>, LossComponents<T>) {
  let recon = reconstruction_loss(target, reconstruction);
  let kl = kl_divergence(mu, log_sigma);
  let total = (&recon + kl.scale(alpha)).mean(0);
  let components = LossComponents {
    total: total.item(),
    reconstruction: recon.tensor().mean(0).item(),
    kl: kl.tensor().mean(0).item(),
  };
  (total, components)
}
