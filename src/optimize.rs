use std::fmt::Debug;
use std::str::FromStr;
use std::collections::HashMap;

use serde::{ Serialize, Deserialize };

use crate::{
  scalar::Real,
  tensor::Tensor,
  variable::Variable,
  ops::RealOps,
  error::VaeError,
};


/// An optimization strategy to be used with [Optimizer].
///
/// Strategies receive the gradient of one parameter at a time and return the
/// change to be added to its weights. Per-parameter state is keyed by the
/// parameter's id.

pub trait Strategy<R: Real>: Debug {
  fn update(&mut self, id: usize, grad: &Tensor<R>, rate: R, step: usize) -> Tensor<R>;
}

impl<R: Real, S: Strategy<R> + ?Sized> Strategy<R> for Box<S> {
  fn update(&mut self, id: usize, grad: &Tensor<R>, rate: R, step: usize) -> Tensor<R> {
    (**self).update(id, grad, rate, step)
  }
}


/// Generic optimizer that allows for several optimization [strategies](Strategy) to be used.

#[derive(Debug)]
pub struct Optimizer<R: Real, S: Strategy<R>> {
  strategy: S,
  pub learning_rate: R,
  step: usize,
}

impl<R: Real, S: Strategy<R>> Optimizer<R, S> {
  pub fn new(learning_rate: R, strategy: S) -> Self {
    Self { strategy, learning_rate, step: 1 }
  }

  /// Number of completed updates.

  pub fn steps(&self) -> usize {
    self.step - 1
  }

  /// Back-propagate `loss`, move every trainable parameter in `params`
  /// along its gradient and reset the graph's gradients.

  pub fn minimize(&mut self, loss: &Variable<R>, params: &[Variable<R>]) {
    loss.backward();

    for param in params {
      // Constants have no gradient to follow
      let Some(grad) = param.grad() else { continue };
      let change = self.strategy.update(param.id(), grad, self.learning_rate, self.step);
      let weights = param.tensor();
      weights.assign(&(weights + change));
    }

    loss.reset();
    self.step += 1;
  }
}


/// Stochastic Gradient Descent strategy

#[derive(Debug, Clone, Default)]
pub struct SGD;

impl<R: Real> Strategy<R> for SGD {
  fn update(&mut self, _id: usize, grad: &Tensor<R>, rate: R, _step: usize) -> Tensor<R> {
    grad * -rate
  }
}


/// Stochastic Gradient Descent with momentum

#[derive(Debug, Clone)]
pub struct Momentum<R: Real> {
  pub momentum: R,
  v: HashMap<usize, Tensor<R>>,
}

impl<R: Real> Momentum<R> {
  pub fn new(momentum: R) -> Self {
    Self {
      momentum,
      v: HashMap::new(),
    }
  }
}

impl<R: Real> Default for Momentum<R> {
  fn default() -> Self {
    Self::new(R::from(0.9).unwrap())
  }
}

impl<R: Real> Strategy<R> for Momentum<R> {
  fn update(&mut self, id: usize, grad: &Tensor<R>, rate: R, _step: usize) -> Tensor<R> {
    let v = self.v.entry(id).or_insert_with(|| Tensor::zeros(grad.dims()) );
    v.assign(&(&*v * self.momentum - grad * rate));
    v.detach()
  }
}


/// Stochastic Gradient Descent with Nesterov momentum

#[derive(Debug, Clone)]
pub struct Nesterov<R: Real> {
  pub momentum: R,
  v: HashMap<usize, Tensor<R>>,
}

impl<R: Real> Nesterov<R> {
  pub fn new(momentum: R) -> Self {
    Self {
      momentum,
      v: HashMap::new(),
    }
  }
}

impl<R: Real> Default for Nesterov<R> {
  fn default() -> Self {
    Self::new(R::from(0.9).unwrap())
  }
}

impl<R: Real> Strategy<R> for Nesterov<R> {
  fn update(&mut self, id: usize, grad: &Tensor<R>, rate: R, _step: usize) -> Tensor<R> {
    let v = self.v.entry(id).or_insert_with(|| Tensor::zeros(grad.dims()) );
    let v_prev = v.detach();
    v.assign(&(&v_prev * self.momentum - grad * rate));
    v_prev * -self.momentum + &*v * (R::one() + self.momentum)
  }
}


/// Root mean square propagation (RMSprop)
///
/// Divides the gradient by a running root mean square of its recent
/// magnitudes.

#[derive(Debug, Clone)]
pub struct RmsProp<R: Real> {
  pub rho: R,
  pub epsilon: R,
  v: HashMap<usize, Tensor<R>>,
}

impl<R: Real> RmsProp<R> {
  pub fn new(rho: R, epsilon: R) -> Self {
    Self {
      rho,
      epsilon,
      v: HashMap::new(),
    }
  }
}

impl<R: Real> Default for RmsProp<R> {
  fn default() -> Self {
    Self::new(R::from(0.9).unwrap(), R::from(1e-7).unwrap())
  }
}

impl<R: Real> Strategy<R> for RmsProp<R> {
  fn update(&mut self, id: usize, grad: &Tensor<R>, rate: R, _step: usize) -> Tensor<R> {
    let v = self.v.entry(id).or_insert_with(|| Tensor::zeros(grad.dims()) );
    v.assign(&(&*v * self.rho + grad.sqr() * (R::one() - self.rho)));
    grad * -rate / (v.sqrt() + self.epsilon)
  }
}


/// Adaptive Movement Estimation strategy (ADAM)

#[derive(Debug, Clone)]
pub struct Adam<R: Real> {
  pub beta1: R,
  pub beta2: R,
  m: HashMap<usize, Tensor<R>>,
  v: HashMap<usize, Tensor<R>>,
}

impl<R: Real> Adam<R> {
  pub fn new(beta1: R, beta2: R) -> Self {
    Self {
      beta1,
      beta2,
      m: HashMap::new(),
      v: HashMap::new(),
    }
  }
}

impl<R: Real> Default for Adam<R> {
  fn default() -> Self {
    Self::new(R::from(0.9).unwrap(), R::from(0.999).unwrap())
  }
}

impl<R: Real> Strategy<R> for Adam<R> {
  fn update(&mut self, id: usize, grad: &Tensor<R>, rate: R, step: usize) -> Tensor<R> {
    let m = self.m.entry(id).or_insert_with(|| Tensor::zeros(grad.dims()) ).clone();
    let v = self.v.entry(id).or_insert_with(|| Tensor::zeros(grad.dims()) ).clone();
    m.assign(&(&m * self.beta1 + grad       * (R::one() - self.beta1)));
    v.assign(&(&v * self.beta2 + grad.sqr() * (R::one() - self.beta2)));
    let step = R::from(step).unwrap();
    let mt = &m / (R::one() - self.beta1.powf(step));
    let vt = &v / (R::one() - self.beta2.powf(step));
    mt * -rate / (vt.sqrt() + R::from(1e-8).unwrap())
  }
}


/// Optimizer selection by name, as accepted in model configurations.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
  #[default]
  RmsProp,
  Sgd,
  Momentum,
  Nesterov,
  Adam,
}

impl StrategyKind {
  pub fn build<R: Real>(self) -> Box<dyn Strategy<R>> {
    match self {
      Self::RmsProp => Box::new(RmsProp::default()),
      Self::Sgd => Box::new(SGD),
      Self::Momentum => Box::new(Momentum::default()),
      Self::Nesterov => Box::new(Nesterov::default()),
      Self::Adam => Box::new(Adam::default()),
    }
  }

  /// Conventional starting learning rate for this strategy.

  pub fn default_learning_rate<R: Real>(self) -> R {
    let rate = match self {
      Self::Sgd | Self::Momentum | Self::Nesterov => 0.01,
      Self::RmsProp | Self::Adam => 0.001,
    };
    R::from(rate).unwrap()
  }

  pub fn optimizer<R: Real>(self, learning_rate: R) -> Optimizer<R, Box<dyn Strategy<R>>> {
    Optimizer::new(learning_rate, self.build())
  }
}

impl FromStr for StrategyKind {
  type Err = VaeError;

  fn from_str(name: &str) -> Result<Self, Self::Err> {
    match name.trim().to_ascii_lowercase().as_str() {
      "rmsprop" => Ok(Self::RmsProp),
      "sgd" => Ok(Self::Sgd),
      "momentum" => Ok(Self::Momentum),
      "nesterov" => Ok(Self::Nesterov),
      "adam" => Ok(Self::Adam),
      _ => Err(VaeError::UnknownOptimizer(name.to_string())),
    }
  }
}

impl std::fmt::Display for StrategyKind {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    let name = match self {
      Self::RmsProp => "rmsprop",
      Self::Sgd => "sgd",
      Self::Momentum => "momentum",
      Self::Nesterov => "nesterov",
      Self::Adam => "adam",
    };
    write!(f, "{name}")
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::ops::*;

  // (w - 3)² has its minimum at w = 3
  fn descend(kind: StrategyKind, rate: f64, steps: usize) -> f64 {
    let w = Tensor::vec(&[0.0]).trained();
    let mut optimizer = kind.optimizer(rate);
    for _ in 0..steps {
      let loss = (&w - 3.0).sqr().sum(0);
      optimizer.minimize(&loss, &loss.parameters());
    }
    assert_eq!(optimizer.steps(), steps);
    w.tensor().to_vec()[0]
  }

  #[test]
  fn strategies_find_minimum() {
    assert!((descend(StrategyKind::Sgd, 0.1, 100) - 3.0).abs() < 1e-3);
    assert!((descend(StrategyKind::Momentum, 0.05, 300) - 3.0).abs() < 1e-2);
    assert!((descend(StrategyKind::Nesterov, 0.05, 300) - 3.0).abs() < 1e-2);
    assert!((descend(StrategyKind::RmsProp, 0.01, 1000) - 3.0).abs() < 0.1);
    assert!((descend(StrategyKind::Adam, 0.05, 1000) - 3.0).abs() < 0.1);
  }

  #[test]
  fn gradients_are_reset() {
    let w = Tensor::vec(&[1.0, -1.0]).trained();
    let mut optimizer = Optimizer::new(0.1, SGD);
    let loss = (&w * &w).sum(0);
    optimizer.minimize(&loss, &[w.clone()]);
    assert_eq!(w.grad(), Some(&Tensor::vec(&[0.0, 0.0])));
    assert!(w.tensor().max_difference(&Tensor::vec(&[0.8, -0.8])) < 1e-12);
  }

  #[test]
  fn parse_names() {
    assert_eq!("rmsprop".parse::<StrategyKind>().unwrap(), StrategyKind::RmsProp);
    assert_eq!("Adam".parse::<StrategyKind>().unwrap(), StrategyKind::Adam);
    assert_eq!(StrategyKind::default(), StrategyKind::RmsProp);
    assert!(matches!("adagrad".parse::<StrategyKind>(), Err(VaeError::UnknownOptimizer(_))));
    assert_eq!(StrategyKind::Nesterov.to_string(), "nesterov");
  }
}
