use serde::{ Serialize, Deserialize };

use crate::scalar::Real;

use super::LossComponents;


/// Weighting schedule for the KL term.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KlAnnealing {
  /// Full KL weight from the first epoch on.
  #[default]
  Off,
  /// Ramp linearly from 0 to 1 over `horizon` epochs, then hold at 1.
  Linear { horizon: usize },
}

impl KlAnnealing {
  /// KL weight in effect during `epoch` (zero based).

  pub fn coefficient<T: Real>(&self, epoch: usize) -> T {
    match *self {
      Self::Off | Self::Linear { horizon: 0 } => T::one(),
      Self::Linear { horizon } => {
        T::from(epoch.min(horizon)).unwrap() / T::from(horizon).unwrap()
      },
    }
  }
}


/// Summary of one finished epoch.

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics<T: Real> {
  pub epoch: usize,
  pub loss: LossComponents<T>,
  pub alpha: T,
  pub batches: usize,
}


/// Everything the training loop carries from one epoch to the next.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingState<T: Real> {
  pub epoch: usize,
  pub alpha: T,
  pub schedule: KlAnnealing,
  pub history: Vec<EpochMetrics<T>>,
}

impl<T: Real> TrainingState<T> {
  pub fn new(schedule: KlAnnealing) -> Self {
    Self {
      epoch: 0,
      alpha: schedule.coefficient(0),
      schedule,
      history: vec![],
    }
  }

  /// Fold a finished epoch into the state and move on to the next one.

  pub fn advance(mut self, metrics: EpochMetrics<T>) -> Self {
    self.epoch += 1;
    self.alpha = self.schedule.coefficient(self.epoch);
    self.history.push(metrics);
    self
  }

  pub fn last(&self) -> Option<&EpochMetrics<T>> {
    self.history.last()
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use proptest::prelude::*;

  fn metrics(epoch: usize, alpha: f64) -> EpochMetrics<f64> {
    EpochMetrics { epoch, loss: LossComponents::zero(), alpha, batches: 1 }
  }

  #[test]
  fn linear_ramp() {
    let schedule = KlAnnealing::Linear { horizon: 4 };
    let alphas: Vec<f64> = (0..7).map(|e| schedule.coefficient(e) ).collect();
    assert_eq!(alphas, vec![0.0, 0.25, 0.5, 0.75, 1.0, 1.0, 1.0]);
    assert_eq!(KlAnnealing::Off.coefficient::<f64>(0), 1.0);
    assert_eq!(KlAnnealing::Linear { horizon: 0 }.coefficient::<f64>(0), 1.0);
  }

  #[test]
  fn advance_records_history() {
    let state = TrainingState::<f64>::new(KlAnnealing::Linear { horizon: 800 });
    assert_eq!(state.alpha, 0.0);
    let state = state.advance(metrics(0, 0.0));
    let state = state.advance(metrics(1, 1.0 / 800.0));
    assert_eq!(state.epoch, 2);
    assert_eq!(state.alpha, 2.0 / 800.0);
    assert_eq!(state.history.len(), 2);
    assert_eq!(state.last().map(|m| m.epoch ), Some(1));
  }

  proptest! {
    #[test]
    fn coefficient_is_monotonic(horizon in 1usize..1000, epoch in 0usize..2000) {
      let schedule = KlAnnealing::Linear { horizon };
      let now: f64 = schedule.coefficient(epoch);
      let next: f64 = schedule.coefficient(epoch + 1);
      prop_assert!(next >= now);
      prop_assert!((0.0..=1.0).contains(&now));
      if epoch < horizon {
        prop_assert!((now - epoch as f64 / horizon as f64).abs() < 1e-12);
      } else {
        prop_assert_eq!(now, 1.0);
      }
    }
  }
}
