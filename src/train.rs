//! Mini-batch training driver.

use rand::{ SeedableRng, rngs::StdRng, seq::SliceRandom };
use serde::{ Serialize, Deserialize };

use crate::{
  scalar::Real,
  tensor::Tensor,
  optimize::{ Optimizer, Strategy },
  error::{ Result, VaeError },
  vae::{ Vae, Sampler, KlAnnealing, TrainingState, EpochMetrics, LossComponents },
};


/// Row-aligned inputs with optional conditioning labels.

#[derive(Debug, Clone)]
pub struct Dataset<T: Real> {
  inputs: Tensor<T>,
  labels: Option<Tensor<T>>,
}

impl<T: Real> Dataset<T> {
  pub fn new(inputs: Tensor<T>, labels: Option<Tensor<T>>) -> Result<Self> {
    if inputs.rank() != 2 {
      return Err(VaeError::InvalidConfig(format!("inputs must be a matrix, got {:?}", inputs.dims())))
    }
    if let Some(labels) = &labels {
      if labels.rank() != 2 {
        return Err(VaeError::InvalidConfig(format!("labels must be a matrix, got {:?}", labels.dims())))
      }
      if labels.dims()[0] != inputs.dims()[0] {
        return Err(VaeError::BatchMismatch { batch: inputs.dims()[0], labels: labels.dims()[0] })
      }
    }
    Ok(Self { inputs, labels })
  }

  pub fn unlabeled(inputs: Tensor<T>) -> Result<Self> {
    Self::new(inputs, None)
  }

  pub fn len(&self) -> usize {
    self.inputs.dims()[0]
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn inputs(&self) -> &Tensor<T> {
    &self.inputs
  }

  pub fn labels(&self) -> Option<&Tensor<T>> {
    self.labels.as_ref()
  }

  /// Split into `(train, test)`, where the test set is the leading
  /// `test_fraction` of rows and the training set is the rest.

  pub fn split(&self, test_fraction: f64) -> Result<(Self, Self)> {
    if !(0.0..=1.0).contains(&test_fraction) {
      return Err(VaeError::InvalidConfig(format!("test fraction {test_fraction} is outside [0, 1]")))
    }
    let n = self.len();
    let n_test = (n as f64 * test_fraction).floor() as usize;
    let test: Vec<usize> = (0..n_test).collect();
    let train: Vec<usize> = (n_test..n).collect();
    Ok((self.subset(&train), self.subset(&test)))
  }

  pub fn subset(&self, indices: &[usize]) -> Self {
    let (inputs, labels) = self.batch(indices);
    Self { inputs, labels }
  }

  pub fn batch(&self, indices: &[usize]) -> (Tensor<T>, Option<Tensor<T>>) {
    (
      self.inputs.select_rows(indices),
      self.labels.as_ref().map(|labels| labels.select_rows(indices) ),
    )
  }

  /// Row indices grouped into batches of at most `size`, optionally shuffled.

  pub fn batches(&self, size: usize, shuffle: Option<&mut StdRng>) -> Vec<Vec<usize>> {
    let mut order: Vec<usize> = (0..self.len()).collect();
    if let Some(rng) = shuffle {
      order.shuffle(rng);
    }
    order.chunks(size.max(1)).map(|chunk| chunk.to_vec() ).collect()
  }
}


/// Knobs of the training loop.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
  pub batch_size: usize,
  pub epochs: usize,
  pub shuffle: bool,
  /// Seeds both batch shuffling and the sampler's noise.
  pub seed: u64,
  pub annealing: KlAnnealing,
  /// Log reconstruction and KL terms next to the total loss.
  pub report_components: bool,
}

impl Default for TrainingConfig {
  fn default() -> Self {
    Self {
      batch_size: 100,
      epochs: 150,
      shuffle: true,
      seed: 0,
      annealing: KlAnnealing::Off,
      report_components: false,
    }
  }
}

impl TrainingConfig {
  pub fn validate(&self) -> Result<()> {
    if self.batch_size == 0 {
      return Err(VaeError::InvalidConfig("batch size must be positive".into()))
    }
    Ok(())
  }
}


/// Fits a [Vae] by differentiating its objective over mini-batches.

#[derive(Debug)]
pub struct Trainer<T: Real, S: Strategy<T>> {
  optimizer: Optimizer<T, S>,
  config: TrainingConfig,
  sampler: Sampler,
  rng: StdRng,
}

impl<T: Real, S: Strategy<T>> Trainer<T, S> {
  pub fn new(optimizer: Optimizer<T, S>, config: TrainingConfig) -> Result<Self> {
    config.validate()?;
    Ok(Self {
      sampler: Sampler::seeded(config.seed.wrapping_add(1)),
      rng: StdRng::seed_from_u64(config.seed),
      optimizer,
      config,
    })
  }

  pub fn config(&self) -> &TrainingConfig {
    &self.config
  }

  pub fn optimizer(&self) -> &Optimizer<T, S> {
    &self.optimizer
  }

  /// Train for the configured number of epochs.

  pub fn fit(&mut self, model: &Vae<T>, data: &Dataset<T>) -> Result<TrainingState<T>> {
    if data.is_empty() {
      return Err(VaeError::InvalidConfig("cannot train on an empty dataset".into()))
    }
    tracing::info!(samples = data.len(), epochs = self.config.epochs,
      batch_size = self.config.batch_size, "training started");

    let mut state = TrainingState::new(self.config.annealing);
    for _ in 0..self.config.epochs {
      let metrics = self.run_epoch(model, data, &state)?;
      let loss = metrics.loss;
      if self.config.report_components {
        tracing::info!(
          epoch = metrics.epoch,
          loss = %loss.total,
          reconstruction = %loss.reconstruction,
          kl = %loss.kl,
          alpha = %metrics.alpha,
          "epoch finished"
        );
      } else {
        tracing::info!(epoch = metrics.epoch, loss = %loss.total, "epoch finished");
      }
      state = state.advance(metrics);
    }
    Ok(state)
  }

  /// One pass over `data` with the KL weight taken from `state`.

  pub fn run_epoch(&mut self, model: &Vae<T>, data: &Dataset<T>, state: &TrainingState<T>) -> Result<EpochMetrics<T>> {
    let params = model.parameters();
    let shuffle = if self.config.shuffle { Some(&mut self.rng) } else { None };
    let batches = data.batches(self.config.batch_size, shuffle);

    let mut sum = LossComponents::zero();
    let mut seen = 0;
    for indices in &batches {
      let (inputs, labels) = data.batch(indices);
      let pass = model.forward(&inputs, labels.as_ref(), &mut self.sampler)?;
      let (loss, components) = pass.loss(&inputs.tracked(), state.alpha);
      if !components.is_finite() {
        tracing::warn!(epoch = state.epoch, seen, "loss is not finite");
        return Err(VaeError::NonFiniteLoss { epoch: state.epoch })
      }
      self.optimizer.minimize(&loss, &params);
      tracing::trace!(epoch = state.epoch, batch = indices.len(), loss = %components.total, "batch done");
      sum = sum + components.scale(T::from(indices.len()).unwrap());
      seen += indices.len();
    }

    Ok(EpochMetrics {
      epoch: state.epoch,
      loss: sum.scale(T::one() / T::from(seen.max(1)).unwrap()),
      alpha: state.alpha,
      batches: batches.len(),
    })
  }
}
