use std::path::Path;

use itertools::Itertools;
use rand::Rng;
use serde::{ Serialize, Deserialize, de::DeserializeOwned };

use crate::{
  checkpoint,
  scalar::Real,
  tensor::Tensor,
  variable::Variable,
  error::{ Result, VaeError },
};

use super::{
  Encoder, Decoder, Sampler, Reconstruction, ReconstructionKind, LossComponents,
  loss,
};


/// Layer layout shared by encoder and decoder.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Architecture {
  pub input_size: usize,
  /// Width of the conditioning labels, zero for an unconditional model.
  pub label_size: usize,
  pub latent_size: usize,
  /// Hidden widths of the encoder. The decoder uses them in reverse.
  pub layer_sizes: Vec<usize>,
  /// Batch-normalize every hidden activation.
  pub batch_norm: bool,
  /// Batch-normalize the raw encoder input and the decoder latent.
  pub normalize_inputs: bool,
  pub reconstruction: ReconstructionKind,
  /// Log-variance outputs are clipped to `±log_var_limit`.
  pub log_var_limit: f64,
}

impl Architecture {
  pub fn validate(&self) -> Result<()> {
    if self.input_size == 0 {
      return Err(VaeError::InvalidConfig("input size must be positive".into()))
    }
    if self.latent_size == 0 {
      return Err(VaeError::InvalidConfig("latent size must be positive".into()))
    }
    if let Some(i) = self.layer_sizes.iter().position(|&width| width == 0 ) {
      return Err(VaeError::InvalidConfig(format!("hidden layer {i} has no units")))
    }
    if !(self.log_var_limit.is_finite() && self.log_var_limit > 0.0) {
      return Err(VaeError::InvalidConfig(format!("log-variance limit {} must be positive", self.log_var_limit)))
    }
    Ok(())
  }
}


/// Graph handles produced by one training pass of the full model.

#[derive(Debug, Clone)]
pub struct ForwardPass<T: Real> {
  pub mu: Variable<T>,
  pub log_sigma: Variable<T>,
  pub latent: Variable<T>,
  pub reconstruction: Reconstruction<Variable<T>>,
}

impl<T: Real> ForwardPass<T> {
  /// Training objective against `target`, with the KL term weighted by `alpha`.

  pub fn loss(&self, target: &Variable<T>, alpha: T) -> (Variable<T>, LossComponents<T>) {
    loss::objective(target, &self.reconstruction, &self.mu, &self.log_sigma, alpha)
  }
}


/// Variational autoencoder with optional conditioning labels.
///
/// Owns one encoder and one decoder. The encoder handle maps inputs to latent
/// means, the decoder handle maps latents to reconstructions, and the full
/// model chains both through the sampler. All three read the same weights.

#[derive(Debug)]
pub struct Vae<T: Real> {
  architecture: Architecture,
  encoder: Encoder<T>,
  decoder: Decoder<T>,
}

impl<T: Real> Vae<T> {
  pub fn new(architecture: Architecture, rng: &mut impl Rng) -> Result<Self> {
    architecture.validate()?;
    let encoder = Encoder::new(&architecture, rng);
    let decoder = Decoder::new(&architecture, rng);
    tracing::debug!(
      inputs = architecture.input_size,
      labels = architecture.label_size,
      latent = architecture.latent_size,
      hidden = ?architecture.layer_sizes,
      "built variational autoencoder"
    );
    Ok(Self { architecture, encoder, decoder })
  }

  pub fn architecture(&self) -> &Architecture {
    &self.architecture
  }

  pub fn encoder(&self) -> &Encoder<T> {
    &self.encoder
  }

  pub fn decoder(&self) -> &Decoder<T> {
    &self.decoder
  }

  pub fn is_conditional(&self) -> bool {
    self.architecture.label_size > 0
  }

  fn check_input(&self, input: &Tensor<T>) -> Result<()> {
    let found = if input.rank() == 2 { input.dims()[1] } else { 0 };
    if found != self.architecture.input_size {
      return Err(VaeError::InputWidth { expected: self.architecture.input_size, found })
    }
    if input.dims()[0] == 0 { return Err(VaeError::EmptyBatch) }
    Ok(())
  }

  fn check_labels(&self, rows: usize, labels: Option<&Tensor<T>>) -> Result<Option<Variable<T>>> {
    let expected = self.architecture.label_size;
    match labels {
      None if expected > 0 => Err(VaeError::MissingLabels(expected)),
      None => Ok(None),
      Some(_) if expected == 0 => Err(VaeError::UnexpectedLabels),
      Some(labels) => {
        let found = if labels.rank() == 2 { labels.dims()[1] } else { 0 };
        if found != expected {
          return Err(VaeError::LabelWidth { expected, found })
        }
        if labels.dims()[0] != rows {
          return Err(VaeError::BatchMismatch { batch: rows, labels: labels.dims()[0] })
        }
        Ok(Some(labels.tracked()))
      },
    }
  }

  /// Latent means for `input`, computed with running statistics.

  pub fn encode(&self, input: &Tensor<T>, labels: Option<&Tensor<T>>) -> Result<Tensor<T>> {
    Ok(self.encode_distribution(input, labels)?.0)
  }

  /// Latent means and log-variances for `input`, computed with running statistics.

  pub fn encode_distribution(&self, input: &Tensor<T>, labels: Option<&Tensor<T>>) -> Result<(Tensor<T>, Tensor<T>)> {
    self.check_input(input)?;
    let labels = self.check_labels(input.dims()[0], labels)?;
    let (mu, log_sigma) = self.encoder.run(&input.tracked(), labels.as_ref(), false);
    Ok((mu.tensor().detach(), log_sigma.tensor().detach()))
  }

  /// Reconstruction for given latent codes.

  pub fn decode(&self, latent: &Tensor<T>, labels: Option<&Tensor<T>>) -> Result<Reconstruction<Tensor<T>>> {
    let found = if latent.rank() == 2 { latent.dims()[1] } else { 0 };
    if found != self.architecture.latent_size {
      return Err(VaeError::InvalidConfig(format!(
        "latent codes have {found} columns, model expects {}", self.architecture.latent_size)))
    }
    if latent.dims()[0] == 0 { return Err(VaeError::EmptyBatch) }
    self.check_labels(latent.dims()[0], labels)?;
    Ok(self.decoder.generation_forward(latent, labels))
  }

  /// Decode `n` latent codes drawn from the standard normal prior.

  pub fn generate(&self, n: usize, labels: Option<&Tensor<T>>, rng: &mut impl Rng) -> Result<Reconstruction<Tensor<T>>> {
    let latent = Tensor::randn(&[n, self.architecture.latent_size], rng);
    self.decode(&latent, labels)
  }

  /// Encode to the latent mean and decode again, without sampling.

  pub fn reconstruct(&self, input: &Tensor<T>, labels: Option<&Tensor<T>>) -> Result<Reconstruction<Tensor<T>>> {
    let mu = self.encode(input, labels)?;
    self.decode(&mu, labels)
  }

  /// Differentiable pass through encoder, sampler and decoder using batch
  /// statistics.

  pub fn forward(&self, input: &Tensor<T>, labels: Option<&Tensor<T>>, sampler: &mut Sampler) -> Result<ForwardPass<T>> {
    self.run(input, labels, sampler, true)
  }

  /// Stochastic pass through the full model using running statistics.
  ///
  /// Decoding `latent` of the result with [decode](Self::decode) yields the
  /// same reconstruction.

  pub fn predict(&self, input: &Tensor<T>, labels: Option<&Tensor<T>>, sampler: &mut Sampler) -> Result<ForwardPass<T>> {
    self.run(input, labels, sampler, false)
  }

  fn run(&self, input: &Tensor<T>, labels: Option<&Tensor<T>>, sampler: &mut Sampler, train: bool) -> Result<ForwardPass<T>> {
    self.check_input(input)?;
    let labels = self.check_labels(input.dims()[0], labels)?;
    let (mu, log_sigma) = self.encoder.run(&input.tracked(), labels.as_ref(), train);
    let latent = sampler.sample(&mu, &log_sigma);
    let reconstruction = self.decoder.forward(&latent, labels.as_ref(), train);
    Ok(ForwardPass { mu, log_sigma, latent, reconstruction })
  }

  /// Every trainable parameter, each listed once.

  pub fn parameters(&self) -> Vec<Variable<T>> {
    self.encoder.parameters()
      .into_iter()
      .chain(self.decoder.parameters())
      .unique_by(|param| param.id() )
      .collect()
  }

  /// Parameters and running statistics, in checkpoint order.

  pub fn state(&self) -> Vec<Tensor<T>> {
    self.encoder.state()
      .into_iter()
      .chain(self.decoder.state())
      .collect()
  }

  pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
    checkpoint::save(path, &self.state())
  }

  /// Restore weights written by [save](Self::save) into this model.

  pub fn load_weights(&self, path: impl AsRef<Path>) -> Result<()> where T: DeserializeOwned {
    let loaded = checkpoint::load(path)?;
    checkpoint::restore(&self.state(), &loaded)
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use rand::{ SeedableRng, rngs::StdRng };

  fn architecture() -> Architecture {
    Architecture {
      input_size: 6,
      label_size: 3,
      latent_size: 2,
      layer_sizes: vec![10, 5],
      batch_norm: false,
      normalize_inputs: false,
      reconstruction: ReconstructionKind::Point,
      log_var_limit: 20.0,
    }
  }

  #[test]
  fn validation() {
    let mut arch = architecture();
    arch.layer_sizes = vec![4, 0];
    assert!(matches!(arch.validate(), Err(VaeError::InvalidConfig(_))));
    arch.layer_sizes = vec![];
    assert!(arch.validate().is_ok());
    arch.log_var_limit = f64::NAN;
    assert!(arch.validate().is_err());
  }

  #[test]
  fn labels_are_checked() {
    let mut rng = StdRng::seed_from_u64(0);
    let vae = Vae::<f32>::new(architecture(), &mut rng).unwrap();
    let input = Tensor::zeros(&[4, 6]);
    assert!(matches!(vae.encode(&input, None), Err(VaeError::MissingLabels(3))));
    let labels = Tensor::one_hot(&[0, 1, 2], 3);
    assert!(matches!(vae.encode(&input, Some(&labels)), Err(VaeError::BatchMismatch { batch: 4, labels: 3 })));
    let labels = Tensor::one_hot(&[0, 1, 2, 3], 4);
    assert!(matches!(vae.encode(&input, Some(&labels)), Err(VaeError::LabelWidth { expected: 3, found: 4 })));
    assert!(matches!(vae.encode(&Tensor::zeros(&[4, 5]), None), Err(VaeError::InputWidth { .. })));
  }

  #[test]
  fn layers_without_hidden_widths() {
    let mut rng = StdRng::seed_from_u64(0);
    let mut arch = architecture();
    arch.layer_sizes = vec![];
    arch.label_size = 0;
    let vae = Vae::<f64>::new(arch, &mut rng).unwrap();
    let out = vae.reconstruct(&Tensor::ones(&[2, 6]), None).unwrap();
    assert_eq!(out.mean().dims(), &[2, 6]);
  }

  #[test]
  fn empty_batches_are_rejected() {
    let mut rng = StdRng::seed_from_u64(0);
    let mut arch = architecture();
    arch.label_size = 0;
    arch.batch_norm = true;
    arch.normalize_inputs = true;
    let vae = Vae::<f64>::new(arch, &mut rng).unwrap();
    let empty = Tensor::zeros(&[0, 6]);
    assert!(matches!(vae.encode(&empty, None), Err(VaeError::EmptyBatch)));
    assert!(matches!(vae.forward(&empty, None, &mut Sampler::seeded(0)), Err(VaeError::EmptyBatch)));
    assert!(matches!(vae.predict(&empty, None, &mut Sampler::seeded(0)), Err(VaeError::EmptyBatch)));
    assert!(matches!(vae.decode(&Tensor::zeros(&[0, 2]), None), Err(VaeError::EmptyBatch)));
    assert!(matches!(vae.generate(0, None, &mut rng), Err(VaeError::EmptyBatch)));
  }

  #[test]
  fn shared_parameters_are_listed_once() {
    let mut rng = StdRng::seed_from_u64(0);
    let vae = Vae::<f32>::new(architecture(), &mut rng).unwrap();
    let params = vae.parameters();
    assert_eq!(params.len(), vae.encoder().parameters().len() + vae.decoder().parameters().len());
    assert_eq!(params.iter().map(|p| p.id() ).unique().count(), params.len());
  }
}
