use approx::assert_abs_diff_eq;
use proptest::prelude::*;
use rand::{ SeedableRng, rngs::StdRng };

use microvae::{
  ops::*,
  Tensor, VaeError,
  optimize::{ Optimizer, SGD },
  train::Dataset,
  vae::{
    Vae, Architecture, Reconstruction, ReconstructionKind, Sampler, KlAnnealing,
    kl_divergence, mse, reparameterize,
    circle::{ CircleConfig, circle_samples },
    cvae::CvaeConfig,
  },
};


fn conditional(batch_norm: bool) -> Architecture {
  Architecture {
    input_size: 6,
    label_size: 3,
    latent_size: 2,
    layer_sizes: vec![12, 8],
    batch_norm,
    normalize_inputs: false,
    reconstruction: ReconstructionKind::Point,
    log_var_limit: 20.0,
  }
}


#[test]
fn encoder_and_decoder_shapes() {
  let mut rng = StdRng::seed_from_u64(0);
  let vae = Vae::<f64>::new(conditional(true), &mut rng).unwrap();
  let input = Tensor::randn(&[9, 6], &mut rng);
  let labels = Tensor::one_hot(&[0, 1, 2, 0, 1, 2, 0, 1, 2], 3);

  let (mu, log_sigma) = vae.encode_distribution(&input, Some(&labels)).unwrap();
  assert_eq!(mu.dims(), &[9, 2]);
  assert_eq!(log_sigma.dims(), &[9, 2]);

  let decoded = vae.decode(&mu, Some(&labels)).unwrap();
  assert_eq!(decoded.mean().dims(), &[9, 6]);

  let pass = vae.forward(&input, Some(&labels), &mut Sampler::seeded(0)).unwrap();
  assert_eq!(pass.latent.dims(), &[9, 2]);
  assert_eq!(pass.reconstruction.mean().dims(), &[9, 6]);
}

#[test]
fn sampler_with_zero_noise_returns_mean() {
  let mut rng = StdRng::seed_from_u64(1);
  let mu = Tensor::<f64>::randn(&[5, 3], &mut rng).tracked();
  let log_sigma = Tensor::randn(&[5, 3], &mut rng).tracked();
  let z = reparameterize(&mu, &log_sigma, &Tensor::zeros(&[5, 3]));
  assert_eq!(z.tensor(), mu.tensor());
}

#[test]
fn zero_batch_matches_closed_form() {
  let mu = Tensor::<f64>::zeros(&[3, 2]).tracked();
  let log_sigma = Tensor::zeros(&[3, 2]).tracked();
  let epsilon = Tensor::new(&[3, 2], vec![1.5, -0.5, 0.25, 2.0, -1.0, 0.0]);
  let z = reparameterize(&mu, &log_sigma, &epsilon);
  let expected = mu.tensor() + (log_sigma.tensor() * 0.5).exp() * &epsilon;
  assert!(z.tensor().max_difference(&expected) <= 1e-6);
}

#[test]
fn mse_vanishes_on_perfect_reconstruction() {
  let mut rng = StdRng::seed_from_u64(2);
  let x = Tensor::<f32>::randn(&[4, 7], &mut rng).tracked();
  assert_eq!(mse(&x, &x).tensor(), &Tensor::zeros(&[4]));
}

#[test]
fn annealing_is_monotonic_and_saturates() {
  let schedule = KlAnnealing::Linear { horizon: 800 };
  let alphas: Vec<f64> = (0..1000).map(|epoch| schedule.coefficient(epoch) ).collect();
  assert!(alphas.windows(2).all(|pair| pair[1] >= pair[0] ));
  assert_abs_diff_eq!(alphas[200], 0.25, epsilon = 1e-12);
  assert!(alphas[800..].iter().all(|&alpha| alpha == 1.0 ));
}

fn assert_paths_agree(vae: &Vae<f64>, input: &Tensor<f64>, labels: Option<&Tensor<f64>>, seed: u64) {
  // The full model in inference mode against the standalone decoder
  let pass = vae.predict(input, labels, &mut Sampler::seeded(seed)).unwrap();
  let latent = pass.latent.tensor().detach();
  let standalone = vae.decode(&latent, labels).unwrap();
  assert_eq!(pass.reconstruction.detach(), standalone);

  let tracked = labels.map(|labels| labels.tracked() );
  let graph = vae.decoder().forward(&latent.tracked(), tracked.as_ref(), false);
  assert_eq!(graph.detach(), standalone);
}

#[test]
fn decoder_paths_share_weights() {
  let mut rng = StdRng::seed_from_u64(3);
  let vae = Vae::<f64>::new(conditional(false), &mut rng).unwrap();
  let latent = Tensor::randn(&[4, 2], &mut rng);
  let labels = Tensor::one_hot(&[0, 1, 2, 1], 3);

  // Without batch normalization both modes compute exactly the same function
  let training = vae.decoder().training_forward(&latent.tracked(), Some(&labels.tracked()));
  let generation = vae.decode(&latent, Some(&labels)).unwrap();
  assert_eq!(training.detach(), generation);

  // An update through the full model is seen by the standalone decoder
  let input = Tensor::randn(&[4, 6], &mut rng);
  let pass = vae.forward(&input, Some(&labels), &mut Sampler::seeded(3)).unwrap();
  let (loss, _) = pass.loss(&input.tracked(), 1.0);
  Optimizer::new(0.1, SGD).minimize(&loss, &vae.parameters());

  let after = vae.decode(&latent, Some(&labels)).unwrap();
  assert_ne!(after, generation);
  let training = vae.decoder().training_forward(&latent.tracked(), Some(&labels.tracked()));
  assert_eq!(training.detach(), after);
  assert_paths_agree(&vae, &input, Some(&labels), 4);
}

#[test]
fn decoder_paths_agree_under_batch_norm() {
  let mut rng = StdRng::seed_from_u64(11);
  let cvae = CvaeConfig::new(6, 3, 2, &[12, 8]).build::<f64>(&mut rng).unwrap();
  assert!(cvae.model.architecture().batch_norm);
  let input = Tensor::randn(&[5, 6], &mut rng);
  let labels = Tensor::one_hot(&[0, 1, 2, 0, 1], 3);
  assert_paths_agree(&cvae.model, &input, Some(&labels), 0);

  // Still in agreement once training has moved weights and running statistics
  let pass = cvae.model.forward(&input, Some(&labels), &mut Sampler::seeded(1)).unwrap();
  let (loss, _) = pass.loss(&input.tracked(), 1.0);
  Optimizer::new(0.05, SGD).minimize(&loss, &cvae.model.parameters());
  assert_paths_agree(&cvae.model, &input, Some(&labels), 2);

  let circle = CircleConfig { hidden_units: 16, ..CircleConfig::default() }.build::<f64>(&mut rng).unwrap();
  let (_, points) = circle_samples(8, &mut rng);
  circle.forward(&points, None, &mut Sampler::seeded(3)).unwrap();
  assert_paths_agree(&circle, &points, None, 5);
}

#[test]
fn empty_batches_are_errors() {
  let mut rng = StdRng::seed_from_u64(12);
  let vae = CircleConfig { hidden_units: 8, ..CircleConfig::default() }.build::<f64>(&mut rng).unwrap();
  let empty = Tensor::zeros(&[0, 2]);
  assert!(matches!(vae.encode(&empty, None), Err(VaeError::EmptyBatch)));
  assert!(matches!(vae.forward(&empty, None, &mut Sampler::seeded(0)), Err(VaeError::EmptyBatch)));
  assert!(matches!(vae.generate(0, None, &mut rng), Err(VaeError::EmptyBatch)));
}

#[test]
fn decoder_parameters_are_model_parameters() {
  let mut rng = StdRng::seed_from_u64(4);
  let vae = Vae::<f32>::new(conditional(true), &mut rng).unwrap();
  let model: Vec<usize> = vae.parameters().iter().map(|p| p.id() ).collect();
  for param in vae.decoder().parameters() {
    assert!(model.contains(&param.id()));
  }
}

#[test]
fn checkpoint_restores_outputs() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("circle.bin");
  let config = CircleConfig { hidden_units: 16, ..CircleConfig::default() };

  let mut rng = StdRng::seed_from_u64(5);
  let trained = config.build::<f32>(&mut rng).unwrap();
  // Move running statistics away from their initial values
  let (_, points) = circle_samples(32, &mut rng);
  trained.forward(&points, None, &mut Sampler::seeded(5)).unwrap();
  trained.save(&path).unwrap();

  let restored = config.build::<f32>(&mut StdRng::seed_from_u64(99)).unwrap();
  let latent = Tensor::randn(&[8, 2], &mut rng);
  assert_ne!(restored.decode(&latent, None).unwrap(), trained.decode(&latent, None).unwrap());
  restored.load_weights(&path).unwrap();
  assert_eq!(restored.decode(&latent, None).unwrap(), trained.decode(&latent, None).unwrap());
  assert_eq!(restored.state(), trained.state());
}

#[test]
fn checkpoint_from_other_architecture_is_rejected() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("cvae.bin");
  let mut rng = StdRng::seed_from_u64(6);
  let small = CvaeConfig::new(6, 3, 2, &[8]).build::<f64>(&mut rng).unwrap();
  small.model.save(&path).unwrap();

  let wide = CvaeConfig::new(6, 3, 2, &[10]).build::<f64>(&mut rng).unwrap();
  assert!(matches!(wide.load_weights(&path), Err(VaeError::ShapeMismatch { .. })));
  let deep = CvaeConfig::new(6, 3, 2, &[8, 8]).build::<f64>(&mut rng).unwrap();
  assert!(matches!(deep.load_weights(&path), Err(VaeError::TensorCount { .. })));
}

#[test]
fn circle_training_lowers_loss() {
  let config = CircleConfig {
    samples: 400,
    hidden_units: 32,
    epochs: 15,
    batch_size: 50,
    learning_rate: 0.005,
    annealing_horizon: 10,
    ..CircleConfig::default()
  };
  let mut rng = StdRng::seed_from_u64(7);
  let (train, test) = config.dataset::<f64>(&mut rng).unwrap();
  assert_eq!((train.len(), test.len()), (360, 40));

  let vae = config.build(&mut rng).unwrap();
  let state = config.trainer().unwrap().fit(&vae, &train).unwrap();

  assert_eq!(state.epoch, 15);
  assert_eq!(state.alpha, 1.0);
  let first = state.history.first().unwrap();
  let last = state.last().unwrap();
  assert_eq!(first.alpha, 0.0);
  assert!(last.loss.reconstruction < first.loss.reconstruction);
}

#[test]
fn cvae_training_lowers_loss() {
  let mut rng = StdRng::seed_from_u64(8);
  let classes: Vec<usize> = (0..120).map(|i| i % 3 ).collect();
  let prototypes = Tensor::new(&[3, 6], vec![
    1.0, 1.0, 0.0, 0.0, 0.0, 0.0,
    0.0, 0.0, 1.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.0, 0.0, 1.0, 1.0,
  ]);
  let inputs = prototypes.select_rows(&classes) + Tensor::randn(&[120, 6], &mut rng) * 0.05;
  let data = Dataset::new(inputs, Some(Tensor::one_hot(&classes, 3))).unwrap();

  let config = CvaeConfig {
    learning_rate: Some(0.01),
    show_metrics: true,
    ..CvaeConfig::new(6, 3, 2, &[16])
  };
  let cvae = config.build::<f64>(&mut rng).unwrap();
  let state = cvae.compile(20, 20, 8).unwrap().fit(&cvae.model, &data).unwrap();
  let first = state.history.first().unwrap();
  let last = state.last().unwrap();
  assert!(last.loss.total < first.loss.total);
  assert!(state.history.iter().all(|m| m.alpha == 1.0 ));
}

#[test]
fn missing_labels_fail_training() {
  let mut rng = StdRng::seed_from_u64(9);
  let cvae = CvaeConfig::new(4, 2, 2, &[8]).build::<f32>(&mut rng).unwrap();
  let data = Dataset::unlabeled(Tensor::randn(&[10, 4], &mut rng)).unwrap();
  let err = cvae.compile(5, 1, 0).unwrap().fit(&cvae.model, &data).unwrap_err();
  assert!(matches!(err, VaeError::MissingLabels(2)));
}

#[test]
fn generated_gaussian_samples_follow_output_distribution() {
  let mut rng = StdRng::seed_from_u64(10);
  let config = CircleConfig { hidden_units: 8, ..CircleConfig::default() };
  let vae = config.build::<f64>(&mut rng).unwrap();
  let out = vae.generate(50, None, &mut rng).unwrap();
  let Reconstruction::Gaussian { mean, log_var } = &out else { panic!("expected a Gaussian") };
  let draws = out.sample(&mut rng);
  assert_eq!(draws.dims(), &[50, 2]);
  // Every draw lies within a generous number of standard deviations
  let bound = (log_var * 0.5).exp() * 8.0;
  assert!((&draws - mean).abs().lt(&bound).all());
}


proptest! {
  #[test]
  fn kl_is_never_negative(
    mu in proptest::collection::vec(-10.0f64..10.0, 6),
    log_sigma in proptest::collection::vec(-10.0f64..10.0, 6),
  ) {
    let kl = kl_divergence(
      &Tensor::new(&[3, 2], mu).tracked(),
      &Tensor::new(&[3, 2], log_sigma).tracked(),
    );
    prop_assert!(kl.param_iter().all(|value| value >= -1e-12 ));
  }

  #[test]
  fn kl_vanishes_only_at_prior(scale in 0.01f64..5.0) {
    let zeros = Tensor::<f64>::zeros(&[2, 2]).tracked();
    let kl = kl_divergence(&zeros, &zeros).sum(0).item();
    prop_assert_eq!(kl, 0.0);
    let shifted = Tensor::fill(&[2, 2], scale).tracked();
    prop_assert!(kl_divergence(&shifted, &zeros).sum(0).item() > 0.0);
  }
}
