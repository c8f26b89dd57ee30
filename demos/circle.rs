// Trains an unconditional VAE on points of the unit circle.

// The decoder predicts a mean and a log-variance per coordinate, and the KL
// term is faded in linearly over the annealing horizon. After training, the
// test set is encoded and decoded again, and fresh points are generated from
// the prior to check that they land near the circle.

use clap::Parser;
use rand::{ SeedableRng, rngs::StdRng };
use tracing_subscriber::EnvFilter;

use microvae::{ ops::*, Tensor, vae::circle::CircleConfig };

#[derive(Parser)]
#[command(about = "Fit a Gaussian VAE to points on the unit circle")]
struct Args {
  /// Training epochs
  #[arg(long, default_value_t = 150)]
  epochs: usize,

  /// Number of sampled points before the train/test split
  #[arg(long, default_value_t = 5000)]
  samples: usize,

  /// Epochs until the KL term reaches full weight
  #[arg(long, default_value_t = 800)]
  horizon: usize,

  #[arg(long, default_value_t = 0.0002)]
  learning_rate: f64,

  #[arg(long, default_value_t = 0)]
  seed: u64,

  /// Write the trained weights here
  #[arg(long)]
  save: Option<std::path::PathBuf>,
}

fn mean_radius(points: &Tensor<f32>) -> f32 {
  points.sqr().sum(-1).sqrt().mean(0).item()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
    .init();

  let args = Args::parse();
  let config = CircleConfig {
    epochs: args.epochs,
    samples: args.samples,
    annealing_horizon: args.horizon,
    learning_rate: args.learning_rate,
    seed: args.seed,
    ..CircleConfig::default()
  };

  let mut rng = StdRng::seed_from_u64(config.seed);
  let (train, test) = config.dataset::<f32>(&mut rng)?;
  let vae = config.build(&mut rng)?;
  let mut trainer = config.trainer()?;

  let state = trainer.fit(&vae, &train)?;
  if let Some(last) = state.last() {
    println!("Final loss {:.4} (reconstruction {:.4}, KL {:.4}, alpha {:.4})",
      last.loss.total, last.loss.reconstruction, last.loss.kl, last.alpha);
  }

  // Encode the held out points and decode their latent means
  let reconstructed = vae.reconstruct(test.inputs(), None)?;
  let error = (reconstructed.mean() - test.inputs()).sqr().mean(0).item();
  println!("Test reconstruction MSE: {error:.4}");

  // Sample the prior, then the output distribution
  let generated = vae.generate(1000, None, &mut rng)?.sample(&mut rng);
  println!("Mean radius of generated points: {:.3}", mean_radius(&generated));

  if let Some(path) = args.save {
    vae.save(&path)?;
    println!("Saved weights to {}", path.display());
  }

  Ok(())
}
