// Trains a conditional VAE on synthetic labeled data.

// Every class owns a random prototype vector and its examples are noisy copies
// of it. Once trained, the decoder is asked for new examples of each class,
// which should come out closer to their own prototype than to any other.

use clap::Parser;
use rand::{ Rng, SeedableRng, rngs::StdRng };
use tracing_subscriber::EnvFilter;

use microvae::{ ops::*, Tensor, train::Dataset, vae::cvae::CvaeConfig };

#[derive(Parser)]
#[command(about = "Fit a conditional VAE to noisy class prototypes")]
struct Args {
  #[arg(long, default_value_t = 16)]
  features: usize,

  #[arg(long, default_value_t = 4)]
  classes: usize,

  #[arg(long, default_value_t = 250)]
  per_class: usize,

  /// Hidden layer widths of the encoder, reversed for the decoder
  #[arg(long, value_delimiter = ',', default_value = "64,32")]
  layers: Vec<usize>,

  /// One of rmsprop, sgd, momentum, nesterov, adam
  #[arg(long, default_value = "rmsprop")]
  optimizer: String,

  #[arg(long, default_value_t = 30)]
  epochs: usize,

  #[arg(long, default_value_t = 50)]
  batch_size: usize,

  /// Log reconstruction and KL terms per epoch
  #[arg(long)]
  show_metrics: bool,

  #[arg(long, default_value_t = 0)]
  seed: u64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
    .init();

  let args = Args::parse();
  let mut rng = StdRng::seed_from_u64(args.seed);

  let prototypes = Tensor::<f32>::uniform(&[args.classes, args.features], -1.0, 1.0, &mut rng);
  let classes: Vec<usize> = (0..args.classes * args.per_class)
    .map(|_| rng.gen_range(0, args.classes) )
    .collect();
  let noise = Tensor::randn(&[classes.len(), args.features], &mut rng) * 0.1;
  let inputs = prototypes.select_rows(&classes) + noise;
  let data = Dataset::new(inputs, Some(Tensor::one_hot(&classes, args.classes)))?;

  let config = CvaeConfig {
    optimizer: args.optimizer,
    show_metrics: args.show_metrics,
    ..CvaeConfig::new(args.features, args.classes, 2, &args.layers)
  };
  let cvae = config.build::<f32>(&mut rng)?;
  let mut trainer = cvae.compile(args.batch_size, args.epochs, args.seed)?;
  let state = trainer.fit(&cvae.model, &data)?;
  if let Some(last) = state.last() {
    println!("Final loss {:.4}", last.loss.total);
  }

  // Generate a batch per class and compare it with every prototype
  for class in 0..args.classes {
    let labels = Tensor::one_hot(&vec![class; 100], args.classes);
    let generated = cvae.model.generate(100, Some(&labels), &mut rng)?;
    let center = generated.mean().mean_over(0);
    let distances: Vec<f32> = (0..args.classes)
      .map(|other| (&center - &prototypes.row(other)).sqr().mean(0).item().sqrt() )
      .collect();
    println!("class {class}: RMS distance to prototypes {distances:.3?}");
  }

  Ok(())
}
