//! Variational autoencoders on a tiny automatic differentiation engine.
//! CPU only. Few dependencies.
//!
//! # Features
//!
//! - **Reverse-mode auto-grad**: [Variable]s record the operations applied to
//! them and back-propagate gradients to every trainable parameter involved.
//!
//! - **Broadcasting**: Tensors with differing but compatible shapes get
//! broadcasted to matching dimensions automatically.
//!
//! - **Shared weights**: Tensor storage is reference counted, so a layer used by
//! several graphs is updated for all of them by a single optimizer step.
//!
//! - **Variational autoencoders**: Encoder, reparameterized sampler, decoder and
//! the KL / reconstruction objective, in a conditional ([vae::cvae]) and an
//! annealed Gaussian ([vae::circle]) flavour.
//!
//! - **Optimization**: RMSprop, ADAM, SGD, Momentum and Nesterov strategies.
//!
//! # Examples
//!
//! Training a conditional VAE:
//! ```
//! use rand::{ SeedableRng, rngs::StdRng };
//! use microvae::{ Tensor, train::Dataset, vae::cvae::CvaeConfig };
//!
//! let mut rng = StdRng::seed_from_u64(0);
//!
//! // Four features, two classes, two latent dimensions
//! let cvae = CvaeConfig::new(4, 2, 2, &[8]).build::<f32>(&mut rng)?;
//!
//! let inputs = Tensor::randn(&[32, 4], &mut rng);
//! let labels = Tensor::one_hot(&[0, 1].repeat(16), 2);
//! let data = Dataset::new(inputs, Some(labels.clone()))?;
//!
//! let mut trainer = cvae.compile(8, 2, 0)?;
//! let state = trainer.fit(&cvae.model, &data)?;
//! assert_eq!(state.history.len(), 2);
//!
//! // Generate one sample per label row
//! let generated = cvae.model.generate(32, Some(&labels), &mut rng)?;
//! assert_eq!(generated.mean().dims(), &[32, 4]);
//! # Ok::<(), microvae::VaeError>(())
//! ```
//!
//! Minimizing a function with the engine alone:
//! ```
//! use rand::{ SeedableRng, rngs::StdRng };
//! use microvae::{ ops::*, Tensor, optimize::{ Optimizer, Adam } };
//!
//! let mut rng = StdRng::seed_from_u64(0);
//! let w = Tensor::randn(&[2, 8], &mut rng).trained();
//! let b = Tensor::zeros(&[8]).trained();
//! let mut optimizer = Optimizer::new(0.01, Adam::default());
//!
//! for _ in 0..100 {
//!   let x = Tensor::new(&[1, 2], vec![1.0, 2.0]).tracked();
//!   let loss = ((x.mm(&w) + &b).relu() - 0.5).sqr().mean(0);
//!   optimizer.minimize(&loss, &loss.parameters());
//! }
//! ```
//!
//! ## More examples
//! Check the `/demos` folder for the circle and conditional VAE pipelines.
//!
//!
//! # Optional features
//!
//! - `unsafe` *(default)*: Accelerated matrix math using the [matrixmultiply] crate.

mod internal;
mod shape;
mod tensor;
mod variable;
mod error;

pub mod ops;
pub mod scalar;
pub mod optimize;
pub mod checkpoint;
pub mod train;
pub mod vae;

pub use shape::Shape;
pub use tensor::Tensor;
pub use variable::{ Variable, Layer, Dense, BatchNorm, UnaryOp, BinaryOp };
pub use error::{ VaeError, Result };
