//! Variational autoencoders on top of the autodiff engine.
//!
//! [Vae] wires an [Encoder] and a [Decoder] together through the
//! reparameterized [Sampler]. The [cvae] and [circle] modules build the two
//! concrete pipelines.

mod block;
mod sampler;
mod encoder;
mod decoder;
mod loss;
mod anneal;
mod model;

pub mod cvae;
pub mod circle;

pub use sampler::{ Sampler, reparameterize };
pub use encoder::Encoder;
pub use decoder::{ Decoder, Reconstruction, ReconstructionKind };
pub use loss::{ LossComponents, kl_divergence, mse, gaussian_nll, reconstruction_loss, objective };
pub use anneal::{ KlAnnealing, TrainingState, EpochMetrics };
pub use model::{ Vae, Architecture, ForwardPass };
