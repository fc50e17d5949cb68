//! dpgan models
//!
//! The generator/discriminator contract shared by every network variant,
//! including the class-conditional auxiliary loss.

pub mod discriminator;
pub mod error;
pub mod generator;
pub mod loss;
pub mod variant;

pub use discriminator::{Discriminator, DiscriminatorBase, DiscriminatorOutput, DiscriminatorSpec};
pub use error::{ModelError, ModelResult};
pub use generator::{Generator, GeneratorBase, GeneratorSpec, LatentSampler};
pub use loss::{bce_with_logits, one_hot, sigmoid, CrossEntropyLoss};
pub use variant::{build_players, BoxedDiscriminator, BoxedGenerator, ModelVariant};
