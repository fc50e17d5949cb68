//! Architecture variants and the player factory.

use crate::discriminator::{Discriminator, DiscriminatorBase, DiscriminatorSpec};
use crate::error::ModelResult;
use crate::generator::{Generator, GeneratorBase, GeneratorSpec};
use crate::loss::bce_with_logits;
use dpgan_config::{ModelArch, RunConfig};
use ndarray::Array1;
use std::fmt;
use tracing::debug;

/// Network family selected by the `model` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelVariant {
    /// Small convolutional pair trained with the standard GAN objective.
    Baseline,
    /// Deep residual pair trained as a Wasserstein critic.
    ResidualConv,
}

impl From<ModelArch> for ModelVariant {
    fn from(arch: ModelArch) -> Self {
        match arch {
            ModelArch::Vanilla => Self::Baseline,
            ModelArch::DeepConvResNet => Self::ResidualConv,
        }
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Baseline => write!(f, "baseline"),
            Self::ResidualConv => write!(f, "residual-conv"),
        }
    }
}

fn mean(values: &Array1<f32>) -> f32 {
    values.mean().unwrap_or(0.0)
}

pub struct BaselineGenerator {
    base: GeneratorBase,
}

impl Generator for BaselineGenerator {
    fn base(&self) -> &GeneratorBase {
        &self.base
    }

    fn loss(&self, d_output: &Array1<f32>) -> ModelResult<f32> {
        Ok(bce_with_logits(d_output.view(), 1.0))
    }
}

pub struct BaselineDiscriminator {
    base: DiscriminatorBase,
}

impl Discriminator for BaselineDiscriminator {
    fn base(&self) -> &DiscriminatorBase {
        &self.base
    }

    fn real_loss(&self, output: &Array1<f32>) -> ModelResult<f32> {
        Ok(bce_with_logits(output.view(), 1.0))
    }

    fn fake_loss(&self, output: &Array1<f32>) -> ModelResult<f32> {
        Ok(bce_with_logits(output.view(), 0.0))
    }
}

pub struct ResidualConvGenerator {
    base: GeneratorBase,
}

impl Generator for ResidualConvGenerator {
    fn base(&self) -> &GeneratorBase {
        &self.base
    }

    fn loss(&self, d_output: &Array1<f32>) -> ModelResult<f32> {
        Ok(-mean(d_output))
    }
}

pub struct ResidualConvDiscriminator {
    base: DiscriminatorBase,
}

impl Discriminator for ResidualConvDiscriminator {
    fn base(&self) -> &DiscriminatorBase {
        &self.base
    }

    fn real_loss(&self, output: &Array1<f32>) -> ModelResult<f32> {
        Ok(-mean(output))
    }

    fn fake_loss(&self, output: &Array1<f32>) -> ModelResult<f32> {
        Ok(mean(output))
    }
}

pub type BoxedGenerator = Box<dyn Generator + Send + Sync>;
pub type BoxedDiscriminator = Box<dyn Discriminator + Send + Sync>;

/// Build the generator/discriminator pair described by `config`.
///
/// # Errors
///
/// Fails when the discriminator cannot be built for the requested label
/// conditioning (see [`DiscriminatorBase::new`]).
pub fn build_players(config: &RunConfig) -> ModelResult<(BoxedGenerator, BoxedDiscriminator)> {
    let variant = ModelVariant::from(config.model.model);
    let g_spec = GeneratorSpec::from_config(config);
    let d_spec = DiscriminatorSpec::from_config(config);
    debug!(
        %variant,
        n_classes = d_spec.n_classes,
        conditional_arch = %d_spec.conditional_arch,
        "building players"
    );

    let g_base = GeneratorBase::new(g_spec);
    let d_base = DiscriminatorBase::new(d_spec)?;

    let players: (BoxedGenerator, BoxedDiscriminator) = match variant {
        ModelVariant::Baseline => (
            Box::new(BaselineGenerator { base: g_base }),
            Box::new(BaselineDiscriminator { base: d_base }),
        ),
        ModelVariant::ResidualConv => (
            Box::new(ResidualConvGenerator { base: g_base }),
            Box::new(ResidualConvDiscriminator { base: d_base }),
        ),
    };
    Ok(players)
}
