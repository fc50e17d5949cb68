//! Discriminator role and the shared conditional auxiliary loss.

use crate::error::{ModelError, ModelResult};
use crate::loss::{one_hot, sigmoid, CrossEntropyLoss};
use dpgan_config::{AuxLossType, ConditionalArch, ConfigError, LabelEmbedding, RunConfig};
use ndarray::{Array1, Array2, ArrayD, Axis};
use tracing::trace;

#[derive(Debug, Clone, PartialEq)]
pub struct DiscriminatorSpec {
    pub n_classes: usize,
    pub emb_mode: LabelEmbedding,
    pub conditional_arch: ConditionalArch,
    pub aux_loss_type: AuxLossType,
    pub aux_loss_scalar: f32,
}

impl Default for DiscriminatorSpec {
    fn default() -> Self {
        Self {
            n_classes: 0,
            emb_mode: LabelEmbedding::Concat,
            conditional_arch: ConditionalArch::Cgan,
            aux_loss_type: AuxLossType::Wasserstein,
            aux_loss_scalar: 1.0,
        }
    }
}

impl DiscriminatorSpec {
    #[must_use]
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            n_classes: config.effective_classes(),
            emb_mode: config.model.d_label_emb_mode,
            conditional_arch: config.model.conditional_arch,
            aux_loss_type: config.penalty.aux_loss_type,
            aux_loss_scalar: config.penalty.aux_loss_scalar as f32,
        }
    }
}

/// Output of a discriminator forward pass.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscriminatorOutput {
    /// One adversarial score per sample.
    pub scores: Array1<f32>,
    /// `[batch, n_classes]` class logits when the auxiliary head was requested.
    pub aux_logits: Option<Array2<f32>>,
}

/// State every discriminator carries.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscriminatorBase {
    n_classes: usize,
    /// `None` once an ACGAN head replaces label conditioning.
    emb_mode: Option<LabelEmbedding>,
    conditional_arch: ConditionalArch,
    aux_loss_type: AuxLossType,
    aux_loss_scalar: f32,
    aux_criterion: Option<CrossEntropyLoss>,
}

impl DiscriminatorBase {
    /// Validate `spec` and build the shared discriminator state.
    ///
    /// # Errors
    ///
    /// [`ConfigError::DiscriminatorEmbedUnsupported`] when more than one class
    /// is requested in `embed` mode.
    pub fn new(spec: DiscriminatorSpec) -> ModelResult<Self> {
        let mut emb_mode = Some(spec.emb_mode);
        let mut aux_criterion = None;

        if spec.n_classes > 1 {
            if spec.emb_mode == LabelEmbedding::Embed {
                return Err(ConfigError::DiscriminatorEmbedUnsupported.into());
            }
            if spec.conditional_arch == ConditionalArch::Acgan {
                emb_mode = None;
                if spec.aux_loss_type == AuxLossType::CrossEntropy {
                    aux_criterion = Some(CrossEntropyLoss);
                }
            }
        }

        Ok(Self {
            n_classes: spec.n_classes,
            emb_mode,
            conditional_arch: spec.conditional_arch,
            aux_loss_type: spec.aux_loss_type,
            aux_loss_scalar: spec.aux_loss_scalar,
            aux_criterion,
        })
    }

    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    #[must_use]
    pub fn emb_mode(&self) -> Option<LabelEmbedding> {
        self.emb_mode
    }

    #[must_use]
    pub fn conditional_arch(&self) -> ConditionalArch {
        self.conditional_arch
    }

    #[must_use]
    pub fn aux_criterion(&self) -> Option<&CrossEntropyLoss> {
        self.aux_criterion.as_ref()
    }

    /// Auxiliary classification loss over `[batch, n_classes]` outputs.
    ///
    /// ACGAN with the Wasserstein type pushes the sigmoid of the correct class
    /// up and every other class down, each row weighted by the inverse
    /// frequency of its label in the batch. WCGAN contributes nothing.
    pub fn aux_loss(&self, output: &Array2<f32>, labels: &[usize], fake: bool) -> ModelResult<f32> {
        match self.conditional_arch {
            ConditionalArch::Wcgan => {
                if !fake {
                    trace!("no auxiliary term for real samples under WCGAN");
                }
                return Ok(0.0);
            }
            ConditionalArch::Cgan => {
                return Err(ModelError::not_implemented("auxiliary loss for CGAN"));
            }
            ConditionalArch::Acgan => {}
        }

        self.check_aux_shapes(output, labels)?;

        match self.aux_loss_type {
            AuxLossType::Wasserstein => {
                let encoded = one_hot(labels, self.n_classes)?;
                let counts = encoded.sum_axis(Axis(0));
                let divisor = Array1::from_iter(labels.iter().map(|&l| counts[l])).insert_axis(Axis(1));
                let signs = encoded.mapv(|v| v.mul_add(-2.0, 1.0));
                let weighted = signs * output.mapv(sigmoid) / &divisor;
                Ok(self.aux_loss_scalar * weighted.sum())
            }
            AuxLossType::CrossEntropy => {
                let criterion = self
                    .aux_criterion
                    .as_ref()
                    .ok_or_else(|| ModelError::not_implemented("cross-entropy criterion for this discriminator"))?;
                Ok(self.aux_loss_scalar * criterion.forward(output.view(), labels)?)
            }
        }
    }

    fn check_aux_shapes(&self, output: &Array2<f32>, labels: &[usize]) -> ModelResult<()> {
        if output.ncols() != self.n_classes {
            return Err(ModelError::Shape(format!(
                "auxiliary output has {} columns, expected {}",
                output.ncols(),
                self.n_classes
            )));
        }
        if output.nrows() != labels.len() {
            return Err(ModelError::Shape(format!("{} output rows for {} labels", output.nrows(), labels.len())));
        }
        if let Some(&label) = labels.iter().find(|&&l| l >= self.n_classes) {
            return Err(ModelError::LabelOutOfRange { label, n_classes: self.n_classes });
        }
        Ok(())
    }
}

/// Capability surface of a discriminator.
pub trait Discriminator {
    fn base(&self) -> &DiscriminatorBase;

    fn discriminate(&self, x: &ArrayD<f32>, labels: Option<&[usize]>, aux: bool) -> ModelResult<DiscriminatorOutput> {
        let _ = (x, labels, aux);
        Err(ModelError::not_implemented("Discriminator::discriminate"))
    }

    /// Adversarial loss on scores for real samples.
    fn real_loss(&self, output: &Array1<f32>) -> ModelResult<f32> {
        let _ = output;
        Err(ModelError::not_implemented("Discriminator::real_loss"))
    }

    /// Adversarial loss on scores for generated samples.
    fn fake_loss(&self, output: &Array1<f32>) -> ModelResult<f32> {
        let _ = output;
        Err(ModelError::not_implemented("Discriminator::fake_loss"))
    }

    fn aux_loss(&self, output: &Array2<f32>, labels: &[usize], fake: bool) -> ModelResult<f32> {
        self.base().aux_loss(output, labels, fake)
    }
}

impl Discriminator for DiscriminatorBase {
    fn base(&self) -> &DiscriminatorBase {
        self
    }
}
