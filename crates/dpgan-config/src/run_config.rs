//! The resolved run descriptor.
//!
//! `RunConfig` persists as one flat JSON object (`opt.txt`); the sections below
//! are flattened into it so the key set matches the command-line flag names.

use crate::error::{ConfigError, ConfigResult};
use crate::layout::OutputLayout;
use crate::types::{
    AdaptiveStat, AuxLossType, ConditionalArch, Dataset, DpMode, GradClipMode, GradientPenalty, ImmSensScalingMode,
    LabelEmbedding, ModelArch,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// Dataset, paths, devices and reproducibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSection {
    pub dataset: Dataset,
    pub data_path: Option<String>,
    pub label_path: Option<String>,
    pub label_attr: Option<String>,
    pub output_dir: Option<String>,
    pub download_mnist: bool,
    pub resume_path: Option<String>,
    pub resume_epochs: u32,
    pub keep_args: Vec<String>,
    pub g_device: String,
    pub d_device: String,
    pub num_workers: u32,
    pub profile_training: bool,
    /// Negative until resolved.
    pub manual_seed: i64,
    pub weights_seed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSection {
    pub model: ModelArch,
    pub im_size: u32,
    pub g_latent_dim: usize,
    pub conditional: bool,
    pub conditional_arch: ConditionalArch,
    pub g_label_emb_mode: LabelEmbedding,
    pub d_label_emb_mode: LabelEmbedding,
    pub n_classes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimSection {
    pub n_epochs: u32,
    pub g_lr: f64,
    pub d_lr: f64,
    pub weight_decay: f64,
    pub adam_b1: f64,
    pub adam_b2: f64,
    pub batch_size: u64,
    /// Micro-batch size for model-parallel training.
    pub batch_split_size: u64,
    pub train_set_size: u64,
    pub public_set_size: i64,
    /// Discriminator steps per generator step.
    pub n_d_steps: u32,
    /// Generator training is skipped until the discriminator adversarial loss drops below this.
    pub train_d_until_threshold: f64,
    pub warmup_iter: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivacySection {
    pub dp_mode: Option<DpMode>,
    pub delta: f64,
    /// Noise scale.
    pub sigma: f64,
    pub epsilon_budget: Option<f64>,
    pub grad_clip_split: bool,
    pub grad_clip_mode: GradClipMode,
    pub clipping_param: f64,
    pub clipping_param_per_layer: Option<Vec<f64>>,
    pub adaptive_scalar: f64,
    pub adaptive_stat: AdaptiveStat,
    pub imm_sens_per_param: bool,
    pub imm_sens_scaling_vec: Option<Vec<f64>>,
    pub imm_sens_scaling_mode: Option<ImmSensScalingMode>,
    pub smooth_sens_t: f64,
    pub tm_m: u32,
    pub tm_max_val: f64,
    pub tm_min_val: f64,
    pub tm_rho_per_epoch: f64,
    /// Batch size for trimmed-mean sensitivity; twice `batch_size` when unset.
    pub tm_sens_compute_bs: Option<u64>,
    pub backprop_clip: bool,
    pub bpc_back_clip_param: f64,
    pub bpc_back_clip_param_pl: Option<Vec<f64>>,
    pub bpc_forward_clip_param: f64,
    pub bpc_forward_clip_param_pl: Option<Vec<f64>>,
    pub bpc_auto_activation_scale: f64,
    pub bpc_auto_weight_grad_scale: f64,
    pub bpc_during_g_train: bool,
}

/// Auxiliary classification loss and gradient penalties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PenaltySection {
    pub aux_loss_type: AuxLossType,
    pub aux_loss_scalar: f64,
    pub aux_penalty: bool,
    pub d_fake_aux_loss: bool,
    pub penalty: Vec<GradientPenalty>,
    pub gp_lambda: Option<f64>,
    pub penalty_use_public_data: bool,
    pub num_mean_samples: i64,
    pub iter_on_mean_samples: u64,
    pub mean_sample_size: u64,
    pub mean_sample_noise_std: f64,
}

/// Checkpoint, logging and sampling intervals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSection {
    /// Epochs between checkpoints.
    pub save_every: u32,
    /// Samples between log lines; a positive multiple of `batch_size` once resolved.
    pub log_every: u64,
    /// Samples between image grids; a positive multiple of `batch_size` once resolved.
    pub sample_every: u64,
    pub sample_num: u32,
}

/// Fields computed from the rest of the descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedFlags {
    pub use_dp: bool,
    pub use_grad_clip_per_layer: bool,
    pub per_sample_grad: bool,
    pub is_acgan: bool,
    pub use_aux_loss: bool,
    /// Whole epochs between log lines, or -1 when the interval is shorter than an epoch.
    pub log_every_epochs: i64,
    /// Whole epochs between image grids, or -1 when the interval is shorter than an epoch.
    pub sample_every_epochs: i64,
}

impl DerivedFlags {
    #[must_use]
    pub fn compute(
        model: &ModelSection,
        privacy: &PrivacySection,
        optim: &OptimSection,
        schedule: &ScheduleSection,
    ) -> Self {
        Self {
            use_dp: privacy.dp_mode.is_some(),
            use_grad_clip_per_layer: privacy.grad_clip_mode.is_per_layer(),
            per_sample_grad: privacy.dp_mode.is_some_and(DpMode::needs_per_sample_grad),
            is_acgan: model.conditional && model.conditional_arch == ConditionalArch::Acgan,
            use_aux_loss: model.conditional
                && matches!(model.conditional_arch, ConditionalArch::Acgan | ConditionalArch::Wcgan),
            log_every_epochs: interval_in_epochs(schedule.log_every, optim.train_set_size),
            sample_every_epochs: interval_in_epochs(schedule.sample_every, optim.train_set_size),
        }
    }
}

/// Whole epochs covered by `interval` samples, or -1 for sub-epoch intervals.
#[must_use]
pub fn interval_in_epochs(interval: u64, train_set_size: u64) -> i64 {
    if train_set_size == 0 || interval < train_set_size {
        -1
    } else {
        i64::try_from(interval / train_set_size).unwrap_or(i64::MAX)
    }
}

/// Round `interval` down to a multiple of `batch_size`, never below one.
///
/// Returns `None` for a zero batch size.
#[must_use]
pub fn quantize_interval(interval: u64, batch_size: u64) -> Option<u64> {
    interval.checked_div(batch_size).map(|batches| (batches * batch_size).max(1))
}

/// Fully resolved configuration for one training run.
///
/// Treated as read-only once built; resumption produces a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(flatten)]
    pub run: RunSection,
    #[serde(flatten)]
    pub model: ModelSection,
    #[serde(flatten)]
    pub optim: OptimSection,
    #[serde(flatten)]
    pub privacy: PrivacySection,
    #[serde(flatten)]
    pub penalty: PenaltySection,
    #[serde(flatten)]
    pub schedule: ScheduleSection,
    #[serde(flatten)]
    pub derived: DerivedFlags,
}

impl RunConfig {
    /// Rebuild from the flat key/value form.
    pub fn from_map(map: Map<String, Value>) -> ConfigResult<Self> {
        Ok(serde_json::from_value(Value::Object(map))?)
    }

    /// Write the descriptor as pretty JSON.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Read a descriptor written by [`RunConfig::save`].
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let map = load_descriptor_map(path)?;
        Self::from_map(map).map_err(|e| match e {
            ConfigError::Json(source) => ConfigError::MalformedDescriptor { path: path.to_path_buf(), source },
            other => other,
        })
    }

    /// Write `opt.txt` into the output directory.
    pub fn persist(&self) -> ConfigResult<()> {
        self.save(&self.layout().descriptor_path())
    }

    /// Layout of this run's output directory.
    #[must_use]
    pub fn layout(&self) -> OutputLayout {
        OutputLayout::new(self.run.output_dir.clone().unwrap_or_default())
    }

    /// Resolved seed as an unsigned value.
    #[must_use]
    pub fn seed(&self) -> u64 {
        u64::try_from(self.run.manual_seed).unwrap_or_default()
    }

    /// Class count seen by the players: one when the run is unconditional.
    #[must_use]
    pub fn effective_classes(&self) -> usize {
        if self.model.conditional { self.model.n_classes } else { 1 }
    }
}

/// Read `path` as a flat JSON object.
pub fn load_descriptor_map(path: &Path) -> ConfigResult<Map<String, Value>> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::MissingDescriptor(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };
    serde_json::from_slice::<Map<String, Value>>(&bytes)
        .map_err(|source| ConfigError::MalformedDescriptor { path: path.to_path_buf(), source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_in_epochs() {
        assert_eq!(interval_in_epochs(100_000, 60_000), 1);
        assert_eq!(interval_in_epochs(600_000, 60_000), 10);
        assert_eq!(interval_in_epochs(20_000, 180_000), -1);
        assert_eq!(interval_in_epochs(10, 0), -1);
    }

    #[test]
    fn test_quantize_interval() {
        assert_eq!(quantize_interval(100_000, 600), Some(99_600));
        assert_eq!(quantize_interval(20_000, 128), Some(19_968));
        assert_eq!(quantize_interval(50, 128), Some(1));
        assert_eq!(quantize_interval(256, 128), Some(256));
    }

    #[test]
    fn test_quantize_interval_zero_batch() {
        assert_eq!(quantize_interval(100_000, 0), None);
        assert_eq!(quantize_interval(0, 0), None);
    }
}
