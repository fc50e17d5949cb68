//! Turns caller overrides plus a dataset's defaults into a validated [`RunConfig`],
//! or splices a whitelisted set of overrides into a persisted one on resume.

use crate::dataset::{DatasetRegistry, DefaultTable};
use crate::error::{ConfigError, ConfigResult};
use crate::layout::{with_trailing_slash, OutputLayout, DESCRIPTOR_FILE};
use crate::overrides::{is_known_key, Overrides, ALWAYS_KEEP_KEYS};
use crate::run_config::{
    load_descriptor_map, quantize_interval, DerivedFlags, ModelSection, OptimSection, PenaltySection, PrivacySection,
    RunConfig, RunSection, ScheduleSection,
};
use crate::seed::{generate_seed, initialize_reproducibility};
use crate::types::{ConditionalArch, Dataset, ImmSensScalingMode, LabelEmbedding, ModelArch};
use chrono::{DateTime, Local};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Directory-valued keys that always carry a trailing separator.
const DIRECTORY_KEYS: &[&str] = &["data_path", "resume_path", "output_dir"];

/// Advisory raised while resolving; resolution continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// WCGAN's auxiliary term does not go through the generic penalty path.
    AuxPenaltyDisabled,
    /// DP-trained Wasserstein critics should not early-stop discriminator training.
    DiscriminatorThresholdDisabled,
    BackpropClipExperimental,
    /// Penalties are computed per sample because no public partition or mean samples exist.
    PenaltyWithoutPublicData,
}

impl Notice {
    #[must_use]
    pub const fn is_warning(self) -> bool {
        matches!(self, Self::PenaltyWithoutPublicData)
    }

    fn emit(self) -> Self {
        if self.is_warning() {
            warn!("{self}");
        } else {
            info!("{self}");
        }
        self
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::AuxPenaltyDisabled => "Setting aux_penalty to false due to using WCGAN.",
            Self::DiscriminatorThresholdDisabled => {
                "Setting train_d_until_threshold to -1, which is generally recommended for WGAN using DP."
            }
            Self::BackpropClipExperimental => {
                "Backpropagation clipping implementation is experimental and not finished."
            }
            Self::PenaltyWithoutPublicData => {
                "Currently configured to calculate penalty per-sample. It is strongly recommended that you use \
                 public data or mean samples for gradient penalties when using grad clipping."
            }
        };
        f.write_str(text)
    }
}

/// Outcome of a resolution.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub config: RunConfig,
    pub notices: Vec<Notice>,
    /// True when the descriptor was loaded from a checkpoint.
    pub resumed: bool,
}

impl Resolution {
    #[must_use]
    pub fn into_config(self) -> RunConfig {
        self.config
    }
}

/// Builds run descriptors for fresh and resumed runs.
#[derive(Debug, Clone)]
pub struct Resolver {
    registry: DatasetRegistry,
    output_root: PathBuf,
    timestamp: Option<DateTime<Local>>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new(DatasetRegistry::builtin())
    }
}

impl Resolver {
    #[must_use]
    pub fn new(registry: DatasetRegistry) -> Self {
        Self { registry, output_root: PathBuf::from("output"), timestamp: None }
    }

    /// Parent directory for synthesized output directories.
    #[must_use]
    pub fn with_output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.output_root = root.into();
        self
    }

    /// Pin the time used to name synthesized output directories.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Local>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Resume when the overrides name a `resume_path`, otherwise resolve a fresh run.
    pub fn resolve_or_resume(&self, dataset: Dataset, overrides: &Overrides) -> ConfigResult<Resolution> {
        match overrides.invocation_values().get("resume_path") {
            Some(Value::String(path)) if !path.is_empty() => self.resume(dataset, overrides),
            _ => self.resolve(dataset, overrides),
        }
    }

    /// Resolve a fresh run.
    ///
    /// Validation completes before the output directory is created or the process
    /// seed is initialized, so a rejected configuration leaves no side effects.
    pub fn resolve(&self, dataset: Dataset, overrides: &Overrides) -> ConfigResult<Resolution> {
        let mut values = overrides.invocation_values();
        values.insert("dataset".to_string(), serde_json::to_value(dataset)?);
        fill_defaults(&mut values, self.registry.table(dataset)?);
        normalize_directories(&mut values);

        let run: RunSection = section(&values, "run")?;
        let model: ModelSection = section(&values, "model")?;
        let mut optim: OptimSection = section(&values, "optim")?;
        let privacy: PrivacySection = section(&values, "privacy")?;
        let mut penalty: PenaltySection = section(&values, "penalty")?;
        let raw_schedule: ScheduleSection = section(&values, "schedule")?;

        check_sizes(&optim)?;

        let derived = DerivedFlags::compute(&model, &privacy, &optim, &raw_schedule);
        let schedule = ScheduleSection {
            log_every: quantized(raw_schedule.log_every, optim.batch_size)?,
            sample_every: quantized(raw_schedule.sample_every, optim.batch_size)?,
            ..raw_schedule
        };

        let mut notices = Vec::new();
        if model.conditional_arch == ConditionalArch::Wcgan && penalty.aux_penalty {
            penalty.aux_penalty = false;
            notices.push(Notice::AuxPenaltyDisabled.emit());
        }
        if model.model == ModelArch::DeepConvResNet && derived.use_dp {
            optim.train_d_until_threshold = -1.0;
            notices.push(Notice::DiscriminatorThresholdDisabled.emit());
        }
        if privacy.backprop_clip {
            notices.push(Notice::BackpropClipExperimental.emit());
        }

        let draft = RunConfig { run, model, optim, privacy, penalty, schedule, derived };
        if let Some(notice) = validate(&draft)? {
            notices.push(notice.emit());
        }

        let layout = match draft.run.output_dir.as_deref() {
            Some(dir) if !dir.is_empty() => OutputLayout::new(dir),
            _ => OutputLayout::timestamped(
                &self.output_root,
                self.timestamp.unwrap_or_else(Local::now),
                dataset,
                &draft.run.g_device,
                &draft.run.d_device,
            ),
        };
        layout.ensure_dirs()?;

        let manual_seed = if draft.run.manual_seed < 0 { generate_seed() } else { draft.run.manual_seed };
        initialize_reproducibility(manual_seed.unsigned_abs());

        let config = RunConfig {
            run: RunSection { output_dir: Some(layout.display_root()), manual_seed, ..draft.run },
            ..draft
        };
        debug!(
            dataset = %dataset,
            output_dir = %layout.root().display(),
            seed = manual_seed,
            "resolved run configuration"
        );

        Ok(Resolution { config, notices, resumed: false })
    }

    /// Resume from the descriptor stored under the `resume_path` override.
    ///
    /// The persisted descriptor is trusted as already valid: only the keys in
    /// [`ALWAYS_KEEP_KEYS`] plus the caller's `keep_args` take the current
    /// invocation's values, and `output_dir` becomes the resume path. `dataset`
    /// is part of the current invocation, so keeping it takes the positional
    /// dataset. Nothing is re-derived, created or reseeded.
    pub fn resume(&self, dataset: Dataset, overrides: &Overrides) -> ConfigResult<Resolution> {
        let mut current = overrides.invocation_values();
        current.insert("dataset".to_string(), serde_json::to_value(dataset)?);
        normalize_directories(&mut current);

        let resume_path = match current.get("resume_path") {
            Some(Value::String(path)) if !path.is_empty() => path.clone(),
            _ => return Err(ConfigError::InvalidValue("resume requires resume_path".to_string())),
        };
        let descriptor = Path::new(&resume_path).join(DESCRIPTOR_FILE);
        let mut loaded = load_descriptor_map(&descriptor)?;

        for key in keep_keys(&current)? {
            let value = current.get(&key).cloned().unwrap_or(Value::Null);
            loaded.insert(key, value);
        }
        loaded.insert("output_dir".to_string(), Value::String(resume_path.clone()));

        let config: RunConfig = serde_json::from_value(Value::Object(loaded))
            .map_err(|source| ConfigError::MalformedDescriptor { path: descriptor.clone(), source })?;
        debug!(resume_path = %resume_path, "resumed run configuration");

        Ok(Resolution { config, notices: Vec::new(), resumed: true })
    }
}

/// Substitute table values for keys the caller left unset.
///
/// A value of `null` or `false` counts as unset, so an explicit `false` for a key
/// the dataset table defines is replaced by the table's value. Numeric zero is
/// kept.
fn fill_defaults(values: &mut Map<String, Value>, table: &DefaultTable) {
    for (key, default) in table {
        let unset = matches!(values.get(key), None | Some(Value::Null | Value::Bool(false)));
        if unset {
            values.insert(key.clone(), default.clone());
        }
    }
}

fn normalize_directories(values: &mut Map<String, Value>) {
    for key in DIRECTORY_KEYS {
        if let Some(Value::String(path)) = values.get_mut(*key) {
            *path = with_trailing_slash(path);
        }
    }
}

fn section<T: DeserializeOwned>(values: &Map<String, Value>, name: &str) -> ConfigResult<T> {
    serde_json::from_value(Value::Object(values.clone()))
        .map_err(|e| ConfigError::InvalidValue(format!("{name} settings: {e}")))
}

fn keep_keys(current: &Map<String, Value>) -> ConfigResult<Vec<String>> {
    let mut keys: Vec<String> = match current.get("keep_args") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(ConfigError::InvalidValue(format!("keep_args entry {other} is not a key name"))),
            })
            .collect::<ConfigResult<_>>()?,
        Some(Value::Null) | None => Vec::new(),
        Some(other) => return Err(ConfigError::InvalidValue(format!("keep_args must be a list, got {other}"))),
    };
    keys.extend(ALWAYS_KEEP_KEYS.iter().map(|k| (*k).to_string()));
    keys.sort();
    keys.dedup();

    if let Some(unknown) = keys.iter().find(|k| !is_known_key(k)) {
        return Err(ConfigError::UnknownKey(unknown.clone()));
    }
    Ok(keys)
}

/// Batch and training-set sizes divide intervals and epochs, so zero is rejected.
fn check_sizes(optim: &OptimSection) -> ConfigResult<()> {
    if optim.batch_size == 0 {
        return Err(ConfigError::InvalidValue("batch_size must be at least 1".to_string()));
    }
    if optim.train_set_size == 0 {
        return Err(ConfigError::InvalidValue("train_set_size must be at least 1".to_string()));
    }
    Ok(())
}

fn quantized(interval: u64, batch_size: u64) -> ConfigResult<u64> {
    quantize_interval(interval, batch_size)
        .ok_or_else(|| ConfigError::InvalidValue("batch_size must be at least 1".to_string()))
}

/// Cross-field checks; returns the per-sample penalty warning when it applies.
fn validate(config: &RunConfig) -> ConfigResult<Option<Notice>> {
    let privacy = &config.privacy;
    let penalty = &config.penalty;
    let public_set_size = config.optim.public_set_size;
    let num_mean_samples = penalty.num_mean_samples;

    if privacy.imm_sens_per_param
        && !matches!(privacy.imm_sens_scaling_mode, None | Some(ImmSensScalingMode::Standard))
    {
        let mode = privacy.imm_sens_scaling_mode.map(|m| m.to_string()).unwrap_or_default();
        return Err(ConfigError::ImmSensScalingConflict { mode });
    }

    if public_set_size > 0 && num_mean_samples > 0 {
        return Err(ConfigError::PartitionConflict { public_set_size, num_mean_samples });
    }

    let mut notice = None;
    let no_public_data = public_set_size < 1 && num_mean_samples < 1;
    if !penalty.penalty.is_empty() && config.derived.use_dp && no_public_data {
        if penalty.penalty_use_public_data {
            return Err(ConfigError::PenaltyRequiresPublicData);
        }
        notice = Some(Notice::PenaltyWithoutPublicData);
    }

    let model = &config.model;
    if model.model == ModelArch::Vanilla
        && (model.g_label_emb_mode != LabelEmbedding::Concat || model.d_label_emb_mode != LabelEmbedding::Concat)
    {
        return Err(ConfigError::EmbeddingRequiresConcat {
            model: model.model.to_string(),
            g_mode: model.g_label_emb_mode.to_string(),
            d_mode: model.d_label_emb_mode.to_string(),
        });
    }

    Ok(notice)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fill_defaults_treats_false_and_null_as_unset() {
        let mut values = Map::new();
        values.insert("imm_sens_per_param".to_string(), json!(false));
        values.insert("batch_size".to_string(), Value::Null);
        values.insert("public_set_size".to_string(), json!(0));
        values.insert("sigma".to_string(), json!(2.5));

        let mut table = DefaultTable::new();
        table.insert("imm_sens_per_param".to_string(), json!(true));
        table.insert("batch_size".to_string(), json!(128));
        table.insert("public_set_size".to_string(), json!(7));
        table.insert("sigma".to_string(), json!(0.5));

        fill_defaults(&mut values, &table);
        assert_eq!(values["imm_sens_per_param"], json!(true));
        assert_eq!(values["batch_size"], json!(128));
        assert_eq!(values["public_set_size"], json!(0));
        assert_eq!(values["sigma"], json!(2.5));
    }

    #[test]
    fn test_normalize_directories() {
        let mut values = Map::new();
        values.insert("data_path".to_string(), json!("/data/mnist"));
        values.insert("output_dir".to_string(), json!(""));
        values.insert("label_path".to_string(), json!("/data/labels.txt"));
        normalize_directories(&mut values);
        assert_eq!(values["data_path"], json!("/data/mnist/"));
        assert_eq!(values["output_dir"], json!(""));
        assert_eq!(values["label_path"], json!("/data/labels.txt"));
    }

    #[test]
    fn test_keep_keys_union_with_always_kept() {
        let mut current = Map::new();
        current.insert("keep_args".to_string(), json!(["n_epochs"]));
        let keys = keep_keys(&current).unwrap();
        assert!(keys.contains(&"n_epochs".to_string()));
        for key in ALWAYS_KEEP_KEYS {
            assert!(keys.contains(&(*key).to_string()));
        }
    }

    #[test]
    fn test_keep_keys_rejects_unknown() {
        let mut current = Map::new();
        current.insert("keep_args".to_string(), json!(["use_dp"]));
        assert!(matches!(keep_keys(&current), Err(ConfigError::UnknownKey(k)) if k == "use_dp"));
    }

    #[test]
    fn test_notice_severity() {
        assert!(Notice::PenaltyWithoutPublicData.is_warning());
        assert!(!Notice::AuxPenaltyDisabled.is_warning());
        assert!(Notice::AuxPenaltyDisabled.to_string().contains("WCGAN"));
    }
}
