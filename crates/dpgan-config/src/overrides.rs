//! Caller-supplied overrides and the parser-level defaults they sit on top of.

use crate::error::{ConfigError, ConfigResult};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// Keys that always take the current invocation's value when resuming.
pub const ALWAYS_KEEP_KEYS: &[&str] = &["g_device", "d_device", "num_workers", "resume_path", "resume_epochs"];

/// Derived keys: present in every descriptor but never user-settable.
pub const DERIVED_KEYS: &[&str] = &[
    "use_dp",
    "use_grad_clip_per_layer",
    "per_sample_grad",
    "is_acgan",
    "use_aux_loss",
    "log_every_epochs",
    "sample_every_epochs",
];

/// Parser-level defaults for every user-settable key.
///
/// `null` marks a key whose value comes from the dataset table (or stays unset).
#[must_use]
pub fn parser_defaults() -> Map<String, Value> {
    let defaults = json!({
        "weights_seed": 42,
        "manual_seed": -1,
        "dataset": null,
        "data_path": null,
        "label_path": null,
        "label_attr": null,
        "model": null,
        "im_size": null,
        "download_mnist": false,
        "output_dir": null,
        "resume_path": null,
        "resume_epochs": 0,
        "keep_args": [],
        "n_epochs": null,
        "d_lr": null,
        "g_lr": null,
        "weight_decay": 0.0,
        "batch_size": null,
        "batch_split_size": null,
        "train_set_size": null,
        "g_device": "cpu",
        "d_device": "cpu",
        "num_workers": 8,
        "g_latent_dim": null,
        "n_d_steps": null,
        "train_d_until_threshold": 1e10,
        "conditional": false,
        "g_label_emb_mode": null,
        "d_label_emb_mode": null,
        "conditional_arch": "ACGAN",
        "n_classes": null,
        "aux_loss_type": null,
        "aux_loss_scalar": 1.0,
        "aux_penalty": true,
        "d_fake_aux_loss": true,
        "adam_b1": null,
        "adam_b2": null,
        "penalty": null,
        "gp_lambda": null,
        "public_set_size": 0,
        "num_mean_samples": 0,
        "penalty_use_public_data": true,
        "warmup_iter": 0,
        "iter_on_mean_samples": null,
        "mean_sample_size": null,
        "mean_sample_noise_std": null,
        "delta": null,
        "sigma": null,
        "epsilon_budget": null,
        "dp_mode": null,
        "imm_sens_per_param": false,
        "imm_sens_scaling_vec": null,
        "imm_sens_scaling_mode": null,
        "grad_clip_split": true,
        "grad_clip_mode": null,
        "clipping_param": null,
        "clipping_param_per_layer": null,
        "adaptive_scalar": 1.5,
        "adaptive_stat": "mean",
        "smooth_sens_t": 0.01,
        "tm_m": null,
        "tm_max_val": null,
        "tm_min_val": null,
        "tm_rho_per_epoch": 10.0,
        "tm_sens_compute_bs": null,
        "backprop_clip": false,
        "bpc_back_clip_param": 0.01,
        "bpc_back_clip_param_pl": null,
        "bpc_forward_clip_param": 20.0,
        "bpc_forward_clip_param_pl": null,
        "bpc_auto_activation_scale": 0.2,
        "bpc_auto_weight_grad_scale": 1e-3,
        "bpc_during_g_train": true,
        "save_every": null,
        "log_every": null,
        "sample_every": null,
        "sample_num": null,
        "profile_training": false,
    });

    match defaults {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Whether `key` names a user-settable field.
#[must_use]
pub fn is_known_key(key: &str) -> bool {
    parser_defaults().contains_key(key)
}

/// State of one key in an override set.
///
/// `Explicit(Value::Null)` and `Explicit(false)` are kept distinct from `Unset`
/// here; the resolver decides how to treat them.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Setting {
    #[default]
    Unset,
    Explicit(Value),
}

impl Setting {
    #[must_use]
    pub fn as_explicit(&self) -> Option<&Value> {
        match self {
            Self::Unset => None,
            Self::Explicit(v) => Some(v),
        }
    }
}

/// A set of explicitly supplied values, keyed by descriptor field name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    settings: BTreeMap<String, Setting>,
}

impl Overrides {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an explicit value for `key`.
    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> ConfigResult<&mut Self> {
        if !is_known_key(key) {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }
        self.settings.insert(key.to_string(), Setting::Explicit(serde_json::to_value(value)?));
        Ok(self)
    }

    /// Builder form of [`Overrides::set`].
    pub fn with<T: Serialize>(mut self, key: &str, value: T) -> ConfigResult<Self> {
        self.set(key, value)?;
        Ok(self)
    }

    /// Set `key` only when a value was supplied.
    pub fn set_opt<T: Serialize>(&mut self, key: &str, value: Option<T>) -> ConfigResult<&mut Self> {
        match value {
            Some(v) => self.set(key, v),
            None => Ok(self),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> &Setting {
        static UNSET: Setting = Setting::Unset;
        self.settings.get(key).unwrap_or(&UNSET)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    /// Merge `other` into `self`; explicit values in `other` win.
    pub fn extend(&mut self, other: &Self) {
        for (key, setting) in &other.settings {
            if let Setting::Explicit(_) = setting {
                self.settings.insert(key.clone(), setting.clone());
            }
        }
    }

    /// Values as seen by the current invocation: parser defaults with explicit
    /// overrides applied, before any dataset defaults.
    #[must_use]
    pub fn invocation_values(&self) -> Map<String, Value> {
        let mut values = parser_defaults();
        for (key, setting) in &self.settings {
            if let Setting::Explicit(v) = setting {
                values.insert(key.clone(), v.clone());
            }
        }
        values
    }

    /// Parse overrides from a flat TOML table.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let table: toml::Table =
            toml::from_str(content).map_err(|e| ConfigError::InvalidValue(format!("override table: {e}")))?;
        let mut overrides = Self::new();
        for (key, value) in table {
            overrides.set(&key, value)?;
        }
        Ok(overrides)
    }

    /// Load overrides from a TOML file.
    pub fn from_toml_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::OverrideFile { path: path.to_path_buf(), message: e.to_string() })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::UnknownKey(_) => e,
            other => ConfigError::OverrideFile { path: path.to_path_buf(), message: other.to_string() },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parser_defaults_cover_whole_table() {
        let defaults = parser_defaults();
        assert!(defaults.len() >= 75, "only {} parser defaults", defaults.len());
        assert_eq!(defaults["weights_seed"], json!(42));
        assert_eq!(defaults["profile_training"], json!(false));
        assert!(ALWAYS_KEEP_KEYS.iter().all(|k| defaults.contains_key(*k)));
    }

    #[test]
    fn test_set_rejects_unknown_key() {
        let mut overrides = Overrides::new();
        let err = overrides.set("batch_sise", 10).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownKey(k) if k == "batch_sise"));
    }

    #[test]
    fn test_derived_keys_are_not_settable() {
        for key in DERIVED_KEYS {
            assert!(!is_known_key(key), "{key} must not be user-settable");
        }
        let mut overrides = Overrides::new();
        assert!(overrides.set("use_dp", true).is_err());
    }

    #[test]
    fn test_explicit_false_is_distinct_from_unset() {
        let overrides = Overrides::new().with("conditional", false).unwrap();
        assert_eq!(overrides.get("conditional"), &Setting::Explicit(Value::Bool(false)));
        assert_eq!(overrides.get("aux_penalty"), &Setting::Unset);
    }

    #[test]
    fn test_invocation_values_layer_over_parser_defaults() {
        let overrides = Overrides::new().with("num_workers", 16).unwrap();
        let values = overrides.invocation_values();
        assert_eq!(values["num_workers"], json!(16));
        assert_eq!(values["g_device"], json!("cpu"));
        assert_eq!(values["batch_size"], Value::Null);
    }

    #[test]
    fn test_extend_keeps_explicit_values_from_other() {
        let mut base = Overrides::new().with("batch_size", 64).unwrap().with("g_lr", 0.1).unwrap();
        let cli = Overrides::new().with("batch_size", 32).unwrap();
        base.extend(&cli);
        assert_eq!(base.get("batch_size").as_explicit(), Some(&json!(32)));
        assert_eq!(base.get("g_lr").as_explicit(), Some(&json!(0.1)));
    }

    #[test]
    fn test_from_toml_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("overrides.toml");
        std::fs::write(
            &path,
            r#"
batch_size = 64
dp_mode = "gc"
penalty = ["WGAN-GP", "DRAGAN1"]
"#,
        )
        .unwrap();

        let overrides = Overrides::from_toml_file(&path).unwrap();
        assert_eq!(overrides.get("batch_size").as_explicit(), Some(&json!(64)));
        assert_eq!(overrides.get("penalty").as_explicit(), Some(&json!(["WGAN-GP", "DRAGAN1"])));
    }

    #[test]
    fn test_from_toml_file_missing() {
        let err = Overrides::from_toml_file(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::OverrideFile { .. }));
    }
}
