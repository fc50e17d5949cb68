//! Per-dataset default tables.

use crate::error::{ConfigError, ConfigResult};
use crate::overrides::is_known_key;
use crate::types::Dataset;
use serde_json::{json, Map, Value};
use std::collections::HashMap;

/// Flat table of descriptor keys to default values.
pub type DefaultTable = Map<String, Value>;

/// Registry mapping a dataset to its default table.
#[derive(Debug, Clone, Default)]
pub struct DatasetRegistry {
    tables: HashMap<Dataset, DefaultTable>,
}

impl DatasetRegistry {
    /// Empty registry with no datasets.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the MNIST and CelebA tables.
    #[must_use]
    pub fn builtin() -> Self {
        let mut tables = HashMap::new();
        tables.insert(Dataset::Mnist, object(mnist_defaults()));
        tables.insert(Dataset::CelebA, object(celeba_defaults()));
        Self { tables }
    }

    /// Register (or replace) the table for `dataset`.
    ///
    /// Every key must name a user-settable field.
    pub fn register(&mut self, dataset: Dataset, table: DefaultTable) -> ConfigResult<()> {
        if let Some(key) = table.keys().find(|k| !is_known_key(k)) {
            return Err(ConfigError::UnknownKey(format!("{key} (in {dataset} defaults)")));
        }
        self.tables.insert(dataset, table);
        Ok(())
    }

    pub fn table(&self, dataset: Dataset) -> ConfigResult<&DefaultTable> {
        self.tables.get(&dataset).ok_or_else(|| ConfigError::UnknownDataset(dataset.to_string()))
    }

    #[must_use]
    pub fn contains(&self, dataset: Dataset) -> bool {
        self.tables.contains_key(&dataset)
    }
}

fn object(value: Value) -> DefaultTable {
    match value {
        Value::Object(map) => map,
        _ => DefaultTable::new(),
    }
}

fn mnist_defaults() -> Value {
    json!({
        "data_path": "/persist/datasets/mnist/",
        "model": "Vanilla",
        "im_size": 28,
        "n_epochs": 10000,
        "g_lr": 0.0002,
        "d_lr": 0.0002,
        "batch_size": 600,
        "batch_split_size": 60,
        "train_set_size": 60000,
        "g_latent_dim": 100,
        "n_d_steps": 1,
        "g_label_emb_mode": "concat",
        "d_label_emb_mode": "concat",
        "aux_loss_type": "cross_entropy",
        "adam_b1": 0.9,
        "adam_b2": 0.999,
        "penalty": [],
        "iter_on_mean_samples": 0,
        "mean_sample_size": 5000,
        "mean_sample_noise_std": 0.22,
        "delta": 1e-5,
        "sigma": 5.0,
        "grad_clip_mode": "standard",
        "clipping_param": 4.0,
        "imm_sens_scaling_mode": "standard",
        "tm_m": 10,
        "tm_max_val": -1.0,
        "tm_min_val": 1.0,
        "save_every": 50,
        // rounded down to one epoch during resolution
        "log_every": 100_000,
        "sample_every": 600_000,
        "sample_num": 100,
        "n_classes": 10,
        "weights_seed": 42,
    })
}

fn celeba_defaults() -> Value {
    json!({
        "data_path": "/persist/datasets/celeba/img_align_celeba/all/",
        "label_path": "/persist/datasets/celeba/Anno/list_attr_celeba.txt",
        "label_attr": "Male",
        "model": "DeepConvResNet",
        "im_size": 64,
        "n_epochs": 1000,
        "g_lr": 0.0001,
        "d_lr": 0.0001,
        "batch_size": 128,
        "batch_split_size": 32,
        "train_set_size": 180_000,
        "public_set_size": 0,
        "g_latent_dim": 128,
        "n_d_steps": 5,
        "g_label_emb_mode": "concat",
        "d_label_emb_mode": "concat",
        "aux_loss_type": "wasserstein",
        "adam_b1": 0.0,
        "adam_b2": 0.9,
        "penalty": ["WGAN-GP"],
        "iter_on_mean_samples": 0,
        "mean_sample_size": 1000,
        "mean_sample_noise_std": 0.12,
        "delta": 1e-6,
        "sigma": 0.5,
        "imm_sens_scaling_vec": [20.0, 2.0, 15.0, 1.5, 10.0, 1.5, 10.0, 1.0, 30.0],
        "imm_sens_scaling_mode": "standard",
        "imm_sens_per_param": true,
        "grad_clip_mode": "standard",
        "clipping_param": 200.0,
        "clipping_param_per_layer": [1000.0, 200.0, 1000.0, 100.0, 1000.0, 100.0, 1000.0, 5.0, 2500.0],
        "tm_m": 10,
        "tm_min_val": -1.0,
        "tm_max_val": 1.0,
        "save_every": 10,
        "log_every": 20_000,
        "sample_every": 60_000,
        "sample_num": 25,
        "n_classes": 2,
        "gp_lambda": 10.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tables_use_known_keys() {
        let registry = DatasetRegistry::builtin();
        for dataset in [Dataset::Mnist, Dataset::CelebA] {
            let table = registry.table(dataset).unwrap();
            for key in table.keys() {
                assert!(is_known_key(key), "{dataset} table has unknown key {key}");
            }
        }
    }

    #[test]
    fn test_builtin_class_counts() {
        let registry = DatasetRegistry::builtin();
        assert_eq!(registry.table(Dataset::Mnist).unwrap()["n_classes"], json!(10));
        assert_eq!(registry.table(Dataset::CelebA).unwrap()["n_classes"], json!(2));
    }

    #[test]
    fn test_register_rejects_unknown_keys() {
        let mut registry = DatasetRegistry::new();
        let mut table = DefaultTable::new();
        table.insert("learning_rate".to_string(), json!(0.1));
        assert!(registry.register(Dataset::Mnist, table).is_err());
        assert!(!registry.contains(Dataset::Mnist));
    }

    #[test]
    fn test_missing_dataset() {
        let registry = DatasetRegistry::new();
        let err = registry.table(Dataset::CelebA).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownDataset(name) if name == "CelebA"));
    }
}
