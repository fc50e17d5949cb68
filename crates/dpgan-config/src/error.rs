use std::path::PathBuf;
use thiserror::Error;

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Errors raised while resolving or loading a run descriptor.
///
/// Every variant is fatal: resolution aborts before any output directory is
/// created or the process seed is initialized.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "imm_sens_per_param computes sensitivity per parameter and cannot be combined with \
         imm_sens_scaling_mode={mode}; use \"standard\" or leave it unset"
    )]
    ImmSensScalingConflict { mode: String },

    #[error(
        "both a public data partition (public_set_size={public_set_size}) and mean samples \
         (num_mean_samples={num_mean_samples}) were configured, select only one"
    )]
    PartitionConflict { public_set_size: i64, num_mean_samples: i64 },

    #[error(
        "gradient penalty with penalty_use_public_data requires public data: set \
         num_mean_samples or public_set_size"
    )]
    PenaltyRequiresPublicData,

    #[error("{model} model only supports concat label embedding (g={g_mode}, d={d_mode})")]
    EmbeddingRequiresConcat { model: String, g_mode: String, d_mode: String },

    #[error("label embedding mode \"embed\" is not supported for the discriminator")]
    DiscriminatorEmbedUnsupported,

    #[error("unknown configuration key: {0}")]
    UnknownKey(String),

    #[error("unknown dataset: {0}")]
    UnknownDataset(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("run descriptor not found: {}", .0.display())]
    MissingDescriptor(PathBuf),

    #[error("malformed run descriptor {}: {source}", path.display())]
    MalformedDescriptor {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to parse override file {}: {message}", path.display())]
    OverrideFile { path: PathBuf, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
