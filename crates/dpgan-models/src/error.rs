use dpgan_config::ConfigError;
use thiserror::Error;

pub type ModelResult<T> = std::result::Result<T, ModelError>;

/// Errors raised by the generator/discriminator contract.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Construction was asked for an unsupported configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An abstract operation was invoked on a player that does not provide it.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("shape mismatch: {0}")]
    Shape(String),

    #[error("label {label} out of range for {n_classes} classes")]
    LabelOutOfRange { label: usize, n_classes: usize },
}

impl ModelError {
    pub(crate) fn not_implemented(what: impl Into<String>) -> Self {
        Self::NotImplemented(what.into())
    }
}
