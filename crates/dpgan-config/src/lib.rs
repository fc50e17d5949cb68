//! dpgan config
//!
//! Resolution and validation of the run descriptor for differentially-private,
//! conditional GAN training:
//! - Caller overrides with explicit unset/value state (`Overrides`)
//! - Per-dataset default tables (`DatasetRegistry`)
//! - Fresh-run resolution and checkpoint resume (`Resolver`)
//! - The persisted descriptor (`RunConfig`, `opt.txt`) and output layout
//! - Process-wide reproducibility seeding

// The parser-default table is a single large `json!` literal.
#![recursion_limit = "256"]

pub mod dataset;
pub mod error;
pub mod layout;
pub mod overrides;
pub mod resolver;
pub mod run_config;
pub mod seed;
pub mod types;

pub use dataset::{DatasetRegistry, DefaultTable};
pub use error::{ConfigError, ConfigResult};
pub use layout::{with_trailing_slash, OutputLayout, DESCRIPTOR_FILE};
pub use overrides::{is_known_key, parser_defaults, Overrides, Setting, ALWAYS_KEEP_KEYS, DERIVED_KEYS};
pub use resolver::{Notice, Resolution, Resolver};
pub use run_config::{
    DerivedFlags, ModelSection, OptimSection, PenaltySection, PrivacySection, RunConfig, RunSection, ScheduleSection,
};
pub use seed::{initialize_reproducibility, process_seed, rng_for, seeded_rng};
pub use types::{
    AdaptiveStat, AuxLossType, ConditionalArch, Dataset, DpMode, GradClipMode, GradientPenalty, ImmSensScalingMode,
    LabelEmbedding, ModelArch,
};
