//! Closed vocabularies used by the run descriptor.
//!
//! Every enum serializes to the exact string used on the command line and in
//! `opt.txt`, so a descriptor written by one run reloads unchanged.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($(#[$vmeta])* #[serde(rename = $text)] $variant,)+
        }

        impl $name {
            /// All accepted spellings, in declaration order.
            pub const VALUES: &'static [&'static str] = &[$($text),+];

            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ConfigError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(ConfigError::InvalidValue(format!(
                        "{other:?} is not one of {:?}",
                        Self::VALUES
                    ))),
                }
            }
        }
    };
}

string_enum! {
    /// Dataset selected by the positional command-line argument.
    pub enum Dataset {
        Mnist => "MNIST",
        CelebA => "CelebA",
    }
}

string_enum! {
    /// Network family used for both players.
    pub enum ModelArch {
        /// Fully-connected baseline.
        Vanilla => "Vanilla",
        /// Residual convolutional networks trained as a Wasserstein critic.
        DeepConvResNet => "DeepConvResNet",
    }
}

string_enum! {
    /// Conditional GAN formulation.
    pub enum ConditionalArch {
        Cgan => "CGAN",
        Acgan => "ACGAN",
        Wcgan => "WCGAN",
    }
}

string_enum! {
    /// How a player consumes class labels.
    pub enum LabelEmbedding {
        Concat => "concat",
        Embed => "embed",
    }
}

string_enum! {
    pub enum AuxLossType {
        Wasserstein => "wasserstein",
        CrossEntropy => "cross_entropy",
    }
}

string_enum! {
    /// Differential-privacy mechanism driven by the training loop.
    pub enum DpMode {
        GradClip => "gc",
        ImmediateSensitivity => "is",
        TrimmedMean => "tm",
        SmoothSensitivity => "sv",
    }
}

string_enum! {
    pub enum GradClipMode {
        Standard => "standard",
        Adaptive => "adaptive",
        ConstantPerLayer => "constant-pl",
        AdaptivePerLayer => "adaptive-pl",
    }
}

string_enum! {
    pub enum ImmSensScalingMode {
        Standard => "standard",
        ConstantPerLayer => "constant-pl",
        MovingAvgPerLayer => "moving-avg-pl",
    }
}

string_enum! {
    pub enum AdaptiveStat {
        Mean => "mean",
        Max => "max",
    }
}

string_enum! {
    /// Gradient penalty applied to the discriminator loss.
    ///
    /// Names ending in `1` are one-sided: only norms above the target are penalized.
    pub enum GradientPenalty {
        WganGp => "WGAN-GP",
        WganGpOneSided => "WGAN-GP1",
        Dragan => "DRAGAN",
        DraganOneSided => "DRAGAN1",
    }
}

impl Dataset {
    /// Image channels produced by the generator.
    #[must_use]
    pub const fn channels(self) -> usize {
        match self {
            Self::Mnist => 1,
            Self::CelebA => 3,
        }
    }
}

impl DpMode {
    /// Mechanisms that need per-sample gradients.
    #[must_use]
    pub const fn needs_per_sample_grad(self) -> bool {
        matches!(self, Self::GradClip | Self::TrimmedMean | Self::SmoothSensitivity)
    }
}

impl GradClipMode {
    #[must_use]
    pub const fn is_per_layer(self) -> bool {
        matches!(self, Self::ConstantPerLayer | Self::AdaptivePerLayer)
    }
}

impl GradientPenalty {
    #[must_use]
    pub const fn is_one_sided(self) -> bool {
        matches!(self, Self::WganGpOneSided | Self::DraganOneSided)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_through_str() {
        for value in DpMode::VALUES {
            let mode: DpMode = value.parse().unwrap();
            assert_eq!(mode.as_str(), *value);
        }
        assert_eq!("moving-avg-pl".parse::<ImmSensScalingMode>().unwrap(), ImmSensScalingMode::MovingAvgPerLayer);
    }

    #[test]
    fn test_rejects_unknown_spelling() {
        let err = "acgan".parse::<ConditionalArch>().unwrap_err();
        assert!(err.to_string().contains("ACGAN"));
    }

    #[test]
    fn test_serde_uses_cli_spelling() {
        let json = serde_json::to_string(&GradientPenalty::DraganOneSided).unwrap();
        assert_eq!(json, "\"DRAGAN1\"");
        let parsed: AuxLossType = serde_json::from_str("\"cross_entropy\"").unwrap();
        assert_eq!(parsed, AuxLossType::CrossEntropy);
    }

    #[test]
    fn test_per_sample_grad_modes() {
        assert!(DpMode::GradClip.needs_per_sample_grad());
        assert!(!DpMode::ImmediateSensitivity.needs_per_sample_grad());
        assert!(GradientPenalty::WganGpOneSided.is_one_sided());
        assert!(!GradClipMode::Adaptive.is_per_layer());
    }
}
