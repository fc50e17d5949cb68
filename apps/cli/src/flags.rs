//! Run flags mirroring every user-settable descriptor key.
//!
//! Flags left off the command line stay unset so the resolver can tell them
//! apart from values the caller chose.

use clap::Args;
use dpgan_config::{
    AdaptiveStat, AuxLossType, ConditionalArch, ConfigResult, DpMode, GradClipMode, GradientPenalty,
    ImmSensScalingMode, LabelEmbedding, ModelArch, Overrides,
};

/// Parse a boolean flag value the way training scripts conventionally accept them.
pub fn parse_bool(value: &str) -> Result<bool, String> {
    match value.to_lowercase().as_str() {
        "yes" | "true" | "t" | "y" | "1" => Ok(true),
        "no" | "false" | "f" | "n" | "0" => Ok(false),
        _ => Err(format!("boolean value expected, got '{value}'")),
    }
}

#[derive(Args, Debug, Default)]
pub struct RunFlags {
    // Reproducibility
    #[arg(long = "weights_seed", help_heading = "Run")]
    pub weights_seed: Option<u64>,
    /// Seed for the run; drawn at random when negative
    #[arg(long = "manual_seed", allow_negative_numbers = true, help_heading = "Run")]
    pub manual_seed: Option<i64>,

    // Data and output
    #[arg(short = 'd', long = "data_path", help_heading = "Run")]
    pub data_path: Option<String>,
    #[arg(long = "label_path", visible_alias = "lp", help_heading = "Run")]
    pub label_path: Option<String>,
    #[arg(long = "label_attr", visible_alias = "la", help_heading = "Run")]
    pub label_attr: Option<String>,
    #[arg(long = "download_mnist", help_heading = "Run")]
    pub download_mnist: bool,
    /// Output directory; synthesized from the date, dataset and devices when omitted
    #[arg(short = 'o', long = "output_dir", help_heading = "Run")]
    pub output_dir: Option<String>,

    // Resume
    /// Resume from the descriptor in this directory
    #[arg(long = "resume_path", visible_alias = "rp", help_heading = "Run")]
    pub resume_path: Option<String>,
    #[arg(long = "resume_epochs", visible_alias = "re", help_heading = "Run")]
    pub resume_epochs: Option<u32>,
    /// Keys whose command-line values replace the persisted ones on resume
    #[arg(long = "keep_args", visible_alias = "ka", num_args = 0.., help_heading = "Run")]
    pub keep_args: Option<Vec<String>>,

    // Devices
    #[arg(long = "g_device", visible_alias = "gd", help_heading = "Run")]
    pub g_device: Option<String>,
    #[arg(long = "d_device", visible_alias = "dd", help_heading = "Run")]
    pub d_device: Option<String>,
    #[arg(long = "num_workers", visible_alias = "nw", help_heading = "Run")]
    pub num_workers: Option<u32>,
    #[arg(short = 'p', long = "profile_training", help_heading = "Run")]
    pub profile_training: bool,

    // Model
    #[arg(long = "model", help_heading = "Model")]
    pub model: Option<ModelArch>,
    #[arg(long = "im_size", help_heading = "Model")]
    pub im_size: Option<u32>,
    #[arg(long = "g_latent_dim", help_heading = "Model")]
    pub g_latent_dim: Option<usize>,
    #[arg(long = "conditional", visible_alias = "cond", help_heading = "Model")]
    pub conditional: bool,
    #[arg(long = "conditional_arch", help_heading = "Model")]
    pub conditional_arch: Option<ConditionalArch>,
    #[arg(long = "g_label_emb_mode", help_heading = "Model")]
    pub g_label_emb_mode: Option<LabelEmbedding>,
    #[arg(long = "d_label_emb_mode", help_heading = "Model")]
    pub d_label_emb_mode: Option<LabelEmbedding>,
    #[arg(long = "n_classes", help_heading = "Model")]
    pub n_classes: Option<usize>,

    // Optimization
    #[arg(long = "n_epochs", visible_alias = "ne", help_heading = "Optimization")]
    pub n_epochs: Option<u32>,
    #[arg(long = "g_lr", help_heading = "Optimization")]
    pub g_lr: Option<f64>,
    #[arg(long = "d_lr", help_heading = "Optimization")]
    pub d_lr: Option<f64>,
    #[arg(long = "weight_decay", visible_alias = "wd", help_heading = "Optimization")]
    pub weight_decay: Option<f64>,
    #[arg(long = "adam_b1", help_heading = "Optimization")]
    pub adam_b1: Option<f64>,
    #[arg(long = "adam_b2", help_heading = "Optimization")]
    pub adam_b2: Option<f64>,
    #[arg(long = "batch_size", visible_alias = "bs", help_heading = "Optimization")]
    pub batch_size: Option<u64>,
    /// Micro-batch size for model-parallel training
    #[arg(long = "batch_split_size", visible_alias = "bss", help_heading = "Optimization")]
    pub batch_split_size: Option<u64>,
    #[arg(long = "train_set_size", visible_alias = "tss", help_heading = "Optimization")]
    pub train_set_size: Option<u64>,
    #[arg(long = "public_set_size", visible_alias = "pss", help_heading = "Optimization")]
    pub public_set_size: Option<i64>,
    #[arg(long = "n_d_steps", help_heading = "Optimization")]
    pub n_d_steps: Option<u32>,
    /// Skip generator training until the discriminator adversarial loss drops below this
    #[arg(long = "train_d_until_threshold", allow_negative_numbers = true, help_heading = "Optimization")]
    pub train_d_until_threshold: Option<f64>,
    #[arg(long = "warmup_iter", visible_alias = "wi", help_heading = "Optimization")]
    pub warmup_iter: Option<u64>,

    // Privacy
    #[arg(long = "dp_mode", visible_alias = "dpm", help_heading = "Privacy")]
    pub dp_mode: Option<DpMode>,
    #[arg(long = "delta", help_heading = "Privacy")]
    pub delta: Option<f64>,
    #[arg(long = "sigma", help_heading = "Privacy")]
    pub sigma: Option<f64>,
    #[arg(long = "epsilon_budget", visible_alias = "eb", help_heading = "Privacy")]
    pub epsilon_budget: Option<f64>,
    #[arg(long = "grad_clip_split", visible_alias = "gcs", value_parser = parse_bool, help_heading = "Privacy")]
    pub grad_clip_split: Option<bool>,
    #[arg(long = "grad_clip_mode", visible_alias = "gcm", help_heading = "Privacy")]
    pub grad_clip_mode: Option<GradClipMode>,
    #[arg(short = 'c', long = "clipping_param", help_heading = "Privacy")]
    pub clipping_param: Option<f64>,
    #[arg(long = "clipping_param_per_layer", visible_alias = "cpl", num_args = 0.., help_heading = "Privacy")]
    pub clipping_param_per_layer: Option<Vec<f64>>,
    #[arg(long = "adaptive_scalar", visible_alias = "as", help_heading = "Privacy")]
    pub adaptive_scalar: Option<f64>,
    #[arg(long = "adaptive_stat", help_heading = "Privacy")]
    pub adaptive_stat: Option<AdaptiveStat>,
    /// Compute immediate sensitivity for each parameter separately
    #[arg(long = "imm_sens_per_param", visible_alias = "ispp", value_parser = parse_bool, help_heading = "Privacy")]
    pub imm_sens_per_param: Option<bool>,
    #[arg(long = "imm_sens_scaling_vec", visible_alias = "issv", num_args = 0.., help_heading = "Privacy")]
    pub imm_sens_scaling_vec: Option<Vec<f64>>,
    #[arg(long = "imm_sens_scaling_mode", visible_alias = "issm", help_heading = "Privacy")]
    pub imm_sens_scaling_mode: Option<ImmSensScalingMode>,
    #[arg(long = "smooth_sens_t", help_heading = "Privacy")]
    pub smooth_sens_t: Option<f64>,
    #[arg(long = "tm_m", help_heading = "Privacy")]
    pub tm_m: Option<u32>,
    #[arg(long = "tm_max_val", allow_negative_numbers = true, help_heading = "Privacy")]
    pub tm_max_val: Option<f64>,
    #[arg(long = "tm_min_val", allow_negative_numbers = true, help_heading = "Privacy")]
    pub tm_min_val: Option<f64>,
    #[arg(long = "tm_rho_per_epoch", help_heading = "Privacy")]
    pub tm_rho_per_epoch: Option<f64>,
    /// Batch size for trimmed-mean sensitivity; twice batch_size when omitted
    #[arg(long = "tm_sens_compute_bs", help_heading = "Privacy")]
    pub tm_sens_compute_bs: Option<u64>,
    #[arg(long = "backprop_clip", visible_alias = "bpc", value_parser = parse_bool, help_heading = "Privacy")]
    pub backprop_clip: Option<bool>,
    #[arg(long = "bpc_back_clip_param", help_heading = "Privacy")]
    pub bpc_back_clip_param: Option<f64>,
    #[arg(long = "bpc_back_clip_param_pl", num_args = 0.., help_heading = "Privacy")]
    pub bpc_back_clip_param_pl: Option<Vec<f64>>,
    #[arg(long = "bpc_forward_clip_param", help_heading = "Privacy")]
    pub bpc_forward_clip_param: Option<f64>,
    #[arg(long = "bpc_forward_clip_param_pl", num_args = 0.., help_heading = "Privacy")]
    pub bpc_forward_clip_param_pl: Option<Vec<f64>>,
    #[arg(long = "bpc_auto_activation_scale", visible_alias = "bpcaas", help_heading = "Privacy")]
    pub bpc_auto_activation_scale: Option<f64>,
    #[arg(long = "bpc_auto_weight_grad_scale", visible_alias = "bpcawgs", help_heading = "Privacy")]
    pub bpc_auto_weight_grad_scale: Option<f64>,
    #[arg(long = "bpc_during_g_train", value_parser = parse_bool, help_heading = "Privacy")]
    pub bpc_during_g_train: Option<bool>,

    // Auxiliary loss and penalties
    #[arg(long = "aux_loss_type", help_heading = "Penalties")]
    pub aux_loss_type: Option<AuxLossType>,
    #[arg(long = "aux_loss_scalar", help_heading = "Penalties")]
    pub aux_loss_scalar: Option<f64>,
    #[arg(long = "aux_penalty", value_parser = parse_bool, help_heading = "Penalties")]
    pub aux_penalty: Option<bool>,
    #[arg(long = "d_fake_aux_loss", value_parser = parse_bool, help_heading = "Penalties")]
    pub d_fake_aux_loss: Option<bool>,
    /// Gradient penalties; names ending in 1 are one-sided
    #[arg(long = "penalty", num_args = 0.., help_heading = "Penalties")]
    pub penalty: Option<Vec<GradientPenalty>>,
    #[arg(long = "gp_lambda", help_heading = "Penalties")]
    pub gp_lambda: Option<f64>,
    #[arg(
        long = "penalty_use_public_data",
        visible_alias = "pupd",
        value_parser = parse_bool,
        help_heading = "Penalties"
    )]
    pub penalty_use_public_data: Option<bool>,
    #[arg(long = "num_mean_samples", visible_alias = "nms", help_heading = "Penalties")]
    pub num_mean_samples: Option<i64>,
    #[arg(long = "iter_on_mean_samples", help_heading = "Penalties")]
    pub iter_on_mean_samples: Option<u64>,
    #[arg(long = "mean_sample_size", help_heading = "Penalties")]
    pub mean_sample_size: Option<u64>,
    #[arg(long = "mean_sample_noise_std", help_heading = "Penalties")]
    pub mean_sample_noise_std: Option<f64>,

    // Schedule
    /// Epochs between checkpoints
    #[arg(long = "save_every", help_heading = "Schedule")]
    pub save_every: Option<u32>,
    /// Samples between log lines
    #[arg(long = "log_every", help_heading = "Schedule")]
    pub log_every: Option<u64>,
    /// Samples between image grids
    #[arg(long = "sample_every", help_heading = "Schedule")]
    pub sample_every: Option<u64>,
    #[arg(long = "sample_num", help_heading = "Schedule")]
    pub sample_num: Option<u32>,
}

/// Record each field whose flag was given; absent flags stay unset.
macro_rules! record {
    ($overrides:ident, $flags:ident; $($field:ident),* $(,)?) => {
        $( $overrides.set_opt(stringify!($field), $flags.$field.clone())?; )*
    };
}

impl RunFlags {
    /// Convert the parsed flags into resolver overrides.
    pub fn to_overrides(&self) -> ConfigResult<Overrides> {
        let mut overrides = Overrides::new();
        let flags = self;

        for (key, present) in [
            ("download_mnist", flags.download_mnist),
            ("profile_training", flags.profile_training),
            ("conditional", flags.conditional),
        ] {
            if present {
                overrides.set(key, true)?;
            }
        }

        record!(overrides, flags;
            weights_seed, manual_seed, data_path, label_path, label_attr, output_dir,
            resume_path, resume_epochs, keep_args, g_device, d_device, num_workers,
            model, im_size, g_latent_dim, conditional_arch, g_label_emb_mode, d_label_emb_mode, n_classes,
            n_epochs, g_lr, d_lr, weight_decay, adam_b1, adam_b2, batch_size, batch_split_size,
            train_set_size, public_set_size, n_d_steps, train_d_until_threshold, warmup_iter,
            dp_mode, delta, sigma, epsilon_budget, grad_clip_split, grad_clip_mode, clipping_param,
            clipping_param_per_layer, adaptive_scalar, adaptive_stat, imm_sens_per_param,
            imm_sens_scaling_vec, imm_sens_scaling_mode, smooth_sens_t, tm_m, tm_max_val, tm_min_val,
            tm_rho_per_epoch, tm_sens_compute_bs, backprop_clip, bpc_back_clip_param,
            bpc_back_clip_param_pl, bpc_forward_clip_param, bpc_forward_clip_param_pl,
            bpc_auto_activation_scale, bpc_auto_weight_grad_scale, bpc_during_g_train,
            aux_loss_type, aux_loss_scalar, aux_penalty, d_fake_aux_loss, penalty, gp_lambda,
            penalty_use_public_data, num_mean_samples, iter_on_mean_samples, mean_sample_size,
            mean_sample_noise_std, save_every, log_every, sample_every, sample_num,
        );

        Ok(overrides)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpgan_config::{Dataset, Setting};
    use serde_json::json;

    #[derive(clap::Parser)]
    struct Harness {
        dataset: Dataset,
        #[command(flatten)]
        flags: RunFlags,
    }

    fn parse(args: &[&str]) -> Overrides {
        let harness = <Harness as clap::Parser>::try_parse_from(args).unwrap();
        harness.flags.to_overrides().unwrap()
    }

    #[test]
    fn test_parse_bool() {
        for yes in ["yes", "True", "t", "Y", "1"] {
            assert_eq!(parse_bool(yes), Ok(true));
        }
        for no in ["no", "FALSE", "f", "n", "0"] {
            assert_eq!(parse_bool(no), Ok(false));
        }
        assert!(parse_bool("maybe").is_err());
    }

    #[test]
    fn test_absent_flags_stay_unset() {
        let overrides = parse(&["dpgan", "MNIST"]);
        assert!(overrides.is_empty());
    }

    #[test]
    fn test_flags_become_explicit() {
        let overrides = parse(&[
            "dpgan",
            "CelebA",
            "--batch_size",
            "128",
            "--dp_mode",
            "gc",
            "--aux_penalty",
            "false",
            "--conditional",
            "--penalty",
            "WGAN-GP",
            "DRAGAN1",
            "--manual_seed",
            "-1",
        ]);
        assert_eq!(overrides.get("batch_size"), &Setting::Explicit(json!(128)));
        assert_eq!(overrides.get("dp_mode"), &Setting::Explicit(json!("gc")));
        assert_eq!(overrides.get("aux_penalty"), &Setting::Explicit(json!(false)));
        assert_eq!(overrides.get("conditional"), &Setting::Explicit(json!(true)));
        assert_eq!(overrides.get("penalty"), &Setting::Explicit(json!(["WGAN-GP", "DRAGAN1"])));
        assert_eq!(overrides.get("manual_seed"), &Setting::Explicit(json!(-1)));
        assert_eq!(overrides.get("sigma"), &Setting::Unset);
    }

    #[test]
    fn test_short_aliases() {
        let overrides = parse(&["dpgan", "MNIST", "--bs", "64", "--nw", "2", "-o", "/tmp/run"]);
        assert_eq!(overrides.get("batch_size"), &Setting::Explicit(json!(64)));
        assert_eq!(overrides.get("num_workers"), &Setting::Explicit(json!(2)));
        assert_eq!(overrides.get("output_dir"), &Setting::Explicit(json!("/tmp/run")));
    }

    #[test]
    fn test_rejects_unknown_choice() {
        assert!(<Harness as clap::Parser>::try_parse_from(["dpgan", "MNIST", "--dp_mode", "xx"]).is_err());
        assert!(<Harness as clap::Parser>::try_parse_from(["dpgan", "SVHN"]).is_err());
    }
}
