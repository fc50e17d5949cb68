//! Integration tests for the player contract built from resolved descriptors.

use approx::assert_relative_eq;
use dpgan_config::{AuxLossType, ConditionalArch, ConfigError, Dataset, LabelEmbedding, Overrides, Resolver, RunConfig};
use dpgan_models::{build_players, sigmoid, DiscriminatorBase, DiscriminatorSpec, ModelError, ModelVariant};
use ndarray::{array, Array1, Array2, ArrayD};
use tempfile::TempDir;

fn resolve(temp: &TempDir, dataset: Dataset, overrides: Overrides) -> RunConfig {
    let out = temp.path().join("run").to_string_lossy().to_string();
    let overrides = overrides.with("output_dir", out).unwrap();
    Resolver::default().resolve(dataset, &overrides).unwrap().into_config()
}

fn acgan_wasserstein(n_classes: usize, scalar: f32) -> DiscriminatorBase {
    DiscriminatorBase::new(DiscriminatorSpec {
        n_classes,
        conditional_arch: ConditionalArch::Acgan,
        aux_loss_type: AuxLossType::Wasserstein,
        aux_loss_scalar: scalar,
        ..Default::default()
    })
    .unwrap()
}

#[test]
fn test_single_label_batch_divides_by_batch_size() {
    let d = acgan_wasserstein(3, 1.0);
    let output = array![[0.5_f32, -1.0, 2.0], [1.5, 0.0, -0.5], [-2.0, 1.0, 0.25], [0.0, 0.0, 0.0]];
    let labels = [1, 1, 1, 1];

    let row_sums: Vec<f32> = output
        .rows()
        .into_iter()
        .map(|row| sigmoid(row[0]) - sigmoid(row[1]) + sigmoid(row[2]))
        .collect();
    let expected = row_sums.iter().sum::<f32>() / 4.0;

    assert_relative_eq!(d.aux_loss(&output, &labels, false).unwrap(), expected, epsilon = 1e-6);
}

#[test]
fn test_wasserstein_aux_loss_scales_linearly() {
    let output = array![[1.0_f32, -1.0], [0.3, 0.7], [-0.2, 0.9]];
    let labels = [0, 1, 1];
    let unit = acgan_wasserstein(2, 1.0).aux_loss(&output, &labels, true).unwrap();
    let scaled = acgan_wasserstein(2, 2.5).aux_loss(&output, &labels, true).unwrap();
    assert_relative_eq!(scaled, 2.5 * unit, epsilon = 1e-6);
}

#[test]
fn test_wcgan_contributes_nothing() {
    let d = DiscriminatorBase::new(DiscriminatorSpec {
        n_classes: 10,
        conditional_arch: ConditionalArch::Wcgan,
        ..Default::default()
    })
    .unwrap();
    let output = Array2::from_elem((5, 10), 3.0_f32);
    assert_eq!(d.aux_loss(&output, &[0, 1, 2, 3, 4], true).unwrap(), 0.0);
    assert_eq!(d.aux_loss(&output, &[9, 9, 9, 9, 9], false).unwrap(), 0.0);
}

#[test]
fn test_players_from_mnist_defaults() {
    let temp = TempDir::new().unwrap();
    let config = resolve(&temp, Dataset::Mnist, Overrides::new());
    assert_eq!(ModelVariant::from(config.model.model), ModelVariant::Baseline);

    let (generator, discriminator) = build_players(&config).unwrap();
    assert_eq!(generator.base().spec().out_ch, 1);
    assert_eq!(generator.base().spec().n_classes, 1);
    assert_eq!(discriminator.base().n_classes(), 1);
    assert!(generator.base().embedding().is_none());

    let scores = Array1::zeros(4);
    assert_relative_eq!(discriminator.real_loss(&scores).unwrap(), 2.0_f32.ln(), epsilon = 1e-6);
    let x = ArrayD::zeros(vec![4, 1, 28, 28]);
    assert!(matches!(discriminator.discriminate(&x, None, false), Err(ModelError::NotImplemented(_))));
}

#[test]
fn test_players_from_conditional_celeba() {
    let temp = TempDir::new().unwrap();
    let overrides = Overrides::new().with("conditional", true).unwrap().with("g_label_emb_mode", "embed").unwrap();
    let config = resolve(&temp, Dataset::CelebA, overrides);

    let (generator, discriminator) = build_players(&config).unwrap();
    assert_eq!(generator.base().spec().out_ch, 3);
    assert_eq!(generator.base().embedding().map(Array2::dim), Some((2, config.model.g_latent_dim)));
    assert_eq!(discriminator.base().conditional_arch(), ConditionalArch::Acgan);
    assert_eq!(discriminator.base().emb_mode(), None);

    let critic = array![1.0_f32, 3.0];
    assert_relative_eq!(discriminator.fake_loss(&critic).unwrap(), 2.0);
    assert_relative_eq!(generator.loss(&critic).unwrap(), -2.0);

    let aux = array![[0.0_f32, 0.0], [0.0, 0.0]];
    assert_relative_eq!(discriminator.aux_loss(&aux, &[0, 1], false).unwrap(), 0.0);
}

#[test]
fn test_discriminator_embed_rejected_by_factory() {
    let temp = TempDir::new().unwrap();
    let overrides = Overrides::new().with("conditional", true).unwrap().with("d_label_emb_mode", "embed").unwrap();
    let config = resolve(&temp, Dataset::CelebA, overrides);
    assert_eq!(config.model.d_label_emb_mode, LabelEmbedding::Embed);

    let err = build_players(&config).err().unwrap();
    assert!(matches!(err, ModelError::Config(ConfigError::DiscriminatorEmbedUnsupported)));
}
