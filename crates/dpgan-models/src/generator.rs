//! Generator role of the adversarial pair.

use crate::error::{ModelError, ModelResult};
use dpgan_config::{rng_for, seeded_rng, LabelEmbedding, RunConfig};
use ndarray::{Array1, Array2, ArrayD, Axis};
use ndarray_rand::rand_distr::StandardNormal;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::Rng;

/// Stream id separating embedding initialization from other seeded consumers.
const EMBEDDING_STREAM: u64 = 0x656d_6265_64;
const LATENT_STREAM: u64 = 0x6c61_7465_6e74;

/// Construction parameters shared by every generator.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorSpec {
    pub z_dim: usize,
    pub out_ch: usize,
    pub n_classes: usize,
    pub emb_mode: LabelEmbedding,
    pub batch_norm: bool,
    /// Seed for weight initialization.
    pub weights_seed: u64,
}

impl Default for GeneratorSpec {
    fn default() -> Self {
        Self {
            z_dim: 100,
            out_ch: 3,
            n_classes: 1,
            emb_mode: LabelEmbedding::Concat,
            batch_norm: true,
            weights_seed: 42,
        }
    }
}

impl GeneratorSpec {
    #[must_use]
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            z_dim: config.model.g_latent_dim,
            out_ch: config.run.dataset.channels(),
            n_classes: config.effective_classes(),
            emb_mode: config.model.g_label_emb_mode,
            batch_norm: true,
            weights_seed: config.run.weights_seed,
        }
    }
}

/// State every generator carries, including the optional label-embedding table.
#[derive(Debug, Clone)]
pub struct GeneratorBase {
    spec: GeneratorSpec,
    embedding: Option<Array2<f32>>,
}

impl GeneratorBase {
    /// Build the shared generator state.
    ///
    /// A `[n_classes, z_dim]` embedding table exists only in `embed` mode with more
    /// than one class; in `concat` mode labels are joined to the input upstream.
    #[must_use]
    pub fn new(spec: GeneratorSpec) -> Self {
        let embedding = (spec.n_classes > 1 && spec.emb_mode == LabelEmbedding::Embed).then(|| {
            let mut rng = rng_for(spec.weights_seed, EMBEDDING_STREAM);
            Array2::random_using((spec.n_classes, spec.z_dim), StandardNormal, &mut rng)
        });
        Self { spec, embedding }
    }

    #[must_use]
    pub fn spec(&self) -> &GeneratorSpec {
        &self.spec
    }

    #[must_use]
    pub fn embedding(&self) -> Option<&Array2<f32>> {
        self.embedding.as_ref()
    }

    /// Look up embedding rows for `labels`; `None` when the generator has no table.
    pub fn embed_labels(&self, labels: &[usize]) -> ModelResult<Option<Array2<f32>>> {
        let Some(table) = &self.embedding else {
            return Ok(None);
        };
        if let Some(&label) = labels.iter().find(|&&l| l >= self.spec.n_classes) {
            return Err(ModelError::LabelOutOfRange { label, n_classes: self.spec.n_classes });
        }
        Ok(Some(table.select(Axis(0), labels)))
    }
}

/// Draws generator inputs: standard-normal latent vectors and uniform class labels.
#[derive(Debug, Clone)]
pub struct LatentSampler {
    z_dim: usize,
    n_classes: usize,
    rng: StdRng,
}

impl LatentSampler {
    /// Sampler over an explicit seed.
    #[must_use]
    pub fn new(spec: &GeneratorSpec, seed: u64) -> Self {
        Self::with_rng(spec, rng_for(seed, LATENT_STREAM))
    }

    /// Sampler over the process seed set by `initialize_reproducibility`.
    #[must_use]
    pub fn from_process_seed(spec: &GeneratorSpec) -> Self {
        Self::with_rng(spec, seeded_rng(LATENT_STREAM))
    }

    fn with_rng(spec: &GeneratorSpec, rng: StdRng) -> Self {
        Self { z_dim: spec.z_dim, n_classes: spec.n_classes.max(1), rng }
    }

    /// Next `[batch, z_dim]` latent batch with one label per row.
    pub fn next_batch(&mut self, batch: usize) -> (Array2<f32>, Vec<usize>) {
        let z = Array2::random_using((batch, self.z_dim), StandardNormal, &mut self.rng);
        let labels = (0..batch).map(|_| self.rng.gen_range(0..self.n_classes)).collect();
        (z, labels)
    }
}

/// Capability surface of a generator.
///
/// `generate` and `loss` are abstract: the default implementations fail with
/// [`ModelError::NotImplemented`] and concrete variants override them.
pub trait Generator {
    fn base(&self) -> &GeneratorBase;

    /// Map a latent batch `[batch, z_dim]` (and optional labels) to generated samples.
    fn generate(&self, z: &Array2<f32>, labels: Option<&[usize]>) -> ModelResult<ArrayD<f32>> {
        let _ = (z, labels);
        Err(ModelError::not_implemented("Generator::generate"))
    }

    /// Generator loss from the discriminator's scores on generated samples.
    fn loss(&self, d_output: &Array1<f32>) -> ModelResult<f32> {
        let _ = d_output;
        Err(ModelError::not_implemented("Generator::loss"))
    }
}

impl Generator for GeneratorBase {
    fn base(&self) -> &GeneratorBase {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(n_classes: usize, emb_mode: LabelEmbedding) -> GeneratorSpec {
        GeneratorSpec { z_dim: 8, n_classes, emb_mode, ..Default::default() }
    }

    #[test]
    fn test_embedding_only_in_embed_mode() {
        let embedded = GeneratorBase::new(spec(10, LabelEmbedding::Embed));
        assert_eq!(embedded.embedding().map(Array2::dim), Some((10, 8)));

        assert!(GeneratorBase::new(spec(10, LabelEmbedding::Concat)).embedding().is_none());
        assert!(GeneratorBase::new(spec(1, LabelEmbedding::Embed)).embedding().is_none());
    }

    #[test]
    fn test_embedding_is_seeded() {
        let a = GeneratorBase::new(spec(4, LabelEmbedding::Embed));
        let b = GeneratorBase::new(spec(4, LabelEmbedding::Embed));
        assert_eq!(a.embedding(), b.embedding());

        let c = GeneratorBase::new(GeneratorSpec { weights_seed: 7, ..spec(4, LabelEmbedding::Embed) });
        assert_ne!(a.embedding(), c.embedding());
    }

    #[test]
    fn test_embed_labels() {
        let generator = GeneratorBase::new(spec(3, LabelEmbedding::Embed));
        let rows = generator.embed_labels(&[2, 0, 2]).unwrap().unwrap();
        let table = generator.embedding().unwrap();
        assert_eq!(rows.dim(), (3, 8));
        assert_eq!(rows.row(0), table.row(2));
        assert_eq!(rows.row(1), table.row(0));
        assert!(matches!(generator.embed_labels(&[3]), Err(ModelError::LabelOutOfRange { label: 3, .. })));

        let concat = GeneratorBase::new(spec(3, LabelEmbedding::Concat));
        assert!(concat.embed_labels(&[1]).unwrap().is_none());
    }

    #[test]
    fn test_latent_sampler_batches() {
        let embed = spec(4, LabelEmbedding::Embed);
        let mut sampler = LatentSampler::new(&embed, 3);
        let (z, labels) = sampler.next_batch(16);
        assert_eq!(z.dim(), (16, 8));
        assert_eq!(labels.len(), 16);
        assert!(labels.iter().all(|&l| l < 4));

        let (next_z, _) = sampler.next_batch(16);
        assert_ne!(z, next_z);

        let (again, again_labels) = LatentSampler::new(&embed, 3).next_batch(16);
        assert_eq!(z, again);
        assert_eq!(labels, again_labels);

        let (_, single) = LatentSampler::new(&spec(1, LabelEmbedding::Concat), 3).next_batch(5);
        assert_eq!(single, vec![0; 5]);
    }

    #[test]
    fn test_latent_sampler_follows_process_seed() {
        let embed = spec(10, LabelEmbedding::Embed);
        dpgan_config::initialize_reproducibility(11);
        let from_process = LatentSampler::from_process_seed(&embed).next_batch(4);
        let explicit = LatentSampler::new(&embed, 11).next_batch(4);
        assert_eq!(from_process, explicit);
        assert_eq!(dpgan_config::process_seed(), Some(11));
    }

    #[test]
    fn test_base_role_is_abstract() {
        let generator = GeneratorBase::new(GeneratorSpec::default());
        let z = Array2::zeros((2, 100));
        assert!(matches!(generator.generate(&z, None), Err(ModelError::NotImplemented(_))));
        assert!(matches!(generator.loss(&Array1::zeros(2)), Err(ModelError::NotImplemented(_))));
    }
}
