//! dpgan CLI - resolve the run descriptor for differentially-private GAN training
//!
//! `dpgan <DATASET> [flags]` merges flags, an optional TOML override file and the
//! dataset's defaults into a validated descriptor and persists it as
//! `<output_dir>/opt.txt`. With `--resume_path` the persisted descriptor is
//! reloaded instead.

mod flags;
mod summary;

use anyhow::Context;
use clap::Parser;
use dpgan_config::{Dataset, Overrides, Resolver, RunConfig};
use dpgan_models::LatentSampler;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use flags::RunFlags;

/// Largest latent batch drawn by `--check_players`.
const CHECK_BATCH: usize = 64;

/// Resolve and persist a training run descriptor
#[derive(Parser, Debug)]
#[command(name = "dpgan", author, version, about = "Resolve the configuration of a differentially-private GAN run")]
struct Args {
    /// Dataset to train on (MNIST, CelebA)
    dataset: Dataset,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long = "log-level", default_value = "info")]
    log_level: String,

    /// TOML file of overrides; command-line flags take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// Parent directory for synthesized output directories
    #[arg(long = "output_root", default_value = "output")]
    output_root: PathBuf,

    /// Print the resolved descriptor as JSON
    #[arg(long)]
    json: bool,

    /// Build the generator/discriminator pair to check the descriptor is usable
    #[arg(long = "check_players")]
    check_players: bool,

    #[command(flatten)]
    flags: RunFlags,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .without_time()
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let overrides = collect_overrides(&args)?;

    let resolver = Resolver::default().with_output_root(args.output_root.clone());
    let resolution = resolver
        .resolve_or_resume(args.dataset, &overrides)
        .context("failed to resolve run configuration")?;

    if args.check_players {
        check_players(&resolution.config)?;
    }

    if resolution.resumed {
        info!(output_dir = ?resolution.config.run.output_dir, "resumed run descriptor");
    } else {
        resolution.config.persist().context("failed to write run descriptor")?;
        let path = resolution.config.layout().descriptor_path();
        info!(path = %path.display(), "wrote run descriptor");
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&resolution.config)?);
    } else {
        summary::print(&resolution);
    }

    Ok(())
}

/// Build the players and push one latent batch through the generator's label table.
fn check_players(config: &RunConfig) -> anyhow::Result<()> {
    let (generator, _discriminator) = dpgan_models::build_players(config).context("failed to build players")?;
    let mut sampler = LatentSampler::from_process_seed(generator.base().spec());
    let batch = usize::try_from(config.optim.batch_size).unwrap_or(usize::MAX).min(CHECK_BATCH);
    let (z, labels) = sampler.next_batch(batch);
    generator.base().embed_labels(&labels).context("failed to embed sampled labels")?;
    info!(batch = z.nrows(), z_dim = z.ncols(), "players built");
    Ok(())
}

/// Overrides from the TOML file (if any) with command-line flags layered on top.
fn collect_overrides(args: &Args) -> anyhow::Result<Overrides> {
    let from_flags = args.flags.to_overrides()?;
    let Some(path) = &args.config else {
        return Ok(from_flags);
    };

    let mut overrides =
        Overrides::from_toml_file(path).with_context(|| format!("failed to load overrides from {}", path.display()))?;
    overrides.extend(&from_flags);
    Ok(overrides)
}
