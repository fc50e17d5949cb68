use crate::error::ConfigResult;
use crate::types::Dataset;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

/// File name of the persisted run descriptor inside an output directory.
pub const DESCRIPTOR_FILE: &str = "opt.txt";

/// Filesystem layout of one run's output directory.
///
/// ```text
/// <output_dir>/
///   opt.txt
///   samples/
///   saves/
///   code/
/// ```
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Layout for a directory named after the run's start time, dataset and devices,
    /// e.g. `output/03-14-09:26-MNIST-g0-d1/`.
    #[must_use]
    pub fn timestamped(
        output_root: &Path,
        now: DateTime<Local>,
        dataset: Dataset,
        g_device: &str,
        d_device: &str,
    ) -> Self {
        let name = format!(
            "{}-{}-g{}-d{}",
            now.format("%m-%d-%H:%M"),
            dataset,
            last_char(g_device),
            last_char(d_device)
        );
        Self::new(output_root.join(name))
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn samples_dir(&self) -> PathBuf {
        self.root.join("samples")
    }

    #[must_use]
    pub fn saves_dir(&self) -> PathBuf {
        self.root.join("saves")
    }

    #[must_use]
    pub fn code_dir(&self) -> PathBuf {
        self.root.join("code")
    }

    #[must_use]
    pub fn descriptor_path(&self) -> PathBuf {
        self.root.join(DESCRIPTOR_FILE)
    }

    /// Create the output directory and its subdirectories.
    ///
    /// Safe to call when some or all of them already exist.
    pub fn ensure_dirs(&self) -> ConfigResult<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(self.samples_dir())?;
        std::fs::create_dir_all(self.saves_dir())?;
        std::fs::create_dir_all(self.code_dir())?;
        Ok(())
    }

    /// Root rendered with a trailing separator, as stored in the descriptor.
    #[must_use]
    pub fn display_root(&self) -> String {
        with_trailing_slash(&self.root.to_string_lossy())
    }
}

fn last_char(device: &str) -> String {
    device.chars().last().map(String::from).unwrap_or_default()
}

/// Append `/` to a non-empty directory path that lacks one.
#[must_use]
pub fn with_trailing_slash(path: &str) -> String {
    if path.is_empty() || path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    }
}
