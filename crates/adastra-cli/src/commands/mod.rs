pub mod build;
pub mod dev;
pub mod snippet;
pub mod version;

use adastra_core::assets::alias::relative_path;
use adastra_core::dev::{load_config, AdastraConfig};
use miette::{IntoDiagnostic, Result};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Project root plus its loaded config.
#[derive(Debug)]
pub struct Project {
    pub root: PathBuf,
    pub config: AdastraConfig,
}

impl Project {
    /// Load the config from `cwd` (or `config_path`). A missing config file
    /// means all defaults.
    pub fn load(cwd: &Path, config_path: Option<&Path>) -> Result<Self> {
        let root = dunce::canonicalize(cwd).into_diagnostic()?;
        let config = match load_config(&root, config_path).into_diagnostic()? {
            Some((path, config)) => {
                let rel = path.strip_prefix(&root).unwrap_or(&path);
                println!("  Loaded config from {}", rel.display());
                config
            }
            None => {
                debug!(root = %root.display(), "no config file, using defaults");
                AdastraConfig::default()
            }
        };
        Ok(Self { root, config })
    }

    /// Absolute theme directory.
    pub fn theme_root(&self) -> PathBuf {
        clean(&self.root.join(&self.config.adastra.theme_root))
    }

    /// Entry points directory relative to the root, `/`-separated.
    pub fn entrypoints_dir(&self) -> String {
        let dir = &self.config.adastra.entrypoints_dir;
        let relative = if dir.is_absolute() {
            relative_path(&self.root, dir)
        } else {
            clean(dir)
        };
        relative
            .to_string_lossy()
            .replace('\\', "/")
            .trim_end_matches('/')
            .to_string()
    }
}

fn clean(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Find `name` in `node_modules/.bin` walking up from `root`, then on `PATH`.
pub fn find_binary(root: &Path, name: &str) -> Option<PathBuf> {
    root.ancestors()
        .map(|dir| dir.join("node_modules").join(".bin").join(name))
        .find(|candidate| candidate.is_file())
        .or_else(|| which::which(name).ok())
}
