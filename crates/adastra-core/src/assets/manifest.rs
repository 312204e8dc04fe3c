//! Bundler build manifest (`manifest.json`).

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Manifest locations under the build output dir, newest layout first.
const MANIFEST_FILES: &[&str] = &[".vite/manifest.json", "manifest.json"];

/// One chunk of the manifest.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ManifestChunk {
    /// Emitted file name, relative to the output dir.
    pub file: String,
    /// Source path relative to the project root.
    #[serde(default)]
    pub src: Option<String>,
    #[serde(default)]
    pub is_entry: bool,
    #[serde(default)]
    pub css: Vec<String>,
    /// Manifest keys of statically imported chunks.
    #[serde(default)]
    pub imports: Vec<String>,
}

/// Source path → chunk, ordered by key so generated output is stable.
pub type Manifest = BTreeMap<String, ManifestChunk>;

/// Find the manifest in a build output dir.
#[must_use]
pub fn find_manifest(out_dir: &Path) -> Option<PathBuf> {
    MANIFEST_FILES
        .iter()
        .map(|name| out_dir.join(name))
        .find(|path| path.is_file())
}

/// Parse manifest JSON.
pub fn parse_manifest(source: &str, path: &Path) -> Result<Manifest> {
    serde_json::from_str(source).map_err(|source| Error::Manifest {
        path: path.to_path_buf(),
        source,
    })
}

/// Read and parse a manifest file.
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let source = std::fs::read_to_string(path)?;
    parse_manifest(&source, path)
}
