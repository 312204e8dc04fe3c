//! Snippet files written into the theme's `snippets/` directory.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::alias::{relative_path, AliasRule};
use super::extension::{classify, extension_of, ExtensionClass};
use super::liquid::{
    dev_runtime_snippet, entry_tag, preload_script_tag, resolved_path_assignment, script_tag,
    stylesheet_tag, DISABLE_THEME_CHECK_TAG, SNIPPET_DISCLAIMER,
};
use super::manifest::{Manifest, ManifestChunk};
use crate::error::Result;

/// Liquid variable holding the render argument: the snippet file stem.
///
/// `{% render 'adastra-tag' with 'main.ts' %}` binds `adastra-tag`.
#[must_use]
pub fn snippet_variable(snippet_file: &str) -> &str {
    snippet_file.strip_suffix(".liquid").unwrap_or(snippet_file)
}

/// Full development snippet file.
#[must_use]
pub fn dev_snippet(asset_host: &str, entrypoints_dir: &str) -> String {
    let mut out = String::from(DISABLE_THEME_CHECK_TAG);
    out.push_str(SNIPPET_DISCLAIMER);
    out.push_str(&dev_runtime_snippet(asset_host, entrypoints_dir));
    out
}

/// Full production snippet file for a build manifest.
///
/// `entrypoints_dir` is relative to `root`, and manifest keys are relative
/// to `root` as well.
///
/// # Errors
/// Fails before producing any output if no alias resolves to a rewrite.
pub fn production_snippet(
    manifest: &Manifest,
    aliases: &[AliasRule],
    root: &Path,
    entrypoints_dir: &Path,
    snippet_var: &str,
) -> Result<String> {
    let entrypoints_abs = root.join(entrypoints_dir);
    let assignment = resolved_path_assignment(aliases, &entrypoints_abs, snippet_var)?;

    let mut branches: Vec<String> = Vec::new();
    for (src, chunk) in manifest.iter().filter(|(_, chunk)| chunk.is_entry) {
        let entry_name = relative_path(&entrypoints_abs, &root.join(src))
            .to_string_lossy()
            .replace('\\', "/");
        let entry_paths = [format!("/{src}"), entry_name];

        let tags = entry_tags(manifest, src, chunk);
        debug!(entry = %src, tags = tags.len(), "generated entry tags");
        branches.push(entry_tag(&entry_paths, &tags.join("\n  "), branches.is_empty()));
    }

    let mut out = String::from(DISABLE_THEME_CHECK_TAG);
    out.push_str(SNIPPET_DISCLAIMER);
    out.push_str(&assignment);
    if branches.is_empty() {
        warn!("manifest has no entries; snippet renders nothing");
    } else {
        out.push_str(&branches.join("\n"));
        out.push_str("\n{% endif %}\n");
    }
    Ok(out)
}

fn entry_tags(manifest: &Manifest, src: &str, chunk: &ManifestChunk) -> Vec<String> {
    if classify(extension_of(src)) == ExtensionClass::Css {
        return vec![stylesheet_tag(&chunk.file)];
    }

    let mut tags = vec![script_tag(&chunk.file)];
    for import in &chunk.imports {
        let Some(imported) = manifest.get(import) else {
            warn!(entry = %src, import = %import, "imported chunk missing from manifest");
            continue;
        };
        tags.push(preload_script_tag(&imported.file));
        tags.extend(imported.css.iter().map(|css| stylesheet_tag(css)));
    }
    tags.extend(chunk.css.iter().map(|css| stylesheet_tag(css)));
    tags
}

/// Write `contents` to `<theme_root>/snippets/<snippet_file>`.
///
/// Returns the path and whether the file changed. An unchanged file is not
/// touched, so a running `theme serve` does not re-upload it.
pub fn write_snippet(theme_root: &Path, snippet_file: &str, contents: &str) -> Result<(PathBuf, bool)> {
    let dir = theme_root.join("snippets");
    let path = dir.join(snippet_file);

    if std::fs::read_to_string(&path).is_ok_and(|existing| existing == contents) {
        debug!(path = %path.display(), "snippet unchanged");
        return Ok((path, false));
    }

    std::fs::create_dir_all(&dir)?;
    let tmp = dir.join(format!(".{snippet_file}.tmp"));
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, &path)?;
    debug!(path = %path.display(), bytes = contents.len(), "snippet written");
    Ok((path, true))
}
