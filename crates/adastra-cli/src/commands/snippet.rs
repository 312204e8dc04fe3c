//! `adastra snippet`: write the asset snippet without running a server or a
//! build.

use adastra_core::assets::{
    dev_snippet, find_manifest, load_manifest, production_snippet, snippet_variable,
    write_snippet,
};
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

use super::dev::{url_host, DEFAULT_HOST};
use super::Project;
use crate::asset_server::DEFAULT_ASSET_PORT;

#[derive(Debug, Clone)]
pub struct SnippetAction {
    pub cwd: PathBuf,
    pub dev: bool,
    pub asset_host: Option<String>,
    pub config: Option<PathBuf>,
}

pub fn run(action: &SnippetAction) -> Result<()> {
    let project = Project::load(&action.cwd, action.config.as_deref())?;

    let path = if action.dev {
        let asset_host = action.asset_host.clone().unwrap_or_else(|| {
            let server = &project.config.server;
            format!(
                "http://{}:{}",
                url_host(server.host.as_deref().unwrap_or(DEFAULT_HOST)),
                server.port.unwrap_or(DEFAULT_ASSET_PORT)
            )
        });
        let contents = dev_snippet(asset_host.trim_end_matches('/'), &project.entrypoints_dir());
        let (path, _) = write_snippet(
            &project.theme_root(),
            &project.config.adastra.snippet_file,
            &contents,
        )
        .into_diagnostic()?;
        path
    } else {
        write_production_snippet(&project)?
    };

    println!("  Wrote {}", path.display());
    Ok(())
}

/// Render the production snippet from the manifest under the theme's
/// `assets/` directory and write it.
pub fn write_production_snippet(project: &Project) -> Result<PathBuf> {
    let theme_root = project.theme_root();
    let out_dir = theme_root.join("assets");
    let manifest_path = find_manifest(&out_dir).ok_or_else(|| {
        miette::miette!(
            "No build manifest found under {}. Run `adastra build` first",
            out_dir.display()
        )
    })?;
    let manifest = load_manifest(&manifest_path).into_diagnostic()?;

    let options = &project.config.adastra;
    let contents = production_snippet(
        &manifest,
        &project.config.resolve.alias,
        &project.root,
        &options.entrypoints_dir,
        snippet_variable(&options.snippet_file),
    )
    .into_diagnostic()?;

    let (path, _) = write_snippet(&theme_root, &options.snippet_file, &contents).into_diagnostic()?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r"
import { defineConfig } from 'vite';
import path from 'path';

export default defineConfig({
  resolve: { alias: { '~': path.resolve(__dirname, 'src') } },
});
";

    fn project_with_manifest() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("vite.config.js"), CONFIG).unwrap();
        std::fs::create_dir_all(dir.path().join("assets/.vite")).unwrap();
        std::fs::write(
            dir.path().join("assets/.vite/manifest.json"),
            r#"{ "src/entrypoints/theme.css": { "file": "theme-1.css", "src": "src/entrypoints/theme.css", "isEntry": true } }"#,
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_writes_production_snippet() {
        let dir = project_with_manifest();
        run(&SnippetAction {
            cwd: dir.path().to_path_buf(),
            dev: false,
            asset_host: None,
            config: None,
        })
        .unwrap();

        let snippet =
            std::fs::read_to_string(dir.path().join("snippets/adastra-tag.liquid")).unwrap();
        assert!(snippet.contains("{% assign path = adastra-tag | replace: '~/', '../' %}"));
        assert!(snippet.contains(r#"{% if path == "/src/entrypoints/theme.css" or path == "theme.css" %}"#));
        assert!(snippet.contains(
            "{{ 'theme-1.css' | asset_url | split: '?' | first | stylesheet_tag: preload: preload }}"
        ));
        assert!(snippet.trim_end().ends_with("{% endif %}"));
    }

    #[test]
    fn test_writes_dev_snippet() {
        let dir = tempfile::tempdir().unwrap();
        run(&SnippetAction {
            cwd: dir.path().to_path_buf(),
            dev: true,
            asset_host: Some("http://localhost:3000/".to_string()),
            config: None,
        })
        .unwrap();

        let snippet =
            std::fs::read_to_string(dir.path().join("snippets/adastra-tag.liquid")).unwrap();
        assert!(snippet.starts_with("{% # theme-check-disable %}"));
        assert!(snippet.contains("assign file_url_prefix = 'http://localhost:3000/src/entrypoints/'"));
    }

    #[test]
    fn test_dev_snippet_uses_reachable_host() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("vite.config.js"),
            "export default { server: { host: true, port: 3000 } };",
        )
        .unwrap();
        run(&SnippetAction {
            cwd: dir.path().to_path_buf(),
            dev: true,
            asset_host: None,
            config: None,
        })
        .unwrap();

        let snippet =
            std::fs::read_to_string(dir.path().join("snippets/adastra-tag.liquid")).unwrap();
        assert!(snippet.contains("assign file_url_prefix = 'http://localhost:3000/src/entrypoints/'"));
        assert!(!snippet.contains("0.0.0.0"));
    }

    #[test]
    fn test_missing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let project = Project::load(dir.path(), None).unwrap();
        let err = write_production_snippet(&project).unwrap_err();
        assert!(err.to_string().contains("No build manifest"));
    }

    #[test]
    fn test_no_aliases_writes_nothing() {
        let dir = project_with_manifest();
        std::fs::write(dir.path().join("vite.config.js"), "export default {};").unwrap();

        let project = Project::load(dir.path(), None).unwrap();
        assert!(write_production_snippet(&project).is_err());
        assert!(!dir.path().join("snippets").exists());
    }
}
