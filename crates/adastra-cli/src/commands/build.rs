//! `adastra build`: run the bundler's production build into the theme's
//! `assets/` directory, then write the production snippet from its manifest.

use miette::{IntoDiagnostic, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};

use super::snippet::write_production_snippet;
use super::{find_binary, Project};

const BUNDLER: &str = "vite";

#[derive(Debug, Clone)]
pub struct BuildAction {
    pub cwd: PathBuf,
    pub minify: bool,
    pub sourcemap: bool,
    /// One of `info`, `silent`, `error`, `warn`.
    pub log_level: String,
    pub mode: String,
    pub config: Option<PathBuf>,
}

impl BuildAction {
    /// Bundler arguments. Existing theme assets are kept, and the manifest
    /// is always emitted.
    fn bundler_args(&self, out_dir: &Path, config_file: Option<&Path>) -> Vec<String> {
        let mut args = vec![
            "build".to_string(),
            "--outDir".to_string(),
            out_dir.to_string_lossy().into_owned(),
            "--no-emptyOutDir".to_string(),
            "--manifest".to_string(),
            "--minify".to_string(),
            self.minify.to_string(),
            "--logLevel".to_string(),
            self.log_level.clone(),
            "--mode".to_string(),
            self.mode.clone(),
        ];
        if self.sourcemap {
            args.push("--sourcemap".to_string());
        }
        if let Some(config) = config_file {
            args.extend(["--config".to_string(), config.to_string_lossy().into_owned()]);
        }
        args
    }
}

pub fn run(action: BuildAction) -> Result<()> {
    let project = Project::load(&action.cwd, action.config.as_deref())?;
    let out_dir = project.theme_root().join("assets");

    let bundler = find_binary(&project.root, BUNDLER).ok_or_else(|| {
        miette::miette!("`{BUNDLER}` not found in node_modules/.bin or PATH. Install it first")
    })?;
    let args = action.bundler_args(&out_dir, action.config.as_deref());
    debug!(bundler = %bundler.display(), ?args, "running production build");

    let status = Command::new(&bundler)
        .args(&args)
        .current_dir(&project.root)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .map_err(|e| miette::miette!("Failed to run {}: {}", bundler.display(), e))?;
    if !status.success() {
        return Err(miette::miette!("Build failed ({status})"));
    }
    info!(out_dir = %out_dir.display(), "build finished");

    let path = write_production_snippet(&project)?;
    println!("  Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action() -> BuildAction {
        BuildAction {
            cwd: PathBuf::from("."),
            minify: true,
            sourcemap: false,
            log_level: "info".to_string(),
            mode: "production".to_string(),
            config: None,
        }
    }

    #[test]
    fn test_bundler_args_defaults() {
        let args = action().bundler_args(Path::new("/theme/assets"), None);
        assert_eq!(
            args,
            vec![
                "build",
                "--outDir",
                "/theme/assets",
                "--no-emptyOutDir",
                "--manifest",
                "--minify",
                "true",
                "--logLevel",
                "info",
                "--mode",
                "production",
            ]
        );
    }

    #[test]
    fn test_bundler_args_flags() {
        let action = BuildAction {
            minify: false,
            sourcemap: true,
            log_level: "silent".to_string(),
            ..action()
        };
        let args = action
            .bundler_args(Path::new("assets"), Some(Path::new("vite.config.ts")))
            .join(" ");
        assert!(args.contains("--minify false"));
        assert!(args.contains("--logLevel silent"));
        assert!(args.contains("--sourcemap"));
        assert!(args.ends_with("--config vite.config.ts"));
    }

    #[cfg(unix)]
    #[test]
    fn test_build_writes_snippet_after_bundler() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("vite.config.js"),
            "export default { resolve: { alias: { '@': './src' } } };",
        )
        .unwrap();

        // Stand-in bundler that emits a manifest where a real build would.
        let bin = dir.path().join("node_modules/.bin");
        std::fs::create_dir_all(&bin).unwrap();
        let script = bin.join(BUNDLER);
        std::fs::write(
            &script,
            "#!/bin/sh\nmkdir -p \"$3/.vite\"\nprintf '%s' '{\"src/entrypoints/main.ts\":{\"file\":\"main-1.js\",\"src\":\"src/entrypoints/main.ts\",\"isEntry\":true}}' > \"$3/.vite/manifest.json\"\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        run(BuildAction {
            cwd: dir.path().to_path_buf(),
            ..action()
        })
        .unwrap();

        let snippet =
            std::fs::read_to_string(dir.path().join("snippets/adastra-tag.liquid")).unwrap();
        assert!(snippet.contains("replace: '@/', '../'"));
        assert!(snippet.contains("'main-1.js' | asset_url"));
    }
}
