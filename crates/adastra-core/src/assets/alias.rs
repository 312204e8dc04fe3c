//! Bundler path aliases and their Liquid-representable rewrites.

use std::path::{Component, Path, PathBuf};
use tracing::warn;

/// The `find` side of an alias rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasFind {
    /// A literal path prefix such as `@` or `~components`.
    Literal(String),
    /// A regular expression source. Liquid has no regex filters, so these
    /// never become rewrites.
    Pattern(String),
}

/// One `resolve.alias` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasRule {
    pub find: AliasFind,
    pub replacement: PathBuf,
}

impl AliasRule {
    /// A literal alias.
    pub fn literal(find: impl Into<String>, replacement: impl Into<PathBuf>) -> Self {
        Self {
            find: AliasFind::Literal(find.into()),
            replacement: replacement.into(),
        }
    }

    /// A regex alias.
    pub fn pattern(source: impl Into<String>, replacement: impl Into<PathBuf>) -> Self {
        Self {
            find: AliasFind::Pattern(source.into()),
            replacement: replacement.into(),
        }
    }
}

/// A prefix rewrite applied to a requested entry path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewritePair {
    pub from: String,
    /// Replacement relative to the base dir, always `/`-separated.
    pub to: String,
}

/// Turn alias rules into ordered rewrites relative to `base_dir`.
///
/// Order is preserved and nothing is deduplicated: the rewrites are applied
/// one after another, so the first declared alias wins on overlap.
#[must_use]
pub fn resolve_aliases(aliases: &[AliasRule], base_dir: &Path) -> Vec<RewritePair> {
    aliases
        .iter()
        .filter_map(|alias| match &alias.find {
            AliasFind::Literal(find) => Some(RewritePair {
                from: find.clone(),
                to: normalize_slashes(&relative_path(base_dir, &alias.replacement)),
            }),
            AliasFind::Pattern(source) => {
                warn!(
                    pattern = %source,
                    replacement = %alias.replacement.display(),
                    "skipping regex alias: it cannot be expressed as a Liquid path rewrite"
                );
                None
            }
        })
        .collect()
}

/// Lexical path of `target` relative to `base`.
///
/// Both paths are normalized first (`.` dropped, `..` folded). Paths on
/// different roots (e.g. Windows drives) come back as the normalized target.
#[must_use]
pub fn relative_path(base: &Path, target: &Path) -> PathBuf {
    let base = normalize(base);
    let target = normalize(target);

    if root_of(&base) != root_of(&target) {
        return target;
    }

    let base_parts: Vec<Component<'_>> = base.components().collect();
    let target_parts: Vec<Component<'_>> = target.components().collect();

    let common = base_parts
        .iter()
        .zip(&target_parts)
        .take_while(|(a, b)| a == b)
        .count();

    let mut out = PathBuf::new();
    for _ in common..base_parts.len() {
        out.push("..");
    }
    for part in &target_parts[common..] {
        out.push(part.as_os_str());
    }
    out
}

fn root_of(path: &Path) -> Vec<Component<'_>> {
    path.components()
        .take_while(|c| matches!(c, Component::Prefix(_) | Component::RootDir))
        .collect()
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let last_is_normal =
                    matches!(out.components().next_back(), Some(Component::Normal(_)));
                if last_is_normal {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn normalize_slashes(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
