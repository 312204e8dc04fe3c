//! Liquid tag generation.
//!
//! Two outputs share the classifier and alias resolver:
//!
//! - the development snippet, which routes every requested path to the
//!   asset dev server and classifies it at render time;
//! - the production dispatch, an `if`/`elsif` chain mapping entry paths to
//!   `asset_url` script, preload and stylesheet tags.

use std::path::Path;

use super::alias::{resolve_aliases, AliasRule};
use super::extension::{KNOWN_CSS_EXTENSIONS, KNOWN_JSX_EXTENSIONS};
use crate::error::{Error, Result};

/// Dev server path of the client runtime module.
pub const CLIENT_SCRIPT_PATH: &str = "@vite/client";

/// Dev server path of the React Refresh runtime module.
pub const CLIENT_REACT_REFRESH_PATH: &str = "@react-refresh";

/// Keeps `theme-check` from linting generated snippets.
pub const DISABLE_THEME_CHECK_TAG: &str = "{% # theme-check-disable %}\n";

/// Header placed on every generated snippet.
pub const SNIPPET_DISCLAIMER: &str = "{% comment %}\n  IMPORTANT: This snippet is automatically generated by Vite.\n  Do not attempt to modify this file directly, as any changes will be overwritten by the next build.\n{% endcomment %}\n";

/// One branch of the production dispatch chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryTag {
    /// Request paths that select this branch, joined with `or`.
    pub match_paths: Vec<String>,
    /// Branch body.
    pub markup: String,
    /// Opens the chain with `if` instead of `elsif`.
    pub is_first: bool,
}

impl EntryTag {
    /// Render the branch. The chain's closing `{% endif %}` is the caller's.
    #[must_use]
    pub fn render(&self) -> String {
        entry_tag(&self.match_paths, &self.markup, self.is_first)
    }
}

/// Conditional branch for an entry.
///
/// Exactly one branch per chain should pass `is_first = true`; this is not
/// checked here.
#[must_use]
pub fn entry_tag<S: AsRef<str>>(entry_paths: &[S], tag: &str, is_first: bool) -> String {
    let keyword = if is_first { "if" } else { "elsif" };
    let condition = entry_paths
        .iter()
        .map(|entry| format!("path == \"{}\"", entry.as_ref()))
        .collect::<Vec<_>>()
        .join(" or ");
    format!("{{% {keyword} {condition} %}}\n  {tag}")
}

/// `{% assign path = <var> | replace: 'from/', 'to/' | ... %}`.
///
/// Rewrites alias prefixes in the requested path into paths relative to the
/// entrypoints dir, so `'@/entrypoints/main.ts'` matches the manifest entry.
///
/// # Errors
/// Returns [`Error::NoAliasRewrites`] when no alias has a string `find`:
/// Liquid rejects an assignment with an empty filter chain.
pub fn resolved_path_assignment(
    rules: &[AliasRule],
    entrypoints_dir: &Path,
    snippet_var: &str,
) -> Result<String> {
    let pairs = resolve_aliases(rules, entrypoints_dir);
    if pairs.is_empty() {
        return Err(Error::NoAliasRewrites);
    }

    let filters = pairs
        .iter()
        .map(|pair| format!("replace: '{}/', '{}/'", pair.from, pair.to))
        .collect::<Vec<_>>()
        .join(" | ");

    Ok(format!("{{% assign path = {snippet_var} | {filters} %}}\n"))
}

/// `modulepreload` link for a bundled chunk.
#[must_use]
pub fn preload_script_tag(file_name: &str) -> String {
    format!(
        "<link rel=\"modulepreload\" href=\"{{{{ '{file_name}' | asset_url | split: '?' | first }}}}\" crossorigin=\"anonymous\">"
    )
}

/// Module script tag for a bundled entry.
#[must_use]
pub fn script_tag(file_name: &str) -> String {
    format!(
        "<script src=\"{{{{ '{file_name}' | asset_url | split: '?' | first }}}}\" type=\"module\" crossorigin=\"anonymous\"></script>"
    )
}

/// Stylesheet tag. `preload` is the snippet's render-time parameter.
#[must_use]
pub fn stylesheet_tag(file_name: &str) -> String {
    format!("{{{{ '{file_name}' | asset_url | split: '?' | first | stylesheet_tag: preload: preload }}}}")
}

/// The development snippet.
///
/// Pure function of its inputs and the two extension lists, which are inlined
/// so classification happens in Liquid for each requested path.
#[must_use]
pub fn dev_runtime_snippet(asset_host: &str, entrypoints_dir: &str) -> String {
    let css_extensions = KNOWN_CSS_EXTENSIONS.join("|");
    let jsx_extensions = KNOWN_JSX_EXTENSIONS.join("|");

    format!(
        r#"{{% liquid
  assign path_prefix = path | slice: 0
  if path_prefix == '/'
    assign file_url_prefix = '{asset_host}'
  else
    assign file_url_prefix = '{asset_host}/{entrypoints_dir}/'
  endif

  assign file_url = path | prepend: file_url_prefix
  assign file_name = path | split: '/' | last
  if file_name contains '.'
    assign file_extension = file_name | split: '.' | last
  endif

  assign css_extensions = '{css_extensions}' | split: '|'
  assign jsx_extensions = '{jsx_extensions}' | split: '|'
  assign is_css = false
  assign is_jsx = false

  if css_extensions contains file_extension
    assign is_css = true
  endif

  if jsx_extensions contains file_extension
    assign is_jsx = true
  endif

  if file_extension == blank
    assign file_url = file_url | append: '/' | append: file_name
  endif
%}}

{{% if is_jsx %}}
  <script type="module">
    import RefreshRuntime from "{asset_host}/{CLIENT_REACT_REFRESH_PATH}"
    RefreshRuntime.injectIntoGlobalHook(window)
    window.$RefreshReg$ = () => {{}}
    window.$RefreshSig$ = () => (type) => type
    window.__vite_plugin_react_preamble_installed__ = true
  </script>
{{% endif %}}

<script src="{asset_host}/{CLIENT_SCRIPT_PATH}" type="module"></script>

{{% if is_css %}}
  {{{{ file_url | stylesheet_tag }}}}
{{% else %}}
  <script src="{{{{ file_url }}}}" type="module" crossorigin="anonymous"></script>
{{% endif %}}
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_tag_first_uses_if() {
        let tag = entry_tag(&["a", "b"], "TAG", true);
        assert!(tag.contains(r#"if path == "a" or path == "b""#));
        assert!(!tag.contains("elsif"));
        assert_eq!(tag, "{% if path == \"a\" or path == \"b\" %}\n  TAG");
    }

    #[test]
    fn test_entry_tag_default_uses_elsif() {
        let tag = entry_tag(&["a"], "TAG", false);
        assert!(tag.starts_with("{% elsif path == \"a\" %}"));
    }

    #[test]
    fn test_entry_tag_struct_renders_same() {
        let tag = EntryTag {
            match_paths: vec!["/src/main.ts".to_string(), "main.ts".to_string()],
            markup: "X".to_string(),
            is_first: false,
        };
        assert_eq!(tag.render(), entry_tag(&tag.match_paths, "X", false));
    }

    #[test]
    fn test_resolved_path_assignment_single_alias() {
        let rules = vec![AliasRule::literal("@a", "dist/a")];
        let out = resolved_path_assignment(&rules, Path::new("dist"), "myPath").unwrap();
        assert_eq!(out, "{% assign path = myPath | replace: '@a/', 'a/' %}\n");
        assert_eq!(out.matches("replace:").count(), 1);
    }

    #[test]
    fn test_resolved_path_assignment_joins_in_order() {
        let rules = vec![
            AliasRule::literal("~", "/p/src"),
            AliasRule::pattern("^#", "/p/src"),
            AliasRule::literal("@@", "/p"),
        ];
        let out =
            resolved_path_assignment(&rules, Path::new("/p/src/entrypoints"), "adastra-tag").unwrap();
        assert_eq!(
            out,
            "{% assign path = adastra-tag | replace: '~/', '../' | replace: '@@/', '../../' %}\n"
        );
    }

    #[test]
    fn test_resolved_path_assignment_without_aliases_errors() {
        let err = resolved_path_assignment(&[], Path::new("dist"), "myPath").unwrap_err();
        assert!(matches!(err, Error::NoAliasRewrites));

        let only_patterns = vec![AliasRule::pattern("^@", "/p/src")];
        assert!(resolved_path_assignment(&only_patterns, Path::new("/p"), "v").is_err());
    }

    #[test]
    fn test_asset_tags() {
        assert_eq!(
            script_tag("main-abc.js"),
            r#"<script src="{{ 'main-abc.js' | asset_url | split: '?' | first }}" type="module" crossorigin="anonymous"></script>"#
        );
        assert_eq!(
            preload_script_tag("vendor.js"),
            r#"<link rel="modulepreload" href="{{ 'vendor.js' | asset_url | split: '?' | first }}" crossorigin="anonymous">"#
        );
        assert_eq!(
            stylesheet_tag("main.css"),
            "{{ 'main.css' | asset_url | split: '?' | first | stylesheet_tag: preload: preload }}"
        );
    }

    #[test]
    fn test_dev_snippet_is_byte_stable() {
        let a = dev_runtime_snippet("http://localhost:5173", "src/entrypoints");
        let b = dev_runtime_snippet("http://localhost:5173", "src/entrypoints");
        assert_eq!(a, b);
    }

    #[test]
    fn test_dev_snippet_structure() {
        let snippet = dev_runtime_snippet("http://127.0.0.1:5173", "src/entrypoints");

        assert!(snippet.starts_with("{% liquid\n"));
        assert!(snippet.contains("assign file_url_prefix = 'http://127.0.0.1:5173'\n"));
        assert!(snippet
            .contains("assign file_url_prefix = 'http://127.0.0.1:5173/src/entrypoints/'\n"));
        assert!(snippet.contains(
            "assign css_extensions = 'css|less|sass|scss|styl|stylus|pcss|postcss' | split: '|'"
        ));
        assert!(snippet.contains("assign jsx_extensions = 'jsx|tsx' | split: '|'"));
        assert!(snippet.contains("import RefreshRuntime from \"http://127.0.0.1:5173/@react-refresh\""));
        assert!(snippet.contains("window.$RefreshReg$ = () => {}\n"));
        assert!(snippet
            .contains("<script src=\"http://127.0.0.1:5173/@vite/client\" type=\"module\"></script>"));
        assert!(snippet.contains("  {{ file_url | stylesheet_tag }}\n"));
        assert!(snippet.contains(
            "<script src=\"{{ file_url }}\" type=\"module\" crossorigin=\"anonymous\"></script>"
        ));
        assert!(snippet.ends_with("{% endif %}\n"));

        // refresh preamble comes before the client script, which comes before the asset
        let refresh = snippet.find("{% if is_jsx %}").unwrap();
        let client = snippet.find("@vite/client").unwrap();
        let asset = snippet.find("{% if is_css %}").unwrap();
        assert!(refresh < client && client < asset);
    }
}
