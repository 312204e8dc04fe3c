//! Asset extension classification.
//!
//! The same lists are embedded into the dev-runtime snippet so the theme
//! classifies requested paths at render time exactly like we do here.

/// Extensions served as stylesheets.
pub const KNOWN_CSS_EXTENSIONS: &[&str] = &[
    "css", "less", "sass", "scss", "styl", "stylus", "pcss", "postcss",
];

/// Extensions that need the React Refresh preamble in development.
pub const KNOWN_JSX_EXTENSIONS: &[&str] = &["jsx", "tsx"];

/// How an asset path is routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionClass {
    /// Stylesheet (`stylesheet_tag`).
    Css,
    /// Module script that needs React Refresh.
    Jsx,
    /// Anything else, including paths without an extension.
    Other,
}

/// Classify an extension (without the leading dot).
///
/// Matching is case-sensitive and exact. `None` and the empty string are
/// `Other`; callers treat such paths as directory-style URLs.
#[must_use]
pub fn classify(extension: Option<&str>) -> ExtensionClass {
    let Some(ext) = extension.filter(|e| !e.is_empty()) else {
        return ExtensionClass::Other;
    };

    if KNOWN_CSS_EXTENSIONS.contains(&ext) {
        ExtensionClass::Css
    } else if KNOWN_JSX_EXTENSIONS.contains(&ext) {
        ExtensionClass::Jsx
    } else {
        ExtensionClass::Other
    }
}

/// Extension of the last `/` segment of `path`: everything after its last `.`.
#[must_use]
pub fn extension_of(path: &str) -> Option<&str> {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    file_name.rsplit_once('.').map(|(_, ext)| ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_css_extensions_classify_as_css() {
        for ext in KNOWN_CSS_EXTENSIONS {
            assert_eq!(classify(Some(ext)), ExtensionClass::Css, "{ext}");
        }
    }

    #[test]
    fn test_jsx_extensions_classify_as_jsx() {
        for ext in KNOWN_JSX_EXTENSIONS {
            assert_eq!(classify(Some(ext)), ExtensionClass::Jsx, "{ext}");
        }
    }

    #[test]
    fn test_unknown_and_missing_are_other() {
        assert_eq!(classify(None), ExtensionClass::Other);
        assert_eq!(classify(Some("")), ExtensionClass::Other);
        assert_eq!(classify(Some("ts")), ExtensionClass::Other);
        assert_eq!(classify(Some("js")), ExtensionClass::Other);
    }

    #[test]
    fn test_classification_is_case_sensitive() {
        assert_eq!(classify(Some("CSS")), ExtensionClass::Other);
        assert_eq!(classify(Some("Tsx")), ExtensionClass::Other);
    }

    #[test]
    fn test_lists_do_not_overlap() {
        for ext in KNOWN_CSS_EXTENSIONS {
            assert!(!KNOWN_JSX_EXTENSIONS.contains(ext), "{ext} in both lists");
        }
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("main.ts"), Some("ts"));
        assert_eq!(extension_of("/src/styles/theme.min.css"), Some("css"));
        assert_eq!(extension_of("components"), None);
        assert_eq!(extension_of("v1.2/components"), None);
    }
}
