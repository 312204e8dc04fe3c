//! Asset routing for theme views.
//!
//! Decides per requested asset path whether the theme loads it from the
//! asset dev server or from the theme's `assets/` CDN, and renders that
//! decision as Liquid.

pub mod alias;
pub mod extension;
pub mod liquid;
pub mod manifest;
pub mod snippet;

pub use alias::{resolve_aliases, AliasFind, AliasRule, RewritePair};
pub use extension::{classify, ExtensionClass, KNOWN_CSS_EXTENSIONS, KNOWN_JSX_EXTENSIONS};
pub use liquid::{
    dev_runtime_snippet, entry_tag, preload_script_tag, resolved_path_assignment, script_tag,
    stylesheet_tag, EntryTag,
};
pub use manifest::{find_manifest, load_manifest, Manifest, ManifestChunk};
pub use snippet::{dev_snippet, production_snippet, snippet_variable, write_snippet};
