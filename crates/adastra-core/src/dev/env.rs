//! `.env` loading and theme credential lookup.
//!
//! `--mode` picks the files: `.env`, `.env.local`, `.env.[mode]`,
//! `.env.[mode].local`, later files overriding earlier ones. Variables
//! already set in the process environment always win.

use std::collections::HashMap;
use std::path::Path;

/// Store domain variable.
pub const STORE_ENV: &str = "SHOPIFY_FLAG_STORE";

/// Theme Access app password variable.
pub const PASSWORD_ENV: &str = "SHOPIFY_CLI_THEME_TOKEN";

/// Default mode when `--mode` / `NODE_ENV` is unset.
pub const DEFAULT_MODE: &str = "development";

/// Parse `.env` contents.
///
/// `KEY=value`, `export KEY=value`, double quotes with `\n`-style escapes,
/// literal single quotes, `#` comments and ` #` inline comments.
#[must_use]
pub fn parse_env_file(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let (key, raw) = line.split_once('=')?;
            let key = key.trim();
            let key = key.strip_prefix("export ").unwrap_or(key).trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), parse_value(raw.trim())))
        })
        .collect()
}

fn parse_value(raw: &str) -> String {
    if let Some(inner) = raw.strip_prefix('"') {
        let mut value = String::new();
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            match c {
                '"' => break,
                '\\' => match chars.next() {
                    Some('n') => value.push('\n'),
                    Some('r') => value.push('\r'),
                    Some('t') => value.push('\t'),
                    Some(c @ ('\\' | '"')) => value.push(c),
                    Some(other) => {
                        value.push('\\');
                        value.push(other);
                    }
                    None => {}
                },
                _ => value.push(c),
            }
        }
        value
    } else if let Some(inner) = raw.strip_prefix('\'') {
        inner.split_once('\'').map_or(inner, |(v, _)| v).to_string()
    } else {
        raw.split_once(" #").map_or(raw, |(v, _)| v.trim_end()).to_string()
    }
}

/// Load the `.env` files for `mode` from `root`.
///
/// Keys already present in the process environment are dropped.
#[must_use]
pub fn load_env_files(root: &Path, mode: &str) -> HashMap<String, String> {
    let files = [
        ".env".to_string(),
        ".env.local".to_string(),
        format!(".env.{mode}"),
        format!(".env.{mode}.local"),
    ];

    let mut env = HashMap::new();
    for name in &files {
        if let Ok(content) = std::fs::read_to_string(root.join(name)) {
            env.extend(parse_env_file(&content));
        }
    }

    env.retain(|key, _| std::env::var_os(key).is_none());
    env
}

/// Store and password for the theme session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThemeVars {
    pub store: Option<String>,
    pub password: Option<String>,
}

/// Resolve theme credentials: explicit values first, then `.env` files.
///
/// The process environment is already folded into the explicit values by the
/// CLI's flag parsing.
#[must_use]
pub fn theme_vars(
    store: Option<&str>,
    password: Option<&str>,
    dot_env: &HashMap<String, String>,
) -> ThemeVars {
    let pick = |explicit: Option<&str>, key: &str| {
        explicit
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .or_else(|| dot_env.get(key).filter(|v| !v.is_empty()).cloned())
    };

    ThemeVars {
        store: pick(store, STORE_ENV),
        password: pick(password, PASSWORD_ENV),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_basic_key_value() {
        let env = parse_env_file("KEY=value\nOTHER=123");
        assert_eq!(env.get("KEY").unwrap(), "value");
        assert_eq!(env.get("OTHER").unwrap(), "123");
    }

    #[test]
    fn test_parse_quoting() {
        let env = parse_env_file(
            "A=\"line1\\nline2\"\nB='hello\\nworld'\nC=value # comment\nexport D=a=b",
        );
        assert_eq!(env.get("A").unwrap(), "line1\nline2");
        assert_eq!(env.get("B").unwrap(), r"hello\nworld");
        assert_eq!(env.get("C").unwrap(), "value");
        assert_eq!(env.get("D").unwrap(), "a=b");
    }

    #[test]
    fn test_skip_comments_and_blanks() {
        let env = parse_env_file("# comment\n\nKEY=\n  # another\n=orphan\n");
        assert_eq!(env.len(), 1);
        assert_eq!(env.get("KEY").unwrap(), "");
    }

    #[test]
    #[serial]
    fn test_load_env_files_mode_order() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        std::fs::write(root.join(".env"), "ADASTRA_TEST_X=base\nADASTRA_TEST_Y=base").unwrap();
        std::fs::write(root.join(".env.local"), "ADASTRA_TEST_X=local").unwrap();
        std::fs::write(root.join(".env.staging"), "ADASTRA_TEST_X=staging").unwrap();
        std::fs::write(root.join(".env.staging.local"), "ADASTRA_TEST_Y=staging_local").unwrap();

        let env = load_env_files(root, "staging");
        assert_eq!(env.get("ADASTRA_TEST_X").unwrap(), "staging");
        assert_eq!(env.get("ADASTRA_TEST_Y").unwrap(), "staging_local");

        let env = load_env_files(root, "development");
        assert_eq!(env.get("ADASTRA_TEST_X").unwrap(), "local");
    }

    #[test]
    #[serial]
    fn test_load_env_files_process_env_wins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".env"), "ADASTRA_TEST_SET=file").unwrap();

        std::env::set_var("ADASTRA_TEST_SET", "process");
        let env = load_env_files(dir.path(), DEFAULT_MODE);
        std::env::remove_var("ADASTRA_TEST_SET");

        assert!(!env.contains_key("ADASTRA_TEST_SET"));
    }

    #[test]
    fn test_load_env_files_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_env_files(dir.path(), DEFAULT_MODE).is_empty());
    }

    #[test]
    fn test_theme_vars_prefers_explicit() {
        let mut dot_env = HashMap::new();
        dot_env.insert(STORE_ENV.to_string(), "from-env".to_string());
        dot_env.insert(PASSWORD_ENV.to_string(), "shptka_env".to_string());

        let vars = theme_vars(Some("flag-store"), None, &dot_env);
        assert_eq!(vars.store.as_deref(), Some("flag-store"));
        assert_eq!(vars.password.as_deref(), Some("shptka_env"));

        let vars = theme_vars(Some(""), None, &HashMap::new());
        assert_eq!(vars, ThemeVars::default());
    }
}
