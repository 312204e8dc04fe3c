//! Configuration file discovery and parsing for `adastra`.
//!
//! Loads `adastra.config.ts`, `adastra.config.js`, `vite.config.ts`, or
//! `vite.config.js` and extracts the static parts we need: server options,
//! `resolve.alias` (in declaration order) and the adastra plugin options.
//!
//! ## Supported config format
//!
//! ```js
//! export default defineConfig({
//!   server: { port: 5173, host: 'localhost' },
//!   resolve: {
//!     alias: [
//!       { find: '@', replacement: path.resolve(__dirname, 'src') },
//!       { find: /^~(.*)$/, replacement: './src/$1' },
//!     ],
//!   },
//!   plugins: [adastra({ themeRoot: './', entrypointsDir: 'src/entrypoints' })],
//! });
//! ```
//!
//! Options may also live under a top-level `adastra: { ... }` key.

use std::path::{Path, PathBuf};
use tracing::warn;

use crate::assets::{AliasFind, AliasRule};
use crate::error::{Error, Result};

/// Configuration loaded from a config file.
#[derive(Debug, Clone, Default)]
pub struct AdastraConfig {
    /// Asset dev server options.
    pub server: ServerConfig,
    /// Resolve options (aliases).
    pub resolve: ResolveConfig,
    /// Theme layout options.
    pub adastra: AdastraOptions,
}

/// Server configuration from config file.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    /// Port to listen on.
    pub port: Option<u16>,
    /// Host to bind to.
    pub host: Option<String>,
}

/// Resolve configuration from config file.
#[derive(Debug, Clone, Default)]
pub struct ResolveConfig {
    /// Aliases in declaration order. Replacements are absolute.
    pub alias: Vec<AliasRule>,
}

/// Theme layout, relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdastraOptions {
    /// Theme directory (contains `snippets/`, `assets/`, ...).
    pub theme_root: PathBuf,
    /// Frontend sources, excluded from theme uploads.
    pub source_code_dir: PathBuf,
    /// Entry point modules.
    pub entrypoints_dir: PathBuf,
    /// Generated snippet file name.
    pub snippet_file: String,
}

impl Default for AdastraOptions {
    fn default() -> Self {
        Self {
            theme_root: PathBuf::from("./"),
            source_code_dir: PathBuf::from("src"),
            entrypoints_dir: PathBuf::from("src/entrypoints"),
            snippet_file: "adastra-tag.liquid".to_string(),
        }
    }
}

/// Config file names in priority order.
const CONFIG_FILES: &[&str] = &[
    "adastra.config.ts",
    "adastra.config.js",
    "vite.config.ts",
    "vite.config.js",
];

/// Plugin factory whose options argument we read.
const PLUGIN_NAME: &str = "adastra";

/// Find a config file in the given root directory.
#[must_use]
pub fn find_config_file(root: &Path) -> Option<PathBuf> {
    CONFIG_FILES
        .iter()
        .map(|name| root.join(name))
        .find(|path| path.exists())
}

/// Load configuration from a config file in the given root directory.
///
/// If `config_path` is `Some`, use that specific file. Otherwise, auto-discover.
pub fn load_config(
    root: &Path,
    config_path: Option<&Path>,
) -> Result<Option<(PathBuf, AdastraConfig)>> {
    let path = match config_path {
        Some(p) => {
            let abs = if p.is_absolute() {
                p.to_path_buf()
            } else {
                root.join(p)
            };
            if !abs.exists() {
                return Err(Error::other(format!(
                    "Config file not found: {}",
                    abs.display()
                )));
            }
            abs
        }
        None => match find_config_file(root) {
            Some(p) => p,
            None => return Ok(None),
        },
    };

    let source = std::fs::read_to_string(&path).map_err(|source| Error::ConfigRead {
        path: path.clone(),
        source,
    })?;

    let config_dir = path.parent().unwrap_or(root);
    let config = parse_config(&source, config_dir).map_err(|message| Error::ConfigParse {
        path: path.clone(),
        message,
    })?;
    Ok(Some((path, config)))
}

/// Parse the default export of a config file.
///
/// Relative alias replacements and `__dirname` resolve against `config_dir`.
fn parse_config(source: &str, config_dir: &Path) -> Result<AdastraConfig, String> {
    let obj_str = extract_default_export_object(source)
        .ok_or_else(|| "No `export default { ... }` found in config file".to_string())?;

    let value = JsParser::new(&obj_str).parse_value()?;
    let mut config = AdastraConfig::default();

    if let Some(server) = value.get("server") {
        if let Some(port) = server.get("port").and_then(JsValue::as_f64) {
            config.server.port = u16::try_from(port as i64).ok();
        }
        config.server.host = match server.get("host") {
            Some(JsValue::String(host)) => Some(host.clone()),
            Some(JsValue::Bool(true)) => Some("0.0.0.0".to_string()),
            _ => None,
        };
    }

    if let Some(alias) = value.get("resolve").and_then(|r| r.get("alias")) {
        config.resolve.alias = parse_aliases(alias, config_dir);
    }

    let plugin_options = value.get("plugins").and_then(|plugins| match plugins {
        JsValue::Array(items) => items.iter().find_map(|item| match item {
            JsValue::Call { callee, args } if callee == PLUGIN_NAME => args.first(),
            _ => None,
        }),
        _ => None,
    });
    if let Some(options) = plugin_options.or_else(|| value.get(PLUGIN_NAME)) {
        config.adastra = parse_options(options);
    }

    Ok(config)
}

fn parse_aliases(alias: &JsValue, config_dir: &Path) -> Vec<AliasRule> {
    let mut rules = Vec::new();
    let mut push = |find: AliasFind, replacement: &JsValue| {
        match eval_path(replacement, config_dir) {
            Some(replacement) => rules.push(AliasRule { find, replacement }),
            None => warn!(?find, "skipping alias with a replacement that is not a static path"),
        }
    };

    match alias {
        JsValue::Object(entries) => {
            for (key, replacement) in entries {
                push(AliasFind::Literal(key.clone()), replacement);
            }
        }
        JsValue::Array(items) => {
            for item in items {
                let find = match item.get("find") {
                    Some(JsValue::String(s)) => AliasFind::Literal(s.clone()),
                    Some(JsValue::Regex(src)) => AliasFind::Pattern(src.clone()),
                    _ => continue,
                };
                if let Some(replacement) = item.get("replacement") {
                    push(find, replacement);
                }
            }
        }
        _ => {}
    }

    rules
}

fn parse_options(options: &JsValue) -> AdastraOptions {
    let mut out = AdastraOptions::default();
    let string = |key: &str| options.get(key).and_then(JsValue::as_str);

    if let Some(root) = string("themeRoot") {
        out.theme_root = PathBuf::from(root);
    }
    if let Some(dir) = string("sourceCodeDir") {
        out.source_code_dir = PathBuf::from(dir);
        out.entrypoints_dir = out.source_code_dir.join("entrypoints");
    }
    if let Some(dir) = string("entrypointsDir") {
        out.entrypoints_dir = PathBuf::from(dir);
    }
    if let Some(file) = string("snippetFile") {
        out.snippet_file = file.to_string();
    }
    out
}

/// Evaluate the static path expressions people put in alias replacements.
///
/// Handles string literals, `path.resolve(...)` / `path.join(...)` over
/// `__dirname`, `process.cwd()` and strings, and
/// `fileURLToPath(new URL('./x', import.meta.url))`.
fn eval_path(value: &JsValue, config_dir: &Path) -> Option<PathBuf> {
    match value {
        JsValue::String(s) => Some(config_dir.join(s)),
        JsValue::Ident(name) if name == "__dirname" => Some(config_dir.to_path_buf()),
        JsValue::Call { callee, args } => match callee.as_str() {
            "process.cwd" => Some(config_dir.to_path_buf()),
            "path.resolve" | "resolve" | "path.join" | "join" => {
                let mut out = PathBuf::new();
                for arg in args {
                    match arg {
                        JsValue::String(s) => out.push(s),
                        other => out.push(eval_path(other, config_dir)?),
                    }
                }
                Some(if out.is_absolute() {
                    out
                } else {
                    config_dir.join(out)
                })
            }
            "fileURLToPath" => match args.first()? {
                JsValue::Call { callee, args } if callee == "URL" => match args.first()? {
                    JsValue::String(s) => Some(config_dir.join(s)),
                    _ => None,
                },
                _ => None,
            },
            _ => None,
        },
        _ => None,
    }
}

/// Extract the object literal from `export default { ... }`,
/// `export default defineConfig({ ... })` or `module.exports = { ... }`.
///
/// Returns the object including the outer braces.
fn extract_default_export_object(source: &str) -> Option<String> {
    let stripped = strip_comments(source);

    let after = ["export default", "module.exports ="]
        .iter()
        .find_map(|marker| {
            stripped
                .find(marker)
                .map(|idx| stripped[idx + marker.len()..].trim_start())
        })?;

    // `defineConfig(` and friends
    let after = match after.find('{') {
        Some(open) if after[..open].trim_end().ends_with('(') => &after[open..],
        _ => after,
    };

    if !after.starts_with('{') {
        return None;
    }

    let mut depth = 0;
    let mut in_string: Option<char> = None;
    let mut prev = '\0';
    let mut end = 0;

    for (i, ch) in after.char_indices() {
        if let Some(quote) = in_string {
            if ch == quote && prev != '\\' {
                in_string = None;
            }
        } else {
            match ch {
                '"' | '\'' | '`' => in_string = Some(ch),
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        end = i + 1;
                        break;
                    }
                }
                _ => {}
            }
        }
        prev = ch;
    }

    if depth != 0 {
        return None;
    }

    Some(after[..end].to_string())
}

/// Strip single-line (//) and multi-line (/* */) comments from JS source.
fn strip_comments(source: &str) -> String {
    let mut result = String::with_capacity(source.len());
    let chars: Vec<char> = source.chars().collect();
    let len = chars.len();
    let mut i = 0;
    let mut in_string: Option<char> = None;

    while i < len {
        if let Some(quote) = in_string {
            result.push(chars[i]);
            if chars[i] == quote && (i == 0 || chars[i - 1] != '\\') {
                in_string = None;
            }
            i += 1;
        } else if i + 1 < len && chars[i] == '/' && chars[i + 1] == '/' {
            while i < len && chars[i] != '\n' {
                i += 1;
            }
        } else if i + 1 < len && chars[i] == '/' && chars[i + 1] == '*' {
            i += 2;
            while i + 1 < len && !(chars[i] == '*' && chars[i + 1] == '/') {
                if chars[i] == '\n' {
                    result.push('\n');
                }
                i += 1;
            }
            i += 2;
        } else {
            if chars[i] == '"' || chars[i] == '\'' || chars[i] == '`' {
                in_string = Some(chars[i]);
            }
            result.push(chars[i]);
            i += 1;
        }
    }

    result
}

/// A JavaScript value as far as static config reading goes.
#[derive(Debug, Clone, PartialEq)]
enum JsValue {
    /// Keys in source order.
    Object(Vec<(String, JsValue)>),
    Array(Vec<JsValue>),
    String(String),
    Number(f64),
    Bool(bool),
    Null,
    /// Regex literal source, without slashes or flags.
    Regex(String),
    /// Bare (possibly dotted) identifier such as `__dirname`.
    Ident(String),
    /// `callee(args)`, also used for `new Callee(args)`.
    Call { callee: String, args: Vec<JsValue> },
}

impl JsValue {
    fn get(&self, key: &str) -> Option<&JsValue> {
        match self {
            Self::Object(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// JSON5-like reader: unquoted keys, single quotes, trailing commas, regex
/// literals and simple call expressions.
struct JsParser {
    chars: Vec<char>,
    pos: usize,
}

impl JsParser {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn parse_value(&mut self) -> Result<JsValue, String> {
        self.skip_whitespace();
        match self.peek() {
            Some('{') => self.parse_object(),
            Some('[') => self.parse_array(),
            Some('"' | '\'' | '`') => self.parse_string().map(JsValue::String),
            Some('/') => self.parse_regex(),
            Some(ch) if ch == '-' || ch.is_ascii_digit() => self.parse_number(),
            Some(ch) if is_ident_start(ch) => self.parse_identifier_expr(),
            Some(ch) => Err(format!("Unexpected character '{}' at position {}", ch, self.pos)),
            None => Err("Unexpected end of input".to_string()),
        }
    }

    fn parse_object(&mut self) -> Result<JsValue, String> {
        self.advance(); // '{'
        let mut entries = Vec::new();

        loop {
            self.skip_whitespace();
            match self.peek() {
                Some('}') => {
                    self.advance();
                    return Ok(JsValue::Object(entries));
                }
                None => return Err("Unterminated object".to_string()),
                _ => {}
            }

            let key = self.parse_key()?;
            self.skip_whitespace();

            let value = match self.peek() {
                Some(':') => {
                    self.advance();
                    self.parse_value()?
                }
                // shorthand `{ react }`
                Some(',' | '}') => JsValue::Ident(key.clone()),
                other => return Err(format!("Expected ':' after key, got {:?}", other)),
            };
            entries.push((key, value));

            self.skip_whitespace();
            match self.peek() {
                Some(',') => {
                    self.advance();
                }
                Some('}') => {}
                None => return Err("Unterminated object".to_string()),
                Some(ch) => return Err(format!("Expected ',' or '}}' in object, got '{}'", ch)),
            }
        }
    }

    fn parse_array(&mut self) -> Result<JsValue, String> {
        self.advance(); // '['
        let mut items = Vec::new();

        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(']') => {
                    self.advance();
                    return Ok(JsValue::Array(items));
                }
                None => return Err("Unterminated array".to_string()),
                _ => {}
            }

            items.push(self.parse_value()?);

            self.skip_whitespace();
            match self.peek() {
                Some(',') => {
                    self.advance();
                }
                Some(']') => {}
                None => return Err("Unterminated array".to_string()),
                Some(ch) => return Err(format!("Expected ',' or ']' in array, got '{}'", ch)),
            }
        }
    }

    fn parse_key(&mut self) -> Result<String, String> {
        self.skip_whitespace();
        match self.peek() {
            Some('"' | '\'') => self.parse_string(),
            Some(ch) if is_ident_start(ch) => Ok(self.read_identifier()),
            other => Err(format!("Expected object key, got {:?}", other)),
        }
    }

    fn parse_string(&mut self) -> Result<String, String> {
        let Some(quote) = self.advance() else {
            return Err("Expected string".to_string());
        };
        let mut s = String::new();

        loop {
            match self.advance() {
                Some(ch) if ch == quote => return Ok(s),
                Some('\\') => match self.advance() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some('r') => s.push('\r'),
                    Some('\\') => s.push('\\'),
                    Some(ch) if ch == quote => s.push(ch),
                    Some(ch) => {
                        s.push('\\');
                        s.push(ch);
                    }
                    None => return Err("Unterminated string escape".to_string()),
                },
                Some(ch) => s.push(ch),
                None => return Err("Unterminated string".to_string()),
            }
        }
    }

    fn parse_regex(&mut self) -> Result<JsValue, String> {
        self.advance(); // '/'
        let mut source = String::new();
        let mut in_class = false;

        loop {
            match self.advance() {
                Some('\\') => {
                    source.push('\\');
                    if let Some(ch) = self.advance() {
                        source.push(ch);
                    }
                }
                Some('[') => {
                    in_class = true;
                    source.push('[');
                }
                Some(']') => {
                    in_class = false;
                    source.push(']');
                }
                Some('/') if !in_class => break,
                Some(ch) => source.push(ch),
                None => return Err("Unterminated regex literal".to_string()),
            }
        }

        // flags
        while self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
            self.pos += 1;
        }
        Ok(JsValue::Regex(source))
    }

    fn parse_number(&mut self) -> Result<JsValue, String> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.pos += 1;
        }
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || c == '.' || c == '_')
        {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos]
            .iter()
            .filter(|c| **c != '_')
            .collect();
        text.parse::<f64>()
            .map(JsValue::Number)
            .map_err(|e| format!("Invalid number '{}': {}", text, e))
    }

    /// Keywords, identifiers, `new X(...)` and `callee(...)`.
    fn parse_identifier_expr(&mut self) -> Result<JsValue, String> {
        let mut ident = self.read_identifier();
        match ident.as_str() {
            "true" => return Ok(JsValue::Bool(true)),
            "false" => return Ok(JsValue::Bool(false)),
            "null" | "undefined" => return Ok(JsValue::Null),
            "new" => {
                self.skip_whitespace();
                ident = self.read_identifier();
            }
            _ => {}
        }

        self.skip_whitespace();
        if self.peek() != Some('(') {
            return Ok(JsValue::Ident(ident));
        }
        self.advance(); // '('

        let mut args = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(')') => {
                    self.advance();
                    return Ok(JsValue::Call {
                        callee: ident,
                        args,
                    });
                }
                None => return Err(format!("Unterminated call to {}", ident)),
                _ => {}
            }

            args.push(self.parse_value()?);

            self.skip_whitespace();
            match self.peek() {
                Some(',') => {
                    self.advance();
                }
                Some(')') => {}
                None => return Err(format!("Unterminated call to {}", ident)),
                Some(ch) => return Err(format!("Expected ',' or ')' in call, got '{}'", ch)),
            }
        }
    }

    /// Identifier, possibly dotted (`import.meta.url`, `process.env.NODE_ENV`).
    fn read_identifier(&mut self) -> String {
        let mut ident = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' || ch == '$' || ch == '.' {
                ident.push(ch);
                self.pos += 1;
            } else {
                break;
            }
        }
        ident
    }
}

fn is_ident_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_' || ch == '$'
}
