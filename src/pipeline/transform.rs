//! Content transforms applied by pipeline stages
//!
//! Each asset class gets a fixed ordered chain of transforms. The trait is
//! the replacement seam: the built-in implementations below are deliberately
//! small stand-ins for heavyweight preprocessors and can be swapped out
//! per stage.

use async_trait::async_trait;
use regex::Regex;
use std::path::PathBuf;
use thiserror::Error;

/// One file flowing through a transform chain
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    /// Path relative to the stage's source root; preserved on write
    pub rel_path: PathBuf,
    pub bytes: Vec<u8>,
}

impl Asset {
    pub fn new(rel_path: impl Into<PathBuf>, bytes: Vec<u8>) -> Self {
        Asset {
            rel_path: rel_path.into(),
            bytes,
        }
    }

    pub fn text(&self) -> Result<String, TransformError> {
        String::from_utf8(self.bytes.clone()).map_err(Into::into)
    }

    pub fn with_text(mut self, text: String) -> Self {
        self.bytes = text.into_bytes();
        self
    }

    pub fn with_extension(mut self, ext: &str) -> Self {
        self.rel_path.set_extension(ext);
        self
    }
}

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("{0}")]
    Syntax(String),

    #[error("file is not valid UTF-8: {0}")]
    NotUtf8(#[from] std::string::FromUtf8Error),
}

/// A single content transform; chains consume and produce assets in order.
#[async_trait]
pub trait Transform: Send + Sync {
    fn name(&self) -> &str;

    async fn apply(&self, asset: Asset) -> Result<Asset, TransformError>;
}

/// Expands nested style rules into flat ones and renames `.scss` to `.css`.
///
/// Supports nesting with `&` parent references and `//` line comments; a
/// full preprocessor slots in behind the same trait.
pub struct StylePreprocessor;

#[async_trait]
impl Transform for StylePreprocessor {
    fn name(&self) -> &str {
        "style-preprocess"
    }

    async fn apply(&self, asset: Asset) -> Result<Asset, TransformError> {
        let text = asset.text()?;
        let flat = flatten_styles(&text)?;
        Ok(asset.with_text(flat).with_extension("css"))
    }
}

/// Rewrites block-scoped declarations to the baseline `var` form.
pub struct ScriptTranspiler {
    decl: Regex,
}

impl ScriptTranspiler {
    pub fn new() -> Self {
        ScriptTranspiler {
            decl: Regex::new(r"\b(?:const|let)\b").expect("static pattern"),
        }
    }
}

impl Default for ScriptTranspiler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transform for ScriptTranspiler {
    fn name(&self) -> &str {
        "script-transpile"
    }

    async fn apply(&self, asset: Asset) -> Result<Asset, TransformError> {
        let text = asset.text()?;
        let out = self.decl.replace_all(&text, "var").into_owned();
        Ok(asset.with_text(out))
    }
}

/// Renders `{{ key.path }}` placeholders against the configuration data
/// context. Unresolvable placeholders are left verbatim so zero-config
/// builds succeed.
pub struct PageRenderer {
    data: serde_yaml::Value,
    placeholder: Regex,
}

impl PageRenderer {
    pub fn new(data: serde_yaml::Value) -> Self {
        PageRenderer {
            data,
            placeholder: Regex::new(r"\{\{\s*([A-Za-z0-9_.]+)\s*\}\}").expect("static pattern"),
        }
    }

    fn lookup(&self, dotted: &str) -> Option<String> {
        let mut current = &self.data;
        for segment in dotted.split('.') {
            current = current.get(segment)?;
        }
        match current {
            serde_yaml::Value::String(s) => Some(s.clone()),
            serde_yaml::Value::Number(n) => Some(n.to_string()),
            serde_yaml::Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

#[async_trait]
impl Transform for PageRenderer {
    fn name(&self) -> &str {
        "page-render"
    }

    async fn apply(&self, asset: Asset) -> Result<Asset, TransformError> {
        let text = asset.text()?;
        let out = self
            .placeholder
            .replace_all(&text, |caps: &regex::Captures<'_>| {
                self.lookup(&caps[1]).unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned();
        Ok(asset.with_text(out))
    }
}

/// Lossless size reduction for binary assets.
///
/// SVG sources get comments stripped and indentation collapsed; anything
/// else passes through byte-for-byte. A real optimizer slots in behind the
/// same trait.
pub struct AssetOptimizer {
    comment: Regex,
}

impl AssetOptimizer {
    pub fn new() -> Self {
        AssetOptimizer {
            comment: Regex::new(r"(?s)<!--.*?-->").expect("static pattern"),
        }
    }
}

impl Default for AssetOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transform for AssetOptimizer {
    fn name(&self) -> &str {
        "asset-optimize"
    }

    async fn apply(&self, asset: Asset) -> Result<Asset, TransformError> {
        let is_svg = asset
            .rel_path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("svg"));
        if !is_svg {
            return Ok(asset);
        }

        let text = asset.text()?;
        let stripped = self.comment.replace_all(&text, "");
        let out = stripped
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        Ok(asset.with_text(out))
    }
}

/// Flatten nested rule syntax into expanded flat CSS.
fn flatten_styles(source: &str) -> Result<String, TransformError> {
    let stripped = source
        .lines()
        .map(strip_line_comment)
        .collect::<Vec<_>>()
        .join("\n");

    let chars: Vec<char> = stripped.chars().collect();
    let mut rules: Vec<(String, Vec<String>)> = Vec::new();
    let mut preamble: Vec<String> = Vec::new();
    let mut i = 0;
    parse_block(&chars, &mut i, None, "", &mut rules, &mut preamble)?;

    let mut out = String::new();
    for line in &preamble {
        out.push_str(line);
        out.push('\n');
    }
    for (selector, decls) in &rules {
        if decls.is_empty() {
            continue;
        }
        out.push_str(selector);
        out.push_str(" {\n");
        for decl in decls {
            out.push_str("  ");
            out.push_str(decl);
            out.push_str(";\n");
        }
        out.push_str("}\n\n");
    }
    Ok(format!("{}\n", out.trim_end()))
}

fn parse_block(
    chars: &[char],
    i: &mut usize,
    current: Option<usize>,
    current_sel: &str,
    rules: &mut Vec<(String, Vec<String>)>,
    preamble: &mut Vec<String>,
) -> Result<(), TransformError> {
    let mut buf = String::new();

    let flush = |buf: &mut String,
                 current: Option<usize>,
                 rules: &mut Vec<(String, Vec<String>)>,
                 preamble: &mut Vec<String>| {
        let decl = buf.trim().to_string();
        buf.clear();
        if decl.is_empty() {
            return;
        }
        match current {
            Some(idx) => rules[idx].1.push(decl),
            None => preamble.push(format!("{decl};")),
        }
    };

    while *i < chars.len() {
        match chars[*i] {
            '{' => {
                let raw = buf.trim().to_string();
                buf.clear();
                *i += 1;
                if raw.is_empty() {
                    return Err(TransformError::Syntax("selector expected before `{`".into()));
                }
                let selector = if raw.contains('&') {
                    raw.replace('&', current_sel)
                } else if current_sel.is_empty() {
                    raw
                } else {
                    format!("{current_sel} {raw}")
                };
                rules.push((selector.clone(), Vec::new()));
                let idx = rules.len() - 1;
                parse_block(chars, i, Some(idx), &selector, rules, preamble)?;
            }
            '}' => {
                *i += 1;
                flush(&mut buf, current, rules, preamble);
                return match current {
                    Some(_) => Ok(()),
                    None => Err(TransformError::Syntax("unexpected `}`".into())),
                };
            }
            ';' => {
                *i += 1;
                flush(&mut buf, current, rules, preamble);
            }
            c => {
                buf.push(c);
                *i += 1;
            }
        }
    }

    if current.is_some() {
        return Err(TransformError::Syntax("unexpected end of input inside a block".into()));
    }
    flush(&mut buf, None, rules, preamble);
    Ok(())
}

/// Drop a `//` comment from a line, leaving `url(http://...)` intact.
fn strip_line_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    let mut idx = 0;
    while idx + 1 < bytes.len() {
        if bytes[idx] == b'/' && bytes[idx + 1] == b'/' && (idx == 0 || bytes[idx - 1] != b':') {
            return &line[..idx];
        }
        idx += 1;
    }
    line
}
