//! Post-compile link rewriting: resolve build blocks in rendered pages,
//! bundle and minify the referenced assets, and write the final tree
//!
//! Runs in the production workflow only. Pages are read from the
//! intermediate root; referenced assets are resolved against an ordered
//! search path and concatenated into one bundle per block.

use crate::core::task::{Task, TaskError};
use crate::pipeline::stage::StageError;
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info};

/// One bundle produced from a build block
#[derive(Debug, Clone, PartialEq)]
pub struct Bundle {
    /// Destination path relative to the output root
    pub rel_path: PathBuf,
    pub content: String,
}

pub struct LinkRewriteStage {
    pattern: String,
    temp_root: PathBuf,
    dest_root: PathBuf,
    search_paths: Vec<PathBuf>,
    block: Regex,
    reference: Regex,
}

impl LinkRewriteStage {
    pub fn new(
        pattern: String,
        temp_root: PathBuf,
        dest_root: PathBuf,
        search_paths: Vec<PathBuf>,
    ) -> Self {
        LinkRewriteStage {
            pattern,
            temp_root,
            dest_root,
            search_paths,
            block: Regex::new(r"(?s)<!--\s*build:(css|js)\s+(\S+)\s*-->(.*?)<!--\s*endbuild\s*-->")
                .expect("static pattern"),
            reference: Regex::new(r#"(?:href|src)\s*=\s*["']([^"']+)["']"#)
                .expect("static pattern"),
        }
    }

    /// Rewrite one page: returns the minified markup and the bundles its
    /// build blocks produced.
    pub fn rewrite_page(
        &self,
        page: &Path,
        html: &str,
    ) -> Result<(String, Vec<Bundle>), StageError> {
        let mut out = String::new();
        let mut bundles = Vec::new();
        let mut last = 0;

        for caps in self.block.captures_iter(html) {
            let Some(whole) = caps.get(0) else { continue };
            out.push_str(&html[last..whole.start()]);
            last = whole.end();

            let kind = &caps[1];
            let target = caps[2].to_string();
            let body = &caps[3];

            let mut content = String::new();
            for reference in self.reference.captures_iter(body) {
                content.push_str(&self.resolve_asset(page, &reference[1])?);
                content.push('\n');
            }

            let minified = match kind {
                "css" => minify_css(&content),
                _ => minify_js(&content),
            };
            bundles.push(Bundle {
                rel_path: PathBuf::from(target.trim_start_matches('/')),
                content: minified,
            });

            let tag = match kind {
                "css" => format!(r#"<link rel="stylesheet" href="{target}">"#),
                _ => format!(r#"<script src="{target}"></script>"#),
            };
            out.push_str(&tag);
        }
        out.push_str(&html[last..]);

        Ok((minify_html(&out), bundles))
    }

    fn resolve_asset(&self, page: &Path, reference: &str) -> Result<String, StageError> {
        let rel = reference.trim_start_matches('/');
        for root in &self.search_paths {
            let candidate = root.join(rel);
            if candidate.is_file() {
                return std::fs::read_to_string(&candidate).map_err(StageError::io(&candidate));
            }
        }
        Err(StageError::MissingAsset {
            page: page.to_path_buf(),
            reference: reference.to_string(),
        })
    }

    fn execute(&self) -> Result<usize, StageError> {
        let full_pattern = self.temp_root.join(&self.pattern);
        let full_pattern = full_pattern.to_string_lossy().into_owned();
        let entries = glob::glob(&full_pattern).map_err(|source| StageError::Pattern {
            pattern: full_pattern.clone(),
            source,
        })?;

        let mut written = 0usize;
        for entry in entries {
            let path = entry?;
            if !path.is_file() {
                continue;
            }
            let rel = path
                .strip_prefix(&self.temp_root)
                .map_err(|_| StageError::OutsideRoot {
                    path: path.clone(),
                    root: self.temp_root.clone(),
                })?
                .to_path_buf();
            debug!(file = %rel.display(), "rewriting links");

            let html = std::fs::read_to_string(&path).map_err(StageError::io(&path))?;
            let (rewritten, bundles) = self.rewrite_page(&rel, &html)?;

            for bundle in bundles {
                let dest = self.dest_root.join(&bundle.rel_path);
                write_with_parents(&dest, bundle.content.as_bytes())?;
            }
            let dest = self.dest_root.join(&rel);
            write_with_parents(&dest, rewritten.as_bytes())?;
            written += 1;
        }
        Ok(written)
    }
}

#[async_trait]
impl Task for LinkRewriteStage {
    fn name(&self) -> &str {
        "link-rewrite"
    }

    async fn run(&self) -> Result<(), TaskError> {
        let started = Instant::now();
        match self.execute() {
            Ok(pages) => {
                info!(pages, elapsed = ?started.elapsed(), "link rewrite complete");
                Ok(())
            }
            Err(err) => {
                error!(%err, "link rewrite failed");
                Err(TaskError::new("link-rewrite", err.to_string()))
            }
        }
    }
}

fn write_with_parents(dest: &Path, bytes: &[u8]) -> Result<(), StageError> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(StageError::io(parent))?;
    }
    std::fs::write(dest, bytes).map_err(StageError::io(dest))
}

/// Strip comments and collapse whitespace out of a stylesheet.
pub fn minify_css(css: &str) -> String {
    let comment = Regex::new(r"(?s)/\*.*?\*/").expect("static pattern");
    let whitespace = Regex::new(r"\s+").expect("static pattern");
    let stripped = comment.replace_all(css, "");
    let collapsed = whitespace.replace_all(&stripped, " ");
    collapsed
        .replace(" {", "{")
        .replace("{ ", "{")
        .replace(" }", "}")
        .replace("} ", "}")
        .replace("; ", ";")
        .replace(": ", ":")
        .replace(", ", ",")
        .replace(";}", "}")
        .trim()
        .to_string()
}

/// Drop whole-line comments, blank lines, and indentation.
///
/// Conservative on purpose: anything inside an expression is left alone so
/// string literals survive.
pub fn minify_js(js: &str) -> String {
    js.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("//"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Strip comments and collapse inter-tag whitespace out of markup.
pub fn minify_html(html: &str) -> String {
    let comment = Regex::new(r"(?s)<!--.*?-->").expect("static pattern");
    let whitespace = Regex::new(r"\s+").expect("static pattern");
    let stripped = comment.replace_all(html, "");
    let collapsed = whitespace.replace_all(&stripped, " ");
    collapsed.replace("> <", "><").trim().to_string()
}
