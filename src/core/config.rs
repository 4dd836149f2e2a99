//! Build configuration with built-in defaults and an optional user override

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;
use anyhow::Result;

/// Well-known override file, resolved relative to the invocation directory
pub const CONFIG_FILE: &str = "pages.config.yaml";

/// Glob patterns for each asset class, relative to the source root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetPaths {
    pub styles: String,
    pub scripts: String,
    pub pages: String,
    pub images: String,
    pub fonts: String,
}

/// Directory layout and asset patterns for a build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildSection {
    /// Source tree root
    pub src: String,

    /// Final, production-ready output root
    pub dist: String,

    /// Intermediate root holding compiled-but-not-finalized output
    pub temp: String,

    /// Public assets root, copied verbatim into the output
    pub public: String,

    /// Per-asset-class glob patterns
    pub paths: AssetPaths,
}

/// Effective configuration consumed by every component
///
/// Resolved once at startup and passed by reference into each constructor;
/// never reloaded afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub build: BuildSection,

    /// Arbitrary data context handed to template rendering
    #[serde(default)]
    pub data: serde_yaml::Value,
}

/// User override as it appears on disk
///
/// Every top-level key is optional; a present key replaces the default's
/// whole value tree (shallow merge, no per-field patching).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigOverride {
    #[serde(default)]
    pub build: Option<BuildSection>,

    #[serde(default)]
    pub data: Option<serde_yaml::Value>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        SiteConfig {
            build: BuildSection {
                src: "src".to_string(),
                dist: "dist".to_string(),
                temp: "temp".to_string(),
                public: "public".to_string(),
                paths: AssetPaths {
                    styles: "assets/styles/*.scss".to_string(),
                    scripts: "assets/scripts/*.js".to_string(),
                    pages: "*.html".to_string(),
                    images: "assets/images/**".to_string(),
                    fonts: "assets/fonts/**".to_string(),
                },
            },
            data: serde_yaml::Value::Null,
        }
    }
}

impl SiteConfig {
    /// Resolve the effective configuration for an invocation directory.
    ///
    /// Any override load failure (missing file, unreadable, malformed YAML)
    /// falls back to the built-in defaults. The system stays usable with
    /// zero configuration; a bad override surfaces later as pipeline
    /// failures, not here.
    pub fn resolve(cwd: &Path) -> SiteConfig {
        let defaults = SiteConfig::default();
        match Self::load_override(&cwd.join(CONFIG_FILE)) {
            Ok(user) => defaults.merged(user),
            Err(err) => {
                debug!("no usable {}: {err:#}; using built-in defaults", CONFIG_FILE);
                defaults
            }
        }
    }

    /// Attempt to load a user override from a file.
    ///
    /// Kept separate from [`SiteConfig::resolve`] so the fallback path is
    /// an observable `Result` rather than a swallowed catch-all.
    pub fn load_override(path: &Path) -> Result<ConfigOverride> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Shallow-merge an override over these values: each supplied top-level
    /// key fully replaces the corresponding default tree.
    pub fn merged(mut self, user: ConfigOverride) -> SiteConfig {
        if let Some(build) = user.build {
            self.build = build;
        }
        if let Some(data) = user.data {
            self.data = data;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = SiteConfig::default();
        assert_eq!(config.build.src, "src");
        assert_eq!(config.build.dist, "dist");
        assert_eq!(config.build.temp, "temp");
        assert_eq!(config.build.public, "public");
        assert_eq!(config.build.paths.styles, "assets/styles/*.scss");
        assert_eq!(config.build.paths.pages, "*.html");
        assert!(config.data.is_null());
    }

    #[test]
    fn test_resolve_without_override_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let config = SiteConfig::resolve(temp.path());
        assert_eq!(config, SiteConfig::default());
    }

    #[test]
    fn test_resolve_malformed_override_falls_back() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(CONFIG_FILE), "build: [not, a, mapping").unwrap();

        // The failure itself is observable...
        assert!(SiteConfig::load_override(&temp.path().join(CONFIG_FILE)).is_err());

        // ...but resolve recovers silently.
        let config = SiteConfig::resolve(temp.path());
        assert_eq!(config, SiteConfig::default());
    }

    #[test]
    fn test_shallow_merge_data_only() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(CONFIG_FILE), "data:\n  title: My Site\n").unwrap();

        let config = SiteConfig::resolve(temp.path());

        // Untouched top-level key equals the defaults exactly.
        assert_eq!(config.build, SiteConfig::default().build);
        // Supplied key equals the override exactly.
        assert_eq!(
            config.data.get("title").and_then(|v| v.as_str()),
            Some("My Site")
        );
    }

    #[test]
    fn test_shallow_merge_build_replaces_whole_tree() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(CONFIG_FILE),
            r#"
build:
  src: site
  dist: out
  temp: stage
  public: static
  paths:
    styles: css/*.scss
    scripts: js/*.js
    pages: "**/*.html"
    images: img/**
    fonts: fonts/**
"#,
        )
        .unwrap();

        let config = SiteConfig::resolve(temp.path());
        assert_eq!(config.build.src, "site");
        assert_eq!(config.build.paths.styles, "css/*.scss");
        // data untouched
        assert!(config.data.is_null());
    }

    #[test]
    fn test_partial_build_tree_is_a_load_failure() {
        // No per-field patching: a build key missing subkeys does not
        // deserialize, so the whole override is discarded.
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(CONFIG_FILE), "build:\n  src: site\n").unwrap();

        let config = SiteConfig::resolve(temp.path());
        assert_eq!(config, SiteConfig::default());
    }
}
