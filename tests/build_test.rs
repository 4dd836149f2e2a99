//! End-to-end production build over a real site tree

use pagesmith::{Orchestrator, SiteConfig, Task};
use std::path::Path;
use tempfile::TempDir;

const PAGE: &str = r#"<html>
<head>
  <title>{{ site.title }}</title>
  <!-- build:css /assets/styles/site.css -->
  <link rel="stylesheet" href="/assets/styles/main.css">
  <!-- endbuild -->
</head>
<body>
  <h1>{{ site.title }}</h1>
  <!-- build:js /assets/scripts/site.js -->
  <script src="/assets/scripts/main.js"></script>
  <!-- endbuild -->
</body>
</html>"#;

fn site_fixture() -> (TempDir, SiteConfig) {
    let temp = TempDir::new().unwrap();
    let root = temp.path();

    std::fs::create_dir_all(root.join("src/assets/styles")).unwrap();
    std::fs::create_dir_all(root.join("src/assets/scripts")).unwrap();
    std::fs::create_dir_all(root.join("src/assets/images")).unwrap();
    std::fs::create_dir_all(root.join("src/assets/fonts")).unwrap();
    std::fs::create_dir_all(root.join("public")).unwrap();

    std::fs::write(
        root.join("src/assets/styles/main.scss"),
        "nav { a { color: blue; } }\n",
    )
    .unwrap();
    std::fs::write(
        root.join("src/assets/scripts/main.js"),
        "const greeting = \"hi\";\nconsole.log(greeting);\n",
    )
    .unwrap();
    std::fs::write(root.join("src/index.html"), PAGE).unwrap();
    std::fs::write(
        root.join("src/assets/images/logo.svg"),
        "<!-- drawn by hand -->\n<svg>\n  <rect/>\n</svg>\n",
    )
    .unwrap();
    std::fs::write(root.join("src/assets/fonts/sans.woff2"), [0u8, 1, 2, 3]).unwrap();
    std::fs::write(root.join("public/favicon.ico"), [9u8, 9]).unwrap();

    // Stale output from an earlier run; must not survive the build.
    std::fs::create_dir_all(root.join("dist")).unwrap();
    std::fs::write(root.join("dist/stale.html"), "old").unwrap();

    let mut config = SiteConfig::default();
    config.build.src = path_str(&root.join("src"));
    config.build.dist = path_str(&root.join("dist"));
    config.build.temp = path_str(&root.join("temp"));
    config.build.public = path_str(&root.join("public"));
    config.data = serde_yaml::from_str("site:\n  title: Acme\n").unwrap();
    (temp, config)
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[tokio::test]
async fn test_production_build_produces_final_tree() {
    let (temp, config) = site_fixture();
    let dist = temp.path().join("dist");

    Orchestrator::new(config).build().run().await.unwrap();

    // Stale output was cleaned before anything was written.
    assert!(!dist.join("stale.html").exists());

    // The page reached dist with placeholders rendered, build blocks
    // replaced by single bundle references, and markup collapsed.
    let html = std::fs::read_to_string(dist.join("index.html")).unwrap();
    assert!(html.contains("<h1>Acme</h1>"));
    assert!(html.contains(r#"<link rel="stylesheet" href="/assets/styles/site.css">"#));
    assert!(html.contains(r#"<script src="/assets/scripts/site.js"></script>"#));
    assert!(!html.contains("main.css"));
    assert!(!html.contains("build:"));
    assert!(!html.contains('\n'));

    // Bundles hold the compiled, minified assets.
    let css = std::fs::read_to_string(dist.join("assets/styles/site.css")).unwrap();
    assert!(css.contains("nav a{color:blue}"));
    let js = std::fs::read_to_string(dist.join("assets/scripts/site.js")).unwrap();
    assert!(js.contains("var greeting"));
    assert!(!js.contains("const"));

    // Images and fonts are written straight to dist.
    let svg = std::fs::read_to_string(dist.join("assets/images/logo.svg")).unwrap();
    assert!(!svg.contains("drawn by hand"));
    assert!(svg.contains("<svg>"));
    assert_eq!(
        std::fs::read(dist.join("assets/fonts/sans.woff2")).unwrap(),
        vec![0u8, 1, 2, 3]
    );

    // Public assets are copied verbatim.
    assert_eq!(std::fs::read(dist.join("favicon.ico")).unwrap(), vec![9u8, 9]);
}

#[tokio::test]
async fn test_build_keeps_intermediate_output() {
    let (temp, config) = site_fixture();

    Orchestrator::new(config).build().run().await.unwrap();

    // The intermediate tree holds the compiled-but-unbundled assets that
    // the development server layers on top of src and public.
    let staging = temp.path().join("temp");
    assert!(staging.join("assets/styles/main.css").is_file());
    assert!(staging.join("assets/scripts/main.js").is_file());
    assert!(staging.join("index.html").is_file());
}

#[tokio::test]
async fn test_clean_tolerates_missing_roots() {
    let (temp, config) = site_fixture();
    std::fs::remove_dir_all(temp.path().join("dist")).unwrap();

    // Neither dist nor temp exists yet; clean succeeds anyway.
    Orchestrator::new(config).clean().run().await.unwrap();
}

#[tokio::test]
async fn test_missing_bundle_reference_fails_the_build() {
    let (temp, config) = site_fixture();
    std::fs::write(
        temp.path().join("src/index.html"),
        r#"<!-- build:css /out.css --><link href="/assets/styles/absent.css"><!-- endbuild -->"#,
    )
    .unwrap();

    let err = Orchestrator::new(config).build().run().await.unwrap_err();
    assert!(err.message.contains("absent.css"));
}
