//! Build pipeline integration tests
//!
//! Each test lays out a small site in a temporary directory and runs the
//! real task group against it:
//!
//! - Mirrored outputs for every task
//! - Byte-identical reruns
//! - Sprite cleanup
//! - Prefix normalization and style source maps
//! - Owner-only rebuilds on change
//! - Failure isolation between tasks

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use assetline::build::progress::RecordingProgress;
use assetline::build::{BuildContext, BuildPipeline, TaskKind};
use assetline::config::default_config;
use assetline::watch::WatchSession;
use image::{ImageFormat, Rgb, RgbImage};

// ============================================================================
// Test Utilities
// ============================================================================

fn write(root: &Path, relative: &str, content: impl AsRef<[u8]>) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

/// Lay out one source of every kind under `<root>/src`.
fn site() -> TempDir {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("src");

    write(
        &src,
        "templates/layouts/base.html",
        "<!doctype html>\n<html>\n<body>\n{% block content %}{% endblock content %}\n</body>\n</html>\n",
    );
    write(
        &src,
        "templates/pages/index.html",
        "{% extends \"layouts/base.html\" %}{% block content %}<h1>Home</h1>{% endblock content %}",
    );
    write(&src, "templates/pages/blog/first.html", "<article>first</article>\n");

    write(&src, "scss/_colors.scss", "$brand: #336699;\n");
    write(&src, "scss/app.scss", "@use 'colors';\nbody {\n  color: colors.$brand;\n}\n");
    write(&src, "scss/pages/home.scss", ".hero {\n  margin: 0 auto;\n}\n");

    write(
        &src,
        "js/app.js",
        "function shout(message) {\n  return message.toUpperCase();\n}\nwindow.shout = shout;\n",
    );
    write(&src, "js/vendor/util.js", "window.util = { twice: function (n) { return n * 2; } };\n");

    write(&src, "fonts/inter.woff2", b"wOF2\x00\x01\x02\x03font-bytes");

    let mut png = Vec::new();
    RgbImage::from_pixel(16, 16, Rgb([200, 40, 40]))
        .write_to(&mut std::io::Cursor::new(&mut png), ImageFormat::Png)
        .unwrap();
    write(&src, "images/hero.png", &png);
    write(&src, "pic/photos/red.png", &png);
    write(
        &src,
        "images/logo.svg",
        "<?xml version=\"1.0\"?>\n<!-- editor -->\n<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"10\" height=\"10\" viewBox=\"0 0 10 10\">\n  <rect width=\"10\" height=\"10\"/>\n</svg>\n",
    );

    write(
        &src,
        "svg/mail.svg",
        "<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"0 0 24 24\"><title>Mail</title><path class=\"icon\" fill=\"#000\" d=\"M0 0h24v24H0z\"/></svg>",
    );
    write(
        &src,
        "svg/home.svg",
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"16\" height=\"16\"><desc>Home</desc><path style=\"fill:red\" stroke=\"blue\" d=\"M0 0h16v16H0z\"/></svg>",
    );

    temp
}

fn pipeline(temp: &TempDir) -> BuildPipeline {
    BuildPipeline::new(BuildContext::new(default_config(), temp.path().to_path_buf()))
}

/// Every file under `dir` with its bytes, keyed by relative path.
fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    let pattern = format!("{}/**/*", dir.display());
    glob::glob(&pattern)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .map(|p| (p.strip_prefix(dir).unwrap().to_path_buf(), fs::read(&p).unwrap()))
        .collect()
}

// ============================================================================
// Full builds
// ============================================================================

#[test]
fn test_full_build_mirrors_sources() {
    let temp = site();
    let result = pipeline(&temp).build().unwrap();
    assert!(result.is_success(), "{}", result.summary());
    assert_eq!(result.tasks.len(), 6);

    let dist = temp.path().join("dist");
    for file in [
        "index.html",
        "blog/first.html",
        "css/app.css",
        "css/app.css.map",
        "css/pages/home.css",
        "css/pages/home.css.map",
        "js/app.js",
        "js/app.js.map",
        "js/vendor/util.js",
        "fonts/inter.woff2",
        "images/hero.png",
        "images/logo.svg",
        "pic/photos/red.png",
        "pic/sprite.svg",
    ] {
        assert!(dist.join(file).is_file(), "missing {}", file);
    }

    // Partials are compiled into their users, never on their own
    assert!(!dist.join("css/_colors.css").exists());
    // Layouts are only rendered through pages
    assert!(!dist.join("layouts").exists());

    let index = fs::read_to_string(dist.join("index.html")).unwrap();
    assert!(index.contains("<h1>Home</h1>"));
    assert_eq!(
        fs::read(dist.join("fonts/inter.woff2")).unwrap(),
        fs::read(temp.path().join("src/fonts/inter.woff2")).unwrap()
    );

    let css = fs::read_to_string(dist.join("css/app.css")).unwrap();
    assert!(css.contains("#369"));

    let js = fs::read_to_string(dist.join("js/app.js")).unwrap();
    assert!(js.contains("window.shout"));
    assert!(!js.contains("message"));

    let png = fs::metadata(dist.join("images/hero.png")).unwrap().len();
    assert!(png <= fs::metadata(temp.path().join("src/images/hero.png")).unwrap().len());

    let logo = fs::read_to_string(dist.join("images/logo.svg")).unwrap();
    assert!(!logo.contains("editor"));
    assert!(!logo.contains("<?xml"));
}

#[test]
fn test_rebuild_is_byte_identical() {
    let temp = site();
    let dist = temp.path().join("dist");

    assert!(pipeline(&temp).build().unwrap().is_success());
    let first = snapshot(&dist);
    assert!(!first.is_empty());

    assert!(pipeline(&temp).build().unwrap().is_success());
    let second = snapshot(&dist);

    assert_eq!(first.keys().collect::<Vec<_>>(), second.keys().collect::<Vec<_>>());
    for (path, bytes) in &first {
        assert!(bytes == &second[path], "{} changed between runs", path.display());
    }
}

#[test]
fn test_sprite_has_one_clean_symbol_per_icon() {
    let temp = site();
    let result = pipeline(&temp).run_tasks(&["sprite".to_string()]).unwrap();
    assert!(result.is_success(), "{}", result.summary());

    let sprite = fs::read_to_string(temp.path().join("dist/pic/sprite.svg")).unwrap();
    let root = assetline::svg::parse(&sprite).unwrap();
    assert_eq!(root.name, "svg");

    let symbols: Vec<_> = root.elements().filter(|e| e.name == "symbol").collect();
    assert_eq!(symbols.len(), 2);
    assert_eq!(symbols[0].attr("id"), Some("home"));
    assert_eq!(symbols[0].attr("viewBox"), Some("0 0 16 16"));
    assert_eq!(symbols[1].attr("id"), Some("mail"));
    assert_eq!(symbols[1].attr("viewBox"), Some("0 0 24 24"));

    for attribute in ["fill=", "stroke=", "style=", "class="] {
        assert!(!sprite.contains(attribute), "sprite still has {}", attribute);
    }
    assert!(!sprite.contains("<title") && !sprite.contains("<desc"));
}

#[test]
fn test_styles_drop_unneeded_prefixes_and_map_to_scss() {
    let temp = TempDir::new().unwrap();
    write(
        temp.path(),
        "src/scss/button.scss",
        ".button { -webkit-transition: opacity 1s; }\n",
    );

    let context = BuildContext::new(default_config(), temp.path().to_path_buf())
        .with_filter(vec![TaskKind::Styles]);
    let result = BuildPipeline::new(context).build().unwrap();
    assert!(result.is_success(), "{}", result.summary());

    let css = fs::read_to_string(temp.path().join("dist/css/button.css")).unwrap();
    assert!(css.starts_with(".button{transition:opacity 1s}"));
    assert!(!css.contains("-webkit-"));

    let map: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(temp.path().join("dist/css/button.css.map")).unwrap())
            .unwrap();
    assert_eq!(map["sources"][0], "../../src/scss/button.scss.css");
    assert_eq!(map["sources"][1], "../../src/scss/button.scss");
    assert!(map["sourcesContent"][0].as_str().unwrap().contains("-webkit-transition: opacity 1s"));
}

// ============================================================================
// Rebuilds and failures
// ============================================================================

#[test]
fn test_change_reruns_only_owning_task() {
    let temp = site();
    let recorder = Arc::new(RecordingProgress::new());
    let pipeline = pipeline(&temp).with_reporter(recorder.clone());

    let initial = pipeline.build().unwrap();
    assert!(initial.is_success());

    // Hand-edit another task's output; a scripts rebuild must leave it alone
    let css = temp.path().join("dist/css/app.css");
    fs::write(&css, "tampered").unwrap();

    let script = write(&temp.path().join("src"), "js/app.js", "window.answer = 42;\n");
    let mut session = WatchSession::start(&pipeline.plan(), &default_config().watch).unwrap();
    session.record(&initial);

    let result = session.rebuild(&pipeline, &[script]).unwrap();
    let ran: Vec<_> = result.tasks.iter().map(|t| t.task_id.as_str()).collect();
    assert_eq!(ran, vec!["scripts"]);
    let completed = recorder.completed_tasks();
    assert_eq!(completed.iter().filter(|t| t.as_str() == "scripts").count(), 2);
    assert_eq!(completed.iter().filter(|t| t.as_str() == "styles").count(), 1);

    assert_eq!(fs::read_to_string(&css).unwrap(), "tampered");
    let js = fs::read_to_string(temp.path().join("dist/js/app.js")).unwrap();
    assert!(js.contains("42"));

    let unowned = temp.path().join("README.md");
    assert!(session.rebuild(&pipeline, &[unowned]).is_none());
    session.stop();
}

#[test]
fn test_failed_task_does_not_cancel_siblings() {
    let temp = site();
    write(&temp.path().join("src"), "js/broken.js", "function (\n");

    let result = pipeline(&temp).build().unwrap();
    assert!(!result.is_success());
    assert_eq!(result.failed_count(), 1);
    assert_eq!(result.first_failure().unwrap().task_id, "scripts");

    // Everything else still ran to completion
    assert_eq!(result.success_count(), 5);
    assert!(temp.path().join("dist/css/app.css").is_file());
    assert!(temp.path().join("dist/pic/sprite.svg").is_file());
    assert!(result.summary().contains("scripts"));
}

#[test]
fn test_dry_run_touches_nothing() {
    let temp = site();
    let result = pipeline(&temp).with_dry_run(true).build().unwrap();
    assert_eq!(result.skipped_count(), 6);
    assert!(!temp.path().join("dist").exists());
}
