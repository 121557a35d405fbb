// tests/integration/incremental_build.rs

//! Incremental behaviour of task passes against the in-memory filesystem.

use std::path::Path;
use std::sync::Arc;

use sitepipe::exec::{build_task, clean_output, BuildContext};
use sitepipe::fs::mock::MockFileSystem;
use sitepipe::fs::FileSystem;
use sitepipe::types::TaskKind;
use sitepipe_test_utils::builders::{ConfigFileBuilder, TaskConfigBuilder};
use sitepipe_test_utils::init_tracing;

fn site() -> (Arc<MockFileSystem>, BuildContext) {
    let fs = Arc::new(MockFileSystem::new());
    fs.add_file("/p/src/html/index.html", "<body>@@include('_header.html')home</body>");
    fs.add_file("/p/src/html/about.html", "<body>@@include('_header.html')about</body>");
    fs.add_file("/p/src/html/_header.html", "<h1>@@title</h1>");
    fs.add_file("/p/src/fonts/a.woff", "font-a");
    fs.add_file("/p/src/fonts/b.woff", "font-b");

    let cfg = ConfigFileBuilder::new()
        .with_task("html", TaskConfigBuilder::new(TaskKind::Html, "html/**/*.html").build())
        .with_task(
            "fonts",
            TaskConfigBuilder::new(TaskKind::Copy, "fonts/**/*").dest("fonts").build(),
        )
        .build();

    let ctx = BuildContext::new(fs.clone(), cfg, "/p");
    (fs, ctx)
}

#[test]
fn second_build_performs_zero_writes() {
    init_tracing();
    let (fs, ctx) = site();

    clean_output(&ctx).unwrap();
    let html = build_task(&ctx, "html").unwrap();
    let fonts = build_task(&ctx, "fonts").unwrap();
    assert_eq!(html.written.len(), 2);
    assert_eq!(fonts.written.len(), 2);
    assert!(!fs.exists(Path::new("/p/docs/_header.html")));

    let writes = fs.write_count();
    let html = build_task(&ctx, "html").unwrap();
    let fonts = build_task(&ctx, "fonts").unwrap();

    assert_eq!(html.processed + fonts.processed, 0);
    assert_eq!(fs.write_count(), writes);
}

#[test]
fn changed_file_is_processed_exactly_once() {
    init_tracing();
    let (fs, ctx) = site();
    build_task(&ctx, "fonts").unwrap();

    fs.add_file("/p/src/fonts/a.woff", "font-a2");
    let first = build_task(&ctx, "fonts").unwrap();
    let second = build_task(&ctx, "fonts").unwrap();

    assert_eq!(first.processed, 1);
    assert_eq!(second.processed, 0);
    assert_eq!(fs.contents("/p/docs/fonts/a.woff").unwrap(), b"font-a2");
}

#[test]
fn touching_without_changing_content_is_not_a_change() {
    init_tracing();
    let (fs, ctx) = site();
    build_task(&ctx, "fonts").unwrap();

    // New mtime, same bytes.
    fs.add_file("/p/src/fonts/b.woff", "font-b");
    let report = build_task(&ctx, "fonts").unwrap();
    assert_eq!(report.processed, 0);
}

#[test]
fn editing_a_partial_rebuilds_its_includers_only_in_that_task() {
    init_tracing();
    let (fs, ctx) = site();
    build_task(&ctx, "html").unwrap();
    build_task(&ctx, "fonts").unwrap();

    fs.add_file("/p/src/html/_header.html", "<h2>changed</h2>");
    let html = build_task(&ctx, "html").unwrap();
    let fonts = build_task(&ctx, "fonts").unwrap();

    assert_eq!(html.processed, 2);
    assert_eq!(fonts.processed, 0);
    let index = String::from_utf8(fs.contents("/p/docs/index.html").unwrap()).unwrap();
    assert!(index.contains("<h2>changed</h2>"));
}

#[test]
fn deleted_output_is_rebuilt() {
    init_tracing();
    let (fs, ctx) = site();
    build_task(&ctx, "fonts").unwrap();

    fs.remove_file(Path::new("/p/docs/fonts/b.woff")).unwrap();
    let report = build_task(&ctx, "fonts").unwrap();
    assert_eq!(report.processed, 1);
    assert!(fs.exists(Path::new("/p/docs/fonts/b.woff")));
}

#[test]
fn new_file_matching_an_import_glob_rebuilds_the_importer() {
    init_tracing();
    let fs = Arc::new(MockFileSystem::new());
    fs.add_file("/p/src/scss/main.scss", "@import \"blocks/*.scss\";\n");
    fs.add_file("/p/src/scss/blocks/_a.scss", ".a{color:red}\n");
    let cfg = ConfigFileBuilder::new()
        .with_task(
            "styles",
            TaskConfigBuilder::new(TaskKind::Styles, "scss/*.scss").dest("css").build(),
        )
        .build();
    let ctx = BuildContext::new(fs.clone(), cfg, "/p");

    build_task(&ctx, "styles").unwrap();
    assert_eq!(build_task(&ctx, "styles").unwrap().processed, 0);

    fs.add_file("/p/src/scss/blocks/_b.scss", ".b{color:blue}\n");
    let report = build_task(&ctx, "styles").unwrap();
    assert_eq!(report.processed, 1);

    let css = String::from_utf8(fs.contents("/p/docs/css/main.css").unwrap()).unwrap();
    assert!(css.contains(".a{color:red}"));
    assert!(css.contains(".b{color:blue}"));
    assert_eq!(build_task(&ctx, "styles").unwrap().processed, 0);
}

#[cfg(unix)]
#[test]
fn failed_bundle_part_is_retried_until_it_builds() {
    init_tracing();
    let fs = Arc::new(MockFileSystem::new());
    fs.add_file("/p/src/js/a.js", "var a;\n");
    fs.add_file("/p/src/js/b.js", "broken\n");
    let cfg = ConfigFileBuilder::new()
        .with_task(
            "scripts",
            TaskConfigBuilder::new(TaskKind::Scripts, "js/*.js")
                .dest("js")
                .bundle("app.js")
                .preprocess("awk '/broken/ { exit 1 } { print }'")
                .build(),
        )
        .build();
    let ctx = BuildContext::new(fs.clone(), cfg, "/p");

    let first = build_task(&ctx, "scripts").unwrap();
    assert_eq!(first.failed, 1);
    let bundle = String::from_utf8(fs.contents("/p/docs/js/app.js").unwrap()).unwrap();
    assert!(!bundle.contains("var b;"));

    // Still broken: the part is attempted again rather than assumed fresh.
    let second = build_task(&ctx, "scripts").unwrap();
    assert_eq!(second.failed, 1);

    fs.add_file("/p/src/js/b.js", "var b;\n");
    let fixed = build_task(&ctx, "scripts").unwrap();
    assert_eq!(fixed.failed, 0);
    let bundle = String::from_utf8(fs.contents("/p/docs/js/app.js").unwrap()).unwrap();
    assert!(bundle.contains("var a;"));
    assert!(bundle.contains("var b;"));

    assert_eq!(build_task(&ctx, "scripts").unwrap().processed, 0);
}
