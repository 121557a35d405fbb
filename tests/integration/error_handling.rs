// tests/integration/error_handling.rs

use std::io::Write;

use tempfile::NamedTempFile;

use sitepipe::config::load_and_validate;
use sitepipe::errors::SitepipeError;

fn config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn dag_cycle_returns_structured_error() {
    let file = config(
        r#"
[task.a]
kind = "copy"
sources = ["a/*"]
dest = "a"
after = ["b"]

[task.b]
kind = "copy"
sources = ["b/*"]
dest = "b"
after = ["a"]
"#,
    );

    match load_and_validate(file.path()) {
        Err(SitepipeError::DagCycle(msg)) => {
            assert!(msg.contains("cycle detected"));
            assert!(msg.contains('a') || msg.contains('b'));
        }
        other => panic!("expected DagCycle error, got: {other:?}"),
    }
}

#[test]
fn unknown_dependency_returns_config_error() {
    let file = config(
        r#"
[task.html]
kind = "html"
sources = ["html/*.html"]
after = ["NonExistent"]
"#,
    );

    match load_and_validate(file.path()) {
        Err(SitepipeError::ConfigError(msg)) => {
            assert!(msg.contains("unknown dependency"));
            assert!(msg.contains("NonExistent"));
        }
        other => panic!("expected ConfigError, got: {other:?}"),
    }
}

#[test]
fn clean_is_a_reserved_task_name() {
    let file = config(
        r#"
[task.clean]
kind = "copy"
sources = ["x/*"]
"#,
    );

    assert!(matches!(
        load_and_validate(file.path()),
        Err(SitepipeError::ConfigError(msg)) if msg.contains("reserved")
    ));
}

#[test]
fn malformed_pattern_is_fatal_at_startup() {
    let file = config(
        r#"
[task.styles]
kind = "styles"
sources = ["scss/[*.scss"]
dest = "css"
"#,
    );

    match load_and_validate(file.path()) {
        Err(SitepipeError::InvalidPattern { pattern, .. }) => assert_eq!(pattern, "scss/[*.scss"),
        other => panic!("expected InvalidPattern, got: {other:?}"),
    }
}

#[test]
fn shared_destination_is_rejected() {
    let file = config(
        r#"
[task.fonts]
kind = "copy"
sources = ["fonts/*"]
dest = "assets"

[task.files]
kind = "copy"
sources = ["files/*"]
dest = "./assets/"
"#,
    );

    assert!(matches!(
        load_and_validate(file.path()),
        Err(SitepipeError::ConfigError(msg)) if msg.contains("same dest")
    ));
}

#[test]
fn nested_destination_is_rejected() {
    let file = config(
        r#"
[task.styles]
kind = "styles"
sources = ["scss/*.scss"]
dest = "css"

[task.vendor]
kind = "copy"
sources = ["vendor/*.css"]
dest = "css/vendor"
"#,
    );

    match load_and_validate(file.path()) {
        Err(SitepipeError::ConfigError(msg)) => {
            assert!(msg.contains("overlaps"), "{msg}");
            assert!(msg.contains("css/vendor"), "{msg}");
        }
        other => panic!("expected ConfigError, got: {other:?}"),
    }
}

#[test]
fn sibling_destinations_under_the_output_root_are_accepted() {
    let file = config(
        r#"
[task.html]
kind = "html"
sources = ["html/*.html"]
dest = ""

[task.styles]
kind = "styles"
sources = ["scss/*.scss"]
dest = "css"

[task.vendor]
kind = "copy"
sources = ["vendor/*.css"]
dest = "css-vendor"
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();
    assert_eq!(cfg.task.len(), 3);
}

#[test]
fn escaping_destination_is_rejected() {
    let file = config(
        r#"
[task.files]
kind = "copy"
sources = ["files/*"]
dest = "../outside"
"#,
    );

    assert!(matches!(
        load_and_validate(file.path()),
        Err(SitepipeError::ConfigError(msg)) if msg.contains("outside")
    ));
}

#[test]
fn zero_queue_length_is_rejected() {
    let file = config(
        r#"
[config]
queue_length = 0

[task.files]
kind = "copy"
sources = ["files/*"]
dest = "files"
"#,
    );

    assert!(matches!(
        load_and_validate(file.path()),
        Err(SitepipeError::ConfigError(msg)) if msg.contains("queue_length")
    ));
}
