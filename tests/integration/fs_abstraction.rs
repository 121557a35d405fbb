// tests/integration/fs_abstraction.rs

use std::path::{Path, PathBuf};

use sitepipe::fileset::FileSetSpec;
use sitepipe::freshness::hash_file;
use sitepipe::fs::mock::MockFileSystem;
use sitepipe::fs::FileSystem;

#[test]
fn mock_fs_hashing() {
    let fs = MockFileSystem::new();
    fs.add_file("test.txt", b"hello world");

    let hash = hash_file(&fs, Path::new("test.txt")).unwrap();
    // blake3 of "hello world"
    assert_eq!(hash, "d74981efa70a0c880b8d8c1985d075dbcbf679b99a5f9914e5aaf96b831a9e24");
}

#[test]
fn resolver_orders_files_and_splits_partials() {
    let fs = MockFileSystem::new();
    fs.add_file("/p/src/scss/site.scss", "a");
    fs.add_file("/p/src/scss/_vars.scss", "b");
    fs.add_file("/p/src/scss/pages/about.scss", "c");
    fs.add_file("/p/src/scss/print.scss", "d");
    fs.add_file("/p/src/scss/notes.txt", "e");

    let spec = FileSetSpec::new(
        "/p/src",
        &["scss/**/*.scss".to_string(), "!scss/print.scss".to_string()],
        &["**/_*".to_string()],
    )
    .unwrap();
    let set = spec.resolve(&fs).unwrap();

    let rels: Vec<PathBuf> = set.files.iter().map(|f| f.rel.clone()).collect();
    assert_eq!(rels, vec![PathBuf::from("pages/about.scss"), PathBuf::from("site.scss")]);
    assert_eq!(set.partials.len(), 1);
    assert_eq!(set.partials[0].path, PathBuf::from("/p/src/scss/_vars.scss"));
}

#[cfg(unix)]
#[test]
fn resolver_follows_links_once_and_survives_link_loops() {
    use sitepipe::fs::RealFileSystem;
    use std::os::unix::fs::symlink;

    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    std::fs::create_dir_all(root.join("src/scss")).unwrap();
    std::fs::create_dir_all(root.join("shared")).unwrap();
    std::fs::write(root.join("src/scss/site.scss"), "a").unwrap();
    std::fs::write(root.join("shared/theme.scss"), "b").unwrap();
    symlink(root.join("src/scss"), root.join("src/scss/again")).unwrap();
    symlink(root.join("shared"), root.join("src/scss/shared")).unwrap();

    let spec = FileSetSpec::new(root.join("src"), &["scss/**/*.scss".to_string()], &[]).unwrap();
    let set = spec.resolve(&RealFileSystem).unwrap();

    let rels: Vec<PathBuf> = set.files.iter().map(|f| f.rel.clone()).collect();
    assert_eq!(rels, vec![PathBuf::from("shared/theme.scss"), PathBuf::from("site.scss")]);
}

#[test]
fn mock_write_counter_tracks_writes_only() {
    let fs = MockFileSystem::new();
    fs.add_file("/p/a.txt", "seeded");
    assert_eq!(fs.write_count(), 0);

    fs.write(Path::new("/p/out/a.txt"), b"x").unwrap();
    assert_eq!(fs.write_count(), 1);
    assert!(fs.is_dir(Path::new("/p/out")));
}
