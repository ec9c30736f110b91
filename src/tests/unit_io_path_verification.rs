use crate::io::local::LocalResourceReader;
use crate::io::{ResourceReader, verify_canonical_path, verify_relative_path};
use std::path::{Path, PathBuf};

#[test]
fn test_io_template_jailbreak_prevention() {
    let root = Path::new("/templates");

    // 1. Plain name inside the root
    assert_eq!(
        verify_relative_path(root, Path::new("default.html")).unwrap(),
        PathBuf::from("/templates/default.html")
    );

    // 2. Straight traversal
    // ../outside -> depth -1 (Breach)
    assert!(verify_relative_path(root, Path::new("../outside.html")).is_err());

    // 3. Traversal after entering a folder
    // blog/../../outside -> depth 1 -> 0 -> -1 (Breach)
    assert!(verify_relative_path(root, Path::new("blog/../../outside.html")).is_err());

    // 4. Climbing back down stays inside
    // blog/../landing.html -> depth 1 -> 0 -> 1 (Safe)
    assert_eq!(
        verify_relative_path(root, Path::new("blog/../landing.html")).unwrap(),
        PathBuf::from("/templates/landing.html")
    );

    // 5. Absolute paths are never relative to anything
    assert!(verify_relative_path(root, Path::new("/etc/passwd")).is_err());

    // 6. Nothing left to name a file
    assert!(verify_relative_path(root, Path::new("")).is_err());
    assert!(verify_relative_path(root, Path::new("blog/..")).is_err());
}

#[test]
fn test_io_canonical_path_must_stay_under_root() {
    let root = Path::new("/srv/templates");

    assert!(verify_canonical_path(root, Path::new("/srv/templates/a/b.html")).is_ok());
    assert!(verify_canonical_path(root, Path::new("/srv/templates-old/b.html")).is_err());
    assert!(verify_canonical_path(root, Path::new("/etc/passwd")).is_err());
}

#[tokio::test]
async fn test_local_reader_reads_inside_root() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("landing")).unwrap();
    std::fs::write(dir.path().join("default.html"), "<html></html>").unwrap();
    std::fs::write(dir.path().join("landing/hero.html"), "<section></section>").unwrap();
    std::fs::write(dir.path().join("notes.txt"), "not a template").unwrap();

    let reader = LocalResourceReader::new(dir.path());

    assert_eq!(
        reader.read_to_string(Path::new("default.html")).await.unwrap(),
        "<html></html>"
    );
    assert_eq!(
        reader.read_to_string(Path::new("landing/hero.html")).await.unwrap(),
        "<section></section>"
    );
    assert!(reader.read_to_string(Path::new("missing.html")).await.is_err());
    assert!(reader.read_to_string(Path::new("../default.html")).await.is_err());

    let listed = reader.list_files("html").await.unwrap();
    assert_eq!(
        listed,
        vec![PathBuf::from("default.html"), PathBuf::from("landing/hero.html")]
    );
}

// a symlink pointing out of the root passes the lexical check but not the canonical one
#[cfg(unix)]
#[tokio::test]
async fn test_local_reader_rejects_escaping_symlink() {
    let outside = tempfile::tempdir().unwrap();
    std::fs::write(outside.path().join("secret.html"), "secret").unwrap();

    let root = tempfile::tempdir().unwrap();
    std::os::unix::fs::symlink(
        outside.path().join("secret.html"),
        root.path().join("linked.html"),
    )
    .unwrap();

    let reader = LocalResourceReader::new(root.path());

    assert!(reader.read_to_string(Path::new("linked.html")).await.is_err());
}
