#![allow(clippy::unwrap_used, missing_docs)]

use std::fs;
use std::sync::Arc;

use vfs_dircache::fs::backend::Backend as _;
use vfs_dircache::fs::{
    BackendError, CaseSensitivity, LocalBackend, LocalBackendConfig, TreeConfig, Vfs, VfsError,
};

fn populated_dir() -> tempfile::TempDir {
    let tmp = tempfile::tempdir().unwrap();
    fs::create_dir_all(tmp.path().join("Src/nested")).unwrap();
    fs::create_dir_all(tmp.path().join("docs")).unwrap();
    fs::write(tmp.path().join("Src/Main.rs"), "fn main() {}").unwrap();
    fs::write(tmp.path().join("README.md"), "# readme").unwrap();
    fs::write(tmp.path().join(".hidden"), "").unwrap();
    tmp
}

fn vfs_over(tmp: &tempfile::TempDir, config: LocalBackendConfig) -> Vfs<LocalBackend> {
    let backend = LocalBackend::new(tmp.path(), config).unwrap();
    Vfs::new(backend, TreeConfig::default()).unwrap()
}

#[test]
fn resolves_nested_paths() {
    let tmp = populated_dir();
    let vfs = vfs_over(&tmp, LocalBackendConfig::default());
    let main = vfs
        .lookup_path(vfs.root(), "Src/Main.rs")
        .unwrap()
        .into_node()
        .unwrap();
    assert!(!main.is_directory());
    assert_eq!(vfs.path_of(&main).unwrap(), "/Src/Main.rs");
    assert_eq!(
        vfs.backend().path_of(main.id()).unwrap(),
        vfs.backend().root_path().join("Src/Main.rs")
    );
}

#[test]
fn identities_are_stable() {
    let tmp = populated_dir();
    let backend = LocalBackend::new(tmp.path(), LocalBackendConfig::default()).unwrap();
    let root = backend.root().unwrap().id;
    let first = backend
        .resolve_child_id(root, "docs", CaseSensitivity::Sensitive)
        .unwrap()
        .unwrap();
    let second = backend
        .resolve_child_id(root, "docs", CaseSensitivity::Sensitive)
        .unwrap()
        .unwrap();
    assert_eq!(first, second);
    assert_ne!(first, root);
    assert_eq!(backend.name_of(first).unwrap().as_deref(), Some("docs"));
}

#[test]
fn sensitive_backend_rejects_other_casing() {
    let tmp = populated_dir();
    let backend = LocalBackend::new(tmp.path(), LocalBackendConfig::default()).unwrap();
    let root = backend.root().unwrap().id;
    assert!(
        backend
            .resolve_child_id(root, "README.md", CaseSensitivity::Sensitive)
            .unwrap()
            .is_some()
    );
    assert!(
        backend
            .resolve_child_id(root, "readme.md", CaseSensitivity::Sensitive)
            .unwrap()
            .is_none()
    );
}

#[test]
fn insensitive_lookup_caches_on_disk_casing() {
    let tmp = populated_dir();
    let vfs = vfs_over(
        &tmp,
        LocalBackendConfig {
            case_sensitivity: CaseSensitivity::Insensitive,
            ..LocalBackendConfig::default()
        },
    );
    let src = vfs.lookup(vfs.root(), "src").unwrap().into_node().unwrap();
    assert_eq!(src.name(), "Src");
    assert!(src.is_directory());

    let main = vfs.lookup(&src, "MAIN.RS").unwrap().into_node().unwrap();
    assert_eq!(main.name(), "Main.rs");
    let again = vfs.lookup(&src, "main.rs").unwrap().into_node().unwrap();
    assert!(Arc::ptr_eq(&main, &again));
}

#[test]
fn listing_is_sorted_and_complete() {
    let tmp = populated_dir();
    let vfs = vfs_over(&tmp, LocalBackendConfig::default());
    let listed = vfs.refresh_children(vfs.root()).unwrap();
    let names: Vec<_> = listed.iter().map(|n| n.name()).collect();
    assert_eq!(names, [".hidden", "README.md", "Src", "docs"]);
    assert!(vfs.root().children().unwrap().all_loaded());
}

#[test]
fn attributes_reflect_the_file() {
    let tmp = populated_dir();
    let vfs = vfs_over(&tmp, LocalBackendConfig::default());
    let hidden = vfs.lookup(vfs.root(), ".hidden").unwrap().into_node().unwrap();
    assert!(hidden.attributes().contains(vfs_dircache::fs::FileAttributes::HIDDEN));
    let docs = vfs.lookup(vfs.root(), "docs").unwrap().into_node().unwrap();
    assert!(docs.attributes().is_directory());
}

#[test]
fn created_file_is_found_after_refresh() {
    let tmp = populated_dir();
    let vfs = vfs_over(&tmp, LocalBackendConfig::default());
    assert!(vfs.lookup(vfs.root(), "new.txt").unwrap().is_negative());

    fs::write(tmp.path().join("new.txt"), "hi").unwrap();
    assert!(vfs.lookup(vfs.root(), "new.txt").unwrap().is_negative());

    let created = vfs.refresh_and_find_child(vfs.root(), "new.txt").unwrap();
    assert!(created.is_some());
    assert!(vfs.lookup(vfs.root(), "new.txt").unwrap().into_node().is_some());
}

#[test]
fn deleted_file_is_dropped_on_refresh() {
    let tmp = populated_dir();
    let vfs = vfs_over(&tmp, LocalBackendConfig::default());
    vfs.lookup(vfs.root(), "README.md").unwrap();
    fs::remove_file(tmp.path().join("README.md")).unwrap();

    assert!(vfs.refresh_and_find_child(vfs.root(), "README.md").unwrap().is_none());
    assert!(vfs.lookup(vfs.root(), "README.md").unwrap().is_negative());
}

#[test]
fn access_outside_allowed_roots_is_denied() {
    let tmp = populated_dir();
    let allowed = tmp.path().join("Src");
    let vfs = vfs_over(
        &tmp,
        LocalBackendConfig {
            allowed_roots: vec![allowed],
            ..LocalBackendConfig::default()
        },
    );

    assert!(vfs.lookup_path(vfs.root(), "Src/Main.rs").unwrap().into_node().is_some());
    assert!(matches!(
        vfs.lookup(vfs.root(), "docs"),
        Err(VfsError::Backend(BackendError::AccessDenied { .. }))
    ));

    let listed = vfs.refresh_children(vfs.root()).unwrap();
    let names: Vec<_> = listed.iter().map(|n| n.name()).collect();
    assert_eq!(names, ["Src"]);
}

#[test]
fn root_must_be_a_directory() {
    let tmp = populated_dir();
    let result = LocalBackend::new(tmp.path().join("README.md"), LocalBackendConfig::default());
    assert!(result.is_err());
}
