#![allow(clippy::unwrap_used, missing_docs)]

use std::sync::Arc;

use vfs_dircache::fs::consistency;
use vfs_dircache::fs::{
    CachedLookup, CaseSensitivity, ChildRef, DirChildren, FileAttributes, FileId, Node,
};

fn node(id: u32, name: &str) -> Arc<Node> {
    Arc::new(Node::new(
        FileId::new_unchecked(id),
        name,
        Some(FileId::new_unchecked(1)),
        FileAttributes::empty(),
        CaseSensitivity::Sensitive,
    ))
}

fn layout(children: &DirChildren) -> Vec<String> {
    children
        .snapshot()
        .iter()
        .map(|e| match e {
            ChildRef::Resolved(n) => n.name().to_owned(),
            ChildRef::Negative(name) => format!("!{name}"),
        })
        .collect()
}

fn assert_consistent(children: &DirChildren) {
    consistency::check(
        &children.snapshot(),
        children.case_sensitivity(),
        children.all_loaded(),
    )
    .unwrap();
}

#[test]
fn empty_cache_knows_nothing() {
    let children = DirChildren::new(CaseSensitivity::Sensitive);
    assert!(matches!(children.find_cached("a"), CachedLookup::Unknown));
    assert!(matches!(children.find_cached(""), CachedLookup::Negative));
}

#[test]
fn zones_stay_partitioned_and_sorted() {
    let children = DirChildren::new(CaseSensitivity::Sensitive);
    children.insert_negative("m");
    children.insert(node(2, "z"));
    children.insert_negative("b");
    children.insert(node(3, "c"));
    children.insert_negative("y");
    assert_eq!(layout(&children), ["c", "z", "!b", "!m", "!y"]);
    assert_consistent(&children);
}

#[test]
fn insert_is_idempotent() {
    let children = DirChildren::new(CaseSensitivity::Sensitive);
    let first = children.insert(node(2, "a"));
    let second = children.insert(node(9, "a"));
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(layout(&children), ["a"]);
}

#[test]
fn negative_insert_is_idempotent() {
    let children = DirChildren::new(CaseSensitivity::Insensitive);
    children.insert_negative("Foo");
    let generation = children.generation();
    children.insert_negative("foo");
    assert_eq!(children.generation(), generation, "nothing published");
    assert_eq!(layout(&children), ["!Foo"]);
}

#[test]
fn insert_promotes_negative() {
    let children = DirChildren::new(CaseSensitivity::Sensitive);
    children.insert_negative("a");
    children.insert_negative("b");
    children.insert(node(2, "a"));
    assert_eq!(layout(&children), ["a", "!b"]);
    assert!(matches!(children.find_cached("a"), CachedLookup::Resolved(_)));
    assert_consistent(&children);
}

#[test]
fn insert_if_unknown_yields_to_concurrent_winner() {
    let children = DirChildren::new(CaseSensitivity::Sensitive);
    let winner = children.insert(node(2, "a"));
    let CachedLookup::Resolved(got) = children.insert_if_unknown(node(3, "a")) else {
        panic!("expected the cached child");
    };
    assert!(Arc::ptr_eq(&winner, &got));
}

#[test]
fn insert_if_unknown_yields_to_concurrent_absence() {
    let children = DirChildren::new(CaseSensitivity::Sensitive);
    children.insert_negative("a");
    assert!(matches!(
        children.insert_if_unknown(node(2, "a")),
        CachedLookup::Negative
    ));
    assert_eq!(layout(&children), ["!a"]);
}

#[test]
fn negative_insert_yields_to_resolved() {
    let children = DirChildren::new(CaseSensitivity::Sensitive);
    children.insert(node(2, "a"));
    assert!(matches!(children.insert_negative("a"), CachedLookup::Resolved(_)));
    assert_eq!(layout(&children), ["a"]);
}

#[test]
fn remove_demotes_to_negative() {
    let children = DirChildren::new(CaseSensitivity::Sensitive);
    let a = children.insert(node(2, "a"));
    children.insert(node(3, "b"));
    children.insert_negative("c");

    assert!(children.remove(&a, true));
    assert_eq!(layout(&children), ["b", "!a", "!c"]);
    assert!(matches!(children.find_cached("a"), CachedLookup::Negative));
    assert_consistent(&children);
}

#[test]
fn remove_without_absence_forgets_the_name() {
    let children = DirChildren::new(CaseSensitivity::Sensitive);
    let a = children.insert(node(2, "a"));
    assert!(children.remove(&a, false));
    assert!(layout(&children).is_empty());
    assert!(matches!(children.find_cached("a"), CachedLookup::Unknown));
}

#[test]
fn remove_of_unknown_child_can_still_record_absence() {
    let children = DirChildren::new(CaseSensitivity::Sensitive);
    let ghost = node(7, "ghost");
    assert!(!children.remove(&ghost, true));
    assert_eq!(layout(&children), ["!ghost"]);
}

#[test]
fn remove_checks_identity() {
    let children = DirChildren::new(CaseSensitivity::Sensitive);
    children.insert(node(2, "a"));
    assert!(!children.remove(&node(3, "a"), true));
    assert_eq!(layout(&children), ["a"], "no negative shadows the live child");
}

#[test]
fn mark_all_loaded_purges_negatives() {
    let children = DirChildren::new(CaseSensitivity::Sensitive);
    children.insert(node(2, "a"));
    children.insert_negative("b");
    children.mark_all_loaded();
    assert!(children.all_loaded());
    assert_eq!(layout(&children), ["a"]);
    assert!(matches!(children.find_cached("b"), CachedLookup::Negative));
    assert!(matches!(children.find_cached("zzz"), CachedLookup::Negative));
}

#[test]
fn loaded_directory_records_no_negatives() {
    let children = DirChildren::new(CaseSensitivity::Sensitive);
    children.mark_all_loaded();
    let a = children.insert(node(2, "a"));
    children.insert_negative("b");
    children.remove(&a, true);
    assert!(children.negative_names().is_empty());
    assert_consistent(&children);
}

#[test]
fn listing_install_rejected_after_concurrent_change() {
    let children = DirChildren::new(CaseSensitivity::Sensitive);
    let generation = children.generation();
    children.insert_negative("raced");
    assert!(!children.install_listing(&[node(2, "a")], generation));
    assert!(!children.all_loaded());

    let generation = children.generation();
    assert!(children.install_listing(&[node(2, "a"), node(3, "b")], generation));
    assert!(children.all_loaded());
    assert_eq!(layout(&children), ["a", "b"]);
}

#[test]
fn snapshot_is_unaffected_by_later_writes() {
    let children = DirChildren::new(CaseSensitivity::Sensitive);
    children.insert(node(2, "a"));
    let before = children.snapshot();
    children.insert(node(3, "b"));
    assert_eq!(before.len(), 1);
    assert_eq!(children.snapshot().len(), 2);
}

#[test]
fn find_by_id_scans_resolved_entries() {
    let children = DirChildren::new(CaseSensitivity::Sensitive);
    children.insert(node(2, "a"));
    children.insert_negative("b");
    assert_eq!(
        children.find_by_id(FileId::new_unchecked(2)).unwrap().name(),
        "a"
    );
    assert!(children.find_by_id(FileId::new_unchecked(3)).is_none());
}

#[test]
fn clear_forgets_everything() {
    let children = DirChildren::new(CaseSensitivity::Sensitive);
    children.insert(node(2, "a"));
    children.mark_all_loaded();
    children.clear();
    assert!(!children.all_loaded());
    assert!(matches!(children.find_cached("a"), CachedLookup::Unknown));
}
