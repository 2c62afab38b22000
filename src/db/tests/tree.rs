#![cfg(test)]

use std::io::Cursor;

use crate::db::blockfile::BlockFile;
use crate::db::tree::DbTree;
use crate::db::Database;
use crate::fco::name::FcoName;
use crate::fco::object::Fco;
use crate::fco::prop::{FileType, Prop, PropValue};
use crate::policy::rule_list::RuleList;

fn fco(path: &str) -> Fco {
    let mut fco = Fco::new(FcoName::from_path(path));
    fco.set(Prop::FileType, PropValue::FileType(FileType::File));
    fco
}

fn populated() -> DbTree {
    let mut tree = DbTree::new();
    let mut cursor = tree.cursor();
    for path in ["/tmp/tw_test/a", "/tmp/tw_test/b/c", "/tmp/tw_test"] {
        cursor.seek_to(&FcoName::from_path(path), true);
        cursor.write_fco(fco(path));
    }
    tree
}

#[test]
fn test_seek_and_read() {
    let mut tree = populated();
    let mut cursor = tree.cursor();
    assert!(cursor.seek_to(&FcoName::from_path("/tmp/tw_test/a"), false));
    assert!(cursor.has_fco_data());
    let stored = cursor.read_fco().unwrap();
    assert_eq!(stored.name().as_string(), "/tmp/tw_test/a");
}

#[test]
fn test_seek_missing_without_create() {
    let mut tree = populated();
    let mut cursor = tree.cursor();
    assert!(!cursor.seek_to(&FcoName::from_path("/tmp/other"), false));
    assert!(cursor.read_fco().is_err());
}

#[test]
fn test_intermediate_nodes_exist_without_data() {
    let mut tree = populated();
    let mut cursor = tree.cursor();
    // /tmp/tw_test/b was created as an ancestor but holds no record
    assert!(cursor.seek_to(&FcoName::from_path("/tmp/tw_test/b"), false));
    assert!(!cursor.has_fco_data());
}

#[test]
fn test_sibling_iteration_is_name_ordered() {
    let mut tree = populated();
    let mut cursor = tree.cursor();
    assert!(cursor.seek_to(&FcoName::from_path("/tmp/tw_test"), false));
    assert!(cursor.seek_first_child());
    let mut seen = vec![cursor.name().as_string()];
    while cursor.seek_next_sibling() {
        seen.push(cursor.name().as_string());
    }
    assert_eq!(seen, ["/tmp/tw_test/a", "/tmp/tw_test/b"]);
}

#[test]
fn test_seek_parent() {
    let mut tree = populated();
    let mut cursor = tree.cursor();
    cursor.seek_to(&FcoName::from_path("/tmp/tw_test/b/c"), false);
    assert!(cursor.seek_parent());
    assert_eq!(cursor.name().as_string(), "/tmp/tw_test/b");
}

#[test]
fn test_delete_and_collapse() {
    let mut tree = populated();
    {
        let mut cursor = tree.cursor();
        cursor.seek_to(&FcoName::from_path("/tmp/tw_test/b/c"), false);
        assert!(cursor.delete_fco().is_some());
    }
    tree.collapse(&FcoName::from_path("/tmp/tw_test/b/c"));
    let mut cursor = tree.cursor();
    // b had no record of its own and no children left, so it collapsed
    assert!(!cursor.seek_to(&FcoName::from_path("/tmp/tw_test/b"), false));
    // but tw_test still holds a record
    assert!(cursor.seek_to(&FcoName::from_path("/tmp/tw_test"), false));
}

#[test]
fn test_remove_empty_subtree_refuses_populated() {
    let mut tree = populated();
    let mut cursor = tree.cursor();
    cursor.seek_to(&FcoName::from_path("/tmp/tw_test"), false);
    assert!(!cursor.remove_empty_subtree());
}

#[test]
fn test_remove_empty_subtree() {
    let mut tree = populated();
    {
        let mut cursor = tree.cursor();
        cursor.seek_to(&FcoName::from_path("/tmp/tw_test/b/c"), false);
        cursor.delete_fco();
        cursor.seek_parent();
        assert!(cursor.remove_empty_subtree());
        assert_eq!(cursor.name().as_string(), "/tmp/tw_test");
    }
    let mut cursor = tree.cursor();
    assert!(!cursor.seek_to(&FcoName::from_path("/tmp/tw_test/b"), false));
}

#[test]
fn test_for_each_record_is_name_ordered() {
    let tree = populated();
    let mut names = Vec::new();
    tree.for_each_record(&FcoName::from_path("/tmp/tw_test"), &mut |name, _| {
        names.push(name.as_string());
    });
    assert_eq!(names, ["/tmp/tw_test", "/tmp/tw_test/a", "/tmp/tw_test/b/c"]);
}

#[test]
fn test_store_load_through_block_image() {
    let tree = populated();
    let mut image = BlockFile::new();
    tree.store(&mut image);
    let back = DbTree::load(&image).expect("cannot load tree");
    assert_eq!(back, tree);
}

#[test]
fn test_store_is_deterministic() {
    let render = || {
        let tree = populated();
        let mut image = BlockFile::new();
        tree.store(&mut image);
        let mut buf = Vec::new();
        image.write(&mut buf).unwrap();
        buf
    };
    assert_eq!(render(), render());
}

#[test]
fn test_database_roundtrip() {
    let mut db = Database::new(RuleList::new(), 1_700_000_000);
    {
        let mut cursor = db.tree.cursor();
        cursor.seek_to(&FcoName::from_path("/tmp/x"), true);
        cursor.write_fco(fco("/tmp/x"));
    }
    let mut buf = Vec::new();
    db.write(&mut buf).unwrap();
    let back = Database::read(&mut Cursor::new(buf)).expect("cannot parse database");
    assert_eq!(back.created_at(), 1_700_000_000);
    assert!(back.tree.lookup(&FcoName::from_path("/tmp/x")).is_some());
}
