#![cfg(test)]

use std::io::Cursor;

use crate::fco::prop::{
    CmpOp, CmpResult, FileType, HashAlgo, HashValue, PropValue, ALL_PROPS, PROP_COUNT,
};

#[test]
fn test_prop_enumeration_is_dense() {
    for (i, prop) in ALL_PROPS.iter().enumerate() {
        assert_eq!(prop.index(), i);
    }
    assert_eq!(ALL_PROPS.len(), PROP_COUNT);
}

#[test]
fn test_undefined_comparison_table() {
    let concrete = [
        PropValue::Int32(4),
        PropValue::Int64(-9),
        PropValue::Uint64(12),
        PropValue::Str("x".into()),
        PropValue::FileType(FileType::Dir),
        PropValue::GrowingFile(3),
        PropValue::Hash(HashValue::new(HashAlgo::Crc32, vec![0; 4])),
    ];
    for p in &concrete {
        assert_eq!(PropValue::Undefined.compare(p, CmpOp::Eq), CmpResult::False);
        assert_eq!(PropValue::Undefined.compare(p, CmpOp::Ne), CmpResult::True);
        assert_eq!(p.compare(&PropValue::Undefined, CmpOp::Eq), CmpResult::False);
        assert_eq!(p.compare(&PropValue::Undefined, CmpOp::Ne), CmpResult::True);
        for op in [CmpOp::Lt, CmpOp::Gt, CmpOp::Le, CmpOp::Ge] {
            assert_eq!(PropValue::Undefined.compare(p, op), CmpResult::WrongType);
        }
    }
}

#[test]
fn test_cross_type_comparison_is_wrong_type() {
    let a = PropValue::Int64(10);
    let b = PropValue::Uint64(10);
    assert_eq!(a.compare(&b, CmpOp::Eq), CmpResult::WrongType);
    assert_eq!(b.compare(&a, CmpOp::Eq), CmpResult::WrongType);
}

#[test]
fn test_growing_file_equality_is_not_less() {
    let old = PropValue::GrowingFile(100);
    // grown: still "equal"
    assert_eq!(old.compare(&PropValue::GrowingFile(150), CmpOp::Eq), CmpResult::True);
    // unchanged: equal
    assert_eq!(old.compare(&PropValue::GrowingFile(100), CmpOp::Eq), CmpResult::True);
    // shrunk: a violation
    assert_eq!(old.compare(&PropValue::GrowingFile(99), CmpOp::Eq), CmpResult::False);
    // other operators keep their usual meaning
    assert_eq!(old.compare(&PropValue::GrowingFile(99), CmpOp::Gt), CmpResult::True);
}

#[test]
fn test_int64_ordering() {
    let a = PropValue::Int64(-5);
    let b = PropValue::Int64(7);
    assert_eq!(a.compare(&b, CmpOp::Lt), CmpResult::True);
    assert_eq!(a.compare(&b, CmpOp::Ge), CmpResult::False);
    assert_eq!(a.compare(&a.clone(), CmpOp::Eq), CmpResult::True);
}

#[test]
fn test_hash_equality_only() {
    let a = PropValue::Hash(HashValue::new(HashAlgo::Md5, vec![1; 16]));
    let b = PropValue::Hash(HashValue::new(HashAlgo::Md5, vec![2; 16]));
    assert_eq!(a.compare(&b, CmpOp::Eq), CmpResult::False);
    assert_eq!(a.compare(&b, CmpOp::Ne), CmpResult::True);
    assert_eq!(a.compare(&a.clone(), CmpOp::Eq), CmpResult::True);
    assert_eq!(a.compare(&b, CmpOp::Lt), CmpResult::Unsupported);
}

#[test]
fn test_hashes_of_different_algorithms_do_not_compare() {
    let sha = PropValue::Hash(HashValue::new(HashAlgo::Sha1, vec![0; 20]));
    let haval = PropValue::Hash(HashValue::new(HashAlgo::Haval, vec![0; 20]));
    assert_eq!(sha.compare(&haval, CmpOp::Eq), CmpResult::WrongType);
}

#[test]
fn test_value_wire_roundtrip() {
    let values = [
        PropValue::Undefined,
        PropValue::Int32(-42),
        PropValue::Int64(i64::MIN),
        PropValue::Uint64(u64::MAX),
        PropValue::Str("hello world".into()),
        PropValue::FileType(FileType::Symlink),
        PropValue::GrowingFile(10),
        PropValue::Hash(HashValue::new(HashAlgo::Sha1, (0..20).collect())),
    ];
    for value in &values {
        let mut buf = Vec::new();
        value.write(&mut buf).unwrap();
        let back = PropValue::read(&mut Cursor::new(buf)).expect("cannot parse value");
        assert_eq!(&back, value);
    }
}

#[test]
fn test_digest_length_is_validated() {
    let mut buf = Vec::new();
    PropValue::Hash(HashValue { algo: HashAlgo::Md5, bytes: vec![0; 16] }).write(&mut buf).unwrap();
    // corrupt the digest length field
    let mut truncated = buf.clone();
    truncated[8] = 4; // count field of the digest bytes
    assert!(PropValue::read(&mut Cursor::new(truncated)).is_err());
}

#[test]
fn test_rendering() {
    assert_eq!(PropValue::Undefined.as_string(), "---");
    assert_eq!(PropValue::Int64(-1).as_string(), "-1");
    assert_eq!(PropValue::FileType(FileType::Dir).as_string(), "Directory");
    let hash = PropValue::Hash(HashValue::new(HashAlgo::Crc32, vec![0xde, 0xad, 0xbe, 0xef]));
    assert_eq!(hash.as_string(), "deadbeef");
}
