//! Stat-derived property computation.
//!
//! Everything here comes from a single `symlink_metadata` call per object.
//! Narrow platform types are sign-extended into 64-bit wire forms; times
//! are signed seconds and may be negative.

use std::fs::Metadata;

use crate::fco::object::Fco;
use crate::fco::prop::{FileType, Prop, PropValue};
use crate::fco::prop_vector::PropVector;

/// Derives the object type from stat metadata.
#[cfg(unix)]
pub fn file_type_of(meta: &Metadata) -> FileType {
    use std::os::unix::fs::FileTypeExt;
    let ft = meta.file_type();
    if ft.is_file() {
        FileType::File
    } else if ft.is_dir() {
        FileType::Dir
    } else if ft.is_symlink() {
        FileType::Symlink
    } else if ft.is_block_device() {
        FileType::BlockDev
    } else if ft.is_char_device() {
        FileType::CharDev
    } else if ft.is_fifo() {
        FileType::Fifo
    } else if ft.is_socket() {
        FileType::Socket
    } else {
        FileType::Invalid
    }
}

#[cfg(not(unix))]
pub fn file_type_of(meta: &Metadata) -> FileType {
    let ft = meta.file_type();
    if ft.is_file() {
        FileType::File
    } else if ft.is_dir() {
        FileType::Dir
    } else if ft.is_symlink() {
        FileType::Symlink
    } else {
        FileType::Invalid
    }
}

/// Fills the stat-class properties requested by `mask`.
///
/// The file type is computed first, before any other property; the rest are
/// only stored when their bit is in `mask`.
#[cfg(unix)]
pub fn stat_props(fco: &mut Fco, meta: &Metadata, mask: &PropVector) {
    use std::os::unix::fs::MetadataExt;

    if mask.contains(Prop::FileType) {
        fco.set(Prop::FileType, PropValue::FileType(file_type_of(meta)));
    }
    if mask.contains(Prop::Dev) {
        fco.set(Prop::Dev, PropValue::Uint64(meta.dev()));
    }
    if mask.contains(Prop::RDev) {
        fco.set(Prop::RDev, PropValue::Uint64(meta.rdev()));
    }
    if mask.contains(Prop::Inode) {
        fco.set(Prop::Inode, PropValue::Uint64(meta.ino()));
    }
    if mask.contains(Prop::Mode) {
        fco.set(Prop::Mode, PropValue::Uint64(u64::from(meta.mode())));
    }
    if mask.contains(Prop::NLink) {
        fco.set(Prop::NLink, PropValue::Int64(meta.nlink() as i64));
    }
    if mask.contains(Prop::Uid) {
        fco.set(Prop::Uid, PropValue::Int64(i64::from(meta.uid())));
    }
    if mask.contains(Prop::Gid) {
        fco.set(Prop::Gid, PropValue::Int64(i64::from(meta.gid())));
    }
    if mask.contains(Prop::Size) {
        fco.set(Prop::Size, PropValue::Int64(meta.size() as i64));
    }
    if mask.contains(Prop::AccessTime) {
        fco.set(Prop::AccessTime, PropValue::Int64(meta.atime()));
    }
    if mask.contains(Prop::ModifyTime) {
        fco.set(Prop::ModifyTime, PropValue::Int64(meta.mtime()));
    }
    if mask.contains(Prop::CreateTime) {
        fco.set(Prop::CreateTime, PropValue::Int64(meta.ctime()));
    }
    if mask.contains(Prop::BlockSize) {
        fco.set(Prop::BlockSize, PropValue::Int64(meta.blksize() as i64));
    }
    if mask.contains(Prop::Blocks) {
        fco.set(Prop::Blocks, PropValue::Int64(meta.blocks() as i64));
    }
    if mask.contains(Prop::GrowingFile) {
        fco.set(Prop::GrowingFile, PropValue::GrowingFile(meta.size() as i64));
    }
}

#[cfg(not(unix))]
pub fn stat_props(fco: &mut Fco, meta: &Metadata, mask: &PropVector) {
    if mask.contains(Prop::FileType) {
        fco.set(Prop::FileType, PropValue::FileType(file_type_of(meta)));
    }
    if mask.contains(Prop::Size) {
        fco.set(Prop::Size, PropValue::Int64(meta.len() as i64));
    }
    if mask.contains(Prop::GrowingFile) {
        fco.set(Prop::GrowingFile, PropValue::GrowingFile(meta.len() as i64));
    }
    if mask.contains(Prop::ModifyTime) {
        let secs = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        fco.set(Prop::ModifyTime, PropValue::Int64(secs));
    }
    for prop in [
        Prop::Dev,
        Prop::RDev,
        Prop::Inode,
        Prop::Mode,
        Prop::NLink,
        Prop::Uid,
        Prop::Gid,
        Prop::AccessTime,
        Prop::CreateTime,
        Prop::BlockSize,
        Prop::Blocks,
    ] {
        if mask.contains(prop) {
            fco.mark_undefined(prop);
        }
    }
}
