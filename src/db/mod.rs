//! The baseline database: a signed, versioned snapshot of FCOs keyed by
//! path, together with the policy that produced it.

pub mod blockfile;
pub mod tree;

#[cfg(test)]
mod tests;

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::db::blockfile::BlockFile;
use crate::db::tree::DbTree;
use crate::error::{Error, Result};
use crate::fco::Genre;
use crate::policy::rule_list::RuleList;
use crate::wire::{read, write};

/// The database payload carried inside the signed container.
#[derive(Debug, Clone)]
pub struct Database {
    pub tree: DbTree,
    policy: RuleList,
    created_at: i64,
    image: BlockFile,
}

impl Database {
    /// A fresh, empty database recording the policy snapshot that is about
    /// to populate it.
    pub fn new(policy: RuleList, created_at: i64) -> Self {
        Self { tree: DbTree::new(), policy, created_at, image: BlockFile::new() }
    }

    pub fn policy(&self) -> &RuleList {
        &self.policy
    }

    pub fn set_policy(&mut self, policy: RuleList) {
        self.policy = policy;
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn set_created_at(&mut self, at: i64) {
        self.created_at = at;
    }

    /// Serializes: header fields, the policy snapshot, then the tree
    /// flushed into the block image. Only the filesystem genre exists,
    /// but its tag is written so future genres can share the format.
    pub fn write(&mut self, dest: &mut dyn Write) -> std::io::Result<()> {
        write::i64(dest, self.created_at)?;
        write::variant(dest, Genre::Fs)?;
        self.policy.write(dest)?;
        self.tree.store(&mut self.image);
        self.image.write(dest)
    }

    pub fn read(src: &mut impl Read) -> Result<Database> {
        let created_at = read::i64(src)?;
        let tag = read::u32(src)?;
        let _genre: Genre =
            num_traits::FromPrimitive::from_u32(tag).ok_or(Error::UnknownGenre(tag))?;
        let policy = RuleList::read(src)?;
        let image = BlockFile::read(src)?;
        let tree = DbTree::load(&image)?;
        Ok(Database { tree, policy, created_at, image })
    }
}

/// Holds the exclusive OS lock that serializes database writers.
///
/// The lock lives on a sidecar file beside the database, because the
/// database artifact itself is atomically replaced on save.
pub struct DbLock {
    file: File,
    path: PathBuf,
}

impl DbLock {
    pub fn acquire(db_path: &Path) -> Result<DbLock> {
        let mut os_name =
            db_path.file_name().map(std::ffi::OsStr::to_os_string).unwrap_or_default();
        os_name.push(".lock");
        let path = db_path.with_file_name(os_name);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|source| Error::IoPath { path: path.clone(), source })?;
        file.try_lock_exclusive()
            .map_err(|_| Error::DatabaseLocked { path: db_path.to_path_buf() })?;
        Ok(DbLock { file, path })
    }
}

impl Drop for DbLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
        let _ = std::fs::remove_file(&self.path);
    }
}
