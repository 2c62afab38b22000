//! Property values measured for a filesystem object.
//!
//! Values are a tagged variant rather than a class hierarchy; comparison
//! dispatches on the tag. A comparison across concrete variants answers
//! [`CmpResult::WrongType`], and ops a variant cannot answer yield
//! [`CmpResult::Unsupported`].

use std::io::{Read, Write};

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;

use crate::error::{Error, Result};
use crate::wire::{read, write};

/// The filesystem property enumeration. Wire positions are fixed; new
/// properties append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
pub enum Prop {
    FileType = 0,
    Dev,
    RDev,
    Inode,
    Mode,
    NLink,
    Uid,
    Gid,
    Size,
    AccessTime,
    ModifyTime,
    CreateTime,
    BlockSize,
    Blocks,
    GrowingFile,
    Crc32,
    Md5,
    Sha1,
    Haval,
}

/// Number of positions in [`Prop`].
pub const PROP_COUNT: usize = 19;

/// All property positions in wire order.
pub const ALL_PROPS: [Prop; PROP_COUNT] = [
    Prop::FileType,
    Prop::Dev,
    Prop::RDev,
    Prop::Inode,
    Prop::Mode,
    Prop::NLink,
    Prop::Uid,
    Prop::Gid,
    Prop::Size,
    Prop::AccessTime,
    Prop::ModifyTime,
    Prop::CreateTime,
    Prop::BlockSize,
    Prop::Blocks,
    Prop::GrowingFile,
    Prop::Crc32,
    Prop::Md5,
    Prop::Sha1,
    Prop::Haval,
];

impl Prop {
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(idx: usize) -> Option<Prop> {
        FromPrimitive::from_usize(idx)
    }

    /// Short display name used by reports and the viewer.
    pub fn display_name(self) -> &'static str {
        match self {
            Prop::FileType => "Object Type",
            Prop::Dev => "Device Number",
            Prop::RDev => "File Device Number",
            Prop::Inode => "Inode Number",
            Prop::Mode => "Mode",
            Prop::NLink => "Num Links",
            Prop::Uid => "UID",
            Prop::Gid => "GID",
            Prop::Size => "Size",
            Prop::AccessTime => "Access Time",
            Prop::ModifyTime => "Modify Time",
            Prop::CreateTime => "Change Time",
            Prop::BlockSize => "Blocksize",
            Prop::Blocks => "Blocks",
            Prop::GrowingFile => "Growing Size",
            Prop::Crc32 => "CRC32",
            Prop::Md5 => "MD5",
            Prop::Sha1 => "SHA1",
            Prop::Haval => "HAVAL",
        }
    }
}

/// Comparison operators accepted by [`PropValue::compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

/// Outcome of a property comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpResult {
    True,
    False,
    /// The operands are different concrete types.
    WrongType,
    /// The type cannot answer this operator.
    Unsupported,
}

impl CmpResult {
    fn of(b: bool) -> CmpResult {
        if b {
            CmpResult::True
        } else {
            CmpResult::False
        }
    }
}

/// File type as derived from the stat mode, plus the reserved values other
/// platforms report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum FileType {
    Invalid = 0,
    File,
    Dir,
    BlockDev,
    CharDev,
    Symlink,
    Fifo,
    Socket,
    Door,
    Port,
    Named,
    Native,
    MessageQueue,
    Semaphore,
    SharedMemory,
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FileType::Invalid => "Invalid",
            FileType::File => "Regular File",
            FileType::Dir => "Directory",
            FileType::BlockDev => "Block Device",
            FileType::CharDev => "Character Device",
            FileType::Symlink => "Symbolic Link",
            FileType::Fifo => "FIFO",
            FileType::Socket => "Socket",
            FileType::Door => "Door",
            FileType::Port => "Event Port",
            FileType::Named => "Named Special File",
            FileType::Native => "Native Object",
            FileType::MessageQueue => "Message Queue",
            FileType::Semaphore => "Semaphore",
            FileType::SharedMemory => "Shared Memory",
        };
        f.write_str(s)
    }
}

/// Hash algorithms carried by hash-valued properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum HashAlgo {
    Crc32 = 0,
    Md5,
    Sha1,
    Haval,
}

impl HashAlgo {
    pub fn digest_len(self) -> usize {
        match self {
            HashAlgo::Crc32 => 4,
            HashAlgo::Md5 => 16,
            HashAlgo::Sha1 | HashAlgo::Haval => 20,
        }
    }

    /// The property position a digest of this algorithm lives at.
    pub fn prop(self) -> Prop {
        match self {
            HashAlgo::Crc32 => Prop::Crc32,
            HashAlgo::Md5 => Prop::Md5,
            HashAlgo::Sha1 => Prop::Sha1,
            HashAlgo::Haval => Prop::Haval,
        }
    }
}

/// A fixed-width digest value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashValue {
    pub algo: HashAlgo,
    pub bytes: Vec<u8>,
}

impl HashValue {
    pub fn new(algo: HashAlgo, bytes: Vec<u8>) -> Self {
        debug_assert_eq!(bytes.len(), algo.digest_len());
        Self { algo, bytes }
    }

    /// Constant-time byte equality.
    fn ct_eq(&self, other: &HashValue) -> bool {
        if self.bytes.len() != other.bytes.len() {
            return false;
        }
        let mut diff = 0u8;
        for (a, b) in self.bytes.iter().zip(other.bytes.iter()) {
            diff |= a ^ b;
        }
        diff == 0
    }
}

/// How digests render in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashDisplay {
    #[default]
    Hex,
    Base64,
}

/// A measured property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    /// The property could not be computed for this object.
    Undefined,
    Int32(i32),
    Int64(i64),
    Uint64(u64),
    Str(String),
    FileType(FileType),
    /// An `Int64` size whose equality passes whenever the newer value has
    /// not shrunk.
    GrowingFile(i64),
    Hash(HashValue),
}

/// Wire tags for [`PropValue`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
enum PropValueTag {
    Undefined = 0,
    Int32,
    Int64,
    Uint64,
    Str,
    FileType,
    GrowingFile,
    Hash,
}

impl PropValue {
    pub fn is_undefined(&self) -> bool {
        matches!(self, PropValue::Undefined)
    }

    /// Compares two property values.
    ///
    /// An `Undefined` operand answers `False` to `Eq`, `True` to `Ne` and
    /// `WrongType` to every ordering op. `GrowingFile` redefines `Eq` as
    /// `Le` so that a grown file still "equals" its baseline.
    pub fn compare(&self, other: &PropValue, op: CmpOp) -> CmpResult {
        use PropValue::*;
        match (self, other) {
            (Undefined, _) | (_, Undefined) => match op {
                CmpOp::Eq => CmpResult::False,
                CmpOp::Ne => CmpResult::True,
                _ => CmpResult::WrongType,
            },
            (Int32(a), Int32(b)) => ordered_cmp(a, b, op),
            (Int64(a), Int64(b)) => ordered_cmp(a, b, op),
            (Uint64(a), Uint64(b)) => ordered_cmp(a, b, op),
            (Str(a), Str(b)) => ordered_cmp(a, b, op),
            (GrowingFile(a), GrowingFile(b)) => {
                let op = if op == CmpOp::Eq { CmpOp::Le } else { op };
                ordered_cmp(a, b, op)
            }
            (FileType(a), FileType(b)) => match op {
                CmpOp::Eq => CmpResult::of(a == b),
                CmpOp::Ne => CmpResult::of(a != b),
                _ => CmpResult::Unsupported,
            },
            (Hash(a), Hash(b)) => {
                if a.algo != b.algo {
                    return CmpResult::WrongType;
                }
                match op {
                    CmpOp::Eq => CmpResult::of(a.ct_eq(b)),
                    CmpOp::Ne => CmpResult::of(!a.ct_eq(b)),
                    _ => CmpResult::Unsupported,
                }
            }
            _ => CmpResult::WrongType,
        }
    }

    /// Replaces this value with a copy of `other`.
    pub fn copy_from(&mut self, other: &PropValue) {
        *self = other.clone();
    }

    /// Display form with the default hex digest rendering.
    pub fn as_string(&self) -> String {
        self.render(HashDisplay::Hex)
    }

    /// Display form with the chosen digest rendering.
    pub fn render(&self, hashes: HashDisplay) -> String {
        use base64::Engine;
        match self {
            PropValue::Undefined => "---".to_owned(),
            PropValue::Int32(n) => n.to_string(),
            PropValue::Int64(n) => n.to_string(),
            PropValue::Uint64(n) => n.to_string(),
            PropValue::Str(s) => s.clone(),
            PropValue::FileType(t) => t.to_string(),
            PropValue::GrowingFile(n) => n.to_string(),
            PropValue::Hash(h) => match hashes {
                HashDisplay::Hex => hex::encode(&h.bytes),
                HashDisplay::Base64 => {
                    base64::engine::general_purpose::STANDARD.encode(&h.bytes)
                }
            },
        }
    }

    /// Writes the tagged wire form.
    pub fn write(&self, dest: &mut dyn Write) -> std::io::Result<()> {
        match self {
            PropValue::Undefined => write::variant(dest, PropValueTag::Undefined),
            PropValue::Int32(n) => {
                write::variant(dest, PropValueTag::Int32)?;
                write::i32(dest, *n)
            }
            PropValue::Int64(n) => {
                write::variant(dest, PropValueTag::Int64)?;
                write::i64(dest, *n)
            }
            PropValue::Uint64(n) => {
                write::variant(dest, PropValueTag::Uint64)?;
                write::u64(dest, *n)
            }
            PropValue::Str(s) => {
                write::variant(dest, PropValueTag::Str)?;
                write::string(dest, s)
            }
            PropValue::FileType(t) => {
                write::variant(dest, PropValueTag::FileType)?;
                write::variant(dest, *t)
            }
            PropValue::GrowingFile(n) => {
                write::variant(dest, PropValueTag::GrowingFile)?;
                write::i64(dest, *n)
            }
            PropValue::Hash(h) => {
                write::variant(dest, PropValueTag::Hash)?;
                write::variant(dest, h.algo)?;
                write::bytes(dest, &h.bytes)
            }
        }
    }

    /// Reads the tagged wire form.
    pub fn read(src: &mut impl Read) -> Result<PropValue> {
        let tag: PropValueTag = read::variant(src)?;
        Ok(match tag {
            PropValueTag::Undefined => PropValue::Undefined,
            PropValueTag::Int32 => PropValue::Int32(read::i32(src)?),
            PropValueTag::Int64 => PropValue::Int64(read::i64(src)?),
            PropValueTag::Uint64 => PropValue::Uint64(read::u64(src)?),
            PropValueTag::Str => PropValue::Str(read::string(src)?),
            PropValueTag::FileType => PropValue::FileType(read::variant(src)?),
            PropValueTag::GrowingFile => PropValue::GrowingFile(read::i64(src)?),
            PropValueTag::Hash => {
                let algo: HashAlgo = read::variant(src)?;
                let bytes = read::bytes(src)?;
                if bytes.len() != algo.digest_len() {
                    return Err(Error::WireFormat("digest length does not match algorithm"));
                }
                PropValue::Hash(HashValue { algo, bytes })
            }
        })
    }
}

fn ordered_cmp<T: Ord>(a: &T, b: &T, op: CmpOp) -> CmpResult {
    CmpResult::of(match op {
        CmpOp::Eq => a == b,
        CmpOp::Ne => a != b,
        CmpOp::Lt => a < b,
        CmpOp::Gt => a > b,
        CmpOp::Le => a <= b,
        CmpOp::Ge => a >= b,
    })
}
