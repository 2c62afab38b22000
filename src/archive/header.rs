//! The file header every artifact begins with.

use std::io::{Read, Write};
use std::path::Path;

use num_derive::{FromPrimitive, ToPrimitive};

use crate::error::{Error, Result};
use crate::wire::{read, write};

/// The one supported artifact version.
pub const FILE_VERSION: u32 = 0x0202_0000;

/// How the body after the header is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum Encoding {
    None = 0,
    Compressed = 1,
    AsymEncryption = 2,
    SymEncryption = 3,
}

/// Artifact identifier, version, body encoding and free-form baggage.
///
/// The identifier is a `u16` byte length followed by the bytes. Baggage is
/// opaque to the framing; config files use it to carry the site public
/// key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub id: Vec<u8>,
    pub version: u32,
    pub encoding: Encoding,
    pub baggage: Vec<u8>,
}

impl FileHeader {
    pub fn new(id: &[u8], encoding: Encoding) -> Self {
        Self { id: id.to_vec(), version: FILE_VERSION, encoding, baggage: Vec::new() }
    }

    pub fn with_baggage(mut self, baggage: Vec<u8>) -> Self {
        self.baggage = baggage;
        self
    }

    pub fn write(&self, dest: &mut dyn Write) -> std::io::Result<()> {
        write::short_bytes(dest, &self.id)?;
        write::u32(dest, self.version)?;
        write::variant(dest, self.encoding)?;
        write::bytes(dest, &self.baggage)
    }

    pub fn read(src: &mut impl Read) -> Result<FileHeader> {
        let id = read::short_bytes(src)?;
        let version = read::u32(src)?;
        let encoding_tag = read::u32(src)?;
        let encoding: Encoding = num_traits::FromPrimitive::from_u32(encoding_tag)
            .ok_or(Error::BadEncoding(encoding_tag))?;
        let baggage = read::bytes(src)?;
        Ok(FileHeader { id, version, encoding, baggage })
    }

    /// Checks identifier and version before any body byte is interpreted.
    pub fn expect(&self, id: &[u8], artifact: &'static str, path: &Path) -> Result<()> {
        if self.id != id {
            return Err(Error::BadMagic { expected: artifact, path: path.to_path_buf() });
        }
        if self.version != FILE_VERSION {
            return Err(Error::WrongVersion { found: self.version, path: path.to_path_buf() });
        }
        Ok(())
    }
}
