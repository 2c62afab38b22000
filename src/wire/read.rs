//! Parsers for the primitive wire types.

use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};
use num_traits::FromPrimitive;

use crate::error::{Error, Result};

/// Hard cap on counted vectors, so a corrupt length cannot trigger an
/// enormous allocation before the CRC or signature check has a chance to
/// reject the file. Sized for whole database payloads, which pass through
/// here as one counted body.
pub const MAX_COUNTED_LEN: usize = 512 * 1024 * 1024;

/// Parses a single byte.
pub fn u8(src: &mut impl Read) -> Result<u8> {
    src.read_u8().map_err(Error::Io)
}

/// Parses an unsigned 16-bit little-endian integer.
pub fn u16(src: &mut impl Read) -> Result<u16> {
    src.read_u16::<LittleEndian>().map_err(Error::Io)
}

/// Parses an unsigned 32-bit little-endian integer.
pub fn u32(src: &mut impl Read) -> Result<u32> {
    src.read_u32::<LittleEndian>().map_err(Error::Io)
}

/// Parses a signed 32-bit little-endian integer.
pub fn i32(src: &mut impl Read) -> Result<i32> {
    src.read_i32::<LittleEndian>().map_err(Error::Io)
}

/// Parses an unsigned 64-bit little-endian integer.
pub fn u64(src: &mut impl Read) -> Result<u64> {
    src.read_u64::<LittleEndian>().map_err(Error::Io)
}

/// Parses a signed 64-bit little-endian integer.
pub fn i64(src: &mut impl Read) -> Result<i64> {
    src.read_i64::<LittleEndian>().map_err(Error::Io)
}

/// Parses a boolean encoded as a single byte; anything but `0`/`1` is an
/// error.
pub fn bool(src: &mut impl Read) -> Result<bool> {
    match u8(src)? {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(Error::WireFormat("boolean byte out of range")),
    }
}

/// Parses an optional value encoded as a boolean discriminator followed by
/// the value if present.
pub fn option<T, S: Read>(src: &mut S, cont: impl FnOnce(&mut S) -> Result<T>) -> Result<Option<T>> {
    match bool(src)? {
        true => Ok(Some(cont(src)?)),
        false => Ok(None),
    }
}

/// Parses a counted byte vector: `u32` length followed by the bytes.
pub fn bytes(src: &mut impl Read) -> Result<Vec<u8>> {
    let len = u32(src)? as usize;
    if len > MAX_COUNTED_LEN {
        return Err(Error::WireFormat("counted vector length out of range"));
    }
    let mut vec = vec![0u8; len];
    src.read_exact(vec.as_mut_slice()).map_err(Error::Io)?;
    Ok(vec)
}

/// Parses a fixed-size byte array.
pub fn array<const N: usize>(src: &mut impl Read) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    src.read_exact(&mut buf).map_err(Error::Io)?;
    Ok(buf)
}

/// Parses a short counted byte vector: `u16` length followed by the bytes.
pub fn short_bytes(src: &mut impl Read) -> Result<Vec<u8>> {
    let len = u16(src)? as usize;
    let mut vec = vec![0u8; len];
    src.read_exact(vec.as_mut_slice()).map_err(Error::Io)?;
    Ok(vec)
}

/// Parses a counted UTF-8 string.
pub fn string(src: &mut impl Read) -> Result<String> {
    let vec = bytes(src)?;
    String::from_utf8(vec).map_err(|_| Error::WireFormat("string is not valid UTF-8"))
}

/// Parses an enum discriminant from a `u32` tag.
pub fn variant<T: FromPrimitive>(src: &mut impl Read) -> Result<T> {
    FromPrimitive::from_u32(u32(src)?).ok_or(Error::WireFormat("enum tag out of range"))
}

/// Parses a `u32` count as a `usize`.
pub fn u32_as_usize(src: &mut impl Read) -> Result<usize> {
    Ok(u32(src)? as usize)
}
