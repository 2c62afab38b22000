//! Serializers for the primitive wire types.

use std::io::{self, Write};

use byteorder::{LittleEndian, WriteBytesExt};
use num_traits::ToPrimitive;

/// Serializes a single byte.
pub fn u8(dest: &mut dyn Write, n: u8) -> io::Result<()> {
    dest.write_u8(n)
}

/// Serializes an unsigned 16-bit integer in little-endian order.
pub fn u16(dest: &mut dyn Write, n: u16) -> io::Result<()> {
    dest.write_u16::<LittleEndian>(n)
}

/// Serializes an unsigned 32-bit integer in little-endian order.
pub fn u32(dest: &mut dyn Write, n: u32) -> io::Result<()> {
    dest.write_u32::<LittleEndian>(n)
}

/// Serializes a signed 32-bit integer in little-endian order.
pub fn i32(dest: &mut dyn Write, n: i32) -> io::Result<()> {
    dest.write_i32::<LittleEndian>(n)
}

/// Serializes an unsigned 64-bit integer in little-endian order.
pub fn u64(dest: &mut dyn Write, n: u64) -> io::Result<()> {
    dest.write_u64::<LittleEndian>(n)
}

/// Serializes a signed 64-bit integer in little-endian order.
///
/// Signed and unsigned 64-bit values are distinct wire forms; callers must
/// not funnel one through the other.
pub fn i64(dest: &mut dyn Write, n: i64) -> io::Result<()> {
    dest.write_i64::<LittleEndian>(n)
}

/// Serializes a boolean as a single `0`/`1` byte.
pub fn bool(dest: &mut dyn Write, b: bool) -> io::Result<()> {
    dest.write_u8(b as u8)
}

/// Serializes an optional value as a boolean discriminator followed by the
/// value if present.
pub fn option<T, S: Write + ?Sized>(
    dest: &mut S,
    opt: Option<T>,
    cont: impl FnOnce(T, &mut S) -> io::Result<()>,
) -> io::Result<()> {
    match opt {
        Some(val) => {
            dest.write_u8(1)?;
            cont(val, dest)
        }
        None => dest.write_u8(0),
    }
}

/// Serializes a counted byte vector: `u32` length followed by the bytes.
pub fn bytes(dest: &mut dyn Write, data: &[u8]) -> io::Result<()> {
    let len: u32 = data
        .len()
        .try_into()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "byte vector exceeds u32"))?;
    dest.write_u32::<LittleEndian>(len)?;
    dest.write_all(data)
}

/// Serializes a short counted byte vector: `u16` length followed by the
/// bytes. Used for file-header identifiers.
pub fn short_bytes(dest: &mut dyn Write, data: &[u8]) -> io::Result<()> {
    let len: u16 = data
        .len()
        .try_into()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "identifier exceeds u16"))?;
    dest.write_u16::<LittleEndian>(len)?;
    dest.write_all(data)
}

/// Serializes a string as its UTF-8 bytes in counted form.
pub fn string(dest: &mut dyn Write, s: &str) -> io::Result<()> {
    bytes(dest, s.as_bytes())
}

/// Serializes an enum discriminant as a `u32` tag.
pub fn variant<T: ToPrimitive>(dest: &mut dyn Write, val: T) -> io::Result<()> {
    let tag = ToPrimitive::to_u32(&val)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "tag does not fit in u32"))?;
    dest.write_u32::<LittleEndian>(tag)
}

/// Serializes a `usize` as a `u32`, failing on overflow.
pub fn usize_as_u32(dest: &mut dyn Write, n: usize) -> io::Result<()> {
    let n: u32 = n
        .try_into()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "count exceeds u32"))?;
    dest.write_u32::<LittleEndian>(n)
}
