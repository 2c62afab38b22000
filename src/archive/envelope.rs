//! Reading and writing artifact bodies: compression and the sign-over-hash
//! envelope.
//!
//! A signed body is the counted payload followed by a 64-byte Ed25519
//! signature over the payload's SHA-512, with the artifact identifier as
//! the signing context. Any byte change to payload or signature fails
//! verification; so does a signature made by a different key, which is how
//! a configuration-file / site-key mismatch surfaces.

use std::io::{Read, Write};
use std::path::Path;

use ed25519_dalek::{Signature, SigningKey, VerifyingKey};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use sha2::{Digest, Sha512};

use crate::archive::header::{Encoding, FileHeader};
use crate::error::{Error, Result};
use crate::wire::{read, write};

/// How an artifact's body is produced.
pub enum BodyMode<'a> {
    /// Plain counted payload.
    Plain,
    /// Zlib-compressed counted payload.
    Compressed,
    /// Counted payload plus a signature by this key.
    Signed(&'a SigningKey),
    /// Plain framing whose payload carries its own symmetric wrapping
    /// (keyfiles).
    SymWrapped,
}

impl BodyMode<'_> {
    fn encoding(&self) -> Encoding {
        match self {
            BodyMode::Plain => Encoding::None,
            BodyMode::Compressed => Encoding::Compressed,
            BodyMode::Signed(_) => Encoding::AsymEncryption,
            BodyMode::SymWrapped => Encoding::SymEncryption,
        }
    }
}

/// A writer that feeds a SHA-512 state with everything written through it.
pub struct HashingWriter<W: Write> {
    inner: W,
    hasher: Sha512,
}

impl<W: Write> HashingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, hasher: Sha512::new() }
    }

    /// Signs the hash of everything written and returns the signature with
    /// the inner writer.
    pub fn finish(self, key: &SigningKey, context: &[u8]) -> Result<(Signature, W)> {
        let signature = key
            .sign_prehashed(self.hasher, Some(context))
            .map_err(|_| Error::WireFormat("signing failed"))?;
        Ok((signature, self.inner))
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Writes a complete artifact: header, then the body in the chosen mode.
pub fn write_artifact(
    dest: &mut dyn Write,
    id: &[u8],
    baggage: &[u8],
    mode: BodyMode<'_>,
    payload: &[u8],
) -> Result<()> {
    let header =
        FileHeader::new(id, mode.encoding()).with_baggage(baggage.to_vec());
    header.write(dest).map_err(Error::Io)?;

    match mode {
        BodyMode::Plain | BodyMode::SymWrapped => {
            write::bytes(dest, payload).map_err(Error::Io)?;
        }
        BodyMode::Compressed => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(payload).map_err(Error::Io)?;
            let compressed = encoder.finish().map_err(Error::Io)?;
            write::bytes(dest, &compressed).map_err(Error::Io)?;
        }
        BodyMode::Signed(key) => {
            let mut hashing = HashingWriter::new(Vec::new());
            write::bytes(&mut hashing, payload).map_err(Error::Io)?;
            let (signature, body) = hashing.finish(key, id)?;
            dest.write_all(&body).map_err(Error::Io)?;
            dest.write_all(&signature.to_bytes()).map_err(Error::Io)?;
        }
    }
    Ok(())
}

/// Reads a complete artifact, validating identifier and version first and
/// the body per its encoding.
///
/// `verify` must be supplied for signed bodies; a signed artifact read
/// without a key, or failing verification, is rejected.
pub fn read_artifact(
    src: &mut impl Read,
    id: &[u8],
    artifact: &'static str,
    path: &Path,
    verify: Option<&VerifyingKey>,
) -> Result<(FileHeader, Vec<u8>)> {
    read_artifact_keyed(src, id, artifact, path, |_| Ok(verify.copied()))
}

/// Like [`read_artifact`], but the verifying key may come from the header
/// itself: config files embed the site public key in their baggage.
pub fn read_artifact_keyed(
    src: &mut impl Read,
    id: &[u8],
    artifact: &'static str,
    path: &Path,
    key_for: impl FnOnce(&FileHeader) -> Result<Option<VerifyingKey>>,
) -> Result<(FileHeader, Vec<u8>)> {
    let header = FileHeader::read(src)?;
    header.expect(id, artifact, path)?;
    let verify = key_for(&header)?;
    let verify = verify.as_ref();

    let payload = match header.encoding {
        Encoding::None | Encoding::SymEncryption => read::bytes(src)?,
        Encoding::Compressed => {
            let compressed = read::bytes(src)?;
            let mut decoder = ZlibDecoder::new(compressed.as_slice());
            let mut out = Vec::new();
            decoder
                .read_to_end(&mut out)
                .map_err(|_| Error::Truncated { path: path.to_path_buf() })?;
            out
        }
        Encoding::AsymEncryption => {
            let key = verify.ok_or(Error::BadSignature { path: path.to_path_buf() })?;
            // hash the counted form exactly as the writer produced it
            let payload = read::bytes(src)?;
            let sig_bytes = read::array::<64>(src)
                .map_err(|_| Error::Truncated { path: path.to_path_buf() })?;
            let signature = Signature::from_bytes(&sig_bytes);
            let mut hasher = Sha512::new();
            let mut counted = Vec::with_capacity(payload.len() + 4);
            write::bytes(&mut counted, &payload).map_err(Error::Io)?;
            hasher.update(&counted);
            key.verify_prehashed(hasher, Some(id), &signature)
                .map_err(|_| Error::BadSignature { path: path.to_path_buf() })?;
            payload
        }
    };
    Ok((header, payload))
}
