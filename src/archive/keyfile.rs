//! Site and local keyfiles.
//!
//! A keyfile stores the public key in the clear and the private seed
//! wrapped under a passphrase-derived symmetric key (Argon2id into
//! ChaCha20-Poly1305). Only the public half is needed to verify artifacts;
//! the private half is unwrapped in memory at signing time and never
//! persisted unwrapped.

use std::fs::File;
use std::io::{Cursor, Write};
use std::path::Path;

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use ed25519_dalek::{SigningKey, VerifyingKey};
use num_derive::{FromPrimitive, ToPrimitive};
use rand::RngCore;

use crate::archive::envelope::{read_artifact, write_artifact, BodyMode};
use crate::archive::ids;
use crate::error::{Error, Result};
use crate::wire::{read, write};

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const SEED_LEN: usize = 32;

/// Which artifact family a keypair signs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum KeyRole {
    /// Signs policy and config artifacts.
    Site = 1,
    /// Signs databases and reports.
    Local = 2,
}

impl std::fmt::Display for KeyRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyRole::Site => write!(f, "site"),
            KeyRole::Local => write!(f, "local"),
        }
    }
}

/// An on-disk keypair record.
#[derive(Debug, Clone)]
pub struct Keyfile {
    role: KeyRole,
    public: VerifyingKey,
    salt: [u8; SALT_LEN],
    nonce: [u8; NONCE_LEN],
    wrapped_seed: Vec<u8>,
}

fn derive_wrap_key(passphrase: &str, salt: &[u8]) -> Result<[u8; 32]> {
    let mut key = [0u8; 32];
    argon2::Argon2::default()
        .hash_password_into(passphrase.as_bytes(), salt, &mut key)
        .map_err(|_| Error::WireFormat("passphrase key derivation failed"))?;
    Ok(key)
}

impl Keyfile {
    /// Generates a fresh keypair wrapped under `passphrase`.
    pub fn generate(role: KeyRole, passphrase: &str) -> Result<Keyfile> {
        let mut rng = rand::rngs::OsRng;
        let signing = SigningKey::generate(&mut rng);

        let mut salt = [0u8; SALT_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        rng.fill_bytes(&mut salt);
        rng.fill_bytes(&mut nonce);

        let wrap_key = derive_wrap_key(passphrase, &salt)?;
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&wrap_key));
        let wrapped_seed = cipher
            .encrypt(Nonce::from_slice(&nonce), signing.to_bytes().as_slice())
            .map_err(|_| Error::WireFormat("seed wrapping failed"))?;

        Ok(Keyfile { role, public: signing.verifying_key(), salt, nonce, wrapped_seed })
    }

    pub fn role(&self) -> KeyRole {
        self.role
    }

    /// The verification half; always available without a passphrase.
    pub fn public(&self) -> &VerifyingKey {
        &self.public
    }

    /// Unwraps the signing half.
    ///
    /// A wrong passphrase fails the authenticated decryption; a wrapped
    /// seed that does not regenerate the stored public key means the file
    /// was assembled from mismatched halves.
    pub fn unlock(&self, passphrase: &str) -> Result<SigningKey> {
        let wrap_key = derive_wrap_key(passphrase, &self.salt)?;
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&wrap_key));
        let seed = cipher
            .decrypt(Nonce::from_slice(&self.nonce), self.wrapped_seed.as_slice())
            .map_err(|_| Error::WrongPassphrase)?;
        let seed: [u8; SEED_LEN] =
            seed.try_into().map_err(|_| Error::WrongPassphrase)?;
        let signing = SigningKey::from_bytes(&seed);
        if signing.verifying_key() != self.public {
            return Err(Error::KeyMismatch { path: Default::default() });
        }
        Ok(signing)
    }

    /// Rewraps the private half under a new passphrase.
    pub fn change_passphrase(&mut self, old: &str, new: &str) -> Result<()> {
        let signing = self.unlock(old)?;
        let mut rng = rand::rngs::OsRng;
        rng.fill_bytes(&mut self.salt);
        rng.fill_bytes(&mut self.nonce);
        let wrap_key = derive_wrap_key(new, &self.salt)?;
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&wrap_key));
        self.wrapped_seed = cipher
            .encrypt(Nonce::from_slice(&self.nonce), signing.to_bytes().as_slice())
            .map_err(|_| Error::WireFormat("seed wrapping failed"))?;
        Ok(())
    }

    fn payload(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        write::variant(&mut out, self.role).map_err(Error::Io)?;
        out.write_all(self.public.as_bytes()).map_err(Error::Io)?;
        out.write_all(&self.salt).map_err(Error::Io)?;
        out.write_all(&self.nonce).map_err(Error::Io)?;
        write::bytes(&mut out, &self.wrapped_seed).map_err(Error::Io)?;
        Ok(out)
    }

    fn from_payload(bytes: &[u8], path: &Path) -> Result<Keyfile> {
        let mut src = Cursor::new(bytes);
        let role: KeyRole = read::variant(&mut src)
            .map_err(|_| Error::BadKeyfile { path: path.to_path_buf() })?;
        let public_bytes = read::array::<32>(&mut src)?;
        let public = VerifyingKey::from_bytes(&public_bytes)
            .map_err(|_| Error::BadKeyfile { path: path.to_path_buf() })?;
        let salt = read::array::<SALT_LEN>(&mut src)?;
        let nonce = read::array::<NONCE_LEN>(&mut src)?;
        let wrapped_seed = read::bytes(&mut src)?;
        Ok(Keyfile { role, public, salt, nonce, wrapped_seed })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let payload = self.payload()?;
        let mut out = Vec::new();
        write_artifact(&mut out, ids::KEYFILE, &[], BodyMode::SymWrapped, &payload)?;
        std::fs::write(path, out)
            .map_err(|source| Error::IoPath { path: path.to_path_buf(), source })
    }

    pub fn load(path: &Path) -> Result<Keyfile> {
        let mut file = File::open(path)
            .map_err(|source| Error::IoPath { path: path.to_path_buf(), source })?;
        let (_, payload) = read_artifact(&mut file, ids::KEYFILE, "keyfile", path, None)?;
        Self::from_payload(&payload, path)
    }
}
