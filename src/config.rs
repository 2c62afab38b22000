//! Tool configuration, carried as TOML source inside a site-signed
//! container.
//!
//! The config artifact embeds the site public key in its header baggage,
//! so the file verifies without a keyfile on disk, and a config written
//! for a different site key is detected by comparing the embedded key
//! against the configured one.

use std::fs::File;
use std::path::{Path, PathBuf};

use ed25519_dalek::{SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::archive::envelope::{read_artifact_keyed, write_artifact, BodyMode};
use crate::archive::{ids, CONFIG_MAGIC};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub site_keyfile: PathBuf,
    pub local_keyfile: PathBuf,
    pub policy_file: PathBuf,
    pub database_file: PathBuf,
    pub report_dir: PathBuf,
    /// Editor launched for interactive updates; `$VISUAL`/`$EDITOR` win
    /// over this when set.
    pub editor: String,
    /// `hex` or `base64` digest rendering in text output.
    pub hash_display: String,
    /// Default reporting level (0-4).
    pub report_level: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site_keyfile: PathBuf::from("site.key"),
            local_keyfile: PathBuf::from("local.key"),
            policy_file: PathBuf::from("verity.pol"),
            database_file: PathBuf::from("verity.twd"),
            report_dir: PathBuf::from("."),
            editor: "vi".to_owned(),
            hash_display: "hex".to_owned(),
            report_level: 3,
        }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Config> {
        toml::from_str(text).map_err(|e| Error::ConfigParse(e.to_string()))
    }

    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).expect("config serializes")
    }
}

/// Writes the signed config artifact.
pub fn save_config(path: &Path, config: &Config, site_key: &SigningKey) -> Result<()> {
    let mut payload = CONFIG_MAGIC.to_vec();
    payload.extend_from_slice(config.to_toml().as_bytes());
    let baggage = site_key.verifying_key().to_bytes().to_vec();
    let mut out = Vec::new();
    write_artifact(&mut out, ids::CONFIG, &baggage, BodyMode::Signed(site_key), &payload)?;
    std::fs::write(path, out)
        .map_err(|source| Error::IoPath { path: path.to_path_buf(), source })
}

/// Reads and verifies the signed config artifact.
///
/// Verification uses the public key embedded in the header baggage. When
/// `expected_site` is supplied, a baggage key that differs from it is
/// reported as a key mismatch.
pub fn load_config(path: &Path, expected_site: Option<&VerifyingKey>) -> Result<Config> {
    let mut file = File::open(path)
        .map_err(|source| Error::IoPath { path: path.to_path_buf(), source })?;
    let (_, payload) = read_artifact_keyed(&mut file, ids::CONFIG, "config", path, |header| {
        let bytes: [u8; 32] = header
            .baggage
            .as_slice()
            .try_into()
            .map_err(|_| Error::BadMagic { expected: "config", path: path.to_path_buf() })?;
        let embedded = VerifyingKey::from_bytes(&bytes)
            .map_err(|_| Error::BadMagic { expected: "config", path: path.to_path_buf() })?;
        if let Some(expected) = expected_site {
            if &embedded != expected {
                return Err(Error::KeyMismatch { path: path.to_path_buf() });
            }
        }
        Ok(Some(embedded))
    })?;

    let text = payload
        .strip_prefix(CONFIG_MAGIC.as_slice())
        .ok_or(Error::BadMagic { expected: "config", path: path.to_path_buf() })?;
    let text = std::str::from_utf8(text)
        .map_err(|_| Error::ConfigParse("config text is not UTF-8".to_owned()))?;
    Config::from_toml(text)
}
