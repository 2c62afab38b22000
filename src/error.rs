//! Error types shared across the crate.
//!
//! Every recoverable failure is reported as an [`Error`]. Each variant maps
//! to a stable identifier (see [`Error::id`]) so callers and scripts can
//! pattern-match on it regardless of the display text. Scanning errors are
//! queued and the scan continues; envelope and crypto errors abort the
//! current artifact; invariant violations panic.

use std::path::PathBuf;

use thiserror::Error;

/// Result of fallible operations with error type [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    // ---- envelope ----
    /// The file header identifier does not name the expected artifact.
    #[error("file is not a valid {expected} file")]
    BadMagic { expected: &'static str, path: PathBuf },
    /// The artifact version is not the supported fixed version.
    #[error("unsupported file version {found:#010x}")]
    WrongVersion { found: u32, path: PathBuf },
    /// The signature over the artifact body failed to verify.
    #[error("signature verification failed")]
    BadSignature { path: PathBuf },
    /// The artifact body ended before its declared length.
    #[error("file is truncated or corrupt")]
    Truncated { path: PathBuf },
    /// An unknown encoding tag in the file header.
    #[error("unknown archive encoding {0}")]
    BadEncoding(u32),

    // ---- I/O ----
    #[error("I/O error")]
    Io(#[from] std::io::Error),
    #[error("cannot access {path}")]
    IoPath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ---- crypto ----
    /// The supplied passphrase does not unwrap the private key.
    #[error("incorrect passphrase")]
    WrongPassphrase,
    /// An artifact was signed with a key other than the configured one.
    #[error("key mismatch: file was not signed with the expected key")]
    KeyMismatch { path: PathBuf },
    /// The keyfile contents are not a valid key record.
    #[error("invalid keyfile")]
    BadKeyfile { path: PathBuf },

    // ---- policy ----
    #[error("policy parse error at line {line}: {msg}")]
    PolicyParse { line: usize, msg: String },
    #[error("unrecognized property mask character '{0}'")]
    BadMaskChar(char),
    #[error("undefined policy variable $({0})")]
    UndefinedVariable(String),
    #[error("policy path is not absolute: {0}")]
    PathNotAbsolute(String),

    // ---- semantic ----
    #[error("cannot compute {0} digests on this build")]
    HashUnsupported(&'static str),
    #[error("object is not in the database: {0}")]
    NotInDatabase(String),
    #[error("stored and live values conflict for {0}")]
    UpdateConflict(String),
    #[error("unknown genre {0:#06x}")]
    UnknownGenre(u32),

    // ---- database ----
    #[error("database block {block} failed its checksum")]
    BlockCrc { block: u32 },
    #[error("database block {block} has an invalid type tag")]
    BadBlockKind { block: u32 },
    #[error("database free list is corrupt")]
    BadFreeList,
    #[error("database is locked by another process")]
    DatabaseLocked { path: PathBuf },

    // ---- config ----
    #[error("config parse error: {0}")]
    ConfigParse(String),

    // ---- viewer ----
    #[error("unrecognized line {line} in edited report")]
    AcceptParse { line: usize },
    #[error("editor exited with failure")]
    EditorFailed,

    // ---- wire ----
    #[error("malformed field on the wire: {0}")]
    WireFormat(&'static str),
}

impl Error {
    /// Stable, documented identifier for scripting against error output.
    pub fn id(&self) -> &'static str {
        match self {
            Error::BadMagic { .. } => "ENVELOPE_BAD_MAGIC",
            Error::WrongVersion { .. } => "ENVELOPE_BAD_VERSION",
            Error::BadSignature { .. } => "ENVELOPE_BAD_SIGNATURE",
            Error::Truncated { .. } => "ENVELOPE_TRUNCATED",
            Error::BadEncoding(_) => "ENVELOPE_BAD_ENCODING",
            Error::Io(_) => "IO_ERROR",
            Error::IoPath { .. } => "IO_ERROR",
            Error::WrongPassphrase => "CRYPTO_BAD_PASSPHRASE",
            Error::KeyMismatch { .. } => "CRYPTO_KEY_MISMATCH",
            Error::BadKeyfile { .. } => "CRYPTO_BAD_KEYFILE",
            Error::PolicyParse { .. } => "POLICY_PARSE",
            Error::BadMaskChar(_) => "POLICY_BAD_MASK_CHAR",
            Error::UndefinedVariable(_) => "POLICY_UNDEFINED_VARIABLE",
            Error::PathNotAbsolute(_) => "POLICY_PATH_NOT_ABSOLUTE",
            Error::HashUnsupported(_) => "SIG_UNSUPPORTED",
            Error::NotInDatabase(_) => "DB_OBJECT_MISSING",
            Error::UpdateConflict(_) => "POLICY_UPDATE_CONFLICT",
            Error::UnknownGenre(_) => "BAD_GENRE",
            Error::BlockCrc { .. } => "DB_BLOCK_CRC",
            Error::BadBlockKind { .. } => "DB_BLOCK_KIND",
            Error::BadFreeList => "DB_FREE_LIST",
            Error::DatabaseLocked { .. } => "DB_LOCKED",
            Error::ConfigParse(_) => "CONFIG_PARSE",
            Error::AcceptParse { .. } => "REPORT_ACCEPT_PARSE",
            Error::EditorFailed => "REPORT_EDITOR_FAILED",
            Error::WireFormat(_) => "WIRE_FORMAT",
        }
    }

    /// Fatal errors abort the whole operation; the rest are queued and the
    /// scan continues.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::Io(_)
                | Error::IoPath { .. }
                | Error::NotInDatabase(_)
                | Error::UpdateConflict(_)
                | Error::HashUnsupported(_)
        )
    }

    /// The path or name the error is about, when there is one.
    pub fn extra(&self) -> Option<String> {
        match self {
            Error::BadMagic { path, .. }
            | Error::WrongVersion { path, .. }
            | Error::BadSignature { path }
            | Error::Truncated { path }
            | Error::KeyMismatch { path }
            | Error::BadKeyfile { path }
            | Error::DatabaseLocked { path }
            | Error::IoPath { path, .. } => Some(path.display().to_string()),
            Error::NotInDatabase(name)
            | Error::UpdateConflict(name)
            | Error::PathNotAbsolute(name)
            | Error::UndefinedVariable(name) => Some(name.clone()),
            _ => None,
        }
    }
}

/// A stored snapshot of an [`Error`], suitable for queueing inside reports.
///
/// [`Error`] itself is not `Clone` (it may wrap `std::io::Error`), so error
/// queues keep this flattened form, which is also what goes on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub id: String,
    pub msg: String,
    pub extra: Option<String>,
    pub fatal: bool,
    /// Skip the extra line when the message already names it.
    pub suppress_extra: bool,
}

impl ErrorInfo {
    pub fn of(err: &Error) -> Self {
        let msg = err.to_string();
        let extra = err.extra();
        let suppress_extra =
            extra.as_deref().map(|e| msg.contains(e)).unwrap_or(false);
        Self { id: err.id().to_owned(), msg, extra, fatal: err.is_fatal(), suppress_extra }
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.extra {
            Some(extra) if !self.suppress_extra => {
                write!(f, "{}: {} ({})", self.id, self.msg, extra)
            }
            _ => write!(f, "{}: {}", self.id, self.msg),
        }
    }
}
