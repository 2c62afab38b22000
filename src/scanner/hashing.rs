//! Content digests, computed in a single pass.
//!
//! The file is streamed once; every requested algorithm is fed from the
//! same buffer. HAVAL digests stored by older baselines still compare and
//! round-trip, but no implementation exists here to compute fresh ones, so
//! a request for it is refused up front.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use md5::Digest as _;

use crate::fco::prop::{HashAlgo, HashValue};

const CHUNK: usize = 64 * 1024;

enum HashState {
    Crc32(crc32fast::Hasher),
    Md5(md5::Md5),
    Sha1(sha1::Sha1),
}

impl HashState {
    fn new(algo: HashAlgo) -> Option<HashState> {
        match algo {
            HashAlgo::Crc32 => Some(HashState::Crc32(crc32fast::Hasher::new())),
            HashAlgo::Md5 => Some(HashState::Md5(md5::Md5::new())),
            HashAlgo::Sha1 => Some(HashState::Sha1(sha1::Sha1::new())),
            HashAlgo::Haval => None,
        }
    }

    fn update(&mut self, chunk: &[u8]) {
        match self {
            HashState::Crc32(h) => h.update(chunk),
            HashState::Md5(h) => h.update(chunk),
            HashState::Sha1(h) => h.update(chunk),
        }
    }

    fn finish(self, algo: HashAlgo) -> HashValue {
        let bytes = match self {
            HashState::Crc32(h) => h.finalize().to_be_bytes().to_vec(),
            HashState::Md5(h) => h.finalize().to_vec(),
            HashState::Sha1(h) => h.finalize().to_vec(),
        };
        HashValue::new(algo, bytes)
    }
}

/// Whether fresh digests of this algorithm can be produced.
pub fn computable(algo: HashAlgo) -> bool {
    algo != HashAlgo::Haval
}

/// Streams `path` once and returns a digest per requested algorithm, in
/// request order.
///
/// When `drop_cache` is set, the kernel is advised to evict the pages the
/// read pulled in, limiting the scan's cache footprint.
pub fn hash_file(path: &Path, algos: &[HashAlgo], drop_cache: bool) -> io::Result<Vec<HashValue>> {
    debug_assert!(algos.iter().all(|a| computable(*a)));

    let mut file = File::open(path)?;
    let mut states: Vec<(HashAlgo, HashState)> = algos
        .iter()
        .filter_map(|algo| HashState::new(*algo).map(|state| (*algo, state)))
        .collect();

    let mut buf = vec![0u8; CHUNK];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        for (_, state) in states.iter_mut() {
            state.update(&buf[..n]);
        }
    }

    if drop_cache {
        advise_drop_cache(&file);
    }

    Ok(states.into_iter().map(|(algo, state)| state.finish(algo)).collect())
}

#[cfg(target_os = "linux")]
fn advise_drop_cache(file: &File) {
    use std::os::unix::io::AsRawFd;
    // advisory only; a failure changes nothing about the digest
    unsafe {
        libc::posix_fadvise(file.as_raw_fd(), 0, 0, libc::POSIX_FADV_DONTNEED);
    }
}

#[cfg(not(target_os = "linux"))]
fn advise_drop_cache(_file: &File) {}
