//! # Evidence Digests
//!
//! Evidence items carry an integrity hash written as `algorithm:hexdigest`.
//! All four wire algorithms can be computed; md5 and sha1 remain for
//! interoperability with older reporters.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

use crate::error::XarfError;

/// Wire pattern for an evidence hash.
pub const HASH_PATTERN: &str = r"^(md5|sha1|sha256|sha512):[a-fA-F0-9]+$";

static HASH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(HASH_PATTERN).unwrap());

/// Hash algorithm named in an evidence hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

impl HashAlgorithm {
    /// Returns the algorithm identifier string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    /// Length of the hex digest this algorithm produces.
    pub fn hex_len(&self) -> usize {
        match self {
            Self::Md5 => 32,
            Self::Sha1 => 40,
            Self::Sha256 => 64,
            Self::Sha512 => 128,
        }
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = XarfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(Self::Md5),
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            _ => Err(XarfError::Generation(format!(
                "Unsupported hash algorithm: {s}"
            ))),
        }
    }
}

/// Whether `s` is a well-formed `algorithm:hexdigest` evidence hash.
pub fn is_evidence_hash(s: &str) -> bool {
    HASH_RE.is_match(s)
}

/// Lowercase hex digest of `data`.
pub fn hash_hex(data: &[u8], algorithm: HashAlgorithm) -> String {
    let bytes: Vec<u8> = match algorithm {
        HashAlgorithm::Md5 => Md5::digest(data).to_vec(),
        HashAlgorithm::Sha1 => Sha1::digest(data).to_vec(),
        HashAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
        HashAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
    };
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Evidence hash in wire form: `algorithm:hexdigest`.
pub fn evidence_hash(data: &[u8], algorithm: HashAlgorithm) -> String {
    format!("{algorithm}:{}", hash_hex(data, algorithm))
}
