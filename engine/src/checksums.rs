//! Checksum and verification functionality.
//!
//! This module provides:
//! - Multiple checksum algorithms (CRC32, MD5, SHA-256, BLAKE3)
//! - File- and stream-level checksum computation
//! - Constant-time verification against an expected digest
//! - Checksum-file generation/parsing for sidecar manifests
//!
//! Content addressing across the engine (transfer metadata, disk image
//! sidecars, manifest checksums) uses SHA-256 specifically; the other
//! algorithms remain available for the image pipeline's pluggable
//! per-chunk verification, inherited from the teacher's design.

use crate::error::EngineError;
use std::fmt;
use std::io::Read;
use std::path::Path;

/// Supported checksum algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    /// CRC32 (fast, 32-bit)
    Crc32,
    /// MD5 (deprecated, but included for compatibility)
    Md5,
    /// SHA-256 (cryptographic, 256-bit) — the default for content addressing
    Sha256,
    /// BLAKE3 (modern, fast, 256-bit)
    Blake3,
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Crc32 => write!(f, "crc32"),
            Self::Md5 => write!(f, "md5"),
            Self::Sha256 => write!(f, "sha256"),
            Self::Blake3 => write!(f, "blake3"),
        }
    }
}

impl ChecksumAlgorithm {
    /// Parse algorithm from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "crc32" => Some(Self::Crc32),
            "md5" => Some(Self::Md5),
            "sha256" => Some(Self::Sha256),
            "blake3" => Some(Self::Blake3),
            _ => None,
        }
    }
}

/// A computed checksum value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumValue {
    algorithm: ChecksumAlgorithm,
    hex: String,
}

impl ChecksumValue {
    pub fn new(algorithm: ChecksumAlgorithm, hex: String) -> Self {
        ChecksumValue { algorithm, hex }
    }

    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    pub fn hex(&self) -> &str {
        &self.hex
    }

    pub fn to_string_with_algo(&self) -> String {
        format!("{}:{}", self.algorithm, self.hex)
    }
}

impl fmt::Display for ChecksumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hex)
    }
}

/// Trait for computing checksums incrementally over a byte stream.
pub trait ChecksumHasher {
    fn update(&mut self, data: &[u8]);
    fn finalize(self: Box<Self>) -> ChecksumValue;
}

struct Crc32Hasher {
    crc: u32,
}

impl Crc32Hasher {
    fn new() -> Self {
        Crc32Hasher { crc: 0 }
    }
}

impl ChecksumHasher for Crc32Hasher {
    fn update(&mut self, data: &[u8]) {
        for &byte in data {
            let mut crc = self.crc;
            crc ^= byte as u32;
            for _ in 0..8 {
                crc = if crc & 1 == 1 {
                    (crc >> 1) ^ 0xedb88320
                } else {
                    crc >> 1
                };
            }
            self.crc = crc;
        }
    }

    fn finalize(self: Box<Self>) -> ChecksumValue {
        ChecksumValue::new(ChecksumAlgorithm::Crc32, format!("{:08x}", self.crc ^ 0xffffffff))
    }
}

struct Md5Hasher {
    context: md5::Context,
}

impl Md5Hasher {
    fn new() -> Self {
        Md5Hasher { context: md5::Context::new() }
    }
}

impl ChecksumHasher for Md5Hasher {
    fn update(&mut self, data: &[u8]) {
        self.context.consume(data);
    }

    fn finalize(self: Box<Self>) -> ChecksumValue {
        let digest = self.context.compute();
        ChecksumValue::new(ChecksumAlgorithm::Md5, format!("{:x}", digest))
    }
}

struct Sha256Hasher {
    hasher: sha2::Sha256,
}

impl Sha256Hasher {
    fn new() -> Self {
        Sha256Hasher { hasher: sha2::Sha256::default() }
    }
}

impl ChecksumHasher for Sha256Hasher {
    fn update(&mut self, data: &[u8]) {
        use sha2::Digest;
        self.hasher.update(data);
    }

    fn finalize(self: Box<Self>) -> ChecksumValue {
        use sha2::Digest;
        let digest = self.hasher.finalize();
        ChecksumValue::new(ChecksumAlgorithm::Sha256, format!("{:x}", digest))
    }
}

struct Blake3HasherImpl {
    hasher: blake3::Hasher,
}

impl Blake3HasherImpl {
    fn new() -> Self {
        Blake3HasherImpl { hasher: blake3::Hasher::new() }
    }
}

impl ChecksumHasher for Blake3HasherImpl {
    fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    fn finalize(self: Box<Self>) -> ChecksumValue {
        let digest = self.hasher.finalize();
        ChecksumValue::new(ChecksumAlgorithm::Blake3, digest.to_hex().to_string())
    }
}

/// Create a new hasher for the given algorithm
pub fn create_hasher(algorithm: ChecksumAlgorithm) -> Box<dyn ChecksumHasher> {
    match algorithm {
        ChecksumAlgorithm::Crc32 => Box::new(Crc32Hasher::new()),
        ChecksumAlgorithm::Md5 => Box::new(Md5Hasher::new()),
        ChecksumAlgorithm::Sha256 => Box::new(Sha256Hasher::new()),
        ChecksumAlgorithm::Blake3 => Box::new(Blake3HasherImpl::new()),
    }
}

/// Compute a checksum over an arbitrary reader, in 64 KiB frames.
pub fn compute_stream_checksum(
    mut reader: impl Read,
    algorithm: ChecksumAlgorithm,
) -> Result<ChecksumValue, EngineError> {
    let mut hasher = create_hasher(algorithm);
    let mut buffer = [0u8; 65536];
    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hasher.finalize())
}

/// Compute checksum for a file, reading it exactly once.
pub fn compute_file_checksum(path: &Path, algorithm: ChecksumAlgorithm) -> Result<ChecksumValue, EngineError> {
    let file = std::fs::File::open(path).map_err(|e| EngineError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;
    compute_stream_checksum(file, algorithm).map_err(|_| EngineError::ReadError {
        path: path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::Other, "checksum read failed"),
    })
}

/// Constant-time hex-string comparison, so a timing side channel can't
/// reveal how many leading characters of a secret-adjacent checksum
/// (e.g. a manifest integrity tag) matched.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Read `path` once, compute its checksum, and compare against `expected`
/// using a constant-time comparison (spec §4.1 `verify(path, expected)`).
pub fn verify(path: &Path, expected: &str, algorithm: ChecksumAlgorithm) -> Result<bool, EngineError> {
    let actual = compute_file_checksum(path, algorithm)?;
    Ok(constant_time_eq(actual.hex(), expected))
}

/// Generate a checksum file for multiple files.
///
/// Format: "<hex_checksum> <relative_path>" per line
pub fn generate_checksum_file(file_checksums: &[(String, ChecksumValue)], algorithm: ChecksumAlgorithm) -> String {
    let mut result = String::new();
    result.push_str("; Checksum file generated by zim\n");
    result.push_str(&format!("; Algorithm: {}\n", algorithm));
    result.push('\n');

    for (rel_path, checksum) in file_checksums {
        result.push_str(&format!("{} {}\n", checksum.hex(), rel_path));
    }

    result
}

/// Parse and verify a checksum file.
///
/// Returns list of (relative_path, expected_checksum, actual_checksum, matches)
pub fn verify_checksum_file(
    checksum_content: &str,
    file_get_checksum: impl Fn(&str) -> Result<ChecksumValue, EngineError>,
) -> Result<Vec<(String, ChecksumValue, ChecksumValue, bool)>, EngineError> {
    let mut results = Vec::new();

    for line in checksum_content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') {
            continue;
        }

        let parts: Vec<&str> = line.splitn(2, ' ').collect();
        if parts.len() != 2 {
            continue;
        }

        let expected_hex = parts[0];
        let rel_path = parts[1];

        let actual = file_get_checksum(rel_path)?;
        let matches = constant_time_eq(actual.hex(), expected_hex);
        let expected = ChecksumValue::new(actual.algorithm(), expected_hex.to_string());
        results.push((rel_path.to_string(), expected, actual, matches));
    }

    Ok(results)
}
