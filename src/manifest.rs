use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

use crate::config::{Mode, Symbology};
use crate::error::{MosaicError, Result};

pub const MANIFEST_VERSION: u32 = 1;

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

#[derive(Debug, Clone, Serialize)]
pub struct ManifestChunk {
    pub index: usize,
    /// Archive volume name; absent in whole-file mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
    pub image: String,
    pub size: usize,
    pub sha256: String,
}

/// Sidecar describing how a set of images reassembles into the input.
#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub version: u32,
    pub source_name: String,
    pub source_size: u64,
    pub symbology: Symbology,
    pub mode: Mode,
    pub compressed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub splitter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<usize>,
    /// True when encoding stopped before every chunk was rendered.
    pub incomplete: bool,
    pub chunks: Vec<ManifestChunk>,
    /// Digest of the encoded payload, or of all volumes concatenated.
    pub sha256: String,
}

impl Manifest {
    pub fn file_name(stem: &str) -> String {
        format!("{}.manifest.json", stem)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|e| MosaicError::io("write manifest", path, e))
    }
}
