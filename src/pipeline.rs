use log::{error, info, warn};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;

use crate::barcode::{encode, image_file_name, ChunkSource, EncodedImage};
use crate::compress::{compress_if_smaller, CompressedPayload};
use crate::config::{Mode, PipelineConfig};
use crate::error::{MosaicError, Result};
use crate::manifest::{sha256_hex, Manifest, ManifestChunk, MANIFEST_VERSION};
use crate::split::{input_name, splitter_for, Chunk, Splitter};

#[derive(Debug, Clone)]
pub struct InputArtifact {
    pub path: PathBuf,
    /// File length, or the sum of regular files under a directory.
    pub size: u64,
    pub is_dir: bool,
}

impl InputArtifact {
    /// Resolves `path` first, so `.` or `dir/..` get a real name and parent.
    pub fn open(path: &Path) -> Result<Self> {
        let path = &fs::canonicalize(path)
            .map_err(|e| MosaicError::io("resolve input", path, e))?;
        let meta = fs::metadata(path).map_err(|e| MosaicError::io("stat input", path, e))?;

        let size = if meta.is_dir() {
            let mut total = 0u64;
            for entry in WalkDir::new(path) {
                let entry = entry.map_err(|e| MosaicError::io("walk input", path, e.into()))?;
                if entry.file_type().is_file() {
                    total += entry.metadata().map_err(|e| {
                        MosaicError::io("stat input", entry.path(), e.into())
                    })?.len();
                }
            }
            total
        } else {
            meta.len()
        };

        Ok(InputArtifact {
            path: path.to_path_buf(),
            size,
            is_dir: meta.is_dir(),
        })
    }

    /// Directory the outputs land in: the one holding the input.
    pub fn parent_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn stem(&self) -> Result<String> {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                MosaicError::InvalidInput(format!("invalid file name: {}", self.path.display()))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Done,
    /// Encoding stopped at `chunk`; images before it were kept.
    PartiallyFailed { chunk: usize, reason: String },
}

#[derive(Debug)]
pub struct RunReport {
    pub mode: Mode,
    pub status: RunStatus,
    pub images: Vec<EncodedImage>,
    /// Archive volumes kept next to the input.
    pub volumes: Vec<PathBuf>,
    pub manifest: Option<PathBuf>,
    pub total_chunks: usize,
    pub payload_size: usize,
    pub compressed: bool,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Done
    }
}

pub fn run(config: &PipelineConfig) -> Result<RunReport> {
    let splitter = splitter_for(config.splitter, &config.archiver);
    run_with_splitter(config, splitter.as_ref())
}

pub fn run_with_splitter(config: &PipelineConfig, splitter: &dyn Splitter) -> Result<RunReport> {
    let input = InputArtifact::open(&config.input)?;
    info!(
        "Input {} ({} bytes{})",
        input.path.display(),
        input.size,
        if input.is_dir { ", directory" } else { "" }
    );

    match config.mode {
        Mode::Whole => encode_whole(config, &input),
        Mode::Chunked => {
            if config.output.is_some() {
                return Err(MosaicError::InvalidInput(
                    "an output path override only applies to whole-file mode".to_string(),
                ));
            }
            encode_chunked(config, &input, splitter)
        }
    }
}

fn encode_whole(config: &PipelineConfig, input: &InputArtifact) -> Result<RunReport> {
    if input.is_dir {
        return Err(MosaicError::InvalidInput(format!(
            "{} is a directory; whole-file mode needs a regular file (use chunked mode)",
            input.path.display()
        )));
    }

    let data = fs::read(&input.path).map_err(|e| MosaicError::io("read input", &input.path, e))?;
    let payload = if config.compress {
        compress_if_smaller(&data)?
    } else {
        let len = data.len();
        CompressedPayload {
            bytes: data,
            was_compressed: false,
            original_len: len,
            compressed_len: len,
        }
    };

    let stem = input.stem()?;
    let symbology = config.encoder.symbology;
    let output_path = match &config.output {
        Some(path) => path.clone(),
        None => input
            .parent_dir()
            .join(image_file_name(&stem, symbology, payload.was_compressed)),
    };
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| MosaicError::io("create output dir", parent, e))?;
    }

    let image = encode(&payload.bytes, &config.encoder, &output_path, ChunkSource::Whole)
        .inspect_err(|e| error!("Failed to encode {} bytes: {}", payload.bytes.len(), e))?;
    info!("{} code saved to {}", symbology, image.path.display());

    let manifest = if config.write_manifest {
        let digest = sha256_hex(&payload.bytes);
        let manifest = Manifest {
            version: MANIFEST_VERSION,
            source_name: input_name(&input.path)?,
            source_size: input.size,
            symbology,
            mode: Mode::Whole,
            compressed: payload.was_compressed,
            splitter: None,
            chunk_size: None,
            incomplete: false,
            chunks: vec![ManifestChunk {
                index: 0,
                volume: None,
                image: file_name_of(&image.path),
                size: payload.bytes.len(),
                sha256: digest.clone(),
            }],
            sha256: digest,
        };
        let dir = match output_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let path = dir.join(Manifest::file_name(&stem));
        manifest.write(&path)?;
        Some(path)
    } else {
        None
    };

    Ok(RunReport {
        mode: Mode::Whole,
        status: RunStatus::Done,
        images: vec![image],
        volumes: Vec::new(),
        manifest,
        total_chunks: 1,
        payload_size: payload.bytes.len(),
        compressed: payload.was_compressed,
    })
}

/// Returns the path handed to the splitter and whether it was compressed.
fn precompress(input: &InputArtifact, scratch: &Path) -> Result<(PathBuf, bool)> {
    if input.is_dir {
        warn!(
            "Compression before splitting only applies to files; splitting {} as is",
            input.path.display()
        );
        return Ok((input.path.clone(), false));
    }

    let data = fs::read(&input.path).map_err(|e| MosaicError::io("read input", &input.path, e))?;
    let payload = compress_if_smaller(&data)?;
    if !payload.was_compressed {
        return Ok((input.path.clone(), false));
    }

    let path = scratch.join(format!("{}.zlib", input_name(&input.path)?));
    fs::write(&path, &payload.bytes).map_err(|e| MosaicError::io("write scratch", &path, e))?;
    Ok((path, true))
}

fn encode_chunked(
    config: &PipelineConfig,
    input: &InputArtifact,
    splitter: &dyn Splitter,
) -> Result<RunReport> {
    // Dropped at the end of the run, taking unretained volumes with it.
    let scratch = TempDir::new()?;
    let volumes_dir = scratch.path().join("volumes");
    let images_dir = scratch.path().join("images");
    fs::create_dir_all(&volumes_dir)?;
    fs::create_dir_all(&images_dir)?;

    let (split_input, compressed) = if config.compress_before_split {
        precompress(input, scratch.path())?
    } else {
        (input.path.clone(), false)
    };

    let chunks = splitter.split(&split_input, config.chunk_size, &volumes_dir)?;
    let total = chunks.len();
    let symbology = config.encoder.symbology;
    info!("Split into {} chunk(s) with the {} splitter", total, splitter.name());

    let mut images = Vec::with_capacity(total);
    let mut status = RunStatus::Done;
    for chunk in &chunks {
        let name = image_file_name(&chunk.file_name(), symbology, false);
        let path = images_dir.join(&name);
        match encode(&chunk.data, &config.encoder, &path, ChunkSource::Chunk(chunk.index)) {
            Ok(image) => {
                info!("Generated {} code {}/{}: {}", symbology, chunk.index + 1, total, name);
                images.push(image);
            }
            Err(e) => {
                let reason = format!(
                    "chunk {} ({}, {} bytes): {}",
                    chunk.index,
                    chunk.file_name(),
                    chunk.data.len(),
                    e
                );
                error!("Stopping at {}", reason);
                status = RunStatus::PartiallyFailed {
                    chunk: chunk.index,
                    reason,
                };
                break;
            }
        }
    }

    let dest = input.parent_dir();
    for image in &mut images {
        image.path = relocate(&image.path, &dest)?;
    }

    let mut volumes = Vec::new();
    if config.retain_volumes {
        for chunk in &chunks {
            volumes.push(relocate(&chunk.path, &dest)?);
        }
    }

    let manifest = if config.write_manifest {
        let path = dest.join(Manifest::file_name(&input.stem()?));
        chunk_manifest(config, input, splitter, &chunks, &images, compressed, &status)
            .and_then(|m| m.write(&path))?;
        Some(path)
    } else {
        None
    };

    Ok(RunReport {
        mode: Mode::Chunked,
        status,
        images,
        volumes,
        manifest,
        total_chunks: total,
        payload_size: chunks.iter().map(|c| c.data.len()).sum(),
        compressed,
    })
}

fn chunk_manifest(
    config: &PipelineConfig,
    input: &InputArtifact,
    splitter: &dyn Splitter,
    chunks: &[Chunk],
    images: &[EncodedImage],
    compressed: bool,
    status: &RunStatus,
) -> Result<Manifest> {
    let mut hasher = Sha256::new();
    for chunk in chunks {
        hasher.update(&chunk.data);
    }

    let entries = chunks
        .iter()
        .zip(images)
        .map(|(chunk, image)| ManifestChunk {
            index: chunk.index,
            volume: Some(chunk.file_name()),
            image: file_name_of(&image.path),
            size: chunk.data.len(),
            sha256: sha256_hex(&chunk.data),
        })
        .collect();

    Ok(Manifest {
        version: MANIFEST_VERSION,
        source_name: input_name(&input.path)?,
        source_size: input.size,
        symbology: config.encoder.symbology,
        mode: Mode::Chunked,
        compressed,
        splitter: Some(splitter.name().to_string()),
        chunk_size: Some(config.chunk_size),
        incomplete: *status != RunStatus::Done,
        chunks: entries,
        sha256: hex::encode(hasher.finalize()),
    })
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Move `src` into `dest_dir`, replacing any file already there.
pub fn relocate(src: &Path, dest_dir: &Path) -> Result<PathBuf> {
    let name = src.file_name().ok_or_else(|| {
        MosaicError::InvalidInput(format!("cannot relocate {}", src.display()))
    })?;
    let dest = dest_dir.join(name);

    if dest.is_file() {
        fs::remove_file(&dest).map_err(|e| MosaicError::io("replace existing file", &dest, e))?;
    }

    // Scratch usually lives on another filesystem, where rename fails.
    if fs::rename(src, &dest).is_err() {
        fs::copy(src, &dest).map_err(|e| MosaicError::io("copy output", &dest, e))?;
        fs::remove_file(src).map_err(|e| MosaicError::io("remove scratch file", src, e))?;
    }

    Ok(dest)
}
