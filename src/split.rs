use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use walkdir::WalkDir;

use crate::config::{SplitterKind, DEFAULT_ARCHIVE_FORMAT};
use crate::error::{MosaicError, Result};

pub const BUNDLE_MAGIC: &[u8; 4] = b"MSB1";
pub const BUNDLE_EXTENSION: &str = "bundle";

#[derive(Debug, Clone)]
pub struct Chunk {
    pub index: usize,
    /// Volume file the bytes were read from.
    pub path: PathBuf,
    pub data: Vec<u8>,
}

impl Chunk {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("chunk.{:03}", self.index))
    }
}

/// Splits a file or directory into ordered volumes of at most `chunk_size`
/// bytes, written under `scratch`.
pub trait Splitter {
    fn name(&self) -> &'static str;

    fn split(&self, input: &Path, chunk_size: usize, scratch: &Path) -> Result<Vec<Chunk>>;
}

pub fn splitter_for(kind: SplitterKind, archiver: &str) -> Box<dyn Splitter> {
    match kind {
        SplitterKind::External => Box::new(ExternalArchiver::new(archiver)),
        SplitterKind::Bundle => Box::new(BundleSplitter),
    }
}

pub(crate) fn input_name(input: &Path) -> Result<String> {
    input
        .file_name()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            MosaicError::InvalidInput(format!("invalid file name: {}", input.display()))
        })
}

fn check_chunk_size(chunk_size: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(MosaicError::InvalidInput(
            "chunk size must be at least 1 byte".to_string(),
        ));
    }
    Ok(())
}

/// Read every file in `dir` whose name starts with `prefix`, in lexical order.
pub fn collect_volumes(dir: &Path, prefix: &str) -> Result<Vec<Chunk>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| MosaicError::io("read scratch dir", dir, e))? {
        let entry = entry?;
        let is_volume = entry.file_type()?.is_file()
            && entry.file_name().to_string_lossy().starts_with(prefix);
        if is_volume {
            paths.push(entry.path());
        }
    }
    paths.sort();

    paths
        .into_iter()
        .enumerate()
        .map(|(index, path)| {
            let data = fs::read(&path).map_err(|e| MosaicError::io("read volume", &path, e))?;
            Ok(Chunk { index, path, data })
        })
        .collect()
}

pub struct ExternalArchiver {
    pub program: String,
    pub format: String,
}

impl ExternalArchiver {
    pub fn new(program: impl Into<String>) -> Self {
        ExternalArchiver {
            program: program.into(),
            format: DEFAULT_ARCHIVE_FORMAT.to_string(),
        }
    }

    fn failure(&self, status: impl Into<String>, diagnostics: impl Into<String>) -> MosaicError {
        MosaicError::ExternalToolFailure {
            program: self.program.clone(),
            status: status.into(),
            diagnostics: diagnostics.into(),
        }
    }
}

impl Splitter for ExternalArchiver {
    fn name(&self) -> &'static str {
        "external"
    }

    fn split(&self, input: &Path, chunk_size: usize, scratch: &Path) -> Result<Vec<Chunk>> {
        check_chunk_size(chunk_size)?;

        let archive_name = format!("{}.{}", input_name(input)?, self.format);
        let archive_path = scratch.join(&archive_name);

        info!(
            "Running {} to split {} into {}-byte volumes",
            self.program,
            input.display(),
            chunk_size
        );

        // Blocks until the archiver exits. There is no timeout.
        let output = Command::new(&self.program)
            .arg("a")
            .arg(format!("-t{}", self.format))
            .arg(format!("-v{}b", chunk_size))
            .arg("-y")
            .arg(&archive_path)
            .arg(input)
            .output()
            .map_err(|e| self.failure("not started", e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let diagnostics = if stderr.is_empty() {
                String::from_utf8_lossy(&output.stdout).trim().to_string()
            } else {
                stderr
            };
            return Err(self.failure(output.status.to_string(), diagnostics));
        }

        let chunks = collect_volumes(scratch, &archive_name)?;
        if chunks.is_empty() {
            return Err(self.failure(
                output.status.to_string(),
                format!("no volumes named {}* were produced", archive_name),
            ));
        }
        if let Some(oversize) = chunks.iter().find(|c| c.data.len() > chunk_size) {
            return Err(self.failure(
                output.status.to_string(),
                format!(
                    "volume {} is {} bytes, over the {}-byte limit",
                    oversize.file_name(),
                    oversize.data.len(),
                    chunk_size
                ),
            ));
        }

        debug!("{} produced {} volume(s)", self.program, chunks.len());
        Ok(chunks)
    }
}

/// In-process splitter. Serializes the input into a bundle stream and cuts it
/// into numbered volumes.
///
/// Bundle layout: `MSB1`, then per file
/// `[u16 BE path len] [UTF-8 relative path] [u64 BE content len] [content]`.
pub struct BundleSplitter;

fn relative_name(path: &Path, base: &Path) -> Result<String> {
    let rel = path.strip_prefix(base).unwrap_or(path);
    let parts: Option<Vec<&str>> = rel.components().map(|c| c.as_os_str().to_str()).collect();
    parts.map(|p| p.join("/")).ok_or_else(|| {
        MosaicError::InvalidInput(format!("non UTF-8 path: {}", path.display()))
    })
}

pub fn bundle(input: &Path) -> Result<Vec<u8>> {
    let base = input.parent().unwrap_or_else(|| Path::new(""));
    let mut out = BUNDLE_MAGIC.to_vec();

    let walker = WalkDir::new(input).sort_by_file_name();
    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_default();
            MosaicError::io("walk input", path, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let name = relative_name(entry.path(), base)?;
        let name_len = u16::try_from(name.len()).map_err(|_| {
            MosaicError::InvalidInput(format!("path too long for bundle: {}", name))
        })?;
        let content =
            fs::read(entry.path()).map_err(|e| MosaicError::io("read input", entry.path(), e))?;

        out.extend_from_slice(&name_len.to_be_bytes());
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(&(content.len() as u64).to_be_bytes());
        out.extend_from_slice(&content);
    }

    Ok(out)
}

pub fn unbundle(bytes: &[u8]) -> Result<Vec<(String, Vec<u8>)>> {
    let truncated = || MosaicError::InvalidInput("truncated bundle".to_string());

    if !bytes.starts_with(BUNDLE_MAGIC) {
        return Err(MosaicError::InvalidInput("not a bundle stream".to_string()));
    }

    let mut entries = Vec::new();
    let mut pos = BUNDLE_MAGIC.len();
    while pos < bytes.len() {
        let name_len = bytes.get(pos..pos + 2).ok_or_else(truncated)?;
        let name_len = u16::from_be_bytes([name_len[0], name_len[1]]) as usize;
        pos += 2;

        let name = bytes.get(pos..pos + name_len).ok_or_else(truncated)?;
        let name = std::str::from_utf8(name)
            .map_err(|_| MosaicError::InvalidInput("bundle path is not UTF-8".to_string()))?
            .to_string();
        pos += name_len;

        let len_bytes = bytes.get(pos..pos + 8).ok_or_else(truncated)?;
        let mut len = [0u8; 8];
        len.copy_from_slice(len_bytes);
        let len = usize::try_from(u64::from_be_bytes(len)).map_err(|_| truncated())?;
        pos += 8;

        let end = pos.checked_add(len).ok_or_else(truncated)?;
        let content = bytes.get(pos..end).ok_or_else(truncated)?;
        pos = end;

        entries.push((name, content.to_vec()));
    }

    Ok(entries)
}

impl Splitter for BundleSplitter {
    fn name(&self) -> &'static str {
        "bundle"
    }

    fn split(&self, input: &Path, chunk_size: usize, scratch: &Path) -> Result<Vec<Chunk>> {
        check_chunk_size(chunk_size)?;

        let stream = bundle(input)?;
        let prefix = format!("{}.{}", input_name(input)?, BUNDLE_EXTENSION);

        let count = stream.len().div_ceil(chunk_size).max(1);
        // Zero-padded so lexical order matches volume order.
        let width = (count - 1).to_string().len().max(3);

        info!(
            "Bundled {} into {} bytes, {} volume(s)",
            input.display(),
            stream.len(),
            count
        );

        let mut chunks = Vec::with_capacity(count);
        for (index, piece) in stream.chunks(chunk_size).enumerate() {
            let path = scratch.join(format!("{}.{:0width$}", prefix, index, width = width));
            fs::write(&path, piece).map_err(|e| MosaicError::io("write volume", &path, e))?;
            chunks.push(Chunk {
                index,
                path,
                data: piece.to_vec(),
            });
        }

        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_tree(root: &Path) -> PathBuf {
        let dir = root.join("docs");
        fs::create_dir_all(dir.join("nested")).unwrap();
        fs::write(dir.join("a.txt"), b"alpha").unwrap();
        fs::write(dir.join("nested").join("b.bin"), vec![9u8; 5000]).unwrap();
        dir
    }

    #[test]
    fn test_bundle_roundtrip() {
        let root = TempDir::new().unwrap();
        let dir = sample_tree(root.path());

        let entries = unbundle(&bundle(&dir).unwrap()).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], ("docs/a.txt".to_string(), b"alpha".to_vec()));
        assert_eq!(entries[1].0, "docs/nested/b.bin");
        assert_eq!(entries[1].1, vec![9u8; 5000]);
    }

    #[test]
    fn test_bundle_volumes_reassemble() {
        let root = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        let dir = sample_tree(root.path());

        let chunks = BundleSplitter.split(&dir, 700, scratch.path()).unwrap();
        let expected = bundle(&dir).unwrap();

        assert_eq!(chunks.len(), expected.len().div_ceil(700));
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
            assert!(chunk.data.len() <= 700);
        }
        assert_eq!(chunks[0].file_name(), "docs.bundle.000");

        let joined: Vec<u8> = chunks.iter().flat_map(|c| c.data.clone()).collect();
        assert_eq!(joined, expected);

        let reread = collect_volumes(scratch.path(), "docs.bundle").unwrap();
        assert_eq!(reread.len(), chunks.len());
        assert_eq!(reread.last().unwrap().data, chunks.last().unwrap().data);
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let root = TempDir::new().unwrap();
        let file = root.path().join("f.txt");
        fs::write(&file, b"x").unwrap();

        assert!(matches!(
            BundleSplitter.split(&file, 0, root.path()),
            Err(MosaicError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_unbundle_rejects_truncated() {
        let root = TempDir::new().unwrap();
        let file = root.path().join("f.txt");
        fs::write(&file, b"hello world").unwrap();

        let stream = bundle(&file).unwrap();
        assert!(unbundle(&stream[..stream.len() - 3]).is_err());
        assert!(unbundle(b"nope").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_external_archiver_failure_is_fatal() {
        let root = TempDir::new().unwrap();
        let file = root.path().join("f.txt");
        fs::write(&file, b"x").unwrap();

        let err = ExternalArchiver::new("false")
            .split(&file, 100, root.path())
            .unwrap_err();

        match err {
            MosaicError::ExternalToolFailure { program, .. } => assert_eq!(program, "false"),
            other => panic!("unexpected error: {}", other),
        }
    }

    /// Writes an executable `sh` script standing in for 7z. The archive path
    /// is its fifth argument, exposed to `body` as `$archive`.
    #[cfg(unix)]
    fn fake_archiver(dir: &Path, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-7z");
        fs::write(&path, format!("#!/bin/sh\narchive=\"$5\"\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[cfg(unix)]
    fn input_file(root: &Path) -> PathBuf {
        let file = root.join("f.txt");
        fs::write(&file, b"payload").unwrap();
        file
    }

    #[cfg(unix)]
    #[test]
    fn test_external_archiver_collects_sorted_volumes() {
        let root = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        let program = fake_archiver(
            root.path(),
            "printf 'second' > \"$archive.002\"\n\
             printf 'first' > \"$archive.001\"\n\
             printf 'x' > \"$(dirname \"$archive\")/unrelated.txt\"",
        );

        let chunks = ExternalArchiver::new(program)
            .split(&input_file(root.path()), 100, scratch.path())
            .unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].file_name(), "f.txt.7z.001");
        assert_eq!(chunks[0].data, b"first");
        assert_eq!(chunks[1].index, 1);
        assert_eq!(chunks[1].file_name(), "f.txt.7z.002");
        assert_eq!(chunks[1].data, b"second");
    }

    #[cfg(unix)]
    #[test]
    fn test_external_archiver_oversize_volume() {
        let root = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        let program = fake_archiver(
            root.path(),
            "head -c 200 /dev/zero > \"$archive.001\"",
        );

        let err = ExternalArchiver::new(program)
            .split(&input_file(root.path()), 100, scratch.path())
            .unwrap_err();

        match err {
            MosaicError::ExternalToolFailure { diagnostics, .. } => {
                assert!(diagnostics.contains("200 bytes"), "{}", diagnostics);
                assert!(diagnostics.contains("100-byte limit"), "{}", diagnostics);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_external_archiver_without_volumes() {
        let root = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        let program = fake_archiver(root.path(), "exit 0");

        let err = ExternalArchiver::new(program)
            .split(&input_file(root.path()), 100, scratch.path())
            .unwrap_err();

        match err {
            MosaicError::ExternalToolFailure { diagnostics, .. } => {
                assert!(diagnostics.contains("no volumes"), "{}", diagnostics)
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_external_archiver_reports_stderr() {
        let root = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        let program = fake_archiver(root.path(), "echo 'disk full' >&2\nexit 2");

        let err = ExternalArchiver::new(program)
            .split(&input_file(root.path()), 100, scratch.path())
            .unwrap_err();

        match err {
            MosaicError::ExternalToolFailure { diagnostics, .. } => {
                assert_eq!(diagnostics, "disk full")
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_external_archiver_missing_program() {
        let root = TempDir::new().unwrap();
        let file = root.path().join("f.txt");
        fs::write(&file, b"x").unwrap();

        let err = ExternalArchiver::new("mosaic-no-such-archiver")
            .split(&file, 100, root.path())
            .unwrap_err();

        assert!(matches!(
            err,
            MosaicError::ExternalToolFailure { ref status, .. } if status == "not started"
        ));
    }
}
