use std::fmt;
use std::path::PathBuf;

use clap::ValueEnum;
use qrcode::{EcLevel, Version};
use serde::Serialize;

// Largest QR symbol at the lowest error correction level.
// 177x177 modules, 2953 bytes of 8-bit data.
pub const QR_MAX_VERSION: i16 = 40;
pub const QR_BOX_SIZE: u32 = 10;

pub const DM_MODULE_SIZE: u32 = 10;
pub const DM_QUIET_ZONE: u32 = 2;

pub const QR_CAPACITY: usize = 2953;
// Largest square symbol in the default list, 144x144 in base 256 mode.
pub const DM_CAPACITY: usize = 1556;

/// Default volume sizes for chunked mode. They sit below each symbol's
/// capacity to leave headroom for archive volume overhead.
pub const DEFAULT_CHUNK_SIZE: usize = 2800;
pub const DM_DEFAULT_CHUNK_SIZE: usize = 1500;

pub const DEFAULT_ARCHIVER: &str = "7z";
pub const DEFAULT_ARCHIVE_FORMAT: &str = "7z";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Symbology {
    Qr,
    #[value(name = "datamatrix")]
    DataMatrix,
}

impl Symbology {
    /// Largest payload one symbol holds under the fixed configuration.
    pub fn capacity(&self) -> usize {
        match self {
            Symbology::Qr => QR_CAPACITY,
            Symbology::DataMatrix => DM_CAPACITY,
        }
    }

    pub fn default_chunk_size(&self) -> usize {
        match self {
            Symbology::Qr => DEFAULT_CHUNK_SIZE,
            Symbology::DataMatrix => DM_DEFAULT_CHUNK_SIZE,
        }
    }

    /// Short tag used in output file names.
    pub fn file_tag(&self) -> &'static str {
        match self {
            Symbology::Qr => "qr",
            Symbology::DataMatrix => "dm",
        }
    }
}

impl fmt::Display for Symbology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbology::Qr => write!(f, "QR"),
            Symbology::DataMatrix => write!(f, "DataMatrix"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct QrConfig {
    pub version: Version,
    pub ec_level: EcLevel,
    /// Pixels per module.
    pub box_size: u32,
}

impl Default for QrConfig {
    fn default() -> Self {
        QrConfig {
            version: Version::Normal(QR_MAX_VERSION),
            ec_level: EcLevel::L,
            box_size: QR_BOX_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DataMatrixConfig {
    pub module_size: u32,
    pub quiet_zone: u32,
}

impl Default for DataMatrixConfig {
    fn default() -> Self {
        DataMatrixConfig {
            module_size: DM_MODULE_SIZE,
            quiet_zone: DM_QUIET_ZONE,
        }
    }
}

/// Immutable barcode configuration for one run.
#[derive(Debug, Clone, Copy)]
pub struct EncoderConfig {
    pub symbology: Symbology,
    pub qr: QrConfig,
    pub datamatrix: DataMatrixConfig,
}

impl EncoderConfig {
    pub fn new(symbology: Symbology) -> Self {
        EncoderConfig {
            symbology,
            qr: QrConfig::default(),
            datamatrix: DataMatrixConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Whole,
    Chunked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitterKind {
    /// Delegate to an external archiver such as 7z
    External,
    /// Cut an in-process bundle stream into volumes
    Bundle,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input: PathBuf,
    /// Image path override, whole-file mode only.
    pub output: Option<PathBuf>,
    pub mode: Mode,
    pub encoder: EncoderConfig,
    pub compress: bool,
    pub compress_before_split: bool,
    pub chunk_size: usize,
    pub retain_volumes: bool,
    pub splitter: SplitterKind,
    pub archiver: String,
    pub write_manifest: bool,
}

impl PipelineConfig {
    pub fn new(input: impl Into<PathBuf>, symbology: Symbology) -> Self {
        PipelineConfig {
            input: input.into(),
            output: None,
            mode: Mode::Whole,
            encoder: EncoderConfig::new(symbology),
            compress: true,
            compress_before_split: false,
            chunk_size: symbology.default_chunk_size(),
            retain_volumes: false,
            splitter: SplitterKind::External,
            archiver: DEFAULT_ARCHIVER.to_string(),
            write_manifest: true,
        }
    }

    pub fn chunked(mut self, chunk_size: usize) -> Self {
        self.mode = Mode::Chunked;
        self.chunk_size = chunk_size;
        self
    }
}
