pub mod barcode;
pub mod capacity;
pub mod compress;
pub mod config;
pub mod error;
pub mod logging;
pub mod manifest;
pub mod pipeline;
pub mod split;

pub use barcode::{encode, fit, image_file_name, ChunkSource, EncodedImage, Fit};
pub use capacity::{linear_probe, probe, CapacityLimit, CapacityProbe};
pub use compress::{compress_if_smaller, CompressedPayload};
pub use config::{EncoderConfig, Mode, PipelineConfig, SplitterKind, Symbology};
pub use error::{MosaicError, Result};
pub use manifest::Manifest;
pub use pipeline::{run, run_with_splitter, InputArtifact, RunReport, RunStatus};
pub use split::{BundleSplitter, Chunk, ExternalArchiver, Splitter};
