use std::path::PathBuf;

use thiserror::Error;

use crate::config::Symbology;

#[derive(Error, Debug)]
pub enum MosaicError {
    #[error("payload of {size} bytes exceeds {symbology} capacity")]
    PayloadTooLarge { size: usize, symbology: Symbology },

    #[error("capability unavailable: {0}")]
    CapabilityUnavailable(String),

    #[error("{program} failed ({status}): {diagnostics}")]
    ExternalToolFailure {
        program: String,
        status: String,
        diagnostics: String,
    },

    #[error("{context} ({})", path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    RawIo(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error("encoder error: {0}")]
    EncodeFailure(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Manifest(#[from] serde_json::Error),
}

impl MosaicError {
    pub(crate) fn io(
        context: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        MosaicError::Io {
            context,
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, MosaicError>;
