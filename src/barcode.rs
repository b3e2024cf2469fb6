use image::{GrayImage, ImageFormat, Luma};
use log::debug;
use qrcode::bits::Bits;
use qrcode::types::QrError;
use qrcode::QrCode;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::{DataMatrixConfig, EncoderConfig, QrConfig, Symbology};
use crate::error::{MosaicError, Result};

const DARK: Luma<u8> = Luma([0]);
const LIGHT: Luma<u8> = Luma([255]);

/// Outcome of trying a payload against a fixed configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fit {
    Fits(usize),
    ExceedsCapacity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkSource {
    Whole,
    Chunk(usize),
}

#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub symbology: Symbology,
    pub source: ChunkSource,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// DataMatrix modules, row-major, `true` is dark.
struct ModuleGrid {
    width: usize,
    height: usize,
    dark: Vec<bool>,
}

enum Symbol {
    Qr(QrCode),
    DataMatrix(ModuleGrid),
}

impl Symbol {
    fn modules(&self) -> (usize, usize) {
        match self {
            Symbol::Qr(code) => (code.width(), code.width()),
            Symbol::DataMatrix(grid) => (grid.width, grid.height),
        }
    }
}

fn qr_error(e: QrError) -> MosaicError {
    MosaicError::EncodeFailure(format!("failed to create QR code: {}", e))
}

/// Builds the symbol in 8-bit byte mode only, so capacity is a pure function
/// of payload length. No fit-to-size: oversize payloads are rejected.
fn qr_symbol(data: &[u8], config: &QrConfig) -> Result<Option<QrCode>> {
    let mut bits = Bits::new(config.version);
    let pushed = bits
        .push_byte_data(data)
        .and_then(|_| bits.push_terminator(config.ec_level));
    match pushed {
        Ok(()) => {}
        Err(QrError::DataTooLong) => return Ok(None),
        Err(e) => return Err(qr_error(e)),
    }

    match QrCode::with_bits(bits, config.ec_level) {
        Ok(code) => Ok(Some(code)),
        Err(QrError::DataTooLong) => Ok(None),
        Err(e) => Err(qr_error(e)),
    }
}

#[cfg(feature = "datamatrix")]
fn datamatrix_symbol(data: &[u8]) -> Result<Option<ModuleGrid>> {
    use datamatrix::{data::DataEncodingError, DataMatrix, SymbolList};

    let code = match DataMatrix::encode(data, SymbolList::default()) {
        Ok(code) => code,
        Err(DataEncodingError::TooMuchOrIllegalData) => return Ok(None),
        Err(e) => {
            return Err(MosaicError::EncodeFailure(format!(
                "failed to create DataMatrix: {:?}",
                e
            )))
        }
    };

    let bitmap = code.bitmap();
    let (width, height) = (bitmap.width(), bitmap.height());
    let mut dark = vec![false; width * height];
    for (x, y) in bitmap.pixels() {
        dark[y * width + x] = true;
    }

    Ok(Some(ModuleGrid {
        width,
        height,
        dark,
    }))
}

#[cfg(not(feature = "datamatrix"))]
fn datamatrix_symbol(_data: &[u8]) -> Result<Option<ModuleGrid>> {
    Err(MosaicError::CapabilityUnavailable(
        "DataMatrix support is not compiled in (enable the `datamatrix` feature)".to_string(),
    ))
}

fn symbol(data: &[u8], config: &EncoderConfig) -> Result<Option<Symbol>> {
    Ok(match config.symbology {
        Symbology::Qr => qr_symbol(data, &config.qr)?.map(Symbol::Qr),
        Symbology::DataMatrix => datamatrix_symbol(data)?.map(Symbol::DataMatrix),
    })
}

// The datamatrix crate only hands back a bitmap, so it is drawn by hand.
fn rasterize(grid: &ModuleGrid, config: &DataMatrixConfig) -> GrayImage {
    let DataMatrixConfig {
        module_size: module,
        quiet_zone,
    } = *config;
    let img_w = (grid.width as u32 + 2 * quiet_zone) * module;
    let img_h = (grid.height as u32 + 2 * quiet_zone) * module;
    let mut image = GrayImage::from_pixel(img_w, img_h, LIGHT);

    for row in 0..grid.height {
        for col in 0..grid.width {
            if !grid.dark[row * grid.width + col] {
                continue;
            }
            let x0 = (col as u32 + quiet_zone) * module;
            let y0 = (row as u32 + quiet_zone) * module;
            for y in y0..y0 + module {
                for x in x0..x0 + module {
                    image.put_pixel(x, y, DARK);
                }
            }
        }
    }

    image
}

fn render(symbol: &Symbol, config: &EncoderConfig) -> GrayImage {
    match symbol {
        // Quiet zone is the standard 4 modules.
        Symbol::Qr(code) => code
            .render::<Luma<u8>>()
            .quiet_zone(true)
            .module_dimensions(config.qr.box_size, config.qr.box_size)
            .build(),
        Symbol::DataMatrix(grid) => rasterize(grid, &config.datamatrix),
    }
}

/// Check whether `data` fits without rendering an image.
pub fn fit(data: &[u8], config: &EncoderConfig) -> Result<Fit> {
    Ok(match symbol(data, config)? {
        Some(_) => Fit::Fits(data.len()),
        None => Fit::ExceedsCapacity,
    })
}

/// Render `data` as a barcode image and write it to `output_path` as PNG.
/// Nothing is written when encoding fails.
pub fn encode(
    data: &[u8],
    config: &EncoderConfig,
    output_path: &Path,
    source: ChunkSource,
) -> Result<EncodedImage> {
    let symbol = symbol(data, config)?.ok_or(MosaicError::PayloadTooLarge {
        size: data.len(),
        symbology: config.symbology,
    })?;

    let image = render(&symbol, config);
    image.save_with_format(output_path, ImageFormat::Png)?;

    let (cols, rows) = symbol.modules();
    debug!(
        "Wrote {} ({}x{} modules, {} bytes) to {}",
        config.symbology,
        cols,
        rows,
        data.len(),
        output_path.display()
    );

    Ok(EncodedImage {
        symbology: config.symbology,
        source,
        path: output_path.to_path_buf(),
        width: image.width(),
        height: image.height(),
    })
}

/// `<stem>[.zlib].<qr|dm>.png`
pub fn image_file_name(stem: &str, symbology: Symbology, compressed: bool) -> String {
    if compressed {
        format!("{}.zlib.{}.png", stem, symbology.file_tag())
    } else {
        format!("{}.{}.png", stem, symbology.file_tag())
    }
}
