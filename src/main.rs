use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use mosaic::config::DEFAULT_ARCHIVER;
use mosaic::{logging, run, Mode, PipelineConfig, RunStatus, SplitterKind, Symbology};

#[derive(Parser)]
#[command(name = "mosaic")]
#[command(author, version, about = "Embed a file or directory in QR or DataMatrix images", long_about = None)]
struct Cli {
    /// File or directory to embed
    input: PathBuf,

    /// Output image path (whole-file mode only, default: <input stem>.<method>.png)
    #[arg(short, long, conflicts_with = "chunked")]
    output: Option<PathBuf>,

    /// Barcode symbology
    #[arg(long, value_enum, default_value = "qr")]
    method: Symbology,

    /// Split the input into archive volumes and encode one image per volume
    #[arg(long)]
    chunked: bool,

    /// Maximum volume size in bytes for chunked mode
    /// (default: 2800 for qr, 1500 for datamatrix)
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Keep the intermediate archive volumes next to the images
    #[arg(long)]
    retain_zips: bool,

    /// Do not try to compress the payload in whole-file mode
    #[arg(long)]
    no_compress: bool,

    /// Compress a file input before handing it to the splitter
    #[arg(long, requires = "chunked")]
    compress_before_split: bool,

    /// How chunked mode produces its volumes
    #[arg(long, value_enum, default_value = "external")]
    splitter: SplitterKind,

    /// Archiver program used by the external splitter
    #[arg(long, default_value = DEFAULT_ARCHIVER)]
    archiver: String,

    /// Skip writing the JSON manifest sidecar
    #[arg(long)]
    no_manifest: bool,
}

impl Cli {
    fn check_chunk_size(&self) -> Result<()> {
        if let Some(size) = self.chunk_size {
            if size > self.method.capacity() {
                bail!(
                    "--chunk-size {} exceeds the {} capacity of {} bytes",
                    size,
                    self.method,
                    self.method.capacity()
                );
            }
        }
        Ok(())
    }

    fn into_config(self) -> PipelineConfig {
        let mut config = PipelineConfig::new(self.input, self.method);
        if self.chunked {
            let chunk_size = self
                .chunk_size
                .unwrap_or_else(|| self.method.default_chunk_size());
            config = config.chunked(chunk_size);
        }
        config.output = self.output;
        config.compress = !self.no_compress;
        config.compress_before_split = self.compress_before_split;
        config.retain_volumes = self.retain_zips;
        config.splitter = self.splitter;
        config.archiver = self.archiver;
        config.write_manifest = !self.no_manifest;
        config
    }
}

fn encode(args: Cli) -> Result<()> {
    if !args.input.exists() {
        bail!("Input path does not exist: {}", args.input.display());
    }

    args.check_chunk_size()?;

    let config = args.into_config();
    let report = run(&config)?;

    match report.mode {
        Mode::Whole => {
            println!("Created 1 image ({} bytes)", report.payload_size);
        }
        Mode::Chunked => {
            println!(
                "Created {} of {} image(s) from {} bytes",
                report.images.len(),
                report.total_chunks,
                report.payload_size
            );
        }
    }
    for image in &report.images {
        println!("  - {}", image.path.display());
    }
    for volume in &report.volumes {
        println!("  + {}", volume.display());
    }
    if let Some(manifest) = &report.manifest {
        println!("Manifest: {}", manifest.display());
    }

    if let RunStatus::PartiallyFailed { reason, .. } = report.status {
        bail!("{}", reason);
    }

    Ok(())
}

fn main() -> ExitCode {
    logging::init();
    let args = Cli::parse();

    match encode(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
