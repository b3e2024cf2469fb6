use anyhow::Result;
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use mosaic::{logging, run, PipelineConfig, Symbology};

const DEFAULT_SIZES: [usize; 7] = [10, 100, 1000, 10000, 100000, 1000000, 10000000];

#[derive(Parser)]
#[command(name = "mosaic-sweep")]
#[command(author, version, about = "Embed growing test files until each method fails", long_about = None)]
struct Cli {
    /// Directory for test files and images (default: a temporary directory)
    #[arg(long)]
    dir: Option<PathBuf>,

    /// File sizes to try, in bytes
    #[arg(long, value_delimiter = ',')]
    sizes: Option<Vec<usize>>,

    /// Methods to try
    #[arg(long, value_enum, value_delimiter = ',', default_values = ["datamatrix", "qr"])]
    methods: Vec<Symbology>,
}

/// Printable ASCII, seeded so runs are repeatable.
fn write_test_file(path: &Path, size: usize) -> Result<()> {
    let mut x: u64 = 0x9e37_79b9_7f4a_7c15 ^ size as u64;
    let data: Vec<u8> = (0..size)
        .map(|_| {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            32 + ((x >> 33) % 95) as u8
        })
        .collect();
    fs::write(path, data)?;
    Ok(())
}

fn main() -> Result<()> {
    logging::init();
    let args = Cli::parse();

    let temp;
    let dir = match &args.dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            dir.clone()
        }
        None => {
            temp = TempDir::new()?;
            temp.path().to_path_buf()
        }
    };
    let sizes = args.sizes.unwrap_or_else(|| DEFAULT_SIZES.to_vec());

    for method in &args.methods {
        println!("\nTesting method: {}", method);
        let mut largest = None;
        for &size in &sizes {
            let path = dir.join(format!("testfile_{}B.txt", size));
            write_test_file(&path, size)?;
            println!("Generated {} ({} bytes)", path.display(), size);

            let mut config = PipelineConfig::new(&path, *method);
            config.write_manifest = false;
            match run(&config) {
                Ok(_) => {
                    println!("Embedded {} with {} successfully", path.display(), method);
                    largest = Some(size);
                }
                Err(e) => {
                    println!("Failed to embed {} with {}: {}", path.display(), method, e);
                    println!("Stopping {} at {} bytes", method, size);
                    break;
                }
            }
        }
        match largest {
            Some(size) => println!("{}: largest embedded file {} bytes", method, size),
            None => println!("{}: no test file could be embedded", method),
        }
    }

    Ok(())
}
