use anyhow::Result;
use clap::Parser;

use mosaic::capacity::{linear_probe, probe_with_upper, DEFAULT_PROBE_UPPER};
use mosaic::{logging, EncoderConfig, Symbology};

#[derive(Parser)]
#[command(name = "mosaic-probe")]
#[command(author, version, about = "Find the largest payload one barcode can hold", long_about = None)]
struct Cli {
    /// Barcode symbology to probe
    #[arg(long, value_enum, default_value = "qr")]
    method: Symbology,

    /// Size known not to fit, used as the binary search ceiling
    #[arg(long, default_value_t = DEFAULT_PROBE_UPPER)]
    upper: usize,

    /// Walk sizes upward from this size instead of bisecting
    #[arg(long)]
    linear: Option<usize>,

    /// Last size tried by the linear walk
    #[arg(long, default_value_t = 20000, requires = "linear")]
    end: usize,

    /// Step of the linear walk
    #[arg(long, default_value_t = 1, requires = "linear")]
    step: usize,
}

fn main() -> Result<()> {
    logging::init();
    let args = Cli::parse();
    let config = EncoderConfig::new(args.method);

    if let Some(start) = args.linear {
        match linear_probe(&config, start, args.end, args.step) {
            Some(limit) => println!("Max successful {} size: {}", args.method, limit),
            None => println!("{} already fails at {} bytes", args.method, start),
        }
        return Ok(());
    }

    let result = probe_with_upper(&config, args.upper)?;
    println!("Max successful {} size: {}", args.method, result.limit);
    println!("First failure at: {} bytes", result.limit.bytes() + 1);
    if result.library_errors > 0 {
        println!(
            "Warning: {} of {} attempts failed with encoder errors",
            result.library_errors, result.attempts
        );
    }

    Ok(())
}
