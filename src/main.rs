use clap::{Parser, Subcommand};
use imgfit::config::{self, Config};
use imgfit::host::{Host, JobOutcome};
use imgfit::imaging::{OutputFormat, ResampleFilter};
use imgfit::{SourceImage, naming, output};
use log::warn;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "imgfit")]
#[command(about = "Compress an image to fit a byte budget and a maximum dimension")]
#[command(long_about = "\
Compress an image to fit a byte budget and a maximum dimension

The longer edge is bounded first (never upscaled), then encoder quality is
lowered step by step until the output fits the budget or the quality floor is
reached. If the floor is reached the smallest result is kept and a note is
printed; this is not an error.

Settings are read from ./imgfit.toml (or --config FILE) and overridden by
flags. Run 'imgfit gen-config' to generate a documented imgfit.toml.

Set RUST_LOG=debug to log every attempt.")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compress one image
    Compress(CompressArgs),
    /// Print a stock imgfit.toml with all options documented
    GenConfig,
}

#[derive(clap::Args)]
struct CompressArgs {
    /// Image to compress (JPEG, PNG, WebP or TIFF)
    input: PathBuf,

    /// Output file [default: compressed-<input name> next to the input]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Config file [default: ./imgfit.toml when present]
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Byte budget for the output
    #[arg(long, value_name = "BYTES")]
    max_size: Option<u64>,

    /// Bound on the longer edge in pixels
    #[arg(long, value_name = "PX")]
    max_dimension: Option<u32>,

    /// Lowest quality the search may try, in (0, 1]
    #[arg(long, value_name = "F")]
    quality_floor: Option<f32>,

    /// Quality decrement between attempts
    #[arg(long, value_name = "F")]
    quality_step: Option<f32>,

    /// First quality tried
    #[arg(long, value_name = "F")]
    initial_quality: Option<f32>,

    /// Output format: jpeg, png or webp [default: source format family]
    #[arg(long)]
    format: Option<OutputFormat>,

    /// Resampling filter: catmull-rom, lanczos3 or triangle
    #[arg(long, value_name = "NAME")]
    filter: Option<ResampleFilter>,

    /// Shrink further once the quality floor is reached
    #[arg(long)]
    downscale: bool,

    /// Run on the calling thread instead of the worker pool
    #[arg(long)]
    sync: bool,

    /// Worker threads [default: CPU cores]
    #[arg(long, value_name = "N")]
    workers: Option<usize>,

    /// Give up after this many seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<f64>,

    /// Print a JSON report instead of the human-readable summary
    #[arg(long)]
    json: bool,
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Compress(args) => run_compress(args),
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run_compress(args: CompressArgs) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = resolve_config(&args)?;
    let options = config.compression.clone();
    let source = SourceImage::from_path(&args.input)?;
    let host = Host::from_config(&config)?;

    let (mut handle, printer) = if args.json {
        (host.submit(source, options.clone()), None)
    } else {
        let (tx, rx) = std::sync::mpsc::channel();
        let printer = std::thread::spawn(move || {
            for event in rx {
                output::print_event(&event);
            }
        });
        (
            host.submit_with_events(source, options.clone(), tx),
            Some(printer),
        )
    };

    let outcome: JobOutcome = match args.timeout {
        Some(secs) => {
            let limit = Duration::try_from_secs_f64(secs)
                .map_err(|e| format!("invalid --timeout {secs}: {e}"))?;
            if handle.wait_timeout(limit).is_none() {
                handle.cancel();
                warn!("gave up on {} after {secs}s", args.input.display());
                report_timeout(&args.input, secs, args.json);
                return Ok(ExitCode::FAILURE);
            }
            handle.wait()
        }
        None => handle.wait(),
    };
    if let Some(printer) = printer {
        let _ = printer.join();
    }

    match outcome {
        Ok(result) => {
            let output_path = args
                .output
                .clone()
                .unwrap_or_else(|| naming::default_output_path(&args.input, result.format));
            std::fs::write(&output_path, &result.bytes)?;

            if args.json {
                let mut report = result.report();
                report.output = Some(output_path.display().to_string());
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                output::print_result(&result, Some(&output_path), options.max_size_bytes);
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            if args.json {
                let failure = serde_json::json!({
                    "input": args.input.display().to_string(),
                    "error": err.kind(),
                    "message": err.to_string(),
                });
                println!("{}", serde_json::to_string_pretty(&failure)?);
            } else {
                output::print_failure(&err, &args.input);
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Load the config file, then apply command-line overrides and re-validate.
fn resolve_config(args: &CompressArgs) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match &args.config {
        Some(path) if !path.exists() => {
            return Err(format!("config file not found: {}", path.display()).into());
        }
        Some(path) => path.clone(),
        None => PathBuf::from(config::CONFIG_FILENAME),
    };
    let mut config = config::load_config(&path)?;

    let compression = &mut config.compression;
    if let Some(v) = args.max_size {
        compression.max_size_bytes = v;
    }
    if let Some(v) = args.max_dimension {
        compression.max_dimension_pixels = v;
    }
    if let Some(v) = args.quality_floor {
        compression.quality_floor = v;
    }
    if let Some(v) = args.quality_step {
        compression.quality_step = v;
    }
    if let Some(v) = args.initial_quality {
        compression.initial_quality = v;
    }
    if let Some(v) = args.format {
        compression.output_format = Some(v);
    }
    if let Some(v) = args.filter {
        compression.resample_filter = v;
    }
    if args.downscale {
        compression.downscale.enabled = true;
    }
    if args.sync {
        compression.prefer_speed = false;
    }
    if let Some(n) = args.workers {
        config.processing.max_workers = Some(n);
    }

    config.validate()?;
    Ok(config)
}

fn report_timeout(input: &Path, secs: f64, json: bool) {
    if json {
        let failure = serde_json::json!({
            "input": input.display().to_string(),
            "error": "timeout",
            "message": format!("no result after {secs}s"),
        });
        println!("{failure:#}");
    } else {
        eprintln!("Failed (timeout): {}", input.display());
        eprintln!("    no result after {secs}s");
    }
}
