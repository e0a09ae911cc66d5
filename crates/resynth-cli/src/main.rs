//! resynth: run selection resynthesis on an image file.
//!
//! Loads an image as a single-layer document, selects a rectangle or a
//! coverage mask, runs the resynthesis pipeline with a stand-in
//! synthesizer, writes the flattened result and prints per-stage
//! diagnostics. Useful for:
//!
//! - Checking how padding changes the working region
//! - Comparing in-place and new-layer write-back
//! - Measuring per-stage durations on large documents
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin resynth -- [OPTIONS] <IMAGE_PATH> (--rect X,Y,W,H | --mask PATH)
//! ```
//!
//! Set `RUST_LOG=debug` to see stage transitions.

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod standin;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use resynth_core::diagnostics::{Clock, resynthesize_with_diagnostics};
use resynth_core::{
    FillMask, MemoryDocument, Rect, ResynthConfig, RgbImage, SynthesisError, WriteTarget,
};

/// Selection resynthesis on image files.
///
/// Regenerates the selected pixels of an image from their surroundings
/// and prints detailed per-stage timing diagnostics.
#[derive(Parser)]
#[command(name = "resynth", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Rectangular selection as `X,Y,W,H`.
    #[arg(
        long,
        value_parser = parse_rect,
        conflicts_with = "mask",
        required_unless_present = "mask"
    )]
    rect: Option<Rect>,

    /// Grayscale selection mask image, same size as the input. Any
    /// non-zero pixel is selected.
    #[arg(long)]
    mask: Option<PathBuf>,

    /// Context pixels added around the selection.
    #[arg(long, default_value_t = ResynthConfig::DEFAULT_PADDING, allow_negative_numbers = true)]
    padding: i32,

    /// Write the result to a new layer above the source instead of in
    /// place.
    #[arg(long)]
    new_layer: bool,

    /// Name of the layer created by `--new-layer`.
    #[arg(long, default_value = ResynthConfig::DEFAULT_LAYER_NAME)]
    layer_name: String,

    /// Stand-in synthesizer.
    #[arg(long, value_enum, default_value_t = Standin::Flat)]
    synthesizer: Standin,

    /// Write the flattened document to this file. The format follows the
    /// extension.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output diagnostics as JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,

    /// Full run config as a JSON string.
    ///
    /// When provided, `--padding`, `--new-layer` and `--layer-name` are
    /// ignored. The JSON must be a valid `ResynthConfig` serialization;
    /// missing fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,
}

/// Stand-in synthesizer selection.
#[derive(Clone, Copy, ValueEnum)]
enum Standin {
    /// Fill with the mean colour of the context pixels.
    Flat,
    /// Return the input unchanged.
    Identity,
}

impl Standin {
    fn synthesize(self, image: &RgbImage, mask: &FillMask) -> Result<RgbImage, SynthesisError> {
        match self {
            Self::Flat => standin::flat(image, mask),
            Self::Identity => standin::identity(image, mask),
        }
    }
}

/// Parse `X,Y,W,H` into a [`Rect`].
fn parse_rect(s: &str) -> Result<Rect, String> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<u32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid rectangle {s:?}: {e}"))?;
    match parts.as_slice() {
        &[x, y, width, height] => Ok(Rect::new(x, y, width, height)),
        _ => Err(format!(
            "invalid rectangle {s:?}: expected four comma-separated values X,Y,W,H"
        )),
    }
}

/// Build a [`ResynthConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and the
/// individual config flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<ResynthConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(ResynthConfig {
        padding: cli.padding,
        target: WriteTarget::from_new_layer_flag(cli.new_layer),
        layer_name: cli.layer_name.clone(),
    })
}

/// Load the input image as a single-layer document and apply the selection.
fn load_document(cli: &Cli) -> Result<MemoryDocument, String> {
    let image = image::open(&cli.image_path)
        .map_err(|e| format!("Error reading {}: {e}", cli.image_path.display()))?
        .to_rgba8();
    let name = cli
        .image_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Background");
    log::debug!(
        "loaded {} as a {}x{} document",
        cli.image_path.display(),
        image.width(),
        image.height()
    );
    let mut document = MemoryDocument::from_image(name, image).map_err(|e| e.to_string())?;

    if let Some(rect) = cli.rect {
        document
            .select_rect(rect)
            .map_err(|e| format!("Invalid --rect: {e}"))?;
    } else if let Some(ref mask_path) = cli.mask {
        let coverage = load_mask(mask_path)?;
        document
            .set_selection(coverage)
            .map_err(|e| format!("Invalid --mask: {e}"))?;
    }
    Ok(document)
}

fn load_mask(path: &Path) -> Result<image::GrayImage, String> {
    image::open(path)
        .map(|m| m.to_luma8())
        .map_err(|e| format!("Error reading mask {}: {e}", path.display()))
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let mut document = match load_document(&cli) {
        Ok(d) => d,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    eprintln!("Image: {}", cli.image_path.display());
    eprintln!("Config: {config:#?}");
    eprintln!();

    let standin = cli.synthesizer;
    let synthesizer = |image: &RgbImage, mask: &FillMask| standin.synthesize(image, mask);

    let (_, diagnostics) =
        match resynthesize_with_diagnostics(&mut document, &config, &synthesizer, &StdClock) {
            Ok(result) => result,
            Err(e) => {
                eprintln!("Resynthesis error: {e}");
                return ExitCode::FAILURE;
            }
        };

    if cli.json {
        match serde_json::to_string_pretty(&diagnostics) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing diagnostics: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        println!("{}", diagnostics.report());
    }

    if let Some(ref output) = cli.output {
        let flattened = document.flatten();
        match flattened.save(output) {
            Ok(()) => eprintln!("Result written to {}", output.display()),
            Err(e) => {
                eprintln!("Error writing {}: {e}", output.display());
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}
