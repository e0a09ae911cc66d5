//! Run diagnostics: timing and counts for each pipeline stage.
//!
//! [`resynthesize_with_diagnostics`] drives the same staged run as
//! [`resynthesize_selection`](crate::resynthesize_selection) and records
//! how long each stage took along with the sizes it worked on.
//!
//! Timestamps come from a caller-supplied [`Clock`], so this crate stays
//! free of any platform time source. Durations are serialized as
//! fractional seconds (`f64`) for JSON compatibility, since
//! `std::time::Duration` does not implement serde traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::document::{Document, LayerId};
use crate::pipeline::{self, Pipeline};
use crate::synth::Synthesizer;
use crate::types::{Rect, ResynthConfig, ResynthError, ResynthOutcome};
use crate::writeback::WriteTarget;

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single successful run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunDiagnostics {
    /// Region calculation.
    pub region: StageDiagnostics,
    /// Reading pixels and coverage from the document.
    pub read: StageDiagnostics,
    /// Coverage binarization.
    pub mask: StageDiagnostics,
    /// The synthesizer call.
    pub synthesis: StageDiagnostics,
    /// Reattaching alpha.
    pub recompose: StageDiagnostics,
    /// Writing to the document and requesting a redraw.
    pub write_back: StageDiagnostics,
    /// Wall-clock duration of the whole run (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary of the run.
    pub summary: RunSummary,
}

/// Diagnostics for a single stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Region calculation.
    Region {
        /// Selection bounds reported by the document.
        selection: Rect,
        /// Padded, clamped working region.
        region: Rect,
        /// Requested padding.
        padding: i32,
    },
    /// Buffer reads.
    Read {
        /// Length of the RGBA pixel buffer.
        pixel_bytes: usize,
        /// Length of the coverage buffer.
        coverage_bytes: usize,
    },
    /// Mask derivation.
    Mask {
        /// Pixels marked for filling.
        fill_pixels: u64,
        /// Context pixels.
        source_pixels: u64,
    },
    /// Synthesis.
    Synthesis {
        /// Region width.
        width: u32,
        /// Region height.
        height: u32,
    },
    /// Alpha reattachment.
    Recompose {
        /// Length of the buffer to write.
        output_bytes: usize,
    },
    /// Write-back.
    WriteBack {
        /// Where the pixels went.
        target: WriteTarget,
        /// Layer that received them.
        layer: LayerId,
        /// Whether that layer was created by this run.
        created: bool,
    },
}

/// High-level summary of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Document width in pixels.
    pub document_width: u32,
    /// Document height in pixels.
    pub document_height: u32,
    /// Pixels in the working region.
    pub region_pixels: u64,
    /// Pixels that were regenerated.
    pub fill_pixels: u64,
}

impl RunDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Resynthesis Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Document: {}x{}  |  Region: {} pixels  |  Filled: {} pixels",
            self.summary.document_width,
            self.summary.document_height,
            self.summary.region_pixels,
            self.summary.fill_pixels,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<16} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for (name, diag) in self.stages() {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<16} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.join("\n")
    }

    /// Stages in execution order with display names.
    #[must_use]
    pub fn stages(&self) -> [(&'static str, &StageDiagnostics); 6] {
        [
            ("Region", &self.region),
            ("Read", &self.read),
            ("Mask", &self.mask),
            ("Synthesis", &self.synthesis),
            ("Recompose", &self.recompose),
            ("Write Back", &self.write_back),
        ]
    }
}

fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Region {
            selection,
            region,
            padding,
        } => format!("sel={selection} pad={padding} -> {region}"),
        StageMetrics::Read {
            pixel_bytes,
            coverage_bytes,
        } => format!("{pixel_bytes} pixel bytes, {coverage_bytes} coverage bytes"),
        StageMetrics::Mask {
            fill_pixels,
            source_pixels,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let total = (*fill_pixels + *source_pixels) as f64;
            #[allow(clippy::cast_precision_loss)]
            let ratio = if total > 0.0 {
                *fill_pixels as f64 / total * 100.0
            } else {
                0.0
            };
            format!("fill={fill_pixels} context={source_pixels} ({ratio:.1}% fill)")
        }
        StageMetrics::Synthesis { width, height } => format!("{width}x{height}"),
        StageMetrics::Recompose { output_bytes } => format!("{output_bytes} bytes"),
        StageMetrics::WriteBack {
            target,
            layer,
            created,
        } => {
            let created = if *created { " (created)" } else { "" };
            format!("{} -> layer {layer}{created}", target.label())
        }
    }
}

/// Run the full pipeline, timing every stage with `clock`.
///
/// Behaves exactly like
/// [`resynthesize_selection`](crate::resynthesize_selection), including
/// its outcome logging; on error no diagnostics are returned.
///
/// # Errors
///
/// Any error a stage of the run can produce.
pub fn resynthesize_with_diagnostics<D, S, C>(
    document: &mut D,
    config: &ResynthConfig,
    synthesizer: &S,
    clock: &C,
) -> Result<(ResynthOutcome, RunDiagnostics), ResynthError>
where
    D: Document + ?Sized,
    S: Synthesizer + ?Sized,
    C: Clock,
{
    let result = run_timed(document, config, synthesizer, clock);
    pipeline::log_outcome(result.as_ref().map(|(outcome, _)| outcome));
    result
}

fn run_timed<D, S, C>(
    document: &mut D,
    config: &ResynthConfig,
    synthesizer: &S,
    clock: &C,
) -> Result<(ResynthOutcome, RunDiagnostics), ResynthError>
where
    D: Document + ?Sized,
    S: Synthesizer + ?Sized,
    C: Clock,
{
    let bounds = document.bounds();
    let run_start = clock.now();

    let t = clock.now();
    let stage = Pipeline::new(document, config.clone()).compute_region()?;
    let region_diag = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Region {
            selection: stage.selection(),
            region: stage.region(),
            padding: config.padding,
        },
    };

    let t = clock.now();
    let stage = stage.read_buffers()?;
    let read_diag = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Read {
            pixel_bytes: stage.pixel_bytes(),
            coverage_bytes: stage.coverage().len(),
        },
    };

    let t = clock.now();
    let stage = stage.derive_mask()?;
    let region_pixels = stage.region().pixel_count();
    let mask_diag = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Mask {
            fill_pixels: stage.fill_pixels(),
            source_pixels: region_pixels - stage.fill_pixels(),
        },
    };

    let t = clock.now();
    let (width, height) = stage.rgb().dimensions();
    let stage = stage.synthesize(synthesizer)?;
    let synthesis_diag = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Synthesis { width, height },
    };

    let t = clock.now();
    let stage = stage.recompose()?;
    let recompose_diag = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Recompose {
            output_bytes: stage.pixels().len(),
        },
    };

    let t = clock.now();
    let done = stage.write_back()?;
    let outcome = done.into_outcome();
    let write_back_diag = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::WriteBack {
            target: config.target,
            layer: outcome.layer,
            created: outcome.created_layer,
        },
    };

    let diagnostics = RunDiagnostics {
        region: region_diag,
        read: read_diag,
        mask: mask_diag,
        synthesis: synthesis_diag,
        recompose: recompose_diag,
        write_back: write_back_diag,
        total_duration: clock.elapsed(&run_start),
        summary: RunSummary {
            document_width: bounds.width,
            document_height: bounds.height,
            region_pixels,
            fill_pixels: outcome.fill_pixels,
        },
    };
    Ok((outcome, diagnostics))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::{Cell, RefCell};

    use image::{Rgba, RgbaImage};

    use super::*;
    use crate::buffer::FillMask;
    use crate::memory::MemoryDocument;
    use crate::synth::SynthesisError;
    use crate::types::RgbImage;

    /// Advances one millisecond per reading.
    struct TickClock(Cell<u64>);

    impl Clock for TickClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.0.get();
            self.0.set(t + 1);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.now() - since)
        }
    }

    thread_local! {
        static CAPTURED: RefCell<Vec<(log::Level, String)>> = const { RefCell::new(Vec::new()) };
    }

    /// Records log lines per test thread so parallel tests do not mix.
    struct CaptureLogger;

    impl log::Log for CaptureLogger {
        fn enabled(&self, _: &log::Metadata<'_>) -> bool {
            true
        }

        fn log(&self, record: &log::Record<'_>) {
            let line = (record.level(), record.args().to_string());
            CAPTURED.with(|c| c.borrow_mut().push(line));
        }

        fn flush(&self) {}
    }

    static LOGGER: CaptureLogger = CaptureLogger;

    /// Info-and-above log lines emitted by `run` on this thread.
    fn outcome_logs(run: impl FnOnce()) -> Vec<(log::Level, String)> {
        log::set_logger(&LOGGER).ok();
        log::set_max_level(log::LevelFilter::Debug);
        CAPTURED.with(|c| c.borrow_mut().clear());
        run();
        CAPTURED.with(|c| {
            c.borrow_mut()
                .drain(..)
                .filter(|(level, _)| *level <= log::Level::Info)
                .collect()
        })
    }

    fn identity(image: &RgbImage, _: &FillMask) -> Result<RgbImage, SynthesisError> {
        Ok(image.clone())
    }

    fn document() -> MemoryDocument {
        let image = RgbaImage::from_pixel(50, 40, Rgba([1, 2, 3, 255]));
        let mut doc = MemoryDocument::from_image("Background", image).unwrap();
        doc.select_rect(Rect::new(10, 10, 5, 4)).unwrap();
        doc
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let ms = duration_ms(Duration::from_millis(1234));
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn collects_metrics_for_every_stage() {
        let mut doc = document();
        let config = ResynthConfig {
            padding: 2,
            ..ResynthConfig::default()
        };
        let (outcome, diag) =
            resynthesize_with_diagnostics(&mut doc, &config, &identity, &TickClock(Cell::new(0)))
                .unwrap();

        assert_eq!(outcome.region, Rect::new(8, 8, 9, 8));
        assert_eq!(diag.summary.region_pixels, 72);
        assert_eq!(diag.summary.fill_pixels, 20);
        assert!(matches!(
            diag.mask.metrics,
            StageMetrics::Mask {
                fill_pixels: 20,
                source_pixels: 52
            }
        ));
        assert!(matches!(
            diag.read.metrics,
            StageMetrics::Read {
                pixel_bytes: 288,
                coverage_bytes: 72
            }
        ));
        for (_, stage) in diag.stages() {
            assert!(stage.duration > Duration::ZERO);
        }
        assert!(diag.total_duration > diag.synthesis.duration);
    }

    #[test]
    fn errors_propagate_without_diagnostics() {
        let mut doc = document();
        doc.clear_selection();
        let result = resynthesize_with_diagnostics(
            &mut doc,
            &ResynthConfig::default(),
            &identity,
            &TickClock(Cell::new(0)),
        );
        assert!(matches!(result, Err(ResynthError::NoSelection)));
    }

    #[test]
    fn both_entry_points_log_the_same_outcome() {
        let timed = outcome_logs(|| {
            let mut doc = document();
            let clock = TickClock(Cell::new(0));
            resynthesize_with_diagnostics(&mut doc, &ResynthConfig::default(), &identity, &clock)
                .unwrap();
        });
        let plain = outcome_logs(|| {
            let mut doc = document();
            crate::resynthesize_selection(&mut doc, &ResynthConfig::default(), &identity).unwrap();
        });

        assert_eq!(timed.len(), 1);
        assert_eq!(timed[0].0, log::Level::Info);
        assert!(timed[0].1.starts_with("resynthesized 20 fill pixels"), "{}", timed[0].1);
        assert_eq!(timed, plain);
    }

    #[test]
    fn failed_timed_run_is_logged_as_a_warning() {
        let logs = outcome_logs(|| {
            let mut doc = document();
            doc.clear_selection();
            let clock = TickClock(Cell::new(0));
            resynthesize_with_diagnostics(&mut doc, &ResynthConfig::default(), &identity, &clock)
                .unwrap_err();
        });
        let expected = format!("resynthesis aborted: {}", ResynthError::NoSelection);
        assert_eq!(logs, vec![(log::Level::Warn, expected)]);
    }

    #[test]
    fn report_lists_every_stage() {
        let mut doc = document();
        let (_, diag) = resynthesize_with_diagnostics(
            &mut doc,
            &ResynthConfig::default(),
            &identity,
            &TickClock(Cell::new(0)),
        )
        .unwrap();
        let report = diag.report();
        assert!(report.contains("Resynthesis Diagnostics Report"));
        for name in ["Region", "Read", "Mask", "Synthesis", "Recompose", "Write Back"] {
            assert!(report.contains(name), "missing {name} in:\n{report}");
        }
        assert!(report.contains("in place"));
    }

    #[test]
    fn diagnostics_serialize_durations_as_seconds() {
        let stage = StageDiagnostics {
            duration: Duration::from_millis(1500),
            metrics: StageMetrics::Recompose { output_bytes: 4 },
        };
        let json = serde_json::to_value(&stage).unwrap();
        assert_eq!(json["duration"], serde_json::json!(1.5));

        let back: StageDiagnostics = serde_json::from_value(json).unwrap();
        assert_eq!(back.duration, Duration::from_millis(1500));
    }

    #[test]
    fn negative_duration_is_rejected() {
        let json = serde_json::json!({
            "duration": -1.0,
            "metrics": { "Recompose": { "output_bytes": 4 } }
        });
        assert!(serde_json::from_value::<StageDiagnostics>(json).is_err());
    }
}
