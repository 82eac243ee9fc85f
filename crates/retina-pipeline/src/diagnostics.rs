//! Segmentation diagnostics: timing and counts for each stage.
//!
//! These diagnostics are permanent instrumentation intended for
//! parameter tuning. [`predict_with_diagnostics`] runs the exact same
//! stage sequence as [`Segmenter::predict`] but records every stage
//! through a [`TimingRecorder`].
//!
//! The pipeline never reads the system clock itself. Callers supply a
//! [`Clock`], which keeps the crate free of platform time sources.
//!
//! Diagnostics are output only: they serialize to JSON (durations as
//! fractional milliseconds) and render as a text table through
//! [`SegmentDiagnostics::report`].
//!
//! [`Segmenter::predict`]: crate::Segmenter::predict

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize, Serializer};

use crate::Segmenter;
use crate::types::{Dimensions, GrayImage, Mask, RgbImage, SegmentError};
use crate::{background, vessels};

/// Serialize a `Duration` as fractional milliseconds.
fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(millis(*duration))
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1e3
}

/// Monotonic time source used to time stages.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current instant.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Identifies one step of the segmentation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Principal-axis projection of the RGB input.
    Reduce,
    /// Min-max stretch to `[0, 255]`.
    Normalize,
    /// Gaussian blur before edge detection.
    BackgroundBlur,
    /// Otsu level of the blurred projection.
    EdgeThreshold,
    /// Canny edge detection.
    EdgeDetection,
    /// Edge dilation to close gaps.
    EdgeDilation,
    /// Contour tracing of the dilated edge map.
    ContourTracing,
    /// Largest-contour fill and cleanup.
    FieldFill,
    /// CLAHE on the lightness channel.
    Equalize,
    /// Gaussian blur before the ridge filter.
    VesselBlur,
    /// Hessian ridge filter.
    RidgeFilter,
    /// Erosion of the background mask.
    FieldErosion,
    /// Otsu level of the masked ridge response.
    RidgeThreshold,
    /// Dilation of thresholded ridges, clipped to the eroded field.
    Reconnect,
    /// Small-component removal.
    Prune,
}

impl Stage {
    /// Human-readable stage name.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Reduce => "Reduce (PCA)",
            Self::Normalize => "Normalize",
            Self::BackgroundBlur => "Background Blur",
            Self::EdgeThreshold => "Edge Threshold",
            Self::EdgeDetection => "Edge Detection",
            Self::EdgeDilation => "Edge Dilation",
            Self::ContourTracing => "Contour Tracing",
            Self::FieldFill => "Field Fill",
            Self::Equalize => "Equalize (CLAHE)",
            Self::VesselBlur => "Vessel Blur",
            Self::RidgeFilter => "Ridge Filter",
            Self::FieldErosion => "Field Erosion",
            Self::RidgeThreshold => "Ridge Threshold",
            Self::Reconnect => "Reconnect",
            Self::Prune => "Prune",
        }
    }
}

/// Diagnostics collected from a single prediction.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentDiagnostics {
    /// Every executed stage, in execution order.
    pub stages: Vec<StageDiagnostics>,
    /// Wall-clock duration of the whole prediction.
    #[serde(rename = "total_ms", serialize_with = "as_millis")]
    pub total_duration: Duration,
    /// Summary counts.
    pub summary: SegmentSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize)]
pub struct StageDiagnostics {
    /// Which stage this is.
    pub stage: Stage,
    /// Wall-clock duration of this stage.
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageMetrics {
    /// Principal-axis projection metrics.
    Reduce {
        /// Unit principal axis in RGB space.
        axis: [f32; 3],
        /// Fraction of color variance along the axis.
        explained_variance_ratio: f32,
        /// Whether the frame rule negated the projection.
        flipped: bool,
    },
    /// Intensity range of a floating-point raster.
    Range {
        /// Smallest sample.
        min: f32,
        /// Largest sample.
        max: f32,
    },
    /// Gaussian blur metrics.
    Blur {
        /// Kernel side length.
        kernel_size: u32,
        /// Sigma as configured (0 = derived from the kernel size).
        sigma: f32,
    },
    /// Otsu threshold metrics.
    Threshold {
        /// Selected level, or `None` if the input was degenerate.
        level: Option<f32>,
    },
    /// Canny edge detection metrics.
    EdgeDetection {
        /// Low threshold (after clamping).
        low_threshold: f32,
        /// High threshold (after clamping).
        high_threshold: f32,
        /// Number of edge pixels (value == 255) in the output.
        edge_pixel_count: u64,
        /// Total pixel count for computing edge density.
        total_pixel_count: u64,
    },
    /// Binary morphology metrics.
    Morphology {
        /// Structuring element side length.
        kernel_size: u32,
        /// `true` pixels before the operation.
        pixels_before: u64,
        /// `true` pixels after the operation.
        pixels_after: u64,
    },
    /// Contour tracing metrics.
    ContourTracing {
        /// Number of contours found.
        contour_count: usize,
        /// Total number of points across all contours.
        total_point_count: usize,
        /// Area of the largest contour (0 if none).
        largest_area: f64,
    },
    /// Field fill metrics.
    FieldFill {
        /// Pixels inside the retinal field.
        field_pixel_count: u64,
        /// Total pixel count.
        total_pixel_count: u64,
    },
    /// CLAHE metrics.
    Equalize {
        /// Clip limit.
        clip_limit: f32,
        /// Tiles per side.
        tiles: u32,
    },
    /// Small-component removal metrics.
    Prune {
        /// Minimum component area kept.
        min_area: u32,
        /// Components before pruning.
        components_before: usize,
        /// Components after pruning.
        components_after: usize,
        /// Vessel pixels after pruning.
        pixels_after: u64,
    },
}

/// High-level summary counts for one prediction.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Pixels inside the detected retinal field.
    pub field_pixel_count: u64,
    /// Pixels classified as vessel.
    pub vessel_pixel_count: u64,
}

impl SegmentSummary {
    pub(crate) fn new(dimensions: Dimensions, field: &Mask, vessels: &Mask) -> Self {
        Self {
            image_width: dimensions.width,
            image_height: dimensions.height,
            pixel_count: dimensions.pixel_count() as u64,
            field_pixel_count: field.count() as u64,
            vessel_pixel_count: vessels.count() as u64,
        }
    }
}

impl SegmentDiagnostics {
    /// Diagnostics of `stage`, if it ran.
    #[must_use]
    pub fn stage(&self, stage: Stage) -> Option<&StageDiagnostics> {
        self.stages.iter().find(|d| d.stage == stage)
    }

    /// One line per stage with its duration and metrics, framed by the
    /// image size and the field/vessel counts.
    #[must_use]
    pub fn report(&self) -> String {
        let summary = &self.summary;
        let header = format!(
            "{}x{} image, {} stages, {:.1} ms",
            summary.image_width,
            summary.image_height,
            self.stages.len(),
            millis(self.total_duration),
        );
        let rows = self.stages.iter().map(|d| {
            format!(
                "  {:<18}{:>9.2} ms  {}",
                d.stage.label(),
                millis(d.duration),
                d.metrics
            )
        });
        let footer = format!(
            "field {} px, vessels {} px",
            summary.field_pixel_count, summary.vessel_pixel_count
        );
        std::iter::once(header)
            .chain(rows)
            .chain(std::iter::once(footer))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for StageMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reduce {
                axis: [r, g, b],
                explained_variance_ratio,
                flipped,
            } => {
                let share = explained_variance_ratio * 100.0;
                write!(f, "axis {r:.2}/{g:.2}/{b:.2} carries {share:.0}%")?;
                if *flipped {
                    f.write_str(", negated")?;
                }
                Ok(())
            }
            Self::Range { min, max } => write!(f, "{min:.1}..{max:.1}"),
            Self::Blur { kernel_size, sigma } => {
                write!(f, "{kernel_size}x{kernel_size}, sigma {sigma}")
            }
            Self::Threshold { level: Some(level) } => write!(f, "level {level:.1}"),
            Self::Threshold { level: None } => f.write_str("no level"),
            Self::EdgeDetection {
                low_threshold,
                high_threshold,
                edge_pixel_count,
                ..
            } => write!(
                f,
                "{edge_pixel_count} px between {low_threshold:.1} and {high_threshold:.1}"
            ),
            Self::Morphology {
                kernel_size,
                pixels_before,
                pixels_after,
            } => write!(f, "element {kernel_size}, {pixels_before} -> {pixels_after} px"),
            Self::ContourTracing {
                contour_count,
                total_point_count,
                largest_area,
            } => write!(
                f,
                "{contour_count} contours of {total_point_count} points, largest {largest_area:.0}"
            ),
            Self::FieldFill {
                field_pixel_count,
                total_pixel_count,
            } => write!(f, "{field_pixel_count} of {total_pixel_count} px"),
            Self::Equalize { clip_limit, tiles } => {
                write!(f, "{tiles}x{tiles} tiles, clip {clip_limit}")
            }
            Self::Prune {
                min_area,
                components_before,
                components_after,
                pixels_after,
            } => write!(
                f,
                "{components_before} -> {components_after} pieces of {min_area}+ px, {pixels_after} px"
            ),
        }
    }
}

/// Number of non-zero pixels.
pub(crate) fn count_lit(image: &GrayImage) -> u64 {
    image.pixels().filter(|p| p.0[0] != 0).count() as u64
}

/// Observes each stage of a prediction.
///
/// `run` executes the stage; `describe` turns its output into metrics
/// and is only called by recorders that keep them.
pub trait StageRecorder {
    /// Execute one stage and return its output.
    fn record<T>(
        &mut self,
        stage: Stage,
        run: impl FnOnce() -> T,
        describe: impl FnOnce(&T) -> StageMetrics,
    ) -> T;
}

/// Recorder that only runs stages.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRecorder;

impl StageRecorder for NoopRecorder {
    fn record<T>(
        &mut self,
        _stage: Stage,
        run: impl FnOnce() -> T,
        _describe: impl FnOnce(&T) -> StageMetrics,
    ) -> T {
        run()
    }
}

/// Recorder that times every stage against a [`Clock`].
#[derive(Debug)]
pub struct TimingRecorder<'c, C: Clock> {
    clock: &'c C,
    stages: Vec<StageDiagnostics>,
}

impl<'c, C: Clock> TimingRecorder<'c, C> {
    /// Start recording with `clock`.
    #[must_use]
    pub const fn new(clock: &'c C) -> Self {
        Self {
            clock,
            stages: Vec::new(),
        }
    }

    /// Recorded stages, in execution order.
    #[must_use]
    pub fn into_stages(self) -> Vec<StageDiagnostics> {
        self.stages
    }
}

impl<C: Clock> StageRecorder for TimingRecorder<'_, C> {
    fn record<T>(
        &mut self,
        stage: Stage,
        run: impl FnOnce() -> T,
        describe: impl FnOnce(&T) -> StageMetrics,
    ) -> T {
        let start = self.clock.now();
        let output = run();
        let duration = self.clock.elapsed(&start);
        self.stages.push(StageDiagnostics {
            stage,
            duration,
            metrics: describe(&output),
        });
        output
    }
}

/// Predict the vessel mask of `image` while timing every stage.
///
/// The mask is identical to what [`Segmenter::predict`] returns.
///
/// # Errors
///
/// Same as [`Segmenter::predict`].
pub fn predict_with_diagnostics<C: Clock>(
    segmenter: &Segmenter,
    image: &RgbImage,
    clock: &C,
) -> Result<(Mask, SegmentDiagnostics), SegmentError> {
    let start = clock.now();
    let mut recorder = TimingRecorder::new(clock);
    let config = segmenter.config();

    let field = background::segment(config, image, &mut recorder)?;
    let vessels = vessels::segment(config, image, &field, &mut recorder)?;

    let total_duration = clock.elapsed(&start);
    let diagnostics = SegmentDiagnostics {
        stages: recorder.into_stages(),
        total_duration,
        summary: SegmentSummary::new(Dimensions::of(image), &field, &vessels),
    };
    Ok((vessels, diagnostics))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use super::*;

    /// Clock that advances one millisecond per reading.
    struct TickClock(Cell<u64>);

    impl Clock for TickClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.0.get();
            self.0.set(t + 1);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.0.get() - since)
        }
    }

    #[test]
    fn count_lit_counts_nonzero_pixels() {
        let mut img = GrayImage::new(10, 10);
        for i in 0..5 {
            img.put_pixel(i, 0, image::Luma([255]));
        }
        img.put_pixel(9, 9, image::Luma([1]));
        assert_eq!(count_lit(&img), 6);
    }

    #[test]
    fn noop_recorder_runs_without_describing() {
        let mut recorder = NoopRecorder;
        let value = recorder.record(Stage::Prune, || 41 + 1, |_| unreachable!());
        assert_eq!(value, 42);
    }

    #[test]
    fn timing_recorder_keeps_order_and_metrics() {
        let clock = TickClock(Cell::new(0));
        let mut recorder = TimingRecorder::new(&clock);
        let a = recorder.record(Stage::Reduce, || 1, |_| StageMetrics::Range { min: 0.0, max: 1.0 });
        let b = recorder.record(
            Stage::BackgroundBlur,
            || 2,
            |_| StageMetrics::Blur {
                kernel_size: 5,
                sigma: 10.0,
            },
        );
        assert_eq!((a, b), (1, 2));
        let stages = recorder.into_stages();
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[0].stage, Stage::Reduce);
        assert_eq!(stages[1].stage, Stage::BackgroundBlur);
        assert_eq!(stages[0].duration, Duration::from_millis(1));
    }

    fn sample() -> SegmentDiagnostics {
        SegmentDiagnostics {
            stages: vec![
                StageDiagnostics {
                    stage: Stage::EdgeDetection,
                    duration: Duration::from_millis(30),
                    metrics: StageMetrics::EdgeDetection {
                        low_threshold: 30.0,
                        high_threshold: 60.0,
                        edge_pixel_count: 500,
                        total_pixel_count: 10000,
                    },
                },
                StageDiagnostics {
                    stage: Stage::Prune,
                    duration: Duration::from_millis(10),
                    metrics: StageMetrics::Prune {
                        min_area: 64,
                        components_before: 12,
                        components_after: 3,
                        pixels_after: 800,
                    },
                },
            ],
            total_duration: Duration::from_millis(40),
            summary: SegmentSummary {
                image_width: 100,
                image_height: 100,
                pixel_count: 10000,
                field_pixel_count: 7000,
                vessel_pixel_count: 800,
            },
        }
    }

    #[test]
    fn report_has_one_line_per_stage() {
        let report = sample().report();
        let lines: Vec<_> = report.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "100x100 image, 2 stages, 40.0 ms");
        assert!(lines[1].contains("Edge Detection"));
        assert!(lines[1].contains("30.00 ms"));
        assert!(lines[2].contains("12 -> 3 pieces"));
        assert_eq!(lines[3], "field 7000 px, vessels 800 px");
    }

    #[test]
    fn threshold_metrics_display() {
        assert_eq!(StageMetrics::Threshold { level: Some(127.0) }.to_string(), "level 127.0");
        assert_eq!(StageMetrics::Threshold { level: None }.to_string(), "no level");
    }

    #[test]
    fn stage_lookup() {
        let diag = sample();
        assert!(diag.stage(Stage::Prune).is_some());
        assert!(diag.stage(Stage::Reduce).is_none());
    }

    #[test]
    fn json_reports_milliseconds() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!((json["total_ms"].as_f64().unwrap() - 40.0).abs() < 1e-9);
        assert!((json["stages"][1]["duration_ms"].as_f64().unwrap() - 10.0).abs() < 1e-9);
        assert_eq!(json["stages"][0]["stage"], "edge_detection");
        assert_eq!(json["stages"][1]["metrics"]["prune"]["components_after"], 3);
    }

    #[test]
    fn predict_with_diagnostics_matches_predict() {
        let image = RgbImage::from_fn(80, 80, |x, y| {
            let d = (f64::from(x) - 40.0).hypot(f64::from(y) - 40.0);
            if d > 30.0 {
                image::Rgb([0, 0, 0])
            } else if x == 40 || x == 41 {
                image::Rgb([40, 20, 10])
            } else {
                image::Rgb([170, 80, 40])
            }
        });
        let segmenter = Segmenter::new(crate::SegmenterConfig {
            mask_erode: 5,
            remove_small_obj_min_area: 1,
            ..crate::SegmenterConfig::default()
        })
        .unwrap();
        let clock = TickClock(Cell::new(0));
        let (mask, diag) = predict_with_diagnostics(&segmenter, &image, &clock).unwrap();
        assert_eq!(mask, segmenter.predict(&image).unwrap());
        assert_eq!(diag.stages.len(), 15);
        assert_eq!(diag.stages[0].stage, Stage::Reduce);
        assert_eq!(diag.stages[14].stage, Stage::Prune);
        assert_eq!(diag.summary.pixel_count, 6400);
        assert_eq!(diag.summary.vessel_pixel_count, mask.count() as u64);
        assert!(diag.total_duration >= Duration::from_millis(15));
    }
}
