//! retina-eval: Score vessel segmentation against ground truth.
//!
//! Predicts the vessel mask of a training image, compares it with the
//! hand-labelled truth, and prints F1, sensitivity and accuracy. It can
//! also write the predictions, predict a held-out test image, and render
//! a collage of every image in a directory next to its prediction.
//!
//! Useful for:
//!
//! - Tuning blur, CLAHE and morphology parameters against a labelled image
//! - Measuring per-stage durations to identify bottlenecks
//! - Eyeballing results on a batch of unlabelled images
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin retina-eval -- [OPTIONS]
//! ```

#![allow(clippy::print_stdout)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use log::{error, info, warn};
use rayon::prelude::*;
use retina_io::Collage;
use retina_pipeline::diagnostics::{Clock, SegmentDiagnostics, predict_with_diagnostics};
use retina_pipeline::{ConfusionMatrix, Mask, RgbImage, RidgePolarity, Segmenter, SegmenterConfig};
use serde::Serialize;

/// Retinal vessel segmentation evaluation.
///
/// Segments the training image, scores it against its ground truth and
/// optionally writes predictions and a collage of further test images.
#[derive(Parser)]
#[command(name = "retina-eval", version)]
struct Cli {
    /// Training fundus photograph.
    #[arg(long, default_value = "data/x_train.tif")]
    train_image: PathBuf,

    /// Ground-truth vessel mask for the training image.
    #[arg(long, default_value = "data/y_train.gif")]
    train_truth: PathBuf,

    /// Held-out test photograph to predict.
    #[arg(long)]
    test_image: Option<PathBuf>,

    /// Directory of further photographs to predict into a collage.
    #[arg(long)]
    other_tests: Option<PathBuf>,

    /// File extension selecting images in `--other-tests`.
    #[arg(long, default_value = "tif")]
    other_ext: String,

    /// Write the training prediction to this file.
    #[arg(long)]
    train_prediction: Option<PathBuf>,

    /// Write the test prediction to this file.
    #[arg(long)]
    test_prediction: Option<PathBuf>,

    /// Write the collage of other tests to this file.
    #[arg(long)]
    collage: Option<PathBuf>,

    /// Image/prediction pairs per collage row.
    #[arg(long, default_value_t = 3, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..=64))]
    collage_columns: u32,

    /// Collage cell edge length in pixels.
    #[arg(long, default_value_t = 256, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..=4096))]
    collage_cell: u32,

    /// Background blur kernel size (odd).
    #[arg(long, default_value_t = SegmenterConfig::DEFAULT_BG_BLUR_KS)]
    bg_blur_ks: u32,

    /// Background blur sigma (0 derives it from the kernel size).
    #[arg(long, default_value_t = SegmenterConfig::DEFAULT_BG_BLUR_SIGMA)]
    bg_blur_sigma: f32,

    /// Unused; kept for configuration compatibility.
    #[arg(long, default_value_t = SegmenterConfig::DEFAULT_BG_CANNY_MIN_SCALE)]
    bg_canny_min_scale: f32,

    /// Unused; kept for configuration compatibility.
    #[arg(long, default_value_t = SegmenterConfig::DEFAULT_BG_CANNY_MAX_SCALE)]
    bg_canny_max_scale: f32,

    /// Edge dilation ellipse size.
    #[arg(long, default_value_t = SegmenterConfig::DEFAULT_BG_CANNY_DILATE)]
    bg_canny_dilate: u32,

    /// Field erosion ellipse size before vessel thresholding.
    #[arg(long, default_value_t = SegmenterConfig::DEFAULT_MASK_ERODE)]
    mask_erode: u32,

    /// Vessel blur kernel size (odd).
    #[arg(long, default_value_t = SegmenterConfig::DEFAULT_VESSEL_BLUR_KS)]
    vessel_blur_ks: u32,

    /// Vessel blur sigma (0 derives it from the kernel size).
    #[arg(long, default_value_t = SegmenterConfig::DEFAULT_VESSEL_BLUR_SIGMA)]
    vessel_blur_sigma: f32,

    /// Vessel reconnection ellipse size.
    #[arg(long, default_value_t = SegmenterConfig::DEFAULT_VESSEL_DILATE_KS)]
    vessel_dilate_ks: u32,

    /// Smallest vessel fragment kept, in pixels.
    #[arg(long, default_value_t = SegmenterConfig::DEFAULT_REMOVE_SMALL_OBJ_MIN_AREA)]
    remove_small_obj_min_area: u32,

    /// CLAHE clip limit.
    #[arg(long, default_value_t = SegmenterConfig::DEFAULT_CLAHE_CLIP_LIMIT)]
    clahe_clip_limit: f32,

    /// CLAHE tiles per axis.
    #[arg(long, default_value_t = SegmenterConfig::DEFAULT_CLAHE_KS)]
    clahe_ks: u32,

    /// Which ridges count as vessels.
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_POLARITY)]
    ridge_polarity: Polarity,

    /// Full segmenter config as a JSON string.
    ///
    /// When provided, all other segmenter parameter flags are ignored.
    /// Missing fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,

    /// Print metrics and diagnostics as JSON instead of the statistics block.
    #[arg(long)]
    json: bool,

    /// Print the per-stage diagnostics report for the training image.
    #[arg(long)]
    diagnostics: bool,
}

/// Ridge polarity selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Polarity {
    /// Dark lines on a bright background.
    Dark,
    /// Bright lines on a dark background.
    Bright,
    /// Either.
    Both,
}

/// Maps a [`RidgePolarity`] to the local CLI [`Polarity`] enum.
const fn polarity_from_pipeline(p: RidgePolarity) -> Polarity {
    match p {
        RidgePolarity::Dark => Polarity::Dark,
        RidgePolarity::Bright => Polarity::Bright,
        RidgePolarity::Both => Polarity::Both,
    }
}

/// The CLI default polarity, derived from
/// [`SegmenterConfig::DEFAULT_RIDGE_POLARITY`] so the two cannot silently
/// diverge.
const CLI_DEFAULT_POLARITY: Polarity =
    polarity_from_pipeline(SegmenterConfig::DEFAULT_RIDGE_POLARITY);

/// Build a [`SegmenterConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<SegmenterConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("error parsing --config-json: {e}"));
    }

    Ok(SegmenterConfig {
        bg_blur_ks: cli.bg_blur_ks,
        bg_blur_sigma: cli.bg_blur_sigma,
        bg_canny_min_scale: cli.bg_canny_min_scale,
        bg_canny_max_scale: cli.bg_canny_max_scale,
        bg_canny_dilate: cli.bg_canny_dilate,
        mask_erode: cli.mask_erode,
        vessel_blur_ks: cli.vessel_blur_ks,
        vessel_blur_sigma: cli.vessel_blur_sigma,
        vessel_dilate_ks: cli.vessel_dilate_ks,
        remove_small_obj_min_area: cli.remove_small_obj_min_area,
        clahe_clip_limit: cli.clahe_clip_limit,
        clahe_ks: cli.clahe_ks,
        ridge_polarity: match cli.ridge_polarity {
            Polarity::Dark => RidgePolarity::Dark,
            Polarity::Bright => RidgePolarity::Bright,
            Polarity::Both => RidgePolarity::Both,
        },
    })
}

/// Training-set scores, as printed by `--json`.
#[derive(Serialize)]
struct Evaluation {
    image: PathBuf,
    truth: PathBuf,
    confusion: ConfusionMatrix,
    f1: f64,
    recall: f64,
    accuracy: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    diagnostics: Option<SegmentDiagnostics>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            error!("{msg}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let config = config_from_cli(cli)?;
    let segmenter = Segmenter::new(config).map_err(|e| format!("invalid configuration: {e}"))?;
    info!("config: {:?}", segmenter.config());

    let evaluation = evaluate_train(cli, &segmenter)?;
    if cli.json {
        let json = serde_json::to_string_pretty(&evaluation)
            .map_err(|e| format!("error serializing evaluation: {e}"))?;
        println!("{json}");
    } else {
        print_statistics(&evaluation);
        if let Some(ref diagnostics) = evaluation.diagnostics {
            println!("{}", diagnostics.report());
        }
    }

    if let Some(ref test_image) = cli.test_image {
        let image = retina_io::load_rgb(test_image).map_err(|e| e.to_string())?;
        let prediction = predict(&segmenter, test_image, &image)?;
        if let Some(ref path) = cli.test_prediction {
            info!("saving prediction of {} in {}", test_image.display(), path.display());
            retina_io::save_mask(path, &prediction).map_err(|e| e.to_string())?;
        }
    } else if cli.test_prediction.is_some() {
        warn!("--test-prediction given without --test-image; nothing to save");
    }

    if let Some(ref dir) = cli.other_tests {
        let pairs = predict_batch(&segmenter, dir, &cli.other_ext)?;
        match cli.collage {
            Some(ref path) => {
                let collage = Collage {
                    columns: cli.collage_columns,
                    cell_width: cli.collage_cell,
                    cell_height: cli.collage_cell,
                    ..Collage::default()
                };
                info!("saving collage of {} prediction(s) in {}", pairs.len(), path.display());
                let canvas = collage
                    .render(&pairs)
                    .ok_or_else(|| format!("collage of {} pair(s) is too large", pairs.len()))?;
                retina_io::save_rgb(path, &canvas).map_err(|e| e.to_string())?;
            }
            None => info!("predicted {} other test(s); no --collage to write", pairs.len()),
        }
    }

    Ok(())
}

/// Predict the training image and score it against its truth.
fn evaluate_train(cli: &Cli, segmenter: &Segmenter) -> Result<Evaluation, String> {
    let image = retina_io::load_rgb(&cli.train_image).map_err(|e| e.to_string())?;
    let truth = retina_io::load_mask(&cli.train_truth).map_err(|e| e.to_string())?;

    let (prediction, diagnostics) = if cli.diagnostics || cli.json {
        let (mask, diagnostics) = predict_with_diagnostics(segmenter, &image, &StdClock)
            .map_err(|e| format!("prediction failed for {}: {e}", cli.train_image.display()))?;
        (mask, Some(diagnostics))
    } else {
        (predict(segmenter, &cli.train_image, &image)?, None)
    };

    let confusion = ConfusionMatrix::from_masks(&prediction, &truth)
        .map_err(|e| format!("cannot score {}: {e}", cli.train_truth.display()))?;

    if let Some(ref path) = cli.train_prediction {
        info!("saving prediction of {} in {}", cli.train_image.display(), path.display());
        retina_io::save_mask(path, &prediction).map_err(|e| e.to_string())?;
    }

    Ok(Evaluation {
        image: cli.train_image.clone(),
        truth: cli.train_truth.clone(),
        f1: confusion.f1(),
        recall: confusion.recall(),
        accuracy: confusion.accuracy(),
        confusion,
        diagnostics,
    })
}

fn predict(segmenter: &Segmenter, path: &Path, image: &RgbImage) -> Result<Mask, String> {
    segmenter
        .predict(image)
        .map_err(|e| format!("prediction failed for {}: {e}", path.display()))
}

/// Predict every matching image in `dir` in parallel. Images that fail to
/// segment are logged and left out.
fn predict_batch(
    segmenter: &Segmenter,
    dir: &Path,
    extension: &str,
) -> Result<Vec<(RgbImage, Mask)>, String> {
    let images = retina_io::load_dir_rgb(dir, extension).map_err(|e| e.to_string())?;
    info!("predicting {} other test sample(s)", images.len());

    let pairs: Vec<_> = images
        .into_par_iter()
        .filter_map(|(path, image)| match segmenter.predict(&image) {
            Ok(mask) => Some((image, mask)),
            Err(e) => {
                warn!("skipping {}: {e}", path.display());
                None
            }
        })
        .collect();
    Ok(pairs)
}

fn print_statistics(evaluation: &Evaluation) {
    println!("Evaluating {} against {}", evaluation.image.display(), evaluation.truth.display());
    println!("======== Statistics ========");
    println!("F1 Score: {}", percent(evaluation.f1));
    println!("Sensitivity/Recall: {}", percent(evaluation.recall));
    println!("Accuracy: {}", percent(evaluation.accuracy));
    println!("============================");
}

fn percent(ratio: f64) -> String {
    format!("{:.2}%", ratio * 100.0)
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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn default_flags_give_default_config() {
        let cli = Cli::try_parse_from(["retina-eval"]).unwrap();
        assert_eq!(config_from_cli(&cli).unwrap(), SegmenterConfig::default());
        assert_eq!(cli.other_ext, "tif");
        assert_eq!(cli.collage_columns, 3);
    }

    #[test]
    fn flags_override_fields() {
        let cli = Cli::try_parse_from([
            "retina-eval",
            "--mask-erode",
            "12",
            "--clahe-clip-limit",
            "3.5",
            "--ridge-polarity",
            "dark",
        ])
        .unwrap();
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(config.mask_erode, 12);
        assert!((config.clahe_clip_limit - 3.5).abs() < f32::EPSILON);
        assert_eq!(config.ridge_polarity, RidgePolarity::Dark);
    }

    #[test]
    fn config_json_replaces_flags() {
        let cli = Cli::try_parse_from([
            "retina-eval",
            "--mask-erode",
            "12",
            "--config-json",
            r#"{"vessel_blur_ks": 7, "ridge_polarity": "bright"}"#,
        ])
        .unwrap();
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(config.vessel_blur_ks, 7);
        assert_eq!(config.mask_erode, SegmenterConfig::DEFAULT_MASK_ERODE);
        assert_eq!(config.ridge_polarity, RidgePolarity::Bright);
    }

    #[test]
    fn malformed_config_json_is_reported() {
        let cli = Cli::try_parse_from(["retina-eval", "--config-json", "{nope"]).unwrap();
        let err = config_from_cli(&cli).unwrap_err();
        assert!(err.starts_with("error parsing --config-json"), "{err}");
    }

    #[test]
    fn zero_collage_columns_is_rejected() {
        assert!(Cli::try_parse_from(["retina-eval", "--collage-columns", "0"]).is_err());
    }

    #[test]
    fn oversized_collage_layout_is_rejected() {
        assert!(Cli::try_parse_from(["retina-eval", "--collage-cell", "4097"]).is_err());
        assert!(Cli::try_parse_from(["retina-eval", "--collage-columns", "65"]).is_err());
        let cli = Cli::try_parse_from(["retina-eval", "--collage-cell", "4096"]).unwrap();
        assert_eq!(cli.collage_cell, 4096);
    }

    #[test]
    fn default_polarity_matches_pipeline() {
        assert_eq!(
            CLI_DEFAULT_POLARITY,
            polarity_from_pipeline(SegmenterConfig::default().ridge_polarity)
        );
    }

    #[test]
    fn percent_has_two_decimals() {
        assert_eq!(percent(0.123_456), "12.35%");
        assert_eq!(percent(1.0), "100.00%");
    }
}
