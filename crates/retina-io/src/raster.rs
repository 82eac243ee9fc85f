//! Reading and writing raster files.
//!
//! Formats are chosen by content on read and by file extension on write.
//! TIFF, PNG, JPEG, GIF and BMP are supported.

use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageReader};
use log::{debug, info};
use retina_pipeline::{GrayImage, Mask, RgbImage};

use crate::error::IoError;

/// Load an image from `path` and convert it to 8-bit RGB.
///
/// # Errors
///
/// Returns [`IoError::Read`] if the file cannot be opened and
/// [`IoError::Decode`] if its contents are not a supported image.
pub fn load_rgb(path: impl AsRef<Path>) -> Result<RgbImage, IoError> {
    let path = path.as_ref();
    let image = decode(path)?;
    info!(
        "read {} ({}x{}, {:?})",
        path.display(),
        image.width(),
        image.height(),
        image.color(),
    );
    Ok(image.into_rgb8())
}

/// Load a mask from `path`. Any pixel whose luma is non-zero is `true`.
///
/// # Errors
///
/// Same as [`load_rgb`].
pub fn load_mask(path: impl AsRef<Path>) -> Result<Mask, IoError> {
    let path = path.as_ref();
    let image = decode(path)?;
    let mask = Mask::from_gray(&image.into_luma8());
    info!(
        "read mask {} ({}, {} set)",
        path.display(),
        mask.dimensions(),
        mask.count(),
    );
    Ok(mask)
}

/// Load every file in `dir` whose extension matches `extension`
/// (case-insensitive, without the dot), sorted by file name.
///
/// # Errors
///
/// Returns [`IoError::Read`] if the directory cannot be listed, or the
/// first error from [`load_rgb`].
pub fn load_dir_rgb(
    dir: impl AsRef<Path>,
    extension: &str,
) -> Result<Vec<(PathBuf, RgbImage)>, IoError> {
    let dir = dir.as_ref();
    let read_error = |source: std::io::Error| IoError::Read {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_error)? {
        let path = entry.map_err(read_error)?.path();
        if path.is_file() && has_extension(&path, extension) {
            paths.push(path);
        } else {
            debug!("skipping {}", path.display());
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    info!(
        "found {} .{extension} file(s) in {}",
        paths.len(),
        dir.display()
    );

    paths
        .into_iter()
        .map(|path| load_rgb(&path).map(|image| (path, image)))
        .collect()
}

/// Write `mask` to `path` as black (`false`) and white (`true`).
///
/// # Errors
///
/// Returns [`IoError::Encode`] if the extension names no supported format
/// or the file cannot be written.
pub fn save_mask(path: impl AsRef<Path>, mask: &Mask) -> Result<(), IoError> {
    let path = path.as_ref();
    save_gray(path, &mask.to_gray())?;
    info!(
        "wrote mask {} ({}, {} set)",
        path.display(),
        mask.dimensions(),
        mask.count(),
    );
    Ok(())
}

/// Write `image` to `path`.
///
/// # Errors
///
/// Returns [`IoError::Encode`] if the extension names no supported format
/// or the file cannot be written.
pub fn save_rgb(path: impl AsRef<Path>, image: &RgbImage) -> Result<(), IoError> {
    let path = path.as_ref();
    image.save(path).map_err(|source| IoError::Encode {
        path: path.to_path_buf(),
        source,
    })?;
    info!(
        "wrote {} ({}x{})",
        path.display(),
        image.width(),
        image.height()
    );
    Ok(())
}

fn decode(path: &Path) -> Result<DynamicImage, IoError> {
    ImageReader::open(path)
        .and_then(ImageReader::with_guessed_format)
        .map_err(|source| IoError::Read {
            path: path.to_path_buf(),
            source,
        })?
        .decode()
        .map_err(|source| IoError::Decode {
            path: path.to_path_buf(),
            source,
        })
}

fn save_gray(path: &Path, image: &GrayImage) -> Result<(), IoError> {
    image.save(path).map_err(|source| IoError::Encode {
        path: path.to_path_buf(),
        source,
    })
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension.trim_start_matches('.')))
}
