//! retina-io: Filesystem I/O and collage rendering.
//!
//! Loads fundus photographs and ground-truth masks from disk, writes
//! predicted masks back out, and lays out (input, prediction) pairs in a
//! single summary image. All image processing lives in
//! `retina-pipeline`; this crate only moves pixels between files and
//! memory.

pub mod collage;
pub mod error;
pub mod raster;

pub use collage::Collage;
pub use error::IoError;
pub use raster::{load_dir_rgb, load_mask, load_rgb, save_mask, save_rgb};
