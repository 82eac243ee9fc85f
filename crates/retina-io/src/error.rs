use std::path::PathBuf;

/// Errors from reading or writing image files.
///
/// Every variant carries the offending path.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// The file or directory could not be opened or listed.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// Path that failed.
        path: PathBuf,
        /// Underlying filesystem error.
        source: std::io::Error,
    },

    /// The file was read but is not a decodable image.
    #[error("failed to decode image {}: {source}", path.display())]
    Decode {
        /// Path that failed.
        path: PathBuf,
        /// Underlying codec error.
        source: image::ImageError,
    },

    /// The image could not be encoded or written.
    #[error("failed to write image {}: {source}", path.display())]
    Encode {
        /// Path that failed.
        path: PathBuf,
        /// Underlying codec error.
        source: image::ImageError,
    },
}

impl IoError {
    /// The path the failed operation was working on.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Read { path, .. } | Self::Decode { path, .. } | Self::Encode { path, .. } => path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_path() {
        let err = IoError::Read {
            path: PathBuf::from("data/missing.tif"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        let message = err.to_string();
        assert!(message.starts_with("failed to read data/missing.tif: "), "{message}");
        assert_eq!(err.path(), std::path::Path::new("data/missing.tif"));
    }
}
