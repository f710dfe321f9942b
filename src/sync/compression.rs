//! Gzip compression of files prior to upload.
//!
//! Compressed copies are written to a temporary file whose lifetime is tied
//! to a [`TempPath`]: dropping it (or calling `close`) removes the file.

use flate2::write::GzEncoder;
use flate2::Compression as GzipCompression;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::TempPath;

use crate::error::FileError;

const TEMP_PREFIX: &str = "s3uploader";

/// Compression applied to an uploaded object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionType {
    /// Uploaded as-is.
    #[default]
    None,
    /// Gzip stream, served with `Content-Encoding: gzip`.
    Gzip,
}

impl CompressionType {
    /// Value for the `Content-Encoding` header, if any.
    pub fn content_encoding(&self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Gzip => Some("gzip"),
        }
    }
}

/// Compression level (1-9, where 1 is fastest-lowest and 9 is slowest-highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionLevel(u8);

impl Default for CompressionLevel {
    fn default() -> Self {
        Self::max()
    }
}

impl CompressionLevel {
    /// Create a new compression level (clamped to 1-9).
    pub fn new(level: u8) -> Self {
        Self(level.clamp(1, 9))
    }

    /// Maximum compression (level 9).
    pub fn max() -> Self {
        Self(9)
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

/// Write a gzip copy of `source` to a new temporary file.
///
/// The temp file lives in `temp_dir` when given, otherwise in the system
/// temp directory. On error nothing is left behind.
pub fn compress_to_temp(
    source: &Path,
    level: CompressionLevel,
    temp_dir: Option<&Path>,
) -> Result<TempPath, FileError> {
    let wrap = |source_err: io::Error| FileError::Compress {
        path: source.to_path_buf(),
        source: source_err,
    };

    let mut builder = tempfile::Builder::new();
    builder.prefix(TEMP_PREFIX);
    let temp = match temp_dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
    .map_err(wrap)?;

    // `temp` is removed on drop if anything below fails.
    let input = File::open(source).map_err(wrap)?;
    let mut reader = BufReader::new(input);

    let (file, path) = temp.into_parts();
    let mut encoder = GzEncoder::new(
        BufWriter::new(file),
        GzipCompression::new(level.value() as u32),
    );
    io::copy(&mut reader, &mut encoder).map_err(wrap)?;
    encoder
        .finish()
        .and_then(|mut writer| writer.flush())
        .map_err(wrap)?;

    Ok(path)
}

/// Compress a file on the blocking pool.
pub async fn compress_file_async(
    source: PathBuf,
    level: CompressionLevel,
    temp_dir: Option<PathBuf>,
) -> Result<TempPath, FileError> {
    let path = source.clone();
    tokio::task::spawn_blocking(move || compress_to_temp(&source, level, temp_dir.as_deref()))
        .await
        .map_err(|e| FileError::Compress {
            path,
            source: io::Error::other(e),
        })?
}
