// backuprunner/src/backup/compress.rs
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io;
use std::path::Path;

use crate::errors::{BackupError, Result};

/// Gzips `source` into `dest` and returns the compressed size in bytes.
///
/// The caller owns cleanup of both files on failure.
pub fn gzip_file(source: &Path, dest: &Path) -> Result<u64> {
    let failed = |reason: String| BackupError::CompressionFailed {
        path: dest.to_path_buf(),
        reason,
    };

    let mut input = File::open(source)
        .map_err(|e| failed(format!("cannot open {}: {}", source.display(), e)))?;
    let output = File::create(dest).map_err(|e| failed(e.to_string()))?;

    let mut encoder = GzEncoder::new(output, Compression::default());
    io::copy(&mut input, &mut encoder).map_err(|e| failed(e.to_string()))?;
    let output = encoder.finish().map_err(|e| failed(e.to_string()))?;

    let size = output.metadata().map_err(|e| failed(e.to_string()))?.len();
    Ok(size)
}
