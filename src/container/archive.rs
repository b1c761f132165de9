//! Staging archive construction for file injection.
//!
//! Docker's archive endpoint accepts a tar stream, so uploaded files are
//! wrapped in a single-entry gzipped tar before delivery.

use std::fs::File;
use std::io;
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;
use tracing::debug;

/// Build a gzipped tar containing just `staged`, stored under its bare file
/// name so injection lands the file directly at the destination path.
pub fn build_file_archive(staged: &Path, archive: &Path) -> io::Result<()> {
    let file_name = staged
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "staged path has no file name"))?;

    let encoder = GzEncoder::new(File::create(archive)?, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.append_path_with_name(staged, file_name)?;
    builder.into_inner()?.finish()?;
    Ok(())
}

/// Delete a staging file, logging instead of failing: cleanup is
/// best-effort and never reported to the caller.
pub fn remove_quietly(path: &Path) {
    if let Err(err) = std::fs::remove_file(path) {
        debug!(path = %path.display(), "removing staging file: {err}");
    }
}
