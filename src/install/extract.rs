//! Streaming `.tar.gz` extraction
//!
//! Only regular files are materialized. Directories are implied by the
//! files inside them, and links or device nodes are skipped, so an archive
//! can never write outside the destination.

use crate::fsutil;
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};
use tar::Archive;

/// What an extraction produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractStats {
    pub files: usize,
    pub bytes: u64,
    pub skipped: usize,
}

/// Extract a gzip-compressed tar stream into `dest`
///
/// Fails with `TimedOut` once `timeout` has elapsed, and with `InvalidData`
/// for entries whose path is absolute or climbs out with `..`.
pub fn extract_tar_gz<R: Read>(reader: R, dest: &Path, timeout: Duration) -> io::Result<ExtractStats> {
    let reader = DeadlineReader::new(reader, timeout);
    let mut archive = Archive::new(GzDecoder::new(reader));
    let mut stats = ExtractStats::default();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_type = entry.header().entry_type();
        let name = entry.path()?.into_owned();

        if entry_type.is_dir() {
            continue;
        }
        if !entry_type.is_file() {
            log::debug!("Skipping {entry_type:?} entry {}", name.display());
            stats.skipped += 1;
            continue;
        }

        let target = dest.join(safe_relative(&name)?);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let mode = entry.header().mode()?;
        let mut file = File::create(&target)?;
        stats.bytes += io::copy(&mut entry, &mut file)?;
        fsutil::set_mode(&file, mode)?;
        stats.files += 1;
        log::trace!("Extracted {}", target.display());
    }

    Ok(stats)
}

/// Normalize an entry path, rejecting anything that escapes the root
fn safe_relative(name: &Path) -> io::Result<PathBuf> {
    let mut relative = PathBuf::new();
    for component in name.components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unsafe entry path {}", name.display()),
                ));
            }
        }
    }

    if relative.as_os_str().is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("empty entry path {:?}", name.display().to_string()),
        ));
    }
    Ok(relative)
}

/// Reader that refuses to continue past a deadline
///
/// The clock is checked between reads only; a source that can block inside
/// `read` must carry its own timeout.
struct DeadlineReader<R> {
    inner: R,
    /// `None` when the timeout is too large to represent
    deadline: Option<Instant>,
    timeout: Duration,
}

impl<R> DeadlineReader<R> {
    fn new(inner: R, timeout: Duration) -> Self {
        Self {
            inner,
            deadline: Instant::now().checked_add(timeout),
            timeout,
        }
    }
}

impl<R: Read> Read for DeadlineReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("extraction exceeded {}s", self.timeout.as_secs()),
            ));
        }
        self.inner.read(buf)
    }
}
