//! Archive extraction
//!
//! Extraction treats the archive as untrusted input. Every entry name and the
//! declared sizes are checked before anything is written; the contents are then
//! streamed into a staging directory next to the target and swapped into place
//! only once every entry has been written. A rejected or failed extraction never
//! leaves partial output behind.

use coursepack_core::AppError;
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Component, Path, PathBuf};
use zip::result::ZipError;
use zip::ZipArchive;

const COPY_BUFFER_SIZE: usize = 64 * 1024;
const DEFAULT_MAX_TOTAL_BYTES: u64 = 1024 * 1024 * 1024;
const DEFAULT_MAX_FILES: usize = 10_000;
const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

/// Archive extraction errors
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Archive cannot be read: {0}")]
    Corrupt(String),

    #[error("Archive entry has an unsafe path: {0}")]
    UnsafePath(String),

    #[error("Archive exceeds extraction limits: {0}")]
    TooLarge(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<ExtractError> for AppError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::Corrupt(_) | ExtractError::UnsafePath(_) => {
                AppError::CorruptArchive(err.to_string())
            }
            ExtractError::TooLarge(_) => AppError::ArchiveTooLarge(err.to_string()),
            ExtractError::Io(e) => AppError::IoFailure(e.to_string()),
        }
    }
}

/// Bounds applied to a single extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractLimits {
    /// Maximum total decompressed bytes across all entries.
    pub max_total_bytes: u64,
    /// Maximum number of file entries (directories are not counted).
    pub max_files: usize,
}

impl Default for ExtractLimits {
    fn default() -> Self {
        Self {
            max_total_bytes: DEFAULT_MAX_TOTAL_BYTES,
            max_files: DEFAULT_MAX_FILES,
        }
    }
}

/// Summary of a completed extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtractReport {
    pub files: usize,
    pub directories: usize,
    pub total_bytes: u64,
}

/// Entry validated during the pre-flight pass.
struct PlannedEntry {
    index: usize,
    relative: PathBuf,
    is_dir: bool,
}

/// Extract `archive` into `target` on a blocking thread.
pub async fn extract_archive(
    archive: PathBuf,
    target: PathBuf,
    limits: ExtractLimits,
) -> Result<ExtractReport, ExtractError> {
    tokio::task::spawn_blocking(move || extract_archive_blocking(&archive, &target, &limits))
        .await
        .map_err(|e| ExtractError::Io(io::Error::other(format!("extraction task failed: {}", e))))?
}

/// Extract `archive` into `target`, replacing whatever `target` held before.
///
/// The whole archive is rejected when any entry would land outside `target`,
/// is a symlink, or when the limits are exceeded.
pub fn extract_archive_blocking(
    archive: &Path,
    target: &Path,
    limits: &ExtractLimits,
) -> Result<ExtractReport, ExtractError> {
    let start = std::time::Instant::now();
    let file = File::open(archive)?;
    let mut zip = ZipArchive::new(BufReader::new(file)).map_err(corrupt)?;

    let plan = plan_entries(&mut zip, limits)?;

    let parent = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    // Dropping the TempDir removes the staging tree on every early return.
    let staging = tempfile::Builder::new()
        .prefix(".extract-")
        .tempdir_in(&parent)?;

    let report = write_entries(&mut zip, &plan, staging.path(), limits)?;

    replace_dir(staging.path(), target)?;

    tracing::info!(
        archive = %archive.display(),
        target = %target.display(),
        files = report.files,
        directories = report.directories,
        bytes = report.total_bytes,
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Archive extracted"
    );

    Ok(report)
}

/// Validate every entry name and the declared sizes without decompressing anything.
fn plan_entries<R: Read + io::Seek>(
    zip: &mut ZipArchive<R>,
    limits: &ExtractLimits,
) -> Result<Vec<PlannedEntry>, ExtractError> {
    let mut plan = Vec::with_capacity(zip.len());
    let mut files = 0usize;
    let mut declared_bytes = 0u64;

    for index in 0..zip.len() {
        let entry = zip.by_index_raw(index).map_err(corrupt)?;
        let name = entry.name().to_string();

        if let Some(mode) = entry.unix_mode() {
            if mode & S_IFMT == S_IFLNK {
                return Err(ExtractError::UnsafePath(format!("symlink entry: {}", name)));
            }
        }

        let relative = sanitize_entry_path(&name)?;
        let is_dir = entry.is_dir();

        if relative.as_os_str().is_empty() {
            if is_dir {
                continue;
            }
            return Err(ExtractError::UnsafePath(format!("empty entry name: {:?}", name)));
        }

        if !is_dir {
            files += 1;
            declared_bytes = declared_bytes.saturating_add(entry.size());
            if files > limits.max_files {
                return Err(ExtractError::TooLarge(format!(
                    "more than {} files",
                    limits.max_files
                )));
            }
            if declared_bytes > limits.max_total_bytes {
                return Err(ExtractError::TooLarge(format!(
                    "more than {} bytes uncompressed",
                    limits.max_total_bytes
                )));
            }
        }

        plan.push(PlannedEntry {
            index,
            relative,
            is_dir,
        });
    }

    Ok(plan)
}

/// Stream every planned entry into `root`, re-checking the byte limit on actual output.
fn write_entries<R: Read + io::Seek>(
    zip: &mut ZipArchive<R>,
    plan: &[PlannedEntry],
    root: &Path,
    limits: &ExtractLimits,
) -> Result<ExtractReport, ExtractError> {
    let mut report = ExtractReport::default();
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];

    for planned in plan {
        let out_path = root.join(&planned.relative);

        if planned.is_dir {
            fs::create_dir_all(&out_path)?;
            report.directories += 1;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut entry = zip.by_index(planned.index).map_err(corrupt)?;
        let mut out = File::create(&out_path)?;

        loop {
            let n = entry
                .read(&mut buf)
                .map_err(|e| ExtractError::Corrupt(format!("{}: {}", entry.name(), e)))?;
            if n == 0 {
                break;
            }
            report.total_bytes += n as u64;
            // Declared sizes can lie; the real output is what counts.
            if report.total_bytes > limits.max_total_bytes {
                return Err(ExtractError::TooLarge(format!(
                    "more than {} bytes uncompressed",
                    limits.max_total_bytes
                )));
            }
            out.write_all(&buf[..n])?;
        }

        out.flush()?;
        report.files += 1;
    }

    Ok(report)
}

/// Tear down the previous target (if any) and move the staging tree into its place.
fn replace_dir(staging: &Path, target: &Path) -> Result<(), ExtractError> {
    match fs::symlink_metadata(target) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(target)?,
        Ok(_) => fs::remove_file(target)?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    fs::rename(staging, target)?;
    Ok(())
}

/// Turn a raw entry name into a relative path that cannot leave the extraction root.
fn sanitize_entry_path(name: &str) -> Result<PathBuf, ExtractError> {
    if name.contains('\0') {
        return Err(ExtractError::UnsafePath(name.escape_default().to_string()));
    }

    let normalized = name.replace('\\', "/");
    if normalized.starts_with('/') || has_drive_prefix(&normalized) {
        return Err(ExtractError::UnsafePath(name.to_string()));
    }

    let mut relative = PathBuf::new();
    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ExtractError::UnsafePath(name.to_string()));
            }
        }
    }

    Ok(relative)
}

fn has_drive_prefix(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

fn corrupt(err: ZipError) -> ExtractError {
    ExtractError::Corrupt(err.to_string())
}
