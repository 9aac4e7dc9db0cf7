//! # weasyprint-probe
//!
//! Locate the [WeasyPrint](https://weasyprint.org/) executable and check its
//! version, once per process, so a render service can fail fast at startup
//! instead of on the first request.
//!
//! ## How it works
//!
//! On first call to [`ensure_weasyprint`]:
//!
//! 1. If `WEASYPRINT_BIN` is set, that path is used (and must exist).
//! 2. Otherwise every directory in `PATH` is searched for `weasyprint`
//!    (`weasyprint.exe` on Windows).
//! 3. The binary is run with `--version` and the output is parsed.
//! 4. Versions older than [`MIN_MAJOR_VERSION`] are rejected.
//!
//! Subsequent calls return the cached [`Installation`] without spawning
//! anything.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use weasyprint_probe::ensure_weasyprint;
//!
//! let install = ensure_weasyprint().expect("WeasyPrint unavailable");
//! println!("{} at {}", install.version, install.path.display());
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use thiserror::Error;

// ── Public constants ─────────────────────────────────────────────────────────

/// Oldest major release accepted. 53 is the first release with the
/// `--media-type` and `--presentational-hints` flags the gateway passes.
pub const MIN_MAJOR_VERSION: u32 = 53;

/// Environment variable pointing at an explicit executable.
pub const BIN_ENV: &str = "WEASYPRINT_BIN";

#[cfg(windows)]
const EXECUTABLE_NAME: &str = "weasyprint.exe";
#[cfg(not(windows))]
const EXECUTABLE_NAME: &str = "weasyprint";

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned while locating or probing WeasyPrint.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// No executable on `PATH`.
    #[error("WeasyPrint executable not found in {searched} PATH entries (set {BIN_ENV} to override)")]
    NotFound { searched: usize },

    /// `WEASYPRINT_BIN` names a file that does not exist.
    #[error("{BIN_ENV} points to '{path}', which does not exist")]
    OverrideMissing { path: PathBuf },

    /// The executable could not be started.
    #[error("Failed to launch '{path}': {source}")]
    Launch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `weasyprint --version` exited unsuccessfully.
    #[error("'{path} --version' failed ({status}): {stderr}")]
    VersionCommandFailed {
        path: PathBuf,
        status: String,
        stderr: String,
    },

    /// The version output did not contain a recognisable version number.
    #[error("Unrecognised version output: {output:?}")]
    UnrecognisedVersion { output: String },

    /// The installed release is older than [`MIN_MAJOR_VERSION`].
    #[error("WeasyPrint {found} is too old; version {minimum} or newer is required")]
    TooOld { found: Version, minimum: u32 },
}

// ── Types ────────────────────────────────────────────────────────────────────

/// A `major.minor` WeasyPrint release number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// A probed, usable WeasyPrint installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installation {
    pub path: PathBuf,
    pub version: Version,
}

// ── Thread-safe singleton ────────────────────────────────────────────────────

static INSTALLATION: OnceLock<Installation> = OnceLock::new();

// ── Public API ───────────────────────────────────────────────────────────────

/// Locate, probe and cache the WeasyPrint installation.
///
/// # Thread safety
///
/// Safe to call from multiple threads; concurrent first calls may each probe,
/// but only one result is kept.
pub fn ensure_weasyprint() -> Result<Installation, ProbeError> {
    if let Some(install) = INSTALLATION.get() {
        return Ok(install.clone());
    }

    let path = find_executable()?;
    let install = probe_at(&path)?;

    let _ = INSTALLATION.set(install.clone());
    Ok(install)
}

/// Resolve the executable path from `WEASYPRINT_BIN` or `PATH`.
pub fn find_executable() -> Result<PathBuf, ProbeError> {
    if let Some(value) = std::env::var_os(BIN_ENV) {
        let path = PathBuf::from(value);
        if path.is_file() {
            return Ok(path);
        }
        return Err(ProbeError::OverrideMissing { path });
    }

    let dirs: Vec<PathBuf> = std::env::var_os("PATH")
        .map(|p| std::env::split_paths(&p).collect())
        .unwrap_or_default();

    search_dirs(&dirs).ok_or(ProbeError::NotFound {
        searched: dirs.len(),
    })
}

/// Run `<path> --version` and check the result against [`MIN_MAJOR_VERSION`].
pub fn probe_at(path: &Path) -> Result<Installation, ProbeError> {
    let output = Command::new(path)
        .arg("--version")
        .output()
        .map_err(|source| ProbeError::Launch {
            path: path.to_path_buf(),
            source,
        })?;

    if !output.status.success() {
        return Err(ProbeError::VersionCommandFailed {
            path: path.to_path_buf(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let version = parse_version(&stdout).ok_or_else(|| ProbeError::UnrecognisedVersion {
        output: stdout.trim().to_string(),
    })?;

    if version.major < MIN_MAJOR_VERSION {
        return Err(ProbeError::TooOld {
            found: version,
            minimum: MIN_MAJOR_VERSION,
        });
    }

    Ok(Installation {
        path: path.to_path_buf(),
        version,
    })
}

/// Extract the release number from `weasyprint --version` output,
/// e.g. `"WeasyPrint version 62.3"`.
pub fn parse_version(output: &str) -> Option<Version> {
    let token = output
        .split_whitespace()
        .find(|t| t.starts_with(|c: char| c.is_ascii_digit()))?;

    let mut parts = token.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts
        .next()
        .and_then(|m| {
            let digits: String = m.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().ok()
        })
        .unwrap_or(0);

    Some(Version { major, minor })
}

// ── Internal helpers ─────────────────────────────────────────────────────────

fn search_dirs(dirs: &[PathBuf]) -> Option<PathBuf> {
    dirs.iter()
        .map(|d| d.join(EXECUTABLE_NAME))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_release_banner() {
        assert_eq!(
            parse_version("WeasyPrint version 62.3\n"),
            Some(Version { major: 62, minor: 3 })
        );
    }

    #[test]
    fn parses_major_only_and_suffixes() {
        assert_eq!(
            parse_version("WeasyPrint version 60"),
            Some(Version { major: 60, minor: 0 })
        );
        assert_eq!(
            parse_version("WeasyPrint version 61.0rc1"),
            Some(Version { major: 61, minor: 0 })
        );
    }

    #[test]
    fn rejects_output_without_number() {
        assert_eq!(parse_version("weasyprint: command not understood"), None);
        assert_eq!(parse_version(""), None);
    }

    #[test]
    fn versions_order_numerically() {
        let old = Version { major: 52, minor: 5 };
        let new = Version { major: 53, minor: 0 };
        assert!(old < new);
        assert_eq!(new.to_string(), "53.0");
    }

    #[test]
    fn missing_binary_is_a_launch_error() {
        let err = probe_at(Path::new("/definitely/not/here/weasyprint")).unwrap_err();
        assert!(matches!(err, ProbeError::Launch { .. }), "got: {err}");
    }

    #[test]
    fn search_skips_directories_without_binary() {
        let empty = tempfile::tempdir().unwrap();
        assert_eq!(search_dirs(&[empty.path().to_path_buf()]), None);
    }

    #[cfg(unix)]
    #[test]
    fn search_finds_executable_and_probe_reads_version() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join(EXECUTABLE_NAME);
        std::fs::write(&bin, "#!/bin/sh\necho 'WeasyPrint version 62.3'\n").unwrap();
        std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();

        let found = search_dirs(&[dir.path().to_path_buf()]).expect("should find fake binary");
        assert_eq!(found, bin);

        let install = probe_at(&found).expect("probe should succeed");
        assert_eq!(install.version, Version { major: 62, minor: 3 });
    }

    #[cfg(unix)]
    #[test]
    fn probe_rejects_old_release() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join(EXECUTABLE_NAME);
        std::fs::write(&bin, "#!/bin/sh\necho 'WeasyPrint version 52.5'\n").unwrap();
        std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();

        let err = probe_at(&bin).unwrap_err();
        assert!(matches!(err, ProbeError::TooOld { .. }), "got: {err}");
    }
}
