//! Writing certificates to the output folder
//!
//! Filenames are derived from the participant name. A certificate never
//! replaces one written earlier in the same run; files left over from
//! earlier runs are handled according to [`CollisionPolicy`].

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Characters that are not allowed in file names on common platforms
static UNSAFE_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[\\/:*?"<>|\p{Cc}\s]+"#).expect("valid regex"));

/// What to do when the target file already exists from an earlier run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollisionPolicy {
    /// Append `_2`, `_3`, ... to the file name
    #[default]
    Suffix,
    /// Leave the existing file and skip the name
    Skip,
    /// Replace the existing file
    Overwrite,
}

impl FromStr for CollisionPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "suffix" | "rename" => Ok(CollisionPolicy::Suffix),
            "skip" => Ok(CollisionPolicy::Skip),
            "overwrite" => Ok(CollisionPolicy::Overwrite),
            other => Err(format!(
                "unknown collision policy '{}' (use suffix, skip or overwrite)",
                other
            )),
        }
    }
}

/// A certificate that was written to disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRecord {
    pub name: String,
    pub path: PathBuf,
}

/// Outcome of writing one certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Written(OutputRecord),
    /// The file already existed and [`CollisionPolicy::Skip`] is in effect
    Skipped(PathBuf),
}

/// Turn a name into a safe file name fragment
///
/// Runs of whitespace and filename-illegal characters become a single `_`;
/// leading and trailing `_` and `.` are removed.
pub fn sanitize_filename(name: &str) -> String {
    let replaced = UNSAFE_FILENAME_CHARS.replace_all(name, "_");
    let trimmed = replaced.trim_matches(|c| c == '_' || c == '.');
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

/// File name of the certificate for `name`
pub fn certificate_filename(name: &str) -> String {
    format!("certificate_{}.pdf", sanitize_filename(name))
}

/// Writes certificates into one directory
#[derive(Debug)]
pub struct OutputManager {
    dir: PathBuf,
    policy: CollisionPolicy,
    written: HashSet<PathBuf>,
}

impl OutputManager {
    /// Create the output directory if needed
    pub fn new(dir: &Path, policy: CollisionPolicy) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            policy,
            written: HashSet::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the certificate bytes for `name`
    pub fn write(&mut self, name: &str, bytes: &[u8]) -> Result<WriteOutcome> {
        let stem = format!("certificate_{}", sanitize_filename(name));

        for attempt in 1u32.. {
            let path = if attempt == 1 {
                self.dir.join(format!("{}.pdf", stem))
            } else {
                self.dir.join(format!("{}_{}.pdf", stem, attempt))
            };

            if self.written.contains(&path) {
                continue;
            }

            let mut options = OpenOptions::new();
            options.write(true);
            match self.policy {
                CollisionPolicy::Overwrite => {
                    options.create(true).truncate(true);
                }
                CollisionPolicy::Suffix | CollisionPolicy::Skip => {
                    options.create_new(true);
                }
            }

            match options.open(&path) {
                Ok(file) => {
                    write_or_remove(&path, file, bytes)?;
                    debug!("Wrote {}", path.display());
                    self.written.insert(path.clone());
                    return Ok(WriteOutcome::Written(OutputRecord {
                        name: name.to_string(),
                        path,
                    }));
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if self.policy == CollisionPolicy::Skip {
                        return Ok(WriteOutcome::Skipped(path));
                    }
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }

        Err(Error::General(format!("No free file name for {}", name)))
    }

    /// Write a throwaway file (such as a preview) next to the certificates
    pub fn write_scratch(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.dir.join(file_name);
        fs::write(&path, bytes)?;
        Ok(path)
    }
}

/// Fill a freshly opened output file, deleting it again if the write fails
/// so no truncated certificate is left behind
fn write_or_remove<W: Write>(path: &Path, mut file: W, bytes: &[u8]) -> Result<()> {
    let result = file.write_all(bytes).and_then(|()| file.flush());
    drop(file);
    if let Err(e) = result {
        if let Err(remove_err) = fs::remove_file(path) {
            warn!("Could not remove incomplete {}: {}", path.display(), remove_err);
        }
        return Err(Error::Io(e));
    }
    Ok(())
}

/// Open a file with the system default application
pub fn open_file(path: &Path) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(path).spawn()?;
    }
    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(path).spawn()?;
    }
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", "", &path.display().to_string()])
            .spawn()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Accepts a few bytes, then fails like a full disk
    struct FullDisk {
        room: usize,
    }

    impl Write for FullDisk {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.room == 0 {
                return Err(std::io::Error::new(ErrorKind::Other, "no space left on device"));
            }
            let n = buf.len().min(self.room);
            self.room -= n;
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failed_write_removes_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("certificate_Ada.pdf");
        fs::write(&path, b"%PDF-").unwrap();

        let err = write_or_remove(&path, FullDisk { room: 4 }, b"%PDF-1.7 body").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert!(!path.exists());
    }

    #[test]
    fn test_successful_write_keeps_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("certificate_Ada.pdf");
        let file = OpenOptions::new().write(true).create_new(true).open(&path).unwrap();

        write_or_remove(&path, file, b"%PDF-1.7").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"%PDF-1.7");
    }

    #[test]
    fn test_certificate_filename() {
        assert_eq!(certificate_filename("John Doe"), "certificate_John_Doe.pdf");
        assert_eq!(certificate_filename("  John   Doe  "), "certificate_John_Doe.pdf");
        assert_eq!(certificate_filename("A/B: C?"), "certificate_A_B_C.pdf");
        assert_eq!(certificate_filename("José Álvarez"), "certificate_José_Álvarez.pdf");
        assert_eq!(certificate_filename("???"), "certificate_unnamed.pdf");
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        for name in ["John Doe", "a<b>c", "..dots..", "tab\there"] {
            let once = sanitize_filename(name);
            assert_eq!(sanitize_filename(&once), once);
        }
    }

    #[test]
    fn test_collision_gets_suffix() {
        let dir = TempDir::new().unwrap();
        let mut output = OutputManager::new(dir.path(), CollisionPolicy::Suffix).unwrap();

        let first = output.write("John Doe", b"first").unwrap();
        let second = output.write("John/Doe", b"second").unwrap();

        let (WriteOutcome::Written(first), WriteOutcome::Written(second)) = (first, second) else {
            panic!("both names should be written");
        };
        assert_eq!(first.path, dir.path().join("certificate_John_Doe.pdf"));
        assert_eq!(second.path, dir.path().join("certificate_John_Doe_2.pdf"));
        assert_eq!(fs::read(&first.path).unwrap(), b"first");
        assert_eq!(fs::read(&second.path).unwrap(), b"second");
    }

    #[test]
    fn test_skip_policy_keeps_existing_file() {
        let dir = TempDir::new().unwrap();
        let existing = dir.path().join("certificate_Ada.pdf");
        fs::write(&existing, b"old").unwrap();

        let mut output = OutputManager::new(dir.path(), CollisionPolicy::Skip).unwrap();
        let outcome = output.write("Ada", b"new").unwrap();

        assert_eq!(outcome, WriteOutcome::Skipped(existing.clone()));
        assert_eq!(fs::read(&existing).unwrap(), b"old");
    }

    #[test]
    fn test_overwrite_replaces_old_runs_but_not_this_run() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("certificate_Ada.pdf"), b"old").unwrap();

        let mut output = OutputManager::new(dir.path(), CollisionPolicy::Overwrite).unwrap();
        output.write("Ada", b"one").unwrap();
        let outcome = output.write("Ada", b"two").unwrap();

        assert_eq!(fs::read(dir.path().join("certificate_Ada.pdf")).unwrap(), b"one");
        assert!(matches!(outcome, WriteOutcome::Written(r) if r.path.ends_with("certificate_Ada_2.pdf")));
    }

    #[test]
    fn test_creates_output_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("output").join("2026");
        let output = OutputManager::new(&nested, CollisionPolicy::Suffix).unwrap();
        assert!(nested.is_dir());
        assert_eq!(output.dir(), nested.as_path());
    }
}
